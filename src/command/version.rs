//! Bump, commit and tag changed packages and their dependents.
use log::*;

use crate::{
    cli::VersionArgs,
    command::common::confirm,
    monorepo::Monorepo,
    npm::ScriptRunner,
    package::filter::Selection,
    result::Result,
    version::executor::prepare_version_bump,
};

pub async fn execute(
    monorepo: &mut Monorepo,
    selection: &Selection,
    args: &VersionArgs,
    runner: &dyn ScriptRunner,
) -> Result<()> {
    monorepo.ensure_health()?;

    if let Some(prefix) = &args.tag_version_prefix {
        monorepo.config.tag_version_prefix = prefix.clone();
    }

    let config = args.to_config(&monorepo.config)?;

    let subjects = monorepo.select(selection)?;
    let prepared =
        prepare_version_bump(monorepo, &subjects, config, args.all_pkgs).await?;

    let Some(mut bump) = prepared else {
        println!("No changed packages to version");
        return Ok(());
    };

    println!("\nWill bump the following packages:\n");
    print!("{}", bump.plan());
    println!();

    if !confirm("Is this okay?", args.yes)? {
        info!("version bump cancelled");
        return Ok(());
    }

    bump.execute(monorepo, runner).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        npm::MockScriptRunner,
        test_helpers::{commit_all, git, init_repo, tag, write_monorepo},
    };
    use serde_json::{Value, json};
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn bumps_with_cli_prefix_and_message() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        init_repo(root);
        write_monorepo(
            root,
            json!({"tagVersionPrefix": "release-"}),
            &[
                ("packages/core", json!({"name": "core", "version": "1.0.0"})),
                (
                    "packages/plug",
                    json!({"name": "plug", "version": "1.0.0", "devDependencies": {"core": "~1.0.0"}}),
                ),
            ],
        );
        commit_all(root, "init");
        tag(root, "rel/1.0.0");

        fs::write(root.join("packages/core/index.js"), "").unwrap();
        commit_all(root, "edit core");

        let mut monorepo = Monorepo::load(root).await.unwrap();
        let args = VersionArgs {
            specifier: Some("minor".into()),
            yes: true,
            message: Some("chore: %s".into()),
            tag_version_prefix: Some("rel/".into()),
            ..Default::default()
        };

        execute(&mut monorepo, &Selection::default(), &args, &MockScriptRunner::new())
            .await
            .unwrap();

        assert_eq!(git(root, &["log", "-1", "--format=%s"]), "chore: 1.1.0");
        assert_eq!(git(root, &["tag", "-l", "rel/1.1.0"]), "rel/1.1.0");

        let plug: Value = serde_json::from_str(
            &fs::read_to_string(root.join("packages/plug/package.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(plug["version"], "1.1.0");
        assert_eq!(plug["devDependencies"]["core"], "~1.1.0");
    }

    #[tokio::test]
    async fn unhealthy_graph_is_refused() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_monorepo(
            root,
            json!({}),
            &[
                ("core", json!({"name": "core", "version": "2.0.0"})),
                ("plug", json!({"name": "plug", "dependencies": {"core": "^1.0.0"}})),
            ],
        );

        let mut monorepo = Monorepo::load(root).await.unwrap();
        let args = VersionArgs {
            yes: true,
            ..Default::default()
        };

        assert!(
            execute(&mut monorepo, &Selection::default(), &args, &MockScriptRunner::new())
                .await
                .is_err()
        );
    }
}

//! Publish the selected packages that are at the current version.
use futures_util::future::join_all;
use log::*;
use serde_json::Value;

use crate::{
    command::common::confirm,
    error::MonorailError,
    monorepo::Monorepo,
    npm::{ScriptRunner, run_scripts},
    package::{Package, filter::Selection},
    result::Result,
    version::resolve::compute_base_version,
};

const ROOT_PRE_SCRIPTS: [&str; 3] = ["prepublish", "prepare", "prepublishOnly"];
const ROOT_POST_SCRIPTS: [&str; 2] = ["publish", "postpublish"];

/// Packages that will be published and the version they are at.
#[derive(Debug)]
pub struct PublishQueue<'a> {
    pub version: Option<String>,
    pub pkgs: Vec<&'a Package>,
}

pub async fn execute(
    monorepo: &Monorepo,
    selection: &Selection,
    yes: bool,
    npm_args: &[String],
    runner: &dyn ScriptRunner,
) -> Result<()> {
    monorepo.ensure_health()?;

    let subjects = monorepo.select(selection)?;
    let queue = prepare_publish(monorepo, &subjects).await?;

    let Some(version) = queue.version.as_deref().filter(|_| !queue.pkgs.is_empty())
    else {
        println!("No packages to publish");
        return Ok(());
    };

    println!("\nWill publish the following packages:\n");
    for pkg in &queue.pkgs {
        println!("  {version} {}", pkg.readable_id());
    }
    println!();

    if !confirm("Is this okay?", yes)? {
        info!("publish cancelled");
        return Ok(());
    }

    publish(monorepo, &queue, npm_args, runner).await
}

/// Subjects whose version is the base version and whose publish manifest
/// isn't private.
///
/// # Errors
///
/// [`MonorailError::PublishNeedsName`] when a publish manifest has no name,
/// [`MonorailError::MissingDistManifest`] when a dist dir has no manifest.
pub async fn prepare_publish<'a>(
    monorepo: &Monorepo,
    subjects: &[&'a Package],
) -> Result<PublishQueue<'a>> {
    let version = compute_base_version(monorepo.root_pkg.as_ref(), subjects);

    let publish_data =
        join_all(subjects.iter().map(|pkg| pkg.publish_data())).await;

    let mut pkgs = vec![];

    for (pkg, data) in subjects.iter().zip(publish_data) {
        let data = data?;

        if data.get("name").and_then(Value::as_str).is_none() {
            return Err(MonorailError::PublishNeedsName(pkg.readable_id()).into());
        }

        let private = data.get("private").and_then(Value::as_bool) == Some(true);

        if private {
            debug!("{} is private", pkg.readable_id());
        } else if pkg.version().is_some() && pkg.version() == version.as_deref() {
            pkgs.push(*pkg);
        } else {
            debug!(
                "{} is at {}, not {}",
                pkg.readable_id(),
                pkg.version().unwrap_or("-"),
                version.as_deref().unwrap_or("-")
            );
        }
    }

    Ok(PublishQueue { version, pkgs })
}

/// Root pre scripts, concurrent publishes, root post scripts.
pub async fn publish(
    monorepo: &Monorepo,
    queue: &PublishQueue<'_>,
    npm_args: &[String],
    runner: &dyn ScriptRunner,
) -> Result<()> {
    let root: Vec<&Package> = monorepo.root_pkg.iter().collect();
    let version = queue.version.as_deref();

    for script in ROOT_PRE_SCRIPTS {
        run_scripts(runner, monorepo.npm_client, &root, script, version).await?;
    }

    let results = join_all(queue.pkgs.iter().map(|pkg| {
        let args: Vec<String> = monorepo
            .config
            .command_npm_args("publish")
            .iter()
            .chain(pkg.npm_client_args.iter())
            .chain(npm_args.iter())
            .cloned()
            .collect();
        let cmd = monorepo.npm_client.build_publish_cmd(&args);

        info!(
            "publishing {} from {}",
            pkg.readable_id(),
            pkg.publish_dir().display()
        );
        runner.run(cmd, pkg.publish_dir().to_path_buf(), vec![])
    }))
    .await;

    let failures: Vec<(String, String)> = queue
        .pkgs
        .iter()
        .zip(results)
        .filter_map(|(pkg, result)| {
            result.err().map(|err| (pkg.readable_id(), err.to_string()))
        })
        .collect();

    if !failures.is_empty() {
        return Err(MonorailError::ScriptsFailed {
            script: "publish".into(),
            failures,
        }
        .into());
    }

    for script in ROOT_POST_SCRIPTS {
        run_scripts(runner, monorepo.npm_client, &root, script, version).await?;
    }

    Ok(())
}

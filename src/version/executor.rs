//! Applying a [`BumpPlan`]: lifecycle hooks, manifest writes, staging,
//! commits and tags, with rollback of everything before the commit.
use color_eyre::eyre::Report;
use futures_util::future::{BoxFuture, FutureExt, join_all};
use log::*;
use serde_json::Value;
use std::path::PathBuf;
use strum::Display;

use crate::{
    config::version::VersionConfig,
    error::MonorailError,
    git::{
        repo::{GitRepo, is_repo_root},
        tree::RepoNode,
    },
    monorepo::Monorepo,
    npm::{NpmClient, ScriptRunner, run_scripts},
    package::{
        Package,
        deps::apply_deps,
        manifest::{Snapshot, restore},
    },
    result::Result,
    version::{
        changed::changed_at_baseline,
        planner::{BumpPlan, ModMap, build_mod_map},
        resolve::{compute_base_version, compute_new_version, resolve_reference},
    },
};

/// Progress of a [`VersionBump`]. Each value names the last step that
/// completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum BumpStage {
    Init,
    PreHook,
    FilesModified,
    FilesStaged,
    VersionHook,
    Committed,
    Tagged,
    PostHook,
    Done,
    RolledBack,
}

/// A planned bump, ready to be executed once.
#[derive(Debug)]
pub struct VersionBump {
    plan: BumpPlan,
    config: VersionConfig,
    npm_client: NpmClient,
    /// Present when committing and tagging is enabled.
    repo_tree: Option<RepoNode>,
    stage: BumpStage,
    snapshots: Vec<Snapshot>,
    staging_started: bool,
}

/// Work out what bumping `subjects` means: old and new version, changed
/// packages and everything that has to follow them.
///
/// Returns `None` when nothing changed since the current version.
pub async fn prepare_version_bump(
    monorepo: &Monorepo,
    subjects: &[&Package],
    config: VersionConfig,
    force_all: bool,
) -> Result<Option<VersionBump>> {
    if config.git_tag_enabled && !config.force {
        ensure_clean(monorepo).await?;
    }

    let old_version = compute_base_version(monorepo.root_pkg.as_ref(), subjects);
    let new_version =
        compute_new_version(old_version.as_deref(), &config.specifier)?;

    let named: Vec<&Package> = subjects
        .iter()
        .copied()
        .filter(|pkg| pkg.name().is_some())
        .collect();

    let mut bump_pkgs = if force_all {
        named
    } else {
        let baseline = resolve_reference(
            monorepo,
            old_version.as_deref().unwrap_or_default(),
            false,
        )?;
        changed_at_baseline(monorepo, &named, &baseline).await?
    };

    if bump_pkgs.is_empty() {
        info!(
            "no changed packages since {}",
            old_version.as_deref().unwrap_or("the first release")
        );
        return Ok(None);
    }

    if let Some(root) = &monorepo.root_pkg
        && root.manifest.has_version_key()
    {
        bump_pkgs.push(root);
    }

    let mods = build_mod_map(&bump_pkgs, &new_version, &monorepo.inner_pkgs)?;

    let repo_tree = if config.git_tag_enabled {
        let modified: Vec<&Package> = monorepo
            .all_packages()
            .filter(|pkg| mods.contains_key(&pkg.dir))
            .collect();
        Some(RepoNode::build(&monorepo.root_dir, &modified)?)
    } else {
        None
    };

    Ok(Some(VersionBump {
        plan: BumpPlan {
            old_version,
            new_version,
            mods,
        },
        config,
        npm_client: monorepo.npm_client,
        repo_tree,
        stage: BumpStage::Init,
        snapshots: vec![],
        staging_started: false,
    }))
}

async fn ensure_clean(monorepo: &Monorepo) -> Result<()> {
    let root = &monorepo.root_dir;

    if !is_repo_root(root) {
        return Err(MonorailError::NoRepoRoot(root.clone()).into());
    }

    if GitRepo::new(root).is_dirty().await? {
        return Err(MonorailError::DirtyTree(root.clone()).into());
    }

    Ok(())
}

impl VersionBump {
    pub fn plan(&self) -> &BumpPlan {
        &self.plan
    }

    pub fn stage(&self) -> BumpStage {
        self.stage
    }

    /// Snapshots of every manifest written so far.
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Run the bump. Failures up to and including the commit roll every
    /// manifest back; tag and `postversion` failures are reported only.
    pub async fn execute(
        &mut self,
        monorepo: &mut Monorepo,
        runner: &dyn ScriptRunner,
    ) -> Result<()> {
        let committed = match self.apply(monorepo, runner).await {
            Ok(committed) => committed,
            Err(err) => {
                error!("version bump failed after {}: {err}", self.stage);
                self.rollback(monorepo).await;
                return Err(err);
            }
        };

        let tagged = self.tag(&committed).await;
        if tagged.is_ok() {
            self.stage = BumpStage::Tagged;
        }

        let post_hook = self
            .run_hook(monorepo, runner, "postversion", &self.plan.new_version)
            .await;
        if post_hook.is_ok() {
            self.stage = BumpStage::PostHook;
        }

        match (tagged, post_hook) {
            (Ok(()), Ok(())) => {
                self.stage = BumpStage::Done;
                info!(
                    "bumped {} packages to {}",
                    self.plan.mods.len(),
                    self.plan.new_version
                );
                Ok(())
            }
            (Err(err), Ok(())) => Err(err),
            (Ok(()), Err(err)) => Err(err),
            (Err(tag_err), Err(hook_err)) => {
                error!("{hook_err}");
                Err(tag_err)
            }
        }
    }

    /// Everything that gets rolled back on failure. Returns the roots of the
    /// repositories that committed.
    async fn apply(
        &mut self,
        monorepo: &mut Monorepo,
        runner: &dyn ScriptRunner,
    ) -> Result<Vec<PathBuf>> {
        let old_version = self.plan.old_version.clone().unwrap_or_default();
        self.run_hook(monorepo, runner, "preversion", &old_version).await?;
        self.stage = BumpStage::PreHook;

        self.modify_files(monorepo).await?;
        self.stage = BumpStage::FilesModified;

        if let Some(tree) = &self.repo_tree {
            self.staging_started = true;
            index_node(tree, &self.plan.mods, IndexOp::Add).await?;
            self.stage = BumpStage::FilesStaged;
        }

        self.run_hook(monorepo, runner, "version", &self.plan.new_version)
            .await?;
        self.stage = BumpStage::VersionHook;

        let Some(tree) = &self.repo_tree else {
            return Ok(vec![]);
        };

        let committed = commit_node(
            tree,
            &self.plan.mods,
            &self.config.commit_message(&self.plan.new_version),
            self.config.commit_hooks,
            &self.config.commit_args,
        )
        .await?;
        self.stage = BumpStage::Committed;

        Ok(committed)
    }

    async fn run_hook(
        &self,
        monorepo: &Monorepo,
        runner: &dyn ScriptRunner,
        script: &str,
        version: &str,
    ) -> Result<()> {
        if self.config.ignore_scripts {
            return Ok(());
        }

        let pkgs: Vec<&Package> = monorepo
            .all_packages()
            .filter(|pkg| self.plan.contains(pkg))
            .collect();

        run_scripts(runner, self.npm_client, &pkgs, script, Some(version)).await
    }

    async fn modify_files(&mut self, monorepo: &mut Monorepo) -> Result<()> {
        let mods = &self.plan.mods;

        let writes = monorepo
            .root_pkg
            .iter_mut()
            .chain(monorepo.inner_pkgs.iter_mut())
            .filter_map(|pkg| mods.get(&pkg.dir).map(|m| (pkg, m)))
            .map(|(pkg, m)| async move {
                let mut data = pkg.manifest.data().clone();

                if let Some(version) = &m.version
                    && let Some(obj) = data.as_object_mut()
                {
                    obj.insert("version".into(), Value::from(version.as_str()));
                }

                if let Some(deps) = &m.deps {
                    apply_deps(&mut data, deps);
                }

                pkg.manifest.update(data).await
            });

        let results = join_all(writes).await;
        let mut first_err = None;

        for result in results {
            match result {
                Ok(snapshot) => self.snapshots.push(snapshot),
                Err(err) if first_err.is_none() => first_err = Some(err),
                Err(err) => warn!("{err}"),
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn tag(&self, roots: &[PathBuf]) -> Result<()> {
        let name = self.config.tag_name(&self.plan.new_version);

        let results = join_all(roots.iter().map(|root| {
            let name = &name;
            async move {
                info!("tagging {} with {name}", root.display());
                GitRepo::new(root)
                    .create_tag(name, &self.plan.new_version, self.config.sign_tag)
                    .await
            }
        }))
        .await;

        let failures: Vec<(String, String)> = roots
            .iter()
            .zip(results)
            .filter_map(|(root, result)| {
                result
                    .err()
                    .map(|err| (root.display().to_string(), err.to_string()))
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(MonorailError::TagsFailed { failures }.into())
        }
    }

    /// Undo the manifest writes: unstage, restore snapshots, re-read.
    /// Failures here are logged, the caller reports the original error.
    async fn rollback(&mut self, monorepo: &mut Monorepo) {
        if self.staging_started
            && let Some(tree) = &self.repo_tree
            && let Err(err) = index_node(tree, &self.plan.mods, IndexOp::Reset).await
        {
            error!("failed to unstage manifests: {err}");
        }

        let restored = join_all(self.snapshots.iter().rev().map(restore)).await;
        for err in restored.into_iter().filter_map(|r| r.err()) {
            error!("failed to restore manifest: {err}");
        }

        let reloads = monorepo
            .root_pkg
            .iter_mut()
            .chain(monorepo.inner_pkgs.iter_mut())
            .filter(|pkg| self.plan.mods.contains_key(&pkg.dir))
            .map(|pkg| pkg.manifest.reload());

        for err in join_all(reloads).await.into_iter().filter_map(|r| r.err()) {
            error!("failed to reload manifest: {err}");
        }

        self.snapshots.clear();
        self.staging_started = false;
        self.stage = BumpStage::RolledBack;
        warn!("rolled back version bump to {}", self.plan.new_version);
    }
}

#[derive(Debug, Clone, Copy)]
enum IndexOp {
    Add,
    Reset,
}

/// Stage or unstage the modified manifests. Sequential within a repository,
/// concurrent across repositories.
///
/// Staging stops at the first failure. Unstaging tries every manifest and
/// returns the first failure once all were attempted.
fn index_node<'a>(
    node: &'a RepoNode,
    mods: &'a ModMap,
    op: IndexOp,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let own = async {
            let mut first_err = None;

            for pkg in node.packages.iter().filter(|p| mods.contains_key(&p.dir)) {
                match op {
                    IndexOp::Add => node.repo.add_file(&pkg.manifest_path).await?,
                    IndexOp::Reset => {
                        if let Err(err) =
                            node.repo.reset_file(&pkg.manifest_path).await
                        {
                            warn!(
                                "failed to unstage {}: {err}",
                                pkg.manifest_path.display()
                            );
                            first_err.get_or_insert(err);
                        }
                    }
                }
            }

            match first_err {
                Some(err) => Err(err),
                None => Ok::<_, Report>(()),
            }
        };

        let nested =
            join_all(node.nested.iter().map(|child| index_node(child, mods, op)));

        let (own, nested) = tokio::join!(own, nested);

        own?;
        for result in nested {
            result?;
        }

        Ok(())
    }
    .boxed()
}

/// Commit nested repositories first, then stage their new commits and
/// commit the parent. A repository commits when it has modified manifests
/// or a nested repository committed.
fn commit_node<'a>(
    node: &'a RepoNode,
    mods: &'a ModMap,
    message: &'a str,
    run_hooks: bool,
    extra_args: &'a [String],
) -> BoxFuture<'a, Result<Vec<PathBuf>>> {
    async move {
        let nested = join_all(node.nested.iter().map(|child| {
            commit_node(child, mods, message, run_hooks, extra_args)
        }))
        .await;

        let mut committed = vec![];
        let mut nested_committed = false;

        for (child, result) in node.nested.iter().zip(nested) {
            let roots = result?;

            if !roots.is_empty() {
                node.repo.add_file(child.root_dir()).await?;
                nested_committed = true;
            }

            committed.extend(roots);
        }

        let own_mods = node.packages.iter().any(|p| mods.contains_key(&p.dir));

        if own_mods || nested_committed {
            info!("committing in {}", node.root_dir().display());
            node.repo.commit(message, run_hooks, extra_args).await?;
            committed.push(node.root_dir().to_path_buf());
        }

        Ok(committed)
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        npm::MockScriptRunner,
        test_helpers::{
            add_submodule, commit_all, git, init_repo, tag, write_json,
            write_monorepo,
        },
        version::resolve::{ReleaseType, VersionSpecifier},
    };
    use color_eyre::eyre::eyre;
    use serde_json::json;
    use std::{fs, path::Path};
    use tempfile::TempDir;

    fn major() -> VersionConfig {
        VersionConfig {
            specifier: VersionSpecifier::Increment {
                release_type: ReleaseType::Major,
                preid: None,
            },
            ..Default::default()
        }
    }

    /// Tagged core/plug monorepo at 1.0.0 with an edit to core.
    fn core_plug(root: &Path, core_scripts: Value) {
        init_repo(root);
        write_monorepo(
            root,
            json!({}),
            &[
                (
                    "packages/core",
                    json!({"name": "core", "version": "1.0.0", "scripts": core_scripts}),
                ),
                (
                    "packages/plug",
                    json!({"name": "plug", "version": "1.0.0", "dependencies": {"core": "^1.0.0"}}),
                ),
            ],
        );
        commit_all(root, "1.0.0");
        tag(root, "v1.0.0");

        fs::write(root.join("packages/core/index.js"), "// core\n").unwrap();
        commit_all(root, "edit core");
    }

    fn manifest_text(root: &Path, rel: &str) -> String {
        fs::read_to_string(root.join(rel).join("package.json")).unwrap()
    }

    async fn prepare(monorepo: &Monorepo, config: VersionConfig) -> VersionBump {
        let subjects: Vec<&Package> = monorepo.inner_pkgs.iter().collect();
        prepare_version_bump(monorepo, &subjects, config, false)
            .await
            .unwrap()
            .unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn bumps_commits_and_tags() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        core_plug(root, json!({}));

        let mut monorepo = Monorepo::load(root).await.unwrap();
        let mut bump = prepare(&monorepo, major()).await;

        assert_eq!(bump.plan().old_version.as_deref(), Some("1.0.0"));
        assert_eq!(bump.plan().new_version, "2.0.0");
        assert_eq!(bump.plan().mods.len(), 2);

        bump.execute(&mut monorepo, &MockScriptRunner::new())
            .await
            .unwrap();

        assert_eq!(bump.stage(), BumpStage::Done);
        assert_eq!(git(root, &["log", "-1", "--format=%s"]), "2.0.0");
        assert_eq!(git(root, &["tag", "-l", "v2.0.0"]), "v2.0.0");
        assert_eq!(git(root, &["status", "--porcelain"]), "");

        let plug: Value =
            serde_json::from_str(&manifest_text(root, "packages/plug")).unwrap();
        assert_eq!(plug["version"], "2.0.0");
        assert_eq!(plug["dependencies"]["core"], "^2.0.0");

        let in_memory = monorepo.inner_pkgs.iter().find(|p| p.name() == Some("plug")).unwrap();
        assert_eq!(in_memory.version(), Some("2.0.0"));
    }

    #[test_log::test(tokio::test)]
    async fn failing_version_hook_rolls_everything_back() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        core_plug(root, json!({"preversion": "true", "version": "false"}));

        let before_core = manifest_text(root, "packages/core");
        let before_plug = manifest_text(root, "packages/plug");

        let mut monorepo = Monorepo::load(root).await.unwrap();
        let mut bump = prepare(&monorepo, major()).await;

        let mut runner = MockScriptRunner::new();
        runner
            .expect_run()
            .withf(|cmd, _, env| {
                cmd == &["npm", "run", "preversion"]
                    && env == &[("npm_package_version".to_string(), "1.0.0".to_string())]
            })
            .times(1)
            .returning(|_, _, _| Ok(String::new()));
        runner
            .expect_run()
            .withf(|cmd, _, _| cmd == &["npm", "run", "version"])
            .times(1)
            .returning(|_, _, _| Err(eyre!("version script failed")));

        let err = bump.execute(&mut monorepo, &runner).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MonorailError>(),
            Some(MonorailError::ScriptsFailed { script, .. }) if script == "version"
        ));
        assert_eq!(bump.stage(), BumpStage::RolledBack);
        assert!(bump.snapshots().is_empty());

        assert_eq!(manifest_text(root, "packages/core"), before_core);
        assert_eq!(manifest_text(root, "packages/plug"), before_plug);
        assert_eq!(git(root, &["status", "--porcelain"]), "");
        assert_eq!(git(root, &["tag", "-l", "v2.0.0"]), "");

        for pkg in &monorepo.inner_pkgs {
            assert_eq!(pkg.version(), Some("1.0.0"));
        }
    }

    #[cfg(unix)]
    #[test_log::test(tokio::test)]
    async fn failing_commit_hook_rolls_back_staged_files() {
        use crate::test_helpers::install_hook;

        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        core_plug(root, json!({}));
        install_hook(root, "pre-commit", "#!/bin/sh\nexit 1\n");

        let before_core = manifest_text(root, "packages/core");
        let head = git(root, &["rev-parse", "HEAD"]);

        let mut monorepo = Monorepo::load(root).await.unwrap();
        let mut bump = prepare(&monorepo, major()).await;

        let err = bump
            .execute(&mut monorepo, &MockScriptRunner::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MonorailError>(),
            Some(MonorailError::VcsCommand { .. })
        ));
        assert_eq!(manifest_text(root, "packages/core"), before_core);
        assert_eq!(git(root, &["rev-parse", "HEAD"]), head);
        assert_eq!(git(root, &["diff", "--cached", "--name-only"]), "");
    }

    #[cfg(unix)]
    #[test_log::test(tokio::test)]
    async fn commit_hooks_can_be_skipped() {
        use crate::test_helpers::install_hook;

        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        core_plug(root, json!({}));
        install_hook(root, "pre-commit", "#!/bin/sh\nexit 1\n");

        let mut monorepo = Monorepo::load(root).await.unwrap();
        let config = VersionConfig {
            commit_hooks: false,
            message: "release %s".into(),
            ..major()
        };
        let mut bump = prepare(&monorepo, config).await;

        bump.execute(&mut monorepo, &MockScriptRunner::new())
            .await
            .unwrap();

        assert_eq!(git(root, &["log", "-1", "--format=%s"]), "release 2.0.0");
    }

    #[test_log::test(tokio::test)]
    async fn dirty_tree_is_refused_unless_forced() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        core_plug(root, json!({}));
        fs::write(root.join("packages/core/index.js"), "// dirty\n").unwrap();

        let monorepo = Monorepo::load(root).await.unwrap();
        let subjects: Vec<&Package> = monorepo.inner_pkgs.iter().collect();

        let err = prepare_version_bump(&monorepo, &subjects, major(), false)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MonorailError>(),
            Some(MonorailError::DirtyTree(_))
        ));

        let forced = VersionConfig {
            force: true,
            ..major()
        };
        assert!(
            prepare_version_bump(&monorepo, &subjects, forced, false)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[test_log::test(tokio::test)]
    async fn nothing_to_do_without_changes_unless_forced() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        core_plug(root, json!({}));
        git(root, &["tag", "-f", "-a", "v1.0.0", "-m", "v1.0.0"]);

        let monorepo = Monorepo::load(root).await.unwrap();
        let subjects: Vec<&Package> = monorepo.inner_pkgs.iter().collect();

        let bump = prepare_version_bump(&monorepo, &subjects, major(), false)
            .await
            .unwrap();
        assert!(bump.is_none());

        let all = prepare_version_bump(&monorepo, &subjects, major(), true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(all.plan().mods.len(), 2);
        assert!(all.plan().mods.values().all(|m| m.directly_changed));
    }

    #[test_log::test(tokio::test)]
    async fn versioned_root_follows_without_git() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_monorepo(
            root,
            json!({"version": {"gitTagVersion": false}}),
            &[("packages/core", json!({"name": "core", "version": "1.5.0"}))],
        );
        write_json(&root.join("package.json"), &json!({"private": true, "version": "2.0.0"}));

        let mut monorepo = Monorepo::load(root).await.unwrap();
        let config = VersionConfig::builder(&monorepo.config).build().unwrap();
        let mut bump = prepare(&monorepo, config).await;

        assert_eq!(bump.plan().new_version, "2.0.1");

        bump.execute(&mut monorepo, &MockScriptRunner::new())
            .await
            .unwrap();

        let root_data: Value =
            serde_json::from_str(&fs::read_to_string(root.join("package.json")).unwrap())
                .unwrap();
        assert_eq!(root_data, json!({"private": true, "version": "2.0.1"}));
        assert_eq!(monorepo.inner_pkgs[0].version(), Some("2.0.1"));
    }

    #[test_log::test(tokio::test)]
    async fn nested_repositories_commit_before_their_parent() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("mono");
        let upstream = tmp.path().join("upstream");

        init_repo(&upstream);
        write_json(
            &upstream.join("package.json"),
            &json!({"name": "vendored", "version": "1.0.0"}),
        );
        commit_all(&upstream, "upstream");

        init_repo(&root);
        write_json(&root.join("monorepo.json"), &json!({"packages": ["vendor/lib"]}));
        add_submodule(&root, &upstream, "vendor/lib");
        commit_all(&root, "init");

        let nested = root.join("vendor/lib");
        let mut monorepo = Monorepo::load(&root).await.unwrap();
        let mut bump = prepare(&monorepo, VersionConfig::default()).await;

        bump.execute(&mut monorepo, &MockScriptRunner::new())
            .await
            .unwrap();

        assert_eq!(git(&nested, &["log", "-1", "--format=%s"]), "1.0.1");
        assert_eq!(git(&nested, &["tag", "-l", "v1.0.1"]), "v1.0.1");
        assert_eq!(git(&root, &["log", "-1", "--format=%s"]), "1.0.1");
        assert_eq!(git(&root, &["tag", "-l", "v1.0.1"]), "v1.0.1");
        assert_eq!(git(&root, &["status", "--porcelain"]), "");
    }

    #[test_log::test(tokio::test)]
    async fn tag_failures_keep_the_commit() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        core_plug(root, json!({}));
        tag(root, "v2.0.0");

        let mut monorepo = Monorepo::load(root).await.unwrap();
        let mut bump = prepare(&monorepo, major()).await;

        let err = bump
            .execute(&mut monorepo, &MockScriptRunner::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MonorailError>(),
            Some(MonorailError::TagsFailed { failures }) if failures.len() == 1
        ));
        assert_ne!(bump.stage(), BumpStage::RolledBack);
        assert_ne!(bump.stage(), BumpStage::Done);
        assert!(!bump.snapshots().is_empty());

        assert_eq!(git(root, &["log", "-1", "--format=%s"]), "2.0.0");
        assert_eq!(git(root, &["status", "--porcelain"]), "");
        let core: Value =
            serde_json::from_str(&manifest_text(root, "packages/core")).unwrap();
        assert_eq!(core["version"], "2.0.0");
    }

    #[test_log::test(tokio::test)]
    async fn failing_postversion_is_reported_without_rollback() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        core_plug(root, json!({"postversion": "false"}));

        let mut monorepo = Monorepo::load(root).await.unwrap();
        let mut bump = prepare(&monorepo, major()).await;

        let mut runner = MockScriptRunner::new();
        runner
            .expect_run()
            .withf(|cmd, _, env| {
                cmd == &["npm", "run", "postversion"]
                    && env == &[("npm_package_version".to_string(), "2.0.0".to_string())]
            })
            .times(1)
            .returning(|_, _, _| Err(eyre!("postversion failed")));

        let err = bump.execute(&mut monorepo, &runner).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MonorailError>(),
            Some(MonorailError::ScriptsFailed { script, .. }) if script == "postversion"
        ));
        assert_eq!(bump.stage(), BumpStage::Tagged);

        assert_eq!(git(root, &["log", "-1", "--format=%s"]), "2.0.0");
        assert_eq!(git(root, &["tag", "-l", "v2.0.0"]), "v2.0.0");
        let plug: Value =
            serde_json::from_str(&manifest_text(root, "packages/plug")).unwrap();
        assert_eq!(plug["version"], "2.0.0");
        assert_eq!(plug["dependencies"]["core"], "^2.0.0");
    }

    #[test_log::test(tokio::test)]
    async fn staging_failure_restores_manifest_bytes() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        core_plug(root, json!({}));

        let before_core = manifest_text(root, "packages/core");
        let before_plug = manifest_text(root, "packages/plug");
        let head = git(root, &["rev-parse", "HEAD"]);

        let mut monorepo = Monorepo::load(root).await.unwrap();
        let mut bump = prepare(&monorepo, major()).await;

        // A held index lock makes every `git add` fail.
        let lock = root.join(git(root, &["rev-parse", "--git-path", "index.lock"]));
        fs::write(&lock, "").unwrap();

        let err = bump
            .execute(&mut monorepo, &MockScriptRunner::new())
            .await
            .unwrap_err();

        fs::remove_file(&lock).unwrap();

        assert!(matches!(
            err.downcast_ref::<MonorailError>(),
            Some(MonorailError::VcsCommand { .. })
        ));
        assert_eq!(bump.stage(), BumpStage::RolledBack);
        assert_eq!(manifest_text(root, "packages/core"), before_core);
        assert_eq!(manifest_text(root, "packages/plug"), before_plug);
        assert_eq!(git(root, &["rev-parse", "HEAD"]), head);
        assert_eq!(git(root, &["status", "--porcelain"]), "");

        for pkg in &monorepo.inner_pkgs {
            assert_eq!(pkg.version(), Some("1.0.0"));
        }
    }

    #[test_log::test(tokio::test)]
    async fn unstaging_continues_past_failures() {
        use crate::{git::tree::RepoPackage, version::planner::Mod};

        let tmp = TempDir::new().unwrap();
        let root = fs::canonicalize(tmp.path()).unwrap();
        let outside = TempDir::new().unwrap();
        let outside = fs::canonicalize(outside.path()).unwrap();

        init_repo(&root);
        write_json(
            &root.join("packages/core/package.json"),
            &json!({"name": "core", "version": "1.0.0"}),
        );
        commit_all(&root, "init");
        write_json(
            &root.join("packages/core/package.json"),
            &json!({"name": "core", "version": "1.0.1"}),
        );
        git(&root, &["add", "packages/core/package.json"]);

        let mut tree = RepoNode::build(&root, &[]).unwrap();
        let mut mods = ModMap::new();

        for dir in [outside.join("stray"), root.join("packages/core")] {
            tree.packages.push(RepoPackage {
                dir: dir.clone(),
                manifest_path: dir.join("package.json"),
                ignore_files: vec![],
            });
            mods.insert(
                dir.clone(),
                Mod {
                    dir,
                    id: "pkg".into(),
                    directly_changed: true,
                    version: Some("1.0.1".into()),
                    deps: None,
                },
            );
        }

        let err = index_node(&tree, &mods, IndexOp::Reset).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MonorailError>(),
            Some(MonorailError::VcsCommand { .. })
        ));
        assert_eq!(git(&root, &["diff", "--cached", "--name-only"]), "");
    }
}

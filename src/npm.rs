//! Package manager command building and lifecycle script execution.
use async_trait::async_trait;
use futures_util::future::join_all;
use log::*;
use serde::Deserialize;
use std::path::PathBuf;
use strum::{Display, EnumString};
use tokio::process::Command;

use crate::{error::MonorailError, package::Package, result::Result};

/// Environment variable lifecycle scripts read the version from.
pub const VERSION_ENV: &str = "npm_package_version";

/// Supported package manager clients.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NpmClient {
    #[default]
    Npm,
    Yarn,
}

impl NpmClient {
    pub fn base_cmd(&self) -> &'static str {
        match self {
            NpmClient::Npm => "npm",
            NpmClient::Yarn => "yarn",
        }
    }

    pub fn build_run_cmd(&self, args: &[String]) -> Vec<String> {
        self.build(vec!["run"], args)
    }

    pub fn build_publish_cmd(&self, args: &[String]) -> Vec<String> {
        self.build(vec!["publish"], args)
    }

    fn build(&self, sub: Vec<&str>, args: &[String]) -> Vec<String> {
        std::iter::once(self.base_cmd())
            .chain(sub)
            .map(str::to_string)
            .chain(args.iter().cloned())
            .collect()
    }
}

/// Runs a built command line in a directory and returns buffered stdout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(
        &self,
        cmd: Vec<String>,
        dir: PathBuf,
        env: Vec<(String, String)>,
    ) -> Result<String>;
}

/// Spawns the command as a child process.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandScriptRunner;

#[async_trait]
impl ScriptRunner for CommandScriptRunner {
    async fn run(
        &self,
        cmd: Vec<String>,
        dir: PathBuf,
        env: Vec<(String, String)>,
    ) -> Result<String> {
        let Some((program, args)) = cmd.split_first() else {
            return Ok(String::new());
        };

        debug!("{} (in {})", cmd.join(" "), dir.display());

        let output = Command::new(program)
            .args(args)
            .envs(env)
            .current_dir(&dir)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                stdout
            } else {
                stderr.into_owned()
            };
            return Err(color_eyre::eyre::eyre!(
                "{} exited with {}: {}",
                program,
                output.status,
                detail.trim()
            ));
        }

        Ok(stdout)
    }
}

/// Run `script` in every package that defines it, concurrently. Failures
/// are collected per package into [`MonorailError::ScriptsFailed`].
pub async fn run_scripts(
    runner: &dyn ScriptRunner,
    npm_client: NpmClient,
    pkgs: &[&Package],
    script: &str,
    version: Option<&str>,
) -> Result<()> {
    let with_script: Vec<&Package> = pkgs
        .iter()
        .copied()
        .filter(|pkg| pkg.manifest.has_script(script))
        .collect();

    if with_script.is_empty() {
        return Ok(());
    }

    let env: Vec<(String, String)> = version
        .map(|v| vec![(VERSION_ENV.to_string(), v.to_string())])
        .unwrap_or_default();

    let results = join_all(with_script.iter().map(|pkg| {
        info!("running {script} in {}", pkg.readable_id());
        let cmd = npm_client.build_run_cmd(
            &std::iter::once(script.to_string())
                .chain(pkg.npm_client_args.iter().cloned())
                .collect::<Vec<_>>(),
        );
        runner.run(cmd, pkg.dir.clone(), env.clone())
    }))
    .await;

    let mut failures = vec![];

    for (pkg, result) in with_script.iter().zip(results) {
        match result {
            Ok(output) if !output.trim().is_empty() => {
                debug!("{} {script}:\n{}", pkg.readable_id(), output.trim_end())
            }
            Ok(_) => {}
            Err(err) => failures.push((pkg.readable_id(), err.to_string())),
        }
    }

    if !failures.is_empty() {
        return Err(MonorailError::ScriptsFailed {
            script: script.to_string(),
            failures,
        }
        .into());
    }

    Ok(())
}

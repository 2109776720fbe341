//! Command execution for monorail.
//!
//! Every command loads the monorepo containing the working directory,
//! narrows it down to the packages selected by the global flags and then
//! does its own work:
//!
//! - **list**: print the selected packages
//! - **check**: verify internal dependency ranges
//! - **changed**: print packages changed since a version, tag or commit
//! - **diff**: run `git diff` over the selected packages
//! - **version**: bump changed packages and their dependents, commit, tag
//! - **publish**: publish packages that are at the current version
use std::path::Path;

use crate::{
    cli::{Args, Command},
    npm::ScriptRunner,
    result::Result,
};

pub mod changed;
pub mod check;
pub mod common;
pub mod diff;
pub mod list;
pub mod publish;
pub mod version;

/// Run the parsed command against the monorepo containing `cwd`.
pub async fn execute(
    args: &Args,
    cwd: &Path,
    runner: &dyn ScriptRunner,
) -> Result<()> {
    let mut monorepo = common::load_monorepo(cwd).await?;
    let selection = args.selection();

    match &args.command {
        Command::List => list::execute(&monorepo, &selection),
        Command::Check => check::execute(&monorepo),
        Command::Changed { versionish } => {
            changed::execute(&monorepo, &selection, versionish.as_deref()).await
        }
        Command::Diff {
            versionish,
            git_args,
        } => {
            diff::execute(&monorepo, &selection, versionish.as_deref(), git_args)
                .await
        }
        Command::Version(version_args) => {
            version::execute(&mut monorepo, &selection, version_args, runner)
                .await
        }
        Command::Publish { yes, npm_args } => {
            publish::execute(&monorepo, &selection, *yes, npm_args, runner).await
        }
    }
}

//! Common functionality shared between commands
use inquire::Confirm;
use std::path::Path;

use crate::{
    error::MonorailError, monorepo::Monorepo, package::Package,
    result::Result,
};

/// Load the monorepo containing `cwd`.
pub async fn load_monorepo(cwd: &Path) -> Result<Monorepo> {
    Monorepo::load(cwd).await
}

/// Ask before doing something irreversible. `yes` skips the prompt.
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }

    Confirm::new(prompt)
        .with_default(false)
        .with_help_message("Press y to continue, or Enter to cancel")
        .prompt()
        .map_err(|e| {
            MonorailError::invalid_config(format!(
                "failed to read confirmation: {e}"
            ))
            .into()
        })
}

/// Relative directory of an inner package, "." for the root.
pub fn rel_dir(pkg: &Package) -> &str {
    pkg.inner.as_ref().map(|i| i.rel_dir.as_str()).unwrap_or(".")
}

/// One line per package: readable id, version and directory.
pub fn describe_packages(pkgs: &[&Package]) -> Vec<String> {
    pkgs.iter()
        .map(|pkg| {
            format!(
                "{} {} ({})",
                pkg.readable_id(),
                pkg.version().unwrap_or("-"),
                rel_dir(pkg)
            )
        })
        .collect()
}

use log::*;

use crate::{monorepo::Monorepo, result::Result};

/// Fails with the first broken reference, see
/// [`crate::package::health::ensure_health`].
pub fn execute(monorepo: &Monorepo) -> Result<()> {
    monorepo.ensure_health()?;
    info!(
        "{} packages, all internal references are satisfied",
        monorepo.inner_pkgs.len()
    );
    Ok(())
}

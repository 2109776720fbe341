//! Propagation of a version bump through the dependency graph.
//!
//! Every package that is bumped gets the new version. Every inner package
//! depending on it with a range that no longer admits the new version gets
//! that range rewritten, which in turn bumps the dependent, and so on.
use log::*;
use std::{
    collections::BTreeMap,
    fmt,
    path::PathBuf,
};

use crate::{
    error::MonorailError,
    package::{
        Package,
        deps::{DepGroup, PkgDeps, merge_deps, whitelist_deps},
    },
    result::Result,
    version::range::{satisfies, update_range},
};

/// A planned modification of one package's manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mod {
    pub dir: PathBuf,
    /// Readable id for output.
    pub id: String,
    /// Bumped because its own files changed, not only because of a
    /// dependency.
    pub directly_changed: bool,
    pub version: Option<String>,
    /// Dependency range rewrites, merged into the manifest's groups.
    pub deps: Option<PkgDeps>,
}

pub type ModMap = BTreeMap<PathBuf, Mod>;

/// Result of planning a version bump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpPlan {
    pub old_version: Option<String>,
    pub new_version: String,
    pub mods: ModMap,
}

impl BumpPlan {
    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    pub fn contains(&self, pkg: &Package) -> bool {
        self.mods.contains_key(&pkg.dir)
    }
}

impl fmt::Display for BumpPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} -> {}",
            self.old_version.as_deref().unwrap_or("(none)"),
            self.new_version
        )?;

        for m in self.mods.values() {
            let reason = if m.directly_changed {
                "changed"
            } else {
                "dependency"
            };
            write!(f, "  - {} ({reason})", m.id)?;

            for (dep_type, group) in m.deps.iter().flatten() {
                for (name, range) in group {
                    write!(f, "\n      {dep_type}: {name}@{range}")?;
                }
            }

            writeln!(f)?;
        }

        Ok(())
    }
}

/// Mods for bumping `bump_pkgs` to `new_version`, including every inner
/// package whose dependency ranges must follow.
///
/// # Errors
///
/// [`MonorailError::UnsupportedRangeBump`] when a range that excludes the
/// new version isn't exact, `^` or `~`. Nothing is planned in that case.
pub fn build_mod_map(
    bump_pkgs: &[&Package],
    new_version: &str,
    inner_pkgs: &[Package],
) -> Result<ModMap> {
    let mut planner = Planner {
        inner_pkgs,
        new_version,
        mods: ModMap::new(),
    };

    for pkg in bump_pkgs {
        planner.visit(pkg, true)?;
    }

    debug!("planned {} modifications", planner.mods.len());
    Ok(planner.mods)
}

struct Planner<'a> {
    inner_pkgs: &'a [Package],
    new_version: &'a str,
    mods: ModMap,
}

impl Planner<'_> {
    fn visit(&mut self, pkg: &Package, directly_changed: bool) -> Result<()> {
        if let Some(existing) = self.mods.get_mut(&pkg.dir) {
            existing.directly_changed |= directly_changed;
            return Ok(());
        }

        self.mods.insert(
            pkg.dir.clone(),
            Mod {
                dir: pkg.dir.clone(),
                id: pkg.readable_id(),
                directly_changed,
                version: Some(self.new_version.to_string()),
                deps: None,
            },
        );

        let Some(name) = pkg.name() else {
            return Ok(());
        };

        for dependent in self.inner_pkgs {
            if dependent.dir == pkg.dir {
                continue;
            }

            let rewrites = self.rewrites(dependent, pkg, name)?;

            if rewrites.is_empty() {
                continue;
            }

            self.visit(dependent, false)?;

            if let Some(m) = self.mods.get_mut(&dependent.dir) {
                m.deps = Some(match m.deps.take() {
                    Some(existing) => merge_deps(&existing, &rewrites),
                    None => rewrites,
                });
            }
        }

        Ok(())
    }

    /// Ranges of `dependent` on `name` that must change to admit the new
    /// version.
    fn rewrites(
        &self,
        dependent: &Package,
        dependency: &Package,
        name: &str,
    ) -> Result<PkgDeps> {
        let mut rewrites = PkgDeps::new();

        for (dep_type, group) in whitelist_deps(dependent.manifest.data(), &[name]) {
            let Some(range) = group.get(name) else {
                continue;
            };

            if satisfies(self.new_version, range) {
                continue;
            }

            let updated = update_range(range, self.new_version).ok_or_else(|| {
                MonorailError::unsupported_range(
                    dependent.readable_id(),
                    dependency.readable_id(),
                    range,
                )
            })?;

            trace!(
                "{}: {dep_type} {name} {range} -> {updated}",
                dependent.readable_id()
            );

            rewrites.insert(dep_type, DepGroup::from([(name.to_string(), updated)]));
        }

        Ok(rewrites)
    }
}

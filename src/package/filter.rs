use glob::Pattern;
use std::collections::HashSet;

use crate::{
    error::MonorailError,
    package::{Package, deps::classify_reference_args},
    result::Result,
};

/// Which inner packages a command operates on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// `name[@range]` or relative directory, matched exactly
    pub explicit: Vec<String>,
    /// Globs over name or relative directory, any must match
    pub filters: Vec<String>,
    /// Globs over name or relative directory, none may match
    pub excludes: Vec<String>,
}

/// Narrow `pkgs` down to `selection`, keeping the original order.
///
/// Explicit names of internal packages are checked against the package's
/// version when a range is attached (`core@^1.0.0`). Anything else is
/// compared against relative directories.
pub fn filter_packages<'a>(
    pkgs: &'a [Package],
    selection: &Selection,
) -> Result<Vec<&'a Package>> {
    let filters = compile(&selection.filters)?;
    let excludes = compile(&selection.excludes)?;

    let explicit_dirs: Option<HashSet<&'a std::path::Path>> =
        if selection.explicit.is_empty() {
            None
        } else {
            let by_name = super::hash_by_name(pkgs.iter())?;
            let classified =
                classify_reference_args(&selection.explicit, &by_name)?;

            let mut dirs: HashSet<&'a std::path::Path> = classified
                .internal
                .iter()
                .map(|pkg| pkg.dir.as_path())
                .collect();

            for token in &classified.external {
                dirs.extend(
                    pkgs.iter()
                        .filter(|pkg| rel_dir(pkg) == Some(token.as_str()))
                        .map(|pkg| pkg.dir.as_path()),
                );
            }

            Some(dirs)
        };

    Ok(pkgs
        .iter()
        .filter(|pkg| {
            explicit_dirs
                .as_ref()
                .is_none_or(|dirs| dirs.contains(pkg.dir.as_path()))
        })
        .filter(|pkg| filters.is_empty() || matches_any(pkg, &filters))
        .filter(|pkg| !matches_any(pkg, &excludes))
        .collect())
}

fn compile(globs: &[String]) -> Result<Vec<Pattern>> {
    globs
        .iter()
        .map(|g| {
            Pattern::new(g).map_err(|err| {
                MonorailError::invalid_config(format!(
                    "bad package pattern '{g}': {err}"
                ))
                .into()
            })
        })
        .collect()
}

fn rel_dir(pkg: &Package) -> Option<&str> {
    pkg.inner.as_ref().map(|i| i.rel_dir.as_str())
}

fn matches_any(pkg: &Package, patterns: &[Pattern]) -> bool {
    patterns.iter().any(|pattern| {
        pkg.name().is_some_and(|name| pattern.matches(name))
            || rel_dir(pkg).is_some_and(|dir| pattern.matches(dir))
    })
}

//! Base version computation, version increments and baseline resolution.
use log::*;
use semver::{Prerelease, Version};
use std::str::FromStr;
use strum::{Display, EnumString};

use crate::{
    error::MonorailError,
    git::repo::GitRepo,
    monorepo::Monorepo,
    package::Package,
    result::Result,
    version::range::parse_version,
};

/// npm-compatible release types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ReleaseType {
    Major,
    Minor,
    Patch,
    Premajor,
    Preminor,
    Prepatch,
    Prerelease,
}

/// Either an exact new version or an increment of the base version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpecifier {
    Exact(Version),
    Increment {
        release_type: ReleaseType,
        preid: Option<String>,
    },
}

impl Default for VersionSpecifier {
    fn default() -> Self {
        VersionSpecifier::Increment {
            release_type: ReleaseType::Patch,
            preid: None,
        }
    }
}

impl VersionSpecifier {
    /// Parse a CLI specifier: a release type name or an exact version.
    pub fn parse(raw: &str, preid: Option<String>) -> Result<Self> {
        if let Ok(release_type) = ReleaseType::from_str(raw) {
            return Ok(VersionSpecifier::Increment {
                release_type,
                preid: preid.filter(|p| !p.is_empty()),
            });
        }

        parse_version(raw)
            .map(VersionSpecifier::Exact)
            .ok_or_else(|| MonorailError::InvalidVersion(raw.to_string()).into())
    }
}

/// The version everything is currently considered to be at: the root's
/// version when it has one, else the highest subject version.
pub fn compute_base_version(
    root: Option<&Package>,
    subjects: &[&Package],
) -> Option<String> {
    if let Some(version) = root.and_then(Package::version)
        && !version.is_empty()
    {
        return Some(version.to_string());
    }

    highest_version(subjects)
}

pub fn highest_version(pkgs: &[&Package]) -> Option<String> {
    pkgs.iter()
        .filter_map(|pkg| pkg.version())
        .filter_map(|raw| parse_version(raw).map(|v| (v, raw)))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, raw)| raw.to_string())
}

pub fn compute_new_version(
    base: Option<&str>,
    specifier: &VersionSpecifier,
) -> Result<String> {
    match specifier {
        VersionSpecifier::Exact(version) => Ok(version.to_string()),
        VersionSpecifier::Increment {
            release_type,
            preid,
        } => {
            let base_raw = base.unwrap_or("0.0.0");
            let current = parse_version(base_raw).ok_or_else(|| {
                MonorailError::InvalidVersion(base_raw.to_string())
            })?;

            Ok(increment(&current, *release_type, preid.as_deref())?
                .to_string())
        }
    }
}

/// Increment a version the way `npm version <type>` does.
pub fn increment(
    current: &Version,
    release_type: ReleaseType,
    preid: Option<&str>,
) -> Result<Version> {
    let mut next = Version::new(current.major, current.minor, current.patch);
    let is_pre = !current.pre.is_empty();

    match release_type {
        ReleaseType::Major => {
            if !(is_pre && current.minor == 0 && current.patch == 0) {
                next = Version::new(current.major + 1, 0, 0);
            }
        }
        ReleaseType::Minor => {
            if !(is_pre && current.patch == 0) {
                next = Version::new(current.major, current.minor + 1, 0);
            }
        }
        ReleaseType::Patch => {
            if !is_pre {
                next.patch += 1;
            }
        }
        ReleaseType::Premajor => {
            next = Version::new(current.major + 1, 0, 0);
            next.pre = first_prerelease(preid)?;
        }
        ReleaseType::Preminor => {
            next = Version::new(current.major, current.minor + 1, 0);
            next.pre = first_prerelease(preid)?;
        }
        ReleaseType::Prepatch => {
            next.patch += 1;
            next.pre = first_prerelease(preid)?;
        }
        ReleaseType::Prerelease => {
            if is_pre {
                next.pre = bump_prerelease(&current.pre, preid)?;
            } else {
                next.patch += 1;
                next.pre = first_prerelease(preid)?;
            }
        }
    }

    Ok(next)
}

fn first_prerelease(preid: Option<&str>) -> Result<Prerelease> {
    let raw = match preid {
        Some(id) => format!("{id}.0"),
        None => "0".to_string(),
    };
    parse_prerelease(&raw)
}

fn bump_prerelease(pre: &Prerelease, preid: Option<&str>) -> Result<Prerelease> {
    let mut parts: Vec<String> =
        pre.as_str().split('.').map(str::to_string).collect();

    if let Some(id) = preid
        && parts.first().map(String::as_str) != Some(id)
    {
        return first_prerelease(Some(id));
    }

    match parts
        .iter()
        .rposition(|part| part.chars().all(|c| c.is_ascii_digit()))
    {
        Some(idx) => {
            let next = parts[idx]
                .parse::<u64>()
                .ok()
                .and_then(|n| n.checked_add(1))
                .ok_or_else(|| MonorailError::InvalidVersion(pre.to_string()))?;
            parts[idx] = next.to_string();
        }
        None => parts.push("0".to_string()),
    }

    parse_prerelease(&parts.join("."))
}

fn parse_prerelease(raw: &str) -> Result<Prerelease> {
    Prerelease::new(raw)
        .map_err(|_| MonorailError::InvalidVersion(raw.to_string()).into())
}

/// A baseline reference and the commit it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Baseline {
    /// The reference asked for or derived. Empty when nothing has a version.
    pub reference: String,
    /// Resolved commit. `None` means "no baseline": a first release.
    pub commit: Option<String>,
}

/// Resolve a version, tag or commit to a commit id. With an empty
/// `versionish` the base version of `subjects` is used, and failing to
/// resolve it is not an error.
pub fn resolve_versionish(
    monorepo: &Monorepo,
    subjects: &[&Package],
    versionish: &str,
) -> Result<Baseline> {
    if !versionish.is_empty() {
        return resolve_reference(monorepo, versionish, true);
    }

    let derived = compute_base_version(monorepo.root_pkg.as_ref(), subjects)
        .unwrap_or_default();

    resolve_reference(monorepo, &derived, false)
}

/// Resolve `reference` as `<tag prefix><reference>`, then as a raw ref.
///
/// # Errors
///
/// [`MonorailError::RefNotFound`] when an `explicit` reference resolves to
/// nothing. Derived references that don't resolve mean a first release.
pub fn resolve_reference(
    monorepo: &Monorepo,
    reference: &str,
    explicit: bool,
) -> Result<Baseline> {
    let reference = reference.to_string();

    if reference.is_empty() {
        debug!("no baseline version, treating everything as changed");
        return Ok(Baseline {
            reference,
            commit: None,
        });
    }

    let repo = GitRepo::new(&monorepo.root_dir);
    let prefix = &monorepo.config.tag_version_prefix;

    let mut commit = None;

    if !prefix.is_empty() {
        commit = repo.resolve_tag_commit(&format!("{prefix}{reference}"));
    }

    if commit.is_none() {
        commit = repo.resolve_tag_commit(&reference);
    }

    match &commit {
        Some(c) => debug!("resolved baseline {reference} to {c}"),
        None if explicit => {
            return Err(MonorailError::RefNotFound(reference).into());
        }
        None => {
            info!("baseline {reference} not found, treating as first release")
        }
    }

    Ok(Baseline { reference, commit })
}

//! Pure helpers over the dependency groups of a manifest.
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use strum::{AsRefStr, Display, EnumString};

use crate::{
    error::MonorailError, package::Package, result::Result,
    version::range::{parse_range, satisfies},
};

/// A dependency group key in `package.json`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(serialize_all = "camelCase")]
pub enum DepType {
    Dependencies,
    DevDependencies,
    OptionalDependencies,
    PeerDependencies,
}

impl DepType {
    /// Groups that filtering, merging, health checks and bump rewrites
    /// operate on. Peer dependencies are left alone.
    pub const INSTALLABLE: [DepType; 3] = [
        DepType::Dependencies,
        DepType::DevDependencies,
        DepType::OptionalDependencies,
    ];

    pub const ALL: [DepType; 4] = [
        DepType::Dependencies,
        DepType::DevDependencies,
        DepType::OptionalDependencies,
        DepType::PeerDependencies,
    ];
}

pub type DepGroup = BTreeMap<String, String>;
pub type PkgDeps = BTreeMap<DepType, DepGroup>;

/// What [`filter_deps`] should do with one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Drop,
    Keep,
    /// Keep the entry under a different range.
    Replace(String),
}

impl From<bool> for FilterDecision {
    fn from(keep: bool) -> Self {
        if keep {
            FilterDecision::Keep
        } else {
            FilterDecision::Drop
        }
    }
}

pub fn filter_deps<F>(data: &Value, mut decide: F) -> PkgDeps
where
    F: FnMut(&str, &str) -> FilterDecision,
{
    let mut res = PkgDeps::new();

    for dep_type in DepType::INSTALLABLE {
        let Some(group) = data.get(dep_type.as_ref()).and_then(Value::as_object)
        else {
            continue;
        };

        let mut kept = DepGroup::new();

        for (name, range) in group {
            let Some(range) = range.as_str() else {
                continue;
            };

            match decide(name, range) {
                FilterDecision::Drop => {}
                FilterDecision::Keep => {
                    kept.insert(name.clone(), range.to_string());
                }
                FilterDecision::Replace(new_range) => {
                    kept.insert(name.clone(), new_range);
                }
            }
        }

        if !kept.is_empty() {
            res.insert(dep_type, kept);
        }
    }

    res
}

pub fn whitelist_deps(data: &Value, names: &[&str]) -> PkgDeps {
    let names: HashSet<&str> = names.iter().copied().collect();
    filter_deps(data, |name, _| names.contains(name).into())
}

pub fn blacklist_deps(data: &Value, names: &[&str]) -> PkgDeps {
    let names: HashSet<&str> = names.iter().copied().collect();
    filter_deps(data, |name, _| (!names.contains(name)).into())
}

/// Union two dependency sets group by group. Entries from `b` win.
pub fn merge_deps(a: &PkgDeps, b: &PkgDeps) -> PkgDeps {
    let mut res = a.clone();

    for (dep_type, group) in b {
        res.entry(*dep_type)
            .or_default()
            .extend(group.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    res
}

/// Write `deps` into the matching groups of a manifest, leaving every other
/// entry in place.
pub fn apply_deps(data: &mut Value, deps: &PkgDeps) {
    let Some(obj) = data.as_object_mut() else {
        return;
    };

    for (dep_type, group) in deps {
        let entry = obj
            .entry(dep_type.as_ref())
            .or_insert_with(|| Value::Object(Map::new()));

        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }

        if let Some(target) = entry.as_object_mut() {
            for (name, range) in group {
                target.insert(name.clone(), Value::String(range.clone()));
            }
        }
    }
}

/// Split a `name[@range]` token. Scoped names keep their leading `@`.
pub fn parse_package_arg(token: &str) -> (&str, Option<&str>) {
    match token.rfind('@') {
        Some(at) if at > 0 => (&token[..at], Some(&token[at + 1..])),
        _ => (token, None),
    }
}

#[derive(Debug, Default)]
pub struct ClassifiedArgs<'a> {
    /// Internal packages referenced by the args, in argument order.
    pub internal: Vec<&'a Package>,
    /// Tokens that name no internal package, passed through untouched.
    pub external: Vec<String>,
}

pub fn classify_reference_args<'a>(
    args: &[String],
    inner_by_name: &HashMap<&str, &'a Package>,
) -> Result<ClassifiedArgs<'a>> {
    let mut classified = ClassifiedArgs::default();
    let mut seen = HashSet::new();

    for arg in args {
        let (name, range) = parse_package_arg(arg);

        let Some(pkg) = inner_by_name.get(name).copied() else {
            classified.external.push(arg.clone());
            continue;
        };

        if let (Some(actual), Some(range)) = (pkg.version(), range)
            && !range.is_empty()
            && parse_range(range).is_some()
            && !satisfies(actual, range)
        {
            return Err(MonorailError::InternalReference {
                package: name.to_string(),
                range: range.to_string(),
                actual: actual.to_string(),
            }
            .into());
        }

        if seen.insert(name) {
            classified.internal.push(pkg);
        }
    }

    Ok(classified)
}

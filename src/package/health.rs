//! Pre-flight graph integrity checks, run before anything that mutates
//! dependency state.
use log::*;
use std::collections::HashMap;

use crate::{
    error::MonorailError,
    package::{Package, deps::whitelist_deps},
    result::Result,
    version::range::satisfies,
};

/// Fails when the root references an inner package, or an inner package
/// references another with a range its version doesn't satisfy.
pub fn ensure_health(
    root: Option<&Package>,
    inner_pkgs: &[Package],
    inner_by_name: &HashMap<&str, &Package>,
) -> Result<()> {
    let mut names: Vec<&str> = inner_by_name.keys().copied().collect();
    names.sort_unstable();

    if let Some(root) = root {
        for name in &names {
            let refs = whitelist_deps(root.manifest.data(), &[*name]);

            if let Some(dep_type) = refs.keys().next() {
                return Err(MonorailError::RootInnerReference {
                    dep_type: dep_type.to_string(),
                    package: name.to_string(),
                }
                .into());
            }
        }
    }

    for subject in inner_pkgs {
        for name in &names {
            let target = inner_by_name[name];

            if target.dir == subject.dir {
                continue;
            }

            let refs = whitelist_deps(subject.manifest.data(), &[*name]);

            for group in refs.values() {
                let Some(range) = group.get(*name) else {
                    continue;
                };

                if range == "*" {
                    continue;
                }

                match target.version() {
                    None => {
                        return Err(MonorailError::InnerInnerReference {
                            subject: subject.readable_id(),
                            target: name.to_string(),
                            range: Some(range.clone()),
                            actual: None,
                        }
                        .into());
                    }
                    Some(actual) if !satisfies(actual, range) => {
                        return Err(MonorailError::InnerInnerReference {
                            subject: subject.readable_id(),
                            target: name.to_string(),
                            range: Some(range.clone()),
                            actual: Some(actual.to_string()),
                        }
                        .into());
                    }
                    Some(_) => {}
                }
            }
        }
    }

    debug!("monorepo health check passed");
    Ok(())
}

//! Which packages changed since a baseline version, tag or commit.
use futures_util::future::{BoxFuture, FutureExt, join_all};
use log::*;
use std::path::PathBuf;

use crate::{
    git::tree::RepoNode,
    monorepo::Monorepo,
    package::Package,
    result::Result,
    version::resolve::{Baseline, resolve_versionish},
};

/// Subjects with file changes since `versionish`, in repository order.
///
/// An empty `versionish` derives the baseline from the current versions.
/// When there is no usable baseline every subject counts as changed.
pub async fn changed_since<'a>(
    monorepo: &Monorepo,
    subjects: &[&'a Package],
    versionish: &str,
) -> Result<Vec<&'a Package>> {
    let baseline = resolve_versionish(monorepo, subjects, versionish)?;
    changed_at_baseline(monorepo, subjects, &baseline).await
}

pub async fn changed_at_baseline<'a>(
    monorepo: &Monorepo,
    subjects: &[&'a Package],
    baseline: &Baseline,
) -> Result<Vec<&'a Package>> {
    let Some(commit) = baseline.commit.clone() else {
        return Ok(subjects.to_vec());
    };

    if subjects.is_empty() {
        return Ok(vec![]);
    }

    let tree = RepoNode::build(&monorepo.root_dir, subjects)?;
    let dirs = changed_in_node(&tree, commit).await?;

    debug!(
        "{} of {} packages changed since {}",
        dirs.len(),
        subjects.len(),
        baseline.reference
    );

    Ok(dirs
        .iter()
        .filter_map(|dir| subjects.iter().find(|pkg| &pkg.dir == dir))
        .copied()
        .collect())
}

fn changed_in_node(
    node: &RepoNode,
    commit: String,
) -> BoxFuture<'_, Result<Vec<PathBuf>>> {
    async move {
        let own = join_all(node.packages.iter().map(|pkg| {
            let include = vec![node.rel_path(&pkg.dir)];
            let exclude = node.ignore_paths(pkg);
            let commit = &commit;

            async move {
                let changed = node
                    .repo
                    .has_changes_since(commit, &include, &exclude)
                    .await?;
                Ok::<_, color_eyre::eyre::Report>(
                    changed.then(|| pkg.dir.clone()),
                )
            }
        }));

        let nested = join_all(node.nested.iter().map(|child| {
            let recorded =
                node.repo.submodule_commit(&commit, child.root_dir());

            async move {
                match recorded {
                    Some(sub_commit) => changed_in_node(child, sub_commit).await,
                    None => {
                        debug!(
                            "{} is new since the baseline",
                            child.root_dir().display()
                        );
                        Ok(child.all_package_dirs())
                    }
                }
            }
        }));

        let (own, nested) = tokio::join!(own, nested);

        let mut dirs = vec![];

        for result in own {
            if let Some(dir) = result? {
                dirs.push(dir);
            }
        }

        for result in nested {
            dirs.extend(result?);
        }

        Ok(dirs)
    }
    .boxed()
}

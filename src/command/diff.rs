//! `git diff` over the selected packages, repository by repository.
use futures_util::future::{BoxFuture, FutureExt};
use log::*;

use crate::{
    error::MonorailError,
    git::tree::RepoNode,
    monorepo::Monorepo,
    package::filter::Selection,
    result::Result,
    version::resolve::resolve_versionish,
};

pub async fn execute(
    monorepo: &Monorepo,
    selection: &Selection,
    versionish: Option<&str>,
    git_args: &[String],
) -> Result<()> {
    let subjects = monorepo.select(selection)?;
    let versionish = versionish.unwrap_or_default();

    let baseline = resolve_versionish(monorepo, &subjects, versionish)?;
    let Some(commit) = baseline.commit else {
        return Err(MonorailError::RefNotFound(baseline.reference).into());
    };

    let tree = RepoNode::build(&monorepo.root_dir, &subjects)?;
    diff_node(&tree, commit, git_args).await
}

fn diff_node<'a>(
    node: &'a RepoNode,
    commit: String,
    git_args: &'a [String],
) -> BoxFuture<'a, Result<()>> {
    async move {
        if !node.packages.is_empty() {
            let include: Vec<String> =
                node.packages.iter().map(|p| node.rel_path(&p.dir)).collect();
            let exclude: Vec<String> = node
                .packages
                .iter()
                .flat_map(|p| node.ignore_paths(p))
                .collect();

            let args: Vec<String> = std::iter::once(commit.clone())
                .chain(git_args.iter().cloned())
                .collect();

            node.repo.run_diff(&include, &exclude, &args).await?;
        }

        for child in &node.nested {
            match node.repo.submodule_commit(&commit, child.root_dir()) {
                Some(sub_commit) => diff_node(child, sub_commit, git_args).await?,
                None => info!(
                    "{} did not exist at {commit}, nothing to diff against",
                    child.root_dir().display()
                ),
            }
        }

        Ok(())
    }
    .boxed()
}

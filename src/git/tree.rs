//! The tree of repositories a set of packages lives in: the monorepo root
//! repository and any submodules nested inside it.
use log::*;
use std::path::{Path, PathBuf};

use crate::{
    error::MonorailError,
    git::repo::{GitRepo, is_repo_root},
    package::Package,
    path_helpers::to_slash,
    result::Result,
};

/// The slice of a package that repository operations need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPackage {
    pub dir: PathBuf,
    pub manifest_path: PathBuf,
    /// Relative to `dir`.
    pub ignore_files: Vec<String>,
}

impl From<&Package> for RepoPackage {
    fn from(pkg: &Package) -> Self {
        Self {
            dir: pkg.dir.clone(),
            manifest_path: pkg.manifest.path().to_path_buf(),
            ignore_files: pkg.ignore_files().to_vec(),
        }
    }
}

/// A repository, the packages it owns directly and its nested repositories.
/// Packages inside a nested repository belong to that node only.
#[derive(Debug, Clone)]
pub struct RepoNode {
    pub repo: GitRepo,
    pub packages: Vec<RepoPackage>,
    pub nested: Vec<RepoNode>,
}

impl RepoNode {
    /// Build the tree rooted at `root` and hand every package to the
    /// innermost repository containing it.
    ///
    /// # Errors
    ///
    /// [`MonorailError::NoRepoRoot`] when `root` is not the top directory of
    /// a git repository.
    pub fn build(root: &Path, packages: &[&Package]) -> Result<Self> {
        if !is_repo_root(root) {
            return Err(MonorailError::NoRepoRoot(root.to_path_buf()).into());
        }

        let mut node = Self::skeleton(root)?;

        let mut packages: Vec<RepoPackage> =
            packages.iter().map(|pkg| RepoPackage::from(*pkg)).collect();
        packages.sort_by(|a, b| a.dir.cmp(&b.dir));

        for pkg in packages {
            node.assign(pkg);
        }

        Ok(node)
    }

    fn skeleton(root: &Path) -> Result<Self> {
        let repo = GitRepo::new(root);
        let mut nested = vec![];

        for dir in repo.list_nested_repositories()? {
            if is_repo_root(&dir) {
                nested.push(Self::skeleton(&dir)?);
            } else {
                debug!("skipping uninitialized submodule {}", dir.display());
            }
        }

        Ok(Self {
            repo,
            packages: vec![],
            nested,
        })
    }

    fn assign(&mut self, pkg: RepoPackage) {
        if let Some(child) = self
            .nested
            .iter_mut()
            .find(|n| pkg.dir.starts_with(n.root_dir()))
        {
            child.assign(pkg);
        } else {
            self.packages.push(pkg);
        }
    }

    pub fn root_dir(&self) -> &Path {
        self.repo.root_dir()
    }

    /// `path` relative to this repository's root, forward slashes.
    pub fn rel_path(&self, path: &Path) -> String {
        let rel = path.strip_prefix(self.root_dir()).unwrap_or(path);
        let rel = to_slash(rel);

        if rel.is_empty() { ".".to_string() } else { rel }
    }

    /// Ignore paths of `pkg` expressed relative to this repository's root.
    pub fn ignore_paths(&self, pkg: &RepoPackage) -> Vec<String> {
        pkg.ignore_files
            .iter()
            .map(|ignore| self.rel_path(&pkg.dir.join(ignore)))
            .collect()
    }

    /// Every package dir in this node and its nested nodes.
    pub fn all_package_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> =
            self.packages.iter().map(|p| p.dir.clone()).collect();

        for nested in &self.nested {
            dirs.extend(nested.all_package_dirs());
        }

        dirs
    }
}

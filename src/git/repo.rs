//! Version-control operations scoped to a single repository directory.
//!
//! Read-only queries (repository roots, tag lookup, submodules and the
//! gitlink recorded for a submodule at a commit) go through `git2`.
//! Anything that writes to the index, runs hooks, signs, or relies on
//! pathspec magic shells out to the `git` binary so it behaves exactly like
//! the user's git would.
use log::*;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::process::Command;

use crate::{error::MonorailError, result::Result};

/// A git repository rooted at `root_dir`.
///
/// Write operations against one `GitRepo` must be awaited one at a time:
/// the index is a single shared file and concurrent writers corrupt it.
/// Operations on different repositories may overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRepo {
    root_dir: PathBuf,
}

impl GitRepo {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Run `git <args>` in the repository root and return stdout.
    ///
    /// # Errors
    ///
    /// Returns [`MonorailError::VcsCommand`] carrying stderr when git exits
    /// non-zero.
    pub async fn exec(&self, args: &[String]) -> Result<String> {
        debug!("git {} (in {})", args.join(" "), self.root_dir.display());

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root_dir)
            .output()
            .await?;

        if !output.status.success() {
            return Err(MonorailError::vcs(
                args.first().cloned().unwrap_or_default(),
                &self.root_dir,
                String::from_utf8_lossy(&output.stderr).trim(),
            )
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Like [`GitRepo::exec`] but streams output straight to the terminal.
    pub async fn exec_live(&self, args: &[String]) -> Result<()> {
        debug!("git {} (live, in {})", args.join(" "), self.root_dir.display());

        let status = Command::new("git")
            .args(args)
            .current_dir(&self.root_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;

        if !status.success() {
            return Err(MonorailError::vcs(
                args.first().cloned().unwrap_or_default(),
                &self.root_dir,
                format!("exited with {status}"),
            )
            .into());
        }

        Ok(())
    }

    pub async fn add_file(&self, path: &Path) -> Result<()> {
        let mut args = owned(["add", "--"]);
        args.push(path.to_string_lossy().into_owned());
        self.exec(&args).await?;
        Ok(())
    }

    pub async fn reset_file(&self, path: &Path) -> Result<()> {
        let mut args = owned(["reset", "-q", "--"]);
        args.push(path.to_string_lossy().into_owned());
        self.exec(&args).await?;
        Ok(())
    }

    pub async fn commit(
        &self,
        message: &str,
        run_hooks: bool,
        extra_args: &[String],
    ) -> Result<()> {
        let mut args = owned(["commit", "-m", message]);

        if !run_hooks {
            args.push("--no-verify".into());
        }

        args.extend(extra_args.iter().cloned());

        self.exec(&args).await?;
        Ok(())
    }

    /// Create an annotated tag, or a signed one when `sign` is set.
    pub async fn create_tag(
        &self,
        name: &str,
        message: &str,
        sign: bool,
    ) -> Result<()> {
        let kind = if sign { "-s" } else { "-a" };
        self.exec(&owned(["tag", kind, name, "-m", message])).await?;
        Ok(())
    }

    /// True when tracked files have uncommitted changes.
    pub async fn is_dirty(&self) -> Result<bool> {
        let output = self
            .exec(&owned(["status", "--porcelain", "--untracked-files=no"]))
            .await?;
        Ok(!output.trim().is_empty())
    }

    /// True when any file under `include` (minus `exclude`) differs between
    /// `commit` and the working tree. Both lists are relative to the root.
    pub async fn has_changes_since(
        &self,
        commit: &str,
        include: &[String],
        exclude: &[String],
    ) -> Result<bool> {
        let mut args =
            owned(["diff", commit, "--name-only", "--ignore-submodules"]);
        args.push("--".into());
        args.extend(pathspecs(include, exclude));

        let output = self.exec(&args).await?;
        Ok(!output.trim().is_empty())
    }

    /// Pass-through `git diff` limited to `include` minus `exclude`.
    pub async fn run_diff(
        &self,
        include: &[String],
        exclude: &[String],
        git_args: &[String],
    ) -> Result<()> {
        let mut args = owned(["diff"]);
        args.extend(git_args.iter().cloned());
        args.push("--".into());
        args.extend(pathspecs(include, exclude));

        self.exec_live(&args).await
    }

    /// Commit a tag (or any revision) points at, `None` when it doesn't
    /// resolve.
    pub fn resolve_tag_commit(&self, name: &str) -> Option<String> {
        let repo = git2::Repository::open(&self.root_dir).ok()?;
        let object = repo.revparse_single(&format!("{name}^{{}}")).ok()?;
        let commit = object.peel_to_commit().ok()?;
        Some(commit.id().to_string())
    }

    /// Commit recorded for the submodule at `sub_dir` in this repository's
    /// tree at `parent_commit`. `None` when the submodule didn't exist yet.
    pub fn submodule_commit(
        &self,
        parent_commit: &str,
        sub_dir: &Path,
    ) -> Option<String> {
        let repo = git2::Repository::open(&self.root_dir).ok()?;
        let commit = repo
            .revparse_single(parent_commit)
            .ok()?
            .peel_to_commit()
            .ok()?;
        let tree = commit.tree().ok()?;
        let rel = sub_dir.strip_prefix(&self.root_dir).unwrap_or(sub_dir);
        let entry = tree.get_path(rel).ok()?;

        if entry.kind() != Some(git2::ObjectType::Commit) {
            return None;
        }

        Some(entry.id().to_string())
    }

    /// Absolute roots of the submodules registered in this repository.
    pub fn list_nested_repositories(&self) -> Result<Vec<PathBuf>> {
        let repo = git2::Repository::open(&self.root_dir)?;

        let mut dirs: Vec<PathBuf> = repo
            .submodules()?
            .iter()
            .map(|sub| self.root_dir.join(sub.path()))
            .collect();

        dirs.sort();
        Ok(dirs)
    }
}

/// Working directory root of the repository containing `dir`.
pub fn repo_root_of(dir: &Path) -> Option<PathBuf> {
    let repo = git2::Repository::discover(dir).ok()?;
    let workdir = repo.workdir()?;
    Some(canonical(workdir))
}

/// True when `dir` is itself the working directory root of a repository.
pub fn is_repo_root(dir: &Path) -> bool {
    repo_root_of(dir).is_some_and(|root| root == canonical(dir))
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn pathspecs(include: &[String], exclude: &[String]) -> Vec<String> {
    let mut specs: Vec<String> = if include.is_empty() {
        vec![".".into()]
    } else {
        include.iter().map(|p| format!(":{p}")).collect()
    };

    specs.extend(exclude.iter().map(|p| format!(":!{p}")));
    specs
}

fn owned<const N: usize>(args: [&str; N]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

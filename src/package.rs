//! Packages living in the monorepo and their `package.json` manifests.
pub mod deps;
pub mod filter;
pub mod health;
pub mod manifest;

use color_eyre::eyre::WrapErr;
use serde_json::Value;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{
    error::MonorailError,
    package::manifest::{MANIFEST_FILE, Manifest},
    result::Result,
};

/// Extra information carried only by packages that are not the monorepo
/// root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerPackage {
    /// Package directory relative to the monorepo root, forward slashes.
    pub rel_dir: String,
    /// Absolute directory the package is published from, when it differs
    /// from the package directory.
    pub dist_dir: Option<PathBuf>,
    /// Paths relative to the package directory excluded from change
    /// detection. Includes the dist dir when one is configured.
    pub ignore_files: Vec<String>,
}

impl InnerPackage {
    pub fn new(
        dir: &Path,
        rel_dir: impl Into<String>,
        dist_dir: Option<&str>,
        ignore_files: Vec<String>,
    ) -> Self {
        let dist_dir = dist_dir
            .filter(|d| !d.is_empty())
            .map(|d| dir.join(d))
            .filter(|d| d != dir);

        let mut ignore_files = ignore_files;

        if let Some(dist) = &dist_dir
            && let Ok(rel) = dist.strip_prefix(dir)
        {
            ignore_files.push(crate::path_helpers::to_slash(rel));
        }

        Self {
            rel_dir: rel_dir.into(),
            dist_dir,
            ignore_files,
        }
    }
}

/// A directory with a `package.json`.
#[derive(Debug, Clone)]
pub struct Package {
    pub dir: PathBuf,
    pub manifest: Manifest,
    /// Extra arguments appended to package-manager commands run here.
    pub npm_client_args: Vec<String>,
    /// Present for every package except the monorepo root.
    pub inner: Option<InnerPackage>,
}

impl Package {
    pub async fn load(
        dir: impl Into<PathBuf>,
        npm_client_args: Vec<String>,
        inner: Option<InnerPackage>,
    ) -> Result<Self> {
        let dir = dir.into();
        let manifest = Manifest::load(dir.join(MANIFEST_FILE)).await?;

        Ok(Self {
            dir,
            manifest,
            npm_client_args,
            inner,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.manifest.name()
    }

    pub fn version(&self) -> Option<&str> {
        self.manifest.version()
    }

    pub fn is_root(&self) -> bool {
        self.inner.is_none()
    }

    pub fn ignore_files(&self) -> &[String] {
        self.inner
            .as_ref()
            .map(|i| i.ignore_files.as_slice())
            .unwrap_or_default()
    }

    /// Human readable identifier: the name, else the relative directory,
    /// else "root".
    pub fn readable_id(&self) -> String {
        if let Some(name) = self.name() {
            return name.to_string();
        }

        match &self.inner {
            Some(inner) => inner.rel_dir.clone(),
            None => "root".to_string(),
        }
    }

    /// Directory `npm publish` should run in.
    pub fn publish_dir(&self) -> &Path {
        self.inner
            .as_ref()
            .and_then(|i| i.dist_dir.as_deref())
            .unwrap_or(&self.dir)
    }

    /// The manifest that will actually be published: the dist dir's copy
    /// when one is configured.
    pub async fn publish_data(&self) -> Result<Value> {
        let Some(dist_dir) =
            self.inner.as_ref().and_then(|i| i.dist_dir.as_ref())
        else {
            return Ok(self.manifest.data().clone());
        };

        let path = dist_dir.join(MANIFEST_FILE);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| MonorailError::MissingDistManifest(self.readable_id()))?;

        serde_json::from_str(&text)
            .wrap_err_with(|| format!("invalid json in {}", path.display()))
    }
}

/// Index named packages by name, failing on collisions.
pub fn hash_by_name<'a, I>(pkgs: I) -> Result<HashMap<&'a str, &'a Package>>
where
    I: IntoIterator<Item = &'a Package>,
{
    let mut by_name = HashMap::new();

    for pkg in pkgs {
        if let Some(name) = pkg.name()
            && by_name.insert(name, pkg).is_some()
        {
            return Err(MonorailError::DuplicatePackageName(name.into()).into());
        }
    }

    Ok(by_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_json;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn dist_dir_is_added_to_ignore_files() {
        let dir = Path::new("/repo/packages/core");
        let inner = InnerPackage::new(
            dir,
            "packages/core",
            Some("dist"),
            vec!["*.log".into()],
        );

        assert_eq!(inner.dist_dir, Some(dir.join("dist")));
        assert_eq!(inner.ignore_files, vec!["*.log", "dist"]);
    }

    #[test]
    fn dist_dir_equal_to_package_dir_is_ignored() {
        let dir = Path::new("/repo/packages/core");
        let inner = InnerPackage::new(dir, "packages/core", Some(""), vec![]);
        assert!(inner.dist_dir.is_none());
        assert!(inner.ignore_files.is_empty());
    }

    #[tokio::test]
    async fn readable_id_falls_back_to_rel_dir_then_root() {
        let tmp = TempDir::new().unwrap();
        write_json(&tmp.path().join("package.json"), &json!({}));
        write_json(&tmp.path().join("a/package.json"), &json!({}));

        let root = Package::load(tmp.path(), vec![], None).await.unwrap();
        let inner = Package::load(
            tmp.path().join("a"),
            vec![],
            Some(InnerPackage::new(&tmp.path().join("a"), "a", None, vec![])),
        )
        .await
        .unwrap();

        assert_eq!(root.readable_id(), "root");
        assert_eq!(inner.readable_id(), "a");
    }

    #[tokio::test]
    async fn hash_by_name_rejects_collisions() {
        let tmp = TempDir::new().unwrap();
        write_json(&tmp.path().join("a/package.json"), &json!({"name": "x"}));
        write_json(&tmp.path().join("b/package.json"), &json!({"name": "x"}));

        let a = Package::load(tmp.path().join("a"), vec![], None)
            .await
            .unwrap();
        let b = Package::load(tmp.path().join("b"), vec![], None)
            .await
            .unwrap();

        let err = hash_by_name([&a, &b]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MonorailError>(),
            Some(MonorailError::DuplicatePackageName(name)) if name == "x"
        ));
    }
}

//! Discovery and loading of the monorepo: config, root package and inner
//! packages.
use color_eyre::eyre::WrapErr;
use futures_util::future::join_all;
use log::*;
use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
};

use crate::{
    config::{Config, find_config, package::ResolvedPackageConfig},
    error::MonorailError,
    npm::NpmClient,
    package::{
        InnerPackage, Package,
        filter::{Selection, filter_packages},
        hash_by_name,
        health::ensure_health,
        manifest::MANIFEST_FILE,
    },
    path_helpers::relative_to,
    result::Result,
};

/// Everything known about the monorepo for one invocation.
#[derive(Debug)]
pub struct Monorepo {
    /// Directory holding the config file, canonicalized.
    pub root_dir: PathBuf,
    pub root_pkg: Option<Package>,
    /// Sorted by directory.
    pub inner_pkgs: Vec<Package>,
    pub npm_client: NpmClient,
    pub config: Config,
}

impl Monorepo {
    /// Find the config at or above `cwd` and load every package it lists.
    pub async fn load(cwd: &Path) -> Result<Self> {
        let config_path = find_config(cwd)
            .await
            .ok_or_else(|| MonorailError::MissingConfig(cwd.to_path_buf()))?;

        let config = Config::load(&config_path).await?;

        let root_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf());
        let root_dir = tokio::fs::canonicalize(&root_dir)
            .await
            .wrap_err_with(|| format!("failed to resolve {}", root_dir.display()))?;

        info!("monorepo root: {}", root_dir.display());

        let root_pkg = load_root_package(&root_dir, &config).await?;
        let inner_pkgs = load_inner_packages(&root_dir, &config).await?;

        hash_by_name(inner_pkgs.iter())?;

        Ok(Self {
            root_dir,
            root_pkg,
            inner_pkgs,
            npm_client: config.npm_client,
            config,
        })
    }

    pub fn inner_by_name(&self) -> Result<HashMap<&str, &Package>> {
        hash_by_name(self.inner_pkgs.iter())
    }

    /// Inner packages chosen by the global package flags.
    pub fn select(&self, selection: &Selection) -> Result<Vec<&Package>> {
        filter_packages(&self.inner_pkgs, selection)
    }

    pub fn ensure_health(&self) -> Result<()> {
        ensure_health(
            self.root_pkg.as_ref(),
            &self.inner_pkgs,
            &self.inner_by_name()?,
        )
    }

    /// The root package (if any) followed by every inner package.
    pub fn all_packages(&self) -> impl Iterator<Item = &Package> {
        self.root_pkg.iter().chain(self.inner_pkgs.iter())
    }
}

async fn load_root_package(
    root_dir: &Path,
    config: &Config,
) -> Result<Option<Package>> {
    let manifest = root_dir.join(MANIFEST_FILE);

    if !tokio::fs::try_exists(&manifest).await.unwrap_or(false) {
        debug!("no root {MANIFEST_FILE}");
        return Ok(None);
    }

    Package::load(root_dir, config.npm_client_args.clone(), None)
        .await
        .map(Some)
}

async fn load_inner_packages(
    root_dir: &Path,
    config: &Config,
) -> Result<Vec<Package>> {
    let mut seen = BTreeSet::new();
    let mut to_load = vec![];

    for entry in &config.packages {
        let resolved = entry.resolve(config);

        for dir in expand_package_path(root_dir, &resolved)? {
            if dir != root_dir && seen.insert(dir.clone()) {
                to_load.push((dir, resolved.clone()));
            }
        }
    }

    let loaded = join_all(to_load.into_iter().map(|(dir, resolved)| async move {
        let rel_dir = relative_to(&dir, root_dir).unwrap_or_else(|| resolved.path.clone());
        let inner = InnerPackage::new(
            &dir,
            rel_dir,
            resolved.dist_dir.as_deref(),
            resolved.ignore_files.clone(),
        );
        Package::load(&dir, resolved.npm_client_args.clone(), Some(inner)).await
    }))
    .await;

    let mut pkgs = loaded.into_iter().collect::<Result<Vec<_>>>()?;
    pkgs.sort_by(|a, b| a.dir.cmp(&b.dir));

    debug!("loaded {} inner packages", pkgs.len());
    Ok(pkgs)
}

/// Directories an entry refers to. Literal paths must exist, glob matches
/// without a manifest are skipped.
fn expand_package_path(
    root_dir: &Path,
    resolved: &ResolvedPackageConfig,
) -> Result<Vec<PathBuf>> {
    let pattern = root_dir.join(&resolved.path);

    if !is_glob(&resolved.path) {
        if !pattern.join(MANIFEST_FILE).is_file() {
            return Err(
                MonorailError::ManifestNotFound(pattern.join(MANIFEST_FILE))
                    .into(),
            );
        }
        return Ok(vec![normalize(&pattern)]);
    }

    let matches = glob::glob(&pattern.to_string_lossy()).map_err(|err| {
        MonorailError::invalid_config(format!(
            "bad package glob '{}': {err}",
            resolved.path
        ))
    })?;

    let mut dirs = vec![];

    for path in matches {
        let path = path?;
        if path.join(MANIFEST_FILE).is_file() {
            dirs.push(normalize(&path));
        } else {
            debug!("skipping {} without {MANIFEST_FILE}", path.display());
        }
    }

    dirs.sort();
    Ok(dirs)
}

fn is_glob(path: &str) -> bool {
    path.contains(['*', '?', '[', '{'])
}

fn normalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

//! Configuration loading and parsing for `monorepo.toml` / `monorepo.json`.
//!
//! The config file marks the monorepo root. It is found by walking up from
//! the working directory, and lists the inner packages plus defaults that
//! every package and the `version` command inherit.
use color_eyre::eyre::WrapErr;
use log::*;
use serde::{Deserialize, Deserializer};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{
    config::package::PackageEntry, error::MonorailError, npm::NpmClient,
    result::Result,
};

pub mod package;
pub mod version;

/// Config filenames, in lookup order.
pub const CONFIG_FILES: [&str; 2] = ["monorepo.toml", "monorepo.json"];

pub const DEFAULT_TAG_PREFIX: &str = "v";

/// Accepts either a single value or a list in config files.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

pub(crate) fn one_or_many<'de, D, T>(
    deserializer: D,
) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(item) => vec![item],
        OneOrMany::Many(items) => items,
    })
}

/// Per-command package manager settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandConfig {
    /// Extra arguments passed to the package manager for this command
    #[serde(alias = "npm_client_args")]
    pub npm_client_args: Vec<String>,
}

/// Defaults for the `version` command. CLI flags override these.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VersionDefaults {
    /// Commit and tag after bumping (default: true)
    #[serde(alias = "git_tag_version")]
    pub git_tag_version: bool,
    /// Run git commit hooks (default: true)
    #[serde(alias = "commit_hooks")]
    pub commit_hooks: bool,
    /// Create signed tags (default: false)
    #[serde(alias = "sign_git_tag")]
    pub sign_git_tag: bool,
    /// Commit message template, `%s` is replaced by the new version
    pub message: Option<String>,
}

impl Default for VersionDefaults {
    fn default() -> Self {
        Self {
            git_tag_version: true,
            commit_hooks: true,
            sign_git_tag: false,
            message: None,
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Inner packages: directories or globs relative to the root.
    #[serde(deserialize_with = "one_or_many")]
    pub packages: Vec<PackageEntry>,
    /// Publish directory, relative to each package, inherited by packages.
    #[serde(alias = "dist_dir")]
    pub dist_dir: Option<String>,
    /// Package-relative paths ignored by change detection, inherited.
    #[serde(alias = "ignore_files", deserialize_with = "one_or_many")]
    pub ignore_files: Vec<String>,
    /// `npm` (default) or `yarn`.
    #[serde(alias = "npm_client")]
    pub npm_client: NpmClient,
    /// Extra package manager arguments, inherited by packages.
    #[serde(alias = "npm_client_args")]
    pub npm_client_args: Vec<String>,
    /// Per-command settings keyed by command name, e.g. `publish`.
    pub commands: HashMap<String, CommandConfig>,
    /// Prefix of version tags (default: "v").
    #[serde(alias = "tag_version_prefix")]
    pub tag_version_prefix: String,
    pub version: VersionDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            packages: vec![],
            dist_dir: None,
            ignore_files: vec![],
            npm_client: NpmClient::default(),
            npm_client_args: vec![],
            commands: HashMap::new(),
            tag_version_prefix: DEFAULT_TAG_PREFIX.into(),
            version: VersionDefaults::default(),
        }
    }
}

impl Config {
    /// Parse a config file, picking the format from its extension.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|err| {
                MonorailError::invalid_config(format!(
                    "{}: {err}",
                    path.display()
                ))
            })?,
            _ => toml::from_str(&content).map_err(|err| {
                MonorailError::invalid_config(format!(
                    "{}: {err}",
                    path.display()
                ))
            })?,
        };

        Ok(config)
    }

    /// Package manager args configured for one command.
    pub fn command_npm_args(&self, command: &str) -> &[String] {
        self.commands
            .get(command)
            .map(|c| c.npm_client_args.as_slice())
            .unwrap_or_default()
    }
}

/// Walk up from `start` to the first directory holding a config file.
pub async fn find_config(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        for name in CONFIG_FILES {
            let candidate = dir.join(name);
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                debug!("found config at {}", candidate.display());
                return Some(candidate);
            }
        }
    }

    None
}

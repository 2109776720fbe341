use derive_builder::Builder;
use serde::Deserialize;

use crate::config::{Config, one_or_many};

/// Inner package entry that accepts either a string path or full settings.
/// Paths may be globs and are resolved relative to the monorepo root.
///
/// # Examples
///
/// Simple string paths:
/// ```toml
/// packages = ["packages/*", "tools/cli"]
/// ```
///
/// Full settings for a package that publishes from its build output:
/// ```toml
/// packages = [
///     "packages/*",
///     { path = "apps/web", dist_dir = "build", ignore_files = "*.log" }
/// ]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PackageEntry {
    /// Simple string path, inherits every root setting
    Path(String),
    /// Path plus settings layered over the root's
    Full(PackageSettings),
}

/// Settings an inner package entry may override.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PackageSettings {
    pub path: String,
    #[serde(alias = "dist_dir")]
    pub dist_dir: Option<String>,
    #[serde(alias = "ignore_files", deserialize_with = "one_or_many")]
    pub ignore_files: Vec<String>,
    #[serde(alias = "npm_client_args")]
    pub npm_client_args: Vec<String>,
}

/// Settings of one package entry after root inheritance was applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
#[builder(setter(into), default)]
pub struct ResolvedPackageConfig {
    /// Path or glob relative to the monorepo root
    pub path: String,
    /// Own dist dir, else the root's
    pub dist_dir: Option<String>,
    /// Root ignore files followed by the package's
    pub ignore_files: Vec<String>,
    /// Root args followed by the package's
    pub npm_client_args: Vec<String>,
}

impl PackageEntry {
    pub fn resolve(&self, root: &Config) -> ResolvedPackageConfig {
        let settings = match self {
            PackageEntry::Path(path) => PackageSettings {
                path: path.clone(),
                ..Default::default()
            },
            PackageEntry::Full(settings) => settings.clone(),
        };

        ResolvedPackageConfig {
            path: settings.path,
            dist_dir: settings
                .dist_dir
                .filter(|d| !d.is_empty())
                .or_else(|| root.dist_dir.clone()),
            ignore_files: root
                .ignore_files
                .iter()
                .chain(settings.ignore_files.iter())
                .cloned()
                .collect(),
            npm_client_args: root
                .npm_client_args
                .iter()
                .chain(settings.npm_client_args.iter())
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct TestConfig {
        packages: Vec<PackageEntry>,
    }

    #[test]
    fn deserializes_mixed_format() {
        let toml = r#"
            packages = [
                "packages/*",
                { path = "apps/web", dist_dir = "build", ignore_files = "*.log" }
            ]
        "#;

        let config: TestConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.packages.len(), 2);
        assert!(matches!(&config.packages[0], PackageEntry::Path(p) if p == "packages/*"));

        let PackageEntry::Full(settings) = &config.packages[1] else {
            panic!("expected full settings");
        };
        assert_eq!(settings.path, "apps/web");
        assert_eq!(settings.dist_dir.as_deref(), Some("build"));
        assert_eq!(settings.ignore_files, vec!["*.log"]);
    }

    #[test]
    fn resolve_inherits_root_settings() {
        let root = Config {
            dist_dir: Some("dist".into()),
            ignore_files: vec!["*.md".into()],
            npm_client_args: vec!["--silent".into()],
            ..Default::default()
        };

        let resolved = PackageEntry::Path("packages/core".into()).resolve(&root);

        assert_eq!(
            resolved,
            ResolvedPackageConfigBuilder::default()
                .path("packages/core")
                .dist_dir(Some("dist".to_string()))
                .ignore_files(vec!["*.md".to_string()])
                .npm_client_args(vec!["--silent".to_string()])
                .build()
                .unwrap()
        );
    }

    #[test]
    fn resolve_layers_package_settings_over_root() {
        let root = Config {
            dist_dir: Some("dist".into()),
            ignore_files: vec!["*.md".into()],
            npm_client_args: vec!["--silent".into()],
            ..Default::default()
        };

        let entry = PackageEntry::Full(PackageSettings {
            path: "apps/web".into(),
            dist_dir: Some("build".into()),
            ignore_files: vec!["*.log".into()],
            npm_client_args: vec!["--access=public".into()],
        });

        let resolved = entry.resolve(&root);

        assert_eq!(resolved.dist_dir.as_deref(), Some("build"));
        assert_eq!(resolved.ignore_files, vec!["*.md", "*.log"]);
        assert_eq!(resolved.npm_client_args, vec!["--silent", "--access=public"]);
    }
}

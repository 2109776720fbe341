use derive_builder::Builder;

use crate::{
    config::{Config, DEFAULT_TAG_PREFIX},
    version::resolve::VersionSpecifier,
};

/// Placeholder replaced by the new version in commit messages.
pub const VERSION_PLACEHOLDER: &str = "%s";

/// Everything the `version` command needs to know about how to bump,
/// commit and tag. Config file defaults come first, CLI flags override.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(setter(into), default)]
pub struct VersionConfig {
    pub specifier: VersionSpecifier,
    /// Commit and tag after writing manifests
    pub git_tag_enabled: bool,
    /// Skip the clean working tree check
    pub force: bool,
    /// Commit message, `%s` is replaced by the new version
    pub message: String,
    pub tag_prefix: String,
    pub sign_tag: bool,
    pub commit_hooks: bool,
    /// Extra arguments passed to `git commit`
    pub commit_args: Vec<String>,
    /// Skip preversion/version/postversion
    pub ignore_scripts: bool,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            specifier: VersionSpecifier::default(),
            git_tag_enabled: true,
            force: false,
            message: VERSION_PLACEHOLDER.into(),
            tag_prefix: DEFAULT_TAG_PREFIX.into(),
            sign_tag: false,
            commit_hooks: true,
            commit_args: vec![],
            ignore_scripts: false,
        }
    }
}

impl VersionConfig {
    /// A builder seeded with the defaults from the config file.
    pub fn builder(config: &Config) -> VersionConfigBuilder {
        let defaults = &config.version;
        let mut builder = VersionConfigBuilder::default();

        builder
            .git_tag_enabled(defaults.git_tag_version)
            .commit_hooks(defaults.commit_hooks)
            .sign_tag(defaults.sign_git_tag)
            .tag_prefix(config.tag_version_prefix.clone())
            .message(
                defaults
                    .message
                    .clone()
                    .unwrap_or_else(|| VERSION_PLACEHOLDER.into()),
            );

        builder
    }

    pub fn commit_message(&self, version: &str) -> String {
        self.message.replace(VERSION_PLACEHOLDER, version)
    }

    pub fn tag_name(&self, version: &str) -> String {
        format!("{}{version}", self.tag_prefix)
    }
}

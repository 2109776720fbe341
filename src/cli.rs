//! CLI argument parsing.
use clap::{Parser, Subcommand};

use crate::{
    config::{Config, version::VersionConfig},
    error::MonorailError,
    package::filter::Selection,
    result::Result,
    version::resolve::VersionSpecifier,
};

/// Global CLI arguments for package selection and debugging.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(long, default_value_t = false, global = true)]
    /// Enable debug logging.
    pub debug: bool,

    #[arg(long, value_delimiter = ',', global = true)]
    /// Only these packages: names (optionally `name@range`) or directories
    /// relative to the monorepo root.
    pub pkgs: Vec<String>,

    #[arg(long, value_delimiter = ',', global = true)]
    /// Only packages whose name or directory matches one of these globs.
    pub filter_pkgs: Vec<String>,

    #[arg(long, value_delimiter = ',', global = true)]
    /// Skip packages whose name or directory matches one of these globs.
    pub exclude_pkgs: Vec<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn selection(&self) -> Selection {
        Selection {
            explicit: self.pkgs.clone(),
            filters: self.filter_pkgs.clone(),
            excludes: self.exclude_pkgs.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the selected packages.
    List,

    /// Verify that internal dependency ranges match package versions.
    Check,

    /// List packages changed since a version, tag or commit. Defaults to
    /// the current version.
    Changed {
        versionish: Option<String>,
    },

    /// Run `git diff` over the selected packages since a version, tag or
    /// commit.
    Diff {
        versionish: Option<String>,

        #[arg(last = true)]
        /// Extra arguments for `git diff`.
        git_args: Vec<String>,
    },

    /// Bump the version of changed packages and everything depending on
    /// them, then commit and tag.
    Version(VersionArgs),

    /// Publish the selected packages that are at the current version.
    Publish {
        #[arg(long, short, default_value_t = false)]
        /// Don't ask for confirmation.
        yes: bool,

        #[arg(last = true)]
        /// Extra arguments for the package manager.
        npm_args: Vec<String>,
    },
}

#[derive(clap::Args, Debug, Default, Clone)]
pub struct VersionArgs {
    /// major, minor, patch, premajor, preminor, prepatch, prerelease or an
    /// exact version. Defaults to patch.
    pub specifier: Option<String>,

    #[arg(long, short, default_value_t = false)]
    /// Don't ask for confirmation.
    pub yes: bool,

    #[arg(long, default_value_t = false)]
    /// Bump every selected package, changed or not.
    pub all_pkgs: bool,

    #[arg(long, default_value_t = false)]
    /// Only write manifests, don't commit or tag.
    pub no_git_tag_version: bool,

    #[arg(long, default_value_t = false)]
    /// Allow a dirty working tree.
    pub force: bool,

    #[arg(long, short)]
    /// Commit message, `%s` is replaced by the new version.
    pub message: Option<String>,

    #[arg(long, default_value_t = false)]
    /// Create signed tags.
    pub sign_git_tag: bool,

    #[arg(long, default_value_t = false)]
    /// Skip git commit hooks.
    pub no_commit_hooks: bool,

    #[arg(long, default_value_t = false)]
    /// Skip preversion, version and postversion scripts.
    pub ignore_scripts: bool,

    #[arg(long)]
    /// Prerelease identifier, e.g. `beta` for 1.2.0-beta.0.
    pub preid: Option<String>,

    #[arg(long)]
    /// Prefix for version tags, overrides the config file.
    pub tag_version_prefix: Option<String>,

    #[arg(last = true)]
    /// Extra arguments for `git commit`.
    pub commit_args: Vec<String>,
}

impl VersionArgs {
    /// Layer these flags over the config file's version defaults.
    pub fn to_config(&self, config: &Config) -> Result<VersionConfig> {
        let specifier = match &self.specifier {
            Some(raw) => VersionSpecifier::parse(raw, self.preid.clone())?,
            None => VersionSpecifier::default(),
        };

        let mut builder = VersionConfig::builder(config);

        builder
            .specifier(specifier)
            .force(self.force)
            .ignore_scripts(self.ignore_scripts)
            .commit_args(self.commit_args.clone());

        if self.no_git_tag_version {
            builder.git_tag_enabled(false);
        }

        if self.no_commit_hooks {
            builder.commit_hooks(false);
        }

        if self.sign_git_tag {
            builder.sign_tag(true);
        }

        if let Some(message) = &self.message {
            builder.message(message.clone());
        }

        if let Some(prefix) = &self.tag_version_prefix {
            builder.tag_prefix(prefix.clone());
        }

        builder.build().map_err(|e| {
            MonorailError::invalid_config(format!(
                "failed to build version config: {e}"
            ))
            .into()
        })
    }
}

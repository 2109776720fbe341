//! Custom error types for Monorail with improved type safety and error handling.
//!
//! Every variant here is a "known" failure: `main` prints it as a concise
//! one-line message. Anything else that bubbles up through
//! [`crate::result::Result`] is treated as an unexpected internal error and
//! rendered with the full color-eyre report.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Monorail operations.
#[derive(Error, Debug)]
pub enum MonorailError {
    // Configuration/reference errors
    #[error(
        "Couldn't find monorepo.toml or monorepo.json in {0} or any parent directory"
    )]
    MissingConfig(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("Failed to parse manifest {path}: {reason}")]
    ManifestParse { path: PathBuf, reason: String },

    #[error("The version specifier {0} could not be found")]
    RefNotFound(String),

    #[error("Could not compute a new version from '{0}'")]
    InvalidVersion(String),

    #[error("Trying to publish package '{0}' but it doesn't have a name")]
    PublishNeedsName(String),

    #[error("Missing dist package.json for package '{0}'")]
    MissingDistManifest(String),

    // Graph integrity errors
    #[error("Multiple packages with same name \"{0}\"")]
    DuplicatePackageName(String),

    #[error(
        "Root package should not reference child package {package} from {dep_type}"
    )]
    RootInnerReference { dep_type: String, package: String },

    #[error("Package {subject} accessing {target}{}", describe_inner_ref(.range, .actual))]
    InnerInnerReference {
        subject: String,
        target: String,
        range: Option<String>,
        actual: Option<String>,
    },

    #[error(
        "Problem referencing {package}@{range}. Current version is {actual}"
    )]
    InternalReference {
        package: String,
        range: String,
        actual: String,
    },

    // Unsupported range errors
    #[error(
        "Cannot bump {dependency} in {dependent} because it uses non-standard version range '{range}'. Please do it yourself first."
    )]
    UnsupportedRangeBump {
        dependent: String,
        dependency: String,
        range: String,
    },

    // Version-control errors
    #[error("Need clean git working tree in {0}")]
    DirtyTree(PathBuf),

    #[error("A git repo does not exist at {0}")]
    NoRepoRoot(PathBuf),

    #[error("git {command} failed in {dir}: {stderr}")]
    VcsCommand {
        command: String,
        dir: PathBuf,
        stderr: String,
    },

    // Execution errors
    #[error("Failed executing script '{script}' in: {}", format_failures(.failures))]
    ScriptsFailed {
        script: String,
        failures: Vec<(String, String)>,
    },

    #[error("Failed creating tags: {}", format_failures(.failures))]
    TagsFailed { failures: Vec<(String, String)> },
}

fn describe_inner_ref(range: &Option<String>, actual: &Option<String>) -> String {
    let range = range
        .as_ref()
        .map(|r| format!("@{r}"))
        .unwrap_or_default();

    match actual {
        Some(actual) => {
            format!("{range} which is out of range with {actual}")
        }
        None => format!("{range} which doesn't have a version"),
    }
}

fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(id, reason)| format!("{id} ({})", reason.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl MonorailError {
    /// Create a version-control command error
    pub fn vcs(
        command: impl Into<String>,
        dir: impl Into<PathBuf>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::VcsCommand {
            command: command.into(),
            dir: dir.into(),
            stderr: stderr.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an unsupported range bump error
    pub fn unsupported_range(
        dependent: impl Into<String>,
        dependency: impl Into<String>,
        range: impl Into<String>,
    ) -> Self {
        Self::UnsupportedRangeBump {
            dependent: dependent.into(),
            dependency: dependency.into(),
            range: range.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_reference_message_without_version() {
        let err = MonorailError::InnerInnerReference {
            subject: "plug".into(),
            target: "core".into(),
            range: Some("^1.0.0".into()),
            actual: None,
        };
        assert_eq!(
            err.to_string(),
            "Package plug accessing core@^1.0.0 which doesn't have a version"
        );
    }

    #[test]
    fn inner_reference_message_out_of_range() {
        let err = MonorailError::InnerInnerReference {
            subject: "plug".into(),
            target: "core".into(),
            range: Some("^1.0.0".into()),
            actual: Some("2.0.0".into()),
        };
        assert_eq!(
            err.to_string(),
            "Package plug accessing core@^1.0.0 which is out of range with 2.0.0"
        );
    }

    #[test]
    fn scripts_failed_lists_each_package() {
        let err = MonorailError::ScriptsFailed {
            script: "version".into(),
            failures: vec![
                ("core".into(), "exit 1\n".into()),
                ("plug".into(), "boom".into()),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Failed executing script 'version' in: core (exit 1), plug (boom)"
        );
    }
}

//! Common test helper functions shared across test modules.
//!
//! Provides package fixtures (in memory or written to a temp dir) and thin
//! wrappers that drive a real `git` binary to build repositories, tags and
//! submodules for change-detection and version-bump tests.
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use crate::package::{InnerPackage, Package, manifest::Manifest};

/// Directory in-memory fixtures pretend to live in.
pub const FAKE_ROOT: &str = "/monorepo";

/// Writes `data` as pretty json, creating parent directories.
pub fn write_json(path: &Path, data: &Value) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut text = serde_json::to_string_pretty(data).unwrap();
    text.push('\n');
    fs::write(path, text).unwrap();
}

/// A root package that was never written to disk.
///
/// # Example
/// ```ignore
/// let root = root_package(json!({"version": "2.0.0"}));
/// ```
pub fn root_package(data: Value) -> Package {
    let dir = PathBuf::from(FAKE_ROOT);
    Package {
        manifest: Manifest::in_memory(dir.join("package.json"), data),
        dir,
        npm_client_args: vec![],
        inner: None,
    }
}

/// An inner package at `<FAKE_ROOT>/<rel_dir>` that was never written to
/// disk.
///
/// # Example
/// ```ignore
/// let core = inner_package("packages/core", json!({"name": "core"}));
/// ```
pub fn inner_package(rel_dir: &str, data: Value) -> Package {
    let dir = Path::new(FAKE_ROOT).join(rel_dir);
    Package {
        manifest: Manifest::in_memory(dir.join("package.json"), data),
        inner: Some(InnerPackage::new(&dir, rel_dir, None, vec![])),
        dir,
        npm_client_args: vec![],
    }
}

/// Writes `<root>/<rel_dir>/package.json` and loads it as an inner package.
pub async fn load_inner_package(
    root: &Path,
    rel_dir: &str,
    data: Value,
) -> Package {
    let dir = root.join(rel_dir);
    write_json(&dir.join("package.json"), &data);
    Package::load(
        &dir,
        vec![],
        Some(InnerPackage::new(&dir, rel_dir, None, vec![])),
    )
    .await
    .unwrap()
}

/// Writes `monorepo.json` plus one manifest per `(rel_dir, data)` pair under
/// `root`. Every pair is listed as a literal package path.
pub fn write_monorepo(root: &Path, config: Value, pkgs: &[(&str, Value)]) {
    let mut config = config;
    let paths: Vec<Value> =
        pkgs.iter().map(|(rel, _)| Value::from(*rel)).collect();

    if let Some(obj) = config.as_object_mut() {
        obj.entry("packages").or_insert(Value::Array(paths));
    }

    write_json(&root.join("monorepo.json"), &config);

    for (rel, data) in pkgs {
        write_json(&root.join(rel).join("package.json"), data);
    }
}

/// Runs git in `dir`, panicking on failure, and returns trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );

    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn configure_identity(dir: &Path) {
    git(dir, &["config", "user.name", "Monorail Test"]);
    git(dir, &["config", "user.email", "test@monorail.dev"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    git(dir, &["config", "tag.gpgsign", "false"]);
}

/// Initializes a repository with a local identity and signing disabled.
pub fn init_repo(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    git(dir, &["init", "-q"]);
    configure_identity(dir);
}

/// Stages everything and commits, allowing empty commits.
pub fn commit_all(dir: &Path, message: &str) {
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "--allow-empty", "-m", message]);
}

/// Creates an annotated tag at HEAD.
pub fn tag(dir: &Path, name: &str) {
    git(dir, &["tag", "-a", name, "-m", name]);
}

/// Clones `upstream` into `<root>/<rel_dir>` as a submodule.
pub fn add_submodule(root: &Path, upstream: &Path, rel_dir: &str) {
    git(
        root,
        &[
            "-c",
            "protocol.file.allow=always",
            "submodule",
            "add",
            "-q",
            &upstream.to_string_lossy(),
            rel_dir,
        ],
    );
    configure_identity(&root.join(rel_dir));
}

/// Installs an executable git hook.
#[cfg(unix)]
pub fn install_hook(repo: &Path, hook: &str, script: &str) {
    use std::os::unix::fs::PermissionsExt;

    let hooks = PathBuf::from(git(repo, &["rev-parse", "--git-path", "hooks"]));
    let hooks = if hooks.is_absolute() {
        hooks
    } else {
        repo.join(hooks)
    };
    fs::create_dir_all(&hooks).unwrap();

    let path = hooks.join(hook);
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn in_memory_packages_know_their_place() {
        let core = inner_package("packages/core", json!({"name": "core"}));
        assert_eq!(core.dir, Path::new("/monorepo/packages/core"));
        assert_eq!(core.name(), Some("core"));
        assert!(!core.is_root());
        assert!(root_package(json!({})).is_root());
    }

    #[test]
    fn write_json_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a/b/package.json");
        write_json(&path, &json!({"name": "x"}));
        assert!(fs::read_to_string(path).unwrap().ends_with("}\n"));
    }
}

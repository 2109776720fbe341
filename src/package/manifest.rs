use log::*;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::{error::MonorailError, result::Result};

pub const MANIFEST_FILE: &str = "package.json";

/// The text a manifest had before a write. Applying it with [`restore`]
/// puts the file back byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub package_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub text: String,
}

/// Write a snapshot's text back to disk.
pub async fn restore(snapshot: &Snapshot) -> Result<()> {
    debug!("restoring {}", snapshot.manifest_path.display());
    tokio::fs::write(&snapshot.manifest_path, &snapshot.text).await?;
    Ok(())
}

/// Serialize manifest data the way it is written to disk: two space
/// indent, original key order, trailing newline.
pub fn serialize(data: &Value) -> Result<String> {
    let mut text = serde_json::to_string_pretty(data)?;
    text.push('\n');
    Ok(text)
}

/// Handles package.json reading and writing for a single package.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    text: String,
    data: Value,
}

impl Manifest {
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(MonorailError::ManifestNotFound(path).into());
            }
            Err(err) => return Err(err.into()),
        };

        let data = parse(&path, &text)?;

        Ok(Self { path, text, data })
    }

    /// Build a manifest that was never read from disk.
    #[cfg(test)]
    pub fn in_memory(path: impl Into<PathBuf>, data: Value) -> Self {
        let text = serialize(&data).unwrap_or_default();
        Self {
            path: path.into(),
            text,
            data,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn name(&self) -> Option<&str> {
        self.data.get("name").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.data.get("version").and_then(Value::as_str)
    }

    /// True when a `version` key exists at all, even if empty.
    pub fn has_version_key(&self) -> bool {
        self.data.get("version").is_some()
    }

    pub fn has_script(&self, script: &str) -> bool {
        self.data
            .get("scripts")
            .and_then(Value::as_object)
            .is_some_and(|scripts| scripts.contains_key(script))
    }

    /// Write new data to disk and adopt it in memory. The returned snapshot
    /// holds the text from before this call, so snapshots from overlapping
    /// updates must be restored newest first.
    pub async fn update(&mut self, new_data: Value) -> Result<Snapshot> {
        let new_text = serialize(&new_data)?;

        debug!("writing mods to {}", self.path.display());
        tokio::fs::write(&self.path, &new_text).await?;

        let old_text = std::mem::replace(&mut self.text, new_text);
        self.data = new_data;

        Ok(Snapshot {
            package_dir: self
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            manifest_path: self.path.clone(),
            text: old_text,
        })
    }

    /// Re-read the file, used after snapshots were restored behind our back.
    pub async fn reload(&mut self) -> Result<()> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        self.data = parse(&self.path, &text)?;
        self.text = text;
        Ok(())
    }
}

fn parse(path: &Path, text: &str) -> Result<Value> {
    let data: Value = serde_json::from_str(text).map_err(|err| {
        MonorailError::ManifestParse {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    })?;

    if !data.is_object() {
        return Err(MonorailError::ManifestParse {
            path: path.to_path_buf(),
            reason: "expected a json object".into(),
        }
        .into());
    }

    Ok(data)
}

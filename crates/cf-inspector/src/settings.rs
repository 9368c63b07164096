//! Settings persistence
//!
//! One flat JSON blob keyed by `param::<moduleKey>::<paramName>` and
//! `enabled::<moduleKey>` entries. The blob format is deliberately flat so
//! a missing module or renamed param degrades to its default instead of
//! invalidating the whole file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;

use cf_core::CfResult;

/// Flat settings blob
pub type SettingsBlob = HashMap<String, Value>;

/// Where the inspector's blob lives
pub trait SettingsStore: Send {
    fn load(&self) -> CfResult<SettingsBlob>;
    fn save(&self, blob: &SettingsBlob) -> CfResult<()>;
}

/// JSON file under the platform config directory
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Default settings file location.
    pub fn default_path() -> PathBuf {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coinforge")
            .join("inspector_settings.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileSettings {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl SettingsStore for FileSettings {
    fn load(&self) -> CfResult<SettingsBlob> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content).unwrap_or_else(|err| {
                log::warn!("[inspector] malformed settings file, starting fresh: {err}");
                SettingsBlob::new()
            })),
            Err(_) => Ok(SettingsBlob::new()),
        }
    }

    fn save(&self, blob: &SettingsBlob) -> CfResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(blob)?)?;
        Ok(())
    }
}

/// In-memory store for tests and embedded hosts
#[derive(Default)]
pub struct MemorySettings {
    blob: Mutex<SettingsBlob>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: SettingsBlob) -> Self {
        Self {
            blob: Mutex::new(blob),
        }
    }
}

impl SettingsStore for MemorySettings {
    fn load(&self) -> CfResult<SettingsBlob> {
        Ok(self.blob.lock().clone())
    }

    fn save(&self, blob: &SettingsBlob) -> CfResult<()> {
        *self.blob.lock() = blob.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemorySettings::new();
        let mut blob = SettingsBlob::new();
        blob.insert("enabled::coin".to_string(), Value::Bool(false));
        store.save(&blob).unwrap();
        assert_eq!(store.load().unwrap(), blob);
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let store = FileSettings::new("/nonexistent/inspector_settings.json");
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = std::env::temp_dir().join("cf-inspector-test");
        let path = dir.join("settings.json");
        let _ = fs::remove_file(&path);

        let store = FileSettings::new(&path);
        let mut blob = SettingsBlob::new();
        blob.insert(
            "param::coin::coinSize".to_string(),
            serde_json::json!(200.0),
        );
        store.save(&blob).unwrap();
        assert_eq!(store.load().unwrap(), blob);

        let _ = fs::remove_file(&path);
    }
}

//! User settings persisted as one JSON document on disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tracing::debug;

use clusterview_updates::{SettingsError, SettingsStore};

/// `<data dir>/clusterview/settings.json`, falling back to
/// `~/.local/share` when the platform has no data directory.
pub fn default_settings_path() -> Option<PathBuf> {
    let base = dirs::data_dir().or_else(|| {
        dirs::home_dir().map(|mut home| {
            home.push(".local");
            home.push("share");
            home
        })
    })?;
    Some(base.join("clusterview").join("settings.json"))
}

/// Settings file; a missing file reads as an empty document.
///
/// Writes go to a sibling temp file which is then renamed over the original.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>, SettingsError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => {
                return Err(SettingsError::Io(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )));
            }
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(SettingsError::Malformed(format!(
                "{} is not a JSON object",
                self.path.display()
            ))),
            Err(err) => Err(SettingsError::Malformed(format!(
                "{}: {err}",
                self.path.display()
            ))),
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::Io(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| SettingsError::Malformed(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, bytes)
            .map_err(|e| SettingsError::Io(format!("failed to write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            SettingsError::Io(format!("failed to replace {}: {e}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), "settings written");
        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn get_key(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        Ok(self.read_document()?.remove(key))
    }

    fn set_key(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock().map_err(|_| SettingsError::Poisoned)?;
        let mut document = self.read_document()?;
        document.insert(key.to_string(), value);
        self.write_document(&document)
    }
}

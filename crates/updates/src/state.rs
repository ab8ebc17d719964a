//! Persisted version-check state.
//!
//! The state lives inside the user settings document as
//! `savedStates.dcosUIVersion = { dismissedVersion, lastTimeCheck }`.
//! Storage failures never propagate past the tracker: reads fall back to the
//! defaults and failed writes are logged while the in-memory state stays.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub const SAVED_STATES_KEY: &str = "savedStates";
pub const VERSION_SETTING_KEY: &str = "dcosUIVersion";

/// What the user dismissed and when upstream was last asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCheckState {
    #[serde(default = "default_dismissed")]
    pub dismissed_version: String,
    /// Unix milliseconds of the last successful check.
    #[serde(default)]
    pub last_time_check: i64,
}

fn default_dismissed() -> String {
    "0".to_string()
}

impl Default for VersionCheckState {
    fn default() -> Self {
        Self {
            dismissed_version: default_dismissed(),
            last_time_check: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O failed: {0}")]
    Io(String),

    #[error("settings document is malformed: {0}")]
    Malformed(String),

    #[error("settings lock poisoned")]
    Poisoned,
}

/// Key/value access to the user settings document.
pub trait SettingsStore: Send + Sync {
    fn get_key(&self, key: &str) -> Result<Option<Value>, SettingsError>;

    fn set_key(&self, key: &str, value: Value) -> Result<(), SettingsError>;
}

/// In-memory settings for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    values: RwLock<BTreeMap<String, Value>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: impl Into<String>, value: Value) -> Self {
        let store = Self::default();
        if let Ok(mut values) = store.values.write() {
            values.insert(key.into(), value);
        }
        store
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn get_key(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        let values = self.values.read().map_err(|_| SettingsError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set_key(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        let mut values = self.values.write().map_err(|_| SettingsError::Poisoned)?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Process-wide owner of the version-check state.
///
/// Reads come from memory; every change is written through to the store.
pub struct VersionTracker {
    store: Arc<dyn SettingsStore>,
    state: RwLock<VersionCheckState>,
}

impl VersionTracker {
    /// Read the persisted state, falling back to the defaults.
    pub fn load(store: Arc<dyn SettingsStore>) -> Self {
        let state = match read_state(store.as_ref()) {
            Ok(Some(state)) => state,
            Ok(None) => VersionCheckState::default(),
            Err(err) => {
                warn!(error = %err, "failed to read version-check state; using defaults");
                VersionCheckState::default()
            }
        };
        debug!(?state, "version-check state loaded");

        Self {
            store,
            state: RwLock::new(state),
        }
    }

    pub fn state(&self) -> VersionCheckState {
        self.read().clone()
    }

    pub fn dismissed_version(&self) -> String {
        self.read().dismissed_version.clone()
    }

    /// Remember `version` as dismissed. The last check time is untouched.
    ///
    /// Takes effect in memory even when the store cannot be written.
    pub fn dismiss(&self, version: impl Into<String>) {
        let snapshot = {
            let mut state = self.write();
            state.dismissed_version = version.into();
            state.clone()
        };
        self.write_through(&snapshot);
    }

    /// Record a completed check at `now_millis`. Never moves backwards.
    pub fn record_check(&self, now_millis: i64) {
        let snapshot = {
            let mut state = self.write();
            if now_millis <= state.last_time_check {
                return;
            }
            state.last_time_check = now_millis;
            state.clone()
        };
        self.write_through(&snapshot);
    }

    /// True once `cooldown` has passed since the last check.
    pub fn is_due(&self, now_millis: i64, cooldown: Duration) -> bool {
        let cooldown = i64::try_from(cooldown.as_millis()).unwrap_or(i64::MAX);
        now_millis >= self.read().last_time_check.saturating_add(cooldown)
    }

    fn write_through(&self, state: &VersionCheckState) {
        if let Err(err) = self.persist(state) {
            warn!(error = %err, "failed to persist version-check state");
        }
    }

    fn persist(&self, state: &VersionCheckState) -> Result<(), SettingsError> {
        let mut saved = match self.store.get_key(SAVED_STATES_KEY)? {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let value =
            serde_json::to_value(state).map_err(|e| SettingsError::Malformed(e.to_string()))?;
        saved.insert(VERSION_SETTING_KEY.to_string(), value);

        self.store.set_key(SAVED_STATES_KEY, Value::Object(saved))
    }

    fn read(&self) -> RwLockReadGuard<'_, VersionCheckState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, VersionCheckState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for VersionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionTracker")
            .field("state", &*self.read())
            .finish_non_exhaustive()
    }
}

fn read_state(store: &dyn SettingsStore) -> Result<Option<VersionCheckState>, SettingsError> {
    let Some(saved) = store.get_key(SAVED_STATES_KEY)? else {
        return Ok(None);
    };
    let Some(entry) = saved.get(VERSION_SETTING_KEY) else {
        return Ok(None);
    };
    serde_json::from_value(entry.clone())
        .map(Some)
        .map_err(|e| SettingsError::Malformed(e.to_string()))
}

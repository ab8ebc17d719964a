//! `clusterview-updates` — notify when a newer UI version is published.
//!
//! - `state`: the persisted dismissal / last-check record and its tracker
//! - `version`: lenient semantic-version comparison
//! - `stream`: the shared, cooldown-gated [`UpdateStream`]

pub mod state;
pub mod stream;
pub mod version;

pub use state::{
    InMemorySettingsStore, SAVED_STATES_KEY, SettingsError, SettingsStore, VERSION_SETTING_KEY,
    VersionCheckState, VersionTracker,
};
pub use stream::{
    DEFAULT_CHECK_INTERVAL, DEFAULT_COOLDOWN, InMemoryVersionsClient, UpdateConfig, UpdateResult,
    UpdateStream, VersionsClient,
};
pub use version::{is_newer, parse_lenient};

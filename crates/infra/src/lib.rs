//! Infrastructure layer: configuration, upstream HTTP clients, settings storage.

pub mod config;
pub mod cosmos;
pub mod metronome;
pub mod settings_file;

pub use config::{AppConfig, ConfigError};
pub use cosmos::CosmosVersionsClient;
pub use metronome::MetronomeClient;
pub use settings_file::{FileSettingsStore, default_settings_path};

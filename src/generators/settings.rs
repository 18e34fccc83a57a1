// src/generators/settings.rs
//! Plugin configuration. Every field has a default, so a partial `.ron` file works.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::clock::DEFAULT_TICK_QUANTUM;

#[derive(Resource, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemGeneratorSettings {
    /// Length of one clock quantum in milliseconds.
    pub tick_quantum_ms: u64,
    /// Upper bound on quanta replayed in one frame after a stall.
    pub max_ticks_per_frame: u32,
    /// Log every spawn at info level.
    pub log_spawns: bool,
}

impl Default for ItemGeneratorSettings {
    fn default() -> Self {
        Self {
            tick_quantum_ms: DEFAULT_TICK_QUANTUM.as_millis() as u64,
            max_ticks_per_frame: 20,
            log_spawns: false,
        }
    }
}

impl ItemGeneratorSettings {
    pub fn tick_quantum(&self) -> Duration { Duration::from_millis(self.tick_quantum_ms) }

    pub fn from_ron_str(src: &str) -> Result<Self, SettingsError> {
        ron::from_str(src).map_err(|e| SettingsError::Ron(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let src = std::fs::read_to_string(path)?;
        Self::from_ron_str(&src)
    }

    /// Like `load`, but falls back to defaults and hands the error back for
    /// the caller to report.
    pub fn load_or_default(path: impl AsRef<Path>) -> (Self, Option<SettingsError>) {
        match Self::load(path) {
            Ok(settings) => (settings, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("I/O while reading settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let s = ItemGeneratorSettings::from_ron_str("(tick_quantum_ms: 25)").unwrap();
        assert_eq!(s.tick_quantum(), Duration::from_millis(25));
        assert_eq!(s.max_ticks_per_frame, 20);
        assert!(!s.log_spawns);
    }

    #[test]
    fn default_quantum_is_one_server_tick() {
        assert_eq!(ItemGeneratorSettings::default().tick_quantum(), Duration::from_millis(50));
    }

    #[test]
    fn bad_input_is_reported() {
        assert!(matches!(ItemGeneratorSettings::from_ron_str("(tick_quantum_ms: \"x\")"), Err(SettingsError::Ron(_))));
        assert!(matches!(ItemGeneratorSettings::load("/nonexistent/settings.ron"), Err(SettingsError::Io(_))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults_with_error() {
        let (settings, err) = ItemGeneratorSettings::load_or_default("/nonexistent/settings.ron");
        assert_eq!(settings, ItemGeneratorSettings::default());
        assert!(matches!(err, Some(SettingsError::Io(_))));
    }

    #[test]
    fn demo_settings_file_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/item_generators.ron");
        let (settings, err) = ItemGeneratorSettings::load_or_default(path);
        assert!(err.is_none());
        assert!(settings.log_spawns);
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// User-tunable feature switches, stored as `settings.json` next to the
/// executable. A missing or unreadable file falls back to defaults so the
/// assistant always starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub enable_health_monitoring: bool,
    pub enable_training_menu: bool,
    /// Capture a specific monitor instead of the primary one.
    pub monitor_index: Option<usize>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            enable_health_monitoring: true,
            enable_training_menu: true,
            monitor_index: None,
        }
    }
}

impl AppSettings {
    pub fn load(path: &Path) -> AppSettings {
        if !path.exists() {
            return AppSettings::default();
        }
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "settings file is invalid, using defaults");
                    AppSettings::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "settings file is unreadable, using defaults");
                AppSettings::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let raw = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, raw)
    }
}

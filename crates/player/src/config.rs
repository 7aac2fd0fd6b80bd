use std::fs;
use std::path::{Path, PathBuf};

use fretflow_core::PracticeConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Playback speed used when none is given on the command line.
    pub speed: f64,
    pub practice: PracticeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speed: 1.0,
            practice: PracticeConfig::default(),
        }
    }
}

impl Config {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fretflow").join("config.toml"))
    }

    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Missing or unreadable files give the defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
                warn!(path = %path.display(), %err, "ignoring malformed config");
                Self::default()
            }),
            Err(_) => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };
        if let Err(err) = self.save_to(&path) {
            warn!(path = %path.display(), %err, "failed to save config");
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

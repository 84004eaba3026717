//! Persisted user preferences.
//!
//! One small TOML document under the platform config directory. Absent file
//! means defaults; the resolved audio device is written back whenever it
//! changes so the next launch asks for the same device.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};

const QUALIFIER: &str = "dev";
const ORGANISATION: &str = "beatride";
const APPLICATION: &str = "beatride";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prefs {
    pub audio_device: Option<String>,
    pub language: String,
    pub overlay: bool,
}

impl Default for Prefs {
    fn default() -> Self {
        Self {
            audio_device: None,
            language: "en".to_string(),
            overlay: false,
        }
    }
}

impl Prefs {
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(dirs.config_dir().join("prefs.toml"))
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read preferences at {}", path.display()))?;
            let prefs: Self = toml::from_str(&contents)
                .with_context(|| format!("failed to parse preferences at {}", path.display()))?;
            Ok(prefs)
        } else {
            Ok(Self::default())
        }
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| anyhow!("preferences path has no parent: {}", path.display()))?;
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to prepare directory at {}", dir.display()))?;
        let serialized =
            toml::to_string_pretty(self).context("failed to serialize preferences to TOML")?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write preferences to {}", path.display()))?;
        Ok(())
    }
}

//! Defines the manifest schema shared by content packs and their level
//! documents, giving `pack` predictable metadata to scan while the menu and
//! editor screens rely on these structures for labels, tempo, and track
//! placement.
//!
//! Types:
//!
//! - `PackManifest` captures the pack namespace and presentation metadata read
//!   from `pack.toml`.
//! - `LevelManifest` stores one playable level: identity, labels, tempo, and
//!   an optional track-document override (the default location is
//!   `tracks/<id>.txt` under the pack root).
//! - `Difficulty` encodes the coarse rating shown in level listings, with a
//!   serde default that tolerates sparse documents.
//!
//! Functions:
//!
//! - `PackManifest::validate` and `LevelManifest::validate` return
//!   human-readable issues so the scanner can report misconfigurations
//!   without panicking.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PackManifest {
    pub namespace: String,
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LevelManifest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default = "default_tempo")]
    pub tempo: f32,
    #[serde(default)]
    pub track: Option<PathBuf>,
}

fn default_tempo() -> f32 {
    120.0
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Expert,
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::Normal
    }
}

impl PackManifest {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.namespace.is_empty() {
            issues.push("pack namespace must not be empty".to_string());
        } else if !well_formed_id(&self.namespace) {
            issues.push(format!(
                "pack namespace '{}' may only contain alphanumerics, '-' and '_'",
                self.namespace
            ));
        }
        issues
    }
}

impl LevelManifest {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.id.is_empty() {
            issues.push("level id must not be empty".to_string());
        } else if !well_formed_id(&self.id) {
            issues.push(format!(
                "level id '{}' may only contain alphanumerics, '-' and '_'",
                self.id
            ));
        }
        if self.name.trim().is_empty() {
            issues.push("level name must not be empty".to_string());
        }
        if !self.tempo.is_finite() || self.tempo <= 0.0 {
            issues.push(format!("tempo {} must be a positive beat rate", self.tempo));
        }
        issues
    }
}

// Namespaces and level ids join with '.' to form qualified ids, so neither
// side may contain separators of its own.
fn well_formed_id(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

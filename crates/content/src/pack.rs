//! Discovers content packs under `<root>/packs/*` and aggregates their levels
//! into one namespace-qualified library the menu and editor can query. It
//! keeps filesystem validation centralized while treating every individual
//! pack or level failure as a warning, never as a failed scan.
//!
//! Types:
//!
//! - `PackError` classifies manifest parsing, validation, and I/O failures for
//!   the scan log and for callers that load a single pack directly.
//! - `LoadedPack` stores one pack directory with its parsed `PackManifest` and
//!   the level documents that survived validation.
//! - `LevelEntry` is the library view of one level: its namespace, manifest,
//!   and the track-document path relative to the content root.
//! - `ContentLibrary` maps qualified level ids (`<namespace>.<id>`) to entries
//!   in deterministic order.
//!
//! Functions:
//!
//! - `LoadedPack::load` reads `pack.toml`, validates it, and collects the
//!   pack's `levels/*.toml` documents.
//! - `ContentLibrary::scan` walks the content root and absorbs every loadable
//!   pack, skipping broken entries with a warning.
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::manifest::{LevelManifest, PackManifest};

#[derive(Debug, Error)]
pub enum PackError {
    #[error("manifest not found at {0}")]
    ManifestMissing(PathBuf),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation failed for {path}: {issues:?}")]
    Validation { path: PathBuf, issues: Vec<String> },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct LoadedPack {
    root: PathBuf,
    manifest: PackManifest,
    levels: Vec<LevelManifest>,
}

impl LoadedPack {
    pub fn load(root: impl AsRef<Path>) -> Result<Self, PackError> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join("pack.toml");
        if !manifest_path.exists() {
            return Err(PackError::ManifestMissing(manifest_path));
        }

        let raw = fs::read_to_string(&manifest_path)?;
        let manifest: PackManifest = toml::from_str(&raw).map_err(|source| PackError::Parse {
            path: manifest_path.clone(),
            source,
        })?;
        let issues = manifest.validate();
        if !issues.is_empty() {
            return Err(PackError::Validation {
                path: manifest_path,
                issues,
            });
        }

        let levels = load_levels(&root);
        Ok(Self {
            root,
            manifest,
            levels,
        })
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn manifest(&self) -> &PackManifest {
        &self.manifest
    }

    pub fn namespace(&self) -> &str {
        &self.manifest.namespace
    }

    pub fn levels(&self) -> &[LevelManifest] {
        &self.levels
    }
}

fn load_levels(pack_root: &Path) -> Vec<LevelManifest> {
    let dir = pack_root.join("levels");
    if !dir.is_dir() {
        debug!(pack = %pack_root.display(), "pack declares no levels directory");
        return Vec::new();
    }

    let mut paths: Vec<PathBuf> = match fs::read_dir(&dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect(),
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "cannot read levels directory");
            return Vec::new();
        }
    };
    paths.sort();

    let mut levels = Vec::new();
    for path in paths {
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        match load_level(&path) {
            Ok(level) => levels.push(level),
            Err(err) => warn!(path = %path.display(), error = %err, "skipping level document"),
        }
    }
    levels
}

fn load_level(path: &Path) -> Result<LevelManifest, PackError> {
    let raw = fs::read_to_string(path)?;
    let manifest: LevelManifest = toml::from_str(&raw).map_err(|source| PackError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let issues = manifest.validate();
    if !issues.is_empty() {
        return Err(PackError::Validation {
            path: path.to_path_buf(),
            issues,
        });
    }
    Ok(manifest)
}

#[derive(Debug, Clone)]
pub struct LevelEntry {
    pub namespace: String,
    pub manifest: LevelManifest,
    track: PathBuf,
}

impl LevelEntry {
    pub fn qualified_id(&self) -> String {
        format!("{}.{}", self.namespace, self.manifest.id)
    }

    /// Track document location relative to the content root the library was
    /// scanned from, suitable for a resource loader rooted there.
    pub fn track_path(&self) -> &Path {
        &self.track
    }
}

#[derive(Debug, Default, Clone)]
pub struct ContentLibrary {
    levels: BTreeMap<String, LevelEntry>,
    pack_count: usize,
}

impl ContentLibrary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Walks `<root>/packs/*` and absorbs every pack that loads. A missing
    /// packs directory yields an empty library; broken packs and levels are
    /// logged and skipped.
    pub fn scan(root: impl AsRef<Path>) -> Result<Self, PackError> {
        let root = root.as_ref();
        let packs_dir = root.join("packs");
        if !packs_dir.is_dir() {
            warn!(root = %root.display(), "content root has no packs directory");
            return Ok(Self::empty());
        }

        let mut pack_dirs: Vec<PathBuf> = fs::read_dir(&packs_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        pack_dirs.sort();

        let mut library = Self::empty();
        for pack_dir in pack_dirs {
            match LoadedPack::load(&pack_dir) {
                Ok(pack) => library.absorb(root, &pack_dir, pack),
                Err(err) => {
                    warn!(pack = %pack_dir.display(), error = %err, "skipping pack");
                }
            }
        }
        info!(
            packs = library.pack_count,
            levels = library.levels.len(),
            "content scan complete"
        );
        Ok(library)
    }

    fn absorb(&mut self, root: &Path, pack_dir: &Path, pack: LoadedPack) {
        self.pack_count += 1;
        let relative_root = pack_dir
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| pack_dir.to_path_buf());
        debug!(
            namespace = pack.namespace(),
            levels = pack.levels().len(),
            "loaded pack"
        );

        for level in pack.levels() {
            let track_rel = level
                .track
                .clone()
                .unwrap_or_else(|| PathBuf::from("tracks").join(format!("{}.txt", level.id)));
            let entry = LevelEntry {
                namespace: pack.namespace().to_string(),
                manifest: level.clone(),
                track: relative_root.join(track_rel),
            };
            match self.levels.entry(entry.qualified_id()) {
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
                Entry::Occupied(slot) => {
                    warn!(id = %slot.key(), "duplicate level id, keeping the first definition");
                }
            }
        }
    }

    pub fn level(&self, id: &str) -> Option<&LevelEntry> {
        self.levels.get(id)
    }

    /// First level in qualified-id order; what the menu launches by default.
    pub fn first_level(&self) -> Option<&LevelEntry> {
        self.levels.values().next()
    }

    pub fn levels(&self) -> impl Iterator<Item = &LevelEntry> {
        self.levels.values()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn pack_count(&self) -> usize {
        self.pack_count
    }
}

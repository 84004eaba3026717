//! Localized UI strings. A language file is a nested TOML document; loading
//! flattens it into dotted keys (`menu.play`), and lookups fall back to the
//! key itself so a missing entry renders as its key instead of vanishing.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum LangError {
    #[error("language file not found at {0}")]
    Missing(PathBuf),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default, Clone)]
pub struct LanguageTable {
    entries: BTreeMap<String, String>,
}

impl LanguageTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LangError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LangError::Missing(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        let document: toml::Table = toml::from_str(&raw).map_err(|source| LangError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_document(&document))
    }

    pub fn from_document(document: &toml::Table) -> Self {
        let mut entries = BTreeMap::new();
        flatten_into("", document, &mut entries);
        Self { entries }
    }

    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        match self.entries.get(key) {
            Some(value) => value.as_str(),
            None => key,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn flatten_into(prefix: &str, table: &toml::Table, out: &mut BTreeMap<String, String>) {
    for (key, value) in table {
        let dotted = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::String(text) => {
                out.insert(dotted, text.clone());
            }
            toml::Value::Table(nested) => flatten_into(&dotted, nested, out),
            other => {
                warn!(key = %dotted, kind = other.type_str(), "ignoring non-string language entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_nested_tables() {
        let document: toml::Table = toml::from_str(
            "title = \"Beatride\"\n\n[menu]\nplay = \"Play\"\n\n[menu.sub]\ndeep = \"Deep\"\n",
        )
        .unwrap();
        let table = LanguageTable::from_document(&document);
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("title"), "Beatride");
        assert_eq!(table.get("menu.play"), "Play");
        assert_eq!(table.get("menu.sub.deep"), "Deep");
    }

    #[test]
    fn falls_back_to_the_key() {
        let table = LanguageTable::empty();
        assert_eq!(table.get("menu.quit"), "menu.quit");
    }

    #[test]
    fn ignores_non_string_values() {
        let document: toml::Table = toml::from_str("count = 3\nlabel = \"x\"\n").unwrap();
        let table = LanguageTable::from_document(&document);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("count"), "count");
    }

    #[test]
    fn loads_from_disk_and_reports_missing_files() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("en.toml");
        fs::write(&path, "[menu]\nquit = \"Quit\"\n").expect("write lang file");

        let table = LanguageTable::load(&path).expect("load");
        assert_eq!(table.get("menu.quit"), "Quit");

        let err = LanguageTable::load(temp.path().join("xx.toml")).unwrap_err();
        assert!(matches!(err, LangError::Missing(_)));
    }
}

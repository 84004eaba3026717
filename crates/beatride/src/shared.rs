//! Data every game state shares.

use std::sync::Arc;

use content::{ContentLibrary, LanguageTable};
use preprocess::Preprocessor;

/// Cloneable bundle handed to states at construction: the scanned content
/// library, the language table, and the preprocessor that builds their
/// shader programs. States own their clone; nothing here is process-global.
#[derive(Clone)]
pub struct GameShared {
    pub library: Arc<ContentLibrary>,
    pub lang: Arc<LanguageTable>,
    pub shaders: Arc<Preprocessor>,
}

impl GameShared {
    pub fn new(library: ContentLibrary, lang: LanguageTable, shaders: Preprocessor) -> Self {
        Self {
            library: Arc::new(library),
            lang: Arc::new(lang),
            shaders: Arc::new(shaders),
        }
    }
}

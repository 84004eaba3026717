mod lang;
mod manifest;
mod pack;

pub use lang::{LangError, LanguageTable};
pub use manifest::{Difficulty, LevelManifest, PackManifest};
pub use pack::{ContentLibrary, LevelEntry, LoadedPack, PackError};

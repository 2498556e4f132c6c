//! Content resolution for note versions.
//!
//! Where versions live is up to the host application; this module only defines
//! the seam plus an in-memory provider for tests and the CLI.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("Version not found: {note_id}@{version_id}")]
    NotFound { note_id: String, version_id: String },

    #[error("Content provider error: {0}")]
    Provider(String),
}

/// Supplies the text of one version of a note
pub trait ContentProvider {
    fn load(&self, note_id: &str, version_id: &str) -> Result<String, ContentError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryContentProvider {
    versions: HashMap<(String, String), String>,
}

impl MemoryContentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        note_id: impl Into<String>,
        version_id: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.versions
            .insert((note_id.into(), version_id.into()), content.into());
    }

    /// Store raw bytes, replacing invalid UTF-8 sequences
    pub fn insert_bytes(
        &mut self,
        note_id: impl Into<String>,
        version_id: impl Into<String>,
        bytes: &[u8],
    ) {
        self.insert(note_id, version_id, String::from_utf8_lossy(bytes));
    }

    pub fn remove_note(&mut self, note_id: &str) {
        self.versions.retain(|(note, _), _| note != note_id);
    }
}

impl ContentProvider for MemoryContentProvider {
    fn load(&self, note_id: &str, version_id: &str) -> Result<String, ContentError> {
        self.versions
            .get(&(note_id.to_string(), version_id.to_string()))
            .cloned()
            .ok_or_else(|| ContentError::NotFound {
                note_id: note_id.to_string(),
                version_id: version_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_remove() {
        let mut provider = MemoryContentProvider::new();
        provider.insert("note", "v1", "first");
        provider.insert_bytes("note", "v2", b"caf\xc3\xa9 \xff");

        assert_eq!(provider.load("note", "v1").unwrap(), "first");
        assert_eq!(provider.load("note", "v2").unwrap(), "café \u{fffd}");

        provider.remove_note("note");
        assert_eq!(
            provider.load("note", "v1"),
            Err(ContentError::NotFound {
                note_id: "note".to_string(),
                version_id: "v1".to_string(),
            })
        );
    }
}

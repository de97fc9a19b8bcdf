//! ShareRegistry: name-indexed view of every managed share in a document.
//!
//! The registry is rebuilt from the document at the start of every operation
//! rather than cached between calls, so it can never disagree with the file.
//!
//! # IndexMap choice
//!
//! An `IndexMap<String, Share>` gives O(1) lookup by name while keeping
//! document order for enumeration, which is the order the administrator
//! sees the shares in the file.

use indexmap::IndexMap;

use crate::document::{parser::extract_share, Document};
use crate::share::Share;

/// In-memory collection of the managed shares of one [`Document`].
#[derive(Debug, Clone, Default)]
pub struct ShareRegistry {
    by_name: IndexMap<String, Share>,
}

impl ShareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects every managed block of `doc`.
    ///
    /// When a hand-edited file repeats a section name, the first occurrence
    /// is the one the registry (and every mutation) refers to.
    pub fn from_document(doc: &Document) -> Self {
        let mut by_name = IndexMap::new();
        for share in doc.blocks().iter().filter_map(extract_share) {
            by_name.entry(share.name.clone()).or_insert(share);
        }
        Self { by_name }
    }

    /// Returns the share named exactly `name`.
    pub fn lookup(&self, name: &str) -> Option<&Share> {
        self.by_name.get(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Whether a share other than `except` already uses `name`, ignoring
    /// ASCII case.  Samba matches section names case-insensitively, so
    /// `[Media]` next to `[media]` would shadow one of them.
    pub fn name_taken(&self, name: &str, except: Option<&str>) -> bool {
        self.names()
            .filter(|existing| Some(*existing) != except)
            .any(|existing| existing.eq_ignore_ascii_case(name))
    }

    /// Returns a snapshot of all shares in document order.
    pub fn all(&self) -> Vec<Share> {
        self.by_name.values().cloned().collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

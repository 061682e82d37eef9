//! Documentation lookup, keyed by fully-qualified native path.

use std::collections::HashMap;

/// Read-only documentation store consulted by the builder.
pub trait DocumentationProvider {
    fn documentation(&self, native_path: &str) -> Option<String>;
}

/// In-memory store, e.g. loaded by the caller from a doc-comment database.
#[derive(Debug, Clone, Default)]
pub struct DocumentationMap {
    entries: HashMap<String, String>,
}

impl DocumentationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn insert(&mut self, native_path: &str, text: &str) {
        self.entries.insert(native_path.to_string(), text.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DocumentationProvider for DocumentationMap {
    fn documentation(&self, native_path: &str) -> Option<String> {
        self.entries.get(native_path).cloned()
    }
}

//! Document type registry.
//!
//! In-memory registry of document type definitions, synced from the
//! external schema service at startup and cached for fast synchronous
//! lookups during request handling.

use dashmap::DashMap;
use tracing::info;

use crate::models::DocumentType;

/// Registry of document types.
#[derive(Default)]
pub struct SchemaRegistry {
    types: DashMap<String, DocumentType>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a document type definition.
    pub fn register(&self, doc_type: DocumentType) {
        info!(alias = %doc_type.alias, "registered document type");
        self.types.insert(doc_type.alias.clone(), doc_type);
    }

    /// Get a document type by alias.
    pub fn get(&self, alias: &str) -> Option<DocumentType> {
        self.types.get(alias).map(|r| r.clone())
    }

    /// List all document types.
    pub fn list(&self) -> Vec<DocumentType> {
        self.types.iter().map(|r| r.value().clone()).collect()
    }

    /// Remove a document type. Returns true when it existed.
    pub fn remove(&self, alias: &str) -> bool {
        self.types.remove(alias).is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn page_type() -> DocumentType {
        DocumentType {
            alias: "page".to_string(),
            label: "Page".to_string(),
            varies_by_culture: false,
            allowed_at_root: true,
            allowed_children: Vec::new(),
            properties: Vec::new(),
        }
    }

    #[test]
    fn register_and_get() {
        let registry = SchemaRegistry::new();
        assert!(registry.get("page").is_none());

        registry.register(page_type());
        assert_eq!(registry.get("page").map(|t| t.label), Some("Page".to_string()));
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn remove_existing() {
        let registry = SchemaRegistry::new();
        registry.register(page_type());
        assert!(registry.remove("page"));
        assert!(!registry.remove("page"));
    }
}

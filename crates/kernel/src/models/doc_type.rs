//! Document type definitions.
//!
//! Document types define the structure of documents: which properties they
//! carry, whether content varies by culture, and where in the tree they are
//! allowed to live.

use serde::{Deserialize, Serialize};

/// Document type definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentType {
    /// Machine alias (e.g., "article", "landingPage").
    pub alias: String,

    /// Human-readable label.
    pub label: String,

    /// Whether localized properties vary by culture.
    pub varies_by_culture: bool,

    /// Whether documents of this type may live at the tree root.
    pub allowed_at_root: bool,

    /// Type aliases allowed as direct children.
    pub allowed_children: Vec<String>,

    /// Property definitions.
    pub properties: Vec<PropertyDefinition>,
}

/// One property on a document type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    /// Property alias (field key).
    pub alias: String,

    /// Human-readable label.
    pub label: String,

    /// Whether a non-empty value is required to publish.
    pub required: bool,

    /// Optional regex a string value must match to publish.
    pub validation_regex: Option<String>,

    /// Whether the property varies by culture. Invariant properties live
    /// in the `"*"` field bucket even on varying types.
    pub varies_by_culture: bool,
}

impl DocumentType {
    /// Whether `child_alias` is allowed as a direct child.
    pub fn allows_child(&self, child_alias: &str) -> bool {
        self.allowed_children.iter().any(|a| a == child_alias)
    }

    /// Look up a property definition by alias.
    pub fn property(&self, alias: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.alias == alias)
    }
}

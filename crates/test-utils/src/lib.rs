//! Stampa test utilities.
//!
//! Fixture builders for workflow engine tests: document types, languages,
//! users, and variant requests with sensible defaults.

use uuid::Uuid;

use stampa_kernel::models::{
    DocumentType, Language, PermissionSet, PropertyDefinition, UserContext, VariantRequest,
};

/// A varying document type with a required, culture-varying `title`.
pub fn varying_type(alias: &str) -> DocumentType {
    DocumentType {
        alias: alias.to_string(),
        label: alias.to_string(),
        varies_by_culture: true,
        allowed_at_root: true,
        allowed_children: Vec::new(),
        properties: vec![required_property("title", true)],
    }
}

/// An invariant document type with a required `title`.
pub fn invariant_type(alias: &str) -> DocumentType {
    DocumentType {
        alias: alias.to_string(),
        label: alias.to_string(),
        varies_by_culture: false,
        allowed_at_root: true,
        allowed_children: Vec::new(),
        properties: vec![required_property("title", false)],
    }
}

/// A required property definition.
pub fn required_property(alias: &str, varies_by_culture: bool) -> PropertyDefinition {
    PropertyDefinition {
        alias: alias.to_string(),
        label: alias.to_string(),
        required: true,
        validation_regex: None,
        varies_by_culture,
    }
}

/// Language fixture.
pub fn lang(iso_code: &str, mandatory: bool) -> Language {
    Language::new(iso_code, iso_code, mandatory)
}

/// An admin user.
pub fn admin() -> UserContext {
    UserContext::admin(Uuid::now_v7())
}

/// An editor with the given default permission letters.
pub fn editor(letters: &str) -> UserContext {
    UserContext::editor(Uuid::now_v7(), PermissionSet::from_letters(letters))
}

/// Builder for variant requests.
#[derive(Debug, Clone)]
pub struct TestVariant {
    request: VariantRequest,
}

impl TestVariant {
    /// A culture variant named after its culture, with a valid title.
    pub fn culture(code: &str) -> Self {
        Self {
            request: VariantRequest {
                culture: Some(code.to_string()),
                name: format!("Name {code}"),
                publish: false,
                fields: serde_json::json!({ "title": format!("Title {code}") }),
                schedule: None,
            },
        }
    }

    /// The invariant variant, with a valid title.
    pub fn invariant(name: &str) -> Self {
        Self {
            request: VariantRequest {
                culture: None,
                name: name.to_string(),
                publish: false,
                fields: serde_json::json!({ "title": format!("Title of {name}") }),
                schedule: None,
            },
        }
    }

    /// Request publication of this variant.
    pub fn publish(mut self) -> Self {
        self.request.publish = true;
        self
    }

    /// Replace the variant name.
    pub fn named(mut self, name: &str) -> Self {
        self.request.name = name.to_string();
        self
    }

    /// Set a field value.
    pub fn field(mut self, alias: &str, value: serde_json::Value) -> Self {
        self.request.fields[alias] = value;
        self
    }

    /// Finish the builder.
    pub fn build(self) -> VariantRequest {
        self.request
    }
}

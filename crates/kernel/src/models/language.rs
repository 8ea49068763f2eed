//! Language model.
//!
//! Languages are site-level configuration. The engine fetches a read-only
//! snapshot per request from the [`crate::store::LanguageCatalog`]; a
//! mandatory language must be published before a varying document counts
//! as fully published.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Language record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Language {
    /// ISO culture code (e.g., "en-us", "da-dk").
    pub iso_code: String,

    /// Human-readable label (e.g., "English (United States)").
    pub label: String,

    /// Whether a published variant in this language is required before a
    /// varying document is considered fully published.
    pub mandatory: bool,

    /// Whether this is the site default language.
    pub is_default: bool,
}

impl Language {
    /// Create a language record, normalizing the code to lowercase.
    pub fn new(iso_code: &str, label: &str, mandatory: bool) -> Self {
        Self {
            iso_code: iso_code.to_lowercase(),
            label: label.to_string(),
            mandatory,
            is_default: false,
        }
    }
}

/// Validate that a culture code follows BCP 47 shape.
///
/// Accepts: lowercase alpha 2-3 char primary subtag, optionally followed by
/// hyphen-separated alphanumeric subtags (e.g., "en", "en-us", "zh-hans").
pub fn validate_iso_code(code: &str) -> Result<()> {
    if code.is_empty() || code.len() > 12 {
        anyhow::bail!("culture code must be 1-12 characters, got '{code}'");
    }

    let mut parts = code.split('-');

    match parts.next() {
        Some(primary) if (2..=3).contains(&primary.len()) => {
            if !primary.bytes().all(|b| b.is_ascii_lowercase()) {
                anyhow::bail!("culture code primary subtag must be lowercase letters, got '{code}'");
            }
        }
        _ => {
            anyhow::bail!("culture code must start with a 2-3 letter primary subtag, got '{code}'");
        }
    }

    for subtag in parts {
        if subtag.is_empty()
            || subtag.len() > 8
            || !subtag.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            anyhow::bail!(
                "culture code subtag must be 1-8 alphanumeric characters, got '{subtag}' in '{code}'"
            );
        }
    }

    Ok(())
}

//! Culture validation engine.
//!
//! Pure functions deciding whether a requested set of culture variants may
//! publish. The mandatory-language gate runs first and consults only the
//! requested variants plus already-published state; per-culture property
//! validation then short-circuits on the first failing culture. Types that
//! do not vary by culture bypass both steps and take the single invariant
//! path in the workflow service.

use regex::Regex;

use crate::models::{Document, DocumentType, INVARIANT_CULTURE, Language, VariantRequest};

/// Result of validating a publish request across cultures.
#[derive(Debug, Clone, PartialEq)]
pub enum CultureValidation {
    /// All requested cultures may publish.
    Ok {
        /// Culture codes requested and validated for publication.
        publishing: Vec<String>,
    },
    /// A mandatory language is neither requested nor already published.
    MissingMandatory { culture: String },
    /// A requested culture failed property validation. Cultures validated
    /// before it are tentatively valid, but the whole request fails.
    InvalidProperties {
        culture: String,
        properties: Vec<String>,
    },
}

impl CultureValidation {
    /// Whether the request may proceed.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

/// Validate a publish request for a varying document.
///
/// `requests` are the submitted variants; cultures with `publish = false`
/// participate in nothing beyond the save that already happened. The
/// invariant culture is implied by publishing any variant and is never a
/// separate entry here.
pub fn validate_for_publish(
    doc: &Document,
    doc_type: &DocumentType,
    requests: &[VariantRequest],
    languages: &[Language],
) -> CultureValidation {
    debug_assert!(doc_type.varies_by_culture);

    // Step 1: every mandatory language must be requested for publish or
    // already published.
    for language in languages.iter().filter(|l| l.mandatory) {
        let requested = requests.iter().any(|r| {
            r.publish && r.culture.as_deref() == Some(language.iso_code.as_str())
        });
        if !requested && !doc.is_culture_published(Some(&language.iso_code)) {
            return CultureValidation::MissingMandatory {
                culture: language.iso_code.clone(),
            };
        }
    }

    // Step 2: per-culture property validity, first failure wins.
    let mut publishing = Vec::new();
    for request in requests.iter().filter(|r| r.publish) {
        let Some(culture) = request.culture.as_deref() else {
            // Varying types key variants by culture codes only
            return CultureValidation::InvalidProperties {
                culture: INVARIANT_CULTURE.to_string(),
                properties: vec!["culture".to_string()],
            };
        };

        let offending = validate_culture(doc, doc_type, Some(culture));
        if !offending.is_empty() {
            return CultureValidation::InvalidProperties {
                culture: culture.to_string(),
                properties: offending,
            };
        }
        publishing.push(culture.to_string());
    }

    CultureValidation::Ok { publishing }
}

/// Validate the properties of one culture bucket against the document
/// type. Returns the offending property aliases (empty when valid).
///
/// Invariant properties are read from the `"*"` bucket even on varying
/// types; `culture = None` validates the invariant bucket alone.
pub fn validate_culture(
    doc: &Document,
    doc_type: &DocumentType,
    culture: Option<&str>,
) -> Vec<String> {
    let mut offending = Vec::new();

    if doc.name(culture).is_none_or(|n| n.trim().is_empty()) {
        offending.push("name".to_string());
    }

    for property in &doc_type.properties {
        let bucket = if property.varies_by_culture {
            culture.unwrap_or(INVARIANT_CULTURE)
        } else {
            INVARIANT_CULTURE
        };
        let value = doc.field_bucket(bucket).and_then(|b| b.get(&property.alias));

        let present = match value {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        };

        if property.required && !present {
            offending.push(property.alias.clone());
            continue;
        }

        if let (Some(pattern), Some(serde_json::Value::String(s))) =
            (&property.validation_regex, value)
        {
            match Regex::new(pattern) {
                Ok(regex) if !regex.is_match(s) => offending.push(property.alias.clone()),
                // A broken pattern never blocks publication
                _ => {}
            }
        }
    }

    offending
}

//! Document model: the hierarchical, multi-language content record.
//!
//! Documents form a tree rooted at [`ROOT_ID`]. Each document carries a
//! materialized path of ancestor ids (comma-joined, ending with its own id)
//! used for prefix containment checks, and a per-culture publish state.
//! Soft-deleted documents live under the recycle bin sentinel
//! [`RECYCLE_BIN_ID`] with `trashed` kept in sync.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved parent id of top-level documents.
pub const ROOT_ID: i64 = -1;

/// Reserved ancestor id of soft-deleted documents.
pub const RECYCLE_BIN_ID: i64 = -20;

/// Field-bucket key for content that does not vary by culture.
pub const INVARIANT_CULTURE: &str = "*";

/// Map an optional culture code to its field-bucket key.
pub fn culture_key(culture: Option<&str>) -> &str {
    culture.unwrap_or(INVARIANT_CULTURE)
}

/// Release/expiry schedule for one culture bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CultureSchedule {
    /// Unix timestamp before which the culture may not publish.
    pub release_at: Option<i64>,

    /// Unix timestamp after which the culture may not publish.
    pub expire_at: Option<i64>,
}

/// Content record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Node id. Assigned by the store on insert.
    pub id: i64,

    /// Stable globally-unique identifier (UUIDv7).
    pub key: Uuid,

    /// Parent node id ([`ROOT_ID`] for top-level documents).
    pub parent_id: i64,

    /// Materialized path: comma-joined ancestor ids ending with `id`,
    /// e.g. `"-1,1051,1052"`.
    pub path: String,

    /// Document type alias.
    pub doc_type: String,

    /// Whether the document lives in the recycle bin.
    pub trashed: bool,

    /// Position among siblings.
    pub sort_order: i32,

    /// Optimistic concurrency stamp, bumped by the store on every save.
    pub version: i64,

    /// Invariant publish flag (the whole-document flag for non-varying
    /// types; for varying types it is true when any culture is published).
    pub published: bool,

    /// Pending changes since the last publish.
    pub edited: bool,

    /// Culture codes currently published (empty for non-varying types).
    pub published_cultures: BTreeSet<String>,

    /// Display name per culture bucket (`"*"` for the invariant name).
    pub names: BTreeMap<String, String>,

    /// Property values, keyed by culture bucket then property alias.
    pub fields: serde_json::Value,

    /// Release/expiry schedule per culture bucket.
    pub schedule: BTreeMap<String, CultureSchedule>,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,
}

/// One requested culture variant in a save/publish call.
#[derive(Debug, Clone, Deserialize)]
pub struct VariantRequest {
    /// Culture code, or None for invariant content.
    pub culture: Option<String>,

    /// Display name for this variant.
    pub name: String,

    /// Whether this variant is requested for publication.
    pub publish: bool,

    /// Property values to merge into the variant's field bucket
    /// (object keyed by property alias).
    pub fields: serde_json::Value,

    /// Optional schedule update for this variant.
    pub schedule: Option<CultureSchedule>,
}

impl Document {
    /// Create an unsaved document under the given parent. The store
    /// assigns `id` and completes `path` on insert.
    pub fn new(parent_id: i64, doc_type: &str, now: i64) -> Self {
        Self {
            id: 0,
            key: Uuid::now_v7(),
            parent_id,
            path: String::new(),
            doc_type: doc_type.to_string(),
            trashed: false,
            sort_order: 0,
            version: 0,
            published: false,
            edited: false,
            published_cultures: BTreeSet::new(),
            names: BTreeMap::new(),
            fields: serde_json::json!({}),
            schedule: BTreeMap::new(),
            created: now,
            changed: now,
        }
    }

    /// Whether this document has never been saved.
    pub fn is_new(&self) -> bool {
        self.id == 0
    }

    /// Whether any culture (or the invariant state) is published.
    pub fn is_published_any(&self) -> bool {
        self.published || !self.published_cultures.is_empty()
    }

    /// Whether the given culture is published (None checks the invariant
    /// flag).
    pub fn is_culture_published(&self, culture: Option<&str>) -> bool {
        match culture {
            Some(c) => self.published_cultures.contains(c),
            None => self.published,
        }
    }

    /// Parse the materialized path into ancestor ids (including own id).
    pub fn path_segments(&self) -> Vec<i64> {
        self.path
            .split(',')
            .filter_map(|s| s.parse::<i64>().ok())
            .collect()
    }

    /// Ancestor ids between the root sentinels and this document,
    /// deepest last, excluding the document itself.
    pub fn ancestor_ids(&self) -> Vec<i64> {
        let segments = self.path_segments();
        segments
            .into_iter()
            .filter(|&s| s != ROOT_ID && s != RECYCLE_BIN_ID && s != self.id)
            .collect()
    }

    /// Whether the path contains `id` as an ancestor segment.
    pub fn path_contains(&self, id: i64) -> bool {
        self.path_segments().contains(&id)
    }

    /// Build a child path from a parent path and a node id.
    pub fn build_path(parent_path: &str, id: i64) -> String {
        if parent_path.is_empty() {
            format!("{ROOT_ID},{id}")
        } else {
            format!("{parent_path},{id}")
        }
    }

    /// Display name for a culture bucket, falling back to the invariant
    /// name.
    pub fn name(&self, culture: Option<&str>) -> Option<&str> {
        self.names
            .get(culture_key(culture))
            .or_else(|| self.names.get(INVARIANT_CULTURE))
            .map(String::as_str)
    }

    /// Field bucket for a culture key, if present.
    pub fn field_bucket(&self, key: &str) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.fields.get(key).and_then(|v| v.as_object())
    }

    /// Apply variant edits in memory. Property values route to the bucket
    /// their definition dictates: invariant properties always land in the
    /// `"*"` bucket, even when submitted on a culture variant. Returns
    /// true when any name, field, or schedule actually changed.
    pub fn apply_variants(
        &mut self,
        doc_type: &crate::models::DocumentType,
        requests: &[VariantRequest],
        now: i64,
    ) -> bool {
        let mut changed = false;

        for request in requests {
            let key = culture_key(request.culture.as_deref()).to_string();

            let name = request.name.trim().to_string();
            if self.names.get(&key) != Some(&name) {
                self.names.insert(key.clone(), name);
                changed = true;
            }

            if let Some(incoming) = request.fields.as_object() {
                for (alias, value) in incoming {
                    let bucket = match doc_type.property(alias) {
                        Some(p) if !p.varies_by_culture => INVARIANT_CULTURE,
                        _ => key.as_str(),
                    };
                    changed |= self.set_field(bucket, alias, value);
                }
            }

            if let Some(schedule) = &request.schedule {
                if self.schedule.get(&key) != Some(schedule) {
                    self.schedule.insert(key, schedule.clone());
                    changed = true;
                }
            }
        }

        if changed {
            self.edited = true;
            self.changed = now;
        }

        changed
    }

    /// Set one field value in a culture bucket. Returns true when the
    /// stored value changed.
    fn set_field(&mut self, bucket: &str, alias: &str, value: &serde_json::Value) -> bool {
        let Some(root) = self.fields.as_object_mut() else {
            return false;
        };
        let entry = root
            .entry(bucket.to_string())
            .or_insert_with(|| serde_json::json!({}));
        match entry.as_object_mut() {
            Some(b) if b.get(alias) != Some(value) => {
                b.insert(alias.to_string(), value.clone());
                true
            }
            _ => false,
        }
    }

    /// Mark the given cultures published, atomically for the whole set.
    pub fn mark_cultures_published(&mut self, cultures: &[String], now: i64) {
        for culture in cultures {
            self.published_cultures.insert(culture.clone());
        }
        self.published = true;
        self.edited = false;
        self.changed = now;
    }

    /// Mark the invariant state published.
    pub fn mark_published(&mut self, now: i64) {
        self.published = true;
        self.edited = false;
        self.changed = now;
    }

    /// Demote one culture (or everything when None). Returns the cultures
    /// that were actually demoted.
    pub fn demote(&mut self, culture: Option<&str>, now: i64) -> Vec<String> {
        let demoted: Vec<String> = match culture {
            Some(c) => {
                if self.published_cultures.remove(c) {
                    vec![c.to_string()]
                } else {
                    Vec::new()
                }
            }
            None => {
                let all: Vec<String> = self.published_cultures.iter().cloned().collect();
                self.published_cultures.clear();
                all
            }
        };

        if culture.is_none() || self.published_cultures.is_empty() {
            self.published = false;
        }
        if !demoted.is_empty() || culture.is_none() {
            self.changed = now;
        }

        demoted
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn doc_at(path: &str) -> Document {
        let mut doc = Document::new(ROOT_ID, "page", 0);
        doc.id = path.rsplit(',').next().unwrap().parse().unwrap();
        doc.path = path.to_string();
        doc
    }

    #[test]
    fn path_parsing() {
        let doc = doc_at("-1,1051,1052");
        assert_eq!(doc.path_segments(), vec![-1, 1051, 1052]);
        assert_eq!(doc.ancestor_ids(), vec![1051]);
        assert!(doc.path_contains(1051));
        assert!(!doc.path_contains(2000));
    }

    #[test]
    fn build_path_appends_id() {
        assert_eq!(Document::build_path("-1,10", 11), "-1,10,11");
        assert_eq!(Document::build_path("", 11), "-1,11");
    }

    #[test]
    fn ancestors_exclude_sentinels_and_self() {
        let doc = doc_at("-1,-20,300,301");
        assert_eq!(doc.ancestor_ids(), vec![300]);
    }

    fn article_type() -> crate::models::DocumentType {
        crate::models::DocumentType {
            alias: "article".to_string(),
            label: "Article".to_string(),
            varies_by_culture: true,
            allowed_at_root: true,
            allowed_children: Vec::new(),
            properties: vec![
                crate::models::PropertyDefinition {
                    alias: "title".to_string(),
                    label: "Title".to_string(),
                    required: true,
                    validation_regex: None,
                    varies_by_culture: true,
                },
                crate::models::PropertyDefinition {
                    alias: "footer".to_string(),
                    label: "Footer".to_string(),
                    required: false,
                    validation_regex: None,
                    varies_by_culture: false,
                },
            ],
        }
    }

    #[test]
    fn apply_variants_detects_changes() {
        let mut doc = Document::new(ROOT_ID, "article", 0);
        let request = VariantRequest {
            culture: Some("en-us".to_string()),
            name: "Home".to_string(),
            publish: false,
            fields: serde_json::json!({"title": "Welcome"}),
            schedule: None,
        };

        assert!(doc.apply_variants(&article_type(), std::slice::from_ref(&request), 100));
        assert!(doc.edited);
        assert_eq!(doc.name(Some("en-us")), Some("Home"));
        assert_eq!(doc.fields["en-us"]["title"], "Welcome");

        // Same content again is a no-op
        doc.edited = false;
        assert!(!doc.apply_variants(&article_type(), std::slice::from_ref(&request), 200));
        assert!(!doc.edited);
    }

    #[test]
    fn invariant_properties_route_to_the_star_bucket() {
        let mut doc = Document::new(ROOT_ID, "article", 0);
        let request = VariantRequest {
            culture: Some("da-dk".to_string()),
            name: "Hjem".to_string(),
            publish: false,
            fields: serde_json::json!({"title": "Velkommen", "footer": "fine print"}),
            schedule: None,
        };

        assert!(doc.apply_variants(&article_type(), std::slice::from_ref(&request), 100));
        assert_eq!(doc.fields["da-dk"]["title"], "Velkommen");
        assert_eq!(doc.fields["*"]["footer"], "fine print");
    }

    #[test]
    fn demote_last_culture_clears_published() {
        let mut doc = Document::new(ROOT_ID, "page", 0);
        doc.mark_cultures_published(&["en-us".to_string(), "da-dk".to_string()], 10);
        assert!(doc.is_published_any());

        assert_eq!(doc.demote(Some("en-us"), 20), vec!["en-us".to_string()]);
        assert!(doc.published, "still published while a culture remains");

        assert_eq!(doc.demote(Some("da-dk"), 30), vec!["da-dk".to_string()]);
        assert!(!doc.published);
        assert!(!doc.is_published_any());
    }

    #[test]
    fn demote_unscoped_clears_everything() {
        let mut doc = Document::new(ROOT_ID, "page", 0);
        doc.mark_cultures_published(&["en-us".to_string(), "da-dk".to_string()], 10);

        let demoted = doc.demote(None, 20);
        assert_eq!(demoted.len(), 2);
        assert!(doc.published_cultures.is_empty());
        assert!(!doc.published);
    }

    #[test]
    fn name_falls_back_to_invariant() {
        let mut doc = Document::new(ROOT_ID, "page", 0);
        doc.names
            .insert(INVARIANT_CULTURE.to_string(), "Fallback".to_string());
        assert_eq!(doc.name(Some("da-dk")), Some("Fallback"));
    }
}

//! In-memory store implementations.
//!
//! Backs integration tests and lightweight embedders. Semantics mirror the
//! Postgres store: version-checked saves, path rewrites on move, fresh
//! ids/keys on copy.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use super::{ApprovalRequest, ChildOrder, ChildQuery, DocumentStore, LanguageCatalog, Page,
            PermissionStore};
use crate::error::{EngineError, EngineResult};
use crate::models::permission::normalize_assignment;
use crate::models::{Document, Language, PermissionSet, RECYCLE_BIN_ID, ROOT_ID};

/// Sentinel path prefix for a reserved parent id.
fn sentinel_path(parent_id: i64) -> Option<String> {
    match parent_id {
        ROOT_ID => Some(ROOT_ID.to_string()),
        RECYCLE_BIN_ID => Some(format!("{ROOT_ID},{RECYCLE_BIN_ID}")),
        _ => None,
    }
}

struct MemState {
    docs: BTreeMap<i64, Document>,
    next_id: i64,
    approvals: Vec<ApprovalRequest>,
    relations: Vec<(i64, i64)>,
}

/// In-memory document store.
pub struct MemoryStore {
    state: Mutex<MemState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            state: Mutex::new(MemState {
                docs: BTreeMap::new(),
                next_id: 1000,
                approvals: Vec::new(),
                relations: Vec::new(),
            }),
        }
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of queued approval requests.
    pub fn approvals(&self) -> Vec<ApprovalRequest> {
        self.state.lock().approvals.clone()
    }

    /// Snapshot of (copy, original) relations recorded by copies.
    pub fn relations(&self) -> Vec<(i64, i64)> {
        self.state.lock().relations.clone()
    }

    /// Total number of stored documents.
    pub fn len(&self) -> usize {
        self.state.lock().docs.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.state.lock().docs.is_empty()
    }

    fn parent_path(state: &MemState, parent_id: i64) -> EngineResult<String> {
        if let Some(path) = sentinel_path(parent_id) {
            return Ok(path);
        }
        state
            .docs
            .get(&parent_id)
            .map(|p| p.path.clone())
            .ok_or(EngineError::NotFound)
    }

    fn next_sort_order(state: &MemState, parent_id: i64) -> i32 {
        state
            .docs
            .values()
            .filter(|d| d.parent_id == parent_id)
            .map(|d| d.sort_order + 1)
            .max()
            .unwrap_or(0)
    }

    /// Ids in the subtree rooted at `path`, parents before children.
    fn subtree_ids(state: &MemState, path: &str) -> Vec<i64> {
        let prefix = format!("{path},");
        let mut ids: Vec<i64> = state
            .docs
            .values()
            .filter(|d| d.path == path || d.path.starts_with(&prefix))
            .map(|d| d.id)
            .collect();
        ids.sort_by_key(|id| state.docs[id].path.matches(',').count());
        ids
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: i64) -> EngineResult<Option<Document>> {
        Ok(self.state.lock().docs.get(&id).cloned())
    }

    async fn get_by_key(&self, key: Uuid) -> EngineResult<Option<Document>> {
        Ok(self
            .state
            .lock()
            .docs
            .values()
            .find(|d| d.key == key)
            .cloned())
    }

    async fn children(&self, parent_id: i64, query: &ChildQuery) -> EngineResult<Page<Document>> {
        let state = self.state.lock();
        let mut items: Vec<Document> = state
            .docs
            .values()
            .filter(|d| d.parent_id == parent_id)
            .filter(|d| match &query.filter {
                Some(filter) => {
                    let needle = filter.to_lowercase();
                    d.names.values().any(|n| n.to_lowercase().contains(&needle))
                }
                None => true,
            })
            .cloned()
            .collect();

        match query.order {
            ChildOrder::SortOrder => items.sort_by_key(|d| d.sort_order),
            ChildOrder::Name => items.sort_by(|a, b| a.name(None).cmp(&b.name(None))),
            ChildOrder::Changed => items.sort_by_key(|d| std::cmp::Reverse(d.changed)),
        }

        let total = items.len() as i64;
        let start = (query.page * query.per_page).max(0) as usize;
        let items = items
            .into_iter()
            .skip(start)
            .take(query.per_page.max(0) as usize)
            .collect();

        Ok(Page { items, total })
    }

    async fn child_ids(&self, parent_id: i64) -> EngineResult<Vec<i64>> {
        let state = self.state.lock();
        let mut children: Vec<&Document> = state
            .docs
            .values()
            .filter(|d| d.parent_id == parent_id)
            .collect();
        children.sort_by_key(|d| d.sort_order);
        Ok(children.iter().map(|d| d.id).collect())
    }

    async fn insert(&self, mut doc: Document) -> EngineResult<Document> {
        let mut state = self.state.lock();
        let parent_path = Self::parent_path(&state, doc.parent_id)?;

        doc.id = state.next_id;
        state.next_id += 1;
        doc.path = Document::build_path(&parent_path, doc.id);
        doc.trashed = doc.path_contains(RECYCLE_BIN_ID);
        doc.sort_order = Self::next_sort_order(&state, doc.parent_id);
        doc.version = 1;

        state.docs.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn save(&self, doc: &Document) -> EngineResult<Document> {
        let mut state = self.state.lock();
        let stored = state.docs.get(&doc.id).ok_or(EngineError::NotFound)?;
        if stored.version != doc.version {
            return Err(EngineError::ConcurrencyConflict);
        }

        let mut saved = doc.clone();
        saved.version += 1;
        // Tree position changes only through move_subtree
        saved.parent_id = stored.parent_id;
        saved.path = stored.path.clone();
        state.docs.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn delete_subtree(&self, id: i64) -> EngineResult<u64> {
        let mut state = self.state.lock();
        let path = state
            .docs
            .get(&id)
            .ok_or(EngineError::NotFound)?
            .path
            .clone();
        let ids = Self::subtree_ids(&state, &path);
        for id in &ids {
            state.docs.remove(id);
        }
        Ok(ids.len() as u64)
    }

    async fn move_subtree(&self, id: i64, new_parent_id: i64) -> EngineResult<Document> {
        let mut state = self.state.lock();
        let doc = state.docs.get(&id).ok_or(EngineError::NotFound)?.clone();
        let parent_path = Self::parent_path(&state, new_parent_id)?;

        let old_prefix = doc.path.clone();
        let new_prefix = Document::build_path(&parent_path, id);
        let trashed = new_prefix
            .split(',')
            .any(|s| s == RECYCLE_BIN_ID.to_string());
        let sort_order = Self::next_sort_order(&state, new_parent_id);

        for member_id in Self::subtree_ids(&state, &old_prefix) {
            if let Some(member) = state.docs.get_mut(&member_id) {
                member.path = format!("{new_prefix}{}", &member.path[old_prefix.len()..]);
                member.trashed = trashed;
            }
        }

        let root = state.docs.get_mut(&id).ok_or(EngineError::NotFound)?;
        root.parent_id = new_parent_id;
        root.sort_order = sort_order;
        Ok(root.clone())
    }

    async fn copy_subtree(
        &self,
        id: i64,
        target_parent_id: i64,
        recursive: bool,
        relate_to_original: bool,
    ) -> EngineResult<Document> {
        let mut state = self.state.lock();
        let source = state.docs.get(&id).ok_or(EngineError::NotFound)?.clone();
        let target_path = Self::parent_path(&state, target_parent_id)?;

        let source_ids = if recursive {
            Self::subtree_ids(&state, &source.path)
        } else {
            vec![id]
        };

        let mut id_map: BTreeMap<i64, i64> = BTreeMap::new();
        let mut copy_root = None;

        for source_id in source_ids {
            let original = state.docs[&source_id].clone();
            let new_id = state.next_id;
            state.next_id += 1;
            id_map.insert(source_id, new_id);

            let (parent_id, parent_path) = if source_id == id {
                (target_parent_id, target_path.clone())
            } else {
                let mapped = id_map[&original.parent_id];
                (mapped, state.docs[&mapped].path.clone())
            };

            let mut copy = original;
            copy.id = new_id;
            copy.key = Uuid::now_v7();
            copy.parent_id = parent_id;
            copy.path = Document::build_path(&parent_path, new_id);
            copy.trashed = copy.path_contains(RECYCLE_BIN_ID);
            copy.sort_order = if source_id == id {
                Self::next_sort_order(&state, parent_id)
            } else {
                copy.sort_order
            };
            copy.version = 1;
            copy.published = false;
            copy.edited = true;
            copy.published_cultures.clear();

            if relate_to_original {
                state.relations.push((new_id, source_id));
            }
            if source_id == id {
                copy_root = Some(copy.clone());
            }
            state.docs.insert(new_id, copy);
        }

        copy_root.ok_or(EngineError::NotFound)
    }

    async fn set_sort_orders(&self, parent_id: i64, ordered_ids: &[i64]) -> EngineResult<()> {
        let mut state = self.state.lock();
        for (position, id) in ordered_ids.iter().enumerate() {
            let doc = state.docs.get_mut(id).ok_or(EngineError::NotFound)?;
            if doc.parent_id != parent_id {
                return Err(EngineError::StructuralViolation(format!(
                    "document {id} is not a child of {parent_id}"
                )));
            }
            doc.sort_order = position as i32;
        }
        Ok(())
    }

    async fn queue_approval(
        &self,
        id: i64,
        cultures: &[String],
        user_id: Uuid,
    ) -> EngineResult<()> {
        let mut state = self.state.lock();
        if !state.docs.contains_key(&id) {
            return Err(EngineError::NotFound);
        }
        let requested_at = chrono::Utc::now().timestamp();
        state.approvals.push(ApprovalRequest {
            node_id: id,
            cultures: cultures.to_vec(),
            user_id,
            requested_at,
        });
        Ok(())
    }
}

/// In-memory language catalog.
#[derive(Default)]
pub struct MemoryLanguageCatalog {
    languages: RwLock<Vec<Language>>,
}

impl MemoryLanguageCatalog {
    /// Create a catalog with the given languages.
    pub fn new(languages: Vec<Language>) -> Self {
        Self {
            languages: RwLock::new(languages),
        }
    }

    /// Replace the language set.
    pub fn set(&self, languages: Vec<Language>) {
        *self.languages.write() = languages;
    }
}

#[async_trait]
impl LanguageCatalog for MemoryLanguageCatalog {
    async fn all(&self) -> EngineResult<Vec<Language>> {
        Ok(self.languages.read().clone())
    }
}

/// In-memory permission assignments.
#[derive(Default)]
pub struct MemoryPermissionStore {
    assigned: RwLock<BTreeMap<i64, PermissionSet>>,
}

impl MemoryPermissionStore {
    /// Create an empty permission store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted assignments.
    pub fn assignment_count(&self) -> usize {
        self.assigned.read().len()
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn assigned(&self, node_id: i64) -> EngineResult<Option<PermissionSet>> {
        Ok(self.assigned.read().get(&node_id).cloned())
    }

    async fn save_assigned(
        &self,
        node_id: i64,
        defaults: &PermissionSet,
        assigned: PermissionSet,
    ) -> EngineResult<()> {
        let mut map = self.assigned.write();
        match normalize_assignment(defaults, assigned) {
            Some(set) => {
                map.insert(node_id, set);
            }
            None => {
                map.remove(&node_id);
            }
        }
        Ok(())
    }
}

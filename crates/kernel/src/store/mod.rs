//! Persistence abstraction layer.
//!
//! All document, language, and permission reads/writes go through these
//! traits. The engine is pure decision logic between collaborator calls;
//! swapping the backing store (Postgres in production, in-memory in tests
//! and embedders) never changes a call site.

mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

pub use memory::{MemoryLanguageCatalog, MemoryPermissionStore, MemoryStore};
pub use postgres::{PostgresLanguageCatalog, PostgresPermissionStore, PostgresStore};

use crate::error::EngineResult;
use crate::models::{Document, Language, PermissionSet};

/// Ordering for paged children queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildOrder {
    /// Explicit sibling order (default).
    #[default]
    SortOrder,
    /// Invariant display name.
    Name,
    /// Last-changed timestamp, newest first.
    Changed,
}

/// Parameters for a paged children query.
#[derive(Debug, Clone)]
pub struct ChildQuery {
    /// Zero-based page number.
    pub page: i64,

    /// Page size.
    pub per_page: i64,

    /// Ordering.
    pub order: ChildOrder,

    /// Optional case-insensitive name substring filter.
    pub filter: Option<String>,
}

impl Default for ChildQuery {
    fn default() -> Self {
        Self {
            page: 0,
            per_page: 50,
            order: ChildOrder::SortOrder,
            filter: None,
        }
    }
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// A queued send-to-publish request awaiting approval.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub node_id: i64,
    /// Culture buckets requested for approval (`"*"` for invariant).
    pub cultures: Vec<String>,
    pub user_id: Uuid,
    pub requested_at: i64,
}

/// Document persistence.
///
/// Mutating calls commit immediately; optimistic concurrency is enforced
/// through the document `version` stamp on [`DocumentStore::save`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by node id.
    async fn get(&self, id: i64) -> EngineResult<Option<Document>>;

    /// Fetch a document by stable key.
    async fn get_by_key(&self, key: Uuid) -> EngineResult<Option<Document>>;

    /// Paged children of a parent, with filter/order parameters.
    async fn children(&self, parent_id: i64, query: &ChildQuery) -> EngineResult<Page<Document>>;

    /// Ids of all children of a parent, in sibling order.
    async fn child_ids(&self, parent_id: i64) -> EngineResult<Vec<i64>>;

    /// Insert a new document: assigns id, completes the path, appends to
    /// the sibling order, and stamps version 1.
    async fn insert(&self, doc: Document) -> EngineResult<Document>;

    /// Save an existing document. Fails with
    /// [`crate::error::EngineError::ConcurrencyConflict`] when the stored
    /// version differs from `doc.version`.
    async fn save(&self, doc: &Document) -> EngineResult<Document>;

    /// Hard-delete a document and its descendants. Returns the number of
    /// documents removed.
    async fn delete_subtree(&self, id: i64) -> EngineResult<u64>;

    /// Reparent a subtree, rewriting paths and syncing the trashed flag
    /// from the target location. Returns the moved root.
    async fn move_subtree(&self, id: i64, new_parent_id: i64) -> EngineResult<Document>;

    /// Duplicate a subtree under a target parent with fresh ids and keys.
    /// Copies are unpublished; the source is never mutated. Returns the
    /// copied root.
    async fn copy_subtree(
        &self,
        id: i64,
        target_parent_id: i64,
        recursive: bool,
        relate_to_original: bool,
    ) -> EngineResult<Document>;

    /// Apply a full sibling ordering for one parent.
    async fn set_sort_orders(&self, parent_id: i64, ordered_ids: &[i64]) -> EngineResult<()>;

    /// Queue a send-to-publish request for downstream approval.
    async fn queue_approval(
        &self,
        id: i64,
        cultures: &[String],
        user_id: Uuid,
    ) -> EngineResult<()>;
}

/// Language catalog snapshot.
#[async_trait]
pub trait LanguageCatalog: Send + Sync {
    /// All configured languages.
    async fn all(&self) -> EngineResult<Vec<Language>>;
}

/// Per-node explicit permission assignments.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Explicit assignment at a node, if any.
    async fn assigned(&self, node_id: i64) -> EngineResult<Option<PermissionSet>>;

    /// Persist an assignment, eliding no-op overrides (an assignment equal
    /// to `defaults` clears any stored entry instead).
    async fn save_assigned(
        &self,
        node_id: i64,
        defaults: &PermissionSet,
        assigned: PermissionSet,
    ) -> EngineResult<()>;
}

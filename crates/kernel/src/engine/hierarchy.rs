//! Hierarchy mutator.
//!
//! Validates and performs move/copy/sort operations, independent of
//! publication state. Invariants enforced before any mutation: allowed
//! parent/child type relationships, allowed-at-root for top-level moves,
//! and no cycles (a node never becomes its own descendant). Deletion is
//! two-stage: non-trashed documents move to the recycle bin first; only
//! bin residents are hard-removed.

use std::sync::Arc;

use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::events::{Decision, Notification, NotificationBus, Operation};
use crate::models::{Document, PermissionCode, RECYCLE_BIN_ID, UserContext};
use crate::schema::SchemaRegistry;
use crate::store::DocumentStore;

use super::permissions::{AccessTarget, PermissionEvaluator};

/// Outcome of a delete request.
#[derive(Debug, Clone)]
pub enum DeleteOutcome {
    /// The document was soft-deleted into the recycle bin.
    Trashed(Document),
    /// The document and its descendants were hard-removed.
    Deleted { removed: u64 },
}

/// Service for tree mutations.
#[derive(Clone)]
pub struct HierarchyService {
    inner: Arc<HierarchyServiceInner>,
}

struct HierarchyServiceInner {
    docs: Arc<dyn DocumentStore>,
    schema: Arc<SchemaRegistry>,
    events: Arc<NotificationBus>,
    evaluator: PermissionEvaluator,
}

impl HierarchyService {
    /// Create a new hierarchy service.
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        schema: Arc<SchemaRegistry>,
        events: Arc<NotificationBus>,
        evaluator: PermissionEvaluator,
    ) -> Self {
        Self {
            inner: Arc::new(HierarchyServiceInner {
                docs,
                schema,
                events,
                evaluator,
            }),
        }
    }

    fn target_of(parent_id: i64) -> AccessTarget {
        match parent_id {
            RECYCLE_BIN_ID => AccessTarget::RecycleBin,
            id if id < 0 => AccessTarget::Root,
            id => AccessTarget::Node(id),
        }
    }

    /// Validate that `doc` may become a child of `new_parent_id` without
    /// breaking a hierarchy invariant.
    pub async fn validate_move(&self, doc: &Document, new_parent_id: i64) -> EngineResult<()> {
        // Trashing bypasses type checks; anything may enter the bin
        if new_parent_id == RECYCLE_BIN_ID {
            return Ok(());
        }

        if new_parent_id < 0 {
            let doc_type = self
                .inner
                .schema
                .get(&doc.doc_type)
                .ok_or(EngineError::NotFound)?;
            if !doc_type.allowed_at_root {
                return Err(EngineError::StructuralViolation(format!(
                    "type '{}' is not allowed at the root",
                    doc.doc_type
                )));
            }
            return Ok(());
        }

        let parent = self
            .inner
            .docs
            .get(new_parent_id)
            .await?
            .ok_or(EngineError::NotFound)?;

        let parent_type = self.inner.schema.get(&parent.doc_type).ok_or_else(|| {
            EngineError::StructuralViolation(format!(
                "parent type '{}' is not registered",
                parent.doc_type
            ))
        })?;
        if !parent_type.allows_child(&doc.doc_type) {
            return Err(EngineError::StructuralViolation(format!(
                "type '{}' is not an allowed child of '{}'",
                doc.doc_type, parent.doc_type
            )));
        }

        if parent.path_contains(doc.id) {
            return Err(EngineError::StructuralViolation(
                "cannot move a document under its own descendant".to_string(),
            ));
        }

        Ok(())
    }

    /// Move a document (and its subtree) under a new parent.
    pub async fn move_document(
        &self,
        id: i64,
        new_parent_id: i64,
        user: &UserContext,
    ) -> EngineResult<Document> {
        let grant = self
            .inner
            .evaluator
            .authorize(user, AccessTarget::Node(id), &[PermissionCode::Move])
            .await?;
        self.inner
            .evaluator
            .authorize(user, Self::target_of(new_parent_id), &[])
            .await?;

        let doc = grant.document.ok_or(EngineError::NotFound)?;
        self.validate_move(&doc, new_parent_id).await?;

        let notification = Notification::before(Operation::Move, id, user.id);
        if self.inner.events.gate(&notification) == Decision::Cancel {
            return Err(EngineError::CancelledByEvent);
        }

        let moved = self.inner.docs.move_subtree(id, new_parent_id).await?;
        self.inner
            .events
            .notify(&Notification::after(Operation::Move, id, user.id));

        info!(node_id = id, new_parent_id, "document moved");
        Ok(moved)
    }

    /// Soft-delete a document into the recycle bin.
    pub async fn move_to_recycle_bin(
        &self,
        id: i64,
        user: &UserContext,
    ) -> EngineResult<Document> {
        self.inner
            .evaluator
            .authorize(user, AccessTarget::Node(id), &[PermissionCode::Delete])
            .await?;

        let notification = Notification::before(Operation::Trash, id, user.id);
        if self.inner.events.gate(&notification) == Decision::Cancel {
            return Err(EngineError::CancelledByEvent);
        }

        let trashed = self.inner.docs.move_subtree(id, RECYCLE_BIN_ID).await?;
        self.inner
            .events
            .notify(&Notification::after(Operation::Trash, id, user.id));

        info!(node_id = id, "document moved to recycle bin");
        Ok(trashed)
    }

    /// Delete a document: non-trashed documents are routed through the
    /// recycle bin; bin residents are hard-removed with their subtree.
    pub async fn delete(&self, id: i64, user: &UserContext) -> EngineResult<DeleteOutcome> {
        let grant = self
            .inner
            .evaluator
            .authorize(user, AccessTarget::Node(id), &[PermissionCode::Delete])
            .await?;
        let doc = grant.document.ok_or(EngineError::NotFound)?;

        if !doc.trashed {
            let trashed = self.move_to_recycle_bin(id, user).await?;
            return Ok(DeleteOutcome::Trashed(trashed));
        }

        let notification = Notification::before(Operation::Delete, id, user.id);
        if self.inner.events.gate(&notification) == Decision::Cancel {
            return Err(EngineError::CancelledByEvent);
        }

        let removed = self.inner.docs.delete_subtree(id).await?;
        self.inner
            .events
            .notify(&Notification::after(Operation::Delete, id, user.id));

        info!(node_id = id, removed, "document hard-deleted");
        Ok(DeleteOutcome::Deleted { removed })
    }

    /// Copy a document under a target parent. Never mutates the source.
    pub async fn copy_document(
        &self,
        id: i64,
        target_parent_id: i64,
        recursive: bool,
        relate_to_original: bool,
        user: &UserContext,
    ) -> EngineResult<Document> {
        if target_parent_id == RECYCLE_BIN_ID {
            return Err(EngineError::StructuralViolation(
                "cannot copy into the recycle bin".to_string(),
            ));
        }

        let grant = self
            .inner
            .evaluator
            .authorize(user, AccessTarget::Node(id), &[PermissionCode::Copy])
            .await?;
        self.inner
            .evaluator
            .authorize(user, Self::target_of(target_parent_id), &[])
            .await?;

        let doc = grant.document.ok_or(EngineError::NotFound)?;
        // A copy lands like a move would: same placement invariants
        self.validate_move(&doc, target_parent_id).await?;

        let notification = Notification::before(Operation::Copy, id, user.id);
        if self.inner.events.gate(&notification) == Decision::Cancel {
            return Err(EngineError::CancelledByEvent);
        }

        let copy = self
            .inner
            .docs
            .copy_subtree(id, target_parent_id, recursive, relate_to_original)
            .await?;
        self.inner
            .events
            .notify(&Notification::after(Operation::Copy, id, user.id));

        info!(node_id = id, copy_id = copy.id, recursive, "document copied");
        Ok(copy)
    }

    /// Apply a full sibling ordering for one parent. The batch fully
    /// applies or is fully rejected; an event veto aborts the whole
    /// reorder.
    pub async fn sort_children(
        &self,
        parent_id: i64,
        ordered_ids: &[i64],
        user: &UserContext,
    ) -> EngineResult<()> {
        self.inner
            .evaluator
            .authorize(user, Self::target_of(parent_id), &[PermissionCode::Sort])
            .await?;

        let mut seen = std::collections::BTreeSet::new();
        for id in ordered_ids {
            if !seen.insert(*id) {
                return Err(EngineError::StructuralViolation(format!(
                    "duplicate id {id} in sort order"
                )));
            }
        }

        let children: std::collections::BTreeSet<i64> =
            self.inner.docs.child_ids(parent_id).await?.into_iter().collect();
        for id in ordered_ids {
            if !children.contains(id) {
                return Err(EngineError::StructuralViolation(format!(
                    "document {id} is not a child of {parent_id}"
                )));
            }
        }

        let notification = Notification::before(Operation::Sort, parent_id, user.id);
        if self.inner.events.gate(&notification) == Decision::Cancel {
            return Err(EngineError::CancelledByEvent);
        }

        self.inner.docs.set_sort_orders(parent_id, ordered_ids).await?;
        self.inner
            .events
            .notify(&Notification::after(Operation::Sort, parent_id, user.id));

        info!(parent_id, count = ordered_ids.len(), "children sorted");
        Ok(())
    }
}

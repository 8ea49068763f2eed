//! Permission evaluator.
//!
//! Resolves the effective permission set for a user at a node and gates
//! requests: every required code must be present, with no partial credit.
//! The effective set is the nearest explicit assignment along the node's
//! path (deepest first), falling back to the user's group defaults.
//!
//! The evaluator fetches the node to resolve its path and hands the fetch
//! back to the caller through [`AccessGrant`] so the same request never
//! loads the document twice. Denials deliberately preserve the
//! not-found/forbidden split and nothing more: an unknown id is NotFound,
//! a resolved-but-unauthorized node is Forbidden.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::permission::effective;
use crate::models::{Document, PermissionCode, PermissionSet, UserContext};
use crate::store::{DocumentStore, PermissionStore};

/// Authorization target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTarget {
    /// The tree root.
    Root,
    /// The recycle bin.
    RecycleBin,
    /// An ordinary node.
    Node(i64),
}

/// A successful authorization, carrying the document fetched during path
/// resolution so the caller can reuse it.
#[derive(Debug)]
pub struct AccessGrant {
    pub document: Option<Document>,
}

/// Permission evaluator with a per-(user, node) resolved-set cache.
#[derive(Clone)]
pub struct PermissionEvaluator {
    inner: Arc<PermissionEvaluatorInner>,
}

struct PermissionEvaluatorInner {
    docs: Arc<dyn DocumentStore>,
    perms: Arc<dyn PermissionStore>,
    cache: DashMap<(Uuid, i64), PermissionSet>,
}

impl PermissionEvaluator {
    /// Create a new evaluator.
    pub fn new(docs: Arc<dyn DocumentStore>, perms: Arc<dyn PermissionStore>) -> Self {
        Self {
            inner: Arc::new(PermissionEvaluatorInner {
                docs,
                perms,
                cache: DashMap::new(),
            }),
        }
    }

    /// Authorize `user` for `required` codes at `target`.
    ///
    /// No required codes means path access alone is sufficient. Root and
    /// recycle-bin targets use the user's dedicated access flags instead
    /// of path lookup.
    pub async fn authorize(
        &self,
        user: &UserContext,
        target: AccessTarget,
        required: &[PermissionCode],
    ) -> EngineResult<AccessGrant> {
        match target {
            AccessTarget::Root => {
                if user.admin || user.root_access {
                    Ok(AccessGrant { document: None })
                } else {
                    Err(EngineError::Forbidden)
                }
            }
            AccessTarget::RecycleBin => {
                if user.admin || user.bin_access {
                    Ok(AccessGrant { document: None })
                } else {
                    Err(EngineError::Forbidden)
                }
            }
            AccessTarget::Node(id) => {
                let doc = self
                    .inner
                    .docs
                    .get(id)
                    .await?
                    .ok_or(EngineError::NotFound)?;

                if user.admin {
                    return Ok(AccessGrant { document: Some(doc) });
                }

                let resolved = self.resolve(user, &doc).await?;
                if resolved.contains_all(required) {
                    Ok(AccessGrant { document: Some(doc) })
                } else {
                    debug!(
                        user_id = %user.id,
                        node_id = id,
                        required = %PermissionSet::from_codes(required.iter().copied()),
                        resolved = %resolved,
                        "permission check failed"
                    );
                    Err(EngineError::Forbidden)
                }
            }
        }
    }

    /// Resolve the effective permission set for a user at a document:
    /// the nearest explicit assignment along the path, else the user's
    /// group defaults.
    async fn resolve(&self, user: &UserContext, doc: &Document) -> EngineResult<PermissionSet> {
        let cache_key = (user.id, doc.id);
        if let Some(cached) = self.inner.cache.get(&cache_key) {
            return Ok(cached.clone());
        }

        let mut assigned = None;
        let mut segments = doc.path_segments();
        segments.retain(|&s| s >= 0);
        for segment in segments.into_iter().rev() {
            if let Some(set) = self.inner.perms.assigned(segment).await? {
                assigned = Some(set);
                break;
            }
        }

        let resolved = effective(&user.default_permissions, assigned.as_ref());
        self.inner.cache.insert(cache_key, resolved.clone());
        Ok(resolved)
    }

    /// Invalidate cached sets for one user. Call when the user's groups
    /// change.
    pub fn invalidate_user(&self, user_id: Uuid) {
        self.inner.cache.retain(|(uid, _), _| *uid != user_id);
    }

    /// Invalidate the entire cache. Call when node assignments change.
    pub fn invalidate_all(&self) {
        self.inner.cache.clear();
    }

    /// Number of cached entries (for monitoring).
    pub fn cache_size(&self) -> usize {
        self.inner.cache.len()
    }
}

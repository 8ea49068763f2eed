//! Workflow service: the publication state machine orchestrator.
//!
//! `apply_action` runs the full pipeline for one request: permission gate,
//! structural preconditions, global validation (with publish-to-save
//! downgrade), the best-effort save, and the action-specific transition.
//! Event hooks are consulted before every persistence call; a veto or a
//! store-level concurrency conflict surfaces as a cancelled outcome with
//! no further state change.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::events::{Decision, Notification, NotificationBus, Operation};
use crate::models::{
    Document, DocumentType, INVARIANT_CULTURE, Language, RECYCLE_BIN_ID, UserContext,
    VariantRequest,
};
use crate::schema::SchemaRegistry;
use crate::store::{DocumentStore, LanguageCatalog};

use super::culture::{CultureValidation, validate_culture, validate_for_publish};
use super::permissions::{AccessTarget, PermissionEvaluator};
use super::transition::{
    ActionResult, ContentAction, PublishOutcome, PublishedState, plan, publish_gate,
};

/// The change payload for one [`WorkflowService::apply_action`] call.
#[derive(Debug, Clone)]
pub struct ContentChange {
    /// Subject node id. None for the *New actions.
    pub id: Option<i64>,

    /// Parent under which a new document is created. Ignored for
    /// existing documents.
    pub parent_id: i64,

    /// Document type alias for a new document. Ignored for existing
    /// documents.
    pub doc_type: String,

    /// Submitted culture variants.
    pub variants: Vec<VariantRequest>,
}

impl ContentChange {
    /// Change against an existing document.
    pub fn existing(id: i64, variants: Vec<VariantRequest>) -> Self {
        Self {
            id: Some(id),
            parent_id: 0,
            doc_type: String::new(),
            variants,
        }
    }

    /// Change creating a new document.
    pub fn create(parent_id: i64, doc_type: &str, variants: Vec<VariantRequest>) -> Self {
        Self {
            id: None,
            parent_id,
            doc_type: doc_type.to_string(),
            variants,
        }
    }
}

/// The publication workflow service.
#[derive(Clone)]
pub struct WorkflowService {
    inner: Arc<WorkflowServiceInner>,
}

struct WorkflowServiceInner {
    docs: Arc<dyn DocumentStore>,
    langs: Arc<dyn LanguageCatalog>,
    schema: Arc<SchemaRegistry>,
    events: Arc<NotificationBus>,
    evaluator: PermissionEvaluator,
}

impl WorkflowService {
    /// Create a new workflow service.
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        langs: Arc<dyn LanguageCatalog>,
        schema: Arc<SchemaRegistry>,
        events: Arc<NotificationBus>,
        evaluator: PermissionEvaluator,
    ) -> Self {
        Self {
            inner: Arc::new(WorkflowServiceInner {
                docs,
                langs,
                schema,
                events,
                evaluator,
            }),
        }
    }

    /// The permission evaluator backing this service.
    pub fn evaluator(&self) -> &PermissionEvaluator {
        &self.inner.evaluator
    }

    /// Apply a content action and compute the resulting state.
    pub async fn apply_action(
        &self,
        action: ContentAction,
        change: ContentChange,
        user: &UserContext,
    ) -> EngineResult<ActionResult> {
        let now = chrono::Utc::now().timestamp();
        let languages = self.inner.langs.all().await?;

        let (mut doc, is_new) = self.resolve_subject(&action, &change, user, now).await?;

        let doc_type = self
            .inner
            .schema
            .get(&doc.doc_type)
            .ok_or(EngineError::NotFound)?;

        self.check_variance(&doc_type, &change.variants)?;

        // Apply edits in memory, then validate the post-edit state of
        // every submitted bucket (the "global" validation the publication
        // engine itself sits outside of).
        let changed = doc.apply_variants(&doc_type, &change.variants, now);
        let invalid = change.variants.iter().find_map(|v| {
            let offending = validate_culture(&doc, &doc_type, v.culture.as_deref());
            (!offending.is_empty()).then_some((v.culture.clone(), offending))
        });

        let (effective_action, downgraded) = plan(action, invalid.is_none());

        // Best-effort save happens for every action.
        if self.inner.events.gate(&Notification::before(Operation::Save, doc.id, user.id))
            == Decision::Cancel
        {
            return Ok(self.finish(doc, &doc_type, &languages, false, downgraded,
                PublishOutcome::FailedCancelledByEvent, Vec::new()));
        }

        let doc = if is_new {
            self.inner.docs.insert(doc).await?
        } else {
            match self.inner.docs.save(&doc).await {
                Ok(saved) => saved,
                Err(EngineError::ConcurrencyConflict) => {
                    warn!(node_id = doc.id, "save hit a concurrency conflict");
                    return Ok(self.finish(doc, &doc_type, &languages, false, downgraded,
                        PublishOutcome::FailedCancelledByEvent, Vec::new()));
                }
                Err(e) => return Err(e),
            }
        };
        self.inner
            .events
            .notify(&Notification::after(Operation::Save, doc.id, user.id));

        match effective_action {
            ContentAction::Save | ContentAction::SaveNew => {
                let outcome = match invalid {
                    Some((culture, properties)) if downgraded => {
                        PublishOutcome::FailedContentInvalid { culture, properties }
                    }
                    _ => PublishOutcome::Success,
                };
                info!(node_id = doc.id, downgraded, "document saved");
                Ok(self.finish(doc, &doc_type, &languages, true, downgraded, outcome, Vec::new()))
            }
            ContentAction::Publish | ContentAction::PublishNew => {
                self.publish(doc, &doc_type, &languages, &change.variants, changed, user, now)
                    .await
            }
            ContentAction::SendPublish | ContentAction::SendPublishNew => {
                self.send_to_approval(doc, &doc_type, &languages, &change.variants, user)
                    .await
            }
            ContentAction::Unpublish { culture } => {
                self.unpublish(doc, &doc_type, &languages, culture.as_deref(), user, now)
                    .await
            }
        }
    }

    /// Resolve the subject document and gate the request on permissions.
    /// For new documents this also enforces the structural preconditions
    /// that reject a save outright.
    async fn resolve_subject(
        &self,
        action: &ContentAction,
        change: &ContentChange,
        user: &UserContext,
        now: i64,
    ) -> EngineResult<(Document, bool)> {
        if !action.is_new() {
            let id = change.id.ok_or(EngineError::NotFound)?;
            let grant = self
                .inner
                .evaluator
                .authorize(user, AccessTarget::Node(id), action.required_permissions())
                .await?;
            return Ok((grant.document.ok_or(EngineError::NotFound)?, false));
        }

        // Missing identifying fields reject a new document outright
        let doc_type = self.inner.schema.get(&change.doc_type).ok_or_else(|| {
            EngineError::ValidationFailed(format!("unknown document type '{}'", change.doc_type))
        })?;
        if !change.variants.iter().any(|v| !v.name.trim().is_empty()) {
            return Err(EngineError::ValidationFailed(
                "a new document needs at least one named variant".to_string(),
            ));
        }

        if change.parent_id < 0 {
            if change.parent_id == RECYCLE_BIN_ID {
                return Err(EngineError::StructuralViolation(
                    "cannot create a document inside the recycle bin".to_string(),
                ));
            }
            if !doc_type.allowed_at_root {
                return Err(EngineError::StructuralViolation(format!(
                    "type '{}' is not allowed at the root",
                    change.doc_type
                )));
            }
            self.inner
                .evaluator
                .authorize(user, AccessTarget::Root, &[])
                .await?;
        } else {
            let grant = self
                .inner
                .evaluator
                .authorize(
                    user,
                    AccessTarget::Node(change.parent_id),
                    action.required_permissions(),
                )
                .await?;
            let parent = grant.document.ok_or(EngineError::NotFound)?;
            let parent_type = self.inner.schema.get(&parent.doc_type).ok_or_else(|| {
                EngineError::StructuralViolation(format!(
                    "parent type '{}' is not registered",
                    parent.doc_type
                ))
            })?;
            if !parent_type.allows_child(&change.doc_type) {
                return Err(EngineError::StructuralViolation(format!(
                    "type '{}' is not an allowed child of '{}'",
                    change.doc_type, parent.doc_type
                )));
            }
        }

        Ok((Document::new(change.parent_id, &change.doc_type, now), true))
    }

    /// A varying type keys variants by culture codes; a non-varying type
    /// takes exactly the implicit invariant variant.
    fn check_variance(
        &self,
        doc_type: &DocumentType,
        variants: &[VariantRequest],
    ) -> EngineResult<()> {
        if doc_type.varies_by_culture {
            if variants.iter().any(|v| v.culture.is_none()) {
                return Err(EngineError::ValidationFailed(format!(
                    "type '{}' varies by culture; variants need culture codes",
                    doc_type.alias
                )));
            }
        } else if variants.iter().any(|v| v.culture.is_some()) {
            return Err(EngineError::ValidationFailed(format!(
                "type '{}' does not vary by culture; submit the invariant variant only",
                doc_type.alias
            )));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn publish(
        &self,
        mut doc: Document,
        doc_type: &DocumentType,
        languages: &[Language],
        variants: &[VariantRequest],
        changed: bool,
        user: &UserContext,
        now: i64,
    ) -> EngineResult<ActionResult> {
        let state = PublishedState::of(&doc, doc_type, languages);
        if let Some(outcome) = publish_gate(state) {
            return Ok(self.finish(doc, doc_type, languages, true, false, outcome, Vec::new()));
        }

        // Types that do not vary take the single invariant path; no
        // per-culture validation runs.
        let publishing: Vec<String> = if doc_type.varies_by_culture {
            match validate_for_publish(&doc, doc_type, variants, languages) {
                CultureValidation::MissingMandatory { culture } => {
                    return Ok(self.finish(doc, doc_type, languages, true, false,
                        PublishOutcome::FailedByCulture { cultures: vec![culture] }, Vec::new()));
                }
                CultureValidation::InvalidProperties { culture, properties } => {
                    // Atomic: zero cultures publish in this call
                    return Ok(self.finish(doc, doc_type, languages, true, false,
                        PublishOutcome::FailedContentInvalid {
                            culture: Some(culture),
                            properties,
                        }, Vec::new()));
                }
                CultureValidation::Ok { publishing } => {
                    if publishing.is_empty() {
                        return Ok(self.finish(doc, doc_type, languages, true, false,
                            PublishOutcome::FailedCannotPublish, Vec::new()));
                    }
                    publishing
                }
            }
        } else {
            vec![INVARIANT_CULTURE.to_string()]
        };

        for culture in &publishing {
            if let Some(schedule) = doc.schedule.get(culture) {
                if schedule.release_at.is_some_and(|t| t > now) {
                    return Ok(self.finish(doc, doc_type, languages, true, false,
                        PublishOutcome::FailedAwaitingRelease, Vec::new()));
                }
                if schedule.expire_at.is_some_and(|t| t <= now) {
                    return Ok(self.finish(doc, doc_type, languages, true, false,
                        PublishOutcome::FailedHasExpired, Vec::new()));
                }
            }
        }

        if !self.path_published(&doc).await? {
            return Ok(self.finish(doc, doc_type, languages, true, false,
                PublishOutcome::FailedPathNotPublished, Vec::new()));
        }

        let already = if doc_type.varies_by_culture {
            publishing.iter().all(|c| doc.published_cultures.contains(c))
        } else {
            doc.published
        };
        if already && !changed {
            return Ok(self.finish(doc, doc_type, languages, true, false,
                PublishOutcome::SuccessAlready, publishing));
        }

        let notification = Notification::before(Operation::Publish, doc.id, user.id)
            .with_cultures(publishing.clone());
        if self.inner.events.gate(&notification) == Decision::Cancel {
            return Ok(self.finish(doc, doc_type, languages, true, false,
                PublishOutcome::FailedCancelledByEvent, Vec::new()));
        }

        if doc_type.varies_by_culture {
            doc.mark_cultures_published(&publishing, now);
        } else {
            doc.mark_published(now);
        }

        let doc = match self.inner.docs.save(&doc).await {
            Ok(saved) => saved,
            Err(EngineError::ConcurrencyConflict) => {
                warn!(node_id = doc.id, "publish hit a concurrency conflict");
                return Ok(self.finish(doc, doc_type, languages, true, false,
                    PublishOutcome::FailedCancelledByEvent, Vec::new()));
            }
            Err(e) => return Err(e),
        };
        self.inner.events.notify(
            &Notification::after(Operation::Publish, doc.id, user.id)
                .with_cultures(publishing.clone()),
        );

        info!(node_id = doc.id, cultures = ?publishing, "document published");
        Ok(self.finish(doc, doc_type, languages, true, false, PublishOutcome::Success, publishing))
    }

    async fn send_to_approval(
        &self,
        doc: Document,
        doc_type: &DocumentType,
        languages: &[Language],
        variants: &[VariantRequest],
        user: &UserContext,
    ) -> EngineResult<ActionResult> {
        let cultures: Vec<String> = if doc_type.varies_by_culture {
            variants
                .iter()
                .filter(|v| v.publish)
                .filter_map(|v| v.culture.clone())
                .collect()
        } else {
            vec![INVARIANT_CULTURE.to_string()]
        };
        if cultures.is_empty() {
            return Ok(self.finish(doc, doc_type, languages, true, false,
                PublishOutcome::FailedCannotPublish, Vec::new()));
        }

        let notification = Notification::before(Operation::SendToApproval, doc.id, user.id)
            .with_cultures(cultures.clone());
        if self.inner.events.gate(&notification) == Decision::Cancel {
            return Ok(self.finish(doc, doc_type, languages, true, false,
                PublishOutcome::FailedCancelledByEvent, Vec::new()));
        }

        // Queue failure means only "could not be queued"; the save above
        // already happened and publish state never changes here.
        if let Err(e) = self
            .inner
            .docs
            .queue_approval(doc.id, &cultures, user.id)
            .await
        {
            warn!(node_id = doc.id, error = %e, "approval request could not be queued");
            return Ok(self.finish(doc, doc_type, languages, true, false,
                PublishOutcome::FailedCannotPublish, Vec::new()));
        }
        self.inner.events.notify(
            &Notification::after(Operation::SendToApproval, doc.id, user.id)
                .with_cultures(cultures),
        );

        info!(node_id = doc.id, "document sent for approval");
        Ok(self.finish(doc, doc_type, languages, true, false, PublishOutcome::Success, Vec::new()))
    }

    async fn unpublish(
        &self,
        mut doc: Document,
        doc_type: &DocumentType,
        languages: &[Language],
        culture: Option<&str>,
        user: &UserContext,
        now: i64,
    ) -> EngineResult<ActionResult> {
        if !doc_type.varies_by_culture && culture.is_some() {
            return Err(EngineError::ValidationFailed(format!(
                "type '{}' does not vary by culture; unpublish is unscoped",
                doc_type.alias
            )));
        }

        let nothing_to_do = match culture {
            Some(c) => !doc.is_culture_published(Some(c)),
            None => !doc.is_published_any(),
        };
        if nothing_to_do {
            return Ok(self.finish(doc, doc_type, languages, true, false,
                PublishOutcome::SuccessAlready, Vec::new()));
        }

        let notification = Notification::before(Operation::Unpublish, doc.id, user.id)
            .with_cultures(culture.iter().map(|c| (*c).to_string()).collect());
        if self.inner.events.gate(&notification) == Decision::Cancel {
            return Ok(self.finish(doc, doc_type, languages, true, false,
                PublishOutcome::FailedCancelledByEvent, Vec::new()));
        }

        let demoted = doc.demote(culture, now);
        let doc = match self.inner.docs.save(&doc).await {
            Ok(saved) => saved,
            Err(EngineError::ConcurrencyConflict) => {
                warn!(node_id = doc.id, "unpublish hit a concurrency conflict");
                return Ok(self.finish(doc, doc_type, languages, true, false,
                    PublishOutcome::FailedCancelledByEvent, Vec::new()));
            }
            Err(e) => return Err(e),
        };
        self.inner.events.notify(
            &Notification::after(Operation::Unpublish, doc.id, user.id).with_cultures(demoted),
        );

        info!(node_id = doc.id, culture = ?culture, "document unpublished");
        Ok(self.finish(doc, doc_type, languages, true, false, PublishOutcome::Success, Vec::new()))
    }

    /// Whether every ancestor (excluding the root sentinels) is published.
    async fn path_published(&self, doc: &Document) -> EngineResult<bool> {
        for ancestor_id in doc.ancestor_ids() {
            let ancestor = self
                .inner
                .docs
                .get(ancestor_id)
                .await?
                .ok_or(EngineError::NotFound)?;
            if !ancestor.is_published_any() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        document: Document,
        doc_type: &DocumentType,
        languages: &[Language],
        saved: bool,
        downgraded: bool,
        outcome: PublishOutcome,
        published_variants: Vec<String>,
    ) -> ActionResult {
        let state = PublishedState::of(&document, doc_type, languages);
        ActionResult {
            document,
            state,
            saved,
            downgraded,
            outcome,
            published_variants,
        }
    }
}

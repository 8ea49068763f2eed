//! Publication state machine types.
//!
//! The closed set of states, actions, and outcomes, plus the pure pieces
//! of the transition logic: action downgrade, publish gating by state, and
//! state derivation. The workflow service orchestrates these against the
//! store; nothing here touches a collaborator.

use serde::{Deserialize, Serialize};

use crate::models::{Document, DocumentType, Language, PermissionCode};

/// Publication state of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishedState {
    /// Never published, or fully unpublished.
    Draft,
    /// All required cultures published (the only state for a published
    /// non-varying document).
    Published,
    /// Some cultures published, others not. Varying types only.
    PartiallyPublished,
    /// Soft-deleted, recoverable from the recycle bin.
    Trashed,
    /// Hard-removed. Terminal; only reachable from Trashed.
    Deleted,
}

impl PublishedState {
    /// Derive the state of a stored document.
    pub fn of(doc: &Document, doc_type: &DocumentType, languages: &[Language]) -> Self {
        if doc.trashed {
            return Self::Trashed;
        }

        if !doc_type.varies_by_culture {
            return if doc.published {
                Self::Published
            } else {
                Self::Draft
            };
        }

        if doc.published_cultures.is_empty() {
            return Self::Draft;
        }

        let mandatory_published = languages
            .iter()
            .filter(|l| l.mandatory)
            .all(|l| doc.published_cultures.contains(&l.iso_code));

        if mandatory_published {
            Self::Published
        } else {
            Self::PartiallyPublished
        }
    }
}

/// Requested action against a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentAction {
    /// Persist edits without touching publish state.
    Save,
    /// Save a brand-new document.
    SaveNew,
    /// Save and publish the requested cultures.
    Publish,
    /// Save a brand-new document and publish it.
    PublishNew,
    /// Save and queue for downstream approval.
    SendPublish,
    /// Save a brand-new document and queue it for approval.
    SendPublishNew,
    /// Demote one culture, or all when unscoped.
    Unpublish { culture: Option<String> },
}

impl ContentAction {
    /// Whether the action creates a new document.
    pub fn is_new(&self) -> bool {
        matches!(self, Self::SaveNew | Self::PublishNew | Self::SendPublishNew)
    }

    /// Whether the action attempts publication or queues for it.
    pub fn is_publish_flavored(&self) -> bool {
        matches!(
            self,
            Self::Publish | Self::PublishNew | Self::SendPublish | Self::SendPublishNew
        )
    }

    /// The save action a publish-flavored action falls back to when the
    /// global validation state is invalid. Publish is never attempted
    /// against invalid input.
    pub fn downgraded(&self) -> Self {
        match self {
            Self::Publish | Self::SendPublish => Self::Save,
            Self::PublishNew | Self::SendPublishNew => Self::SaveNew,
            other => other.clone(),
        }
    }

    /// Permission codes the acting user must hold for this action.
    pub fn required_permissions(&self) -> &'static [PermissionCode] {
        match self {
            Self::Save => &[PermissionCode::Update],
            Self::SaveNew => &[PermissionCode::Create],
            Self::Publish => &[PermissionCode::Update, PermissionCode::Publish],
            Self::PublishNew => &[PermissionCode::Create, PermissionCode::Publish],
            Self::SendPublish => &[PermissionCode::Update, PermissionCode::SendForApproval],
            Self::SendPublishNew => &[PermissionCode::Create, PermissionCode::SendForApproval],
            Self::Unpublish { .. } => &[PermissionCode::Publish],
        }
    }
}

/// Plan the action to execute given the global validation verdict.
/// Returns the (possibly downgraded) action and whether a downgrade
/// happened.
pub fn plan(action: ContentAction, model_valid: bool) -> (ContentAction, bool) {
    if !model_valid && action.is_publish_flavored() {
        (action.downgraded(), true)
    } else {
        (action, false)
    }
}

/// Structured outcome of an applied action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// The action applied.
    Success,
    /// Nothing to do: the requested state already holds.
    SuccessAlready,
    /// An event hook vetoed the operation; no state change occurred.
    FailedCancelledByEvent,
    /// A requested culture's release date is still in the future.
    FailedAwaitingRelease,
    /// A requested culture's expiry date has passed.
    FailedHasExpired,
    /// The document sits in the recycle bin.
    FailedIsTrashed,
    /// Property validation failed.
    FailedContentInvalid {
        culture: Option<String>,
        properties: Vec<String>,
    },
    /// The mandatory-language gate failed.
    FailedByCulture { cultures: Vec<String> },
    /// An ancestor is not published.
    FailedPathNotPublished,
    /// The request asked for a publication that cannot happen (nothing to
    /// publish, or the document is in a terminal state).
    FailedCannotPublish,
}

impl PublishOutcome {
    /// Whether the outcome is a success tag.
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Success | Self::SuccessAlready)
    }
}

/// Gate a publish attempt on the current state. Returns the failure
/// outcome for states that can never publish.
pub fn publish_gate(state: PublishedState) -> Option<PublishOutcome> {
    match state {
        PublishedState::Trashed => Some(PublishOutcome::FailedIsTrashed),
        PublishedState::Deleted => Some(PublishOutcome::FailedCannotPublish),
        _ => None,
    }
}

/// Result of [`crate::engine::WorkflowService::apply_action`].
#[derive(Debug, Clone)]
pub struct ActionResult {
    /// The subject document after the action.
    pub document: Document,
    /// Derived publication state after the action.
    pub state: PublishedState,
    /// Whether a save was persisted.
    pub saved: bool,
    /// Whether a publish-flavored action was downgraded to its save
    /// counterpart because the global validation state was invalid.
    pub downgraded: bool,
    /// The structured outcome.
    pub outcome: PublishOutcome,
    /// Culture buckets a successful publish applied to (`"*"` for the
    /// invariant path). Empty for non-publish outcomes.
    pub published_variants: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::ROOT_ID;

    fn doc_type(varies: bool) -> DocumentType {
        DocumentType {
            alias: "article".to_string(),
            label: "Article".to_string(),
            varies_by_culture: varies,
            allowed_at_root: true,
            allowed_children: Vec::new(),
            properties: Vec::new(),
        }
    }

    fn languages() -> Vec<Language> {
        vec![
            Language::new("en-us", "English", true),
            Language::new("da-dk", "Danish", false),
        ]
    }

    #[test]
    fn downgrade_maps_publish_to_save() {
        assert_eq!(ContentAction::Publish.downgraded(), ContentAction::Save);
        assert_eq!(ContentAction::PublishNew.downgraded(), ContentAction::SaveNew);
        assert_eq!(ContentAction::SendPublish.downgraded(), ContentAction::Save);
        assert_eq!(
            ContentAction::SendPublishNew.downgraded(),
            ContentAction::SaveNew
        );
        assert_eq!(ContentAction::Save.downgraded(), ContentAction::Save);
    }

    #[test]
    fn plan_downgrades_only_invalid_publishes() {
        assert_eq!(
            plan(ContentAction::Publish, false),
            (ContentAction::Save, true)
        );
        assert_eq!(
            plan(ContentAction::Publish, true),
            (ContentAction::Publish, false)
        );
        assert_eq!(plan(ContentAction::Save, false), (ContentAction::Save, false));
    }

    #[test]
    fn state_of_non_varying() {
        let mut doc = Document::new(ROOT_ID, "article", 0);
        let dt = doc_type(false);
        assert_eq!(PublishedState::of(&doc, &dt, &languages()), PublishedState::Draft);

        doc.mark_published(1);
        assert_eq!(
            PublishedState::of(&doc, &dt, &languages()),
            PublishedState::Published
        );

        doc.trashed = true;
        assert_eq!(
            PublishedState::of(&doc, &dt, &languages()),
            PublishedState::Trashed
        );
    }

    #[test]
    fn state_of_varying_tracks_mandatory_cultures() {
        let mut doc = Document::new(ROOT_ID, "article", 0);
        let dt = doc_type(true);
        let langs = languages();

        assert_eq!(PublishedState::of(&doc, &dt, &langs), PublishedState::Draft);

        // Only the optional culture published
        doc.mark_cultures_published(&["da-dk".to_string()], 1);
        assert_eq!(
            PublishedState::of(&doc, &dt, &langs),
            PublishedState::PartiallyPublished
        );

        // Mandatory culture joins
        doc.mark_cultures_published(&["en-us".to_string()], 2);
        assert_eq!(PublishedState::of(&doc, &dt, &langs), PublishedState::Published);
    }

    #[test]
    fn publish_gate_blocks_terminal_states() {
        assert_eq!(
            publish_gate(PublishedState::Trashed),
            Some(PublishOutcome::FailedIsTrashed)
        );
        assert_eq!(
            publish_gate(PublishedState::Deleted),
            Some(PublishOutcome::FailedCannotPublish)
        );
        assert_eq!(publish_gate(PublishedState::Draft), None);
        assert_eq!(publish_gate(PublishedState::PartiallyPublished), None);
    }

    #[test]
    fn required_permissions_per_action() {
        assert!(
            ContentAction::Publish
                .required_permissions()
                .contains(&PermissionCode::Publish)
        );
        assert!(
            ContentAction::SendPublishNew
                .required_permissions()
                .contains(&PermissionCode::SendForApproval)
        );
        assert_eq!(
            ContentAction::Save.required_permissions(),
            &[PermissionCode::Update]
        );
    }
}

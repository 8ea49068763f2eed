//! Integration tests for the hierarchy mutator: move/copy/sort/delete
//! invariants, recycle-bin routing, and batch cancellation.

mod common;

use stampa_kernel::engine::{ContentAction, ContentChange, DeleteOutcome};
use stampa_kernel::error::EngineError;
use stampa_kernel::events::Operation;
use stampa_kernel::models::{Document, ROOT_ID};
use stampa_kernel::store::DocumentStore;
use stampa_test_utils::{TestVariant, admin};

use common::{CancelOn, TestEngine, engine};

async fn create(eng: &TestEngine, parent_id: i64, doc_type: &str, name: &str) -> Document {
    let variants = if doc_type == "article" {
        vec![TestVariant::culture("en-us").named(name).build()]
    } else {
        vec![TestVariant::invariant(name).build()]
    };
    eng.workflow
        .apply_action(
            ContentAction::SaveNew,
            ContentChange::create(parent_id, doc_type, variants),
            &admin(),
        )
        .await
        .unwrap()
        .document
}

// ============================================================================
// Move validation
// ============================================================================

#[tokio::test]
async fn move_under_own_descendant_is_rejected() {
    let eng = engine();
    // Three-level chain A -> B -> C
    let a = create(&eng, ROOT_ID, "article", "A").await;
    let b = create(&eng, a.id, "article", "B").await;
    let c = create(&eng, b.id, "article", "C").await;

    // Depth 2: A under C
    let result = eng.hierarchy.move_document(a.id, c.id, &admin()).await;
    assert!(matches!(result, Err(EngineError::StructuralViolation(_))));

    // Depth 1: A under B
    let result = eng.hierarchy.move_document(a.id, b.id, &admin()).await;
    assert!(matches!(result, Err(EngineError::StructuralViolation(_))));

    // Paths untouched
    let c = eng.docs.get(c.id).await.unwrap().unwrap();
    assert_eq!(c.path, format!("-1,{},{},{}", a.id, b.id, c.id));
}

#[tokio::test]
async fn move_requires_allowed_child_type() {
    let eng = engine();
    let article = create(&eng, ROOT_ID, "article", "A").await;
    let section = create(&eng, ROOT_ID, "section", "S").await;
    let page = create(&eng, section.id, "page", "P").await;

    // Articles only allow articles beneath them
    let result = eng.hierarchy.move_document(page.id, article.id, &admin()).await;
    assert!(matches!(result, Err(EngineError::StructuralViolation(_))));

    // Sections accept pages
    let moved = eng
        .hierarchy
        .move_document(page.id, section.id, &admin())
        .await
        .unwrap();
    assert_eq!(moved.parent_id, section.id);
}

#[tokio::test]
async fn move_to_root_requires_allowed_at_root() {
    let eng = engine();
    let section = create(&eng, ROOT_ID, "section", "S").await;
    let page = create(&eng, section.id, "page", "P").await;

    let result = eng.hierarchy.move_document(page.id, ROOT_ID, &admin()).await;
    assert!(matches!(result, Err(EngineError::StructuralViolation(_))));

    // Articles are allowed at the root
    let article = create(&eng, section.id, "article", "A").await;
    let moved = eng
        .hierarchy
        .move_document(article.id, ROOT_ID, &admin())
        .await
        .unwrap();
    assert_eq!(moved.parent_id, ROOT_ID);
    assert_eq!(moved.path, format!("-1,{}", article.id));
}

#[tokio::test]
async fn move_to_unknown_parent_is_not_found() {
    let eng = engine();
    let article = create(&eng, ROOT_ID, "article", "A").await;

    let result = eng.hierarchy.move_document(article.id, 424242, &admin()).await;
    assert!(matches!(result, Err(EngineError::NotFound)));
}

#[tokio::test]
async fn move_veto_leaves_the_tree_alone() {
    let eng = engine();
    let a = create(&eng, ROOT_ID, "article", "A").await;
    let b = create(&eng, ROOT_ID, "article", "B").await;
    eng.events.register(0, CancelOn::new(Operation::Move));

    let result = eng.hierarchy.move_document(b.id, a.id, &admin()).await;
    assert!(matches!(result, Err(EngineError::CancelledByEvent)));

    let b = eng.docs.get(b.id).await.unwrap().unwrap();
    assert_eq!(b.parent_id, ROOT_ID);
}

// ============================================================================
// Recycle bin and delete
// ============================================================================

#[tokio::test]
async fn delete_routes_through_the_bin_then_hard_deletes() {
    let eng = engine();
    let a = create(&eng, ROOT_ID, "article", "A").await;
    let b = create(&eng, a.id, "article", "B").await;

    // First delete: soft, into the bin, whole subtree trashed
    let outcome = eng.hierarchy.delete(a.id, &admin()).await.unwrap();
    let trashed = match outcome {
        DeleteOutcome::Trashed(doc) => doc,
        DeleteOutcome::Deleted { .. } => panic!("expected soft delete"),
    };
    assert!(trashed.trashed);
    assert!(trashed.path_contains(-20));

    let b_stored = eng.docs.get(b.id).await.unwrap().unwrap();
    assert!(b_stored.trashed);

    // Second delete: hard, removes the subtree
    let outcome = eng.hierarchy.delete(a.id, &admin()).await.unwrap();
    match outcome {
        DeleteOutcome::Deleted { removed } => assert_eq!(removed, 2),
        DeleteOutcome::Trashed(_) => panic!("expected hard delete"),
    }
    assert!(eng.docs.get(a.id).await.unwrap().is_none());
    assert!(eng.docs.get(b.id).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_veto_cancels_the_trash_step() {
    let eng = engine();
    let a = create(&eng, ROOT_ID, "article", "A").await;
    eng.events.register(0, CancelOn::new(Operation::Trash));

    let result = eng.hierarchy.delete(a.id, &admin()).await;
    assert!(matches!(result, Err(EngineError::CancelledByEvent)));

    let stored = eng.docs.get(a.id).await.unwrap().unwrap();
    assert!(!stored.trashed);
}

// ============================================================================
// Copy
// ============================================================================

#[tokio::test]
async fn recursive_copy_preserves_structure_and_never_mutates_the_source() {
    let eng = engine();
    let section = create(&eng, ROOT_ID, "section", "S").await;
    let a = create(&eng, section.id, "article", "A").await;
    let b = create(&eng, a.id, "article", "B").await;

    let target = create(&eng, ROOT_ID, "section", "T").await;
    let copy = eng
        .hierarchy
        .copy_document(a.id, target.id, true, true, &admin())
        .await
        .unwrap();

    assert_ne!(copy.id, a.id);
    assert_eq!(copy.parent_id, target.id);
    let copied_children = eng.docs.child_ids(copy.id).await.unwrap();
    assert_eq!(copied_children.len(), 1, "relative structure preserved");

    // Source subtree untouched
    let a_stored = eng.docs.get(a.id).await.unwrap().unwrap();
    assert_eq!(a_stored.parent_id, section.id);
    assert!(eng.docs.get(b.id).await.unwrap().is_some());

    // Copy relations recorded for both members
    assert_eq!(eng.docs.relations().len(), 2);
}

#[tokio::test]
async fn copy_respects_allowed_child_types() {
    let eng = engine();
    let section = create(&eng, ROOT_ID, "section", "S").await;
    let page = create(&eng, section.id, "page", "P").await;
    let article = create(&eng, ROOT_ID, "article", "A").await;

    let result = eng
        .hierarchy
        .copy_document(page.id, article.id, false, false, &admin())
        .await;
    assert!(matches!(result, Err(EngineError::StructuralViolation(_))));
}

// ============================================================================
// Sort
// ============================================================================

#[tokio::test]
async fn sort_applies_a_full_ordering() {
    let eng = engine();
    let section = create(&eng, ROOT_ID, "section", "S").await;
    let a = create(&eng, section.id, "article", "A").await;
    let b = create(&eng, section.id, "article", "B").await;
    let c = create(&eng, section.id, "article", "C").await;

    eng.hierarchy
        .sort_children(section.id, &[c.id, a.id, b.id], &admin())
        .await
        .unwrap();

    assert_eq!(
        eng.docs.child_ids(section.id).await.unwrap(),
        vec![c.id, a.id, b.id]
    );
}

#[tokio::test]
async fn sort_rejects_foreign_and_duplicate_ids() {
    let eng = engine();
    let section = create(&eng, ROOT_ID, "section", "S").await;
    let a = create(&eng, section.id, "article", "A").await;
    let stranger = create(&eng, ROOT_ID, "article", "X").await;

    let result = eng
        .hierarchy
        .sort_children(section.id, &[a.id, stranger.id], &admin())
        .await;
    assert!(matches!(result, Err(EngineError::StructuralViolation(_))));

    let result = eng
        .hierarchy
        .sort_children(section.id, &[a.id, a.id], &admin())
        .await;
    assert!(matches!(result, Err(EngineError::StructuralViolation(_))));
}

#[tokio::test]
async fn sort_veto_aborts_the_whole_batch() {
    let eng = engine();
    let section = create(&eng, ROOT_ID, "section", "S").await;
    let a = create(&eng, section.id, "article", "A").await;
    let b = create(&eng, section.id, "article", "B").await;
    eng.events.register(0, CancelOn::new(Operation::Sort));

    let before = eng.docs.child_ids(section.id).await.unwrap();
    let result = eng
        .hierarchy
        .sort_children(section.id, &[b.id, a.id], &admin())
        .await;
    assert!(matches!(result, Err(EngineError::CancelledByEvent)));

    // Not a partial reorder: order unchanged
    assert_eq!(eng.docs.child_ids(section.id).await.unwrap(), before);
}

#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test harness for workflow engine integration tests.
//!
//! Builds a full engine over the in-memory stores with a small type
//! schema: `section` (invariant, allowed at root, holds everything),
//! `article` (varies by culture, allowed at root, may nest), and `page`
//! (invariant, NOT allowed at root).

#![allow(dead_code)]

use std::sync::Arc;

use stampa_kernel::engine::{HierarchyService, PermissionEvaluator, WorkflowService};
use stampa_kernel::events::{Decision, Notification, NotificationBus, NotificationHandler,
                            Operation, Phase};
use stampa_kernel::models::DocumentType;
use stampa_kernel::schema::SchemaRegistry;
use stampa_kernel::store::{MemoryLanguageCatalog, MemoryPermissionStore, MemoryStore};
use stampa_test_utils::{lang, required_property};

/// A fully wired engine over in-memory stores.
pub struct TestEngine {
    pub docs: Arc<MemoryStore>,
    pub langs: Arc<MemoryLanguageCatalog>,
    pub perms: Arc<MemoryPermissionStore>,
    pub schema: Arc<SchemaRegistry>,
    pub events: Arc<NotificationBus>,
    pub evaluator: PermissionEvaluator,
    pub workflow: WorkflowService,
    pub hierarchy: HierarchyService,
}

/// Initialize test logging once, driven by RUST_LOG.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Build a test engine with the default schema and languages
/// (mandatory `en-us`, optional `da-dk`).
pub fn engine() -> TestEngine {
    init_tracing();
    let docs = Arc::new(MemoryStore::new());
    let langs = Arc::new(MemoryLanguageCatalog::new(vec![
        lang("en-us", true),
        lang("da-dk", false),
    ]));
    let perms = Arc::new(MemoryPermissionStore::new());
    let schema = Arc::new(SchemaRegistry::new());
    let events = Arc::new(NotificationBus::new());

    schema.register(DocumentType {
        alias: "section".to_string(),
        label: "Section".to_string(),
        varies_by_culture: false,
        allowed_at_root: true,
        allowed_children: vec![
            "section".to_string(),
            "article".to_string(),
            "page".to_string(),
        ],
        properties: Vec::new(),
    });
    schema.register(DocumentType {
        alias: "article".to_string(),
        label: "Article".to_string(),
        varies_by_culture: true,
        allowed_at_root: true,
        allowed_children: vec!["article".to_string()],
        properties: vec![required_property("title", true)],
    });
    schema.register(DocumentType {
        alias: "page".to_string(),
        label: "Page".to_string(),
        varies_by_culture: false,
        allowed_at_root: false,
        allowed_children: Vec::new(),
        properties: vec![required_property("title", false)],
    });

    let evaluator = PermissionEvaluator::new(docs.clone(), perms.clone());
    let workflow = WorkflowService::new(
        docs.clone(),
        langs.clone(),
        schema.clone(),
        events.clone(),
        evaluator.clone(),
    );
    let hierarchy = HierarchyService::new(
        docs.clone(),
        schema.clone(),
        events.clone(),
        evaluator.clone(),
    );

    TestEngine {
        docs,
        langs,
        perms,
        schema,
        events,
        evaluator,
        workflow,
        hierarchy,
    }
}

/// Handler that vetoes every before-phase notification for one operation.
pub struct CancelOn {
    operation: Operation,
}

impl CancelOn {
    pub fn new(operation: Operation) -> Arc<Self> {
        Arc::new(Self { operation })
    }
}

impl NotificationHandler for CancelOn {
    fn name(&self) -> &str {
        "cancel-on"
    }

    fn handle(&self, notification: &Notification) -> Decision {
        if notification.phase == Phase::Before && notification.operation == self.operation {
            Decision::Cancel
        } else {
            Decision::Proceed
        }
    }
}

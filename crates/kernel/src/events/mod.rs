//! Notification bus for workflow extension points.
//!
//! Handlers are invoked synchronously in weight order (lower = higher
//! priority). Before-phase notifications are veto-able: the first handler
//! returning [`Decision::Cancel`] stops the operation and the engine
//! reports a cancelled outcome with no state change. After-phase
//! notifications are observational only.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Operation a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Save,
    Publish,
    Unpublish,
    SendToApproval,
    Trash,
    Delete,
    Move,
    Copy,
    Sort,
}

/// Whether the operation is about to happen or already committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Before,
    After,
}

/// Verdict from a before-phase handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Cancel,
}

/// A workflow notification.
#[derive(Debug, Clone)]
pub struct Notification {
    pub operation: Operation,
    pub phase: Phase,
    /// Subject node id (parent id for sorts, 0 for unsaved documents).
    pub node_id: i64,
    /// Affected culture buckets (`"*"` for invariant operations).
    pub cultures: Vec<String>,
    /// Acting user.
    pub user_id: Uuid,
}

impl Notification {
    /// Build a before-phase notification.
    pub fn before(operation: Operation, node_id: i64, user_id: Uuid) -> Self {
        Self {
            operation,
            phase: Phase::Before,
            node_id,
            cultures: Vec::new(),
            user_id,
        }
    }

    /// Build an after-phase notification.
    pub fn after(operation: Operation, node_id: i64, user_id: Uuid) -> Self {
        Self {
            operation,
            phase: Phase::After,
            node_id,
            cultures: Vec::new(),
            user_id,
        }
    }

    /// Attach affected cultures.
    pub fn with_cultures(mut self, cultures: Vec<String>) -> Self {
        self.cultures = cultures;
        self
    }
}

/// A registered notification handler.
pub trait NotificationHandler: Send + Sync {
    /// Handler name, for logging.
    fn name(&self) -> &str;

    /// Handle a notification. The return value is only consulted for
    /// before-phase notifications.
    fn handle(&self, notification: &Notification) -> Decision;
}

struct HandlerEntry {
    weight: i32,
    handler: Arc<dyn NotificationHandler>,
}

/// Bus dispatching notifications to registered handlers.
#[derive(Default)]
pub struct NotificationBus {
    handlers: RwLock<Vec<HandlerEntry>>,
}

impl NotificationBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler at the given weight. Lower weights run first.
    pub fn register(&self, weight: i32, handler: Arc<dyn NotificationHandler>) {
        let mut handlers = self.handlers.write();
        handlers.push(HandlerEntry { weight, handler });
        handlers.sort_by_key(|e| e.weight);
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Dispatch a before-phase notification. The first Cancel wins.
    pub fn gate(&self, notification: &Notification) -> Decision {
        debug_assert_eq!(notification.phase, Phase::Before);

        for entry in self.handlers.read().iter() {
            if entry.handler.handle(notification) == Decision::Cancel {
                info!(
                    handler = entry.handler.name(),
                    operation = ?notification.operation,
                    node_id = notification.node_id,
                    "operation cancelled by handler"
                );
                return Decision::Cancel;
            }
        }

        Decision::Proceed
    }

    /// Dispatch an after-phase notification. Verdicts are ignored.
    pub fn notify(&self, notification: &Notification) {
        debug_assert_eq!(notification.phase, Phase::After);

        let handlers = self.handlers.read();
        for entry in handlers.iter() {
            entry.handler.handle(notification);
        }

        debug!(
            operation = ?notification.operation,
            node_id = notification.node_id,
            handlers = handlers.len(),
            "notification dispatched"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        name: String,
        calls: AtomicUsize,
        verdict: Decision,
    }

    impl CountingHandler {
        fn new(name: &str, verdict: Decision) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                calls: AtomicUsize::new(0),
                verdict,
            })
        }
    }

    impl NotificationHandler for CountingHandler {
        fn name(&self) -> &str {
            &self.name
        }

        fn handle(&self, _notification: &Notification) -> Decision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict
        }
    }

    #[test]
    fn empty_bus_proceeds() {
        let bus = NotificationBus::new();
        let n = Notification::before(Operation::Save, 1, Uuid::nil());
        assert_eq!(bus.gate(&n), Decision::Proceed);
    }

    #[test]
    fn first_cancel_wins_and_short_circuits() {
        let bus = NotificationBus::new();
        let veto = CountingHandler::new("veto", Decision::Cancel);
        let later = CountingHandler::new("later", Decision::Proceed);
        bus.register(0, veto.clone());
        bus.register(10, later.clone());

        let n = Notification::before(Operation::Publish, 1, Uuid::nil());
        assert_eq!(bus.gate(&n), Decision::Cancel);
        assert_eq!(veto.calls.load(Ordering::SeqCst), 1);
        assert_eq!(later.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn weight_order_is_respected() {
        let bus = NotificationBus::new();
        let low = CountingHandler::new("low", Decision::Cancel);
        // Registered later but with lower weight, so it runs first
        bus.register(10, CountingHandler::new("high", Decision::Cancel));
        bus.register(-10, low.clone());

        let n = Notification::before(Operation::Move, 1, Uuid::nil());
        assert_eq!(bus.gate(&n), Decision::Cancel);
        assert_eq!(low.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn notify_calls_every_handler() {
        let bus = NotificationBus::new();
        let a = CountingHandler::new("a", Decision::Cancel);
        let b = CountingHandler::new("b", Decision::Proceed);
        bus.register(0, a.clone());
        bus.register(1, b.clone());

        bus.notify(&Notification::after(Operation::Save, 1, Uuid::nil()));
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
    }
}

//! Deferred-Work Seam
//!
//! Diagnostic jobs run outside interrupt context. The recovery controller
//! allocates its work items once and re-queues the same items forever; the
//! board port decides where queued work actually executes.

use alloc::sync::Arc;

/// A unit of deferred work.
pub trait Work: Send + Sync {
    /// Execute the work item.
    fn run(&self);
}

/// Execution context for deferred work.
pub trait WorkQueue: Send + Sync {
    /// Queue a work item for execution.
    ///
    /// Returns false if the queue refused the item (shutting down).
    /// Callers bound their own in-flight depth; the queue does not
    /// deduplicate.
    fn queue(&self, work: Arc<dyn Work>) -> bool;
}

/// Queue that runs work inline at the call site.
///
/// Collapses the deferral for environments without a worker thread and
/// for tests that want synchronous execution.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineQueue;

impl WorkQueue for InlineQueue {
    fn queue(&self, work: Arc<dyn Work>) -> bool {
        work.run();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    struct Counter(AtomicU32);

    impl Work for Counter {
        fn run(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_inline_queue_runs_immediately() {
        let w = Arc::new(Counter(AtomicU32::new(0)));
        assert!(InlineQueue.queue(w.clone()));
        assert_eq!(w.0.load(Ordering::Relaxed), 1);
    }
}

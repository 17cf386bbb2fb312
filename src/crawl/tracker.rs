// src/crawl/tracker.rs
// =============================================================================
// The completion tracker: knows when every crawl task has finished, even
// though nobody knows up front how many tasks there will be.
//
// How it works:
// - A live counter of outstanding tasks
// - register() bumps it and hands back a TaskGuard
// - Dropping the TaskGuard is the task's completion signal: the counter goes
//   down exactly once, and waiters are woken when it reaches zero
//
// The race to avoid: a parent finishes and the counter briefly hits zero
// before its children were counted. Children can only be registered through
// a live parent guard (TaskGuard::register_child), so every child increment
// happens while the parent still holds its own count.
// =============================================================================

use crate::fetch::Node;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::trace;

#[derive(Debug, Default)]
struct Shared {
    outstanding: AtomicUsize,
    idle: Notify,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionTracker {
    shared: Arc<Shared>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a new root task. Must be called before the task starts.
    pub fn register(&self, node: &Node) -> TaskGuard {
        TaskGuard::new(Arc::clone(&self.shared), node)
    }

    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::Acquire)
    }

    /// Waits until no registered task is outstanding.
    ///
    /// Returns immediately if nothing was ever registered.
    pub async fn wait(&self) {
        loop {
            let idle = self.shared.idle.notified();
            tokio::pin!(idle);
            // Register interest before checking, so a drop to zero between
            // the check and the await still wakes us
            idle.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// Proof that a task is counted as outstanding. Dropping it signals completion.
#[must_use = "dropping a TaskGuard immediately marks the task complete"]
#[derive(Debug)]
pub struct TaskGuard {
    shared: Arc<Shared>,
    node: Node,
}

impl TaskGuard {
    fn new(shared: Arc<Shared>, node: &Node) -> Self {
        let outstanding = shared.outstanding.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(%node, outstanding, "task registered");
        Self {
            shared,
            node: node.clone(),
        }
    }

    /// Counts a child task spawned by the task owning this guard.
    pub fn register_child(&self, node: &Node) -> TaskGuard {
        TaskGuard::new(Arc::clone(&self.shared), node)
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Emits the completion signal. Same as dropping the guard.
    pub fn complete(self) {}
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let remaining = self.shared.outstanding.fetch_sub(1, Ordering::AcqRel) - 1;
        trace!(node = %self.node, remaining, "task complete");
        if remaining == 0 {
            self.shared.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn node(s: &str) -> Node {
        s.to_string()
    }

    #[tokio::test]
    async fn test_wait_returns_when_nothing_registered() {
        let tracker = CompletionTracker::new();
        timeout(Duration::from_secs(1), tracker.wait())
            .await
            .expect("wait should not block");
    }

    #[tokio::test]
    async fn test_guard_counts_exactly_once() {
        let tracker = CompletionTracker::new();
        let root = tracker.register(&node("A"));
        let child = root.register_child(&node("B"));
        assert_eq!(tracker.outstanding(), 2);

        child.complete();
        assert_eq!(tracker.outstanding(), 1);
        drop(root);
        assert_eq!(tracker.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_wait_blocks_until_last_guard_drops() {
        let tracker = CompletionTracker::new();
        let root = tracker.register(&node("A"));

        let waiter = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.wait().await }
        });

        // Parent finishes, but only after handing off to a child
        let child = root.register_child(&node("B"));
        drop(root);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        assert_eq!(tracker.outstanding(), 1);

        drop(child);
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_nested_spawns_never_report_early() {
        // Each task spawns two children down to a fixed depth; every task
        // checks the count is still above zero while it runs.
        fn spawn_tree(guard: TaskGuard, tracker: CompletionTracker, depth: u32) {
            tokio::spawn(async move {
                assert!(tracker.outstanding() >= 1);
                if depth > 0 {
                    for i in 0..2 {
                        let child = guard.register_child(&format!("{}/{}", guard.node(), i));
                        spawn_tree(child, tracker.clone(), depth - 1);
                    }
                }
                tokio::task::yield_now().await;
                drop(guard);
            });
        }

        let tracker = CompletionTracker::new();
        let root = tracker.register(&node("root"));
        spawn_tree(root, tracker.clone(), 6);

        timeout(Duration::from_secs(5), tracker.wait())
            .await
            .expect("all tasks should finish");
        assert_eq!(tracker.outstanding(), 0);
    }
}

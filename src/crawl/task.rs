// src/crawl/task.rs
// =============================================================================
// One crawl task per claimed node.
//
// Lifecycle of a task:
// 1. Start: no depth budget left? Done, without fetching
// 2. Fetch the node; a failure goes straight to Done and stays local
// 3. Ask the registry to claim every child; spawn a task for each child we
//    won, with one less unit of depth, and move on without waiting for it
// 4. Done: settle the node in the registry, then drop the TaskGuard, which is
//    this task's one and only completion signal
//
// Children are registered through our own guard before we drop it, so the
// tracker can never see zero while a child is still being set up.
// =============================================================================

use super::registry::{Outcome, RegistryError, RegistryHandle};
use super::tracker::TaskGuard;
use crate::fetch::{Fetcher, Node};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// What every task shares: the fetch capability and the registry port.
pub(crate) struct CrawlContext {
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) registry: RegistryHandle,
}

/// Starts a crawl task for an already-claimed `node`. Fire-and-forget: the
/// guard is what the caller accounts for, not the JoinHandle.
pub(crate) fn spawn(ctx: Arc<CrawlContext>, node: Node, depth: u32, guard: TaskGuard) {
    tokio::spawn(run(ctx, node, depth, guard));
}

// Boxed so the task type does not refer to itself through spawn()
fn run(ctx: Arc<CrawlContext>, node: Node, depth: u32, guard: TaskGuard) -> BoxFuture<'static, ()> {
    async move {
        match visit(&ctx, &node, depth, &guard).await {
            Ok(outcome) => {
                if let Err(e) = ctx.registry.mark_settled(&node, outcome).await {
                    error!(%node, error = %e, "could not settle node");
                }
            }
            Err(e) => error!(%node, error = %e, "crawl task aborted"),
        }

        guard.complete();
    }
    .boxed()
}

async fn visit(
    ctx: &Arc<CrawlContext>,
    node: &Node,
    depth: u32,
    guard: &TaskGuard,
) -> Result<Outcome, RegistryError> {
    if depth == 0 {
        debug!(%node, "depth exhausted");
        return Ok(Outcome::DepthExhausted);
    }

    let page = match ctx.fetcher.fetch(node).await {
        Ok(page) => page,
        Err(e) => {
            warn!(%node, error = %e, "fetch failed");
            return Ok(Outcome::FetchFailed {
                reason: e.to_string(),
            });
        }
    };

    debug!(%node, depth, links = page.links.len(), "fetched");

    let mut spawned = 0;
    for child in &page.links {
        if ctx.registry.try_claim(child).await? {
            let child_guard = guard.register_child(child);
            spawn(Arc::clone(ctx), child.clone(), depth - 1, child_guard);
            spawned += 1;
        }
    }

    Ok(Outcome::Expanded {
        children: page.links.len(),
        spawned,
    })
}

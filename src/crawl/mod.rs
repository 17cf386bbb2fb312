// src/crawl/mod.rs
// =============================================================================
// This module crawls a graph of pages concurrently.
//
// Pieces:
// - registry: single-owner actor deciding which task may visit which node
// - tracker: counts outstanding tasks and wakes us when the last one finishes
// - task: the recursive, fan-out crawl task
//
// Guarantees:
// - Every node is claimed (and fetched) by at most one task
// - crawl() returns only after every spawned task has completed
// - A failed fetch only affects its own node
// =============================================================================

mod registry;
mod task;
mod tracker;

pub use registry::{ClaimSet, ClaimState, Outcome, RegistryError, RegistryHandle, VisitationRegistry};
pub use tracker::{CompletionTracker, TaskGuard};

use crate::fetch::{Fetcher, Node};
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use task::CrawlContext;
use tracing::{info, warn};

/// Knobs for a single crawl run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlConfig {
    /// Hops from the start node that may still be fetched. 0 means "settle the
    /// start node without fetching it".
    pub max_depth: u32,
    /// Bound of the registry inbox; senders wait while it is full.
    pub inbox_capacity: usize,
}

impl CrawlConfig {
    pub const DEFAULT_MAX_DEPTH: u32 = 4;
    pub const DEFAULT_INBOX_CAPACITY: usize = 256;

    pub fn with_max_depth(max_depth: u32) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            inbox_capacity: Self::DEFAULT_INBOX_CAPACITY,
        }
    }
}

/// Everything settled during one run, with how each node ended.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub start: Node,
    pub max_depth: u32,
    pub pages: BTreeMap<Node, Outcome>,
}

impl CrawlReport {
    fn from_claims(start: Node, max_depth: u32, claims: &ClaimSet) -> Self {
        let pages = claims
            .settled_outcomes()
            .map(|(node, outcome)| (node.clone(), outcome.clone()))
            .collect();
        Self {
            start,
            max_depth,
            pages,
        }
    }

    pub fn settled(&self) -> BTreeSet<Node> {
        self.pages.keys().cloned().collect()
    }

    pub fn outcome(&self, node: &str) -> Option<&Outcome> {
        self.pages.get(node)
    }

    /// Nodes that were fetched and expanded.
    pub fn fetched(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Expanded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::FetchFailed { .. }))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.pages.values().filter(|o| pred(o)).count()
    }
}

/// Crawls from `start` up to `max_depth` hops with default settings.
pub async fn crawl(start: &str, max_depth: u32, fetcher: Arc<dyn Fetcher>) -> Result<CrawlReport> {
    crawl_with_config(start, &CrawlConfig::with_max_depth(max_depth), fetcher).await
}

/// Crawls from `start` and blocks until every spawned task has completed.
pub async fn crawl_with_config(
    start: &str,
    config: &CrawlConfig,
    fetcher: Arc<dyn Fetcher>,
) -> Result<CrawlReport> {
    let start: Node = start.to_string();
    info!(%start, max_depth = config.max_depth, "crawl started");

    let registry = VisitationRegistry::spawn(config.inbox_capacity);
    let tracker = CompletionTracker::new();

    // The root goes through the registry like any other node
    if !registry.try_claim(&start).await? {
        return Err(anyhow!("Start node {} was already claimed", start));
    }
    let root = tracker.register(&start);

    let ctx = Arc::new(CrawlContext {
        fetcher,
        registry: registry.clone(),
    });
    task::spawn(ctx, start.clone(), config.max_depth, root);

    tracker.wait().await;

    // Every task queued its settle before completing, so the snapshot sees them all
    let claims = registry.snapshot().await?;
    let unsettled = claims.in_flight();
    if !unsettled.is_empty() {
        warn!(count = unsettled.len(), "nodes claimed but never settled");
    }

    let report = CrawlReport::from_claims(start, config.max_depth, &claims);
    info!(
        settled = report.len(),
        fetched = report.fetched(),
        failed = report.failed(),
        "crawl finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FixtureFetcher;
    use std::time::Duration;

    fn set(nodes: &[&str]) -> BTreeSet<Node> {
        nodes.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_small_cyclic_graph() {
        let fetcher = Arc::new(FixtureFetcher::from_edges([
            ("A", vec!["B", "C"]),
            ("B", vec!["A"]),
            ("C", vec![]),
        ]));

        let report = crawl("A", 2, fetcher.clone()).await.unwrap();

        assert_eq!(report.settled(), set(&["A", "B", "C"]));
        for node in ["A", "B", "C"] {
            assert_eq!(fetcher.fetch_count(node), 1, "{node} fetched once");
        }
        assert_eq!(
            report.outcome("C"),
            Some(&Outcome::Expanded { children: 0, spawned: 0 })
        );
        assert_eq!(
            report.outcome("B"),
            Some(&Outcome::Expanded { children: 1, spawned: 0 })
        );
    }

    #[tokio::test]
    async fn test_zero_depth_settles_start_without_fetching() {
        let fetcher = Arc::new(FixtureFetcher::from_edges([("A", vec!["B"])]));

        let report = crawl("A", 0, fetcher.clone()).await.unwrap();

        assert_eq!(report.settled(), set(&["A"]));
        assert_eq!(report.outcome("A"), Some(&Outcome::DepthExhausted));
        assert_eq!(fetcher.total_fetches(), 0);
    }

    #[tokio::test]
    async fn test_depth_bound_on_a_chain() {
        let fetcher = Arc::new(FixtureFetcher::from_edges([
            ("A", vec!["B"]),
            ("B", vec!["C"]),
            ("C", vec!["D"]),
            ("D", vec![]),
        ]));

        let report = crawl("A", 2, fetcher.clone()).await.unwrap();

        // C is two hops away: settled, but its budget is spent so it is not fetched
        assert_eq!(report.settled(), set(&["A", "B", "C"]));
        assert_eq!(report.outcome("C"), Some(&Outcome::DepthExhausted));
        assert_eq!(fetcher.fetch_count("C"), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_demo_graph() {
        let fetcher = Arc::new(FixtureFetcher::demo());

        let report = crawl(FixtureFetcher::DEMO_ROOT, 4, fetcher.clone()).await.unwrap();

        assert_eq!(
            report.settled(),
            set(&[
                "http://golang.org/",
                "http://golang.org/cmd/",
                "http://golang.org/pkg/",
                "http://golang.org/pkg/fmt/",
                "http://golang.org/pkg/os/",
            ])
        );
        assert_eq!(report.fetched(), 4);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.outcome("http://golang.org/cmd/"),
            Some(Outcome::FetchFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_failure_stays_local() {
        // B fails; its sibling C and C's child D are still crawled
        let fetcher = Arc::new(FixtureFetcher::from_edges([
            ("A", vec!["B", "C"]),
            ("C", vec!["D"]),
            ("D", vec![]),
        ]));

        let report = crawl("A", 3, fetcher).await.unwrap();

        assert_eq!(report.settled(), set(&["A", "B", "C", "D"]));
        assert_eq!(report.failed(), 1);
        assert_eq!(report.fetched(), 3);
    }

    #[tokio::test]
    async fn test_failing_start_node() {
        let fetcher = Arc::new(FixtureFetcher::default());

        let report = crawl("nowhere", 3, fetcher).await.unwrap();

        assert_eq!(report.settled(), set(&["nowhere"]));
        assert_eq!(report.failed(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_complete_graph_fetches_each_node_once() {
        let names: Vec<String> = (0..40).map(|i| format!("n{i}")).collect();
        let fetcher = Arc::new(FixtureFetcher::from_pages(names.iter().map(|name| {
            let links: Vec<&str> = names.iter().map(String::as_str).collect();
            (name.clone(), crate::fetch::Page::new(name.as_str(), links))
        })));

        let report = crawl("n0", 40, fetcher.clone()).await.unwrap();

        assert_eq!(report.len(), names.len());
        for name in &names {
            assert_eq!(fetcher.fetch_count(name), 1);
        }
        // Across all tasks, every node except the root was spawned exactly once
        let spawned: usize = report
            .pages
            .values()
            .map(|o| match o {
                Outcome::Expanded { spawned, .. } => *spawned,
                _ => 0,
            })
            .sum();
        assert_eq!(spawned, names.len() - 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_slow_fetches_do_not_complete_early() {
        // With latency every task is still running long after the registry
        // inbox has gone quiet; crawl() must still wait for all of them
        let fetcher = Arc::new(
            FixtureFetcher::from_edges([
                ("A", vec!["B", "C"]),
                ("B", vec!["D"]),
                ("C", vec!["E"]),
                ("D", vec!["F"]),
                ("E", vec![]),
                ("F", vec![]),
            ])
            .with_latency(Duration::from_millis(20)),
        );

        let report = crawl("A", 10, fetcher).await.unwrap();

        assert_eq!(report.settled(), set(&["A", "B", "C", "D", "E", "F"]));
        assert_eq!(report.fetched(), 6);
    }

    #[tokio::test]
    async fn test_tiny_inbox_still_completes() {
        let fetcher = Arc::new(FixtureFetcher::demo());
        let config = CrawlConfig {
            max_depth: 4,
            inbox_capacity: 1,
        };

        let report = crawl_with_config(FixtureFetcher::DEMO_ROOT, &config, fetcher)
            .await
            .unwrap();

        assert_eq!(report.len(), 5);
    }

    #[test]
    fn test_report_serializes_outcomes() {
        let mut claims = ClaimSet::new();
        claims.try_claim(&"A".to_string());
        claims.settle(&"A".to_string(), Outcome::DepthExhausted);
        let report = CrawlReport::from_claims("A".to_string(), 0, &claims);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["pages"]["A"]["outcome"], "depth_exhausted");
    }
}

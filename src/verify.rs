// src/verify.rs
// =============================================================================
// Post-run check: does the concurrent crawl agree with a plain sequential BFS?
//
// The reference walk uses the same depth rule as the crawler: a node h hops
// from the start is settled if h <= max_depth and fetched if h < max_depth.
// It runs one fetch at a time and is only meant for small graphs and tests.
// =============================================================================

use crate::crawl::CrawlReport;
use crate::fetch::{Fetcher, Node};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet, VecDeque};

#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub expected: BTreeSet<Node>,
    /// Reachable within the bound but not settled by the crawl.
    pub missing: BTreeSet<Node>,
    /// Settled by the crawl but not reachable within the bound.
    pub unexpected: BTreeSet<Node>,
}

impl Verification {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Nodes within `max_depth` hops of `start`, found by a sequential BFS.
pub async fn reachable_within(fetcher: &dyn Fetcher, start: &str, max_depth: u32) -> BTreeSet<Node> {
    let mut seen: HashSet<Node> = HashSet::from([start.to_string()]);
    let mut queue = VecDeque::from([(start.to_string(), 0u32)]);

    while let Some((node, hops)) = queue.pop_front() {
        if hops >= max_depth {
            continue;
        }

        // Unreachable nodes are still part of the result, just not expanded
        let Ok(page) = fetcher.fetch(&node).await else {
            continue;
        };

        for link in page.links {
            if seen.insert(link.clone()) {
                queue.push_back((link, hops + 1));
            }
        }
    }

    seen.into_iter().collect()
}

/// Compares a crawl report against the sequential reference walk.
pub async fn verify(report: &CrawlReport, fetcher: &dyn Fetcher) -> Verification {
    let expected = reachable_within(fetcher, &report.start, report.max_depth).await;
    let settled = report.settled();

    Verification {
        missing: expected.difference(&settled).cloned().collect(),
        unexpected: settled.difference(&expected).cloned().collect(),
        expected,
    }
}

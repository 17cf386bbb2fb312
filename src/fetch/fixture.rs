// src/fetch/fixture.rs
// =============================================================================
// A fetcher that returns canned results from an in-memory graph.
//
// The graph can come from:
// 1. A JSON file: { "<node>": { "body": "...", "links": ["<node>", ...] } }
// 2. The built-in demo graph (a handful of golang.org pages)
// 3. Code, via FixtureFetcher::from_pages (used heavily by tests)
//
// Nodes that are linked to but have no entry fail with FetchError::NotFound,
// which is how the demo graph exercises the "fetch failed" path.
//
// Every call is logged so tests can assert which nodes were fetched and how
// often.
// =============================================================================

use super::{FetchError, Fetcher, Node, Page};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct FixtureFetcher {
    pages: HashMap<Node, Page>,
    latency: Option<Duration>,
    fetch_log: Mutex<Vec<Node>>,
}

impl FixtureFetcher {
    pub fn from_pages(pages: impl IntoIterator<Item = (Node, Page)>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Builds a fixture from adjacency lists; every body is the node name.
    ///
    /// Handy in tests: `FixtureFetcher::from_edges([("A", vec!["B"]), ("B", vec![])])`
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = (&'a str, Vec<&'a str>)>) -> Self {
        Self::from_pages(
            edges
                .into_iter()
                .map(|(node, links)| (node.to_string(), Page::new(node, links))),
        )
    }

    /// Parses a JSON fixture graph.
    pub fn from_json(json: &str) -> Result<Self> {
        let pages: HashMap<Node, Page> =
            serde_json::from_str(json).context("Fixture graph is not valid JSON")?;
        Ok(Self::from_pages(pages))
    }

    /// Reads a JSON fixture graph from disk.
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read fixture graph {}", path.display()))?;
        Self::from_json(&json)
    }

    /// The golang.org pages from the Go tour, with /cmd/ left dangling.
    pub fn demo() -> Self {
        Self::from_pages([
            (
                Self::DEMO_ROOT.to_string(),
                Page::new(
                    "The Go Programming Language",
                    ["http://golang.org/pkg/", "http://golang.org/cmd/"],
                ),
            ),
            (
                "http://golang.org/pkg/".to_string(),
                Page::new(
                    "Packages",
                    [
                        "http://golang.org/",
                        "http://golang.org/cmd/",
                        "http://golang.org/pkg/fmt/",
                        "http://golang.org/pkg/os/",
                    ],
                ),
            ),
            (
                "http://golang.org/pkg/fmt/".to_string(),
                Page::new("Package fmt", ["http://golang.org/", "http://golang.org/pkg/"]),
            ),
            (
                "http://golang.org/pkg/os/".to_string(),
                Page::new("Package os", ["http://golang.org/", "http://golang.org/pkg/"]),
            ),
        ])
    }

    pub const DEMO_ROOT: &'static str = "http://golang.org/";

    /// Sleeps for `latency` inside every fetch, so tasks actually overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every node id that appears in the graph, as a key or as a link target.
    pub fn known_nodes(&self) -> impl Iterator<Item = &Node> {
        self.pages
            .iter()
            .flat_map(|(node, page)| std::iter::once(node).chain(page.links.iter()))
    }

    /// How many times `node` has been fetched so far.
    pub fn fetch_count(&self, node: &str) -> usize {
        self.lock_log().iter().filter(|n| n.as_str() == node).count()
    }

    /// Total fetch calls so far.
    pub fn total_fetches(&self) -> usize {
        self.lock_log().len()
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, Vec<Node>> {
        // A poisoned log only means a test panicked mid-push; the data is still usable.
        self.fetch_log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn fetch(&self, node: &Node) -> Result<Page, FetchError> {
        self.lock_log().push(node.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.pages
            .get(node)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(node.clone()))
    }
}

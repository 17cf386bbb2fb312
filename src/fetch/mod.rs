// src/fetch/mod.rs
// =============================================================================
// This module defines the fetch capability the crawler consumes.
//
// The crawler never talks to the network itself. It asks a Fetcher for a
// node's content and outgoing links, and treats any failure as "unreachable".
//
// Submodules:
// - fixture: canned in-memory graph (JSON file or the built-in demo)
// - html: a directory of local HTML files, linked with <a href>
//
// Rust concepts:
// - Traits: Fetcher is an interface implemented by several types
// - async-trait: lets a trait object (dyn Fetcher) have async methods
// - thiserror: derive Display/Error for our error enum
// =============================================================================

mod fixture;
mod html;

pub use fixture::FixtureFetcher;
pub use html::{extract_links, HtmlDirFetcher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque identifier of a graph vertex (usually a URL).
pub type Node = String;

/// What a successful fetch returns: the page body and the nodes it links to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub body: String,
    #[serde(default)]
    pub links: Vec<Node>,
}

impl Page {
    pub fn new(body: impl Into<String>, links: impl IntoIterator<Item = impl Into<Node>>) -> Self {
        Self {
            body: body.into(),
            links: links.into_iter().map(Into::into).collect(),
        }
    }
}

/// Why a node could not be fetched.
///
/// The crawl core does not distinguish between variants: every failure
/// settles the node without expanding it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(Node),

    #[error("cannot read {node}: {reason}")]
    Unreadable { node: Node, reason: String },
}

/// Given a node, return its content and adjacent nodes, or a failure.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, node: &Node) -> Result<Page, FetchError>;
}

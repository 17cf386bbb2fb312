// src/fetch/html.rs
// =============================================================================
// A fetcher backed by a directory of local HTML files.
//
// Node identifiers are file:// URLs. Fetching a node:
// 1. Turns the URL back into a path and checks it is inside the root directory
// 2. Reads the file
// 3. Extracts every <a href> and resolves it against the page URL
// 4. Keeps only file:// links that stay inside the root directory
//
// A link to a missing file is still returned as a child; fetching it later
// fails with NotFound, which the crawler records as a failed page.
//
// We use the `scraper` crate for HTML parsing and the `url` crate to resolve
// relative links exactly like a browser would.
// =============================================================================

use super::{FetchError, Fetcher, Node, Page};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone)]
pub struct HtmlDirFetcher {
    root: PathBuf,
}

impl HtmlDirFetcher {
    /// Serves pages from `root`, which must be an existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .with_context(|| format!("Cannot open site directory {}", root.display()))?;

        if !root.is_dir() {
            return Err(anyhow!("Not a directory: {}", root.display()));
        }

        Ok(Self { root })
    }

    /// The node identifier (file:// URL) of a file under the root.
    ///
    /// `relative` is interpreted relative to the root directory.
    pub fn node_for(&self, relative: &str) -> Result<Node> {
        let path = self.root.join(relative);
        let url = Url::from_file_path(&path)
            .map_err(|_| anyhow!("Cannot build a file URL for {}", path.display()))?;
        Ok(url.to_string())
    }

    fn path_for(&self, node: &Node) -> Result<PathBuf, FetchError> {
        let unreadable = |reason: &str| FetchError::Unreadable {
            node: node.clone(),
            reason: reason.to_string(),
        };

        let url = Url::parse(node).map_err(|e| unreadable(&e.to_string()))?;
        if url.scheme() != "file" {
            return Err(unreadable("not a file:// URL"));
        }

        let path = url
            .to_file_path()
            .map_err(|_| unreadable("URL has no local path"))?;

        if !self.contains(&path) {
            return Err(unreadable("outside the site directory"));
        }

        Ok(path)
    }

    fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    fn is_local_link(&self, link: &str) -> bool {
        Url::parse(link)
            .ok()
            .filter(|url| url.scheme() == "file")
            .and_then(|url| url.to_file_path().ok())
            .map(|path| self.contains(&path))
            .unwrap_or(false)
    }
}

#[async_trait]
impl Fetcher for HtmlDirFetcher {
    async fn fetch(&self, node: &Node) -> Result<Page, FetchError> {
        let path = self.path_for(node)?;

        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::NotFound(node.clone()));
            }
            Err(e) => {
                return Err(FetchError::Unreadable {
                    node: node.clone(),
                    reason: e.to_string(),
                });
            }
        };

        // The node parsed as a URL in path_for, so this cannot fail in practice
        let base = Url::parse(node).map_err(|e| FetchError::Unreadable {
            node: node.clone(),
            reason: e.to_string(),
        })?;

        let links = extract_links(&body, &base)
            .into_iter()
            .filter(|link| self.is_local_link(link))
            .collect();

        Ok(Page { body, links })
    }
}

// Extracts all links from HTML content
//
// Parameters:
//   html: the HTML content to parse
//   base: the URL of the page (for resolving relative links)
//
// Returns: absolute URLs with fragments stripped, first occurrence order,
// without duplicates
pub fn extract_links(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);

    // Constant selector, known to be valid
    let selector = Selector::parse("a[href]").expect("a[href] is a valid selector");

    let mut links: Vec<String> = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        if let Some(absolute) = resolve_link(base, href) {
            if !links.contains(&absolute) {
                links.push(absolute);
            }
        }
    }

    links
}

// Resolves a link (possibly relative) to an absolute URL
fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();

    // Skip anchors and special protocols
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    url.set_fragment(None);
    Some(url.to_string())
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why file:// URLs as node ids?
//    - They are unique per file and already carry "relative link" semantics
//    - Url::join resolves "../about.html" against the current page for us
//
// 2. Why canonicalize the root?
//    - Url::to_file_path returns absolute paths
//    - starts_with only works if both sides use the same absolute form
//
// 3. Why is a missing file still a child?
//    - Broken links are part of the graph; the crawler settles them as failed
// -----------------------------------------------------------------------------

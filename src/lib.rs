// src/lib.rs
// =============================================================================
// fanout-crawler: crawl a graph of pages concurrently, visiting each page once.
//
// Modules:
// - crawl: the visitation registry, completion tracker and crawl tasks
// - fetch: the Fetcher trait plus fixture and local-HTML implementations
// - verify: compare a crawl against a sequential reference walk
//
// The binary (src/main.rs) is a thin CLI over this library.
// =============================================================================

pub mod crawl;
pub mod fetch;
pub mod verify;

pub use crawl::{crawl, crawl_with_config, CrawlConfig, CrawlReport, Outcome};
pub use fetch::{FetchError, Fetcher, FixtureFetcher, HtmlDirFetcher, Node, Page};
pub use verify::{verify, Verification};

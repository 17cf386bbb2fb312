// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API: the CLI structure is described by Rust structs
// and enums, and clap generates the parsing, --help and --version for us.
// =============================================================================

use clap::{Parser, Subcommand};
use fanout_crawler::CrawlConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fanout-crawler",
    version,
    about = "Crawl a graph of pages concurrently, visiting each page exactly once",
    long_about = "fanout-crawler walks every page reachable from a start page, up to a maximum depth. \
                  Pages come from a JSON fixture graph or a local directory of HTML files; \
                  nothing is fetched over the network."
)]
pub struct Cli {
    /// Capacity of the visitation registry's request queue
    #[arg(long, global = true, default_value_t = CrawlConfig::DEFAULT_INBOX_CAPACITY)]
    pub inbox_capacity: usize,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl a JSON fixture graph (or the built-in demo graph)
    ///
    /// Example: fanout-crawler graph --max-depth 4
    Graph {
        /// Node to start from (defaults to the demo graph's root)
        start: Option<String>,

        /// JSON file mapping each node to { "body": ..., "links": [...] }
        #[arg(long)]
        graph: Option<PathBuf>,

        /// Maximum crawl depth; 0 settles the start node without fetching it
        #[arg(long, default_value_t = CrawlConfig::DEFAULT_MAX_DEPTH)]
        max_depth: u32,

        /// Simulated latency of every fetch, in milliseconds
        #[arg(long)]
        latency_ms: Option<u64>,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,

        /// Check the result against a sequential breadth-first walk
        #[arg(long)]
        verify: bool,
    },

    /// Crawl a local directory of HTML pages
    ///
    /// Example: fanout-crawler site ./public --start index.html --max-depth 3
    Site {
        /// Directory holding the pages
        root: PathBuf,

        /// Page to start from, relative to the root directory
        #[arg(long, default_value = "index.html")]
        start: String,

        /// Maximum crawl depth; 0 settles the start page without reading it
        #[arg(long, default_value_t = CrawlConfig::DEFAULT_MAX_DEPTH)]
        max_depth: u32,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,

        /// Check the result against a sequential breadth-first walk
        #[arg(long)]
        verify: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_graph_defaults() {
        let cli = Cli::parse_from(["fanout-crawler", "graph"]);
        assert_eq!(cli.inbox_capacity, CrawlConfig::DEFAULT_INBOX_CAPACITY);
        match cli.command {
            Commands::Graph {
                start,
                graph,
                max_depth,
                json,
                verify,
                ..
            } => {
                assert!(start.is_none());
                assert!(graph.is_none());
                assert_eq!(max_depth, CrawlConfig::DEFAULT_MAX_DEPTH);
                assert!(!json && !verify);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_site_args() {
        let cli = Cli::parse_from([
            "fanout-crawler",
            "site",
            "./public",
            "--max-depth",
            "2",
            "--inbox-capacity",
            "8",
        ]);
        assert_eq!(cli.inbox_capacity, 8);
        match cli.command {
            Commands::Site {
                root,
                start,
                max_depth,
                ..
            } => {
                assert_eq!(root, PathBuf::from("./public"));
                assert_eq!(start, "index.html");
                assert_eq!(max_depth, 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

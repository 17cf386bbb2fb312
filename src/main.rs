// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Set up logging (tracing, filtered by RUST_LOG, written to stderr)
// 2. Parse command-line arguments using clap
// 3. Build the fetcher for the chosen subcommand and run the crawl
// 4. Print the settled pages and, if asked, verify them
// 5. Exit with proper code (0 = success, 1 = verification failed, 2 = error)
// =============================================================================

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use fanout_crawler::verify::Verification;
use fanout_crawler::{
    crawl_with_config, verify, CrawlConfig, CrawlReport, Fetcher, FixtureFetcher, HtmlDirFetcher,
    Outcome,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_logging();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Logs go to stderr so --json output on stdout stays machine-readable
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fanout_crawler=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// Returns:
//   Ok(0) = crawl finished (and verified, if requested)
//   Ok(1) = verification found a difference
//   Err   = bad input or internal error
async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Graph {
            start,
            graph,
            max_depth,
            latency_ms,
            json,
            verify,
        } => {
            let mut fetcher = match &graph {
                Some(path) => FixtureFetcher::load(path).await?,
                None => FixtureFetcher::demo(),
            };
            if let Some(ms) = latency_ms {
                fetcher = fetcher.with_latency(Duration::from_millis(ms));
            }

            let start = start.unwrap_or_else(|| FixtureFetcher::DEMO_ROOT.to_string());
            let config = CrawlConfig {
                max_depth,
                inbox_capacity: cli.inbox_capacity,
            };
            handle_crawl(&start, &config, Arc::new(fetcher), json, verify).await
        }
        Commands::Site {
            root,
            start,
            max_depth,
            json,
            verify,
        } => {
            let fetcher = HtmlDirFetcher::new(&root)?;
            let start = fetcher
                .node_for(&start)
                .with_context(|| format!("Invalid start page {}", start))?;
            let config = CrawlConfig {
                max_depth,
                inbox_capacity: cli.inbox_capacity,
            };
            handle_crawl(&start, &config, Arc::new(fetcher), json, verify).await
        }
    }
}

async fn handle_crawl(
    start: &str,
    config: &CrawlConfig,
    fetcher: Arc<dyn Fetcher>,
    json: bool,
    check: bool,
) -> Result<i32> {
    let report = crawl_with_config(start, config, Arc::clone(&fetcher)).await?;

    let verification = if check {
        Some(verify(&report, fetcher.as_ref()).await)
    } else {
        None
    };

    print_results(&report, verification.as_ref(), json)?;

    match verification {
        Some(v) if !v.is_ok() => Ok(1),
        _ => Ok(0),
    }
}

fn print_results(report: &CrawlReport, verification: Option<&Verification>, json: bool) -> Result<()> {
    if json {
        let output = serde_json::json!({
            "report": report,
            "verification": verification,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_table(report);
        if let Some(v) = verification {
            print_verification(v);
        }
    }
    Ok(())
}

fn print_table(report: &CrawlReport) {
    println!("{:<60} {:<18} {:<30}", "NODE", "OUTCOME", "DETAIL");
    println!("{}", "=".repeat(108));

    for (node, outcome) in &report.pages {
        let node_display = if node.chars().count() > 57 {
            format!("{}...", node.chars().take(57).collect::<String>())
        } else {
            node.clone()
        };
        let (label, detail) = describe(outcome);
        println!("{:<60} {:<18} {:<30}", node_display, label, detail);
    }

    println!();
    println!("📊 Summary (start {}, max depth {}):", report.start, report.max_depth);
    println!("   ✅ Fetched: {}", report.fetched());
    println!("   ❌ Failed: {}", report.failed());
    println!("   📋 Settled: {}", report.len());
}

fn describe(outcome: &Outcome) -> (&'static str, String) {
    match outcome {
        Outcome::Expanded { children, spawned } => {
            ("✅ EXPANDED", format!("{} links, {} new", children, spawned))
        }
        Outcome::FetchFailed { reason } => ("❌ FAILED", reason.clone()),
        Outcome::DepthExhausted => ("⏹️  DEPTH LIMIT", String::new()),
    }
}

fn print_verification(v: &Verification) {
    println!();
    if v.is_ok() {
        println!("✅ Verified: {} node(s) match a sequential walk", v.expected.len());
        return;
    }

    println!("❌ Verification failed");
    for node in &v.missing {
        println!("   missing:    {}", node);
    }
    for node in &v.unexpected {
        println!("   unexpected: {}", node);
    }
}

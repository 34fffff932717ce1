// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Fetch the Confluence page, validate its links, rewrite the status icons
// 3. Print the status of every link (or JSON)
// 4. Exit with proper code (0 = all links OK, 1 = broken links, 2 = error)
//
// Rust concepts used:
// - async/await: Because we need to make many network requests concurrently
// - Result<T, E>: For error handling (T = success type, E = error type)
// =============================================================================

// Module declarations - tells Rust about our other source files
mod checker;    // src/checker/ - extraction, validation, rewriting
mod cli;        // src/cli.rs - command-line parsing
mod confluence; // src/confluence/ - Confluence REST client
mod logging;    // src/logging.rs - env_logger setup
mod report;     // src/report.rs - one full fetch/check/update run

use clap::Parser; // Parser trait enables the parse() method
use cli::Cli;
use confluence::ConfluenceClient;
use report::{SyncJob, SyncReport};

// anyhow::Result is like std::result::Result but simpler for applications
use anyhow::Result;
use log::warn;
use tokio_util::sync::CancellationToken;

// The #[tokio::main] attribute transforms our async main into a real main function
#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain: "Could not fetch content 1: HTTP 401 ..."
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = every link is OK
//   Ok(1) = at least one link is broken
//   Err = fetching or updating the page failed, or bad configuration
async fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose, cli.quiet);
    cli.check_urls()?;

    let settings = cli.validation_settings();
    let client = checker::build_client(&settings)?;
    let store = ConfluenceClient::new(
        &cli.confluence_url,
        &cli.confluence_username,
        &cli.confluence_password,
    )?;

    // Ctrl-C stops outstanding validations and aborts the run before the page is touched
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding validations");
            on_interrupt.cancel();
        }
    });

    let job = SyncJob {
        content_id: cli.confluence_content_id.clone(),
        host_prefix: cli.host_url.clone(),
        settings,
        match_mode: cli.match_mode,
        dry_run: cli.dry_run,
    };

    if !cli.json {
        println!(
            "🔍 Checking links of content {} against {}",
            job.content_id, job.host_prefix
        );
    }

    let report = report::sync_link_report(&store, &client, &job, &cancel).await?;

    print_results(&report, cli.json, cli.dry_run)?;

    if report.failed_count() > 0 {
        Ok(1)
    } else {
        Ok(0)
    }
}

// Prints the results either as per-link status lines or JSON
//
// In JSON mode everything goes into one document, so a dry run adds the
// rewritten page as a "rewritten" field instead of printing it afterwards.
fn print_results(report: &SyncReport, json: bool, dry_run: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json(dry_run)?);
        return Ok(());
    }

    print!("{}", report.status_lines());
    println!();

    let broken_count = report.failed_count();
    let ok_count = report.results.len() - broken_count;

    println!("📊 Summary:");
    println!("   ✅ OK: {}", ok_count);
    println!("   ❌ Broken: {}", broken_count);
    println!("   📋 Total: {}", report.results.len());

    match report.updated_version {
        Some(version) => println!("📝 Page updated to version {}", version),
        None if dry_run => {
            println!("📝 Dry run, rewritten page:");
            println!("{}", report.rewritten);
        }
        None => println!("📝 Page already up to date"),
    }
    Ok(())
}

// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Every option can also come from an environment variable (shown in
// --help), which is how CI jobs usually pass the Confluence credentials.
//
// Rust concepts:
// - Derive macros: clap generates the parser from the struct definition
// - value_parser: custom validation for numeric options
// =============================================================================

use anyhow::{anyhow, Result};
use clap::Parser;
use std::time::Duration;
use url::Url;

use crate::checker::{MatchMode, ValidationSettings};

// This struct represents our entire CLI application
#[derive(Parser, Debug)]
#[command(
    name = "redirect-guardian",
    version,
    about = "Checks the redirect links listed in a Confluence page and updates their status icons",
    long_about = "redirect-guardian reads the link table of a Confluence page, requests every link \
                  against the environment given by --host-url and flips the tick/cross icon next to \
                  each link to match the result. Run it from CI after every deployment."
)]
pub struct Cli {
    /// Base URL of the Confluence wiki (e.g. https://acme.atlassian.net/wiki)
    #[arg(long, env = "CONFLUENCE_URL", default_value = "https://blubb.atlassian.net/wiki")]
    pub confluence_url: String,

    /// Content ID of the Confluence page holding the link table
    #[arg(long, env = "CONFLUENCE_CONTENT_ID", default_value = "2428384")]
    pub confluence_content_id: String,

    /// Username for the Confluence API (leave empty for anonymous access)
    #[arg(long, env = "CONFLUENCE_USERNAME", default_value = "")]
    pub confluence_username: String,

    /// Password or API token for the Confluence API
    #[arg(long, env = "CONFLUENCE_PASSWORD", default_value = "", hide_env_values = true)]
    pub confluence_password: String,

    /// Environment the links are tested against; prepended to every link
    #[arg(long, env = "HOST_URL", default_value = "https://google.com")]
    pub host_url: String,

    /// Maximum number of links validated at the same time
    #[arg(long, default_value_t = 50, value_parser = parse_positive)]
    pub concurrency: usize,

    /// Timeout for a single request, in seconds
    #[arg(long, default_value_t = 30, value_parser = parse_positive_secs)]
    pub timeout: u64,

    /// Give up on links still running after this many seconds
    #[arg(long, value_parser = parse_positive_secs)]
    pub batch_timeout: Option<u64>,

    /// Treat any non-2xx response as a broken link
    #[arg(long)]
    pub require_2xx: bool,

    /// How links are tied to the status icon next to them
    #[arg(long, value_enum, default_value_t = MatchMode::Row)]
    pub match_mode: MatchMode,

    /// Print the rewritten page instead of updating Confluence
    #[arg(long)]
    pub dry_run: bool,

    /// Output results in JSON format instead of a table
    #[arg(long)]
    pub json: bool,

    /// Show debug logs (fetched and pushed page bodies, every request)
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Hide all logs, including warnings
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Validation settings derived from the options
    pub fn validation_settings(&self) -> ValidationSettings {
        ValidationSettings {
            concurrency: self.concurrency,
            request_timeout: Duration::from_secs(self.timeout),
            batch_timeout: self.batch_timeout.map(Duration::from_secs),
            require_success_status: self.require_2xx,
        }
    }

    /// Fails early on URLs we could never request
    pub fn check_urls(&self) -> Result<()> {
        check_http_url("--confluence-url", &self.confluence_url)?;
        check_http_url("--host-url", &self.host_url)?;
        Ok(())
    }
}

fn check_http_url(flag: &str, value: &str) -> Result<()> {
    let url = Url::parse(value).map_err(|e| anyhow!("Invalid {} '{}': {}", flag, value, e))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(anyhow!(
            "Invalid {} '{}': scheme must be http or https, not {}",
            flag,
            value,
            other
        )),
    }
}

fn parse_positive(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_positive_secs(value: &str) -> Result<u64, String> {
    parse_positive(value).map(|n| n as u64)
}

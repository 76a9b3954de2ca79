//! CLI entry point for the policy scraper.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use policy_scraper_core::config::parse_platform_hint;
use policy_scraper_core::{ExtractOptions, ExtractRequest, ExtractionResult, extract};
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // RUST_LOG wins over the verbosity flags
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let file_config = app_config::load_file_config(args.config.as_deref())?;
    let options = build_options(&args, &file_config)?;
    let request = ExtractRequest::new(&args.url, options)?;
    info!(url = %request.url, platform = %options.platform, "policy scraper starting");

    let mut result = extract(&request).await?;
    result.sort_rows();

    for failed in &result.failed_items {
        warn!(item = %failed.reference, error = %failed.reason, "policy skipped");
    }

    let destination = write_output(&result, args.output.as_deref())?;
    info!(
        summary = %result.summary(),
        platform = %result.platform,
        output = %destination,
        "extraction complete"
    );
    Ok(())
}

/// Layers CLI flags over the config file over built-in defaults.
fn build_options(args: &Args, file_config: &app_config::FileConfig) -> Result<ExtractOptions> {
    let defaults = ExtractOptions::default();
    let concurrency = args
        .concurrency
        .map(usize::from)
        .or(file_config.concurrency);
    Ok(ExtractOptions {
        platform: parse_platform_hint(&args.platform)?,
        include_all_books: args.all_books || file_config.include_all_books.unwrap_or(false),
        timeouts: file_config.apply_timeouts(defaults.timeouts),
        ..defaults
    }
    .with_concurrency(concurrency))
}

/// Writes the CSV and returns a description of where it went.
fn write_output(result: &ExtractionResult, output: Option<&Path>) -> Result<String> {
    let csv = result.to_csv();
    let Some(output) = output else {
        io::stdout()
            .lock()
            .write_all(csv.as_bytes())
            .context("Failed to write CSV to stdout")?;
        return Ok("stdout".to_string());
    };

    let path: PathBuf = if output.is_dir() {
        output.join(result.filename(Local::now().date_naive()))
    } else {
        output.to_path_buf()
    };
    fs::write(&path, csv).with_context(|| format!("Failed to write CSV to '{}'", path.display()))?;
    Ok(path.display().to_string())
}

//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Extract a school district's board policies into CSV.
///
/// Point it at the district's policy listing page. The publishing platform
/// (BoardDocs, a linked policy table, or accordion panels of PDFs) is
/// detected automatically unless `--platform` is given.
#[derive(Parser, Debug)]
#[command(name = "policy-scraper")]
#[command(author, version, about)]
pub struct Args {
    /// Policy listing URL (the scheme may be omitted)
    pub url: String,

    /// Platform: auto, boarddocs, table-link or accordion-pdf
    #[arg(short, long, default_value = "auto")]
    pub platform: String,

    /// BoardDocs: extract every book, not only the policy manual
    #[arg(long)]
    pub all_books: bool,

    /// Policies fetched at once (1-12, default 6)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=12))]
    pub concurrency: Option<u8>,

    /// Output file, or a directory to write the suggested filename into; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file (defaults to $XDG_CONFIG_HOME/policy-scraper/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Default tracing filter for the verbosity flags.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

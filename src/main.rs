//! CLI entry point for the citesync tool.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use citesync_core::{Config, FileConfig, Pipeline};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("Citesync starting");

    let terms = cli::collect_terms(&args.terms);
    if terms.is_empty() {
        info!("No search terms provided (each term needs at least 3 characters).");
        info!("Example: citesync \"deep learning; climate adaptation\" --min-year 2015");
        return Ok(());
    }

    // Resolve configuration once; the pipeline never re-reads it mid-run.
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("citesync.toml"));
    let file_config = if args.config.is_some() {
        FileConfig::load(&config_path)?
    } else {
        FileConfig::load_if_present(&config_path)?
    };
    let config = Config::resolve(file_config, &args.overrides())?;

    info!("Reminder: the Zotero API key must have write permission for the target library.");

    let pipeline = Pipeline::from_config(config)?;

    let progress = ProgressBar::new(terms.len() as u64);
    progress.set_style(ProgressStyle::with_template(
        "[{bar:30}] {pos}/{len} {msg}",
    )?);

    for term in &terms {
        progress.set_message(term.clone());
        match pipeline.run_term(term).await {
            Ok(summary) => progress.println(summary.to_string()),
            Err(error) => {
                warn!(term = %term, error = %error, "search failed; skipping term");
                progress.println(format!("{term:?}: search failed: {error}"));
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    let counts = pipeline.registry().counts();
    info!(
        accepted = counts.accepted,
        pdf_downloaded = counts.pdf_downloaded,
        pdf_failed = counts.pdf_failed,
        uploaded = counts.uploaded,
        upload_failed = counts.upload_failed,
        "Run complete"
    );

    Ok(())
}

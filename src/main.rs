//! Campus Uploadr - batch upload of site media to object storage
//!
//! Selects the given files under an upload profile, runs one sequential pass
//! and prints the pass report as JSON on stdout.

use campus_uploadr::config::Config;
use campus_uploadr::metrics;
use campus_uploadr::store::HttpObjectStore;
use campus_uploadr::upload::{BatchUploader, ItemView, PassReport, SelectedFile, TracingListener};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Campus Uploadr - upload a batch of files to the site's object storage
#[derive(Parser, Debug)]
#[command(name = "campus-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Upload profile to use (e.g. gallery, events, results)
    #[arg(short, long)]
    profile: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print Prometheus metrics after the pass
    #[arg(long)]
    print_metrics: bool,

    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Serialize)]
struct Output<'a> {
    report: &'a PassReport,
    skipped: Vec<String>,
    items: Vec<ItemView>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(args.log_level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Campus Uploadr v{}", campus_uploadr::VERSION);

    // Load configuration
    let config = Config::load(&args.config)?;
    info!("Loaded configuration from {:?}", args.config);
    let profile = config.profile(&args.profile)?;

    let store = Arc::new(HttpObjectStore::new(&config.store)?);
    let uploader = BatchUploader::new(profile.uploader.clone(), store, Arc::new(TracingListener))?;

    let mut batch = Vec::with_capacity(args.files.len());
    for path in &args.files {
        batch.push(SelectedFile::from_path(path).await?);
    }

    let outcome = uploader.select(batch)?;
    if uploader.is_empty() {
        anyhow::bail!("No files left to upload after validation");
    }

    let report = uploader.upload().await?;
    let output = Output {
        report: &report,
        skipped: outcome.skipped.iter().map(ToString::to_string).collect(),
        items: uploader.items(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    if args.print_metrics {
        print!("{}", metrics::render());
    }

    Ok(if report.all_succeeded() && outcome.skipped.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

//! Batch postal code resolution.
//!
//! Reads a CSV of addresses, resolves each one to a postal code or a
//! sentinel, and writes the results in input order.

mod progress;
mod records;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cartero::models::Sentinel;
use cartero::municipal::load_municipal_csv;
use cartero::normalize::SynonymService;
use cartero::pip::GeoJsonZoneSource;
use cartero::{BatchProcessor, Config, Engine};

use crate::progress::BarProgress;
use crate::records::{read_records, write_results};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "resolve")]
#[command(about = "Resolve Colombian addresses to postal codes")]
struct Args {
    /// CSV of records (city, department, admin_code, address, recipient)
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the results CSV
    #[arg(short, long)]
    output: PathBuf,

    /// GeoJSON FeatureCollection of postal zones
    #[arg(long)]
    zones: PathBuf,

    /// Municipal postal code index (CSV, optionally gzipped)
    #[arg(long)]
    municipal: Option<PathBuf>,

    /// TOML config file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of extra synonym files
    #[arg(long)]
    synonyms_dir: Option<PathBuf>,

    /// Drop every cached geocode before running
    #[arg(long)]
    clear_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };

    let mut synonyms = SynonymService::with_defaults();
    if let Some(dir) = &args.synonyms_dir {
        synonyms.load_from_dir(dir)?;
    }

    let engine = Engine::from_config(&config)?.with_synonyms(synonyms);
    if args.clear_cache {
        engine.clear_cache().context("Failed to clear geocode cache")?;
        info!("Geocode cache cleared");
    }

    let zones = engine.load_zones_from(&GeoJsonZoneSource::new(&args.zones))?;
    info!("Indexed {} postal zones", zones);

    if let Some(path) = &args.municipal {
        let entries = load_municipal_csv(path)?;
        let count = engine.upsert_municipal(entries);
        info!("Indexed {} municipalities", count);
    }

    info!("Loading records from {}", args.input.display());
    let records = read_records(&args.input)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing with unprocessed records marked");
            on_signal.cancel();
        }
    });

    let bar = BarProgress::new(records.len())?;
    let processor = BatchProcessor::for_engine(&config.batch, &engine);
    let report = processor.run(&engine, &records, &cancel, &bar).await;
    bar.finish(format!("{} resolved", report.resolved()));

    write_results(&args.output, &records, &report.results)?;

    info!(
        "Done: {} of {} resolved, {} not found, {} to review, {} errors, {} unprocessed, {} quota pauses",
        report.resolved(),
        report.results.len(),
        report.count(Sentinel::AddressNotFound),
        report.count(Sentinel::ReviewAddress),
        report.count(Sentinel::GeocodingError),
        report.count(Sentinel::NotProcessed),
        report.quota_pauses,
    );
    info!("Results written to {}", args.output.display());

    Ok(())
}

//! Offline batch pipeline.
//!
//! Cleans the raw Brent price CSV, fits the volatility change-point model
//! and persists both artifacts for the API server: the cleaned series as
//! CSV and the posterior trace as JSON. Any stage failure aborts the run
//! before partial output is written for that stage.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brentwatch_backend::data::cleaner;
use brentwatch_backend::model::changepoint::ChangePointModel;
use brentwatch_backend::model::sampler::{self, SamplerConfig};
use brentwatch_backend::model::summary;

#[derive(Parser, Debug)]
#[command(
    name = "run_pipeline",
    about = "Clean Brent price data and fit the Bayesian volatility change-point model"
)]
struct Args {
    /// Raw price CSV with Date and Price columns
    #[arg(long, env = "RAW_DATA_PATH", default_value = "data/raw/BrentOilPrices.csv")]
    raw: PathBuf,

    /// Output path for the cleaned series CSV
    #[arg(long, env = "CLEANED_DATA_PATH", default_value = "data/processed/brent_oil_clean.csv")]
    cleaned_out: PathBuf,

    /// Output path for the posterior trace artifact
    #[arg(long, env = "TRACE_PATH", default_value = "data/processed/changepoint_trace.json")]
    trace_out: PathBuf,

    /// Kept posterior draws per chain
    #[arg(long, default_value_t = SamplerConfig::default().draws)]
    draws: usize,

    /// Discarded tuning draws per chain
    #[arg(long, default_value_t = SamplerConfig::default().tune)]
    tune: usize,

    /// Independent sampling chains
    #[arg(long, default_value_t = SamplerConfig::default().chains)]
    chains: usize,

    /// Base random seed
    #[arg(long, default_value_t = SamplerConfig::default().seed)]
    seed: u64,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    let series = cleaner::clean(&args.raw)
        .with_context(|| format!("cleaning raw price data from {}", args.raw.display()))?;
    info!(rows = series.len(), "Cleaned price series ready");

    ensure_parent_dir(&args.cleaned_out)?;
    series
        .write_csv(&args.cleaned_out)
        .with_context(|| format!("writing cleaned series to {}", args.cleaned_out.display()))?;
    info!(path = %args.cleaned_out.display(), "Cleaned series persisted");

    let model = ChangePointModel::new(series.log_returns())
        .context("constructing change-point model")?;
    let config = SamplerConfig {
        draws: args.draws,
        tune: args.tune,
        chains: args.chains,
        seed: args.seed,
    };
    info!(
        draws = config.draws,
        tune = config.tune,
        chains = config.chains,
        seed = config.seed,
        "Starting change-point sampling"
    );
    let trace = sampler::sample(&model, &config);
    info!(total_draws = trace.total_draws(), "Sampling complete");

    ensure_parent_dir(&args.trace_out)?;
    trace
        .save(&args.trace_out)
        .with_context(|| format!("writing posterior trace to {}", args.trace_out.display()))?;
    info!(path = %args.trace_out.display(), "Posterior trace persisted");

    let summary = summary::summarize(&trace, &series).context("summarizing posterior trace")?;
    info!(
        most_probable_date = %summary.most_probable_date,
        sigma_1_mean = summary.sigma_1_mean,
        sigma_2_mean = summary.sigma_2_mean,
        "Change-point summary"
    );

    Ok(())
}

fn ensure_parent_dir(path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {}", parent.display()))?;
        }
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

//! BrentWatch API server.
//!
//! Loads the three precomputed datasets once at startup (cleaned prices,
//! event annotations, posterior trace reduced to a change-point summary)
//! and serves them read-only over HTTP. A dataset that fails to load is
//! logged and its endpoint answers 500; the rest stay available.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brentwatch_backend::api::{self, ApiDatasets};
use brentwatch_backend::config::ServerConfig;
use brentwatch_backend::data::cleaner::CleanedSeries;
use brentwatch_backend::data::events;
use brentwatch_backend::model::summary;
use brentwatch_backend::model::trace::PosteriorTrace;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env();
    let datasets = load_datasets(&config);
    info!(
        prices = datasets.prices.is_some(),
        events = datasets.events.is_some(),
        changepoint = datasets.changepoint.is_some(),
        "Datasets loaded"
    );

    let app = api::create_router(Arc::new(datasets)).layer(CorsLayer::permissive());

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Serving on http://{}", config.bind_addr);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Load-once, read-many, fail-soft: each dataset loads independently and a
/// failure only disables its own endpoint.
fn load_datasets(config: &ServerConfig) -> ApiDatasets {
    let prices = match CleanedSeries::read_csv(&config.cleaned_data_path) {
        Ok(series) => {
            info!(rows = series.len(), path = %config.cleaned_data_path.display(), "Loaded cleaned prices");
            Some(series)
        }
        Err(e) => {
            warn!("Failed to load cleaned prices: {e}");
            None
        }
    };

    let events = match events::load_events(&config.events_data_path) {
        Ok(events) => {
            info!(rows = events.len(), path = %config.events_data_path.display(), "Loaded events");
            Some(events)
        }
        Err(e) => {
            warn!("Failed to load events: {e}");
            None
        }
    };

    // The summary needs both the trace and the price series (for the
    // index-to-date mapping), so it is unavailable if either is.
    let changepoint = match (&prices, PosteriorTrace::load(&config.trace_path)) {
        (Some(series), Ok(trace)) => match summary::summarize(&trace, series) {
            Ok(s) => {
                info!(
                    date = %s.most_probable_date,
                    sigma_1_mean = s.sigma_1_mean,
                    sigma_2_mean = s.sigma_2_mean,
                    "Change-point summary ready"
                );
                Some(s)
            }
            Err(e) => {
                warn!("Failed to summarize posterior trace: {e}");
                None
            }
        },
        (None, Ok(_)) => {
            warn!("Posterior trace loaded but price series unavailable; cannot map change point to a date");
            None
        }
        (_, Err(e)) => {
            warn!("Failed to load posterior trace: {e}");
            None
        }
    };

    ApiDatasets { prices, events, changepoint }
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

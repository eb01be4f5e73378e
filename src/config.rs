//! Runtime configuration for the API server.
//!
//! Everything comes from environment variables with sensible defaults so the
//! server can run straight out of the repository after the batch pipeline has
//! produced its artifacts under `data/processed/`.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to, e.g. `0.0.0.0:5000`.
    pub bind_addr: String,
    /// Cleaned price series CSV produced by the pipeline.
    pub cleaned_data_path: PathBuf,
    /// Event annotations CSV (Date, Event Description, Type).
    pub events_data_path: PathBuf,
    /// Posterior trace artifact produced by the pipeline.
    pub trace_path: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(5000);

        Self {
            bind_addr: format!("{host}:{port}"),
            cleaned_data_path: env_path("CLEANED_DATA_PATH", "data/processed/brent_oil_clean.csv"),
            events_data_path: env_path("EVENTS_DATA_PATH", "data/processed/events_data.csv"),
            trace_path: env_path("TRACE_PATH", "data/processed/changepoint_trace.json"),
        }
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    env::var(var).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}

//! Read-only HTTP API over the precomputed artifacts.

mod routes;

pub use routes::{create_router, ApiDatasets};

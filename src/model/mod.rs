//! Bayesian volatility change-point model and its sampler.

pub mod changepoint;
pub mod sampler;
pub mod summary;
pub mod trace;

pub use changepoint::{ChangePointModel, LatentState, ModelError};
pub use sampler::SamplerConfig;
pub use summary::ChangePointSummary;
pub use trace::PosteriorTrace;

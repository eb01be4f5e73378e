//! Posterior sample storage.
//!
//! A trace is the immutable output of one sampling run: per-chain draw
//! vectors for each latent variable, plus the configuration that produced
//! them. Persisted as a JSON artifact so the summarizer and the API server
//! can run without re-fitting the model.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::changepoint::LatentState;

/// Kept draws of one chain, in draw order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainDraws {
    pub tau: Vec<usize>,
    pub sigma_1: Vec<f64>,
    pub sigma_2: Vec<f64>,
    pub mu_log_return: Vec<f64>,
}

impl ChainDraws {
    pub fn with_capacity(draws: usize) -> Self {
        Self {
            tau: Vec::with_capacity(draws),
            sigma_1: Vec::with_capacity(draws),
            sigma_2: Vec::with_capacity(draws),
            mu_log_return: Vec::with_capacity(draws),
        }
    }

    pub fn push(&mut self, state: &LatentState) {
        self.tau.push(state.tau);
        self.sigma_1.push(state.sigma_1);
        self.sigma_2.push(state.sigma_2);
        self.mu_log_return.push(state.mu);
    }

    pub fn len(&self) -> usize {
        self.tau.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tau.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorTrace {
    pub chains: Vec<ChainDraws>,
    /// Kept draws per chain.
    pub draws: usize,
    /// Discarded tuning draws per chain.
    pub tune: usize,
    /// Base seed; chain c used seed + c.
    pub seed: u64,
}

#[derive(Debug)]
pub enum TraceError {
    MissingInput(PathBuf),
    Io(std::io::Error),
    Format(serde_json::Error),
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceError::MissingInput(path) => {
                write!(f, "trace artifact not found: {}", path.display())
            }
            TraceError::Io(e) => write!(f, "I/O error: {e}"),
            TraceError::Format(e) => write!(f, "malformed trace artifact: {e}"),
        }
    }
}

impl std::error::Error for TraceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TraceError::Io(e) => Some(e),
            TraceError::Format(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TraceError {
    fn from(e: std::io::Error) -> Self {
        TraceError::Io(e)
    }
}

impl From<serde_json::Error> for TraceError {
    fn from(e: serde_json::Error) -> Self {
        TraceError::Format(e)
    }
}

impl PosteriorTrace {
    /// Total kept joint samples across chains.
    pub fn total_draws(&self) -> usize {
        self.chains.iter().map(ChainDraws::len).sum()
    }

    /// tau draws flattened across chains, chain order then draw order.
    pub fn flat_tau(&self) -> Vec<usize> {
        self.chains.iter().flat_map(|c| c.tau.iter().copied()).collect()
    }

    /// Mean over all chains and draws of a per-chain vector.
    fn flat_mean<F>(&self, field: F) -> Option<f64>
    where
        F: Fn(&ChainDraws) -> &[f64],
    {
        let mut sum = 0.0;
        let mut count = 0usize;
        for chain in &self.chains {
            for &v in field(chain) {
                sum += v;
                count += 1;
            }
        }
        (count > 0).then(|| sum / count as f64)
    }

    pub fn sigma_1_mean(&self) -> Option<f64> {
        self.flat_mean(|c| &c.sigma_1)
    }

    pub fn sigma_2_mean(&self) -> Option<f64> {
        self.flat_mean(|c| &c.sigma_2)
    }

    pub fn save(&self, path: &Path) -> Result<(), TraceError> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let file = File::open(path).map_err(|_| TraceError::MissingInput(path.to_path_buf()))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

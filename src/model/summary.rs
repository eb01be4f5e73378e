//! Posterior reduction to decision-ready scalars.
//!
//! Flattens the trace across chains, takes the mode of the sampled
//! change-point index (smallest value wins ties, so the result is
//! deterministic even for a multimodal posterior) and maps it back to the
//! calendar date of the corresponding cleaned-series row. Volatility point
//! estimates are plain arithmetic means over all chains and draws.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::cleaner::CleanedSeries;
use crate::model::trace::PosteriorTrace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePointSummary {
    pub most_probable_date: NaiveDate,
    pub sigma_1_mean: f64,
    pub sigma_2_mean: f64,
}

#[derive(Debug)]
pub enum SummaryError {
    /// No samples to reduce.
    EmptyTrace,
    /// The modal tau does not index a row of the cleaned series; the trace
    /// and series were produced from different data.
    TauOutOfRange { tau: usize, series_len: usize },
}

impl fmt::Display for SummaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryError::EmptyTrace => write!(f, "posterior trace contains no samples"),
            SummaryError::TauOutOfRange { tau, series_len } => write!(
                f,
                "modal change-point index {tau} out of range for series of length {series_len}"
            ),
        }
    }
}

impl std::error::Error for SummaryError {}

pub fn summarize(
    trace: &PosteriorTrace,
    series: &CleanedSeries,
) -> Result<ChangePointSummary, SummaryError> {
    let taus = trace.flat_tau();
    let tau = mode_smallest(&taus).ok_or(SummaryError::EmptyTrace)?;
    let most_probable_date = series
        .date_at(tau)
        .ok_or(SummaryError::TauOutOfRange { tau, series_len: series.len() })?;

    let sigma_1_mean = trace.sigma_1_mean().ok_or(SummaryError::EmptyTrace)?;
    let sigma_2_mean = trace.sigma_2_mean().ok_or(SummaryError::EmptyTrace)?;

    Ok(ChangePointSummary { most_probable_date, sigma_1_mean, sigma_2_mean })
}

/// Most frequent value; ties break toward the smallest value so the result
/// never depends on map iteration order.
pub(crate) fn mode_smallest(values: &[usize]) -> Option<usize> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for &v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(v1, c1), (v2, c2)| c1.cmp(c2).then_with(|| v2.cmp(v1)))
        .map(|(v, _)| v)
}

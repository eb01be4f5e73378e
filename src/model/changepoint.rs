//! The joint probability model over {tau, sigma_1, sigma_2, mu_log_return}.
//!
//! Generative story: log-returns are Normal with a shared mean and a
//! standard deviation that switches from sigma_1 to sigma_2 at the discrete
//! change-point index tau. Priors: tau uniform over [0, N-1], sigmas
//! HalfNormal(0.1), mean Normal(0, 0.01). A point with index i uses sigma_1
//! when i < tau and sigma_2 otherwise, so tau = 0 puts the whole series in
//! the second regime.

use std::f64::consts::PI;
use std::fmt;

use statrs::distribution::{Continuous, Normal};

/// Prior scale of the half-normal on each regime volatility.
pub const SIGMA_PRIOR_SCALE: f64 = 0.1;
/// Prior standard deviation of the shared return mean.
pub const MU_PRIOR_SCALE: f64 = 0.01;

/// One joint assignment of the latent variables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatentState {
    pub tau: usize,
    pub sigma_1: f64,
    pub sigma_2: f64,
    pub mu: f64,
}

#[derive(Debug)]
pub enum ModelError {
    /// No valid index range for tau.
    EmptySeries,
    /// An observation is NaN or infinite.
    NonFiniteObservation { index: usize },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::EmptySeries => write!(f, "cannot build change-point model on empty series"),
            ModelError::NonFiniteObservation { index } => {
                write!(f, "observation at index {index} is not finite")
            }
        }
    }
}

impl std::error::Error for ModelError {}

#[derive(Debug)]
pub struct ChangePointModel {
    data: Vec<f64>,
}

impl ChangePointModel {
    pub fn new(data: Vec<f64>) -> Result<Self, ModelError> {
        if data.is_empty() {
            return Err(ModelError::EmptySeries);
        }
        if let Some(index) = data.iter().position(|x| !x.is_finite()) {
            return Err(ModelError::NonFiniteObservation { index });
        }
        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Log prior density. The uniform tau prior contributes a constant and
    /// is dropped; tau outside [0, N-1] is impossible.
    pub fn log_prior(&self, state: &LatentState) -> f64 {
        if state.tau >= self.data.len() {
            return f64::NEG_INFINITY;
        }
        half_normal_ln_pdf(state.sigma_1, SIGMA_PRIOR_SCALE)
            + half_normal_ln_pdf(state.sigma_2, SIGMA_PRIOR_SCALE)
            + normal_ln_pdf(state.mu, 0.0, MU_PRIOR_SCALE)
    }

    /// Log likelihood of the observed series under the regime switch.
    pub fn log_likelihood(&self, state: &LatentState) -> f64 {
        let (Ok(before), Ok(after)) = (
            Normal::new(state.mu, state.sigma_1),
            Normal::new(state.mu, state.sigma_2),
        ) else {
            return f64::NEG_INFINITY;
        };
        self.data
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                if i < state.tau {
                    before.ln_pdf(x)
                } else {
                    after.ln_pdf(x)
                }
            })
            .sum()
    }

    pub fn log_posterior(&self, state: &LatentState) -> f64 {
        let prior = self.log_prior(state);
        if prior == f64::NEG_INFINITY {
            return f64::NEG_INFINITY;
        }
        prior + self.log_likelihood(state)
    }

    /// Unnormalized log conditional of tau given the continuous parameters,
    /// evaluated for every candidate index in one O(N) pass over prefix
    /// sums of squared residuals. Shared constants are dropped; `out` is
    /// overwritten.
    pub fn tau_log_conditional(&self, state: &LatentState, out: &mut Vec<f64>) {
        let n = self.data.len();
        out.clear();
        out.reserve(n);

        let (s1, s2) = (state.sigma_1, state.sigma_2);
        if s1 <= 0.0 || s2 <= 0.0 {
            out.extend(std::iter::repeat(f64::NEG_INFINITY).take(n));
            return;
        }
        let ln_s1 = s1.ln();
        let ln_s2 = s2.ln();
        let inv1 = 1.0 / (2.0 * s1 * s1);
        let inv2 = 1.0 / (2.0 * s2 * s2);

        let total: f64 = self.data.iter().map(|&x| (x - state.mu).powi(2)).sum();

        // q = sum of squared residuals over indices < t
        let mut q = 0.0;
        for t in 0..n {
            let ll = -(t as f64) * ln_s1 - q * inv1
                - ((n - t) as f64) * ln_s2 - (total - q) * inv2;
            out.push(ll);
            q += (self.data[t] - state.mu).powi(2);
        }
    }
}

fn normal_ln_pdf(x: f64, mean: f64, sigma: f64) -> f64 {
    let z = (x - mean) / sigma;
    -0.5 * (2.0 * PI).ln() - sigma.ln() - 0.5 * z * z
}

/// Half-normal over (0, inf): ln pdf = ln(sqrt(2/pi)/scale) - x^2/(2 scale^2).
fn half_normal_ln_pdf(x: f64, scale: f64) -> f64 {
    if x <= 0.0 {
        return f64::NEG_INFINITY;
    }
    0.5 * (2.0 / PI).ln() - scale.ln() - x * x / (2.0 * scale * scale)
}

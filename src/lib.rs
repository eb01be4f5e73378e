//! BrentWatch Backend Library
//!
//! Retrospective Bayesian change-point analysis of Brent oil log-returns.
//! The offline pipeline cleans the raw price series and fits a single
//! volatility change point; the server exposes the cleaned data and the
//! posterior summary as read-only JSON.

pub mod api;
pub mod config;
pub mod data;
pub mod model;

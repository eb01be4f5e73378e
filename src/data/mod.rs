//! Data loading and cleaning for the change-point pipeline.

pub mod cleaner;
pub mod events;

pub use cleaner::{CleanError, CleanRow, CleanedSeries};
pub use events::EventRecord;

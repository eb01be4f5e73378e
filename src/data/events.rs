//! Event annotation loading.
//!
//! Independent reference dataset displayed alongside the price series; not
//! an input to the model. Column names follow the dashboard contract.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::cleaner::{parse_date, CleanError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Event Description")]
    pub description: String,
    #[serde(rename = "Type")]
    pub kind: String,
}

/// Load the events CSV. Dates may use any of the layouts the price cleaner
/// accepts, so rows are parsed by hand rather than through serde.
pub fn load_events(path: &Path) -> Result<Vec<EventRecord>, CleanError> {
    let file = File::open(path).map_err(|_| CleanError::MissingInput(path.to_path_buf()))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    let date_idx = position(&headers, "Date").ok_or(CleanError::MissingColumn("Date"))?;
    let desc_idx = position(&headers, "Event Description")
        .ok_or(CleanError::MissingColumn("Event Description"))?;
    let kind_idx = position(&headers, "Type").ok_or(CleanError::MissingColumn("Type"))?;

    let mut events = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = i + 2;
        events.push(EventRecord {
            date: parse_date(record.get(date_idx).unwrap_or_default(), line)?,
            description: record.get(desc_idx).unwrap_or_default().to_string(),
            kind: record.get(kind_idx).unwrap_or_default().to_string(),
        });
    }
    Ok(events)
}

fn position(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

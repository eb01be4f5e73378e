//! ETL round trip: raw CSV fixture -> cleaned series -> persisted artifacts.

use std::fs::File;
use std::io::Write;

use chrono::NaiveDate;

use brentwatch_backend::data::cleaner::{self, CleanedSeries};
use brentwatch_backend::model::changepoint::ChangePointModel;
use brentwatch_backend::model::sampler::{sample, SamplerConfig};
use brentwatch_backend::model::trace::PosteriorTrace;

fn write_fixture(path: &std::path::Path) {
    let mut f = File::create(path).unwrap();
    writeln!(f, "Date,Price").unwrap();
    // Unsorted, mixed layouts, one interior gap.
    writeln!(f, "22-May-87,18.63").unwrap();
    writeln!(f, "20-May-87,18.63").unwrap();
    writeln!(f, "21-May-87,18.45").unwrap();
    writeln!(f, "1987-05-25,").unwrap();
    writeln!(f, "1987-05-27,18.60").unwrap();
    writeln!(f, "\"May 26, 1987\",18.63").unwrap();
    writeln!(f, "1987-05-28,18.60").unwrap();
}

#[test]
fn cleans_fixture_and_survives_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let raw_path = dir.path().join("raw.csv");
    write_fixture(&raw_path);

    let series = cleaner::clean(&raw_path).unwrap();

    // 7 raw rows, all survive (the gap interpolates), first price row is
    // dropped for the return derivation.
    assert_eq!(series.len(), 6);
    let dates: Vec<NaiveDate> = series.rows().iter().map(|r| r.date).collect();
    let mut sorted = dates.clone();
    sorted.sort();
    assert_eq!(dates, sorted, "cleaned series must be date-ordered");
    assert!(series.rows().iter().all(|r| r.log_return.is_finite()));
    assert!(series.rows().iter().all(|r| r.price > 0.0));

    // Interpolated 1987-05-25 sits between its neighbors 18.63 and 18.63.
    let filled = series
        .rows()
        .iter()
        .find(|r| r.date == NaiveDate::parse_from_str("1987-05-25", "%Y-%m-%d").unwrap())
        .expect("gap row must survive via interpolation");
    assert!(filled.price >= 18.59 && filled.price <= 18.64);

    // Persist and reload both artifacts.
    let cleaned_path = dir.path().join("clean.csv");
    series.write_csv(&cleaned_path).unwrap();
    let reloaded = CleanedSeries::read_csv(&cleaned_path).unwrap();
    assert_eq!(series, reloaded);

    let model = ChangePointModel::new(reloaded.log_returns()).unwrap();
    let trace = sample(&model, &SamplerConfig { draws: 50, tune: 50, chains: 2, seed: 1 });
    let trace_path = dir.path().join("trace.json");
    trace.save(&trace_path).unwrap();
    assert_eq!(PosteriorTrace::load(&trace_path).unwrap(), trace);
}

//! Tests for retention truncation and its checkpoint

mod common;

use std::fs;
use std::time::Duration;

use airguard_core::{
    Retention, RetentionCheckpoint, RetentionConfig, RetentionTruncator, Sample, SeriesStore,
    TruncationOutcome,
};
use common::at;
use proptest::prelude::*;

fn store_with(dir: &tempfile::TempDir, samples: &[Sample]) -> SeriesStore {
    let store = SeriesStore::new(dir.path().join("sensor_data.csv"));
    for sample in samples {
        store.append(sample).unwrap();
    }
    store
}

#[test]
fn drops_samples_older_than_window() {
    let dir = tempfile::tempdir().unwrap();
    let t = at(28, 12, 0);
    let store = store_with(
        &dir,
        &[
            Sample::new(at(8, 12, 0), 1.0),  // t - 20d
            Sample::new(at(15, 12, 0), 2.0), // t - 13d
            Sample::new(at(27, 12, 0), 3.0), // t - 1d
            Sample::new(t, 4.0),
        ],
    );

    let outcome = RetentionTruncator::from_days(14).run(&store).unwrap();
    assert_eq!(outcome, TruncationOutcome::Truncated { removed: 1, kept: 3 });

    let values: Vec<f64> = store.read_all().unwrap().iter().map(|s| s.value).collect();
    assert_eq!(values, vec![2.0, 3.0, 4.0]);
}

#[test]
fn second_pass_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_with(
        &dir,
        &[Sample::new(at(1, 0, 0), 1.0), Sample::new(at(20, 0, 0), 2.0)],
    );
    let truncator = RetentionTruncator::from_days(14);

    assert!(matches!(
        truncator.run(&store).unwrap(),
        TruncationOutcome::Truncated { .. }
    ));
    let after_first = fs::read_to_string(store.path()).unwrap();
    let modified = fs::metadata(store.path()).unwrap().modified().unwrap();

    assert_eq!(
        truncator.run(&store).unwrap(),
        TruncationOutcome::Unchanged { kept: 1 }
    );
    assert_eq!(fs::read_to_string(store.path()).unwrap(), after_first);
    assert_eq!(fs::metadata(store.path()).unwrap().modified().unwrap(), modified);
}

#[test]
fn missing_store_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = SeriesStore::new(dir.path().join("sensor_data.csv"));

    assert_eq!(
        RetentionTruncator::from_days(14).run(&store).unwrap(),
        TruncationOutcome::StoreMissing
    );
    assert!(!store.exists());
}

#[test]
fn checkpoint_is_created_on_first_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncate_checkpoint.txt");

    let checkpoint = RetentionCheckpoint::load_or_init(&path, at(6, 3, 0)).unwrap();
    assert_eq!(checkpoint.last_run(), at(6, 3, 0));
    assert_eq!(fs::read_to_string(&path).unwrap(), "2024-07-06T03:00:00\n");
}

#[test]
fn checkpoint_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncate_checkpoint.txt");
    let day = Duration::from_secs(24 * 3600);

    let mut first = RetentionCheckpoint::load_or_init(&path, at(6, 3, 0)).unwrap();
    first.record(at(7, 3, 0)).unwrap();
    drop(first);

    // Restart 20 hours later: the persisted run time is kept, not "now"
    let resumed = RetentionCheckpoint::load_or_init(&path, at(7, 23, 0)).unwrap();
    assert_eq!(resumed.last_run(), at(7, 3, 0));
    assert!(!resumed.is_due(at(7, 23, 0), day));
    assert!(resumed.is_due(at(8, 3, 0), day));
}

#[test]
fn unreadable_checkpoint_starts_over() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncate_checkpoint.txt");
    fs::write(&path, "last tuesday\n").unwrap();

    let checkpoint = RetentionCheckpoint::load_or_init(&path, at(6, 3, 0)).unwrap();
    assert_eq!(checkpoint.last_run(), at(6, 3, 0));
    assert_eq!(fs::read_to_string(&path).unwrap(), "2024-07-06T03:00:00\n");
}

#[test]
fn retention_records_checkpoint_even_without_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = SeriesStore::new(dir.path().join("sensor_data.csv"));
    let path = dir.path().join("truncate_checkpoint.txt");

    let checkpoint = RetentionCheckpoint::load_or_init(&path, at(6, 0, 0)).unwrap();
    let mut retention = Retention::new(&RetentionConfig::default(), checkpoint);

    assert!(!retention.is_due(at(6, 23, 59)));
    assert!(retention.is_due(at(7, 0, 0)));

    let outcome = retention.run(&store, at(7, 0, 0)).unwrap();
    assert_eq!(outcome, TruncationOutcome::StoreMissing);
    assert_eq!(retention.checkpoint().last_run(), at(7, 0, 0));
    assert!(!retention.is_due(at(7, 12, 0)));
    assert_eq!(fs::read_to_string(&path).unwrap(), "2024-07-07T00:00:00\n");
}

proptest! {
    #[test]
    fn kept_samples_are_within_window(
        offsets in prop::collection::vec(0i64..(40 * 24 * 60), 1..60),
        days in 1u32..30,
    ) {
        let base = at(1, 0, 0);
        let series: Vec<Sample> = offsets
            .iter()
            .map(|m| Sample::new(base + chrono::Duration::minutes(*m), *m as f64))
            .collect();
        let window = chrono::Duration::days(i64::from(days));
        let newest = series.iter().map(|s| s.timestamp).max().unwrap();

        match airguard_core::retention::retain_window(&series, window) {
            Some(kept) => {
                prop_assert!(kept.len() < series.len());
                prop_assert!(kept.iter().all(|s| s.timestamp >= newest - window));
                // The newest sample always survives
                prop_assert!(kept.iter().any(|s| s.timestamp == newest));
            }
            None => {
                prop_assert!(series.iter().all(|s| s.timestamp >= newest - window));
            }
        }
    }
}

//! Integration tests for the multi-cadence scheduler
//!
//! Every test drives the loop with a `FixedClock`, so retry back-off and
//! hour-long cadences run instantly.

mod common;

use std::fs;
use std::path::Path;
use std::time::Duration;

use airguard_core::{
    CadenceEvent, Clock, FixedClock, MalformedPayload, NormalizerConfig, ReadingNormalizer,
    Retention, RetentionCheckpoint, RetentionConfig, RetryPolicy, Sample, ScheduleConfig,
    Scheduler, SchedulerError, SeriesStore, SkipReason, TruncationOutcome,
};
use common::{at, payload, FakeError, RecordingSink, ScriptedSource};

type Passthrough = fn(f64, f64) -> f64;

fn passthrough(_humidity: f64, concentration: f64) -> f64 {
    concentration
}

fn normalizer() -> ReadingNormalizer<Passthrough> {
    ReadingNormalizer::new(NormalizerConfig::default(), passthrough as Passthrough)
}

fn retention(dir: &Path, now: airguard_core::Timestamp) -> Retention {
    let checkpoint =
        RetentionCheckpoint::load_or_init(dir.join("truncate_checkpoint.txt"), now).unwrap();
    Retention::new(&RetentionConfig::default(), checkpoint)
}

fn scheduler<'a>(
    dir: &Path,
    clock: &'a FixedClock,
    source: &'a mut ScriptedSource,
    sink: &'a mut RecordingSink,
    config: ScheduleConfig,
) -> Scheduler<&'a FixedClock, &'a mut ScriptedSource, &'a mut RecordingSink, Passthrough> {
    Scheduler::new(
        config,
        clock,
        source,
        sink,
        normalizer(),
        SeriesStore::new(dir.join("sensor_data.csv")),
        retention(dir, clock.now()),
    )
    .with_retry(RetryPolicy::new(
        4,
        Duration::from_secs(90),
        Duration::from_secs(90),
    ))
}

#[test]
fn logs_once_per_interval() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FixedClock::new(at(6, 12, 0));
    let mut source = ScriptedSource::healthy(payload(12.5, 40.0));
    let mut sink = RecordingSink::default();
    let mut scheduler = scheduler(
        dir.path(),
        &clock,
        &mut source,
        &mut sink,
        ScheduleConfig::default(),
    );

    // Baseline is startup time: nothing due yet
    assert!(scheduler.tick().unwrap().is_idle());

    clock.advance(Duration::from_secs(119));
    assert!(scheduler.tick().unwrap().is_idle());

    clock.advance(Duration::from_secs(1));
    let report = scheduler.tick().unwrap();
    assert_eq!(
        report.logged(),
        Some(&Sample::new(at(6, 12, 2), 12.5))
    );

    clock.advance(Duration::from_secs(1));
    assert!(scheduler.tick().unwrap().logged().is_none());

    let series = scheduler.store().read_all().unwrap();
    assert_eq!(series.len(), 1);
    drop(scheduler);
    assert_eq!(source.calls, 1);
}

#[test]
fn gated_hours_do_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FixedClock::new(at(6, 21, 0));
    let mut source = ScriptedSource::healthy(payload(12.5, 40.0));
    let mut sink = RecordingSink::default();
    let config = ScheduleConfig {
        start_hour: 6,
        finish_hour: 20,
        ..ScheduleConfig::default()
    };
    let mut scheduler = scheduler(dir.path(), &clock, &mut source, &mut sink, config);

    clock.advance(Duration::from_secs(3600));
    let report = scheduler.tick().unwrap();
    assert!(report.gated);
    assert!(report.is_idle());

    assert!(!scheduler.store().exists());
    drop(scheduler);
    assert_eq!(source.calls, 0);
    assert!(sink.renders.is_empty());
}

#[test]
fn cadences_overdue_at_window_open_fire_on_first_active_tick() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FixedClock::new(at(6, 5, 0));
    let mut source = ScriptedSource::healthy(payload(8.0, 40.0));
    let mut sink = RecordingSink::default();
    let config = ScheduleConfig {
        start_hour: 6,
        finish_hour: 20,
        ..ScheduleConfig::default()
    };
    let mut scheduler = scheduler(dir.path(), &clock, &mut source, &mut sink, config);

    clock.set(at(6, 5, 59));
    assert!(scheduler.tick().unwrap().gated);

    clock.set(at(6, 6, 0));
    let report = scheduler.tick().unwrap();
    assert!(!report.gated);
    assert!(report.logged().is_some());
    assert!(report
        .events
        .contains(&CadenceEvent::Rendered { samples: 1 }));
}

#[test]
fn render_receives_full_series() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FixedClock::new(at(6, 12, 0));
    let mut source = ScriptedSource::healthy(payload(20.0, 40.0));
    let mut sink = RecordingSink::default();
    let mut scheduler = scheduler(
        dir.path(),
        &clock,
        &mut source,
        &mut sink,
        ScheduleConfig::default(),
    );

    // 12:02 log, 12:04 log + render, 12:06 log, 12:08 log + render
    for _ in 0..4 {
        clock.advance(Duration::from_secs(120));
        scheduler.tick().unwrap();
    }
    drop(scheduler);

    assert_eq!(sink.renders, vec![2, 4]);
}

#[test]
fn render_failure_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FixedClock::new(at(6, 12, 0));
    let mut source = ScriptedSource::healthy(payload(20.0, 40.0));
    let mut sink = RecordingSink {
        fail: true,
        ..RecordingSink::default()
    };
    let mut scheduler = scheduler(
        dir.path(),
        &clock,
        &mut source,
        &mut sink,
        ScheduleConfig::default(),
    );

    clock.advance(Duration::from_secs(240));
    let report = scheduler.tick().unwrap();
    assert!(report.logged().is_some());
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e, CadenceEvent::RenderFailed(_))));

    // The loop keeps logging afterwards
    clock.advance(Duration::from_secs(120));
    assert!(scheduler.tick().unwrap().logged().is_some());
}

#[test]
fn unwritable_store_skips_cycles_and_keeps_running() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("sensor_data.csv");
    fs::create_dir(&data).unwrap();
    fs::write(
        dir.path().join("truncate_checkpoint.txt"),
        "2024-07-05T11:00:00\n",
    )
    .unwrap();

    let clock = FixedClock::new(at(6, 12, 0));
    let mut source = ScriptedSource::healthy(payload(20.0, 40.0));
    let mut sink = RecordingSink::default();
    let mut scheduler = scheduler(
        dir.path(),
        &clock,
        &mut source,
        &mut sink,
        ScheduleConfig::default(),
    );

    let report = scheduler.tick().unwrap();
    assert!(
        matches!(report.events.as_slice(), [CadenceEvent::TruncateFailed(_)]),
        "{report:?}"
    );
    assert_eq!(scheduler.retention().checkpoint().last_run(), at(6, 12, 0));

    clock.advance(Duration::from_secs(120));
    let report = scheduler.tick().unwrap();
    assert!(
        matches!(
            report.events.as_slice(),
            [CadenceEvent::Skipped(SkipReason::WriteFailed(_))]
        ),
        "{report:?}"
    );

    // Next cadence still fires; the render cannot read the series either
    clock.advance(Duration::from_secs(120));
    let report = scheduler.tick().unwrap();
    assert!(
        matches!(
            report.events.as_slice(),
            [
                CadenceEvent::Skipped(SkipReason::WriteFailed(_)),
                CadenceEvent::RenderFailed(_)
            ]
        ),
        "{report:?}"
    );

    fs::remove_dir(&data).unwrap();
    clock.advance(Duration::from_secs(120));
    assert_eq!(
        scheduler.tick().unwrap().logged(),
        Some(&Sample::new(at(6, 12, 6), 20.0))
    );

    drop(scheduler);
    assert_eq!(source.calls, 3);
    assert!(sink.renders.is_empty());
}

fn not_a_number(_humidity: f64, _concentration: f64) -> f64 {
    f64::NAN
}

#[test]
fn non_finite_index_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FixedClock::new(at(6, 12, 0));
    let mut source = ScriptedSource::healthy(payload(20.0, 40.0));
    let mut sink = RecordingSink::default();
    let mut scheduler = Scheduler::new(
        ScheduleConfig::default(),
        &clock,
        &mut source,
        &mut sink,
        ReadingNormalizer::new(NormalizerConfig::default(), not_a_number as Passthrough),
        SeriesStore::new(dir.path().join("sensor_data.csv")),
        retention(dir.path(), clock.now()),
    );

    clock.advance(Duration::from_secs(120));
    let report = scheduler.tick().unwrap();
    match report.events.as_slice() {
        [CadenceEvent::Skipped(SkipReason::WriteFailed(message))] => {
            assert!(message.contains("non-finite"), "{message}")
        }
        other => panic!("expected a skipped cycle, got {other:?}"),
    }
    assert!(report.logged().is_none());
    assert!(!scheduler.store().exists());
}

#[test]
fn unreachable_sensor_stops_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FixedClock::new(at(6, 12, 0));
    let mut source = ScriptedSource::failing(FakeError::Offline);
    let mut sink = RecordingSink::default();
    let mut scheduler = scheduler(
        dir.path(),
        &clock,
        &mut source,
        &mut sink,
        ScheduleConfig::default(),
    );

    clock.advance(Duration::from_secs(120));
    let err = scheduler.tick().unwrap_err();
    assert!(matches!(err, SchedulerError::RetriesExhausted { attempts: 4, .. }));
    assert!(!scheduler.store().exists());
    drop(scheduler);

    assert_eq!(source.calls, 4);
    assert_eq!(clock.total_slept(), Duration::from_secs(90 + 180 + 270));
}

#[test]
fn recovery_within_budget_logs_normally() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FixedClock::new(at(6, 12, 0));
    let mut source = ScriptedSource::healthy(payload(9.0, 40.0))
        .then(Err(FakeError::Offline))
        .then(Err(FakeError::Offline));
    let mut sink = RecordingSink::default();
    let mut scheduler = scheduler(
        dir.path(),
        &clock,
        &mut source,
        &mut sink,
        ScheduleConfig::default(),
    );

    clock.advance(Duration::from_secs(120));
    let report = scheduler.tick().unwrap();

    // Two waits (90 s + 180 s) before the successful third attempt
    let logged = report.logged().copied().unwrap();
    assert_eq!(logged.timestamp, at(6, 12, 6) + chrono::Duration::seconds(30));
    assert_eq!(logged.value, 9.0);
    drop(scheduler);
    assert_eq!(source.calls, 3);
}

#[test]
fn malformed_payload_skips_cycle_and_resets_cadence() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FixedClock::new(at(6, 12, 0));
    let garbage = MalformedPayload::NotJson("<html>".to_string());
    let mut source = ScriptedSource::healthy(payload(9.0, 40.0))
        .then(Err(FakeError::Garbage(garbage.clone())));
    let mut sink = RecordingSink::default();
    let mut scheduler = scheduler(
        dir.path(),
        &clock,
        &mut source,
        &mut sink,
        ScheduleConfig::default(),
    );

    clock.advance(Duration::from_secs(120));
    let report = scheduler.tick().unwrap();
    assert_eq!(
        report.events,
        vec![CadenceEvent::Skipped(SkipReason::Malformed(garbage))]
    );
    assert!(!scheduler.store().exists());

    // Not polled again on the next tick
    clock.advance(Duration::from_secs(1));
    assert!(scheduler.tick().unwrap().is_idle());

    clock.advance(Duration::from_secs(119));
    assert!(scheduler.tick().unwrap().logged().is_some());
    drop(scheduler);
    assert_eq!(source.calls, 2);
}

#[test]
fn payload_missing_fields_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FixedClock::new(at(6, 12, 0));
    let mut source = ScriptedSource::healthy(serde_json::json!({ "current_humidity": 40 }));
    let mut sink = RecordingSink::default();
    let mut scheduler = scheduler(
        dir.path(),
        &clock,
        &mut source,
        &mut sink,
        ScheduleConfig::default(),
    );

    clock.advance(Duration::from_secs(120));
    let report = scheduler.tick().unwrap();
    assert_eq!(
        report.events,
        vec![CadenceEvent::Skipped(SkipReason::Malformed(
            MalformedPayload::MissingField("pm2_5_atm".to_string())
        ))]
    );
}

#[test]
fn non_transient_source_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FixedClock::new(at(6, 12, 0));
    let mut source = ScriptedSource::failing(FakeError::Broken);
    let mut sink = RecordingSink::default();
    let mut scheduler = scheduler(
        dir.path(),
        &clock,
        &mut source,
        &mut sink,
        ScheduleConfig::default(),
    );

    clock.advance(Duration::from_secs(120));
    assert!(matches!(
        scheduler.tick().unwrap_err(),
        SchedulerError::Source(_)
    ));
}

#[test]
fn truncation_runs_when_checkpoint_is_stale() {
    let dir = tempfile::tempdir().unwrap();
    let store = SeriesStore::new(dir.path().join("sensor_data.csv"));
    store.append(&Sample::new(at(1, 12, 0), 1.0)).unwrap();
    store.append(&Sample::new(at(20, 12, 0), 2.0)).unwrap();
    fs::write(
        dir.path().join("truncate_checkpoint.txt"),
        "2024-07-19T11:00:00\n",
    )
    .unwrap();

    let clock = FixedClock::new(at(20, 12, 0));
    let mut source = ScriptedSource::healthy(payload(9.0, 40.0));
    let mut sink = RecordingSink::default();
    let mut scheduler = scheduler(
        dir.path(),
        &clock,
        &mut source,
        &mut sink,
        ScheduleConfig::default(),
    );
    assert_eq!(
        scheduler.retention().checkpoint().last_run(),
        at(19, 11, 0)
    );

    let report = scheduler.tick().unwrap();
    assert_eq!(
        report.events,
        vec![CadenceEvent::Truncated(TruncationOutcome::Truncated {
            removed: 1,
            kept: 1
        })]
    );
    assert_eq!(scheduler.retention().checkpoint().last_run(), at(20, 12, 0));

    // Not due again on the next tick
    clock.advance(Duration::from_secs(1));
    assert!(scheduler.tick().unwrap().is_idle());
}

#[test]
fn restart_does_not_retruncate() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FixedClock::new(at(6, 0, 0));
    let mut source = ScriptedSource::healthy(payload(9.0, 40.0));
    let mut sink = RecordingSink::default();

    {
        let mut first = scheduler(
            dir.path(),
            &clock,
            &mut source,
            &mut sink,
            ScheduleConfig::default(),
        );
        clock.set(at(7, 0, 0));
        let report = first.tick().unwrap();
        assert!(report
            .events
            .iter()
            .any(|e| matches!(e, CadenceEvent::Truncated(_))));
    }

    // Process restarts an hour later
    clock.set(at(7, 1, 0));
    let mut second = scheduler(
        dir.path(),
        &clock,
        &mut source,
        &mut sink,
        ScheduleConfig::default(),
    );
    assert_eq!(second.retention().checkpoint().last_run(), at(7, 0, 0));
    assert!(second
        .tick()
        .unwrap()
        .events
        .iter()
        .all(|e| !matches!(e, CadenceEvent::Truncated(_))));

    // Due again a full interval after the persisted run
    clock.set(at(8, 0, 0));
    assert!(second
        .tick()
        .unwrap()
        .events
        .iter()
        .any(|e| matches!(e, CadenceEvent::Truncated(_))));
}

#[test]
fn run_while_sleeps_between_ticks() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FixedClock::new(at(6, 12, 0));
    let mut source = ScriptedSource::healthy(payload(9.0, 40.0));
    let mut sink = RecordingSink::default();
    let mut scheduler = scheduler(
        dir.path(),
        &clock,
        &mut source,
        &mut sink,
        ScheduleConfig::default(),
    );

    let mut ticks = 0;
    scheduler
        .run_while(|_| {
            ticks += 1;
            ticks < 241
        })
        .unwrap();

    assert_eq!(clock.total_slept(), Duration::from_secs(240));
    // Logged at +120 s and +240 s, rendered at +240 s
    assert_eq!(scheduler.store().read_all().unwrap().len(), 2);
    drop(scheduler);
    assert_eq!(sink.renders, vec![2]);
}

#[test]
fn run_surfaces_fatal_error() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FixedClock::new(at(6, 12, 0));
    let mut source = ScriptedSource::failing(FakeError::Offline);
    let mut sink = RecordingSink::default();
    let mut scheduler = scheduler(
        dir.path(),
        &clock,
        &mut source,
        &mut sink,
        ScheduleConfig::default(),
    );

    let err = scheduler.run().unwrap_err();
    assert!(matches!(err, SchedulerError::RetriesExhausted { .. }));
    assert_eq!(
        err.to_string(),
        "sensor unreachable: max of 4 attempts reached"
    );
}

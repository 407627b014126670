// vbconv-core/tests/scheduler_tests.rs

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::{progress_lines, touch, FakeProber, FakeSpawner, RecordingEventHandler, Script};
use tempfile::tempdir;
use vbconv_core::error::CoreError;
use vbconv_core::{
    BatchSummary, Event, JobOutcome, JobSettings, JobSettingsBuilder, ProcessExit, Scheduler,
    VideoCodec,
};

fn settings(parallel: usize) -> JobSettings {
    JobSettingsBuilder::new()
        .hardware(false)
        .parallel_jobs(parallel)
        .max_parallel_jobs(16)
        .build()
        .unwrap()
}

fn scheduler(spawner: &FakeSpawner, events: &Arc<RecordingEventHandler>) -> Scheduler<FakeSpawner> {
    Scheduler::new(
        spawner.clone(),
        Arc::new(FakeProber::with_duration(2.0)),
        events.clone(),
    )
}

fn inputs(dir: &std::path::Path, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| touch(dir, &format!("clip{i}.mp4")))
        .collect()
}

fn batch_summaries(events: &RecordingEventHandler) -> Vec<BatchSummary> {
    events
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::BatchFinished { summary } => Some(summary),
            _ => None,
        })
        .collect()
}

fn outcomes(events: &RecordingEventHandler) -> Vec<JobOutcome> {
    events
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::JobFinished { outcome, .. } => Some(outcome),
            _ => None,
        })
        .collect()
}

#[test]
fn test_concurrency_is_bounded_and_batch_finishes_once() -> Result<(), Box<dyn std::error::Error>>
{
    let dir = tempdir()?;
    let spawner = FakeSpawner::new(Script {
        lines: progress_lines(2.0, 4),
        line_delay: Duration::from_millis(2),
        ..Script::default()
    });
    let events = Arc::new(RecordingEventHandler::new());
    let scheduler = scheduler(&spawner, &events);

    scheduler.submit(inputs(dir.path(), 6), settings(2))?;
    scheduler.wait_idle();

    assert_eq!(spawner.spawned(), 6);
    assert!(spawner.max_running() <= 2, "max running {}", spawner.max_running());
    assert!(spawner.max_running() >= 1);

    let summaries = batch_summaries(&events);
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].total, 6);
    assert_eq!(summaries[0].succeeded, 6);
    assert!(!summaries[0].stopped);

    let progress = scheduler.progress();
    assert_eq!(progress.completed, 6);
    assert_eq!(progress.active, 0);
    assert!(progress.finished);
    assert!(scheduler.is_idle());
    Ok(())
}

#[test]
fn test_failed_jobs_do_not_stop_siblings() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let spawner = FakeSpawner::new(Script {
        exit: ProcessExit::Exited(1),
        ..Script::default()
    });
    let events = Arc::new(RecordingEventHandler::new());
    let scheduler = scheduler(&spawner, &events);

    scheduler.submit(inputs(dir.path(), 4), settings(2))?;
    scheduler.wait_idle();

    assert_eq!(spawner.spawned(), 4);
    let summaries = batch_summaries(&events);
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].failed, 4);
    assert!(summaries[0].has_failures());
    Ok(())
}

#[test]
fn test_command_error_fails_each_job_and_batch_completes() -> Result<(), Box<dyn std::error::Error>>
{
    let dir = tempdir()?;
    let files = inputs(dir.path(), 3);
    touch(dir.path(), "clip2_h265.mp4");
    let mut settings = settings(2);
    settings.codec = VideoCodec::Vp9;
    settings.hardware = true;
    let spawner = FakeSpawner::new(Script::default());
    let events = Arc::new(RecordingEventHandler::new());
    let scheduler = scheduler(&spawner, &events);

    scheduler.submit(files, settings)?;
    scheduler.wait_idle();

    assert_eq!(spawner.spawned(), 0);
    let mut reported = outcomes(&events);
    reported.sort_by_key(|o| o.to_string());
    assert_eq!(
        reported,
        vec![JobOutcome::Failed, JobOutcome::Failed, JobOutcome::Skipped]
    );

    let summaries = batch_summaries(&events);
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].failed, 2);
    assert_eq!(summaries[0].skipped, 1);
    assert!(!summaries[0].stopped);
    Ok(())
}

#[test]
fn test_existing_outputs_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let files = inputs(dir.path(), 3);
    touch(dir.path(), "clip1_h265.mp4");
    let spawner = FakeSpawner::new(Script::default());
    let events = Arc::new(RecordingEventHandler::new());
    let scheduler = scheduler(&spawner, &events);

    scheduler.submit(files, settings(1))?;
    scheduler.wait_idle();

    assert_eq!(spawner.spawned(), 2);
    let summary = &batch_summaries(&events)[0];
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.succeeded, 2);
    Ok(())
}

#[test]
fn test_stop_cancels_running_and_abandons_queued() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let files = inputs(dir.path(), 5);
    let spawner = FakeSpawner::new(Script {
        lines: progress_lines(2.0, 2),
        hold_until_stopped: true,
        ..Script::default()
    });
    let events = Arc::new(RecordingEventHandler::new());
    let scheduler = scheduler(&spawner, &events);

    scheduler.submit(files.clone(), settings(2))?;
    spawner.wait_for_running(2);
    scheduler.stop();
    scheduler.wait_idle();

    assert_eq!(spawner.spawned(), 2, "queued jobs must never launch");
    assert_eq!(spawner.quits(), 2);
    assert!(batch_summaries(&events).is_empty());
    assert_eq!(
        outcomes(&events),
        vec![JobOutcome::Cancelled, JobOutcome::Cancelled]
    );

    let progress = scheduler.progress();
    assert!(progress.stop_requested);
    assert!(!progress.finished);
    assert_eq!(progress.completed, 0);

    let summary = scheduler.summary().expect("summary after submit");
    assert!(summary.stopped);
    assert_eq!(summary.cancelled, 5);

    for input in &files {
        let stem = input.file_stem().unwrap().to_string_lossy().into_owned();
        assert!(!dir.path().join(format!("{stem}_h265.mp4")).exists());
    }

    scheduler.stop();
    assert_eq!(spawner.quits(), 2);
    assert!(batch_summaries(&events).is_empty());
    Ok(())
}

#[test]
fn test_stop_after_natural_finish_is_noop() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let spawner = FakeSpawner::new(Script::default());
    let events = Arc::new(RecordingEventHandler::new());
    let scheduler = scheduler(&spawner, &events);

    scheduler.submit(inputs(dir.path(), 2), settings(2))?;
    scheduler.wait_idle();
    scheduler.stop();

    let progress = scheduler.progress();
    assert!(progress.finished);
    assert!(!progress.stop_requested);
    assert_eq!(batch_summaries(&events).len(), 1);
    Ok(())
}

#[test]
fn test_submit_rejected_while_workers_alive() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let spawner = FakeSpawner::new(Script {
        hold_until_stopped: true,
        ..Script::default()
    });
    let events = Arc::new(RecordingEventHandler::new());
    let scheduler = scheduler(&spawner, &events);

    let first = scheduler.submit(inputs(dir.path(), 1), settings(1))?;
    spawner.wait_for_running(1);
    let second = scheduler.submit(inputs(dir.path(), 1), settings(1));
    assert!(matches!(second, Err(CoreError::BatchInProgress)));

    scheduler.stop();
    scheduler.wait_idle();

    let third = scheduler.submit(Vec::new(), settings(1))?;
    assert_ne!(first, third);
    Ok(())
}

#[test]
fn test_empty_batch_finishes_immediately() -> Result<(), Box<dyn std::error::Error>> {
    let spawner = FakeSpawner::new(Script::default());
    let events = Arc::new(RecordingEventHandler::new());
    let scheduler = scheduler(&spawner, &events);

    scheduler.submit(Vec::new(), settings(2))?;
    assert!(scheduler.is_idle());
    scheduler.wait_idle();

    let summaries = batch_summaries(&events);
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].total, 0);
    assert!(scheduler.progress().finished);
    Ok(())
}

#[test]
fn test_stop_before_any_batch_is_noop() {
    let spawner = FakeSpawner::new(Script::default());
    let events = Arc::new(RecordingEventHandler::new());
    let scheduler = scheduler(&spawner, &events);

    scheduler.stop();
    assert!(scheduler.summary().is_none());
    assert!(scheduler.progress().batch.is_none());
    assert!(!scheduler.progress().stop_requested);
}

// vbconv-core/tests/job_tests.rs

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{progress_lines, touch, FakeProber, FakeSpawner, RecordingEventHandler, Script};
use tempfile::tempdir;
use vbconv_core::job::{Job, JobContext, JobId, JobOutcome, JobState};
use vbconv_core::{Event, JobSettings, JobSettingsBuilder, ProcessExit, VideoCodec};

fn settings() -> JobSettings {
    JobSettingsBuilder::new()
        .hardware(false)
        .parallel_jobs(1)
        .build()
        .unwrap()
}

fn make_job(input: PathBuf, settings: &JobSettings) -> Job<common::FakeProcess> {
    let output = settings.output_path_for(&input).unwrap();
    Job::new(JobId(0), input, output)
}

fn percents(events: &[Event]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect()
}

fn logs(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Log { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_existing_output_is_skipped_without_launch() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let settings = settings();
    let input = touch(dir.path(), "movie.mp4");
    let job = make_job(input, &settings);
    touch(dir.path(), "movie_h265.mp4");

    let spawner = FakeSpawner::new(Script::default());
    let prober = FakeProber::with_duration(10.0);
    let events = RecordingEventHandler::new();
    let ctx = JobContext {
        settings: &settings,
        spawner: &spawner,
        prober: &prober,
        events: &events,
    };

    assert_eq!(job.run(&ctx), JobOutcome::Skipped);
    assert_eq!(spawner.spawned(), 0);
    assert!(JobOutcome::Skipped.is_success());

    let recorded = events.events();
    assert!(matches!(
        recorded.last(),
        Some(Event::JobFinished {
            outcome: JobOutcome::Skipped,
            success: true,
            ..
        })
    ));
    Ok(())
}

#[test]
fn test_success_reports_monotonic_progress_and_logs() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let settings = settings();
    let job = make_job(touch(dir.path(), "a.mp4"), &settings);

    let mut lines = progress_lines(4.0, 8);
    lines.insert(3, "out_time_ms=N/A".to_string());
    lines.push("out_time_ms=99999999999".to_string());
    let spawner = FakeSpawner::new(Script {
        lines,
        ..Script::default()
    });
    let prober = FakeProber::with_duration(4.0);
    let events = RecordingEventHandler::new();
    let ctx = JobContext {
        settings: &settings,
        spawner: &spawner,
        prober: &prober,
        events: &events,
    };

    assert_eq!(job.run(&ctx), JobOutcome::Succeeded);
    assert_eq!(job.state(), JobState::Finished(JobOutcome::Succeeded));

    let recorded = events.events();
    let reported = percents(&recorded);
    assert_eq!(reported.first(), Some(&0));
    assert_eq!(reported.last(), Some(&100));
    assert!(reported.windows(2).all(|w| w[0] < w[1]), "{reported:?}");
    assert!(logs(&recorded).iter().any(|m| m == "frame=10"));
    assert!(!logs(&recorded).iter().any(|m| m.starts_with("out_time_ms")));
    assert!(matches!(recorded.first(), Some(Event::JobStarted { .. })));
    assert_eq!(job.last_percent(), Some(100));
    Ok(())
}

#[test]
fn test_nonzero_exit_fails_with_code() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let settings = settings();
    let job = make_job(touch(dir.path(), "a.mp4"), &settings);
    let spawner = FakeSpawner::new(Script {
        exit: ProcessExit::Exited(1),
        ..Script::default()
    });
    let prober = FakeProber::with_duration(4.0);
    let events = RecordingEventHandler::new();
    let ctx = JobContext {
        settings: &settings,
        spawner: &spawner,
        prober: &prober,
        events: &events,
    };

    assert_eq!(job.run(&ctx), JobOutcome::Failed);
    let recorded = events.events();
    assert!(logs(&recorded).iter().any(|m| m.contains("code 1")));
    assert!(matches!(
        recorded.last(),
        Some(Event::JobFinished {
            outcome: JobOutcome::Failed,
            success: false,
            ..
        })
    ));
    Ok(())
}

#[test]
fn test_signal_without_stop_is_failure() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let settings = settings();
    let job = make_job(touch(dir.path(), "a.mp4"), &settings);
    let spawner = FakeSpawner::new(Script {
        exit: ProcessExit::Signaled(Some(9)),
        ..Script::default()
    });
    let prober = FakeProber::with_duration(4.0);
    let events = RecordingEventHandler::new();
    let ctx = JobContext {
        settings: &settings,
        spawner: &spawner,
        prober: &prober,
        events: &events,
    };

    assert_eq!(job.run(&ctx), JobOutcome::Failed);
    assert!(logs(&events.events()).iter().any(|m| m.contains("signal 9")));
    Ok(())
}

#[test]
fn test_launch_error_is_failure() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let settings = settings();
    let job = make_job(touch(dir.path(), "a.mp4"), &settings);
    let spawner = FakeSpawner::failing();
    let prober = FakeProber::with_duration(4.0);
    let events = RecordingEventHandler::new();
    let ctx = JobContext {
        settings: &settings,
        spawner: &spawner,
        prober: &prober,
        events: &events,
    };

    assert_eq!(job.run(&ctx), JobOutcome::Failed);
    assert!(logs(&events.events())
        .iter()
        .any(|m| m.contains("Failed to start command")));
    Ok(())
}

#[test]
fn test_unsupported_encoder_fails_without_launch() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let mut settings = settings();
    settings.codec = VideoCodec::Vp9;
    settings.hardware = true;
    let job = make_job(touch(dir.path(), "a.mp4"), &settings);
    let spawner = FakeSpawner::new(Script::default());
    let prober = FakeProber::with_duration(4.0);
    let events = RecordingEventHandler::new();
    let ctx = JobContext {
        settings: &settings,
        spawner: &spawner,
        prober: &prober,
        events: &events,
    };

    assert_eq!(job.run(&ctx), JobOutcome::Failed);
    assert_eq!(spawner.spawned(), 0);
    assert_eq!(job.state(), JobState::Finished(JobOutcome::Failed));

    let recorded = events.events();
    assert!(logs(&recorded)
        .iter()
        .any(|m| m.contains("No encoder for VP9")));
    assert!(!recorded
        .iter()
        .any(|e| matches!(e, Event::JobStarted { .. })));
    assert!(matches!(
        recorded.last(),
        Some(Event::JobFinished {
            outcome: JobOutcome::Failed,
            success: false,
            ..
        })
    ));
    Ok(())
}

#[test]
fn test_blank_encoder_lines_are_forwarded() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let settings = settings();
    let job = make_job(touch(dir.path(), "a.mp4"), &settings);
    let spawner = FakeSpawner::new(Script {
        lines: vec![
            "Input #0, mov,mp4".to_string(),
            String::new(),
            "   ".to_string(),
            "out_time_ms=2000000".to_string(),
        ],
        ..Script::default()
    });
    let prober = FakeProber::with_duration(4.0);
    let events = RecordingEventHandler::new();
    let ctx = JobContext {
        settings: &settings,
        spawner: &spawner,
        prober: &prober,
        events: &events,
    };

    assert_eq!(job.run(&ctx), JobOutcome::Succeeded);
    let recorded = events.events();
    assert_eq!(
        logs(&recorded),
        vec!["Input #0, mov,mp4".to_string(), String::new(), "   ".to_string()]
    );
    assert_eq!(percents(&recorded), vec![50]);
    Ok(())
}

#[test]
fn test_unknown_duration_disables_progress() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let settings = settings();
    let job = make_job(touch(dir.path(), "a.mp4"), &settings);
    let spawner = FakeSpawner::new(Script {
        lines: progress_lines(4.0, 4),
        ..Script::default()
    });
    let prober = FakeProber::with_duration(0.0);
    let events = RecordingEventHandler::new();
    let ctx = JobContext {
        settings: &settings,
        spawner: &spawner,
        prober: &prober,
        events: &events,
    };

    assert_eq!(job.run(&ctx), JobOutcome::Succeeded);
    let recorded = events.events();
    assert!(percents(&recorded).is_empty());
    assert!(logs(&recorded)
        .iter()
        .any(|m| m.contains("Could not determine duration")));
    Ok(())
}

#[test]
fn test_stop_before_launch_cancels_without_spawning() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let settings = settings();
    let job = make_job(touch(dir.path(), "a.mp4"), &settings);
    let spawner = FakeSpawner::new(Script::default());
    let prober = FakeProber::with_duration(4.0);
    let events = RecordingEventHandler::new();
    let ctx = JobContext {
        settings: &settings,
        spawner: &spawner,
        prober: &prober,
        events: &events,
    };

    job.stop();
    job.stop();
    assert_eq!(job.run(&ctx), JobOutcome::Cancelled);
    assert_eq!(spawner.spawned(), 0);
    assert!(!JobOutcome::Cancelled.is_success());
    Ok(())
}

#[test]
fn test_stop_while_running_cancels_and_removes_partial_output(
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let settings = settings();
    let job = Arc::new(make_job(touch(dir.path(), "a.mp4"), &settings));
    let output = job.output().to_path_buf();
    let spawner = FakeSpawner::new(Script {
        lines: progress_lines(4.0, 2),
        hold_until_stopped: true,
        ..Script::default()
    });

    let runner = {
        let job = Arc::clone(&job);
        let spawner = spawner.clone();
        let settings = settings.clone();
        thread::spawn(move || {
            let prober = FakeProber::with_duration(4.0);
            let events = RecordingEventHandler::new();
            let ctx = JobContext {
                settings: &settings,
                spawner: &spawner,
                prober: &prober,
                events: &events,
            };
            job.run(&ctx)
        })
    };

    spawner.wait_for_running(1);
    assert!(output.exists(), "fake encoder writes its output up front");
    job.stop();
    let outcome = runner.join().expect("runner thread");

    assert_eq!(outcome, JobOutcome::Cancelled);
    assert_eq!(spawner.quits(), 1);
    assert!(!output.exists());

    job.stop();
    assert_eq!(spawner.quits(), 1);
    Ok(())
}

#[test]
fn test_undeliverable_quit_falls_back_to_kill() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let settings = settings();
    let job = Arc::new(make_job(touch(dir.path(), "a.mp4"), &settings));
    let spawner = FakeSpawner::new(Script {
        hold_until_stopped: true,
        refuse_quit: true,
        ..Script::default()
    });

    let runner = {
        let job = Arc::clone(&job);
        let spawner = spawner.clone();
        let settings = settings.clone();
        thread::spawn(move || {
            let prober = FakeProber::with_duration(4.0);
            let events = RecordingEventHandler::new();
            let ctx = JobContext {
                settings: &settings,
                spawner: &spawner,
                prober: &prober,
                events: &events,
            };
            job.run(&ctx)
        })
    };

    spawner.wait_for_running(1);
    thread::sleep(Duration::from_millis(10));
    job.stop();
    assert_eq!(runner.join().expect("runner thread"), JobOutcome::Cancelled);
    assert_eq!(spawner.kills(), 1);
    assert_eq!(spawner.quits(), 0);
    Ok(())
}

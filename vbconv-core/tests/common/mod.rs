// vbconv-core/tests/common/mod.rs
//
// Scripted stand-ins for ffmpeg and ffprobe shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use vbconv_core::error::{CoreError, CoreResult};
use vbconv_core::{
    EncoderProcess, EncoderSpawner, Event, EventHandler, MediaInfo, MediaProber, ProcessExit,
};

/// What every fake encoder run does.
#[derive(Clone)]
pub struct Script {
    pub lines: Vec<String>,
    pub line_delay: Duration,
    pub exit: ProcessExit,
    /// Keep running after the lines until asked to stop.
    pub hold_until_stopped: bool,
    /// Write the output file (last argument) before exiting.
    pub create_output: bool,
    /// Make `request_stop` report that the quit could not be delivered.
    pub refuse_quit: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            line_delay: Duration::ZERO,
            exit: ProcessExit::Exited(0),
            hold_until_stopped: false,
            create_output: true,
            refuse_quit: false,
        }
    }
}

#[derive(Default)]
struct Counters {
    running: AtomicUsize,
    max_running: AtomicUsize,
    spawned: AtomicUsize,
    quits: AtomicUsize,
    kills: AtomicUsize,
}

#[derive(Clone)]
pub struct FakeSpawner {
    script: Script,
    fail_spawn: bool,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    counters: Arc<Counters>,
}

impl FakeSpawner {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            fail_spawn: false,
            calls: Arc::new(Mutex::new(Vec::new())),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn failing() -> Self {
        let mut spawner = Self::new(Script::default());
        spawner.fail_spawn = true;
        spawner
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn spawned(&self) -> usize {
        self.counters.spawned.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.counters.running.load(Ordering::SeqCst)
    }

    pub fn max_running(&self) -> usize {
        self.counters.max_running.load(Ordering::SeqCst)
    }

    pub fn quits(&self) -> usize {
        self.counters.quits.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.counters.kills.load(Ordering::SeqCst)
    }

    /// Blocks until `n` processes are running at once, or panics after 5s.
    pub fn wait_for_running(&self, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.running() < n {
            assert!(Instant::now() < deadline, "timed out waiting for {n} running");
            thread::sleep(Duration::from_millis(5));
        }
    }
}

pub struct FakeProcess {
    output: Option<Receiver<String>>,
    stopped: Arc<AtomicBool>,
    done: Option<thread::JoinHandle<()>>,
    exit: ProcessExit,
    refuse_quit: bool,
    counters: Arc<Counters>,
}

impl EncoderProcess for FakeProcess {
    fn take_output(&mut self) -> Option<Receiver<String>> {
        self.output.take()
    }

    fn request_stop(&mut self) -> bool {
        if self.refuse_quit {
            return false;
        }
        self.counters.quits.fetch_add(1, Ordering::SeqCst);
        self.stopped.store(true, Ordering::SeqCst);
        true
    }

    fn kill(&mut self) -> CoreResult<()> {
        self.counters.kills.fetch_add(1, Ordering::SeqCst);
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn wait(&mut self) -> CoreResult<ProcessExit> {
        if let Some(handle) = self.done.take() {
            let _ = handle.join();
        }
        if self.stopped.load(Ordering::SeqCst) {
            Ok(ProcessExit::Exited(255))
        } else {
            Ok(self.exit)
        }
    }
}

impl EncoderSpawner for FakeSpawner {
    type Process = FakeProcess;

    fn program(&self) -> String {
        "ffmpeg".to_string()
    }

    fn spawn(&self, args: &[String]) -> CoreResult<FakeProcess> {
        if self.fail_spawn {
            return Err(CoreError::CommandStart(
                "ffmpeg".to_string(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            ));
        }
        self.calls.lock().unwrap().push(args.to_vec());
        self.counters.spawned.fetch_add(1, Ordering::SeqCst);
        let now = self.counters.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_running.fetch_max(now, Ordering::SeqCst);

        if self.script.create_output {
            if let Some(path) = args.last() {
                let _ = fs::write(path, b"encoded");
            }
        }

        let (sender, receiver) = mpsc::channel();
        let stopped = Arc::new(AtomicBool::new(false));
        let script = self.script.clone();
        let counters = Arc::clone(&self.counters);
        let thread_stopped = Arc::clone(&stopped);

        let done = thread::spawn(move || {
            for line in &script.lines {
                if thread_stopped.load(Ordering::SeqCst) {
                    break;
                }
                if !script.line_delay.is_zero() {
                    thread::sleep(script.line_delay);
                }
                if sender.send(line.clone()).is_err() {
                    break;
                }
            }
            while script.hold_until_stopped && !thread_stopped.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(2));
            }
            counters.running.fetch_sub(1, Ordering::SeqCst);
            drop(sender);
        });

        Ok(FakeProcess {
            output: Some(receiver),
            stopped,
            done: Some(done),
            exit: self.script.exit,
            refuse_quit: self.script.refuse_quit,
            counters: Arc::clone(&self.counters),
        })
    }
}

/// Prober answering from fixed tables.
#[derive(Default)]
pub struct FakeProber {
    pub duration: f64,
    pub codecs: HashMap<PathBuf, String>,
}

impl FakeProber {
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration,
            codecs: HashMap::new(),
        }
    }
}

impl MediaProber for FakeProber {
    fn video_codec(&self, path: &Path) -> Option<String> {
        self.codecs.get(path).cloned()
    }

    fn duration_secs(&self, _path: &Path) -> f64 {
        self.duration
    }

    fn media_info(&self, path: &Path) -> CoreResult<MediaInfo> {
        Ok(MediaInfo {
            file_size: fs::metadata(path)?.len(),
            duration_secs: Some(self.duration),
            video_codec: self.video_codec(path),
            ..Default::default()
        })
    }
}

/// Keeps every event it receives, in order.
#[derive(Default)]
pub struct RecordingEventHandler {
    events: Mutex<Vec<Event>>,
}

impl RecordingEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl EventHandler for RecordingEventHandler {
    fn handle(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Creates `name` inside `dir` with placeholder content.
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, b"dummy content").unwrap();
    path
}

/// `out_time_ms` lines covering `duration_secs` in `steps` increments.
pub fn progress_lines(duration_secs: f64, steps: u32) -> Vec<String> {
    let mut lines = Vec::new();
    for i in 0..=steps {
        let us = (duration_secs * 1_000_000.0 * f64::from(i) / f64::from(steps)) as i64;
        lines.push(format!("frame={}", i * 10));
        lines.push(format!("out_time_ms={us}"));
        lines.push("progress=continue".to_string());
    }
    lines
}

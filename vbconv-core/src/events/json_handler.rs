//! JSON-lines event handler for machine consumers.
//!
//! Each event becomes one JSON object on its own line, written to stdout by
//! default, so a GUI or script front end can drive a batch through the CLI.

use super::{Event, EventHandler};
use chrono::Utc;
use serde_json::json;
use std::io::{self, Write};
use std::sync::Mutex;

/// Event handler that writes every event as a line of JSON.
pub struct JsonEventHandler {
    output: Mutex<Box<dyn Write + Send>>,
}

impl JsonEventHandler {
    /// Create a handler that writes to stdout
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    /// Create a handler with a custom writer
    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            output: Mutex::new(writer),
        }
    }

    fn write_json(&self, value: serde_json::Value) {
        if let Ok(mut output) = self.output.lock() {
            if let Ok(json_str) = serde_json::to_string(&value) {
                let _ = writeln!(output, "{json_str}");
                let _ = output.flush();
            }
        }
    }
}

impl Default for JsonEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for JsonEventHandler {
    fn handle(&self, event: &Event) {
        let timestamp = Utc::now().timestamp();

        let value = match event {
            Event::Log { job, message } => json!({
                "type": "log",
                "job": job,
                "message": message,
                "timestamp": timestamp
            }),
            Event::JobStarted { job, output } => json!({
                "type": "job_started",
                "job": job,
                "output": output,
                "timestamp": timestamp
            }),
            Event::Progress { job, percent } => json!({
                "type": "progress",
                "job": job,
                "percent": percent,
                "timestamp": timestamp
            }),
            Event::JobFinished {
                job,
                outcome,
                success,
            } => json!({
                "type": "job_finished",
                "job": job,
                "outcome": outcome,
                "success": success,
                "timestamp": timestamp
            }),
            Event::BatchFinished { summary } => json!({
                "type": "batch_finished",
                "total": summary.total,
                "succeeded": summary.succeeded,
                "skipped": summary.skipped,
                "failed": summary.failed,
                "cancelled": summary.cancelled,
                "elapsed_secs": summary.elapsed_secs,
                "timestamp": timestamp
            }),
        };
        self.write_json(value);
    }
}

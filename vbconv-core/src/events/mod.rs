//! Caller-facing events.
//!
//! Workers report everything that happens in a batch through an
//! [`EventHandler`]. Events for one job are emitted sequentially by the worker
//! running it, so any handler that preserves call order (such as
//! [`ChannelEventHandler`]) also preserves per-job order.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::job::JobOutcome;
use crate::scheduler::BatchSummary;

pub mod json_handler;

pub use json_handler::JsonEventHandler;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A line of encoder output or an engine notice, optionally tied to a job.
    Log {
        job: Option<PathBuf>,
        message: String,
    },

    /// The encoder for `job` was launched.
    JobStarted { job: PathBuf, output: PathBuf },

    /// Integer percentage for a running job; only sent when it changes.
    Progress { job: PathBuf, percent: u8 },

    JobFinished {
        job: PathBuf,
        outcome: JobOutcome,
        success: bool,
    },

    /// Every admitted job completed without a stop request.
    BatchFinished { summary: BatchSummary },
}

pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event);
}

/// Fans each event out to several handlers in registration order.
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for EventDispatcher {
    fn handle(&self, event: &Event) {
        for handler in &self.handlers {
            handler.handle(event);
        }
    }
}

/// Forwards events into an mpsc channel for consumption on another thread.
pub struct ChannelEventHandler {
    sender: Mutex<Sender<Event>>,
}

impl ChannelEventHandler {
    /// Creates the handler together with the receiving end of its channel.
    pub fn new() -> (Self, Receiver<Event>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender: Mutex::new(sender),
            },
            receiver,
        )
    }
}

impl EventHandler for ChannelEventHandler {
    fn handle(&self, event: &Event) {
        if let Ok(sender) = self.sender.lock() {
            // A dropped receiver just means nobody is listening any more.
            let _ = sender.send(event.clone());
        }
    }
}

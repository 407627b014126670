//! Bounded worker pool that executes a batch of jobs.
//!
//! One lock guards the queue, the active set, the counters and the stop flag,
//! so "every job completed" and "stop requested" can never disagree. Workers
//! pop jobs under the lock, run them without it, and report back under it. A
//! report only counts if its job is still in the active set; `stop` empties
//! that set, so any report arriving after a stop is ignored.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use log::{debug, info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;

use crate::config::JobSettings;
use crate::error::{CoreError, CoreResult};
use crate::events::{Event, EventHandler};
use crate::job::{Job, JobContext, JobId, JobOutcome};
use crate::probe::MediaProber;
use crate::process::EncoderSpawner;

/// Identifies one submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BatchId(pub u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch-{}", self.0)
    }
}

/// Final (or, after a stop, partial) tally of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Jobs that were stopped or never started because of a stop request.
    pub cancelled: usize,
    pub elapsed_secs: f64,
    pub stopped: bool,
}

impl BatchSummary {
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Point-in-time view of the current batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub batch: Option<BatchId>,
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    pub stop_requested: bool,
    pub finished: bool,
}

struct BatchState<P> {
    generation: u64,
    queue: VecDeque<Arc<Job<P>>>,
    active: HashMap<JobId, Arc<Job<P>>>,
    total: usize,
    completed: usize,
    succeeded: usize,
    skipped: usize,
    failed: usize,
    cancelled: usize,
    stop_requested: bool,
    finished: bool,
    workers_alive: usize,
    started_at: Option<Instant>,
    next_job_id: u64,
    pool: Option<Arc<ThreadPool>>,
}

impl<P> BatchState<P> {
    fn new() -> Self {
        Self {
            generation: 0,
            queue: VecDeque::new(),
            active: HashMap::new(),
            total: 0,
            completed: 0,
            succeeded: 0,
            skipped: 0,
            failed: 0,
            cancelled: 0,
            stop_requested: false,
            finished: false,
            workers_alive: 0,
            started_at: None,
            next_job_id: 0,
            pool: None,
        }
    }

    /// Counts `outcome` for `id` if the job is still active in batch
    /// `generation`. Returns the summary when this report finishes the batch.
    fn record_outcome(
        &mut self,
        generation: u64,
        id: JobId,
        outcome: JobOutcome,
    ) -> Option<BatchSummary> {
        if generation != self.generation || self.active.remove(&id).is_none() {
            debug!("Ignoring late report for job {id}");
            return None;
        }
        self.completed += 1;
        match outcome {
            JobOutcome::Succeeded => self.succeeded += 1,
            JobOutcome::Skipped => self.skipped += 1,
            JobOutcome::Failed => self.failed += 1,
            JobOutcome::Cancelled => self.cancelled += 1,
        }
        if !self.stop_requested && !self.finished && self.completed == self.total {
            self.finished = true;
            return Some(self.summary());
        }
        None
    }

    fn summary(&self) -> BatchSummary {
        let cancelled = if self.stop_requested {
            self.total
                .saturating_sub(self.succeeded + self.skipped + self.failed)
        } else {
            self.cancelled
        };
        BatchSummary {
            total: self.total,
            succeeded: self.succeeded,
            skipped: self.skipped,
            failed: self.failed,
            cancelled,
            elapsed_secs: self
                .started_at
                .map_or(0.0, |start| start.elapsed().as_secs_f64()),
            stopped: self.stop_requested,
        }
    }
}

struct Shared<P> {
    state: Mutex<BatchState<P>>,
    idle: Condvar,
}

impl<P> Shared<P> {
    fn lock(&self) -> MutexGuard<'_, BatchState<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs batches of jobs on a bounded pool of worker threads.
pub struct Scheduler<S: EncoderSpawner> {
    spawner: Arc<S>,
    prober: Arc<dyn MediaProber>,
    events: Arc<dyn EventHandler>,
    shared: Arc<Shared<S::Process>>,
}

impl<S: EncoderSpawner + 'static> Scheduler<S> {
    pub fn new(spawner: S, prober: Arc<dyn MediaProber>, events: Arc<dyn EventHandler>) -> Self {
        Self {
            spawner: Arc::new(spawner),
            prober,
            events,
            shared: Arc::new(Shared {
                state: Mutex::new(BatchState::new()),
                idle: Condvar::new(),
            }),
        }
    }

    /// Admits `inputs` as a new batch and starts `min(parallel_jobs, inputs)`
    /// workers.
    ///
    /// # Errors
    ///
    /// * `CoreError::BatchInProgress` - workers of an earlier batch are still running
    /// * `CoreError::PathError` - an input has no file name to derive an output from
    /// * `CoreError::ThreadPool` - the worker pool could not be created
    pub fn submit(&self, inputs: Vec<PathBuf>, settings: JobSettings) -> CoreResult<BatchId> {
        let mut state = self.shared.lock();
        if state.workers_alive > 0 {
            return Err(CoreError::BatchInProgress);
        }

        let mut jobs = VecDeque::with_capacity(inputs.len());
        let mut next_id = state.next_job_id;
        for input in inputs {
            let output = settings.output_path_for(&input)?;
            jobs.push_back(Arc::new(Job::new(JobId(next_id), input, output)));
            next_id += 1;
        }

        let limit = settings.parallel_jobs.max(1);
        let worker_count = limit.min(jobs.len());
        let pool = if worker_count > 0 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(limit)
                .thread_name(|i| format!("vbconv-worker-{i}"))
                .build()
                .map_err(|e| CoreError::ThreadPool(e.to_string()))?;
            Some(Arc::new(pool))
        } else {
            None
        };

        state.next_job_id = next_id;
        state.generation += 1;
        state.total = jobs.len();
        state.queue = jobs;
        state.active.clear();
        state.completed = 0;
        state.succeeded = 0;
        state.skipped = 0;
        state.failed = 0;
        state.cancelled = 0;
        state.stop_requested = false;
        state.finished = false;
        state.started_at = Some(Instant::now());
        state.workers_alive = worker_count;
        state.pool = pool.clone();

        let generation = state.generation;
        let batch = BatchId(generation);
        info!(
            "Starting {batch}: {} job(s), {} parallel",
            state.total, worker_count
        );

        let Some(pool) = pool else {
            state.finished = true;
            let summary = state.summary();
            drop(state);
            self.events.handle(&Event::BatchFinished { summary });
            return Ok(batch);
        };
        drop(state);

        let settings = Arc::new(settings);
        for _ in 0..worker_count {
            let worker = Worker {
                generation,
                settings: Arc::clone(&settings),
                spawner: Arc::clone(&self.spawner),
                prober: Arc::clone(&self.prober),
                events: Arc::clone(&self.events),
                shared: Arc::clone(&self.shared),
            };
            pool.spawn(move || worker.run());
        }
        Ok(batch)
    }

    /// Stops the current batch: queued jobs are abandoned and running jobs
    /// are asked to terminate. Idempotent, and a no-op once the batch has
    /// finished on its own. Returns without waiting for the workers.
    pub fn stop(&self) {
        let jobs: Vec<Arc<Job<S::Process>>> = {
            let mut state = self.shared.lock();
            if state.generation == 0 || state.finished || state.stop_requested {
                return;
            }
            state.stop_requested = true;
            let abandoned = state.queue.len();
            state.queue.clear();
            info!(
                "Stop requested: {} queued job(s) abandoned, {} running",
                abandoned,
                state.active.len()
            );
            state.active.drain().map(|(_, job)| job).collect()
        };
        for job in jobs {
            job.stop();
        }
    }

    pub fn progress(&self) -> BatchProgress {
        let state = self.shared.lock();
        BatchProgress {
            batch: (state.generation > 0).then_some(BatchId(state.generation)),
            total: state.total,
            completed: state.completed,
            active: state.active.len(),
            stop_requested: state.stop_requested,
            finished: state.finished,
        }
    }

    /// Current tally; `None` before the first submission.
    pub fn summary(&self) -> Option<BatchSummary> {
        let state = self.shared.lock();
        (state.generation > 0).then(|| state.summary())
    }

    /// True when no worker of any batch is alive.
    pub fn is_idle(&self) -> bool {
        self.shared.lock().workers_alive == 0
    }

    /// Blocks until every worker of the current batch has exited.
    pub fn wait_idle(&self) {
        let mut state = self.shared.lock();
        while state.workers_alive > 0 {
            state = self
                .shared
                .idle
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

struct Worker<S: EncoderSpawner> {
    generation: u64,
    settings: Arc<JobSettings>,
    spawner: Arc<S>,
    prober: Arc<dyn MediaProber>,
    events: Arc<dyn EventHandler>,
    shared: Arc<Shared<S::Process>>,
}

impl<S: EncoderSpawner> Worker<S> {
    fn run(self) {
        let ctx = JobContext {
            settings: &self.settings,
            spawner: self.spawner.as_ref(),
            prober: self.prober.as_ref(),
            events: self.events.as_ref(),
        };

        while let Some(job) = self.next_job() {
            let outcome = job.run(&ctx);
            let finished = self
                .shared
                .lock()
                .record_outcome(self.generation, job.id(), outcome);
            if let Some(summary) = finished {
                info!(
                    "Batch finished: {} succeeded, {} skipped, {} failed",
                    summary.succeeded, summary.skipped, summary.failed
                );
                self.events.handle(&Event::BatchFinished { summary });
            }
        }

        let mut state = self.shared.lock();
        if state.generation == self.generation {
            state.workers_alive = state.workers_alive.saturating_sub(1);
            if state.workers_alive == 0 {
                self.shared.idle.notify_all();
            }
        } else {
            warn!("Worker outlived its batch");
        }
    }

    fn next_job(&self) -> Option<Arc<Job<S::Process>>> {
        let mut state = self.shared.lock();
        if state.generation != self.generation || state.stop_requested {
            return None;
        }
        let job = state.queue.pop_front()?;
        state.active.insert(job.id(), Arc::clone(&job));
        Some(job)
    }
}

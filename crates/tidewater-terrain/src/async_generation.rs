//! Background 3×3 generation on a fixed thread pool.
//!
//! The pipeline itself is single-threaded. This pool only keeps a caller's
//! I/O loop free: jobs go out over a bounded channel, finished blocks come back
//! over another, and a job that is cancelled or times out never delivers its
//! result.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded};
use dashmap::DashMap;
use tidewater_config::{TerrainConfig, WorkerConfig};

use crate::error::TerrainError;
use crate::generator::{TerrainResult, generate};
use crate::grid::TileCoord;

/// A request to generate one 3×3 block.
#[derive(Clone, Debug)]
pub struct GenerationTask {
    /// Caller-chosen identifier, echoed on the result.
    pub job_id: u64,
    /// Finished configuration, shared between jobs.
    pub config: Arc<TerrainConfig>,
    /// Center tile of the block.
    pub center: TileCoord,
}

/// A finished job.
#[derive(Debug)]
pub struct GeneratedTerrain {
    /// Identifier of the originating task.
    pub job_id: u64,
    /// The block, or the reason generation refused to run.
    pub result: Result<TerrainResult, TerrainError>,
    /// Generation time in microseconds.
    pub generation_time_us: u64,
}

struct QueuedTask {
    task: GenerationTask,
    cancelled: Arc<AtomicBool>,
}

/// Runs terrain generation jobs across worker threads.
pub struct AsyncTerrainGenerator {
    task_sender: Sender<QueuedTask>,
    result_receiver: Receiver<GeneratedTerrain>,
    /// Cancellation flag per pending job.
    active_tasks: Arc<DashMap<u64, Arc<AtomicBool>>>,
    /// Jobs queued or executing.
    in_flight: Arc<AtomicU64>,
    /// Results received while waiting for a different job.
    stash: Mutex<VecDeque<GeneratedTerrain>>,
    workers: usize,
}

impl AsyncTerrainGenerator {
    /// Starts `thread_count` workers. At most `max_concurrent` jobs may be
    /// queued; completed results buffer up to `result_capacity`.
    pub fn new(
        thread_count: usize,
        max_concurrent: usize,
        result_capacity: usize,
    ) -> std::io::Result<Self> {
        let (task_sender, task_receiver) = bounded::<QueuedTask>(max_concurrent.max(1));
        let (result_sender, result_receiver) = bounded::<GeneratedTerrain>(result_capacity.max(1));
        let in_flight = Arc::new(AtomicU64::new(0));
        let workers = thread_count.max(1);

        for _ in 0..workers {
            let receiver = task_receiver.clone();
            let sender = result_sender.clone();
            let in_flight = Arc::clone(&in_flight);

            std::thread::Builder::new()
                .name("terrain-gen-worker".into())
                .spawn(move || {
                    while let Ok(queued) = receiver.recv() {
                        if queued.cancelled.load(Ordering::Relaxed) {
                            in_flight.fetch_sub(1, Ordering::Relaxed);
                            continue;
                        }

                        let GenerationTask { job_id, config, center } = queued.task;
                        let start = Instant::now();
                        let result = generate(&config, center.tx, center.ty);
                        let elapsed = start.elapsed().as_micros() as u64;

                        if queued.cancelled.load(Ordering::Relaxed) {
                            tracing::debug!(job_id, "discarding cancelled terrain job");
                        } else {
                            let _ = sender.send(GeneratedTerrain {
                                job_id,
                                result,
                                generation_time_us: elapsed,
                            });
                        }
                        in_flight.fetch_sub(1, Ordering::Relaxed);
                    }
                })?;
        }

        Ok(Self {
            task_sender,
            result_receiver,
            active_tasks: Arc::new(DashMap::new()),
            in_flight,
            stash: Mutex::new(VecDeque::new()),
            workers,
        })
    }

    /// A pool sized from the CPU count.
    pub fn with_defaults() -> std::io::Result<Self> {
        let cpus = num_cpus::get().max(2);
        Self::new((cpus - 2).max(1), 16, 32)
    }

    /// A pool sized by the worker settings; `threads = 0` means CPU-derived.
    pub fn from_config(config: &WorkerConfig) -> std::io::Result<Self> {
        if config.threads == 0 {
            Self::with_defaults()
        } else {
            Self::new(config.threads, 16, 32)
        }
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Queues a job. Returns `Err(task)` when the queue is full.
    #[allow(clippy::result_large_err)]
    pub fn submit(&self, task: GenerationTask) -> Result<(), GenerationTask> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.active_tasks.insert(task.job_id, Arc::clone(&cancelled));
        self.in_flight.fetch_add(1, Ordering::Relaxed);

        self.task_sender
            .try_send(QueuedTask { task, cancelled })
            .map_err(|e| {
                self.in_flight.fetch_sub(1, Ordering::Relaxed);
                let queued = e.into_inner();
                self.active_tasks.remove(&queued.task.job_id);
                queued.task
            })
    }

    /// Cancels a queued or running job. Its result is never delivered.
    pub fn cancel(&self, job_id: u64) {
        if let Some((_, cancelled)) = self.active_tasks.remove(&job_id) {
            cancelled.store(true, Ordering::Relaxed);
        }
    }

    /// Takes a result off the channel if its job is still wanted.
    fn accept(&self, done: GeneratedTerrain) -> Option<GeneratedTerrain> {
        self.active_tasks.remove(&done.job_id).map(|_| done)
    }

    /// Every completed result, without blocking.
    pub fn drain_results(&self) -> Vec<GeneratedTerrain> {
        let mut results: Vec<_> = self
            .stash
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        while let Ok(done) = self.result_receiver.try_recv() {
            results.extend(self.accept(done));
        }
        results
    }

    /// Waits up to `timeout` for one job. On timeout the job is cancelled and
    /// `None` returned; no partial block is ever handed out.
    pub fn recv_timeout(&self, job_id: u64, timeout: Duration) -> Option<GeneratedTerrain> {
        {
            let mut stash = self.stash.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(index) = stash.iter().position(|r| r.job_id == job_id) {
                return stash.remove(index);
            }
        }
        if !self.is_pending(job_id) {
            return None;
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.result_receiver.recv_timeout(remaining) {
                Ok(done) if done.job_id == job_id => return self.accept(done),
                Ok(other) => {
                    if let Some(other) = self.accept(other) {
                        self.stash
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push_back(other);
                    }
                }
                Err(_) => break,
            }
        }
        tracing::warn!(
            job_id,
            timeout_ms = timeout.as_millis() as u64,
            "terrain job timed out, discarding"
        );
        self.cancel(job_id);
        None
    }

    /// Jobs queued or executing.
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Whether a job is queued, running, or finished but not yet collected.
    pub fn is_pending(&self, job_id: u64) -> bool {
        self.active_tasks.contains_key(&job_id)
    }
}

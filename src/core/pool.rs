//! Fixed-size worker pool
//!
//! Workers pull [`Task`]s from a bounded intake channel and publish
//! [`TaskOutcome`]s on an unbounded outcome channel. The intake sender lives
//! behind a lock shared by [`WorkerPool::submit`] and [`WorkerPool::stop`]:
//! a submission either completes its send while holding the read side, or
//! observes the closed intake and fails with [`CseError::PoolStopped`].
//!
//! Stopping drops the intake sender. Workers keep receiving until the channel
//! is empty and disconnected, so every accepted task still runs and publishes
//! its outcome before the workers exit.

use crate::core::task::{Job, Task, TaskOutcome};
use crate::error::{CseError, Result};
use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;

/// Default number of workers
pub const DEFAULT_WORKERS: usize = 8;

/// Bounded-concurrency executor for transfer jobs
pub struct WorkerPool {
    /// Intake sender; `None` once stopping has begun
    intake: RwLock<Option<Sender<Task>>>,
    /// Outcome receiver handed to the monitor
    outcomes: Receiver<TaskOutcome>,
    /// Worker handles, drained by the first `stop` caller
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Set once every worker has exited
    stopped: AtomicBool,
    /// Next task ID
    next_task_id: AtomicU64,
    capacity: usize,
}

impl WorkerPool {
    /// Spawn `capacity` workers (at least one)
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = capacity.max(1);
        let (task_sender, task_receiver) = bounded::<Task>(capacity);
        let (outcome_sender, outcome_receiver) = unbounded::<TaskOutcome>();

        let mut workers = Vec::with_capacity(capacity);
        for id in 0..capacity {
            let tasks = task_receiver.clone();
            let results = outcome_sender.clone();
            let handle = std::thread::Builder::new()
                .name(format!("cse-worker-{}", id))
                .spawn(move || worker_loop(id, tasks, results))
                .map_err(|e| CseError::config(format!("Failed to spawn worker {}: {}", id, e)))?;
            workers.push(handle);
        }

        tracing::debug!(capacity, "worker pool started");

        Ok(Self {
            intake: RwLock::new(Some(task_sender)),
            outcomes: outcome_receiver,
            workers: Mutex::new(workers),
            stopped: AtomicBool::new(false),
            next_task_id: AtomicU64::new(0),
            capacity,
        })
    }

    /// Number of workers
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Outcome stream. Disconnects once the pool is stopped and drained.
    pub fn outcomes(&self) -> &Receiver<TaskOutcome> {
        &self.outcomes
    }

    /// Queue a job, blocking while the intake is full
    pub fn submit<J: Job + 'static>(&self, label: impl Into<String>, job: J) -> Result<u64> {
        self.submit_boxed(label, Box::new(job))
    }

    /// Queue a closure as a job
    pub fn submit_fn<F>(&self, label: impl Into<String>, f: F) -> Result<u64>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.submit_boxed(label, Box::new(f))
    }

    /// Queue an already boxed job
    pub fn submit_boxed(&self, label: impl Into<String>, job: Box<dyn Job>) -> Result<u64> {
        let intake = self.intake.read().unwrap_or_else(PoisonError::into_inner);
        let sender = intake.as_ref().ok_or(CseError::PoolStopped)?;

        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        sender
            .send(Task::new(task_id, label, job))
            .map_err(|_| CseError::PoolStopped)?;

        Ok(task_id)
    }

    /// Close the intake and wait for every worker to exit.
    ///
    /// Idempotent and safe to call from several threads; every caller returns
    /// only after all accepted tasks have published their outcomes.
    pub fn stop(&self) {
        // Waits for in-progress submissions to finish their send
        let sender = self
            .intake
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_some() {
            tracing::debug!("worker pool intake closed");
        }
        drop(sender);

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// True once `stop` has returned
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(id: usize, tasks: Receiver<Task>, results: Sender<TaskOutcome>) {
    for task in tasks.iter() {
        tracing::trace!(worker = id, task = task.id, "running task");
        let outcome = task.run();
        // Receiver only disappears when the pool itself is dropped
        let _ = results.send(outcome);
    }
    tracing::trace!(worker = id, "worker exiting");
}

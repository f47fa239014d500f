//! Outcome aggregation and first-failure cancellation
//!
//! The [`Monitor`] drains a [`WorkerPool`]'s outcome stream while the producer
//! runs. The first failed outcome stops the pool; the producer then sees
//! [`CseError::PoolStopped`] on its next submission and reports it as its
//! terminal signal. A recorded task failure always wins over the producer's
//! own error.

use crate::core::pool::WorkerPool;
use crate::core::task::TaskOutcome;
use crate::error::{CseError, Result};
use crate::progress::ProgressReporter;
use crossbeam::channel::{bounded, select, Receiver};
use std::time::{Duration, Instant};

/// Terminal signal reported by the producer
#[derive(Debug)]
pub enum TerminalSignal {
    /// Enumeration finished without error
    EndOfStream,
    /// Enumeration stopped on an error
    Failed(CseError),
}

impl From<Result<()>> for TerminalSignal {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::EndOfStream,
            Err(e) => Self::Failed(e),
        }
    }
}

/// Counts gathered over one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Tasks that completed successfully
    pub tasks_completed: u64,
    /// Tasks that failed
    pub tasks_failed: u64,
    /// Wall time of the run
    pub duration: Duration,
}

impl RunSummary {
    /// Total outcomes observed
    pub fn outcomes(&self) -> u64 {
        self.tasks_completed + self.tasks_failed
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n=== Transfer Summary ===");
        println!("Items transferred: {}", self.tasks_completed);
        println!("Duration:          {:.2?}", self.duration);
    }
}

/// Aggregates task outcomes into a single run result
pub struct Monitor<'a> {
    pool: &'a WorkerPool,
    progress: Option<&'a ProgressReporter>,
    first_failure: Option<CseError>,
    summary: RunSummary,
}

impl<'a> Monitor<'a> {
    /// Create a monitor for the given pool
    pub fn new(pool: &'a WorkerPool) -> Self {
        Self {
            pool,
            progress: None,
            first_failure: None,
            summary: RunSummary::default(),
        }
    }

    /// Report completed items to a progress reporter
    pub fn with_progress(mut self, progress: Option<&'a ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Drain outcomes until the producer reports its terminal signal.
    ///
    /// The pool is always stopped before this returns, and every outcome of
    /// an accepted task is counted.
    pub fn run(mut self, terminal: &Receiver<TerminalSignal>) -> Result<RunSummary> {
        let start = Instant::now();
        let outcomes = self.pool.outcomes().clone();

        let signal = loop {
            let step = select! {
                recv(outcomes) -> msg => match msg {
                    Ok(outcome) => Step::Outcome(outcome),
                    Err(_) => Step::Drained,
                },
                recv(terminal) -> msg => Step::Terminal(msg.unwrap_or_else(|_| producer_vanished())),
            };

            match step {
                Step::Outcome(outcome) => self.record(outcome),
                // Pool stopped and drained; only the producer is left
                Step::Drained => break wait_terminal(terminal),
                Step::Terminal(signal) => break signal,
            }
        };

        self.pool.stop();
        for outcome in outcomes.try_iter() {
            self.record(outcome);
        }

        self.summary.duration = start.elapsed();

        match (self.first_failure, signal) {
            (Some(failure), _) => Err(failure),
            (None, TerminalSignal::Failed(e)) => Err(e),
            (None, TerminalSignal::EndOfStream) => Ok(self.summary),
        }
    }

    fn record(&mut self, outcome: TaskOutcome) {
        match outcome.result {
            Ok(()) => {
                self.summary.tasks_completed += 1;
                if let Some(progress) = self.progress {
                    progress.increment_items(1);
                }
            }
            Err(e) => {
                self.summary.tasks_failed += 1;
                tracing::error!(item = %outcome.label, "transfer failed: {}", e);

                if self.first_failure.is_none() {
                    self.first_failure = Some(CseError::task(outcome.label, e));
                    tracing::warn!("cancelling run after first failure");
                    self.pool.stop();
                }
            }
        }
    }
}

enum Step {
    Outcome(TaskOutcome),
    Drained,
    Terminal(TerminalSignal),
}

fn wait_terminal(terminal: &Receiver<TerminalSignal>) -> TerminalSignal {
    terminal.recv().unwrap_or_else(|_| producer_vanished())
}

fn producer_vanished() -> TerminalSignal {
    TerminalSignal::Failed(CseError::config(
        "producer exited without reporting a terminal signal",
    ))
}

/// Run one producer against a fresh pool of `capacity` workers.
///
/// The producer runs on its own thread and submits into the pool; its return
/// value becomes the terminal signal. The monitor runs on the calling thread.
pub fn run_pipeline<P>(
    capacity: usize,
    progress: Option<&ProgressReporter>,
    producer: P,
) -> Result<RunSummary>
where
    P: FnOnce(&WorkerPool) -> Result<()> + Send,
{
    let pool = WorkerPool::new(capacity)?;
    let (signal_tx, signal_rx) = bounded::<TerminalSignal>(1);

    std::thread::scope(|scope| {
        let pool_ref = &pool;
        scope.spawn(move || {
            let signal = TerminalSignal::from(producer(pool_ref));
            let _ = signal_tx.send(signal);
        });

        Monitor::new(&pool).with_progress(progress).run(&signal_rx)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_all_success() {
        let summary = run_pipeline(3, None, |pool| {
            for i in 0..10 {
                pool.submit_fn(format!("item-{}", i), || Ok(()))?;
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(summary.tasks_completed, 10);
        assert_eq!(summary.tasks_failed, 0);
    }

    #[test]
    fn test_empty_run() {
        let summary = run_pipeline(2, None, |_| Ok(())).unwrap();
        assert_eq!(summary.outcomes(), 0);
    }

    #[test]
    fn test_producer_error_without_task_failure() {
        let err = run_pipeline(2, None, |pool| {
            pool.submit_fn("ok", || Ok(()))?;
            Err(CseError::transport("ListObjects", "throttled"))
        })
        .unwrap_err();

        assert!(matches!(err, CseError::Transport { operation: "ListObjects", .. }));
    }

    #[test]
    fn test_task_failure_wins_over_pool_stopped() {
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_in = Arc::clone(&ran);

        let err = run_pipeline(1, None, move |pool| {
            pool.submit_fn("broken", || Err(CseError::transport("GetObject", "reset")))?;
            loop {
                let ran = Arc::clone(&ran_in);
                pool.submit_fn("tail", move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(5));
                    Ok(())
                })?;
            }
        })
        .unwrap_err();

        match err {
            CseError::Task { item, source } => {
                assert_eq!(item, "broken");
                assert!(matches!(*source, CseError::Transport { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_signal_from_result() {
        assert!(matches!(TerminalSignal::from(Ok(())), TerminalSignal::EndOfStream));
        assert!(matches!(
            TerminalSignal::from(Err(CseError::PoolStopped)),
            TerminalSignal::Failed(CseError::PoolStopped)
        ));
    }
}

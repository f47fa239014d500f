//! Schedulable units of work
//!
//! A [`Task`] wraps one [`Job`] together with an id and a label. Running a task
//! consumes it and yields a [`TaskOutcome`], so a task's result can only be
//! recorded once.

use crate::error::Result;

/// A fallible operation run by a worker
pub trait Job: Send {
    /// Execute the job
    fn run(self: Box<Self>) -> Result<()>;
}

impl<F> Job for F
where
    F: FnOnce() -> Result<()> + Send,
{
    fn run(self: Box<Self>) -> Result<()> {
        (*self)()
    }
}

/// A job queued in the worker pool
pub struct Task {
    /// Submission sequence number
    pub id: u64,
    /// Human-readable label, usually the item's relative path
    pub label: String,
    job: Box<dyn Job>,
}

impl Task {
    /// Create a new task
    pub fn new(id: u64, label: impl Into<String>, job: Box<dyn Job>) -> Self {
        Self {
            id,
            label: label.into(),
            job,
        }
    }

    /// Create a task from a closure
    pub fn from_fn<F>(id: u64, label: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        Self::new(id, label, Box::new(f))
    }

    /// Run the job and record its outcome
    pub fn run(self) -> TaskOutcome {
        let result = self.job.run();
        TaskOutcome {
            task_id: self.id,
            label: self.label,
            result,
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Result of a completed task
#[derive(Debug)]
pub struct TaskOutcome {
    /// Task ID
    pub task_id: u64,
    /// Label of the task that produced this outcome
    pub label: String,
    /// Success or failure
    pub result: Result<()>,
}

impl TaskOutcome {
    /// Check if the task succeeded
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CseError;

    #[test]
    fn test_closure_job_success() {
        let task = Task::from_fn(7, "ok", || Ok(()));
        let outcome = task.run();
        assert_eq!(outcome.task_id, 7);
        assert_eq!(outcome.label, "ok");
        assert!(outcome.is_success());
    }

    #[test]
    fn test_closure_job_error() {
        let task = Task::from_fn(1, "bad", || Err(CseError::transport("GetObject", "reset")));
        let outcome = task.run();
        assert!(!outcome.is_success());
        assert!(matches!(outcome.result, Err(CseError::Transport { .. })));
    }

    struct Counting(std::sync::Arc<std::sync::atomic::AtomicUsize>);

    impl Job for Counting {
        fn run(self: Box<Self>) -> Result<()> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_struct_job() {
        let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let task = Task::new(0, "count", Box::new(Counting(counter.clone())));
        assert!(task.run().is_success());
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}

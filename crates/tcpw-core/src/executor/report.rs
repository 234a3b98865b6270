use std::time::Duration;

/// Why an execution stopped waiting for its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The base scope was cancelled (shutdown signal).
    Cancelled,
    /// The per-execution timeout elapsed.
    DeadlineExceeded,
    /// Every task returned on its own.
    Completed,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Cancelled => "cancelled",
            StopReason::DeadlineExceeded => "deadline exceeded",
            StopReason::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: String,
    pub reason: String,
}

/// Outcome of one execution.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub stop: StopReason,
    /// Tasks handed to the execution.
    pub total: usize,
    /// Workers that returned (successfully or not) without being aborted.
    pub finished: usize,
    pub failures: Vec<TaskFailure>,
    /// Workers aborted after the drain grace elapsed.
    pub aborted: usize,
    pub elapsed: Duration,
}

impl ExecutionReport {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            stop: StopReason::Completed,
            total,
            finished: 0,
            failures: Vec::new(),
            aborted: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.aborted == 0
    }
}

//! Execution context manager.
//!
//! Runs a batch of capture tasks inside one cancellable scope, optionally bounded by a
//! deadline, and returns only after every worker has returned.

mod report;
pub use report::{ExecutionReport, StopReason, TaskFailure};

use std::{future::pending, time::Duration};

use tokio::{
    task::{JoinError, JoinSet},
    time::{Instant, sleep_until, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use tcpw_model::Correlation;

use crate::{error::CaptureError, task::CaptureTask};

type Joined = Result<(String, Result<(), CaptureError>), JoinError>;

/// Cancellation and time policy shared by all executions of a job.
#[derive(Debug, Clone)]
pub struct ExecutionScope {
    /// Base scope; cancelling it stops the running execution.
    pub token: CancellationToken,
    /// Per-execution deadline. `None` means unbounded.
    pub timeout: Option<Duration>,
    /// How long to wait for workers after the stop signal before aborting them.
    /// `None` waits indefinitely.
    pub grace: Option<Duration>,
}

impl ExecutionScope {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            timeout: None,
            grace: None,
        }
    }

    /// A zero duration leaves the execution unbounded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// A zero duration waits indefinitely for workers to drain.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = (!grace.is_zero()).then_some(grace);
        self
    }
}

/// Run every task concurrently until the scope ends or all of them finish on their own.
///
/// Two-phase wait: first for the stop signal (cancellation, deadline or natural
/// completion), then for the workers to drain. No task is retried.
pub async fn run_tasks(
    scope: &ExecutionScope,
    ctx: &Correlation,
    tasks: &[CaptureTask],
) -> ExecutionReport {
    let started = Instant::now();
    let deadline = scope.timeout.map(|t| started + t);
    let token = scope.token.child_token();
    let execution = ctx.label();

    let mut workers = JoinSet::new();
    for task in tasks {
        let task = task.clone();
        let token = token.clone();
        let span = info_span!("capture", task = task.label(), execution = %execution);
        workers.spawn(
            async move {
                debug!(engine = task.engine().name(), sinks = task.sinks().len(), "task starting");
                let res = task.run(token).await;
                debug!(ok = res.is_ok(), "task returned");
                (task.label().to_string(), res)
            }
            .instrument(span),
        );
    }

    let mut report = ExecutionReport::new(tasks.len());
    let stop = loop {
        tokio::select! {
            _ = token.cancelled() => break StopReason::Cancelled,
            _ = until(deadline) => break StopReason::DeadlineExceeded,
            joined = workers.join_next() => match joined {
                Some(joined) => record(&mut report, joined),
                None => break StopReason::Completed,
            },
        }
    };
    debug!(target: "tcpw.executor", %execution, ?stop, running = workers.len(), "stop signal observed");

    token.cancel();
    let aborted = drain(&mut workers, scope.grace, &mut report).await;
    report.aborted = aborted;
    report.stop = stop;
    report.elapsed = started.elapsed();

    debug!(
        target: "tcpw.executor",
        %execution,
        finished = report.finished,
        failed = report.failures.len(),
        aborted = report.aborted,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "workers drained"
    );
    report
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

/// Wait for the remaining workers; returns how many had to be aborted.
async fn drain(
    workers: &mut JoinSet<(String, Result<(), CaptureError>)>,
    grace: Option<Duration>,
    report: &mut ExecutionReport,
) -> usize {
    let drained = async {
        while let Some(joined) = workers.join_next().await {
            record(report, joined);
        }
    };

    let Some(grace) = grace else {
        drained.await;
        return 0;
    };
    if timeout(grace, drained).await.is_ok() {
        return 0;
    }

    let left = workers.len();
    warn!(target: "tcpw.executor", left, grace_ms = grace.as_millis() as u64, "grace exceeded; aborting workers");
    workers.abort_all();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Err(e) if e.is_cancelled() => {}
            other => record(report, other),
        }
    }
    left
}

fn record(report: &mut ExecutionReport, joined: Joined) {
    report.finished += 1;
    match joined {
        Ok((_, Ok(()))) => {}
        Ok((task, Err(e))) => report.failures.push(TaskFailure {
            task,
            reason: e.to_string(),
        }),
        Err(e) => report.failures.push(TaskFailure {
            task: "unknown".to_string(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests;

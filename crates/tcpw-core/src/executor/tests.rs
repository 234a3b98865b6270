use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use tokio::time::sleep;

use super::*;
use crate::capture::{CaptureEngine, OutputSink};

/// Runs until cancelled, or until `limit` elapses when set.
struct Engine {
    limit: Option<Duration>,
    ignore_cancel: bool,
    fail: bool,
    stopped: Arc<AtomicUsize>,
}

impl Engine {
    fn forever(stopped: &Arc<AtomicUsize>) -> Self {
        Self {
            limit: None,
            ignore_cancel: false,
            fail: false,
            stopped: Arc::clone(stopped),
        }
    }
}

#[async_trait]
impl CaptureEngine for Engine {
    fn name(&self) -> &'static str {
        "test"
    }

    async fn run(
        &self,
        scope: CancellationToken,
        _sinks: &[Arc<dyn OutputSink>],
    ) -> Result<(), CaptureError> {
        if self.fail {
            return Err(CaptureError::Engine("no such device".into()));
        }
        if self.ignore_cancel {
            sleep(Duration::from_secs(3600)).await;
            return Ok(());
        }
        match self.limit {
            Some(limit) => {
                tokio::select! {
                    _ = scope.cancelled() => {}
                    _ = sleep(limit) => {}
                }
            }
            None => scope.cancelled().await,
        }
        self.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn task(label: &str, engine: Engine) -> CaptureTask {
    CaptureTask::new(label, Arc::new(engine), Vec::new())
}

#[tokio::test(start_paused = true)]
async fn timeout_stops_engine_that_never_ends() {
    let stopped = Arc::new(AtomicUsize::new(0));
    let scope = ExecutionScope::new(CancellationToken::new()).with_timeout(Duration::from_secs(5));
    let tasks = [task("a", Engine::forever(&stopped))];

    let report = run_tasks(&scope, &Correlation::detached(), &tasks).await;

    assert_eq!(report.stop, StopReason::DeadlineExceeded);
    assert!(report.elapsed >= Duration::from_secs(5));
    assert!(report.elapsed < Duration::from_secs(6));
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
    assert_eq!(report.finished, 1);
    assert!(report.is_clean());
    assert!(!scope.token.is_cancelled(), "deadline must not cancel the base scope");
}

#[tokio::test(start_paused = true)]
async fn tasks_that_finish_on_their_own_complete_the_execution() {
    let stopped = Arc::new(AtomicUsize::new(0));
    let limited = |secs| Engine {
        limit: Some(Duration::from_secs(secs)),
        ..Engine::forever(&stopped)
    };
    let scope = ExecutionScope::new(CancellationToken::new());
    let tasks = [task("a", limited(1)), task("b", limited(2))];

    let report = run_tasks(&scope, &Correlation::detached(), &tasks).await;

    assert_eq!(report.stop, StopReason::Completed);
    assert_eq!(report.finished, 2);
    assert!(report.elapsed >= Duration::from_secs(2));
    assert!(report.elapsed < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn base_scope_cancellation_reaches_every_task() {
    let stopped = Arc::new(AtomicUsize::new(0));
    let base = CancellationToken::new();
    let scope = ExecutionScope::new(base.clone());
    let tasks = [
        task("a", Engine::forever(&stopped)),
        task("b", Engine::forever(&stopped)),
    ];

    let canceller = tokio::spawn(async move {
        sleep(Duration::from_secs(1)).await;
        base.cancel();
    });

    let report = run_tasks(&scope, &Correlation::detached(), &tasks).await;
    canceller.await.unwrap();

    assert_eq!(report.stop, StopReason::Cancelled);
    assert_eq!(stopped.load(Ordering::SeqCst), 2);
    assert_eq!(report.finished, 2);
}

#[tokio::test(start_paused = true)]
async fn workers_ignoring_stop_are_aborted_after_grace() {
    let stopped = Arc::new(AtomicUsize::new(0));
    let scope = ExecutionScope::new(CancellationToken::new())
        .with_timeout(Duration::from_secs(1))
        .with_grace(Duration::from_secs(2));
    let stubborn = Engine {
        ignore_cancel: true,
        ..Engine::forever(&stopped)
    };
    let tasks = [task("stubborn", stubborn), task("polite", Engine::forever(&stopped))];

    let report = run_tasks(&scope, &Correlation::detached(), &tasks).await;

    assert_eq!(report.stop, StopReason::DeadlineExceeded);
    assert_eq!(report.aborted, 1);
    assert_eq!(report.finished, 1);
    assert!(report.elapsed >= Duration::from_secs(3));
    assert!(report.elapsed < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn failures_are_reported_without_stopping_other_tasks() {
    let stopped = Arc::new(AtomicUsize::new(0));
    let scope = ExecutionScope::new(CancellationToken::new()).with_timeout(Duration::from_secs(2));
    let broken = Engine {
        fail: true,
        ..Engine::forever(&stopped)
    };
    let tasks = [task("broken", broken), task("healthy", Engine::forever(&stopped))];

    let report = run_tasks(&scope, &Correlation::detached(), &tasks).await;

    assert_eq!(report.stop, StopReason::DeadlineExceeded);
    assert_eq!(
        report.failures,
        [TaskFailure {
            task: "broken".into(),
            reason: "engine failed: no such device".into(),
        }]
    );
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_batch_completes_immediately() {
    let scope = ExecutionScope::new(CancellationToken::new());
    let report = run_tasks(&scope, &Correlation::detached(), &[]).await;
    assert_eq!(report.stop, StopReason::Completed);
    assert_eq!(report.total, 0);
}

#[test]
fn zero_durations_mean_unbounded() {
    let scope = ExecutionScope::new(CancellationToken::new())
        .with_timeout(Duration::ZERO)
        .with_grace(Duration::ZERO);
    assert!(scope.timeout.is_none());
    assert!(scope.grace.is_none());
}

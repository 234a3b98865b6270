//! Startup, run and shutdown of the sidecar.

use std::{future::Future, sync::Arc};

use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tcpw_core::{
    CaptureBackend, CaptureTask, ExecutionScope, Job, JobDefinition, JobRegistry, Scheduler,
    SchedulerConfig, TaskFactory, resolve_location, run_tasks,
};
use tcpw_discover::{DeviceEnumerator, DeviceSelector};
use tcpw_model::{Correlation, ExecutionId};
use tcpw_observe::Journal;

use crate::{
    config::RunConfig,
    error::LifecycleError,
    runner::{CaptureJobRunner, fmt_time, journal_report},
};

/// Name of the single scheduled job.
const JOB_NAME: &str = "tcpdump";

/// Builds the capture back end once the effective time zone is known.
pub type BackendFactory = Box<dyn FnOnce(Tz) -> Arc<dyn CaptureBackend> + Send>;

pub struct Lifecycle {
    cfg: RunConfig,
    journal: Journal,
    enumerator: Arc<dyn DeviceEnumerator>,
    backend: BackendFactory,
}

impl Lifecycle {
    pub fn new(
        cfg: RunConfig,
        journal: Journal,
        enumerator: Arc<dyn DeviceEnumerator>,
        backend: BackendFactory,
    ) -> Self {
        Self {
            cfg,
            journal,
            enumerator,
            backend,
        }
    }

    /// Run until `signal` resolves (one-shot runs also end when their tasks stop).
    ///
    /// `signal` yields the name of the received signal. Only the three startup-fatal
    /// conditions are returned as errors; everything else is journalled and recovered.
    pub async fn run<S>(self, signal: S) -> Result<(), LifecycleError>
    where
        S: Future<Output = String> + Send + 'static,
    {
        let Self {
            cfg,
            journal,
            enumerator,
            backend,
        } = self;
        let ctx = Correlation::detached();

        journal.info(&ctx, cfg.describe());

        let location = match resolve_location(&cfg.timezone) {
            Ok(tz) => tz,
            Err(e) => {
                journal.error(
                    &ctx,
                    format!("could not load timezone '{}': {}", cfg.timezone, e.reason),
                );
                Tz::UTC
            }
        };

        let backend = backend(location);
        let tasks = build_tasks(&cfg, &journal, enumerator.as_ref(), backend.as_ref());
        if tasks.is_empty() {
            journal.error(&ctx, "no PCAP tasks available");
            return Err(LifecycleError::NoTasks);
        }
        journal.info(&ctx, format!("parsed timeout: {}s", cfg.timeout.as_secs()));

        let root = CancellationToken::new();
        let scope = ExecutionScope::new(root.clone())
            .with_timeout(cfg.timeout)
            .with_grace(cfg.grace);

        if cfg.use_cron {
            scheduled(&cfg, &journal, location, root, scope, tasks, signal).await
        } else {
            one_shot(&journal, root, scope, tasks, signal).await;
            Ok(())
        }
    }
}

fn build_tasks(
    cfg: &RunConfig,
    journal: &Journal,
    enumerator: &dyn DeviceEnumerator,
    backend: &dyn CaptureBackend,
) -> Vec<CaptureTask> {
    let devices = match DeviceSelector::new(&cfg.iface) {
        Ok(selector) => selector.select(enumerator, journal),
        Err(e) => {
            journal.error(&Correlation::detached(), format!("invalid iface pattern: {e}"));
            Vec::new()
        }
    };
    TaskFactory::new(backend, &cfg.capture, journal).build(&devices)
}

/// Run every task once, bounded by the timeout, unless signalled first.
async fn one_shot<S>(
    journal: &Journal,
    root: CancellationToken,
    scope: ExecutionScope,
    tasks: Vec<CaptureTask>,
    signal: S,
) where
    S: Future<Output = String> + Send + 'static,
{
    let ctx = Correlation::detached().with_execution(ExecutionId::new());
    let watcher = watch_signal(journal.clone(), ctx.clone(), root.clone(), signal);

    info!(target: "tcpw.lifecycle", tasks = tasks.len(), execution = %ctx.label(), "one-shot capture");
    let report = run_tasks(&scope, &ctx, &tasks).await;
    journal_report(journal, &ctx, &report);
    journal.info(&ctx, "execution complete");

    root.cancel();
    if let Err(e) = watcher.await {
        debug!(target: "tcpw.lifecycle", error = %e, "signal watcher did not finish cleanly");
    }
}

#[allow(clippy::too_many_arguments)]
async fn scheduled<S>(
    cfg: &RunConfig,
    journal: &Journal,
    location: Tz,
    root: CancellationToken,
    scope: ExecutionScope,
    tasks: Vec<CaptureTask>,
    signal: S,
) -> Result<(), LifecycleError>
where
    S: Future<Output = String> + Send + 'static,
{
    let ctx = Correlation::detached();
    journal.info(&ctx, format!("parsed timezone: {location}"));

    let scheduler_cfg = SchedulerConfig {
        location,
        max_concurrent: 1,
        tags: cfg.tags.clone(),
    };
    let scheduler = Scheduler::new(scheduler_cfg, &root).map_err(|e| {
        journal.error(&ctx, format!("failed to create scheduler: {e}"));
        LifecycleError::SchedulerCreate(e)
    })?;

    let registry = JobRegistry::new();
    let runner = Arc::new(CaptureJobRunner::new(registry.clone(), journal.clone()));
    let handle = match scheduler.add_job(JobDefinition::new(JOB_NAME, cfg.cron_exp.clone()), runner) {
        Ok(handle) => handle,
        Err(e) => {
            journal.error(&ctx, format!("failed to create scheduled job: {e}"));
            scheduler.shutdown().await;
            return Err(LifecycleError::JobCreate(e));
        }
    };

    let job = registry.insert(Job::new(handle.id, handle.name, handle.tags, scope, tasks));
    let job_ctx = job.correlation(ExecutionId::nil());
    journal.info(&job_ctx, "scheduled job");

    if let Err(e) = scheduler.start() {
        journal.error(&job_ctx, format!("failed to start scheduler: {e}"));
    }
    journal.info(
        &job_ctx,
        format!("next execution: {}", fmt_time(scheduler.next_run(&job.id()))),
    );

    let watcher = watch_signal(journal.clone(), job_ctx, root.clone(), signal);
    root.cancelled().await;

    debug!(target: "tcpw.lifecycle", job = %job.id(), "shutting down scheduler");
    scheduler.stop_jobs().await;
    if let Err(e) = scheduler.remove_job(&job.id()) {
        debug!(target: "tcpw.lifecycle", job = %job.id(), error = %e, "job removal failed");
    }
    registry.remove(&job.id());
    scheduler.shutdown().await;
    if let Err(e) = watcher.await {
        debug!(target: "tcpw.lifecycle", error = %e, "signal watcher did not finish cleanly");
    }
    Ok(())
}

/// Cancel `root` once `signal` resolves. Returns when either happens.
fn watch_signal<S>(
    journal: Journal,
    ctx: Correlation,
    root: CancellationToken,
    signal: S,
) -> JoinHandle<()>
where
    S: Future<Output = String> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            name = signal => {
                journal.info(&ctx, format!("signaled: {name}"));
                root.cancel();
            }
            _ = root.cancelled() => {}
        }
    })
}

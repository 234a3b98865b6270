//! Cron scheduler with per-job singleton enforcement.
//!
//! Each job gets its own trigger loop. A fire is accepted only if the job has no
//! execution in flight and a concurrency slot is free; otherwise it is dropped and
//! the loop simply waits for the following fire time ("reschedule" mode).

mod cron;
pub use cron::CronSchedule;

mod location;
pub use location::resolve_location;

mod trigger;
pub use trigger::Trigger;
use trigger::JobTiming;

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::{runtime::Handle, sync::Semaphore, time::sleep};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, trace};

use tcpw_model::{ExecutionId, JobId, Tag};

use crate::error::SchedulerError;

/// Hooks invoked for every accepted trigger, strictly in order.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn before_run(&self, _trigger: &Trigger) {}

    async fn run(&self, trigger: &Trigger);

    async fn after_run(&self, _trigger: &Trigger) {}
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Zone cron expressions are evaluated in.
    pub location: Tz,
    /// Executions allowed to run at once across all jobs.
    pub max_concurrent: usize,
    /// Tags attached to every job handle.
    pub tags: Vec<Tag>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            location: Tz::UTC,
            max_concurrent: 1,
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobDefinition {
    pub name: String,
    pub cron: String,
}

impl JobDefinition {
    pub fn new(name: impl Into<String>, cron: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cron: cron.into(),
        }
    }
}

/// Identity of a job accepted by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: JobId,
    pub name: String,
    pub tags: Vec<Tag>,
}

struct ScheduledJob {
    handle: JobHandle,
    cron: CronSchedule,
    runner: Arc<dyn JobRunner>,
    timing: Arc<JobTiming>,
    running: AtomicBool,
    spawned: AtomicBool,
    stop: CancellationToken,
}

struct Inner {
    cfg: SchedulerConfig,
    slots: Arc<Semaphore>,
    jobs: Mutex<HashMap<JobId, Arc<ScheduledJob>>>,
    shutdown: CancellationToken,
    loops: TaskTracker,
    runs: TaskTracker,
    runtime: Handle,
    started: AtomicBool,
}

/// Cheap to clone; clones drive the same jobs.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Trigger loops live in a child of `parent`: cancelling it stops all triggers.
    pub fn new(cfg: SchedulerConfig, parent: &CancellationToken) -> Result<Self, SchedulerError> {
        if cfg.max_concurrent == 0 {
            return Err(SchedulerError::InvalidConcurrency);
        }
        let runtime = Handle::try_current().map_err(|e| SchedulerError::NoRuntime(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                slots: Arc::new(Semaphore::new(cfg.max_concurrent)),
                cfg,
                jobs: Mutex::new(HashMap::new()),
                shutdown: parent.child_token(),
                loops: TaskTracker::new(),
                runs: TaskTracker::new(),
                runtime,
                started: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.cfg
    }

    /// Register a job. Its loop starts with [`Scheduler::start`], or right away if the
    /// scheduler is already started.
    pub fn add_job(
        &self,
        def: JobDefinition,
        runner: Arc<dyn JobRunner>,
    ) -> Result<JobHandle, SchedulerError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SchedulerError::ShutDown);
        }
        if def.name.trim().is_empty() {
            return Err(SchedulerError::InvalidJob("job name is empty".into()));
        }
        let cron = CronSchedule::parse(&def.cron)?;

        let handle = JobHandle {
            id: JobId::new(),
            name: def.name,
            tags: self.inner.cfg.tags.clone(),
        };
        let timing = Arc::new(JobTiming::default());
        timing.set_next(cron.next_after(&Utc::now(), &self.inner.cfg.location));

        let job = Arc::new(ScheduledJob {
            handle: handle.clone(),
            cron,
            runner,
            timing,
            running: AtomicBool::new(false),
            spawned: AtomicBool::new(false),
            stop: self.inner.shutdown.child_token(),
        });
        self.jobs().insert(handle.id, Arc::clone(&job));
        debug!(target: "tcpw.scheduler", job = %handle.id, name = %handle.name, cron = job.cron.expr(), "job added");

        if self.inner.started.load(Ordering::Acquire) {
            self.spawn_loop(job);
        }
        Ok(handle)
    }

    /// Start trigger loops for every registered job. Idempotent.
    pub fn start(&self) -> Result<(), SchedulerError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SchedulerError::ShutDown);
        }
        self.inner.started.store(true, Ordering::Release);

        let jobs: Vec<_> = self.jobs().values().cloned().collect();
        for job in jobs {
            self.spawn_loop(job);
        }
        Ok(())
    }

    pub fn next_run(&self, id: &JobId) -> Option<DateTime<Tz>> {
        self.jobs().get(id).and_then(|j| j.timing.next())
    }

    pub fn last_run(&self, id: &JobId) -> Option<DateTime<Tz>> {
        self.jobs().get(id).and_then(|j| j.timing.last())
    }

    /// Stop every trigger loop and wait for in-flight executions to return.
    /// Stopped jobs stay registered but never fire again.
    pub async fn stop_jobs(&self) {
        let jobs: Vec<_> = self.jobs().values().cloned().collect();
        for job in &jobs {
            job.stop.cancel();
        }
        self.drain().await;
        debug!(target: "tcpw.scheduler", jobs = jobs.len(), "jobs stopped");
    }

    pub fn remove_job(&self, id: &JobId) -> Result<(), SchedulerError> {
        let job = self
            .jobs()
            .remove(id)
            .ok_or(SchedulerError::JobNotFound(*id))?;
        job.stop.cancel();
        job.timing.set_next(None);
        debug!(target: "tcpw.scheduler", job = %id, "job removed");
        Ok(())
    }

    /// Stop everything and release the scheduler. Later calls to `add_job` or `start` fail.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.drain().await;
        self.jobs().clear();
        debug!(target: "tcpw.scheduler", "scheduler shut down");
    }

    async fn drain(&self) {
        for tracker in [&self.inner.loops, &self.inner.runs] {
            tracker.close();
            tracker.wait().await;
            tracker.reopen();
        }
    }

    fn jobs(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, Arc<ScheduledJob>>> {
        self.inner.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_loop(&self, job: Arc<ScheduledJob>) {
        if job.spawned.swap(true, Ordering::AcqRel) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        self.inner
            .loops
            .spawn_on(drive(inner, job), &self.inner.runtime);
    }
}

/// Trigger loop of one job.
async fn drive(inner: Arc<Inner>, job: Arc<ScheduledJob>) {
    let tz = inner.cfg.location;
    let mut cursor = Utc::now();

    loop {
        let Some(next) = job.cron.next_after(&cursor, &tz) else {
            debug!(target: "tcpw.scheduler", job = %job.handle.id, "no further fire times");
            break;
        };
        job.timing.set_next(Some(next));

        let fire_at = next.with_timezone(&Utc);
        let wait = (fire_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        trace!(target: "tcpw.scheduler", job = %job.handle.id, %next, wait_ms = wait.as_millis() as u64, "waiting for trigger");

        tokio::select! {
            biased;
            _ = job.stop.cancelled() => break,
            _ = sleep(wait) => {}
        }

        // Never fire the same instant twice; fires missed while sleeping are skipped.
        cursor = fire_at.max(Utc::now());
        fire(&inner, &job, next);
    }

    job.timing.set_next(None);
}

fn fire(inner: &Inner, job: &Arc<ScheduledJob>, scheduled_for: DateTime<Tz>) {
    if job.stop.is_cancelled() {
        debug!(target: "tcpw.scheduler", job = %job.handle.id, %scheduled_for, "job stopped; trigger dropped");
        return;
    }
    if job
        .running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        debug!(target: "tcpw.scheduler", job = %job.handle.id, %scheduled_for, "previous execution still running; trigger dropped");
        return;
    }
    let Ok(permit) = Arc::clone(&inner.slots).try_acquire_owned() else {
        job.running.store(false, Ordering::Release);
        debug!(target: "tcpw.scheduler", job = %job.handle.id, %scheduled_for, "no free slot; trigger dropped");
        return;
    };

    let trigger = Trigger {
        job_id: job.handle.id,
        job_name: job.handle.name.clone(),
        execution: ExecutionId::new(),
        scheduled_for,
        timing: Arc::clone(&job.timing),
    };
    let job = Arc::clone(job);

    inner.runs.spawn_on(
        async move {
            let _permit = permit;
            let _running = RunningGuard(&job.running);

            job.runner.before_run(&trigger).await;
            job.timing.set_last(trigger.scheduled_for);
            job.runner.run(&trigger).await;
            job.runner.after_run(&trigger).await;
        },
        &inner.runtime,
    );
}

/// Clears the running flag even if a hook panics.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

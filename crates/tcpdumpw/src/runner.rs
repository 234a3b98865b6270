use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use tracing::debug;

use tcpw_core::{ExecutionReport, JobRegistry, JobRunner, Trigger, run_tasks};
use tcpw_model::Correlation;
use tcpw_observe::Journal;

/// Runs the registered job's capture tasks on every accepted trigger.
pub struct CaptureJobRunner {
    registry: JobRegistry,
    journal: Journal,
}

impl CaptureJobRunner {
    pub fn new(registry: JobRegistry, journal: Journal) -> Self {
        Self { registry, journal }
    }

    fn correlation(&self, trigger: &Trigger) -> Correlation {
        match self.registry.get(&trigger.job_id) {
            Some(job) => job.correlation(trigger.execution),
            None => Correlation::detached().with_execution(trigger.execution),
        }
    }
}

#[async_trait]
impl JobRunner for CaptureJobRunner {
    async fn before_run(&self, trigger: &Trigger) {
        let ctx = self.correlation(trigger);
        self.journal.info(
            &ctx,
            format!(
                "execution started ( last execution: {} )",
                fmt_time(trigger.last_run())
            ),
        );
    }

    async fn run(&self, trigger: &Trigger) {
        let Some(job) = self.registry.get(&trigger.job_id) else {
            let ctx = Correlation::detached().with_execution(trigger.execution);
            self.journal
                .error(&ctx, format!("job[id:{}] not found", trigger.job_id));
            return;
        };

        let ctx = job.correlation(trigger.execution);
        let report = run_tasks(job.scope(), &ctx, job.tasks()).await;
        journal_report(&self.journal, &ctx, &report);
    }

    async fn after_run(&self, trigger: &Trigger) {
        let ctx = self.correlation(trigger);
        self.journal.info(&ctx, "execution complete");
        self.journal.info(
            &ctx,
            format!("next execution: {}", fmt_time(trigger.next_run())),
        );
    }
}

/// Journal what went wrong during an execution; a clean run logs nothing here.
pub(crate) fn journal_report(journal: &Journal, ctx: &Correlation, report: &ExecutionReport) {
    debug!(
        target: "tcpw.lifecycle",
        execution = %ctx.label(),
        stop = report.stop.as_str(),
        finished = report.finished,
        total = report.total,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "execution finished"
    );
    for failure in &report.failures {
        journal.error(ctx, format!("task failed: {} ({})", failure.task, failure.reason));
    }
    if report.aborted > 0 {
        journal.error(
            ctx,
            format!("{} PCAP task(s) aborted after grace period", report.aborted),
        );
    }
}

pub(crate) fn fmt_time(at: Option<DateTime<Tz>>) -> String {
    match at {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S %z %Z").to_string(),
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    #[test]
    fn times_include_zone() {
        let ny: Tz = "America/New_York".parse().unwrap();
        let at = ny.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap();
        assert_eq!(fmt_time(Some(at)), "2024-03-01 07:00:00 -0500 EST");
        assert_eq!(fmt_time(None), "none");
    }
}

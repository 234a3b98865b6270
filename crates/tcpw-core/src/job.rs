use std::sync::Arc;

use tcpw_model::{Correlation, ExecutionId, JobId, JobSnapshot, Tag};

use crate::{executor::ExecutionScope, task::CaptureTask};

/// Scheduled unit wrapping a fixed set of capture tasks.
///
/// Built once after the tasks exist; every execution runs the same tasks under the same scope.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    name: String,
    tags: Vec<Tag>,
    scope: ExecutionScope,
    tasks: Arc<[CaptureTask]>,
}

impl Job {
    pub fn new(
        id: JobId,
        name: impl Into<String>,
        tags: Vec<Tag>,
        scope: ExecutionScope,
        tasks: Vec<CaptureTask>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            tags,
            scope,
            tasks: tasks.into(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn scope(&self) -> &ExecutionScope {
        &self.scope
    }

    pub fn tasks(&self) -> &[CaptureTask] {
        &self.tasks
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot::new(self.id, self.name.clone(), self.tags.clone())
    }

    /// Correlation for one execution of this job.
    pub fn correlation(&self, execution: ExecutionId) -> Correlation {
        Correlation::new(self.snapshot(), execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn correlation_carries_job_identity() {
        let id = JobId::new();
        let job = Job::new(
            id,
            "tcpdump",
            vec!["proj".into(), "svc".into()],
            ExecutionScope::new(CancellationToken::new()),
            Vec::new(),
        );
        let xid = ExecutionId::new();

        let ctx = job.correlation(xid);
        assert_eq!(ctx.job.jid, id);
        assert_eq!(ctx.job.name, "tcpdump");
        assert_eq!(ctx.job.tags, ["proj", "svc"]);
        assert_eq!(ctx.execution, xid);
        assert!(job.tasks().is_empty());
    }
}

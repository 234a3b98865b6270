use serde::{Deserialize, Serialize};

use crate::{ExecutionId, JobId, Tag};

/// Log-facing view of a job: identity, name and deployment tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub jid: JobId,
    pub name: String,
    pub tags: Vec<Tag>,
}

impl JobSnapshot {
    pub fn new(jid: JobId, name: impl Into<String>, tags: Vec<Tag>) -> Self {
        Self {
            jid,
            name: name.into(),
            tags,
        }
    }

    /// Placeholder used before any job exists.
    pub fn detached() -> Self {
        Self::default()
    }
}

/// Job and execution identity carried by every call that can log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correlation {
    pub job: JobSnapshot,
    pub execution: ExecutionId,
}

impl Correlation {
    pub fn new(job: JobSnapshot, execution: ExecutionId) -> Self {
        Self { job, execution }
    }

    /// No job and no execution: both identities are nil.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn with_execution(&self, execution: ExecutionId) -> Self {
        Self {
            job: self.job.clone(),
            execution,
        }
    }

    /// `jid/xid` label used to tag execution scopes.
    pub fn label(&self) -> String {
        format!("{}/{}", self.job.jid, self.execution)
    }
}

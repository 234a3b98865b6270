use std::sync::{Arc, PoisonError, RwLock};

use chrono::DateTime;
use chrono_tz::Tz;

use tcpw_model::{ExecutionId, JobId};

/// Last and next fire times of one job, shared between its trigger loop and its runs.
#[derive(Debug, Default)]
pub(crate) struct JobTiming {
    next: RwLock<Option<DateTime<Tz>>>,
    last: RwLock<Option<DateTime<Tz>>>,
}

impl JobTiming {
    pub(crate) fn next(&self) -> Option<DateTime<Tz>> {
        *self.next.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn last(&self) -> Option<DateTime<Tz>> {
        *self.last.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_next(&self, at: Option<DateTime<Tz>>) {
        *self.next.write().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub(crate) fn set_last(&self, at: DateTime<Tz>) {
        *self.last.write().unwrap_or_else(PoisonError::into_inner) = Some(at);
    }
}

/// One accepted fire of a scheduled job.
///
/// The execution id is minted when the trigger is accepted; dropped triggers never get one.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub job_id: JobId,
    pub job_name: String,
    pub execution: ExecutionId,
    pub scheduled_for: DateTime<Tz>,
    pub(crate) timing: Arc<JobTiming>,
}

impl Trigger {
    /// Previous execution's fire time. Inside `before_run` this is still the prior run.
    pub fn last_run(&self) -> Option<DateTime<Tz>> {
        self.timing.last()
    }

    pub fn next_run(&self) -> Option<DateTime<Tz>> {
        self.timing.next()
    }
}

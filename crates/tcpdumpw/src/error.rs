use thiserror::Error;

use tcpw_core::SchedulerError;

/// Startup conditions the sidecar cannot recover from.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("no PCAP tasks available")]
    NoTasks,
    #[error("failed to create scheduler: {0}")]
    SchedulerCreate(#[source] SchedulerError),
    #[error("failed to create scheduled job: {0}")]
    JobCreate(#[source] SchedulerError),
}

impl LifecycleError {
    /// Process exit code for this condition.
    pub fn exit_code(&self) -> i32 {
        match self {
            LifecycleError::NoTasks => 1,
            LifecycleError::SchedulerCreate(_) => 2,
            LifecycleError::JobCreate(_) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_cause() {
        assert_eq!(LifecycleError::NoTasks.exit_code(), 1);
        assert_eq!(
            LifecycleError::SchedulerCreate(SchedulerError::InvalidConcurrency).exit_code(),
            2
        );
        assert_eq!(
            LifecycleError::JobCreate(SchedulerError::InvalidJob("x".into())).exit_code(),
            3
        );
    }
}

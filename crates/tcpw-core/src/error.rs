use thiserror::Error;

use tcpw_model::JobId;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("disabled")]
    Disabled,
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("engine failed: {0}")]
    Engine(String),
    #[error("sink failed: {0}")]
    Sink(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("concurrency limit must be at least 1")]
    InvalidConcurrency,
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },
    #[error("invalid job: {0}")]
    InvalidJob(String),
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    #[error("scheduler is shut down")]
    ShutDown,
}

#[derive(Error, Debug)]
#[error("unknown time zone '{name}': {reason}")]
pub struct TimezoneError {
    pub name: String,
    pub reason: String,
}

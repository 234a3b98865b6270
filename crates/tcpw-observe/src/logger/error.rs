use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format '{0}' (text, json or journald)")]
    InvalidFormat(String),
    #[error("journald output is not available in this build")]
    JournaldUnavailable,
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
    #[error("could not install diagnostic logger: {0}")]
    Install(String),
}

use thiserror::Error;

use tcpw_core::CaptureError;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("missing program: {0}")]
    MissingProgram(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("non-zero exit code: {code}")]
    NonZeroExit { code: i32 },
    #[error("killed by signal")]
    KilledBySignal,
    #[error("sink failed: {0}")]
    Sink(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}

impl From<ExecError> for CaptureError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::MissingProgram(_) => CaptureError::Unavailable(e.to_string()),
            ExecError::InvalidConfig(msg) => CaptureError::InvalidConfig(msg),
            ExecError::Sink(msg) => CaptureError::Sink(msg),
            other => CaptureError::Engine(other.to_string()),
        }
    }
}

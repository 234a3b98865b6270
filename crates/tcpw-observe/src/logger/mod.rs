mod config;
mod error;
mod format;
mod install;

pub use config::LoggerConfig;
pub use error::LoggerError;
pub use format::LoggerFormat;

/// Install the diagnostic `tracing` subscriber.
///
/// Diagnostics go to standard error; standard output belongs to the event journal.
/// Fails if a global subscriber is already set.
pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    install::install(cfg)
}

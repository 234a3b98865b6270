use std::str::FromStr;

use crate::logger::error::LoggerError;

/// Shape of diagnostic output on standard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerFormat {
    Text,
    Json,
    /// Only when built with the `journald` feature on Linux.
    Journald,
}

impl FromStr for LoggerFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "journald" if cfg!(all(target_os = "linux", feature = "journald")) => {
                Ok(Self::Journald)
            }
            "journald" => Err(LoggerError::JournaldUnavailable),
            _ => Err(LoggerError::InvalidFormat(s.to_string())),
        }
    }
}

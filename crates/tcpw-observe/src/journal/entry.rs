use std::fmt;

use serde::Serialize;
use tcpw_model::{ExecutionId, JobId, Tag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "INFO",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        })
    }
}

/// Single-line structured record written by the [`Journal`](crate::Journal).
#[derive(Debug, Serialize)]
pub struct LogEntry<'a> {
    pub severity: Severity,
    pub message: &'a str,
    pub sidecar: &'a str,
    pub module: &'a str,
    pub job: JobView<'a>,
    /// Job tags repeated at top level for filtering.
    #[serde(skip_serializing_if = "no_tags")]
    pub tags: &'a [Tag],
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct JobView<'a> {
    pub xid: ExecutionId,
    pub jid: JobId,
    #[serde(skip_serializing_if = "no_name")]
    pub name: &'a str,
    #[serde(skip_serializing_if = "no_tags")]
    pub tags: &'a [Tag],
}

fn no_tags(tags: &&[Tag]) -> bool {
    tags.is_empty()
}

fn no_name(name: &&str) -> bool {
    name.is_empty()
}

use std::{
    io::Write,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;

use tcpw_core::{CaptureError, OutputSink};
use tcpw_model::CaptureRecord;

use super::json_line;
use crate::error::ExecError;

/// Mirrors decoded records to standard output, one flushed JSON line each.
pub struct StdoutSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::with_writer(std::io::stdout())
    }

    pub fn with_writer(w: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(w)),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputSink for StdoutSink {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn accept(&self, record: &CaptureRecord) -> Result<(), CaptureError> {
        let line = json_line(record)?;
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(&line)
            .and_then(|_| out.flush())
            .map_err(|e| ExecError::Sink(format!("stdout: {e}")))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), CaptureError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.flush()
            .map_err(|e| ExecError::Sink(format!("stdout: {e}")))?;
        Ok(())
    }
}

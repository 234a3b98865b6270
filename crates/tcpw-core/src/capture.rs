//! Capabilities the orchestrator consumes without knowing any concrete format.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use tcpw_model::{CaptureConfig, CaptureRecord};

use crate::error::CaptureError;

/// Performs packet capture on one interface.
///
/// `run` returns when `scope` is cancelled or when the engine hits a limit of its own.
/// Engines are re-runnable: a scheduled job runs the same engine once per execution.
/// Pending output must be flushed before `run` returns.
#[async_trait]
pub trait CaptureEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Capture until stopped. Raw engines own their output and ignore `sinks`.
    async fn run(
        &self,
        scope: CancellationToken,
        sinks: &[Arc<dyn OutputSink>],
    ) -> Result<(), CaptureError>;
}

/// Consumer of decoded records.
#[async_trait]
pub trait OutputSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn accept(&self, record: &CaptureRecord) -> Result<(), CaptureError>;

    /// Flush and release underlying resources. A closed sink may be reused by the next run.
    async fn close(&self) -> Result<(), CaptureError>;
}

/// Builds engines and sinks for the task factory.
pub trait CaptureBackend: Send + Sync {
    fn raw_engine(&self, cfg: &CaptureConfig) -> Result<Arc<dyn CaptureEngine>, CaptureError>;

    fn decoded_engine(&self, cfg: &CaptureConfig) -> Result<Arc<dyn CaptureEngine>, CaptureError>;

    /// Rotated file sink following `cfg.output`, `cfg.extension` and `cfg.interval`.
    fn file_sink(&self, cfg: &CaptureConfig) -> Result<Arc<dyn OutputSink>, CaptureError>;

    fn console_sink(&self) -> Result<Arc<dyn OutputSink>, CaptureError>;
}

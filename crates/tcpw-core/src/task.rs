use std::{fmt, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::{
    capture::{CaptureEngine, OutputSink},
    error::CaptureError,
};

/// One capture engine paired with the sinks consuming its records.
///
/// Immutable once built; cheap to clone.
#[derive(Clone)]
pub struct CaptureTask {
    label: Arc<str>,
    engine: Arc<dyn CaptureEngine>,
    sinks: Arc<[Arc<dyn OutputSink>]>,
}

impl CaptureTask {
    pub fn new(
        label: impl Into<String>,
        engine: Arc<dyn CaptureEngine>,
        sinks: Vec<Arc<dyn OutputSink>>,
    ) -> Self {
        Self {
            label: Arc::from(label.into()),
            engine,
            sinks: sinks.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn engine(&self) -> &Arc<dyn CaptureEngine> {
        &self.engine
    }

    pub fn sinks(&self) -> &[Arc<dyn OutputSink>] {
        &self.sinks
    }

    pub async fn run(&self, scope: CancellationToken) -> Result<(), CaptureError> {
        self.engine.run(scope, &self.sinks).await
    }
}

impl fmt::Debug for CaptureTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureTask")
            .field("label", &self.label)
            .field("engine", &self.engine.name())
            .field(
                "sinks",
                &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

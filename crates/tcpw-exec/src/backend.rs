use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono_tz::Tz;

use tcpw_core::{CaptureBackend, CaptureEngine, CaptureError, OutputSink};
use tcpw_model::{CaptureConfig, CaptureFormat};

use crate::{
    decoded::DecodedEngine,
    error::ExecError,
    sink::{RotatingFileSink, StdoutSink},
    tcpdump::{DEFAULT_STOP_GRACE, TcpdumpEngine},
    util::find_program,
};

/// Builds tcpdump engines and JSON-lines sinks.
#[derive(Debug, Clone)]
pub struct TcpdumpBackend {
    location: Tz,
    program: Option<PathBuf>,
    stop_grace: Duration,
}

impl TcpdumpBackend {
    /// `location` names rotated JSON files; tcpdump names its own files in local time.
    pub fn new(location: Tz) -> Self {
        Self {
            location,
            program: None,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    /// Use this binary instead of looking `tcpdump` up on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    fn program(&self) -> Result<PathBuf, ExecError> {
        match &self.program {
            Some(program) => find_program(&program.to_string_lossy())
                .ok_or_else(|| ExecError::MissingProgram(program.display().to_string())),
            None => find_program("tcpdump").ok_or_else(|| ExecError::MissingProgram("tcpdump".into())),
        }
    }
}

fn expect_format(cfg: &CaptureConfig, format: CaptureFormat) -> Result<(), ExecError> {
    if cfg.format != format {
        return Err(ExecError::InvalidConfig(format!(
            "expected {format} config, got {}",
            cfg.format
        )));
    }
    Ok(())
}

impl CaptureBackend for TcpdumpBackend {
    fn raw_engine(&self, cfg: &CaptureConfig) -> Result<Arc<dyn CaptureEngine>, CaptureError> {
        expect_format(cfg, CaptureFormat::Raw)?;
        let engine = TcpdumpEngine::with_program(self.program()?, cfg)?.with_stop_grace(self.stop_grace);
        Ok(Arc::new(engine))
    }

    fn decoded_engine(&self, cfg: &CaptureConfig) -> Result<Arc<dyn CaptureEngine>, CaptureError> {
        expect_format(cfg, CaptureFormat::Decoded)?;
        let engine = DecodedEngine::with_program(self.program()?, cfg)?.with_stop_grace(self.stop_grace);
        Ok(Arc::new(engine))
    }

    fn file_sink(&self, cfg: &CaptureConfig) -> Result<Arc<dyn OutputSink>, CaptureError> {
        Ok(Arc::new(RotatingFileSink::new(cfg, self.location)?))
    }

    fn console_sink(&self) -> Result<Arc<dyn OutputSink>, CaptureError> {
        Ok(Arc::new(StdoutSink::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tcpw_model::{CaptureSettings, Device};

    fn settings() -> CaptureSettings {
        CaptureSettings {
            directory: "/tmp".into(),
            ..Default::default()
        }
    }

    #[test]
    fn missing_tcpdump_is_unavailable() {
        let backend = TcpdumpBackend::new(Tz::UTC).with_program("/nonexistent/tcpdump");
        let err = backend
            .raw_engine(&settings().raw_config(&Device::new(2, "eth0")))
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "unavailable: missing program: /nonexistent/tcpdump");
    }

    #[test]
    fn builds_engines_with_an_explicit_program() {
        let backend = TcpdumpBackend::new(Tz::UTC).with_program("sh");
        let device = Device::new(2, "eth0");

        let raw = backend.raw_engine(&settings().raw_config(&device)).unwrap();
        assert_eq!(raw.name(), "tcpdump");
        let decoded = backend.decoded_engine(&settings().decoded_config(&device)).unwrap();
        assert_eq!(decoded.name(), "jsondump");
    }

    #[test]
    fn format_mismatch_is_rejected() {
        let backend = TcpdumpBackend::new(Tz::UTC).with_program("sh");
        let cfg = settings().decoded_config(&Device::new(2, "eth0"));
        assert!(matches!(
            backend.raw_engine(&cfg),
            Err(CaptureError::InvalidConfig(_))
        ));
    }

    #[test]
    fn sinks() {
        let backend = TcpdumpBackend::new(Tz::UTC);
        let cfg = settings().decoded_config(&Device::new(2, "eth0"));
        assert_eq!(backend.file_sink(&cfg).unwrap().name(), "file");
        assert_eq!(backend.console_sink().unwrap().name(), "stdout");

        let mut bad = cfg.clone();
        bad.interval = 0;
        assert!(backend.file_sink(&bad).is_err());
    }
}

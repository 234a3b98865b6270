use std::{path::PathBuf, process::Stdio, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use tcpw_core::{CaptureEngine, CaptureError, OutputSink};
use tcpw_model::CaptureConfig;

use crate::{
    error::ExecError,
    util::{cmd_program, find_program, forward_stderr, stop_graceful},
};

pub(crate) const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

/// Raw capture: tcpdump writes and rotates the output files itself.
#[derive(Debug, Clone)]
pub struct TcpdumpEngine {
    program: PathBuf,
    args: Vec<String>,
    label: String,
    stop_grace: Duration,
}

impl TcpdumpEngine {
    /// Engine running the `tcpdump` found on `PATH`.
    pub fn new(cfg: &CaptureConfig) -> Result<Self, ExecError> {
        let program =
            find_program("tcpdump").ok_or_else(|| ExecError::MissingProgram("tcpdump".into()))?;
        Self::with_program(program, cfg)
    }

    pub fn with_program(program: impl Into<PathBuf>, cfg: &CaptureConfig) -> Result<Self, ExecError> {
        if cfg.iface.is_empty() {
            return Err(ExecError::InvalidConfig("interface name is empty".into()));
        }
        if cfg.interval == 0 {
            return Err(ExecError::InvalidConfig("rotation interval must be positive".into()));
        }
        Ok(Self {
            program: program.into(),
            args: raw_args(cfg),
            label: cfg.iface_label(),
            stop_grace: DEFAULT_STOP_GRACE,
        })
    }

    /// How long tcpdump gets to flush after SIGTERM before it is killed.
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[cfg(test)]
    pub(crate) fn from_parts(program: PathBuf, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            label: "test".into(),
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }
}

#[async_trait]
impl CaptureEngine for TcpdumpEngine {
    fn name(&self) -> &'static str {
        "tcpdump"
    }

    async fn run(
        &self,
        scope: CancellationToken,
        _sinks: &[Arc<dyn OutputSink>],
    ) -> Result<(), CaptureError> {
        if scope.is_cancelled() {
            return Ok(());
        }
        trace!(target: "tcpw.exec.tcpdump", program = %self.program.display(), args = ?self.args, "spawn");

        let mut cmd = cmd_program(&self.program, &self.args);
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| ExecError::Spawn(format!("{}: {e}", self.program.display())))?;
        let stderr = child
            .stderr
            .take()
            .map(|err| forward_stderr(err, self.label.clone()));

        let res = tokio::select! {
            status = child.wait() => {
                let status = status.map_err(ExecError::from)?;
                debug!(target: "tcpw.exec.tcpdump", iface = %self.label, ?status, "tcpdump exited");
                exit_result(status)
            }
            _ = scope.cancelled() => {
                debug!(target: "tcpw.exec.tcpdump", iface = %self.label, "cancelled; stopping tcpdump");
                stop_graceful(&mut child, self.stop_grace).await.map_err(ExecError::from)?;
                Ok(())
            }
        };

        if let Some(stderr) = stderr {
            let _ = stderr.await;
        }
        res.map_err(CaptureError::from)
    }
}

pub(crate) fn exit_result(status: std::process::ExitStatus) -> Result<(), ExecError> {
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(ExecError::NonZeroExit { code }),
        None => Err(ExecError::KilledBySignal),
    }
}

/// `tcpdump -i IFACE -n -U -s SNAPLEN -G INTERVAL -w OUTPUT.EXT [-p] [FILTER]`
pub(crate) fn raw_args(cfg: &CaptureConfig) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        cfg.iface.clone(),
        "-n".to_string(),
        "-U".to_string(),
        "-s".to_string(),
        cfg.snaplen.to_string(),
        "-G".to_string(),
        cfg.interval.to_string(),
        "-w".to_string(),
        format!("{}.{}", cfg.output, cfg.extension),
    ];
    push_common(&mut args, cfg);
    args
}

pub(crate) fn push_common(args: &mut Vec<String>, cfg: &CaptureConfig) {
    if !cfg.promisc {
        args.push("-p".to_string());
    }
    let filter = cfg.filter.trim();
    if !filter.is_empty() {
        args.push(filter.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Instant;

    use tcpw_model::{CaptureSettings, Device};

    fn config() -> CaptureConfig {
        let settings = CaptureSettings {
            directory: "/pcap".into(),
            filter: "tcp port 443".into(),
            snaplen: 96,
            ..Default::default()
        };
        settings.raw_config(&Device::new(2, "eth0"))
    }

    #[test]
    fn builds_rotating_write_command() {
        let engine = TcpdumpEngine::with_program("/usr/sbin/tcpdump", &config()).unwrap();
        assert_eq!(
            engine.args(),
            [
                "-i",
                "eth0",
                "-n",
                "-U",
                "-s",
                "96",
                "-G",
                "60",
                "-w",
                "/pcap/part__2_eth0__%Y%m%d_%H%M%S.pcap",
                "tcp port 443"
            ]
        );
    }

    #[test]
    fn non_promiscuous_adds_flag_and_no_filter_adds_nothing() {
        let mut cfg = config();
        cfg.promisc = false;
        cfg.filter = "  ".into();
        let args = raw_args(&cfg);
        assert_eq!(args.last().map(String::as_str), Some("-p"));
    }

    #[test]
    fn rejects_unusable_config() {
        let mut cfg = config();
        cfg.iface.clear();
        assert!(matches!(
            TcpdumpEngine::with_program("tcpdump", &cfg),
            Err(ExecError::InvalidConfig(_))
        ));

        let mut cfg = config();
        cfg.interval = 0;
        assert!(TcpdumpEngine::with_program("tcpdump", &cfg).is_err());
    }

    #[tokio::test]
    async fn cancellation_stops_the_child() {
        let sleep = find_program("sleep").unwrap();
        let engine = TcpdumpEngine::from_parts(sleep, vec!["30".into()]);
        let scope = CancellationToken::new();

        let stopper = scope.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            stopper.cancel();
        });

        let started = Instant::now();
        engine.run(scope, &[]).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_engine_error() {
        let sh = find_program("sh").unwrap();
        let engine = TcpdumpEngine::from_parts(sh, vec!["-c".into(), "exit 3".into()]);

        let err = engine.run(CancellationToken::new(), &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "engine failed: non-zero exit code: 3");
    }

    #[tokio::test]
    async fn missing_binary_fails_to_spawn() {
        let engine = TcpdumpEngine::from_parts("/nonexistent/tcpdump".into(), Vec::new());
        let err = engine.run(CancellationToken::new(), &[]).await.unwrap_err();
        assert!(matches!(err, CaptureError::Engine(msg) if msg.starts_with("spawn failed")));
    }
}

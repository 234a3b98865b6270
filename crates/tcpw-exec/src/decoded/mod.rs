//! Decoded capture: tcpdump prints one line per packet, each line becomes a record.

mod parse;
pub use parse::parse_line;

use std::{path::PathBuf, process::Stdio, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use tcpw_core::{CaptureEngine, CaptureError, OutputSink};
use tcpw_model::{CaptureConfig, CaptureRecord};

use crate::{
    error::ExecError,
    tcpdump::{DEFAULT_STOP_GRACE, exit_result, push_common},
    util::{cmd_program, find_program, forward_stderr, stop_graceful},
};

/// Per-sink backlog in unordered mode; records beyond it are dropped for that sink.
const SINK_BACKLOG: usize = 1024;

pub struct DecodedEngine {
    program: PathBuf,
    args: Vec<String>,
    cfg: CaptureConfig,
    stop_grace: Duration,
}

impl DecodedEngine {
    pub fn new(cfg: &CaptureConfig) -> Result<Self, ExecError> {
        let program =
            find_program("tcpdump").ok_or_else(|| ExecError::MissingProgram("tcpdump".into()))?;
        Self::with_program(program, cfg)
    }

    pub fn with_program(program: impl Into<PathBuf>, cfg: &CaptureConfig) -> Result<Self, ExecError> {
        if cfg.iface.is_empty() {
            return Err(ExecError::InvalidConfig("interface name is empty".into()));
        }
        Ok(Self {
            program: program.into(),
            args: decoded_args(cfg),
            cfg: cfg.clone(),
            stop_grace: DEFAULT_STOP_GRACE,
        })
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[cfg(test)]
    pub(crate) fn from_parts(program: PathBuf, args: Vec<String>, cfg: CaptureConfig) -> Self {
        Self {
            program,
            args,
            cfg,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }
}

#[async_trait]
impl CaptureEngine for DecodedEngine {
    fn name(&self) -> &'static str {
        "jsondump"
    }

    async fn run(
        &self,
        scope: CancellationToken,
        sinks: &[Arc<dyn OutputSink>],
    ) -> Result<(), CaptureError> {
        if scope.is_cancelled() {
            return Ok(());
        }
        let label = self.cfg.iface_label();
        trace!(target: "tcpw.exec.decoded", program = %self.program.display(), args = ?self.args, "spawn");

        let mut cmd = cmd_program(&self.program, &self.args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| ExecError::Spawn(format!("{}: {e}", self.program.display())))?;
        let stderr = child
            .stderr
            .take()
            .map(|err| forward_stderr(err, label.clone()));
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecError::Spawn("stdout not captured".into()))?;

        let mut delivery = Delivery::new(sinks, self.cfg.ordered);
        let mut lines = BufReader::new(stdout).lines();
        let mut records = 0u64;

        let res: Result<(), ExecError> = loop {
            tokio::select! {
                _ = scope.cancelled() => {
                    debug!(target: "tcpw.exec.decoded", iface = %label, records, "cancelled; stopping tcpdump");
                    stop_graceful(&mut child, self.stop_grace).await?;
                    break Ok(());
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(record) = parse_line(&line, &self.cfg) {
                            records += 1;
                            delivery.deliver(record).await;
                        }
                    }
                    Ok(None) => {
                        let status = child.wait().await?;
                        debug!(target: "tcpw.exec.decoded", iface = %label, records, ?status, "tcpdump exited");
                        break exit_result(status);
                    }
                    Err(e) => {
                        warn!(target: "tcpw.exec.decoded", iface = %label, error = %e, "reading tcpdump output failed");
                        stop_graceful(&mut child, self.stop_grace).await?;
                        break Err(e.into());
                    }
                },
            }
        };

        // Records already read are still delivered; the output pipe is drained after stop.
        if scope.is_cancelled() {
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(record) = parse_line(&line, &self.cfg) {
                    delivery.deliver(record).await;
                }
            }
        }

        delivery.finish().await;
        close_all(sinks, &label).await;
        if let Some(stderr) = stderr {
            let _ = stderr.await;
        }
        res.map_err(CaptureError::from)
    }
}

/// `tcpdump -i IFACE -n -l -tt -e -s SNAPLEN [-p] [FILTER]`
fn decoded_args(cfg: &CaptureConfig) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        cfg.iface.clone(),
        "-n".to_string(),
        "-l".to_string(),
        "-tt".to_string(),
        "-e".to_string(),
        "-s".to_string(),
        cfg.snaplen.to_string(),
    ];
    push_common(&mut args, cfg);
    args
}

/// Hands records to sinks: inline and in order, or through one queue per sink.
enum Delivery<'a> {
    Ordered(&'a [Arc<dyn OutputSink>]),
    Unordered {
        queues: Vec<(&'static str, mpsc::Sender<CaptureRecord>)>,
        workers: JoinSet<()>,
        dropped: u64,
    },
}

impl<'a> Delivery<'a> {
    fn new(sinks: &'a [Arc<dyn OutputSink>], ordered: bool) -> Self {
        if ordered || sinks.len() < 2 {
            return Delivery::Ordered(sinks);
        }

        let mut queues = Vec::with_capacity(sinks.len());
        let mut workers = JoinSet::new();
        for sink in sinks {
            let (tx, mut rx) = mpsc::channel::<CaptureRecord>(SINK_BACKLOG);
            let sink = Arc::clone(sink);
            queues.push((sink.name(), tx));
            workers.spawn(async move {
                while let Some(record) = rx.recv().await {
                    if let Err(e) = sink.accept(&record).await {
                        warn!(target: "tcpw.exec.sink", sink = sink.name(), error = %e, "record rejected");
                    }
                }
            });
        }
        Delivery::Unordered {
            queues,
            workers,
            dropped: 0,
        }
    }

    async fn deliver(&mut self, record: CaptureRecord) {
        match self {
            Delivery::Ordered(sinks) => {
                for sink in sinks.iter() {
                    if let Err(e) = sink.accept(&record).await {
                        warn!(target: "tcpw.exec.sink", sink = sink.name(), error = %e, "record rejected");
                    }
                }
            }
            Delivery::Unordered { queues, dropped, .. } => {
                for (name, tx) in queues.iter() {
                    if tx.try_send(record.clone()).is_err() {
                        *dropped += 1;
                        trace!(target: "tcpw.exec.sink", sink = *name, "sink lagging; record dropped");
                    }
                }
            }
        }
    }

    /// Wait until every queued record reached its sink.
    async fn finish(self) {
        if let Delivery::Unordered {
            queues,
            mut workers,
            dropped,
        } = self
        {
            drop(queues);
            while workers.join_next().await.is_some() {}
            if dropped > 0 {
                warn!(target: "tcpw.exec.sink", dropped, "records dropped by lagging sinks");
            }
        }
    }
}

async fn close_all(sinks: &[Arc<dyn OutputSink>], label: &str) {
    for sink in sinks {
        if let Err(e) = sink.close().await {
            warn!(target: "tcpw.exec.sink", iface = %label, sink = sink.name(), error = %e, "closing sink failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use tcpw_model::{CaptureSettings, Device};

    #[derive(Default)]
    struct Collect {
        records: Mutex<Vec<CaptureRecord>>,
        closed: Mutex<usize>,
    }

    #[async_trait]
    impl OutputSink for Collect {
        fn name(&self) -> &'static str {
            "collect"
        }
        async fn accept(&self, record: &CaptureRecord) -> Result<(), CaptureError> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
        async fn close(&self) -> Result<(), CaptureError> {
            *self.closed.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn cfg(ordered: bool) -> CaptureConfig {
        let settings = CaptureSettings {
            ordered,
            snaplen: 128,
            filter: "udp".into(),
            ..Default::default()
        };
        settings.decoded_config(&Device::new(3, "eth1"))
    }

    fn printing(script: &str, cfg: CaptureConfig) -> DecodedEngine {
        let sh = find_program("sh").unwrap();
        DecodedEngine::from_parts(sh, vec!["-c".into(), script.into()], cfg)
    }

    const SCRIPT: &str = "echo '1700000000.000001 aa > bb, ethertype IPv4 (0x0800), length 60: x'; \
                          echo 'tcpdump: listening'; \
                          echo '1700000000.000002 aa > bb, ethertype IPv4 (0x0800), length 61: y'";

    #[test]
    fn builds_line_buffered_decode_command() {
        let engine = DecodedEngine::with_program("/usr/sbin/tcpdump", &cfg(false)).unwrap();
        assert_eq!(
            engine.args(),
            ["-i", "eth1", "-n", "-l", "-tt", "-e", "-s", "128", "udp"]
        );
    }

    #[tokio::test]
    async fn ordered_delivery_reaches_every_sink_in_order() {
        let a = Arc::new(Collect::default());
        let b = Arc::new(Collect::default());
        let sinks: Vec<Arc<dyn OutputSink>> = vec![a.clone(), b.clone()];

        printing(SCRIPT, cfg(true))
            .run(CancellationToken::new(), &sinks)
            .await
            .unwrap();

        for sink in [&a, &b] {
            let records = sink.records.lock().unwrap();
            let lengths: Vec<_> = records.iter().map(|r| r.length).collect();
            assert_eq!(lengths, [Some(60), Some(61)]);
            assert_eq!(records[0].iface, "eth1");
            assert_eq!(*sink.closed.lock().unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn unordered_delivery_drains_queues_before_returning() {
        let a = Arc::new(Collect::default());
        let b = Arc::new(Collect::default());
        let sinks: Vec<Arc<dyn OutputSink>> = vec![a.clone(), b.clone()];

        printing(SCRIPT, cfg(false))
            .run(CancellationToken::new(), &sinks)
            .await
            .unwrap();

        assert_eq!(a.records.lock().unwrap().len(), 2);
        assert_eq!(b.records.lock().unwrap().len(), 2);
        assert_eq!(*b.closed.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn cancellation_closes_sinks() {
        let sink = Arc::new(Collect::default());
        let sinks: Vec<Arc<dyn OutputSink>> = vec![sink.clone()];
        let engine = printing(
            "echo '1700000000.000001 aa > bb, length 60: x'; exec sleep 30",
            cfg(true),
        );

        let scope = CancellationToken::new();
        let stopper = scope.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            stopper.cancel();
        });

        engine.run(scope, &sinks).await.unwrap();
        assert_eq!(sink.records.lock().unwrap().len(), 1);
        assert_eq!(*sink.closed.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn failing_child_still_closes_sinks() {
        let sink = Arc::new(Collect::default());
        let sinks: Vec<Arc<dyn OutputSink>> = vec![sink.clone()];

        let err = printing("exit 1", cfg(true))
            .run(CancellationToken::new(), &sinks)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "engine failed: non-zero exit code: 1");
        assert_eq!(*sink.closed.lock().unwrap(), 1);
    }
}

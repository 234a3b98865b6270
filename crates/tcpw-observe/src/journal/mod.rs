//! Correlated event journal.
//!
//! Every operator-visible event of the sidecar is written here as one JSON object per
//! line, stamped with the deployment identity and the job/execution it belongs to.
//! The caller passes the [`Correlation`] explicitly; nothing is read from globals.

mod entry;
mod identity;

pub use entry::{JobView, LogEntry, Severity};
pub use identity::Identity;

use std::{
    io::Write,
    sync::{Arc, Mutex, PoisonError},
};

use tcpw_model::Correlation;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

#[derive(Clone)]
pub struct Journal {
    inner: Arc<JournalInner>,
}

struct JournalInner {
    identity: Identity,
    out: Mutex<Box<dyn Write + Send>>,
}

impl Journal {
    /// Journal writing to standard output.
    pub fn stdout(identity: Identity) -> Self {
        Self::with_writer(identity, std::io::stdout())
    }

    pub fn with_writer<W>(identity: Identity, writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            inner: Arc::new(JournalInner {
                identity,
                out: Mutex::new(Box::new(writer)),
            }),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    #[inline]
    pub fn info(&self, ctx: &Correlation, message: impl AsRef<str>) {
        self.emit(Severity::Info, ctx, message.as_ref());
    }

    #[inline]
    pub fn error(&self, ctx: &Correlation, message: impl AsRef<str>) {
        self.emit(Severity::Error, ctx, message.as_ref());
    }

    #[inline]
    pub fn fatal(&self, ctx: &Correlation, message: impl AsRef<str>) {
        self.emit(Severity::Fatal, ctx, message.as_ref());
    }

    pub fn emit(&self, severity: Severity, ctx: &Correlation, message: &str) {
        let line = match self.render(severity, ctx, message) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(target: "tcpw.journal", error = %e, "failed to serialize journal entry");
                return;
            }
        };

        let mut out = self.inner.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = out.write_all(&line).and_then(|_| out.flush()) {
            tracing::error!(target: "tcpw.journal", error = %e, "failed to write journal entry");
        }
    }

    fn render(
        &self,
        severity: Severity,
        ctx: &Correlation,
        message: &str,
    ) -> Result<Vec<u8>, serde_json::Error> {
        let tags = ctx.job.tags.as_slice();
        let entry = LogEntry {
            severity,
            message,
            sidecar: &self.inner.identity.sidecar,
            module: &self.inner.identity.module,
            job: JobView {
                xid: ctx.execution,
                jid: ctx.job.jid,
                name: &ctx.job.name,
                tags,
            },
            tags,
            timestamp: now_rfc3339(),
        };

        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        Ok(line)
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcpw_model::{ExecutionId, JobId, JobSnapshot};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn lines(&self) -> Vec<serde_json::Value> {
            let raw = self.0.lock().unwrap().clone();
            String::from_utf8(raw)
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    fn journal() -> (Journal, Buffer) {
        let buf = Buffer::default();
        let journal = Journal::with_writer(Identity::new("pcap-sidecar", "tcpdumpw"), buf.clone());
        (journal, buf)
    }

    #[test]
    fn detached_entry_carries_nil_placeholders() {
        let (journal, buf) = journal();
        journal.info(&Correlation::detached(), "configuring PCAP for iface: 2/eth0");

        let lines = buf.lines();
        assert_eq!(lines.len(), 1);
        let e = &lines[0];
        assert_eq!(e["severity"], "INFO");
        assert_eq!(e["message"], "configuring PCAP for iface: 2/eth0");
        assert_eq!(e["sidecar"], "pcap-sidecar");
        assert_eq!(e["module"], "tcpdumpw");
        assert_eq!(e["job"]["jid"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(e["job"]["xid"], "00000000-0000-0000-0000-000000000000");
        assert!(e["job"].get("name").is_none());
        assert!(e.get("tags").is_none());
        assert!(e["timestamp"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[test]
    fn job_entry_duplicates_tags_at_top_level() {
        let (journal, buf) = journal();
        let jid = JobId::new();
        let xid = ExecutionId::new();
        let job = JobSnapshot::new(jid, "tcpdump", vec!["project".into(), "us-east1".into()]);
        journal.error(&Correlation::new(job, xid), "boom");

        let e = &buf.lines()[0];
        assert_eq!(e["severity"], "ERROR");
        assert_eq!(e["job"]["jid"], jid.to_string());
        assert_eq!(e["job"]["xid"], xid.to_string());
        assert_eq!(e["job"]["name"], "tcpdump");
        assert_eq!(e["tags"], serde_json::json!(["project", "us-east1"]));
        assert_eq!(e["job"]["tags"], e["tags"]);
    }

    #[test]
    fn entries_are_single_lines() {
        let (journal, buf) = journal();
        journal.fatal(&Correlation::detached(), "line one\nline two");
        journal.info(&Correlation::detached(), "next");

        let raw = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert_eq!(buf.lines()[0]["severity"], "FATAL");
    }
}

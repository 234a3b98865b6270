use std::{fmt::Write as _, path::PathBuf};

use async_trait::async_trait;
use chrono::{
    DateTime, Utc,
    format::{Item, StrftimeItems},
};
use chrono_tz::Tz;
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::Mutex,
};
use tracing::debug;

use tcpw_core::{CaptureError, OutputSink};
use tcpw_model::{CaptureConfig, CaptureRecord};

use super::json_line;
use crate::error::ExecError;

/// JSON-lines file rotated on fixed windows.
///
/// Windows are aligned to multiples of the interval since the epoch; a file is named by
/// formatting the output template at the window start in the configured zone.
pub struct RotatingFileSink {
    template: String,
    extension: String,
    interval: i64,
    location: Tz,
    current: Mutex<Option<Segment>>,
}

struct Segment {
    window: i64,
    path: PathBuf,
    out: BufWriter<File>,
}

impl RotatingFileSink {
    pub fn new(cfg: &CaptureConfig, location: Tz) -> Result<Self, ExecError> {
        if cfg.interval == 0 {
            return Err(ExecError::InvalidConfig("rotation interval must be positive".into()));
        }
        if cfg.output.is_empty() {
            return Err(ExecError::InvalidConfig("output template is empty".into()));
        }
        if StrftimeItems::new(&cfg.output).any(|item| matches!(item, Item::Error)) {
            return Err(ExecError::InvalidConfig(format!(
                "invalid output template: {}",
                cfg.output
            )));
        }
        Ok(Self {
            template: cfg.output.clone(),
            extension: cfg.extension.clone(),
            interval: i64::from(cfg.interval),
            location,
            current: Mutex::new(None),
        })
    }

    /// Path of the file covering `at`.
    pub fn path_at(&self, at: DateTime<Utc>) -> PathBuf {
        self.path_for(self.window_of(at))
    }

    fn window_of(&self, at: DateTime<Utc>) -> i64 {
        let secs = at.timestamp();
        secs - secs.rem_euclid(self.interval)
    }

    fn path_for(&self, window: i64) -> PathBuf {
        let start = DateTime::from_timestamp(window, 0)
            .unwrap_or_default()
            .with_timezone(&self.location);
        let mut name = String::new();
        // Template was validated on construction.
        let _ = write!(name, "{}", start.format(&self.template));
        if !self.extension.is_empty() {
            name.push('.');
            name.push_str(&self.extension);
        }
        PathBuf::from(name)
    }

    pub(crate) async fn accept_at(
        &self,
        record: &CaptureRecord,
        at: DateTime<Utc>,
    ) -> Result<(), ExecError> {
        let line = json_line(record)?;
        let window = self.window_of(at);

        let mut current = self.current.lock().await;
        if current.as_ref().is_none_or(|seg| seg.window != window) {
            if let Some(mut old) = current.take() {
                old.out.flush().await?;
                debug!(target: "tcpw.exec.sink", path = %old.path.display(), "rotated");
            }
            *current = Some(self.open(window).await?);
        }

        if let Some(seg) = current.as_mut() {
            seg.out.write_all(&line).await?;
        }
        Ok(())
    }

    async fn open(&self, window: i64) -> Result<Segment, ExecError> {
        let path = self.path_for(window);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ExecError::Sink(format!("{}: {e}", path.display())))?;
        debug!(target: "tcpw.exec.sink", path = %path.display(), "opened");
        Ok(Segment {
            window,
            path,
            out: BufWriter::new(file),
        })
    }
}

#[async_trait]
impl OutputSink for RotatingFileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn accept(&self, record: &CaptureRecord) -> Result<(), CaptureError> {
        self.accept_at(record, Utc::now()).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), CaptureError> {
        let mut current = self.current.lock().await;
        if let Some(mut seg) = current.take() {
            seg.out.flush().await.map_err(ExecError::from)?;
            debug!(target: "tcpw.exec.sink", path = %seg.path.display(), "closed");
        }
        Ok(())
    }
}

//! Builds capture tasks for the selected devices.
//!
//! Every interface, format and sink is set up independently: a failure is journalled
//! and skipped, and only an empty overall result is a problem for the caller.

use std::sync::Arc;

use tcpw_model::{CaptureSettings, Correlation, Device};
use tcpw_observe::Journal;
use tracing::debug;

use crate::{
    capture::{CaptureBackend, OutputSink},
    error::CaptureError,
    task::CaptureTask,
};

pub struct TaskFactory<'a> {
    backend: &'a dyn CaptureBackend,
    settings: &'a CaptureSettings,
    journal: &'a Journal,
}

impl<'a> TaskFactory<'a> {
    pub fn new(
        backend: &'a dyn CaptureBackend,
        settings: &'a CaptureSettings,
        journal: &'a Journal,
    ) -> Self {
        Self {
            backend,
            settings,
            journal,
        }
    }

    /// Flat list of every task that could be constructed, in device order.
    pub fn build(&self, devices: &[Device]) -> Vec<CaptureTask> {
        let ctx = Correlation::detached();
        let mut tasks = Vec::with_capacity(devices.len() * 2);

        for device in devices {
            self.journal
                .info(&ctx, format!("configuring PCAP for iface: {device}"));

            if let Some(task) = self.raw_task(&ctx, device) {
                tasks.push(task);
            }

            if !self.settings.wants_decoded() {
                continue;
            }
            if let Some(task) = self.decoded_task(&ctx, device) {
                tasks.push(task);
            }
        }

        debug!(target: "tcpw.factory", devices = devices.len(), tasks = tasks.len(), "tasks built");
        tasks
    }

    fn raw_task(&self, ctx: &Correlation, device: &Device) -> Option<CaptureTask> {
        let cfg = self.settings.raw_config(device);
        let engine = if self.settings.raw {
            self.backend.raw_engine(&cfg)
        } else {
            Err(CaptureError::Disabled)
        };

        match engine {
            Ok(engine) => {
                self.journal
                    .info(ctx, format!("configured 'tcpdump' for iface: {device}"));
                Some(CaptureTask::new(format!("tcpdump@{device}"), engine, Vec::new()))
            }
            Err(e) => {
                self.journal
                    .error(ctx, format!("tcpdump task creation failed: {device} ({e})"));
                None
            }
        }
    }

    fn decoded_task(&self, ctx: &Correlation, device: &Device) -> Option<CaptureTask> {
        let cfg = self.settings.decoded_config(device);

        let engine = match self.backend.decoded_engine(&cfg) {
            Ok(engine) => engine,
            Err(e) => {
                self.journal
                    .error(ctx, format!("jsondump task creation failed: {device} ({e})"));
                return None;
            }
        };

        let mut sinks: Vec<Arc<dyn OutputSink>> = Vec::new();

        if self.settings.decoded {
            match self.backend.file_sink(&cfg) {
                Ok(sink) => sinks.push(sink),
                Err(e) => self.journal.error(
                    ctx,
                    format!("jsondump file writer creation failed: {device} ({e})"),
                ),
            }
        }

        if self.settings.console {
            match self.backend.console_sink() {
                Ok(sink) => sinks.push(sink),
                Err(e) => {
                    self.journal.error(
                        ctx,
                        format!("jsondump stdout writer creation failed: {device} ({e})"),
                    );
                    return None;
                }
            }
        }

        if sinks.is_empty() {
            self.journal
                .error(ctx, format!("jsondump task has no writers: {device}"));
            return None;
        }

        self.journal
            .info(ctx, format!("configured 'jsondump' for iface: {device}"));
        Some(CaptureTask::new(format!("jsondump@{device}"), engine, sinks))
    }
}

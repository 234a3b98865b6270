use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Device;

/// Rotation-timestamp placeholder appended to every output path.
const ROTATION_PATTERN: &str = "%Y%m%d_%H%M%S";

/// Output format produced by a capture engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureFormat {
    /// Raw packets written by the engine itself to rotated files.
    #[serde(rename = "pcap")]
    Raw,
    /// Decoded records handed to output sinks.
    #[serde(rename = "json")]
    Decoded,
}

impl CaptureFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureFormat::Raw => "pcap",
            CaptureFormat::Decoded => "json",
        }
    }
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of one capture unit on one interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Interface name (e.g. `eth0`).
    pub iface: String,
    /// Interface index as resolved on the host.
    pub index: u32,
    /// Put the interface into promiscuous mode.
    pub promisc: bool,
    /// Bytes captured per packet; `0` leaves the engine default.
    pub snaplen: u32,
    pub format: CaptureFormat,
    /// Output path without extension; may contain strftime placeholders.
    pub output: String,
    pub extension: String,
    /// BPF filter expression; empty captures everything.
    pub filter: String,
    /// Seconds after which output is rotated.
    pub interval: u32,
    /// Decoded output keeps the order in which the engine produced records.
    pub ordered: bool,
}

impl CaptureConfig {
    /// `index/name` label used in log messages.
    pub fn iface_label(&self) -> String {
        format!("{}/{}", self.index, self.iface)
    }
}

/// Process-wide capture settings from which per-interface configs are derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    pub directory: String,
    pub extension: String,
    pub filter: String,
    pub snaplen: u32,
    pub interval: u32,
    pub promisc: bool,
    /// Raw capture written by the engine.
    pub raw: bool,
    /// Decoded capture persisted to rotated files.
    pub decoded: bool,
    /// Decoded capture mirrored to standard output.
    pub console: bool,
    pub ordered: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            directory: String::new(),
            extension: "pcap".to_string(),
            filter: String::new(),
            snaplen: 0,
            interval: 60,
            promisc: true,
            raw: true,
            decoded: false,
            console: false,
            ordered: false,
        }
    }
}

impl CaptureSettings {
    /// Output path template for a device: directory, index, name and rotation timestamp.
    pub fn output_template(&self, device: &Device) -> String {
        format!(
            "{}/part__{}_{}__{}",
            self.directory, device.index, device.name, ROTATION_PATTERN
        )
    }

    /// Decoded capture is only worth setting up when some sink would consume it.
    pub fn wants_decoded(&self) -> bool {
        self.decoded || self.console
    }

    pub fn raw_config(&self, device: &Device) -> CaptureConfig {
        self.config_for(device, CaptureFormat::Raw, self.extension.clone())
    }

    pub fn decoded_config(&self, device: &Device) -> CaptureConfig {
        let mut cfg = self.config_for(device, CaptureFormat::Decoded, "json".to_string());
        cfg.ordered = self.ordered;
        cfg
    }

    fn config_for(&self, device: &Device, format: CaptureFormat, extension: String) -> CaptureConfig {
        CaptureConfig {
            iface: device.name.clone(),
            index: device.index,
            promisc: self.promisc,
            snaplen: self.snaplen,
            format,
            output: self.output_template(device),
            extension,
            filter: self.filter.clone(),
            interval: self.interval,
            ordered: false,
        }
    }
}

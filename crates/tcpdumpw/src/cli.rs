use std::time::Duration;

use clap::{ArgAction, Parser};

use tcpw_model::{CaptureSettings, Tag};
use tcpw_observe::{LoggerConfig, LoggerError};

use crate::config::RunConfig;

/// Packet capture sidecar running tcpdump on matching interfaces.
#[derive(Parser, Debug, Clone)]
#[command(name = "tcpdumpw", version)]
pub struct Cli {
    #[arg(long = "use_cron", env = "PCAP_USE_CRON", num_args = 0..=1, default_value_t = false, default_missing_value = "true", action = ArgAction::Set, help = "Perform packet capture at specific intervals")]
    pub use_cron: bool,

    #[arg(long = "cron_exp", env = "PCAP_CRON_EXP", default_value = "", help = "Cron expression, seconds first; i.e. '0 */5 * * * *'")]
    pub cron_exp: String,

    #[arg(long, env = "PCAP_TIMEZONE", default_value = "UTC", help = "Time zone used to schedule packet captures")]
    pub timezone: String,

    #[arg(long, env = "PCAP_TIMEOUT", default_value_t = 0, help = "Stop each capture after this many seconds (0 = unbounded)")]
    pub timeout: u64,

    #[arg(long, env = "PCAP_INTERVAL", default_value_t = 60, help = "Seconds after which capture files are rotated")]
    pub interval: u32,

    #[arg(long, env = "PCAP_SNAPLEN", default_value_t = 0, help = "Bytes captured from each packet")]
    pub snaplen: u32,

    #[arg(long, env = "PCAP_FILTER", default_value = "", help = "BPF filter used for capturing packets")]
    pub filter: String,

    #[arg(long, env = "PCAP_EXT", default_value = "pcap", help = "Extension of raw capture files")]
    pub extension: String,

    #[arg(long, env = "PCAP_DIR", default_value = "", help = "Directory where capture files are stored")]
    pub directory: String,

    #[arg(long, env = "PCAP_TCPDUMP", num_args = 0..=1, default_value_t = true, default_missing_value = "true", action = ArgAction::Set, help = "Enable raw capture")]
    pub tcpdump: bool,

    #[arg(long, env = "PCAP_JSONDUMP", num_args = 0..=1, default_value_t = false, default_missing_value = "true", action = ArgAction::Set, help = "Enable decoded capture written to JSON files")]
    pub jsondump: bool,

    #[arg(long, env = "PCAP_JSONLOG", num_args = 0..=1, default_value_t = false, default_missing_value = "true", action = ArgAction::Set, help = "Mirror decoded capture to standard output")]
    pub jsonlog: bool,

    #[arg(long, env = "PCAP_ORDERED", num_args = 0..=1, default_value_t = false, default_missing_value = "true", action = ArgAction::Set, help = "Write decoded records in capture order")]
    pub ordered: bool,

    #[arg(long, env = "PCAP_IFACE", default_value = "", help = "Interface name prefix; numbered interfaces with this prefix are captured")]
    pub iface: String,

    #[arg(long, env = "PCAP_GRACE", default_value_t = 30, help = "Seconds to wait for captures to stop before aborting them (0 = wait)")]
    pub grace: u64,

    #[arg(long = "log_level", env = "PCAP_LOG_LEVEL", default_value = "warn", help = "Diagnostic log filter")]
    pub log_level: String,

    #[arg(long = "log_format", env = "PCAP_LOG_FORMAT", default_value = "json", help = "Diagnostic log format: text, json or journald")]
    pub log_format: String,
}

impl Cli {
    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            directory: self.directory.clone(),
            extension: self.extension.clone(),
            filter: self.filter.clone(),
            snaplen: self.snaplen,
            interval: self.interval,
            raw: self.tcpdump,
            decoded: self.jsondump,
            console: self.jsonlog,
            ordered: self.ordered,
            ..Default::default()
        }
    }

    pub fn run_config(&self, tags: Vec<Tag>) -> RunConfig {
        RunConfig {
            use_cron: self.use_cron,
            cron_exp: self.cron_exp.clone(),
            timezone: self.timezone.clone(),
            timeout: Duration::from_secs(self.timeout),
            grace: Duration::from_secs(self.grace),
            iface: self.iface.clone(),
            capture: self.capture_settings(),
            tags,
        }
    }

    pub fn logger_config(&self) -> Result<LoggerConfig, LoggerError> {
        Ok(LoggerConfig {
            format: self.log_format.parse()?,
            level: self.log_level.clone(),
            ..Default::default()
        })
    }
}

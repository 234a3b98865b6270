use std::time::Duration;

use tcpw_model::{CaptureSettings, Tag};

/// Environment variables whose values tag the scheduled job, in order.
const TAG_VARS: [&str; 5] = [
    "PROJECT_ID",
    "APP_SERVICE",
    "GCP_REGION",
    "APP_REVISION",
    "INSTANCE_ID",
];

/// Everything the lifecycle needs, resolved from flags and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub use_cron: bool,
    pub cron_exp: String,
    pub timezone: String,
    /// Per-execution bound; zero runs until cancelled.
    pub timeout: Duration,
    /// Drain grace after stop; zero waits indefinitely.
    pub grace: Duration,
    /// Interface name pattern.
    pub iface: String,
    pub capture: CaptureSettings,
    pub tags: Vec<Tag>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            use_cron: false,
            cron_exp: String::new(),
            timezone: "UTC".to_string(),
            timeout: Duration::ZERO,
            grace: Duration::from_secs(30),
            iface: String::new(),
            capture: CaptureSettings::default(),
            tags: Vec::new(),
        }
    }
}

impl RunConfig {
    /// One-line summary of the effective arguments, logged at startup.
    pub fn describe(&self) -> String {
        let c = &self.capture;
        format!(
            "args[use_cron:{}|cron_exp:{}|timezone:{}|timeout:{}|extension:{}|directory:{}|snaplen:{}|filter:{}|interval:{}|tcpdump:{}|jsondump:{}|jsonlog:{}|ordered:{}|iface:{}|grace:{}]",
            self.use_cron,
            self.cron_exp,
            self.timezone,
            self.timeout.as_secs(),
            c.extension,
            c.directory,
            c.snaplen,
            c.filter,
            c.interval,
            c.raw,
            c.decoded,
            c.console,
            c.ordered,
            self.iface,
            self.grace.as_secs(),
        )
    }
}

/// Job tags from the deployment environment; the host name stands in for a missing
/// instance id.
pub fn deployment_tags() -> Vec<Tag> {
    let host = hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().into_owned());
    tags_from(|key| std::env::var(key).ok(), host)
}

/// Tags looked up through `lookup`; empty values are dropped.
pub fn tags_from(lookup: impl Fn(&str) -> Option<String>, host: Option<String>) -> Vec<Tag> {
    TAG_VARS
        .into_iter()
        .filter_map(|key| {
            let value = lookup(key).filter(|v| !v.trim().is_empty());
            match (key, value) {
                ("INSTANCE_ID", None) => host.clone(),
                (_, value) => value,
            }
        })
        .filter(|v| !v.trim().is_empty())
        .collect()
}

use regex::Regex;
use tracing::debug;

use tcpw_model::{Correlation, Device};
use tcpw_observe::Journal;

use crate::{DeviceEnumerator, DiscoverError};

/// Picks the interfaces capture runs on.
///
/// A name matches when it is the pattern followed by a numeric suffix, optionally
/// behind an `ipvlan-` prefix: `eth` selects `eth0` and `ipvlan-eth1` but not `ethernet`.
#[derive(Debug, Clone)]
pub struct DeviceSelector {
    matcher: Regex,
}

impl DeviceSelector {
    pub fn new(pattern: &str) -> Result<Self, DiscoverError> {
        let expr = format!(r"^(?:ipvlan-)?{}\d+.*", regex::escape(pattern));
        let matcher = Regex::new(&expr).map_err(|source| DiscoverError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { matcher })
    }

    pub fn matcher(&self) -> &Regex {
        &self.matcher
    }

    pub fn matches(&self, name: &str) -> bool {
        self.matcher.is_match(name)
    }

    /// Matching devices with their indices resolved.
    ///
    /// A device that cannot be resolved is journalled and skipped; an enumeration
    /// failure yields no devices.
    pub fn select(&self, enumerator: &dyn DeviceEnumerator, journal: &Journal) -> Vec<Device> {
        let ctx = Correlation::detached();

        let names = match enumerator.find(&self.matcher) {
            Ok(names) => names,
            Err(e) => {
                journal.error(&ctx, format!("could not list interfaces: {e}"));
                return Vec::new();
            }
        };

        let mut devices = Vec::with_capacity(names.len());
        for name in names {
            if !self.matches(&name) {
                continue;
            }
            match enumerator.resolve(&name) {
                Ok(device) => devices.push(device),
                Err(e) => journal.error(&ctx, format!("invalid iface: {name} ({e})")),
            }
        }

        debug!(target: "tcpw.discover", pattern = self.matcher.as_str(), selected = devices.len(), "devices selected");
        devices
    }
}

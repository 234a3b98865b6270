use serde::{Deserialize, Serialize};

/// One decoded packet as handed from a decoded-format engine to its sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    /// Capture timestamp as reported by the engine (seconds since epoch, fractional).
    pub timestamp: String,
    pub iface: String,
    pub index: u32,
    /// On-wire packet length, when the engine reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    /// Human-readable decode of the packet headers.
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_is_omitted_when_unknown() {
        let record = CaptureRecord {
            timestamp: "1700000000.000001".into(),
            iface: "eth0".into(),
            index: 2,
            length: None,
            summary: "ARP, Request who-has 10.0.0.1".into(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("length"));
        assert!(json.contains("\"iface\":\"eth0\""));
    }
}

use tcpw_model::{CaptureConfig, CaptureRecord};

/// Parse one line of `tcpdump -tt -e -n` output.
///
/// Lines that do not start with an epoch timestamp (continuation lines, warnings)
/// yield `None`.
pub fn parse_line(line: &str, cfg: &CaptureConfig) -> Option<CaptureRecord> {
    let line = line.trim_end();
    let (timestamp, rest) = line.split_once(' ')?;
    if !is_epoch(timestamp) {
        return None;
    }
    let summary = rest.trim_start();
    if summary.is_empty() {
        return None;
    }

    Some(CaptureRecord {
        timestamp: timestamp.to_string(),
        iface: cfg.iface.clone(),
        index: cfg.index,
        length: frame_length(summary),
        summary: summary.to_string(),
    })
}

fn is_epoch(token: &str) -> bool {
    let (secs, frac) = token.split_once('.').unwrap_or((token, "0"));
    !secs.is_empty()
        && !frac.is_empty()
        && secs.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit())
}

/// First `length N` in the link-level header, i.e. the frame length.
fn frame_length(summary: &str) -> Option<u32> {
    let (_, after) = summary.split_once("length ")?;
    let digits: &str = after
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .unwrap_or_default();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    use tcpw_model::{CaptureSettings, Device};

    fn cfg() -> CaptureConfig {
        CaptureSettings::default().decoded_config(&Device::new(2, "eth0"))
    }

    #[test]
    fn parses_ethernet_ipv4_line() {
        let line = "1700000000.123456 02:42:ac:11:00:02 > 02:42:ac:11:00:03, ethertype IPv4 (0x0800), length 74: 10.0.0.1.443 > 10.0.0.2.51514: Flags [S.], seq 1, win 65160, length 0\n";
        let record = parse_line(line, &cfg()).unwrap();

        assert_eq!(record.timestamp, "1700000000.123456");
        assert_eq!(record.iface, "eth0");
        assert_eq!(record.index, 2);
        assert_eq!(record.length, Some(74));
        assert!(record.summary.starts_with("02:42:ac:11:00:02 > "));
        assert!(record.summary.ends_with("length 0"));
    }

    #[test]
    fn length_is_optional() {
        let record = parse_line("1700000000.000001 ARP, Request who-has 10.0.0.1 tell 10.0.0.2", &cfg()).unwrap();
        assert_eq!(record.length, None);
    }

    #[test]
    fn non_record_lines_are_skipped() {
        for line in [
            "",
            "tcpdump: verbose output suppressed, use -v[v]... for full protocol decode",
            "\t0x0000:  4500 003c",
            "1700000000.5",
            "17000.abc something",
        ] {
            assert!(parse_line(line, &cfg()).is_none(), "{line:?}");
        }
    }
}

use serde::Serialize;
use crate::classifier::Classifier;
use crate::extract::{extract_address, extract_timestamp, extract_user};
use crate::Record;

pub const DAEMON_MARKER: &str = "sshd";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub lines: usize,
    pub kept: usize,
    pub skipped: usize,
}

/// Turns log text into records, one per line carrying the daemon marker.
/// Lines are independent of each other; output keeps input order.
pub struct LogParser {
    marker: String,
    classifier: Classifier,
}

impl LogParser {
    pub fn new(marker: &str) -> Self {
        Self { marker: marker.to_string(), classifier: Classifier::with_defaults() }
    }

    pub fn parse_line(&self, line: &str) -> Option<Record> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || !line.contains(self.marker.as_str()) { return None; }
        Some(Record {
            timestamp: extract_timestamp(line),
            event_code: self.classifier.classify(line),
            source_address: extract_address(line),
            user: extract_user(line),
            raw_message: line.to_string(),
        })
    }

    pub fn parse_with_stats(&self, text: &str) -> (Vec<Record>, ParseStats) {
        let mut stats = ParseStats::default();
        let mut out = Vec::new();
        for line in text.lines() {
            stats.lines += 1;
            match self.parse_line(line) {
                Some(r) => { stats.kept += 1; out.push(r); }
                None => stats.skipped += 1,
            }
        }
        log::debug!("parsed {} lines: {} kept, {} skipped", stats.lines, stats.kept, stats.skipped);
        (out, stats)
    }

    pub fn parse(&self, text: &str) -> Vec<Record> { self.parse_with_stats(text).0 }

    pub fn parse_bytes(&self, bytes: &[u8]) -> Vec<Record> { self.parse(&decode_lossy(bytes)) }
}

impl Default for LogParser {
    fn default() -> Self { Self::new(DAEMON_MARKER) }
}

pub fn parse(text: &str) -> Vec<Record> { LogParser::default().parse(text) }

pub fn parse_bytes(bytes: &[u8]) -> Vec<Record> { LogParser::default().parse_bytes(bytes) }

/// UTF-8 decode that drops invalid sequences instead of substituting U+FFFD.
pub fn decode_lossy(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() { s.push_str(chunk.valid()); }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventCode, Field};

    #[test]
    fn scenario_failed_password_invalid_user() {
        let recs = parse("Jun 14 12:00:01 host sshd[123]: Failed password for invalid user admin from 10.0.0.5 port 22 ssh2");
        assert_eq!(recs.len(), 1);
        let r = &recs[0];
        assert_eq!(r.event_code, EventCode::FailedPasswordInvalidUser);
        assert_eq!(r.event_code.as_str(), "failed-password-invalid-user");
        assert_eq!(r.source_address, Field::Value("10.0.0.5".to_string()));
        assert_eq!(r.user, Field::Value("admin".to_string()));
        assert_eq!(r.timestamp, Field::Value("Jun 14 12:00:01".to_string()));
    }

    #[test]
    fn scenario_connection_closed() {
        let recs = parse("Jun 14 12:00:02 host sshd[124]: Connection closed by 10.0.0.9");
        assert_eq!(recs[0].event_code.as_str(), "connection-closed");
        assert_eq!(recs[0].user, Field::Absent);
        assert_eq!(recs[0].source_address, Field::Value("10.0.0.9".to_string()));
    }

    #[test]
    fn lines_without_marker_are_dropped() {
        let text = "Jun 14 12:00:01 host CRON[1]: Failed password for root from 1.1.1.1\n\n   \nJun 14 12:00:02 host sshd[2]: Connection closed by 2.2.2.2\nkernel: usb disconnect\n";
        let (recs, stats) = LogParser::default().parse_with_stats(text);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].source_address, Field::Value("2.2.2.2".to_string()));
        assert_eq!(stats, ParseStats { lines: 5, kept: 1, skipped: 4 });
    }

    #[test]
    fn marker_line_is_always_kept_even_with_odd_shape() {
        let recs = parse("garbage sshd noise without stamp\r\n");
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].timestamp, Field::Absent);
        assert_eq!(recs[0].event_code, EventCode::Unknown);
        assert_eq!(recs[0].raw_message, "garbage sshd noise without stamp");
    }

    #[test]
    fn degenerate_input_is_empty() {
        assert!(parse("").is_empty());
        assert!(parse("one\ntwo\nthree").is_empty());
    }

    #[test]
    fn keeps_input_order_not_time_order() {
        let text = "Jun 14 12:00:05 h sshd[1]: Connection closed by 1.1.1.1\nJun 14 11:00:00 h sshd[1]: Connection closed by 2.2.2.2\n";
        let recs = parse(text);
        assert_eq!(recs[0].source_address.as_str(), "1.1.1.1");
        assert_eq!(recs[1].source_address.as_str(), "2.2.2.2");
    }

    #[test]
    fn undecodable_bytes_are_dropped() {
        let mut bytes = b"Jun 14 12:00:02 host sshd[1]: Connection closed by 10.0.0.9 ".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(b"tail\n");
        let recs = parse_bytes(&bytes);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].raw_message.ends_with("10.0.0.9 tail"));
        assert!(!recs[0].raw_message.contains('\u{FFFD}'));
    }
}

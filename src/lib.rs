//! Classification and aggregation of sshd authentication logs.
//!
//! Raw log text goes through [`parser::parse`] into [`Record`]s, which are
//! persisted as CSV by [`store::save`]. [`store::load`] turns the file back
//! into dated [`Event`]s sorted by time, ready for [`filter`] and
//! [`aggregate`].

use std::fmt;
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod aggregate;
pub mod classifier;
pub mod config;
pub mod extract;
pub mod filter;
pub mod parser;
pub mod report;
pub mod sources;
pub mod store;

pub use classifier::EventCode;

/// Textual form of [`Field::Absent`] in the persisted dataset.
///
/// The marker shares its spelling with real text: a user or value literally
/// named `None` (`Invalid user None from ...`) is written as `None` and comes
/// back from a load as [`Field::Absent`].
pub const ABSENT: &str = "None";

/// An extracted value, or the explicit marker that the line did not carry one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Value(String),
    Absent,
}

impl Field {
    /// Wraps `s`, mapping empty text and the `None` marker to [`Field::Absent`].
    pub fn from_text(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s == ABSENT { Field::Absent } else { Field::Value(s.to_string()) }
    }

    pub fn as_str(&self) -> &str {
        match self { Field::Value(v) => v, Field::Absent => ABSENT }
    }

    pub fn value(&self) -> Option<&str> {
        match self { Field::Value(v) => Some(v), Field::Absent => None }
    }

    pub fn is_absent(&self) -> bool { matches!(self, Field::Absent) }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.serialize_str(self.as_str()) }
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(Field::from_text(&s))
    }
}

/// One classified sshd line as produced by the parser. The timestamp is the
/// syslog stamp text; it has no year until the record is loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub timestamp: Field,
    pub event_code: EventCode,
    pub source_address: Field,
    pub user: Field,
    pub raw_message: String,
}

/// A loaded record placed on the timeline with the reference year.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: NaiveDateTime,
    pub event_code: EventCode,
    pub source_address: Field,
    pub user: Field,
    pub raw_message: String,
}

/// Chronologically ordered events, the unit every aggregation works on.
pub type EventSet = Vec<Event>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_text_forms() {
        assert_eq!(Field::from_text("None"), Field::Absent);
        assert_eq!(Field::from_text("  "), Field::Absent);
        assert_eq!(Field::from_text("root"), Field::Value("root".to_string()));
        assert_eq!(Field::Absent.to_string(), "None");
        assert_eq!(Field::Value("10.0.0.1".to_string()).value(), Some("10.0.0.1"));
    }

    #[test]
    fn field_serializes_as_plain_string() {
        let s = serde_json::to_string(&vec![Field::Absent, Field::Value("admin".to_string())]).unwrap();
        assert_eq!(s, r#"["None","admin"]"#);
        let back: Vec<Field> = serde_json::from_str(&s).unwrap();
        assert_eq!(back[0], Field::Absent);
    }

    #[test]
    fn user_named_none_reloads_as_absent() {
        let records = parser::parse("Jun 14 12:00:01 host sshd[1]: Invalid user None from 10.0.0.5\n");
        assert_eq!(records[0].user, Field::Value("None".to_string()));
        let mut buf = Vec::new();
        store::write_records(&records, &mut buf).unwrap();
        let events = store::read_events(buf.as_slice(), 2024).unwrap();
        assert_eq!(events[0].user, Field::Absent);
    }
}

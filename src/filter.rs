use std::collections::HashSet;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::aggregate::top_addresses;
use crate::{Event, EventCode, Field};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressSelection {
    #[default]
    All,
    Only(Vec<String>),
    /// The N most active addresses of the unfiltered set.
    Top(usize),
    /// Addresses containing the substring; an empty pattern selects all.
    Containing(String),
}

/// Selections the caller wants applied. Each `None`/`All` leaves that
/// dimension unrestricted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub codes: Option<Vec<EventCode>>,
    pub addresses: AddressSelection,
    pub users: Option<Vec<String>>,
    pub since: Option<NaiveDateTime>,
    pub until: Option<NaiveDateTime>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FilterSummary {
    pub kept: usize,
    pub total: usize,
    pub percent: f64,
}

impl EventFilter {
    pub fn is_unrestricted(&self) -> bool {
        self.codes.is_none() && self.addresses == AddressSelection::All && self.users.is_none() && self.since.is_none() && self.until.is_none()
    }
}

/// Events with no address or no user are never excluded by the address or
/// user selection; only code and time bounds can drop them.
pub fn apply(filter: &EventFilter, events: &[Event]) -> Vec<Event> {
    let allowed_ips: Option<HashSet<String>> = match &filter.addresses {
        AddressSelection::Only(list) => Some(list.iter().cloned().collect()),
        AddressSelection::Top(n) => Some(top_addresses(events, *n).into_iter().map(|(ip, _)| ip).collect()),
        AddressSelection::All | AddressSelection::Containing(_) => None,
    };
    let pattern = match &filter.addresses { AddressSelection::Containing(p) if !p.is_empty() => Some(p.as_str()), _ => None };
    events
        .iter()
        .filter(|e| filter.codes.as_ref().is_none_or(|c| c.contains(&e.event_code)))
        .filter(|e| match &e.source_address {
            Field::Absent => true,
            Field::Value(ip) => allowed_ips.as_ref().is_none_or(|s| s.contains(ip)) && pattern.is_none_or(|p| ip.contains(p)),
        })
        .filter(|e| match (&filter.users, &e.user) {
            (None, _) | (_, Field::Absent) => true,
            (Some(list), Field::Value(u)) => list.iter().any(|x| x == u),
        })
        .filter(|e| filter.since.is_none_or(|s| e.timestamp >= s) && filter.until.is_none_or(|u| e.timestamp <= u))
        .cloned()
        .collect()
}

pub fn summarize(kept: usize, total: usize) -> FilterSummary {
    let percent = if total == 0 { 0.0 } else { kept as f64 * 100.0 / total as f64 };
    FilterSummary { kept, total, percent }
}

/// Distinct non-sentinel addresses, sorted, as offered for selection.
pub fn available_addresses(events: &[Event]) -> Vec<String> {
    let mut v: Vec<String> = events.iter().filter_map(|e| e.source_address.value().map(str::to_string)).collect::<HashSet<_>>().into_iter().collect();
    v.sort();
    v
}

pub fn available_users(events: &[Event]) -> Vec<String> {
    let mut v: Vec<String> = events.iter().filter_map(|e| e.user.value().map(str::to_string)).collect::<HashSet<_>>().into_iter().collect();
    v.sort();
    v
}

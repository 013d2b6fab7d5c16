use std::collections::{BTreeMap, HashMap, HashSet};
use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use crate::{Event, EventCode};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SummaryStats {
    pub total_events: usize,
    pub unique_addresses: usize,
    pub unique_users: usize,
    pub failed_attempts: usize,
    pub break_in_attempts: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct HourBucket {
    pub start: NaiveDateTime,
    pub count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct HourlyActivity {
    pub busiest: HourBucket,
    pub quietest: HourBucket,
    pub mean: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CodeShare {
    pub code: EventCode,
    pub count: usize,
    pub percent: f64,
}

pub fn summary_stats(events: &[Event]) -> SummaryStats {
    let mut ips: HashSet<&str> = HashSet::new();
    let mut users: HashSet<&str> = HashSet::new();
    let mut failed = 0usize;
    let mut breakins = 0usize;
    for e in events {
        if let Some(ip) = e.source_address.value() { ips.insert(ip); }
        if let Some(u) = e.user.value() { users.insert(u); }
        if e.event_code.is_auth_failure() { failed += 1; }
        if e.event_code.is_break_in() { breakins += 1; }
    }
    SummaryStats { total_events: events.len(), unique_addresses: ips.len(), unique_users: users.len(), failed_attempts: failed, break_in_attempts: breakins }
}

/// Failed attempts as a percentage of all events.
pub fn failure_rate(stats: &SummaryStats) -> f64 {
    if stats.total_events == 0 { 0.0 } else { stats.failed_attempts as f64 * 100.0 / stats.total_events as f64 }
}

/// Counts keyed by first appearance, then stably sorted by descending count.
fn ranked<K: std::hash::Hash + Eq + Clone>(keys: impl Iterator<Item = K>) -> Vec<(K, usize)> {
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut counts: Vec<(K, usize)> = Vec::new();
    for k in keys {
        match index.get(&k) {
            Some(&i) => counts[i].1 += 1,
            None => { index.insert(k.clone(), counts.len()); counts.push((k, 1)); }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// The `n` busiest source addresses; events without one are not counted.
pub fn top_addresses(events: &[Event], n: usize) -> Vec<(String, usize)> {
    let mut v = ranked(events.iter().filter_map(|e| e.source_address.value()));
    v.truncate(n);
    v.into_iter().map(|(ip, c)| (ip.to_string(), c)).collect()
}

pub fn floor_to_hour(t: NaiveDateTime) -> NaiveDateTime {
    t.date().and_hms_opt(t.hour(), 0, 0).unwrap_or(t)
}

/// Event counts per hour; hours without events are omitted.
pub fn hourly_buckets(events: &[Event]) -> Vec<HourBucket> {
    let mut m: BTreeMap<NaiveDateTime, usize> = BTreeMap::new();
    for e in events { *m.entry(floor_to_hour(e.timestamp)).or_insert(0) += 1; }
    m.into_iter().map(|(start, count)| HourBucket { start, count }).collect()
}

/// Earliest bucket wins ties for both busiest and quietest.
pub fn hourly_activity(buckets: &[HourBucket]) -> Option<HourlyActivity> {
    let first = *buckets.first()?;
    let mut busiest = first;
    let mut quietest = first;
    for b in &buckets[1..] {
        if b.count > busiest.count { busiest = *b; }
        if b.count < quietest.count { quietest = *b; }
    }
    let mean = buckets.iter().map(|b| b.count).sum::<usize>() as f64 / buckets.len() as f64;
    Some(HourlyActivity { busiest, quietest, mean })
}

pub fn event_distribution(events: &[Event]) -> Vec<CodeShare> {
    let total = events.len();
    ranked(events.iter().map(|e| e.event_code))
        .into_iter()
        .map(|(code, count)| CodeShare { code, count, percent: count as f64 * 100.0 / total as f64 })
        .collect()
}

/// First and last timestamp of a chronologically sorted set.
pub fn time_span(events: &[Event]) -> Option<(NaiveDateTime, NaiveDateTime)> {
    Some((events.first()?.timestamp, events.last()?.timestamp))
}

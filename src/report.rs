use chrono::NaiveDateTime;
use comfy_table::{ContentArrangement, Table};
use serde::Serialize;
use crate::aggregate::{self, CodeShare, HourBucket, HourlyActivity, SummaryStats};
use crate::filter::{self, EventFilter, FilterSummary};
use crate::Event;

const TIME_FMT: &str = "%d %b %Y %H:%M";

/// Everything the report renderers show, computed once from the loaded set.
#[derive(Clone, Debug, Serialize)]
pub struct Analysis {
    pub filter: FilterSummary,
    pub span: Option<(NaiveDateTime, NaiveDateTime)>,
    pub summary: SummaryStats,
    pub failure_rate: f64,
    pub top_addresses: Vec<(String, usize)>,
    pub hourly: Vec<HourBucket>,
    pub activity: Option<HourlyActivity>,
    pub distribution: Vec<CodeShare>,
}

pub fn analyze(events: &[Event], flt: &EventFilter, top: usize) -> (Analysis, Vec<Event>) {
    let kept = filter::apply(flt, events);
    let summary = aggregate::summary_stats(&kept);
    let hourly = aggregate::hourly_buckets(&kept);
    let a = Analysis {
        filter: filter::summarize(kept.len(), events.len()),
        span: aggregate::time_span(events),
        summary,
        failure_rate: aggregate::failure_rate(&summary),
        top_addresses: aggregate::top_addresses(&kept, top),
        activity: aggregate::hourly_activity(&hourly),
        hourly,
        distribution: aggregate::event_distribution(&kept),
    };
    (a, kept)
}

pub fn paint(s: &str, code: &str, color: bool) -> String {
    if color { format!("\x1b[{}m{}\x1b[0m", code, s) } else { s.to_string() }
}

fn bar(v: usize, max: usize, width: usize) -> String {
    if max == 0 { return String::new(); }
    let filled = ((v as f64 / max as f64) * width as f64).round() as usize;
    "█".repeat(filled)
}

pub fn render_text(a: &Analysis, color: bool) -> String {
    let mut s = String::new();
    if let Some((start, end)) = a.span { s.push_str(&format!("{}\n", paint(&format!("Period: {} -> {}", start.format(TIME_FMT), end.format(TIME_FMT)), "1;36", color))); }
    if a.filter.kept < a.filter.total {
        s.push_str(&format!("Filters active: showing {} of {} events ({:.1}%)\n", a.filter.kept, a.filter.total, a.filter.percent));
    }
    if a.filter.total == 0 {
        s.push_str(&paint("Dataset is empty.", "33", color));
        s.push('\n');
        return s;
    }
    if a.filter.kept == 0 {
        s.push_str(&paint("No event matches the selected filters.", "33", color));
        s.push('\n');
        return s;
    }
    let mut t = Table::new();
    t.set_content_arrangement(ContentArrangement::Dynamic);
    t.set_header(vec![paint("Total events", "1", color), paint("Unique IPs", "1", color), paint("Unique users", "1", color), paint("Auth failures", "1", color), paint("Break-in attempts", "1", color)]);
    let breakin = a.summary.break_in_attempts.to_string();
    t.add_row(vec![
        a.summary.total_events.to_string(),
        a.summary.unique_addresses.to_string(),
        a.summary.unique_users.to_string(),
        format!("{} ({:.1}%)", a.summary.failed_attempts, a.failure_rate),
        if a.summary.break_in_attempts > 0 { paint(&breakin, "1;31", color) } else { breakin },
    ]);
    s.push_str(&format!("{}\n", t));

    s.push_str(&format!("{}\n", paint("Top source addresses:", "1", color)));
    if a.top_addresses.is_empty() { s.push_str("  none\n"); } else {
        let max = a.top_addresses.first().map(|(_, c)| *c).unwrap_or(0);
        for (ip, c) in &a.top_addresses { s.push_str(&format!("  {:<15} {:>6} {}\n", ip, c, bar(*c, max, 30))); }
    }

    s.push_str(&format!("{}\n", paint("Events per hour:", "1", color)));
    let max = a.hourly.iter().map(|b| b.count).max().unwrap_or(0);
    for b in &a.hourly { s.push_str(&format!("  {}  {:>6} {}\n", b.start.format("%d %b %H:00"), b.count, bar(b.count, max, 30))); }
    if let Some(act) = &a.activity {
        s.push_str(&format!("  busiest: {} ({}), quietest: {} ({}), mean {:.1}/hour\n", act.busiest.start.format("%H:%M"), act.busiest.count, act.quietest.start.format("%H:%M"), act.quietest.count, act.mean));
    }

    let mut d = Table::new();
    d.set_content_arrangement(ContentArrangement::Dynamic);
    d.set_header(vec![paint("Code", "1", color), paint("Description", "1", color), paint("Count", "1", color), paint("Share", "1", color)]);
    for c in &a.distribution {
        d.add_row(vec![c.code.as_str().to_string(), c.code.description().to_string(), c.count.to_string(), format!("{:.1}%", c.percent)]);
    }
    s.push_str(&format!("{}\n", d));
    s
}

pub fn render_markdown(a: &Analysis) -> String {
    let mut s = String::new();
    s.push_str("# SSH Security Report\n\n");
    if let Some((start, end)) = a.span { s.push_str(&format!("Period: {} → {}\n\n", start.format(TIME_FMT), end.format(TIME_FMT))); }
    if a.filter.kept < a.filter.total { s.push_str(&format!("Filtered: {} of {} events ({:.1}%)\n\n", a.filter.kept, a.filter.total, a.filter.percent)); }

    s.push_str("## Summary\n");
    s.push_str(&format!("- Total Events: {}\n", a.summary.total_events));
    s.push_str(&format!("- Unique IPs: {}\n", a.summary.unique_addresses));
    s.push_str(&format!("- Unique Users: {}\n", a.summary.unique_users));
    s.push_str(&format!("- Authentication Failures: {} ({:.1}%)\n", a.summary.failed_attempts, a.failure_rate));
    s.push_str(&format!("- Break-in Attempts: {}\n\n", a.summary.break_in_attempts));

    s.push_str("## Top Source Addresses\n");
    if a.top_addresses.is_empty() { s.push_str("None\n\n"); } else {
        s.push_str("| IP | Events |\n|---|---|\n");
        for (ip, c) in &a.top_addresses { s.push_str(&format!("| {} | {} |\n", ip, c)); }
        s.push('\n');
    }

    s.push_str("## Hourly Activity\n");
    if a.hourly.is_empty() { s.push_str("None\n\n"); } else {
        for b in &a.hourly { s.push_str(&format!("- {}: {}\n", b.start.format("%Y-%m-%d %H:00"), b.count)); }
        if let Some(act) = &a.activity {
            s.push_str(&format!("\nBusiest hour: {} ({} events). Quietest hour: {} ({} events). Mean: {:.1} per hour.\n", act.busiest.start.format("%H:%M"), act.busiest.count, act.quietest.start.format("%H:%M"), act.quietest.count, act.mean));
        }
        s.push('\n');
    }

    s.push_str("## Event Types\n");
    if a.distribution.is_empty() { s.push_str("None\n"); } else {
        s.push_str("| Code | Description | Count | Share |\n|---|---|---|---|\n");
        for c in &a.distribution { s.push_str(&format!("| {} | {} | {} | {:.1}% |\n", c.code, c.code.description(), c.count, c.percent)); }
    }
    s
}

pub fn render_json(a: &Analysis) -> Result<String, serde_json::Error> { serde_json::to_string_pretty(a) }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::AddressSelection;

    fn events() -> Vec<Event> {
        let text = "Jun 14 10:15:00 h sshd[1]: Failed password for root from 1.1.1.1 port 22 ssh2
Jun 14 10:45:00 h sshd[1]: Failed password for invalid user admin from 1.1.1.1 port 22 ssh2
Jun 14 11:05:00 h sshd[1]: reverse mapping checking getaddrinfo for x [2.2.2.2] failed - POSSIBLE BREAK-IN ATTEMPT!
Jun 14 11:06:00 h sshd[1]: pam_unix(sshd:auth): check pass; user unknown
";
        let mut buf = Vec::new();
        crate::store::write_records(&crate::parser::parse(text), &mut buf).unwrap();
        crate::store::read_events(buf.as_slice(), 2024).unwrap()
    }

    #[test]
    fn analysis_over_unfiltered_set() {
        let (a, kept) = analyze(&events(), &EventFilter::default(), 5);
        assert_eq!(kept.len(), 4);
        assert_eq!(a.summary.failed_attempts, 2);
        assert_eq!(a.summary.break_in_attempts, 1);
        assert_eq!(a.top_addresses[0], ("1.1.1.1".to_string(), 2));
        assert_eq!(a.hourly.len(), 2);
        assert_eq!(a.failure_rate, 50.0);
    }

    #[test]
    fn renderers_mention_key_figures() {
        let (a, _) = analyze(&events(), &EventFilter::default(), 5);
        let md = render_markdown(&a);
        assert!(md.contains("- Break-in Attempts: 1"));
        assert!(md.contains("| 1.1.1.1 | 2 |"));
        let txt = render_text(&a, false);
        assert!(txt.contains("1.1.1.1"));
        assert!(!txt.contains('\x1b'));
        assert!(render_text(&a, true).contains('\x1b'));
        let json = render_json(&a).unwrap();
        assert!(json.contains("\"break_in_attempts\": 1"));
    }

    #[test]
    fn empty_filter_result_is_reported_not_failed() {
        let flt = EventFilter { addresses: AddressSelection::Only(vec!["9.9.9.9".to_string()]), codes: Some(vec![crate::EventCode::FailedPasswordRoot]), ..Default::default() };
        let (a, kept) = analyze(&events(), &flt, 5);
        assert!(kept.is_empty());
        assert_eq!(a.summary, SummaryStats::default());
        assert!(render_text(&a, false).contains("No event matches"));
        assert!(render_markdown(&a).contains("## Event Types\nNone"));
    }

    #[test]
    fn empty_dataset_is_not_blamed_on_filters() {
        let (a, _) = analyze(&[], &EventFilter::default(), 5);
        let txt = render_text(&a, false);
        assert!(txt.contains("Dataset is empty."));
        assert!(!txt.contains("No event matches"));
    }
}

use std::sync::LazyLock;
use regex::Regex;
use crate::Field;

static ADDRESS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").expect("address pattern"));

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+(\d{1,2})\s+(\d{2}:\d{2}:\d{2})\b").expect("timestamp pattern")
});

/// Most specific first. A line like "Failed password for invalid user X from"
/// also matches the generic "for X from" pattern with the wrong capture.
static USER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\binvalid user (\S+) from\b",
        r"(?i)(?:authentication failures|attempts exceeded) for (?:invalid user )?(\S+) from\b",
        r"(?i)\b(?:failed|accepted) \S+ for (\S+) from\b",
        r"(?i)\bauthenticating user (\S+)",
        r"(?i)\buser[=: ](\S+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("user pattern"))
    .collect()
});

/// First dotted quad in the line.
pub fn extract_address(line: &str) -> Field {
    ADDRESS.find(line).map(|m| Field::Value(m.as_str().to_string())).unwrap_or(Field::Absent)
}

pub fn extract_user(line: &str) -> Field {
    let last = USER_PATTERNS.len() - 1;
    for (i, re) in USER_PATTERNS.iter().enumerate() {
        let Some(v) = re.captures(line).and_then(|c| c.get(1)) else { continue };
        let v = v.as_str().trim_end_matches([',', ';', ']']);
        // "check pass; user unknown" names no user
        if i == last && v.eq_ignore_ascii_case("unknown") { continue; }
        if !v.is_empty() { return Field::Value(v.to_string()); }
    }
    Field::Absent
}

/// Leap year used to check a stamp, so `Feb 29` is kept for the loader to judge.
const CHECK_YEAR: i32 = 2024;

/// Leading syslog stamp normalized to `"<Mon> <d> <HH:MM:SS>"`. A stamp that
/// names no real date or clock time (`Feb 30`, `25:61:00`) counts as absent.
pub fn extract_timestamp(line: &str) -> Field {
    let Some(c) = TIMESTAMP.captures(line) else { return Field::Absent };
    let stamp = format!("{} {} {}", &c[1], &c[2], &c[3]);
    if crate::store::parse_stamp(&stamp, CHECK_YEAR).is_none() { return Field::Absent; }
    Field::Value(stamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Field { Field::Value(s.to_string()) }

    #[test]
    fn address_first_match_or_absent() {
        assert_eq!(extract_address("Failed password for root from 10.0.0.5 port 22 ssh2"), v("10.0.0.5"));
        assert_eq!(extract_address("getaddrinfo for host [1.2.3.4] via 5.6.7.8"), v("1.2.3.4"));
        assert_eq!(extract_address("Connection closed by authenticating user"), Field::Absent);
        assert_eq!(extract_address("version 1.2.3"), Field::Absent);
    }

    #[test]
    fn specific_user_pattern_wins() {
        assert_eq!(extract_user("Failed password for invalid user admin from 10.0.0.5 port 22 ssh2"), v("admin"));
        assert_eq!(extract_user("Failed password for root from 10.0.0.5 port 22 ssh2"), v("root"));
        assert_eq!(extract_user("Invalid user oracle from 10.0.0.5"), v("oracle"));
        assert_eq!(extract_user("Accepted publickey for deploy from 10.0.0.5 port 5000 ssh2"), v("deploy"));
        assert_eq!(extract_user("Connection closed by authenticating user git 10.0.0.5 port 40000 [preauth]"), v("git"));
        assert_eq!(extract_user("Disconnecting: Too many authentication failures for invalid user pi from 1.2.3.4 port 22 ssh2 [preauth]"), v("pi"));
    }

    #[test]
    fn generic_user_pattern() {
        assert_eq!(extract_user("authentication failure; logname= uid=0 euid=0 tty=ssh ruser= rhost=1.2.3.4  user=root"), v("root"));
        assert_eq!(extract_user("input_userauth_request: invalid user test [preauth]"), v("test"));
        assert_eq!(extract_user("pam_unix(sshd:auth): check pass; user unknown"), Field::Absent);
        assert_eq!(extract_user("Connection closed by 10.0.0.9"), Field::Absent);
        assert_eq!(extract_user("authentication failure; logname= uid=0 euid=0 tty=ssh ruser= rhost=1.2.3.4"), Field::Absent);
    }

    #[test]
    fn timestamp_prefix() {
        assert_eq!(extract_timestamp("Jun 14 12:00:01 host sshd[123]: x"), v("Jun 14 12:00:01"));
        assert_eq!(extract_timestamp("Dec  5 09:01:02 host sshd[1]: x"), v("Dec 5 09:01:02"));
        assert_eq!(extract_timestamp("host sshd[1]: Jun 14 12:00:01"), Field::Absent);
        assert_eq!(extract_timestamp("Foo 14 12:00:01 host sshd[1]"), Field::Absent);
    }

    #[test]
    fn impossible_stamps_are_absent() {
        assert_eq!(extract_timestamp("Jun 14 99:99:99 host sshd[1]: x"), Field::Absent);
        assert_eq!(extract_timestamp("Feb 30 10:00:00 host sshd[1]: x"), Field::Absent);
        assert_eq!(extract_timestamp("Jun 0 10:00:00 host sshd[1]: x"), Field::Absent);
        assert_eq!(extract_timestamp("Feb 29 10:00:00 host sshd[1]: x"), v("Feb 29 10:00:00"));
    }
}

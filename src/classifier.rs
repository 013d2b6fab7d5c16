use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Category of an sshd line. Variants are listed in match priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventCode {
    BreakInAttempt,
    MessageRepeated,
    TooManyAuthFailures,
    FailedPasswordInvalidUser,
    FailedPasswordRoot,
    FailedPassword,
    PamIgnoringMaxRetries,
    PamAuthFailures,
    PamAuthFailureRoot,
    PamAuthFailure,
    PamUserUnknown,
    InvalidUserAuthRequest,
    InvalidUser,
    ReceivedDisconnect,
    ConnectionClosed,
    Unknown,
}

impl EventCode {
    pub const ALL: [EventCode; 16] = [
        EventCode::BreakInAttempt,
        EventCode::MessageRepeated,
        EventCode::TooManyAuthFailures,
        EventCode::FailedPasswordInvalidUser,
        EventCode::FailedPasswordRoot,
        EventCode::FailedPassword,
        EventCode::PamIgnoringMaxRetries,
        EventCode::PamAuthFailures,
        EventCode::PamAuthFailureRoot,
        EventCode::PamAuthFailure,
        EventCode::PamUserUnknown,
        EventCode::InvalidUserAuthRequest,
        EventCode::InvalidUser,
        EventCode::ReceivedDisconnect,
        EventCode::ConnectionClosed,
        EventCode::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCode::BreakInAttempt => "break-in-attempt",
            EventCode::MessageRepeated => "message-repeated",
            EventCode::TooManyAuthFailures => "too-many-auth-failures",
            EventCode::FailedPasswordInvalidUser => "failed-password-invalid-user",
            EventCode::FailedPasswordRoot => "failed-password-root",
            EventCode::FailedPassword => "failed-password",
            EventCode::PamIgnoringMaxRetries => "pam-ignoring-max-retries",
            EventCode::PamAuthFailures => "pam-auth-failures",
            EventCode::PamAuthFailureRoot => "pam-auth-failure-root",
            EventCode::PamAuthFailure => "pam-auth-failure",
            EventCode::PamUserUnknown => "pam-user-unknown",
            EventCode::InvalidUserAuthRequest => "invalid-user-auth-request",
            EventCode::InvalidUser => "invalid-user",
            EventCode::ReceivedDisconnect => "received-disconnect",
            EventCode::ConnectionClosed => "connection-closed",
            EventCode::Unknown => "unknown",
        }
    }

    /// Template id used by the LogHub sshd dataset, where one exists.
    pub fn legacy_id(&self) -> Option<&'static str> {
        match self {
            EventCode::BreakInAttempt => Some("E27"),
            EventCode::MessageRepeated => Some("E14"),
            EventCode::TooManyAuthFailures => Some("E5"),
            EventCode::FailedPasswordInvalidUser => Some("E10"),
            EventCode::FailedPasswordRoot => Some("E9"),
            EventCode::PamIgnoringMaxRetries => Some("E18"),
            EventCode::PamAuthFailures => Some("E17"),
            EventCode::PamAuthFailureRoot => Some("E20"),
            EventCode::PamAuthFailure => Some("E19"),
            EventCode::PamUserUnknown => Some("E21"),
            EventCode::InvalidUserAuthRequest => Some("E12"),
            EventCode::InvalidUser => Some("E13"),
            EventCode::ReceivedDisconnect => Some("E24"),
            EventCode::ConnectionClosed => Some("E2"),
            EventCode::FailedPassword | EventCode::Unknown => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EventCode::BreakInAttempt => "POSSIBLE BREAK-IN ATTEMPT",
            EventCode::MessageRepeated => "Message repeated",
            EventCode::TooManyAuthFailures => "Too many auth failures",
            EventCode::FailedPasswordInvalidUser => "Failed password (invalid user)",
            EventCode::FailedPasswordRoot => "Failed password (root)",
            EventCode::FailedPassword => "Failed password",
            EventCode::PamIgnoringMaxRetries => "PAM ignoring max retries",
            EventCode::PamAuthFailures => "PAM auth failures",
            EventCode::PamAuthFailureRoot => "PAM auth failure (root)",
            EventCode::PamAuthFailure => "PAM auth failure",
            EventCode::PamUserUnknown => "PAM check pass - user unknown",
            EventCode::InvalidUserAuthRequest => "Invalid user auth request",
            EventCode::InvalidUser => "Invalid user",
            EventCode::ReceivedDisconnect => "Received disconnect",
            EventCode::ConnectionClosed => "Connection closed",
            EventCode::Unknown => "Unknown",
        }
    }

    /// Counted as a failed authentication in summary statistics.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, EventCode::FailedPasswordRoot | EventCode::FailedPasswordInvalidUser | EventCode::FailedPassword)
    }

    pub fn is_break_in(&self) -> bool { *self == EventCode::BreakInAttempt }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event code '{0}'")]
pub struct UnknownEventCode(pub String);

impl FromStr for EventCode {
    type Err = UnknownEventCode;

    /// Accepts the kebab-case tag or the legacy `E<n>` id, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        EventCode::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(t) || c.legacy_id().is_some_and(|id| id.eq_ignore_ascii_case(t)))
            .ok_or_else(|| UnknownEventCode(t.to_string()))
    }
}

impl Serialize for EventCode {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.serialize_str(self.as_str()) }
}

impl<'de> Deserialize<'de> for EventCode {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Ordered (code, pattern) table. Several categories overlap, so the first
/// matching entry wins and the order here is the precedence.
const RULES: &[(EventCode, &str)] = &[
    (EventCode::BreakInAttempt, r"possible break-in attempt"),
    (EventCode::MessageRepeated, r"message repeated \d+ times"),
    (EventCode::TooManyAuthFailures, r"too many authentication failures|maximum authentication attempts exceeded"),
    (EventCode::FailedPasswordInvalidUser, r"failed password for invalid user\b"),
    (EventCode::FailedPasswordRoot, r"failed password for root\b"),
    (EventCode::FailedPassword, r"failed password for\b"),
    (EventCode::PamIgnoringMaxRetries, r"pam service\(sshd\) ignoring max retries"),
    (EventCode::PamAuthFailures, r"pam \d+ more authentication failures"),
    (EventCode::PamAuthFailureRoot, r"authentication failure;.*\buser=root\b"),
    (EventCode::PamAuthFailure, r"authentication failure;"),
    (EventCode::PamUserUnknown, r"check pass; user unknown"),
    (EventCode::InvalidUserAuthRequest, r"input_userauth_request: invalid user\b"),
    (EventCode::InvalidUser, r"\binvalid user\b"),
    (EventCode::ReceivedDisconnect, r"received disconnect from\b"),
    (EventCode::ConnectionClosed, r"connection closed by\b"),
];

pub struct Classifier {
    rules: Vec<(EventCode, Regex)>,
}

impl Classifier {
    pub fn with_defaults() -> Self {
        let rules = RULES
            .iter()
            .map(|(code, pat)| (*code, Regex::new(&format!("(?i){}", pat)).expect("built-in classification pattern")))
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> impl Iterator<Item = (EventCode, &Regex)> {
        self.rules.iter().map(|(c, re)| (*c, re))
    }

    /// First matching rule decides; lines no rule recognizes are `Unknown`.
    pub fn classify(&self, line: &str) -> EventCode {
        for (code, re) in &self.rules {
            if re.is_match(line) { return *code; }
        }
        EventCode::Unknown
    }
}

impl Default for Classifier {
    fn default() -> Self { Self::with_defaults() }
}

static DEFAULT: LazyLock<Classifier> = LazyLock::new(Classifier::with_defaults);

pub fn classify(line: &str) -> EventCode { DEFAULT.classify(line) }

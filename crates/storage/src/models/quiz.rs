use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An ISO-8601 timestamp from the LMS.
///
/// A value that fails to parse is kept as `Malformed` so callers can fail closed
/// instead of mistaking it for an absent value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Timestamp {
    Valid(DateTime<Utc>),
    Malformed(String),
}

impl Timestamp {
    pub fn parse(raw: &str) -> Self {
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(dt) => Timestamp::Valid(dt.with_timezone(&Utc)),
            Err(_) => Timestamp::Malformed(raw.to_string()),
        }
    }

    pub fn valid(&self) -> Option<DateTime<Utc>> {
        match self {
            Timestamp::Valid(dt) => Some(*dt),
            Timestamp::Malformed(_) => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Timestamp::Malformed(_))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp::Valid(dt)
    }
}

impl From<String> for Timestamp {
    fn from(raw: String) -> Self {
        Timestamp::parse(&raw)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        match ts {
            Timestamp::Valid(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            Timestamp::Malformed(raw) => raw,
        }
    }
}

/// `Option<&Timestamp>` narrowed to a usable instant.
pub fn valid_instant(ts: &Option<Timestamp>) -> Option<DateTime<Utc>> {
    ts.as_ref().and_then(Timestamp::valid)
}

/// A timed quiz as read from the LMS, classic or new-format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSnapshot {
    pub id: String,
    /// Assignment the quiz is graded through; availability overrides are keyed by it.
    pub assignment_id: String,
    pub title: String,
    pub time_limit_minutes: Option<i64>,
    pub unlock_at: Option<Timestamp>,
    pub lock_at: Option<Timestamp>,
    pub due_at: Option<Timestamp>,
    pub published: bool,
    pub points_possible: Option<f64>,
    pub is_new_format: bool,
}

/// A per-student availability override that already exists on the LMS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingOverride {
    pub override_id: String,
    pub quiz_id: String,
    pub title: Option<String>,
    pub student_ids: Vec<String>,
    pub unlock_at: Option<Timestamp>,
    pub lock_at: Option<Timestamp>,
    pub due_at: Option<Timestamp>,
}

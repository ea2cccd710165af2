//! Time-limit and availability-window arithmetic for quiz accommodations.
//!
//! All instants are stored in UTC. The calculator carries the time zone the course is
//! run in, because the LMS judges midnight in local time.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};

use crate::models::{
    ApplyStatus, Multiplier, QuizSnapshot, QuizVariant, TierPlan, Timestamp, valid_instant,
};
use crate::services::rounding::ceil_minutes;

/// Windows longer than this with no time limit are treated as intentionally open.
pub const OPEN_WINDOW_MINUTES: i64 = 180;

pub fn window_minutes(unlock_at: DateTime<Utc>, lock_at: DateTime<Utc>) -> i64 {
    (lock_at - unlock_at).num_minutes()
}

/// `ceil(time_limit * multiplier)`, never rounded down.
pub fn new_time_limit(time_limit: Option<i64>, multiplier: Option<Multiplier>) -> Option<i64> {
    Some(ceil_minutes(time_limit?, multiplier?.factor()))
}

/// The due date follows whichever lock boundary is now in effect.
pub fn new_due_at(
    due_at: Option<DateTime<Utc>>,
    new_lock_at: Option<DateTime<Utc>>,
    lock_at: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let due_at = due_at?;
    Some(new_lock_at.or(lock_at).unwrap_or(due_at))
}

/// True when the availability window is already shorter than the time limit,
/// so extra time alone may not help.
pub fn should_warn(quiz: &QuizSnapshot) -> bool {
    match (
        valid_instant(&quiz.unlock_at),
        valid_instant(&quiz.lock_at),
        quiz.time_limit_minutes,
    ) {
        (Some(unlock), Some(lock), Some(limit)) => window_minutes(unlock, lock) < limit,
        _ => false,
    }
}

pub struct WindowCalculator<Tz: TimeZone> {
    tz: Tz,
    now: DateTime<Utc>,
}

impl<Tz> WindowCalculator<Tz>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    pub fn new(tz: Tz, now: DateTime<Utc>) -> Self {
        Self { tz, now }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// New lock boundary for a tier, or `None` when the current window is enough.
    pub fn new_lock_at(
        &self,
        unlock_at: Option<DateTime<Utc>>,
        lock_at: Option<DateTime<Utc>>,
        new_time_limit: Option<i64>,
        multiplier: Multiplier,
    ) -> Option<DateTime<Utc>> {
        let (unlock_at, lock_at) = (unlock_at?, lock_at?);
        let window = window_minutes(unlock_at, lock_at);

        let extended = match new_time_limit {
            Some(limit) if window < limit => unlock_at + Duration::minutes(limit),
            Some(_) => return None,
            None if window <= OPEN_WINDOW_MINUTES => {
                unlock_at + Duration::minutes(ceil_minutes(window, multiplier.factor()))
            }
            None => return None,
        };

        Some(self.avoid_midnight(extended))
    }

    /// The LMS rejects a lock boundary of exactly 00:00 local time.
    fn avoid_midnight(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let local = instant.with_timezone(&self.tz);
        if local.hour() == 0 && local.minute() == 0 && local.second() == 0 {
            instant + Duration::minutes(1)
        } else {
            instant
        }
    }

    /// Whether a quiz can be offered for accommodation at all.
    ///
    /// A lock date that has passed or cannot be parsed always excludes the quiz.
    pub fn is_selectable(&self, quiz: &QuizSnapshot) -> bool {
        let lock_at = match &quiz.lock_at {
            Some(Timestamp::Valid(lock)) if *lock <= self.now => return false,
            Some(Timestamp::Valid(lock)) => Some(*lock),
            Some(Timestamp::Malformed(_)) => return false,
            None => None,
        };

        if quiz.time_limit_minutes.is_some() {
            return true;
        }

        match (valid_instant(&quiz.unlock_at), lock_at) {
            (Some(unlock), Some(lock)) => window_minutes(unlock, lock) <= OPEN_WINDOW_MINUTES,
            _ => false,
        }
    }

    pub fn plan_tier(&self, quiz: &QuizSnapshot, multiplier: Multiplier) -> TierPlan {
        let unlock_at = valid_instant(&quiz.unlock_at);
        let lock_at = valid_instant(&quiz.lock_at);

        let limit = new_time_limit(quiz.time_limit_minutes, Some(multiplier));
        let lock = self.new_lock_at(unlock_at, lock_at, limit, multiplier);
        let due = new_due_at(valid_instant(&quiz.due_at), lock, lock_at);

        let time_limit_changes = matches!(
            (limit, quiz.time_limit_minutes),
            (Some(new), Some(old)) if new != old
        );

        TierPlan {
            multiplier,
            new_time_limit: limit,
            new_lock_at: lock,
            new_due_at: due,
            time_limit_status: if time_limit_changes {
                ApplyStatus::Pending
            } else {
                ApplyStatus::NotApplicable
            },
            lock_status: if lock.is_some() {
                ApplyStatus::Pending
            } else {
                ApplyStatus::NotApplicable
            },
        }
    }

    pub fn plan_variant(&self, quiz: &QuizSnapshot, multipliers: &[Multiplier]) -> QuizVariant {
        QuizVariant {
            quiz: quiz.clone(),
            should_warn: should_warn(quiz),
            tiers: multipliers
                .iter()
                .map(|m| self.plan_tier(quiz, *m))
                .collect(),
        }
    }

    /// Instructor-facing rendering in the course time zone, e.g. "Mon Oct 12, 2026 11:59 PM".
    pub fn readable(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.tz)
            .format("%a %b %-d, %Y %-I:%M %p")
            .to_string()
    }

    pub fn readable_timestamp(&self, ts: &Option<Timestamp>) -> Option<String> {
        match ts.as_ref()? {
            Timestamp::Valid(dt) => Some(self.readable(*dt)),
            Timestamp::Malformed(raw) => Some(raw.clone()),
        }
    }

    /// Serializes an instant for the LMS in the course time zone.
    pub fn to_iso(&self, instant: DateTime<Utc>) -> String {
        instant.with_timezone(&self.tz).to_rfc3339()
    }
}

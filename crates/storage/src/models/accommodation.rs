use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::quiz::{QuizSnapshot, Timestamp};
use crate::error::{StorageError, ValidationReport};

/// Time multiplier tiers an accommodation can grant. Ordered ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub enum Multiplier {
    OneAndQuarter,
    OneAndHalf,
    Double,
}

impl Multiplier {
    pub fn all() -> &'static [Multiplier] {
        &[Self::OneAndQuarter, Self::OneAndHalf, Self::Double]
    }

    pub fn factor(&self) -> Decimal {
        match self {
            Self::OneAndQuarter => Decimal::new(125, 2),
            Self::OneAndHalf => Decimal::new(15, 1),
            Self::Double => Decimal::new(2, 0),
        }
    }

    fn parse_decimal(value: Decimal) -> Result<Self, StorageError> {
        let normalized = value.normalize();
        Self::all()
            .iter()
            .copied()
            .find(|m| m.factor().normalize() == normalized)
            .ok_or_else(|| {
                invalid_multiplier(format!(
                    "Unsupported multiplier {}. Expected one of: 1.25, 1.5, 2",
                    value
                ))
            })
    }
}

fn invalid_multiplier(message: String) -> StorageError {
    let mut report = ValidationReport::default();
    report.push("multiplier", message);
    StorageError::Validation(report)
}

impl TryFrom<Decimal> for Multiplier {
    type Error = StorageError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::parse_decimal(value)
    }
}

impl From<Multiplier> for Decimal {
    fn from(m: Multiplier) -> Self {
        m.factor()
    }
}

impl std::str::FromStr for Multiplier {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().trim_end_matches(['x', 'X']).parse::<Decimal>().map_err(|_| {
            invalid_multiplier(format!("Invalid multiplier: '{}'", s))
        })?;
        Self::parse_decimal(value)
    }
}

impl std::fmt::Display for Multiplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x", self.factor().normalize())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccommodationRequest {
    pub login_id: String,
    pub name: String,
    pub multiplier: Multiplier,
    pub lms_user_id: String,
}

/// All students granted the same multiplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentGroup {
    pub multiplier: Multiplier,
    pub students: Vec<AccommodationRequest>,
}

impl StudentGroup {
    pub fn student_ids(&self) -> Vec<String> {
        self.students.iter().map(|s| s.lms_user_id.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    Pending,
    Success,
    Failure,
    NotApplicable,
}

impl ApplyStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, ApplyStatus::Failure)
    }
}

/// The planned change of one quiz for one multiplier tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierPlan {
    pub multiplier: Multiplier,
    pub new_time_limit: Option<i64>,
    pub new_lock_at: Option<DateTime<Utc>>,
    pub new_due_at: Option<DateTime<Utc>>,
    pub time_limit_status: ApplyStatus,
    pub lock_status: ApplyStatus,
}

impl TierPlan {
    /// Extra minutes to grant on top of the original limit.
    pub fn extra_time(&self, original: Option<i64>) -> Option<i64> {
        match (self.new_time_limit, original) {
            (Some(new), Some(old)) => Some(new - old),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizVariant {
    pub quiz: QuizSnapshot,
    pub should_warn: bool,
    pub tiers: Vec<TierPlan>,
}

impl QuizVariant {
    pub fn tier(&self, multiplier: Multiplier) -> Option<&TierPlan> {
        self.tiers.iter().find(|t| t.multiplier == multiplier)
    }

    pub fn changes_lock(&self) -> bool {
        self.tiers.iter().any(|t| t.new_lock_at.is_some())
    }
}

/// A student who already has an availability override on a quiz the batch will change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub login_id: String,
    pub name: String,
    pub lms_user_id: String,
    pub quiz_id: String,
    pub quiz_title: String,
    pub override_id: String,
    pub current_unlock_at: Option<Timestamp>,
    pub current_lock_at: Option<Timestamp>,
    pub current_unlock_readable: Option<String>,
    pub current_lock_readable: Option<String>,
    pub override_unlock_at: Option<Timestamp>,
    pub override_lock_at: Option<Timestamp>,
    pub override_unlock_readable: Option<String>,
    pub override_lock_readable: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplier_parsing() {
        assert_eq!("1.25".parse::<Multiplier>().unwrap(), Multiplier::OneAndQuarter);
        assert_eq!("1.50".parse::<Multiplier>().unwrap(), Multiplier::OneAndHalf);
        assert_eq!("2x".parse::<Multiplier>().unwrap(), Multiplier::Double);
        assert_eq!("2.0".parse::<Multiplier>().unwrap(), Multiplier::Double);

        assert!("1.75".parse::<Multiplier>().is_err());
        assert!("fast".parse::<Multiplier>().is_err());
    }

    #[test]
    fn test_unsupported_multiplier_is_a_validation_error() {
        for raw in ["1.75", "fast"] {
            match raw.parse::<Multiplier>() {
                Err(StorageError::Validation(report)) => {
                    assert!(report.has_error_for("multiplier"))
                }
                other => panic!("expected validation error for {}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_multiplier_from_decimal() {
        assert_eq!(
            Multiplier::try_from(Decimal::new(15, 1)).unwrap(),
            Multiplier::OneAndHalf
        );
        assert!(Multiplier::try_from(Decimal::new(3, 0)).is_err());
    }

    #[test]
    fn test_multipliers_sort_ascending() {
        let mut tiers = vec![Multiplier::Double, Multiplier::OneAndQuarter, Multiplier::OneAndHalf];
        tiers.sort();
        assert_eq!(tiers, Multiplier::all());
    }

    #[test]
    fn test_multiplier_display() {
        assert_eq!(Multiplier::OneAndQuarter.to_string(), "1.25x");
        assert_eq!(Multiplier::Double.to_string(), "2x");
    }

    #[test]
    fn test_extra_time_is_delta() {
        let plan = TierPlan {
            multiplier: Multiplier::OneAndQuarter,
            new_time_limit: Some(77),
            new_lock_at: None,
            new_due_at: None,
            time_limit_status: ApplyStatus::Pending,
            lock_status: ApplyStatus::NotApplicable,
        };
        assert_eq!(plan.extra_time(Some(61)), Some(16));
        assert_eq!(plan.extra_time(None), None);
    }
}

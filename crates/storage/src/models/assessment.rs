use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A grading category of a course.
///
/// Weights are percentages with two decimal places. `min_weight <= default_weight <= max_weight`
/// holds for every persisted row, and the default weights of a course sum to 100.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assessment {
    pub assessment_id: Uuid,
    pub course_id: i64,
    pub title: String,
    pub default_weight: Decimal,
    pub min_weight: Decimal,
    pub max_weight: Decimal,
    /// Assignment group on the LMS this category is graded from.
    pub group_id: Option<String>,
    pub created_at: chrono::NaiveDateTime,
}

impl Assessment {
    pub fn accepts(&self, flex: Decimal) -> bool {
        flex >= self.min_weight && flex <= self.max_weight
    }
}

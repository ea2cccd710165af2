use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A student's chosen weight for one assessment. `flex` is null until the student picks one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FlexAllocation {
    pub student_id: Uuid,
    pub assessment_id: Uuid,
    pub flex: Option<Decimal>,
    pub updated_at: chrono::NaiveDateTime,
}

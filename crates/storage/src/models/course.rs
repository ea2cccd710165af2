use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A course mirrored from the LMS. `course_id` is the LMS course id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub course_id: i64,
    pub name: String,
    pub created_at: chrono::NaiveDateTime,
}

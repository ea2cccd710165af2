use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub student_id: Uuid,
    pub course_id: i64,
    pub login_id: String,
    /// User id on the LMS, the key every external snapshot uses.
    pub lms_user_id: String,
    pub sortable_name: String,
    /// Enrollment id on the LMS; the grade sink writes overrides against it.
    pub enrollment_id: Option<String>,
    pub created_at: chrono::NaiveDateTime,
}

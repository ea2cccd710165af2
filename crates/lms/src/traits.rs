//! Capability seams between the engines and the LMS.
//!
//! Orchestration code only ever talks to these traits; the Canvas adapter implements
//! all four and the tests swap in in-memory fakes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storage::models::{ExistingOverride, GradebookSnapshot, QuizSnapshot};

use crate::Result;

/// An availability override to create on a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRequest {
    pub title: String,
    pub student_ids: Vec<String>,
    pub unlock_at: Option<DateTime<Utc>>,
    pub lock_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
}

#[async_trait::async_trait]
pub trait GradeSource: Send + Sync {
    async fn fetch_gradebook(&self, course_id: i64) -> Result<GradebookSnapshot>;
}

#[async_trait::async_trait]
pub trait GradeSink: Send + Sync {
    /// Sets the final-grade override of one enrollment. Repeating a call is harmless.
    async fn set_override_score(&self, enrollment_id: &str, score: Decimal) -> Result<()>;
}

#[async_trait::async_trait]
pub trait QuizSource: Send + Sync {
    async fn list_quizzes(&self, course_id: i64) -> Result<Vec<QuizSnapshot>>;

    async fn list_overrides(
        &self,
        course_id: i64,
        quiz: &QuizSnapshot,
    ) -> Result<Vec<ExistingOverride>>;
}

#[async_trait::async_trait]
pub trait QuizSink: Send + Sync {
    /// Grants `extra_minutes` on top of the quiz time limit to every student listed.
    async fn add_extra_time(
        &self,
        course_id: i64,
        quiz: &QuizSnapshot,
        student_ids: &[String],
        extra_minutes: i64,
    ) -> Result<()>;

    async fn create_override(
        &self,
        course_id: i64,
        quiz: &QuizSnapshot,
        request: &OverrideRequest,
    ) -> Result<ExistingOverride>;

    async fn delete_override(
        &self,
        course_id: i64,
        quiz: &QuizSnapshot,
        override_id: &str,
    ) -> Result<()>;
}

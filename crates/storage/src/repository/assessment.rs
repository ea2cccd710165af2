use sqlx::PgPool;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use crate::dto::AssessmentInput;
use crate::error::{Result, StorageError, ValidationReport};
use crate::models::Assessment;
use crate::services::validate_assessment_batch;

pub struct AssessmentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AssessmentRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_by_course(&self, course_id: i64) -> Result<Vec<Assessment>> {
        let assessments = sqlx::query_as::<_, Assessment>(
            r#"
            SELECT assessment_id, course_id, title, default_weight, min_weight, max_weight,
                   group_id, created_at
            FROM assessments
            WHERE course_id = $1
            ORDER BY created_at, title
            "#,
        )
        .bind(course_id)
        .fetch_all(self.pool)
        .await?;

        Ok(assessments)
    }

    /// Replaces the course's assessment set with `inputs`.
    ///
    /// Inputs carrying an id update that assessment, the others are created, and any
    /// assessment missing from the batch is deleted together with its allocations.
    /// Every enrolled student gets an empty allocation row for new assessments.
    pub async fn replace_batch(
        &self,
        course_id: i64,
        inputs: &[AssessmentInput],
    ) -> Result<Vec<Assessment>> {
        validate_assessment_batch(inputs)?;

        let existing: HashSet<Uuid> = self
            .list_by_course(course_id)
            .await?
            .into_iter()
            .map(|a| a.assessment_id)
            .collect();

        let mut report = ValidationReport::default();
        for (idx, input) in inputs.iter().enumerate() {
            if let Some(id) = input.assessment_id {
                if !existing.contains(&id) {
                    report.push(
                        format!("assessments[{}].assessment_id", idx),
                        format!("Assessment {} does not belong to course {}", id, course_id),
                    );
                }
            }
        }
        report.into_result()?;

        let kept: Vec<Uuid> = inputs.iter().filter_map(|i| i.assessment_id).collect();

        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM assessments
            WHERE course_id = $1 AND NOT (assessment_id = ANY($2))
            "#,
        )
        .bind(course_id)
        .bind(&kept)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        for input in inputs {
            match input.assessment_id {
                Some(id) => {
                    sqlx::query(
                        r#"
                        UPDATE assessments
                        SET title = $2, default_weight = $3, min_weight = $4,
                            max_weight = $5, group_id = $6
                        WHERE assessment_id = $1
                        "#,
                    )
                    .bind(id)
                    .bind(input.title.trim())
                    .bind(input.default_weight)
                    .bind(input.min_weight)
                    .bind(input.max_weight)
                    .bind(&input.group_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        on_duplicate_title(
                            e,
                            format!("Assessment title already taken: '{}'", input.title),
                        )
                    })?;
                }
                None => {
                    sqlx::query(
                        r#"
                        INSERT INTO assessments (assessment_id, course_id, title, default_weight,
                                                 min_weight, max_weight, group_id)
                        VALUES ($1, $2, $3, $4, $5, $6, $7)
                        "#,
                    )
                    .bind(Uuid::new_v4())
                    .bind(course_id)
                    .bind(input.title.trim())
                    .bind(input.default_weight)
                    .bind(input.min_weight)
                    .bind(input.max_weight)
                    .bind(&input.group_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        on_duplicate_title(
                            e,
                            format!("Assessment title already taken: '{}'", input.title),
                        )
                    })?;
                }
            }
        }

        let provisioned = sqlx::query(
            r#"
            INSERT INTO flex_allocations (student_id, assessment_id)
            SELECT s.student_id, a.assessment_id
            FROM students s
            JOIN assessments a ON a.course_id = s.course_id
            WHERE s.course_id = $1
            ON CONFLICT (student_id, assessment_id) DO NOTHING
            "#,
        )
        .bind(course_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit()
            .await
            .map_err(|e| {
                on_duplicate_title(e, "Assessment titles must be unique within a course")
            })?;

        info!(
            "Replaced assessments of course {}: {} saved, {} deleted, {} allocation rows provisioned",
            course_id,
            inputs.len(),
            deleted,
            provisioned
        );

        self.list_by_course(course_id).await
    }
}

fn on_duplicate_title(error: sqlx::Error, message: impl Into<String>) -> StorageError {
    match StorageError::from(error) {
        err if err.is_unique_violation() => StorageError::ConstraintViolation(message.into()),
        err => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;

    #[derive(Debug)]
    struct PgError {
        code: &'static str,
    }

    impl std::fmt::Display for PgError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "pg error {}", self.code)
        }
    }

    impl std::error::Error for PgError {}

    impl DatabaseError for PgError {
        fn message(&self) -> &str {
            "pg error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.code {
                "23505" => ErrorKind::UniqueViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn pg_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(PgError { code }))
    }

    #[test]
    fn test_duplicate_title_becomes_constraint_violation() {
        match on_duplicate_title(pg_error("23505"), "Assessment title already taken: 'Exams'") {
            StorageError::ConstraintViolation(message) => assert!(message.contains("Exams")),
            other => panic!("expected constraint violation, got {:?}", other),
        }
    }

    #[test]
    fn test_other_database_errors_pass_through() {
        let err = on_duplicate_title(pg_error("23514"), "unused");
        assert!(matches!(err, StorageError::Database(_)));
    }
}

use sqlx::PgPool;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::dto::AllocationInput;
use crate::error::Result;
use crate::models::FlexAllocation;
use crate::repository::assessment::AssessmentRepository;
use crate::repository::student::StudentRepository;
use crate::services::{students_out_of_range, validate_allocations};

pub struct AllocationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AllocationRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_for_student(&self, student_id: Uuid) -> Result<Vec<FlexAllocation>> {
        let allocations = sqlx::query_as::<_, FlexAllocation>(
            r#"
            SELECT student_id, assessment_id, flex, updated_at
            FROM flex_allocations
            WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_all(self.pool)
        .await?;

        Ok(allocations)
    }

    pub async fn list_by_course(&self, course_id: i64) -> Result<Vec<FlexAllocation>> {
        let allocations = sqlx::query_as::<_, FlexAllocation>(
            r#"
            SELECT f.student_id, f.assessment_id, f.flex, f.updated_at
            FROM flex_allocations f
            JOIN assessments a ON a.assessment_id = f.assessment_id
            WHERE a.course_id = $1
            "#,
        )
        .bind(course_id)
        .fetch_all(self.pool)
        .await?;

        Ok(allocations)
    }

    /// Allocations of every student of the course keyed by LMS user id, the shape the
    /// grade aggregator consumes.
    pub async fn by_lms_user(&self, course_id: i64) -> Result<HashMap<String, Vec<FlexAllocation>>> {
        let students = StudentRepository::new(self.pool)
            .list_by_course(course_id)
            .await?;
        let lms_ids: HashMap<Uuid, String> = students
            .into_iter()
            .map(|s| (s.student_id, s.lms_user_id))
            .collect();

        let mut by_user: HashMap<String, Vec<FlexAllocation>> = HashMap::new();
        for allocation in self.list_by_course(course_id).await? {
            if let Some(lms_user_id) = lms_ids.get(&allocation.student_id) {
                by_user
                    .entry(lms_user_id.clone())
                    .or_default()
                    .push(allocation);
            }
        }

        Ok(by_user)
    }

    /// Replaces a student's choices after validating the whole set.
    pub async fn set_for_student(
        &self,
        student_id: Uuid,
        inputs: &[AllocationInput],
    ) -> Result<Vec<FlexAllocation>> {
        let student = StudentRepository::new(self.pool)
            .find_by_id(student_id)
            .await?;
        let assessments = AssessmentRepository::new(self.pool)
            .list_by_course(student.course_id)
            .await?;

        validate_allocations(&assessments, inputs)?;

        let mut tx = self.pool.begin().await?;
        for input in inputs {
            sqlx::query(
                r#"
                INSERT INTO flex_allocations (student_id, assessment_id, flex, updated_at)
                VALUES ($1, $2, $3, NOW())
                ON CONFLICT (student_id, assessment_id)
                DO UPDATE SET flex = EXCLUDED.flex, updated_at = NOW()
                "#,
            )
            .bind(student_id)
            .bind(input.assessment_id)
            .bind(input.flex)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.list_for_student(student_id).await
    }

    /// Clears every allocation of students holding a choice outside the current bounds.
    /// Returns the number of students reset.
    pub async fn reset_out_of_range(&self, course_id: i64) -> Result<usize> {
        let assessments = AssessmentRepository::new(self.pool)
            .list_by_course(course_id)
            .await?;
        let allocations = self.list_by_course(course_id).await?;

        let students = students_out_of_range(&assessments, &allocations);
        if students.is_empty() {
            return Ok(0);
        }

        sqlx::query(
            r#"
            UPDATE flex_allocations
            SET flex = NULL, updated_at = NOW()
            WHERE student_id = ANY($1)
            "#,
        )
        .bind(&students)
        .execute(self.pool)
        .await?;

        info!(
            "Reset allocations of {} students in course {}",
            students.len(),
            course_id
        );

        Ok(students.len())
    }
}

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::models::Student;

pub struct StudentRepository<'a> {
    pool: &'a PgPool,
}

/// Roster entry as read from the LMS.
#[derive(Debug, Clone)]
pub struct EnrollStudent {
    pub login_id: String,
    pub lms_user_id: String,
    pub sortable_name: String,
    pub enrollment_id: Option<String>,
}

impl<'a> StudentRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_by_course(&self, course_id: i64) -> Result<Vec<Student>> {
        let students = sqlx::query_as::<_, Student>(
            r#"
            SELECT student_id, course_id, login_id, lms_user_id, sortable_name,
                   enrollment_id, created_at
            FROM students
            WHERE course_id = $1
            ORDER BY sortable_name, login_id
            "#,
        )
        .bind(course_id)
        .fetch_all(self.pool)
        .await?;

        Ok(students)
    }

    pub async fn find_by_id(&self, student_id: Uuid) -> Result<Student> {
        let student = sqlx::query_as::<_, Student>(
            r#"
            SELECT student_id, course_id, login_id, lms_user_id, sortable_name,
                   enrollment_id, created_at
            FROM students
            WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        Ok(student)
    }

    /// Enrolls (or refreshes) a student and provisions an empty allocation row for every
    /// assessment of the course.
    pub async fn enroll(&self, course_id: i64, entry: &EnrollStudent) -> Result<Student> {
        let mut tx = self.pool.begin().await?;

        let student = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (student_id, course_id, login_id, lms_user_id, sortable_name, enrollment_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (course_id, lms_user_id) DO UPDATE SET
                login_id = EXCLUDED.login_id,
                sortable_name = EXCLUDED.sortable_name,
                enrollment_id = EXCLUDED.enrollment_id
            RETURNING student_id, course_id, login_id, lms_user_id, sortable_name,
                      enrollment_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(&entry.login_id)
        .bind(&entry.lms_user_id)
        .bind(&entry.sortable_name)
        .bind(&entry.enrollment_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO flex_allocations (student_id, assessment_id)
            SELECT $1, assessment_id FROM assessments WHERE course_id = $2
            ON CONFLICT (student_id, assessment_id) DO NOTHING
            "#,
        )
        .bind(student.student_id)
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(student)
    }
}

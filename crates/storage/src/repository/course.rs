use sqlx::PgPool;

use crate::error::Result;
use crate::models::Course;

pub struct CourseRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CourseRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Creates the course or refreshes its name from the LMS.
    pub async fn upsert(&self, course_id: i64, name: &str) -> Result<Course> {
        let course = sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses (course_id, name)
            VALUES ($1, $2)
            ON CONFLICT (course_id) DO UPDATE SET name = EXCLUDED.name
            RETURNING course_id, name, created_at
            "#,
        )
        .bind(course_id)
        .bind(name)
        .fetch_one(self.pool)
        .await?;

        Ok(course)
    }
}

//! Courses

use soun_common::db::Course;
use soun_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// Partial update; `None` fields keep their current value
#[derive(Debug, Default)]
pub struct CourseUpdate<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub color: Option<&'a str>,
}

pub async fn list_courses(pool: &PgPool, user_id: Uuid) -> Result<Vec<Course>> {
    let courses = sqlx::query_as::<_, Course>(
        "SELECT * FROM courses WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(courses)
}

pub async fn get_course(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> Result<Option<Course>> {
    let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1 AND user_id = $2")
        .bind(course_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(course)
}

pub async fn create_course(
    pool: &PgPool,
    user_id: Uuid,
    name: &str,
    description: Option<&str>,
    color: Option<&str>,
) -> Result<Course> {
    let course = sqlx::query_as::<_, Course>(
        r#"
        INSERT INTO courses (id, user_id, name, description, color)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(name)
    .bind(description)
    .bind(color)
    .fetch_one(pool)
    .await?;

    Ok(course)
}

pub async fn update_course(
    pool: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
    update: CourseUpdate<'_>,
) -> Result<Option<Course>> {
    let course = sqlx::query_as::<_, Course>(
        r#"
        UPDATE courses
        SET name = COALESCE($3, name),
            description = COALESCE($4, description),
            color = COALESCE($5, color),
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(course_id)
    .bind(user_id)
    .bind(update.name)
    .bind(update.description)
    .bind(update.color)
    .fetch_optional(pool)
    .await?;

    Ok(course)
}

/// Delete a course, returning the stored paths of its documents
///
/// Dependent rows go with it through `ON DELETE CASCADE`; files on disk are
/// the caller's job. `None` means the course did not exist for this user.
pub async fn delete_course(
    pool: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<Option<Vec<String>>> {
    let mut tx = pool.begin().await?;

    let paths: Vec<String> = sqlx::query_scalar(
        "SELECT stored_path FROM documents WHERE course_id = $1 AND user_id = $2",
    )
    .bind(course_id)
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;

    let result = sqlx::query("DELETE FROM courses WHERE id = $1 AND user_id = $2")
        .bind(course_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    tx.commit().await?;
    Ok(Some(paths))
}

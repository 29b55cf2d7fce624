//! Uploaded documents

use soun_common::db::Document;
use soun_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

pub struct NewDocument<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub original_name: &'a str,
    pub stored_path: &'a str,
    pub mime_type: &'a str,
    pub kind: &'a str,
    pub size_bytes: i64,
    pub content_text: Option<&'a str>,
}

pub async fn insert_document(pool: &PgPool, doc: NewDocument<'_>) -> Result<Document> {
    let document = sqlx::query_as::<_, Document>(
        r#"
        INSERT INTO documents
            (id, user_id, course_id, original_name, stored_path, mime_type, kind, size_bytes, content_text)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(doc.id)
    .bind(doc.user_id)
    .bind(doc.course_id)
    .bind(doc.original_name)
    .bind(doc.stored_path)
    .bind(doc.mime_type)
    .bind(doc.kind)
    .bind(doc.size_bytes)
    .bind(doc.content_text)
    .fetch_one(pool)
    .await?;

    Ok(document)
}

pub async fn list_documents(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> Result<Vec<Document>> {
    let documents = sqlx::query_as::<_, Document>(
        "SELECT * FROM documents WHERE user_id = $1 AND course_id = $2 ORDER BY uploaded_at DESC",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(documents)
}

pub async fn get_document(pool: &PgPool, user_id: Uuid, document_id: Uuid) -> Result<Option<Document>> {
    let document =
        sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1 AND user_id = $2")
            .bind(document_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(document)
}

/// Delete the row and hand it back so the caller can remove the file
pub async fn delete_document(
    pool: &PgPool,
    user_id: Uuid,
    document_id: Uuid,
) -> Result<Option<Document>> {
    let document = sqlx::query_as::<_, Document>(
        "DELETE FROM documents WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(document_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(document)
}

/// Extracted text of a course's documents, newest first
pub async fn course_texts(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> Result<Vec<String>> {
    let texts: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT content_text FROM documents
        WHERE user_id = $1 AND course_id = $2 AND content_text IS NOT NULL
        ORDER BY uploaded_at DESC
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(texts)
}

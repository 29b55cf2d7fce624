//! Database models
//!
//! One row struct per table. JSONB columns decode through `sqlx::types::Json`,
//! which serializes transparently as its inner value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Setting {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Course {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Uploaded document metadata
///
/// `stored_path` and `content_text` stay server-side.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub original_name: String,
    #[serde(skip_serializing)]
    pub stored_path: String,
    pub mime_type: String,
    pub kind: String,
    pub size_bytes: i64,
    #[serde(skip_serializing)]
    pub content_text: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub topic: String,
    pub question: String,
    pub options: Json<Vec<String>>,
    pub correct_index: i32,
    pub explanation: Option<String>,
    pub difficulty: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct QuizSessionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub topic: Option<String>,
    pub state: String,
    pub question_ids: Json<Vec<Uuid>>,
    pub current_index: i32,
    pub correct_count: i32,
    pub answered_count: i32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    pub question_id: Uuid,
    pub course_id: Uuid,
    pub topic: String,
    pub selected_index: i32,
    pub is_correct: bool,
    pub response_time_ms: Option<i64>,
    pub attempted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Flashcard {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub topic: String,
    pub front: String,
    pub back: String,
    pub review_count: i32,
    pub correct_count: i32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Per-topic mastery for a user within a course
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StudyLevel {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub topic: String,
    pub mastery_level: i32,
    pub attempts: i32,
    pub correct: i32,
    pub last_studied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StudyGuide {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub content: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VoiceCommand {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Option<Uuid>,
    pub input_mode: String,
    pub transcript: String,
    pub response: String,
    pub emotions: Json<Vec<String>>,
    pub topics: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

//! Flashcards

use crate::db::mastery;
use crate::services::adaptive::StudyActivity;
use soun_common::db::{retry_transient, Flashcard, StudyLevel};
use soun_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

pub struct NewFlashcard {
    pub topic: String,
    pub front: String,
    pub back: String,
}

/// Insert a batch atomically
pub async fn insert_flashcards(
    pool: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
    cards: &[NewFlashcard],
) -> Result<Vec<Flashcard>> {
    let mut tx = pool.begin().await?;
    let mut inserted = Vec::with_capacity(cards.len());

    for card in cards {
        let row = sqlx::query_as::<_, Flashcard>(
            r#"
            INSERT INTO flashcards (id, user_id, course_id, topic, front, back)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(course_id)
        .bind(&card.topic)
        .bind(&card.front)
        .bind(&card.back)
        .fetch_one(&mut *tx)
        .await?;
        inserted.push(row);
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Cards for a course, optionally narrowed to one topic
pub async fn list_flashcards(
    pool: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
    topic: Option<&str>,
) -> Result<Vec<Flashcard>> {
    let cards = sqlx::query_as::<_, Flashcard>(
        r#"
        SELECT * FROM flashcards
        WHERE user_id = $1 AND course_id = $2 AND ($3::text IS NULL OR topic = $3)
        ORDER BY created_at
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(topic)
    .fetch_all(pool)
    .await?;

    Ok(cards)
}

pub async fn get_flashcard(pool: &PgPool, user_id: Uuid, card_id: Uuid) -> Result<Option<Flashcard>> {
    let card = sqlx::query_as::<_, Flashcard>("SELECT * FROM flashcards WHERE id = $1 AND user_id = $2")
        .bind(card_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(card)
}

pub async fn delete_flashcard(pool: &PgPool, user_id: Uuid, card_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM flashcards WHERE id = $1 AND user_id = $2")
        .bind(card_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub struct AppliedReview {
    pub card: Flashcard,
    pub level: StudyLevel,
}

/// Count a review on the card and move topic mastery, atomically
///
/// `None` when the card no longer exists; nothing is written then.
pub async fn apply_review(
    pool: &PgPool,
    max_attempts: u32,
    user_id: Uuid,
    card_id: Uuid,
    knew: bool,
) -> Result<Option<AppliedReview>> {
    retry_transient("record flashcard review", max_attempts, || async move {
        let mut tx = pool.begin().await?;

        let card = sqlx::query_as::<_, Flashcard>(
            r#"
            UPDATE flashcards
            SET review_count = review_count + 1,
                correct_count = correct_count + $3,
                last_reviewed_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(card_id)
        .bind(user_id)
        .bind(i32::from(knew))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(card) = card else {
            tx.rollback().await?;
            return Ok(None);
        };

        let level = mastery::apply_activity(
            &mut *tx,
            user_id,
            card.course_id,
            &card.topic,
            StudyActivity::FlashcardReview { knew },
        )
        .await?;

        tx.commit().await?;
        Ok(Some(AppliedReview { card, level }))
    })
    .await
}

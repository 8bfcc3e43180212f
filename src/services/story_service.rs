use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{CreateStoryRequest, Story},
};

pub async fn submit(db: &SqlitePool, payload: &CreateStoryRequest) -> Result<Story> {
    let story_id = Uuid::new_v4();
    let now = Utc::now();

    let story = sqlx::query_as::<_, Story>(
        r#"
        INSERT INTO stories (
            id, title, content, author_id, category, tags,
            vote_count, is_priority, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(story_id)
    .bind(&payload.title)
    .bind(&payload.content)
    .bind(&payload.author_id)
    .bind(&payload.category)
    .bind(sqlx::types::Json(&payload.tags))
    .bind(payload.wants_priority)
    .bind(now)
    .bind(now)
    .fetch_one(db)
    .await?;

    tracing::info!("Story {} submitted by {}", story.id, story.author_id);

    Ok(story)
}

pub async fn get(db: &SqlitePool, story_id: Uuid) -> Result<Option<Story>> {
    let story = sqlx::query_as::<_, Story>("SELECT * FROM stories WHERE id = ?")
        .bind(story_id)
        .fetch_optional(db)
        .await?;

    Ok(story)
}

pub async fn list_all(db: &SqlitePool) -> Result<Vec<Story>> {
    let stories = sqlx::query_as::<_, Story>("SELECT * FROM stories ORDER BY rowid")
        .fetch_all(db)
        .await?;

    Ok(stories)
}

/// Applies a signed vote delta to a story's count, floored at zero.
///
/// Called only by the vote ledger, inside its transaction, so the count
/// can never drift from the committed vote records.
pub async fn apply_vote_delta(
    conn: &mut SqliteConnection,
    story_id: Uuid,
    delta: i64,
) -> Result<i64> {
    let result = sqlx::query(
        "UPDATE stories SET vote_count = MAX(vote_count + ?, 0), updated_at = ? WHERE id = ?",
    )
    .bind(delta)
    .bind(Utc::now())
    .bind(story_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Story {story_id} not found")));
    }

    let new_count = sqlx::query_scalar::<_, i64>("SELECT vote_count FROM stories WHERE id = ?")
        .bind(story_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(new_count)
}

/// Permanent priority flag, set once the priority purchase clears.
/// Idempotent: flagging an already-priority story is a no-op.
pub async fn set_priority(conn: &mut SqliteConnection, story_id: Uuid) -> Result<()> {
    let result = sqlx::query("UPDATE stories SET is_priority = 1, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(story_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Story {story_id} not found")));
    }

    Ok(())
}

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{VoteCredit, VoteType},
    services::story_service,
};

/// Adds credits to a user's balance, creating the ledger row on first grant.
///
/// Takes a connection so the payment webhook can grant inside its own
/// settlement transaction.
pub async fn grant_credits(
    conn: &mut SqliteConnection,
    user_id: &str,
    amount: i64,
) -> Result<i64> {
    if amount <= 0 {
        return Err(AppError::Validation(
            "credit grant amount must be positive".to_string(),
        ));
    }

    let now = Utc::now();
    let balance = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO vote_credits (user_id, balance, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (user_id)
        DO UPDATE SET balance = balance + excluded.balance, updated_at = excluded.updated_at
        RETURNING balance
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!("Granted {} credits to {}, balance now {}", amount, user_id, balance);

    Ok(balance)
}

/// Casts a vote: one credit consumed, one record per (story, user), the
/// story count updated, all as a single unit.
///
/// Returns the story's new vote count.
pub async fn cast_vote(
    db: &SqlitePool,
    story_id: Uuid,
    user_id: &str,
    vote_type: VoteType,
) -> Result<i64> {
    // Stories are never deleted, so the existence check can sit outside
    // the transaction.
    story_service::get(db, story_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Story not found".to_string()))?;

    let now = Utc::now();
    let mut tx = db.begin().await?;

    // The record insert is the first statement of the transaction:
    // concurrent casts serialize on the write lock, and the second one
    // sees the committed row as a unique violation.
    let inserted = sqlx::query(
        "INSERT INTO vote_records (id, story_id, user_id, vote_type, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4())
    .bind(story_id)
    .bind(user_id)
    .bind(vote_type)
    .bind(now)
    .execute(&mut *tx)
    .await;

    if let Err(e) = inserted {
        if is_unique_violation(&e) {
            return Err(AppError::DuplicateVote);
        }
        return Err(e.into());
    }

    let debited = sqlx::query(
        "UPDATE vote_credits SET balance = balance - 1, updated_at = ? WHERE user_id = ? AND balance >= 1",
    )
    .bind(now)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    if debited.rows_affected() == 0 {
        return Err(AppError::InsufficientCredits);
    }

    let new_count = story_service::apply_vote_delta(&mut tx, story_id, vote_type.delta()).await?;

    tx.commit().await?;

    Ok(new_count)
}

pub async fn balance(db: &SqlitePool, user_id: &str) -> Result<i64> {
    let credit = sqlx::query_as::<_, VoteCredit>("SELECT * FROM vote_credits WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(db)
        .await?;

    Ok(credit.map(|c| c.balance).unwrap_or(0))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

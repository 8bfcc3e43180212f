use chrono::{DateTime, Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{BoostSession, BoostStatus, PaymentOutcome, SUPPORTED_BOOST_DURATIONS},
    services::story_service,
};

pub async fn request_boost(
    db: &SqlitePool,
    story_id: Uuid,
    duration_hours: i64,
    amount: i64,
) -> Result<BoostSession> {
    if !SUPPORTED_BOOST_DURATIONS.contains(&duration_hours) {
        return Err(AppError::Validation(format!(
            "unsupported boost duration: {duration_hours}h"
        )));
    }
    if amount <= 0 {
        return Err(AppError::Validation(
            "boost amount must be positive".to_string(),
        ));
    }

    story_service::get(db, story_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Story not found".to_string()))?;

    let now = Utc::now();
    let session = sqlx::query_as::<_, BoostSession>(
        r#"
        INSERT INTO boost_sessions (
            id, story_id, duration_hours, amount,
            status, payment_status, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, 'requested', 'unpaid', ?, ?)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(story_id)
    .bind(duration_hours)
    .bind(amount)
    .bind(now)
    .bind(now)
    .fetch_one(db)
    .await?;

    tracing::info!(
        "Boost session {} requested for story {} ({}h)",
        session.id,
        story_id,
        duration_hours
    );

    Ok(session)
}

pub async fn get(db: &SqlitePool, boost_id: Uuid) -> Result<Option<BoostSession>> {
    let session = sqlx::query_as::<_, BoostSession>("SELECT * FROM boost_sessions WHERE id = ?")
        .bind(boost_id)
        .fetch_optional(db)
        .await?;

    Ok(session)
}

/// Moves a requested session to pending payment, recording the opaque
/// provider reference. Runs on the checkout-creation connection so the
/// handle and the transition commit together.
pub async fn mark_pending_payment(
    conn: &mut SqliteConnection,
    boost_id: Uuid,
    payment_ref: &str,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE boost_sessions SET status = 'pending_payment', payment_ref = ?, updated_at = ? WHERE id = ? AND status = 'requested'",
    )
    .bind(payment_ref)
    .bind(Utc::now())
    .bind(boost_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::InvalidStateTransition(format!(
            "boost session {boost_id} cannot move to pending payment"
        )));
    }

    Ok(())
}

/// Applies a payment outcome to a pending boost.
///
/// Idempotent: a repeat delivery of the same terminal outcome is a no-op;
/// a conflicting outcome after settlement is rejected. A `completed`
/// outcome activates the boost and supersedes any other active boost on
/// the same story in the same transaction (last confirmed wins). Pending
/// sessions older than `pending_cutoff` can no longer be activated.
pub async fn report_payment_outcome(
    db: &SqlitePool,
    boost_id: Uuid,
    outcome: PaymentOutcome,
    now: DateTime<Utc>,
    pending_cutoff: DateTime<Utc>,
) -> Result<BoostSession> {
    // duration_hours is immutable, so it is safe to read before the
    // transaction; the conditional update below is the authority on state.
    let session = get(db, boost_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Boost session {boost_id} not found")))?;

    let mut tx = db.begin().await?;

    let fresh = match outcome {
        PaymentOutcome::Completed => {
            let end_time = now + Duration::hours(session.duration_hours);
            let promoted = sqlx::query(
                r#"
                UPDATE boost_sessions
                SET status = 'active', payment_status = 'completed',
                    start_time = ?, end_time = ?, updated_at = ?
                WHERE id = ? AND status = 'pending_payment' AND created_at > ?
                "#,
            )
            .bind(now)
            .bind(end_time)
            .bind(now)
            .bind(boost_id)
            .bind(pending_cutoff)
            .execute(&mut *tx)
            .await?;

            if promoted.rows_affected() == 1 {
                // Last confirmed wins: any other active boost on the story
                // is cancelled in the same transaction.
                let superseded = sqlx::query(
                    "UPDATE boost_sessions SET status = 'cancelled', superseded_by = ?, updated_at = ? WHERE story_id = ? AND status = 'active' AND id != ?",
                )
                .bind(boost_id)
                .bind(now)
                .bind(session.story_id)
                .bind(boost_id)
                .execute(&mut *tx)
                .await?;

                if superseded.rows_affected() > 0 {
                    tracing::info!(
                        "Boost session {} superseded {} earlier boost(s) on story {}",
                        boost_id,
                        superseded.rows_affected(),
                        session.story_id
                    );
                }
                true
            } else {
                false
            }
        }
        PaymentOutcome::Failed => {
            let cancelled = sqlx::query(
                "UPDATE boost_sessions SET status = 'cancelled', payment_status = 'failed', updated_at = ? WHERE id = ? AND status IN ('requested', 'pending_payment')",
            )
            .bind(now)
            .bind(boost_id)
            .execute(&mut *tx)
            .await?;

            cancelled.rows_affected() == 1
        }
    };

    if fresh {
        tx.commit().await?;
        tracing::info!("Boost session {} settled as {:?}", boost_id, outcome);
    } else {
        // The conditional update matched nothing: either a repeat delivery
        // or a transition the state machine forbids. Any lazy cancellation
        // written while deciding must survive the error, so commit first.
        let verdict = settle_repeat(&mut tx, boost_id, outcome, now).await;
        tx.commit().await?;
        verdict?;
    }

    get(db, boost_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Boost session {boost_id} not found")))
}

async fn settle_repeat(
    conn: &mut SqliteConnection,
    boost_id: Uuid,
    outcome: PaymentOutcome,
    now: DateTime<Utc>,
) -> Result<()> {
    let current = sqlx::query_as::<_, BoostSession>("SELECT * FROM boost_sessions WHERE id = ?")
        .bind(boost_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Boost session {boost_id} not found")))?;

    // Still pending here means the activation guard refused it: the
    // session sat unpaid past the timeout window. The first observer
    // persists the cancellation; the late outcome is never honoured.
    if current.status == BoostStatus::PendingPayment {
        sqlx::query("UPDATE boost_sessions SET status = 'cancelled', updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(boost_id)
            .execute(&mut *conn)
            .await?;
        return Err(AppError::InvalidStateTransition(format!(
            "payment outcome for boost session {boost_id} arrived after the pending window expired"
        )));
    }

    if current.payment_status == outcome.payment_status() {
        // Repeat delivery of the same terminal outcome.
        return Ok(());
    }

    Err(AppError::InvalidStateTransition(format!(
        "boost session {boost_id} is already settled as {:?}",
        current.payment_status
    )))
}

/// Explicit user cancellation of a boost that has not settled yet.
pub async fn cancel_boost(db: &SqlitePool, boost_id: Uuid) -> Result<()> {
    let result = sqlx::query(
        "UPDATE boost_sessions SET status = 'cancelled', updated_at = ? WHERE id = ? AND status IN ('requested', 'pending_payment')",
    )
    .bind(Utc::now())
    .bind(boost_id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        let current = get(db, boost_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Boost session {boost_id} not found")))?;
        if current.status == BoostStatus::Cancelled {
            return Ok(());
        }
        return Err(AppError::InvalidStateTransition(format!(
            "boost session {boost_id} is {:?} and can no longer be cancelled",
            current.status
        )));
    }

    tracing::info!("Boost session {} cancelled", boost_id);

    Ok(())
}

/// The active boost for a story, if any, applying lazy expiry: the first
/// observer of an overdue boost persists the expired transition.
pub async fn current_boost(
    db: &SqlitePool,
    story_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<BoostSession>> {
    sqlx::query(
        "UPDATE boost_sessions SET status = 'expired', updated_at = ? WHERE story_id = ? AND status = 'active' AND end_time <= ?",
    )
    .bind(now)
    .bind(story_id)
    .bind(now)
    .execute(db)
    .await?;

    let session = sqlx::query_as::<_, BoostSession>(
        "SELECT * FROM boost_sessions WHERE story_id = ? AND status = 'active' ORDER BY start_time DESC LIMIT 1",
    )
    .bind(story_id)
    .fetch_optional(db)
    .await?;

    Ok(session)
}

/// Persists `active -> expired` for every overdue boost. Run by read
/// paths before evaluating boost standing; not a background requirement.
pub async fn expire_overdue(db: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE boost_sessions SET status = 'expired', updated_at = ? WHERE status = 'active' AND end_time <= ?",
    )
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    Ok(result.rows_affected())
}

/// Persists cancellation of payments that never reported an outcome
/// within the wait window.
pub async fn cancel_stale_pending(
    db: &SqlitePool,
    pending_cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE boost_sessions SET status = 'cancelled', updated_at = ? WHERE status = 'pending_payment' AND created_at <= ?",
    )
    .bind(now)
    .bind(pending_cutoff)
    .execute(db)
    .await?;

    Ok(result.rows_affected())
}

use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        BoostSession, CheckoutResponse, PaymentKind, PaymentOutcome, PaymentSession,
        PaymentStatus, VotePack,
    },
    services::{boost_service, story_service, vote_service},
};

/// Provider-style opaque session handle, e.g. `cs_boost_x7k2m9q4w1e8t`.
fn new_session_id(prefix: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(13)
        .map(char::from)
        .collect();
    format!("{prefix}{}", suffix.to_lowercase())
}

fn checkout_url(config: &Config, session_id: &str) -> String {
    format!("{}/{}", config.checkout_base_url, session_id)
}

/// Creates the checkout session for a requested boost and moves the boost
/// to pending payment, as one unit.
pub async fn create_boost_checkout(
    db: &SqlitePool,
    config: &Config,
    boost: &BoostSession,
) -> Result<CheckoutResponse> {
    let session_id = new_session_id("cs_boost_");
    let now = Utc::now();

    let mut tx = db.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO payment_sessions (
            id, kind, story_id, boost_session_id, amount,
            payment_status, created_at, updated_at
        )
        VALUES (?, 'boost', ?, ?, ?, 'unpaid', ?, ?)
        "#,
    )
    .bind(&session_id)
    .bind(boost.story_id)
    .bind(boost.id)
    .bind(boost.amount)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    boost_service::mark_pending_payment(&mut tx, boost.id, &session_id).await?;
    tx.commit().await?;

    tracing::info!(
        "Checkout session {} created for boost {}",
        session_id,
        boost.id
    );

    Ok(CheckoutResponse {
        checkout_url: checkout_url(config, &session_id),
        session_id,
    })
}

/// Checkout session for a permanent priority purchase on an existing story.
pub async fn create_priority_checkout(
    db: &SqlitePool,
    config: &Config,
    story_id: Uuid,
    amount: i64,
) -> Result<CheckoutResponse> {
    if amount <= 0 {
        return Err(AppError::Validation(
            "priority amount must be positive".to_string(),
        ));
    }

    story_service::get(db, story_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Story not found".to_string()))?;

    let session_id = new_session_id("cs_priority_");
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO payment_sessions (id, kind, story_id, amount, payment_status, created_at, updated_at)
        VALUES (?, 'priority', ?, ?, 'unpaid', ?, ?)
        "#,
    )
    .bind(&session_id)
    .bind(story_id)
    .bind(amount)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    tracing::info!(
        "Checkout session {} created for priority on story {}",
        session_id,
        story_id
    );

    Ok(CheckoutResponse {
        checkout_url: checkout_url(config, &session_id),
        session_id,
    })
}

/// Checkout session for a vote pack purchase.
pub async fn create_vote_pack_checkout(
    db: &SqlitePool,
    config: &Config,
    user_id: &str,
    pack: VotePack,
) -> Result<CheckoutResponse> {
    let session_id = new_session_id("cs_votepack_");
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO payment_sessions (id, kind, user_id, credits, amount, payment_status, created_at, updated_at)
        VALUES (?, 'vote_pack', ?, ?, ?, 'unpaid', ?, ?)
        "#,
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(pack.credits())
    .bind(pack.price())
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    tracing::info!(
        "Checkout session {} created for {} vote credits ({})",
        session_id,
        pack.credits(),
        user_id
    );

    Ok(CheckoutResponse {
        checkout_url: checkout_url(config, &session_id),
        session_id,
    })
}

pub async fn get_session(db: &SqlitePool, session_id: &str) -> Result<Option<PaymentSession>> {
    let session =
        sqlx::query_as::<_, PaymentSession>("SELECT * FROM payment_sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(db)
            .await?;

    Ok(session)
}

/// Applies a provider-reported outcome to whatever the session paid for.
///
/// The session's unpaid -> terminal transition gates idempotency: a repeat
/// delivery of the same outcome is a no-op, a conflicting one is rejected.
/// The gate and the purchase effect commit in one transaction.
pub async fn handle_webhook(
    db: &SqlitePool,
    session_id: &str,
    outcome: PaymentOutcome,
    now: DateTime<Utc>,
    pending_cutoff: DateTime<Utc>,
) -> Result<()> {
    let session = get_session(db, session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Payment session {session_id} not found")))?;

    match session.kind {
        PaymentKind::Boost => {
            let boost_id = session.boost_session_id.ok_or_else(|| {
                AppError::Internal(format!(
                    "payment session {session_id} has no boost session reference"
                ))
            })?;
            // The boost session is the authority on settlement; the handle
            // row is bookkeeping and converges on webhook retry.
            boost_service::report_payment_outcome(db, boost_id, outcome, now, pending_cutoff)
                .await?;
            sqlx::query(
                "UPDATE payment_sessions SET payment_status = ?, updated_at = ? WHERE id = ? AND payment_status = 'unpaid'",
            )
            .bind(outcome.payment_status())
            .bind(now)
            .bind(session_id)
            .execute(db)
            .await?;
        }
        PaymentKind::Priority => {
            let story_id = session.story_id.ok_or_else(|| {
                AppError::Internal(format!(
                    "payment session {session_id} has no story reference"
                ))
            })?;
            let mut tx = db.begin().await?;
            let fresh = settle_session(&mut tx, session_id, outcome, now).await?;
            if fresh && outcome == PaymentOutcome::Completed {
                story_service::set_priority(&mut tx, story_id).await?;
            }
            tx.commit().await?;
        }
        PaymentKind::VotePack => {
            let user_id = session.user_id.clone().ok_or_else(|| {
                AppError::Internal(format!(
                    "payment session {session_id} has no user reference"
                ))
            })?;
            let credits = session.credits.ok_or_else(|| {
                AppError::Internal(format!(
                    "payment session {session_id} has no credit amount"
                ))
            })?;
            let mut tx = db.begin().await?;
            let fresh = settle_session(&mut tx, session_id, outcome, now).await?;
            if fresh && outcome == PaymentOutcome::Completed {
                vote_service::grant_credits(&mut tx, &user_id, credits).await?;
            }
            tx.commit().await?;
        }
    }

    Ok(())
}

/// Returns true when this delivery settled the session; false for a
/// repeat of an already-applied outcome.
async fn settle_session(
    conn: &mut SqliteConnection,
    session_id: &str,
    outcome: PaymentOutcome,
    now: DateTime<Utc>,
) -> Result<bool> {
    let updated = sqlx::query(
        "UPDATE payment_sessions SET payment_status = ?, updated_at = ? WHERE id = ? AND payment_status = 'unpaid'",
    )
    .bind(outcome.payment_status())
    .bind(now)
    .bind(session_id)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 1 {
        return Ok(true);
    }

    let current = sqlx::query_scalar::<_, PaymentStatus>(
        "SELECT payment_status FROM payment_sessions WHERE id = ?",
    )
    .bind(session_id)
    .fetch_one(&mut *conn)
    .await?;

    if current == outcome.payment_status() {
        return Ok(false);
    }

    Err(AppError::InvalidStateTransition(format!(
        "payment session {session_id} is already settled as {current:?}"
    )))
}

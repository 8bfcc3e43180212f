use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    error::Result,
    models::{CreatePriorityRequest, CreateVotePackRequest, PaymentWebhookRequest},
    services::payment_service,
};

pub async fn create_vote_pack_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateVotePackRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    payload.validate()?;

    let checkout = payment_service::create_vote_pack_checkout(
        &state.db,
        &state.config,
        &payload.user_id,
        payload.pack,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Vote pack session created for {} credits", payload.pack.credits()),
            "session_id": checkout.session_id,
            "checkout_url": checkout.checkout_url,
            "credits": payload.pack.credits()
        })),
    ))
}

pub async fn create_priority_session(
    State(state): State<AppState>,
    Path(story_id): Path<Uuid>,
    Json(payload): Json<CreatePriorityRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    payload.validate()?;

    let checkout =
        payment_service::create_priority_checkout(&state.db, &state.config, story_id, payload.amount)
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Priority story session created successfully",
            "session_id": checkout.session_id,
            "checkout_url": checkout.checkout_url
        })),
    ))
}

pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhookRequest>,
) -> Result<Json<Value>> {
    let now = Utc::now();
    payment_service::handle_webhook(
        &state.db,
        &payload.session_id,
        payload.outcome,
        now,
        state.config.pending_cutoff(now),
    )
    .await?;

    Ok(Json(json!({
        "message": "Payment outcome processed"
    })))
}

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
    error::{AppError, Result},
    models::{BoostStatusResponse, CreateBoostRequest},
    services::{boost_service, payment_service, story_service},
};

pub async fn request_boost(
    State(state): State<AppState>,
    Json(payload): Json<CreateBoostRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    payload.validate()?;

    let session = boost_service::request_boost(
        &state.db,
        payload.story_id,
        payload.duration_hours,
        payload.amount,
    )
    .await?;

    let checkout = payment_service::create_boost_checkout(&state.db, &state.config, &session).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Boost session created for {}h", session.duration_hours),
            "boost_session_id": session.id,
            "payment_handle": checkout.session_id,
            "checkout_url": checkout.checkout_url
        })),
    ))
}

pub async fn cancel_boost(
    State(state): State<AppState>,
    Path(boost_id): Path<Uuid>,
) -> Result<Json<Value>> {
    boost_service::cancel_boost(&state.db, boost_id).await?;

    Ok(Json(json!({
        "message": "Boost session cancelled"
    })))
}

pub async fn boost_status(
    State(state): State<AppState>,
    Path(story_id): Path<Uuid>,
) -> Result<Json<BoostStatusResponse>> {
    story_service::get(&state.db, story_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Story not found".to_string()))?;

    let boost = boost_service::current_boost(&state.db, story_id, Utc::now()).await?;

    Ok(Json(BoostStatusResponse {
        story_id,
        is_boosted: boost.is_some(),
        boost: boost.map(Into::into),
    }))
}

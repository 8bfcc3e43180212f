use axum::{
    extract::{Path, State},
    response::Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    error::Result,
    models::{BalanceResponse, CastVoteRequest, VoteResponse},
    services::vote_service,
};

pub async fn cast_vote(
    State(state): State<AppState>,
    Path(story_id): Path<Uuid>,
    Json(payload): Json<CastVoteRequest>,
) -> Result<Json<VoteResponse>> {
    payload.validate()?;

    let new_vote_count =
        vote_service::cast_vote(&state.db, story_id, &payload.user_id, payload.vote_type).await?;

    Ok(Json(VoteResponse { new_vote_count }))
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>> {
    let balance = vote_service::balance(&state.db, &user_id).await?;

    Ok(Json(BalanceResponse { user_id, balance }))
}

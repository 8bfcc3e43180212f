use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    error::{AppError, Result},
    models::{CreateStoryRequest, StoryListResponse, StoryResponse, StorySort},
    services::{boost_service, query_service, story_service},
};

#[derive(Debug, Deserialize)]
pub struct ListStoriesQuery {
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub author_id: Option<String>,
    pub sort: Option<StorySort>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub async fn submit_story(
    State(state): State<AppState>,
    Json(payload): Json<CreateStoryRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    // Validate input
    payload.validate()?;

    let story = story_service::submit(&state.db, &payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Story submitted successfully",
            "story_id": story.id
        })),
    ))
}

pub async fn list_stories(
    State(state): State<AppState>,
    Query(params): Query<ListStoriesQuery>,
) -> Result<Json<StoryListResponse>> {
    let query = query_service::StoryQueryParams {
        category: params.category,
        featured: params.featured.unwrap_or(false),
        author_id: params.author_id,
        sort: params.sort.unwrap_or(StorySort::Ranked),
        page: params.page.unwrap_or(1),
        page_size: params.page_size.unwrap_or(10),
    };

    let now = Utc::now();
    let response = query_service::query(
        &state.db,
        &query,
        state.config.featured_vote_threshold,
        state.config.pending_cutoff(now),
        now,
    )
    .await?;

    Ok(Json(response))
}

pub async fn get_story(
    State(state): State<AppState>,
    Path(story_id): Path<Uuid>,
) -> Result<Json<StoryResponse>> {
    let story = story_service::get(&state.db, story_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Story not found".to_string()))?;

    let boost = boost_service::current_boost(&state.db, story_id, Utc::now()).await?;

    Ok(Json(StoryResponse::from_story(story, boost.map(Into::into))))
}

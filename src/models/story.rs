use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;
use validator::Validate;

use crate::models::BoostResponse;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Story {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub category: String,
    pub tags: Json<Vec<String>>,
    pub vote_count: i64,
    pub is_priority: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Story submission request
#[derive(Debug, Validate, Deserialize)]
pub struct CreateStoryRequest {
    #[validate(length(min = 1, max = 300))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    #[validate(length(min = 1, max = 100))]
    pub author_id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub wants_priority: bool,
}

// Story detail response with current boost standing
#[derive(Debug, Serialize)]
pub struct StoryResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub category: String,
    pub tags: Vec<String>,
    pub vote_count: i64,
    pub is_priority: bool,
    pub is_boosted: bool,
    pub active_boost: Option<BoostResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoryResponse {
    pub fn from_story(story: Story, active_boost: Option<BoostResponse>) -> Self {
        Self {
            id: story.id,
            title: story.title,
            content: story.content,
            author_id: story.author_id,
            category: story.category,
            tags: story.tags.0,
            vote_count: story.vote_count,
            is_priority: story.is_priority,
            is_boosted: active_boost.is_some(),
            active_boost,
            created_at: story.created_at,
            updated_at: story.updated_at,
        }
    }
}

// Story list item (for feeds)
#[derive(Debug, Serialize)]
pub struct StoryListItem {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub category: String,
    pub tags: Vec<String>,
    pub vote_count: i64,
    pub is_priority: bool,
    pub is_boosted: bool,
    pub boost_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_stories: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Serialize)]
pub struct StoryListResponse {
    pub stories: Vec<StoryListItem>,
    pub pagination: Pagination,
}

// Sorting options for story listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorySort {
    Ranked,
    Newest,
    Oldest,
    Votes,
    Title,
}

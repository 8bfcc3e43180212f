use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    /// Signed delta applied to a story's vote count.
    pub fn delta(self) -> i64 {
        match self {
            VoteType::Up => 1,
            VoteType::Down => -1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VoteRecord {
    pub id: Uuid,
    pub story_id: Uuid,
    pub user_id: String,
    pub vote_type: VoteType,
    pub created_at: DateTime<Utc>,
}

/// Per-user consumable credit balance. Created lazily on first grant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VoteCredit {
    pub user_id: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Vote request
#[derive(Debug, Validate, Deserialize)]
pub struct CastVoteRequest {
    #[validate(length(min = 1, max = 100))]
    pub user_id: String,
    pub vote_type: VoteType,
}

// Vote response
#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub new_vote_count: i64,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: String,
    pub balance: i64,
}

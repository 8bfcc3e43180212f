use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::{PaymentOutcome, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentKind {
    Boost,
    Priority,
    VotePack,
}

/// Mapping from an opaque provider checkout handle back to the purchase.
/// Its unpaid -> terminal transition gates webhook idempotency.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentSession {
    pub id: String,
    pub kind: PaymentKind,
    pub user_id: Option<String>,
    pub story_id: Option<Uuid>,
    pub boost_session_id: Option<Uuid>,
    pub credits: Option<i64>,
    pub amount: i64,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Vote pack tiers and pricing (minor currency units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VotePack {
    Basic,
    Standard,
    Premium,
}

impl VotePack {
    pub fn credits(self) -> i64 {
        match self {
            VotePack::Basic => 10,
            VotePack::Standard => 25,
            VotePack::Premium => 50,
        }
    }

    pub fn price(self) -> i64 {
        match self {
            VotePack::Basic => 500,
            VotePack::Standard => 1000,
            VotePack::Premium => 1800,
        }
    }
}

#[derive(Debug, Validate, Deserialize)]
pub struct CreateVotePackRequest {
    #[validate(length(min = 1, max = 100))]
    pub user_id: String,
    pub pack: VotePack,
}

#[derive(Debug, Validate, Deserialize)]
pub struct CreatePriorityRequest {
    #[validate(range(min = 1))]
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct PaymentWebhookRequest {
    pub session_id: String,
    pub outcome: PaymentOutcome,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub checkout_url: String,
}

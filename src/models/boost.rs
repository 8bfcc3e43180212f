use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Purchasable boost durations, in hours (24h, 3d, 7d).
pub const SUPPORTED_BOOST_DURATIONS: [i64; 3] = [24, 72, 168];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum BoostStatus {
    Requested,
    PendingPayment,
    Active,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Completed,
    Failed,
}

/// Outcome reported by the payment provider for a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Completed,
    Failed,
}

impl PaymentOutcome {
    pub fn payment_status(self) -> PaymentStatus {
        match self {
            PaymentOutcome::Completed => PaymentStatus::Completed,
            PaymentOutcome::Failed => PaymentStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BoostSession {
    pub id: Uuid,
    pub story_id: Uuid,
    pub duration_hours: i64,
    /// Price in minor currency units.
    pub amount: i64,
    pub status: BoostStatus,
    pub payment_status: PaymentStatus,
    /// Opaque reference issued by the payment provider.
    pub payment_ref: Option<String>,
    /// Set when this boost was cancelled because a later one activated.
    pub superseded_by: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Boost request
#[derive(Debug, Validate, Deserialize)]
pub struct CreateBoostRequest {
    pub story_id: Uuid,
    pub duration_hours: i64,
    #[validate(range(min = 1))]
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct BoostResponse {
    pub id: Uuid,
    pub story_id: Uuid,
    pub duration_hours: i64,
    pub amount: i64,
    pub status: BoostStatus,
    pub payment_status: PaymentStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<BoostSession> for BoostResponse {
    fn from(session: BoostSession) -> Self {
        Self {
            id: session.id,
            story_id: session.story_id,
            duration_hours: session.duration_hours,
            amount: session.amount,
            status: session.status,
            payment_status: session.payment_status,
            start_time: session.start_time,
            end_time: session.end_time,
            created_at: session.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BoostStatusResponse {
    pub story_id: Uuid,
    pub is_boosted: bool,
    pub boost: Option<BoostResponse>,
}

use chrono::{DateTime, Duration, Utc};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,

    // Ranking
    pub featured_vote_threshold: i64,

    // Payments
    pub checkout_base_url: String,
    pub pending_payment_timeout_minutes: i64,

    // App settings
    pub app_name: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://cricket_tales.db?mode=rwc".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),

            featured_vote_threshold: env::var("FEATURED_VOTE_THRESHOLD")
                .unwrap_or_else(|_| "35".to_string())
                .parse()
                .unwrap_or(35),

            checkout_base_url: env::var("CHECKOUT_BASE_URL")
                .unwrap_or_else(|_| "https://checkout.stripe.com/pay".to_string()),
            pending_payment_timeout_minutes: env::var("PENDING_PAYMENT_TIMEOUT_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),

            app_name: env::var("APP_NAME").unwrap_or_else(|_| "Cricket Tales".to_string()),
        })
    }

    /// Pending payments created before this instant are treated as
    /// cancelled by the lazy timeout rule.
    pub fn pending_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::minutes(self.pending_payment_timeout_minutes)
    }
}

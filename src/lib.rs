pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .allowed_origins
                .iter()
                .map(|origin| origin.parse::<HeaderValue>().unwrap())
                .collect::<Vec<_>>(),
        )
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    Router::new()
        // Story routes
        .route("/api/stories", post(handlers::stories::submit_story))
        .route("/api/stories", get(handlers::stories::list_stories))
        .route("/api/stories/{story_id}", get(handlers::stories::get_story))
        .route(
            "/api/stories/{story_id}/vote",
            post(handlers::votes::cast_vote),
        )
        .route(
            "/api/stories/{story_id}/boost",
            get(handlers::boosts::boost_status),
        )
        .route(
            "/api/stories/{story_id}/priority",
            post(handlers::payments::create_priority_session),
        )
        // Credit routes
        .route(
            "/api/users/{user_id}/credits",
            get(handlers::votes::get_balance),
        )
        .route(
            "/api/vote-packs",
            post(handlers::payments::create_vote_pack_session),
        )
        // Boost routes
        .route("/api/boosts", post(handlers::boosts::request_boost))
        .route(
            "/api/boosts/{boost_id}/cancel",
            post(handlers::boosts::cancel_boost),
        )
        // Payment provider callback
        .route(
            "/api/payments/webhook",
            post(handlers::payments::payment_webhook),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

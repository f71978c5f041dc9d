//! HTTP route handlers
//!
//! Thin layer over the services: extract, delegate, serialize. All domain
//! rules live in the services; handlers own only the request and response
//! shapes.

pub mod booking;
pub mod operator;
pub mod rewards;

use axum::{
    extract::State,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::AppState;

#[derive(Serialize)]
struct Health {
    status: &'static str,
    cache: CacheStats,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        cache: state.cache.stats(),
    })
}

/// Assemble the full API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        // Operator surface
        .route("/api/tours", post(operator::create_tour))
        .route("/api/tours/:id", get(operator::get_tour))
        .route(
            "/api/tours/:id/patterns",
            post(operator::create_pattern).get(operator::list_patterns),
        )
        .route("/api/tours/:id/materialize", post(operator::materialize))
        .route("/api/tours/:id/occurrences", get(operator::list_occurrences))
        .route("/api/occurrences/:id", patch(operator::edit_occurrence))
        .route(
            "/api/boosts",
            post(operator::create_boost).get(operator::list_boosts),
        )
        // Booking surface
        .route("/api/occurrences/:id/reserve", post(booking::reserve))
        .route("/api/occurrences/:id/release", post(booking::release))
        .route(
            "/api/occurrences/:id/availability",
            get(booking::availability),
        )
        .route("/api/pricing/quote", post(booking::quote))
        // Rewards surface
        .route(
            "/api/eco/:user_id",
            get(rewards::account),
        )
        .route("/api/eco/:user_id/award", post(rewards::award))
        .route("/api/eco/:user_id/correct", post(rewards::correct))
        .route("/api/eco/:user_id/reconcile", get(rewards::reconcile))
        .with_state(state)
}

//! Booking route handlers: capacity reservation and price quoting.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::ledger::{OccurrenceAvailability, Reservation};
use crate::models::PurchaseContext;
use crate::pricing::{self, PriceQuote};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SeatsRequest {
    pub seats: i32,
}

pub async fn reserve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SeatsRequest>,
) -> Result<Json<Reservation>> {
    let reservation = state.ledger.reserve(id, req.seats, Utc::now()).await?;
    Ok(Json(reservation))
}

pub async fn release(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SeatsRequest>,
) -> Result<Json<OccurrenceAvailability>> {
    let snapshot = state.ledger.release(id, req.seats, Utc::now()).await?;
    Ok(Json(snapshot))
}

pub async fn availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OccurrenceAvailability>> {
    Ok(Json(state.ledger.peek(id).await?))
}

/// Request body for price quoting
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub occurrence_id: Uuid,
    pub participants: i32,
    #[serde(with = "rust_decimal::serde::str_option", default)]
    pub extras: Option<Decimal>,
    /// Overrides the tour's first category for boost matching
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub partner_id: Option<String>,
}

/// Quote a price for a reservation against the current boost registry.
///
/// Read-only: quoting never holds capacity. The amount seen by
/// `min_amount` filters is the pre-boost subtotal.
pub async fn quote(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<Json<PriceQuote>> {
    let occurrence = state
        .stores
        .occurrences
        .get(req.occurrence_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("occurrence {}", req.occurrence_id)))?;
    let tour = state.availability.get_tour(occurrence.tour_id).await?;

    let now = Utc::now();
    let extras = req.extras.unwrap_or(Decimal::ZERO);
    if req.participants <= 0 {
        return Err(EngineError::Validation(format!(
            "participant count must be positive, got {}",
            req.participants
        )));
    }
    let subtotal = occurrence.price * Decimal::from(req.participants) + extras;

    let ctx = PurchaseContext {
        category: req.category.or_else(|| tour.categories.first().cloned()),
        amount: Some(subtotal),
        payment_method: req.payment_method,
        partner_id: req.partner_id,
        now,
    };
    let boosts = state.boosts.active_at(now).await?;
    let quote = pricing::quote(
        occurrence.price,
        &occurrence.currency,
        req.participants,
        extras,
        &boosts,
        &ctx,
    )?;
    Ok(Json(quote))
}

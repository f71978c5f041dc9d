//! Eco-points route handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::eco::Reconciliation;
use crate::error::{EngineError, Result};
use crate::models::{EcoHistoryEntry, EcoPointsBalance, EcoSource};
use crate::AppState;

/// Request body for an eco-points award
#[derive(Debug, Deserialize)]
pub struct AwardRequest {
    pub points: i64,
    #[serde(default = "default_source")]
    pub source: EcoSource,
    pub title: String,
    /// Registered boost applied to this award, if any
    #[serde(default)]
    pub boost_id: Option<Uuid>,
}

fn default_source() -> EcoSource {
    EcoSource::Challenge
}

pub async fn award(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AwardRequest>,
) -> Result<Json<EcoPointsBalance>> {
    let boost = match req.boost_id {
        Some(id) => Some(
            state
                .boosts
                .list()
                .await?
                .iter()
                .find(|b| b.id == id)
                .cloned()
                .ok_or_else(|| EngineError::NotFound(format!("boost {id}")))?,
        ),
        None => None,
    };
    let balance = state
        .eco
        .award_points(
            user_id,
            req.points,
            boost.as_ref(),
            req.source,
            &req.title,
            Utc::now(),
        )
        .await?;
    Ok(Json(balance))
}

/// Request body for a signed balance correction
#[derive(Debug, Deserialize)]
pub struct CorrectionRequest {
    pub delta: i64,
    pub title: String,
}

pub async fn correct(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<CorrectionRequest>,
) -> Result<Json<EcoPointsBalance>> {
    let balance = state
        .eco
        .apply_correction(user_id, req.delta, &req.title, Utc::now())
        .await?;
    Ok(Json(balance))
}

#[derive(Serialize)]
pub struct EcoAccount {
    pub balance: EcoPointsBalance,
    pub history: Vec<EcoHistoryEntry>,
}

pub async fn account(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<EcoAccount>> {
    Ok(Json(EcoAccount {
        balance: state.eco.balance(user_id).await?,
        history: state.eco.history(user_id).await?,
    }))
}

pub async fn reconcile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Reconciliation>> {
    Ok(Json(state.eco.reconcile(user_id).await?))
}

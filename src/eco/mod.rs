//! Eco-points ledger.
//!
//! Every balance change is recorded as an append-only history entry; the
//! cached balance is always the sum of a user's history and can be
//! reconciled against it. Boost multipliers scale awards at grant time;
//! the multiplied amount is what lands in history, so replaying history
//! never needs boost state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::{Boost, EcoHistoryEntry, EcoPointsBalance, EcoSource};
use crate::store::EcoStore;

#[derive(Clone)]
pub struct EcoLedger {
    store: Arc<dyn EcoStore>,
}

/// Result of checking the cached balance against the history sum.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub user_id: Uuid,
    pub cached: i64,
    pub history_sum: i64,
    pub consistent: bool,
}

impl EcoLedger {
    pub fn new(store: Arc<dyn EcoStore>) -> Self {
        Self { store }
    }

    /// Award points, scaled by the boost's multiplier when one applies.
    ///
    /// Points are integers; the scaled amount is rounded half-away-from-zero
    /// so a 1.5× boost on 5 points grants 8, not 7. An inactive boost
    /// contributes nothing (multiplier 1).
    pub async fn award_points(
        &self,
        user_id: Uuid,
        base_points: i64,
        boost: Option<&Boost>,
        source: EcoSource,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<EcoPointsBalance> {
        if base_points <= 0 {
            return Err(EngineError::Validation(format!(
                "award must be positive, got {base_points}"
            )));
        }

        let multiplier = boost
            .filter(|b| b.is_active_at(now))
            .and_then(|b| b.multiplier)
            .unwrap_or(Decimal::ONE);
        let effective = scale_points(base_points, multiplier);

        let balance = self
            .store
            .append(EcoHistoryEntry {
                id: Uuid::new_v4(),
                user_id,
                ts: now,
                source,
                title: title.to_string(),
                delta: effective,
            })
            .await?;

        info!(
            %user_id,
            base_points,
            effective,
            balance = balance.points,
            "Eco points awarded"
        );
        Ok(balance)
    }

    /// Apply a signed correction. The store rejects any delta that would
    /// drive the balance below zero, without recording anything.
    pub async fn apply_correction(
        &self,
        user_id: Uuid,
        delta: i64,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<EcoPointsBalance> {
        if delta == 0 {
            return Err(EngineError::Validation("correction delta is zero".into()));
        }
        self.store
            .append(EcoHistoryEntry {
                id: Uuid::new_v4(),
                user_id,
                ts: now,
                source: EcoSource::Correction,
                title: title.to_string(),
                delta,
            })
            .await
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<EcoPointsBalance> {
        self.store.balance(user_id).await
    }

    pub async fn history(&self, user_id: Uuid) -> Result<Vec<EcoHistoryEntry>> {
        self.store.history(user_id).await
    }

    /// Compare the cached balance with the sum of history deltas.
    pub async fn reconcile(&self, user_id: Uuid) -> Result<Reconciliation> {
        let cached = self.store.balance(user_id).await?.points;
        let history_sum: i64 = self
            .store
            .history(user_id)
            .await?
            .iter()
            .map(|e| e.delta)
            .sum();
        Ok(Reconciliation {
            user_id,
            cached,
            history_sum,
            consistent: cached == history_sum,
        })
    }
}

/// Integer points scaled by a multiplier, rounded half-away-from-zero.
fn scale_points(points: i64, multiplier: Decimal) -> i64 {
    (Decimal::from(points) * multiplier)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(points)
}

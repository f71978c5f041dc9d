//! Eco-points balance and history models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Where a history entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EcoSource {
    Challenge,
    Tip,
    Boost,
    Correction,
}

impl EcoSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EcoSource::Challenge => "challenge",
            EcoSource::Tip => "tip",
            EcoSource::Boost => "boost",
            EcoSource::Correction => "correction",
        }
    }
}

impl std::str::FromStr for EcoSource {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, EngineError> {
        match s {
            "challenge" => Ok(EcoSource::Challenge),
            "tip" => Ok(EcoSource::Tip),
            "boost" => Ok(EcoSource::Boost),
            "correction" => Ok(EcoSource::Correction),
            other => Err(EngineError::Validation(format!(
                "unknown eco source '{other}'"
            ))),
        }
    }
}

/// Per-user point accumulator.
///
/// Mutated only through the award and correction operations; always
/// reconcilable against the sum of history deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcoPointsBalance {
    pub user_id: Uuid,
    pub points: i64,
    pub updated_at: DateTime<Utc>,
}

/// Immutable history entry appended by every award.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcoHistoryEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ts: DateTime<Utc>,
    pub source: EcoSource,
    pub title: String,
    /// Points applied, after any boost multiplier
    pub delta: i64,
}

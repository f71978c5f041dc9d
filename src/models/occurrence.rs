//! Concrete bookable occurrence model.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// Operator-controlled occurrence state.
///
/// Only `Open` occurrences take capacity operations; `Closed` and `Cancelled`
/// reject them regardless of remaining seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceState {
    Open,
    Closed,
    Cancelled,
}

impl OccurrenceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OccurrenceState::Open => "open",
            OccurrenceState::Closed => "closed",
            OccurrenceState::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for OccurrenceState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(OccurrenceState::Open),
            "closed" => Ok(OccurrenceState::Closed),
            "cancelled" => Ok(OccurrenceState::Cancelled),
            other => Err(EngineError::Validation(format!(
                "unknown occurrence state '{other}'"
            ))),
        }
    }
}

/// Presented availability status, derived on every read.
///
/// Never stored: it is a pure function of the operator state, the capacity
/// numbers and the clock, so it cannot drift from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    Available,
    Low,
    SoldOut,
    Closed,
    Cancelled,
}

/// One concrete bookable instance of a tour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Occurrence {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub start_date_time: DateTime<Utc>,
    /// Immutable once created
    pub capacity_total: i32,
    pub capacity_available: i32,
    /// Resolved once at generation time: pattern override, else tour base
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub currency: String,
    /// Resolved once at generation time: pattern override, else tour default
    pub cutoff_hours: i64,
    pub state: OccurrenceState,
    /// Set by operator edits; re-materialization never overwrites such records
    pub manually_edited: bool,
    /// Pattern that generated this occurrence, if any
    pub pattern_id: Option<Uuid>,
}

impl Occurrence {
    /// Instant after which bookings are rejected.
    pub fn booking_deadline(&self) -> DateTime<Utc> {
        self.start_date_time - Duration::hours(self.cutoff_hours)
    }

    /// Capacity threshold at or below which the occurrence is flagged low.
    pub fn low_water_mark(&self, fraction: f64) -> i32 {
        (f64::from(self.capacity_total) * fraction).ceil() as i32
    }

    /// Derive the presented status at `now`.
    pub fn status_at(&self, now: DateTime<Utc>, low_water_fraction: f64) -> OccurrenceStatus {
        match self.state {
            OccurrenceState::Cancelled => OccurrenceStatus::Cancelled,
            OccurrenceState::Closed => OccurrenceStatus::Closed,
            OccurrenceState::Open => {
                if now > self.booking_deadline() {
                    OccurrenceStatus::Closed
                } else if self.capacity_available == 0 {
                    OccurrenceStatus::SoldOut
                } else if self.capacity_available <= self.low_water_mark(low_water_fraction) {
                    OccurrenceStatus::Low
                } else {
                    OccurrenceStatus::Available
                }
            }
        }
    }
}

//! Capacity ledger: the one component that must serialize writers.
//!
//! `0 <= capacity_available <= capacity_total` holds for every occurrence
//! under all concurrent operations. In-process callers are serialized by a
//! per-occurrence mutex; the store-level compare-and-swap guards against
//! writers in other processes. Reservations against different occurrences
//! proceed in parallel.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::{Occurrence, OccurrenceState, OccurrenceStatus};
use crate::store::OccurrenceStore;

/// Snapshot returned by `peek`, `reserve` and `release`
#[derive(Debug, Clone, Serialize)]
pub struct OccurrenceAvailability {
    pub occurrence_id: Uuid,
    pub total: i32,
    pub available: i32,
    pub status: OccurrenceStatus,
}

/// Successful reservation receipt
#[derive(Debug, Clone, Serialize)]
pub struct Reservation {
    pub occurrence_id: Uuid,
    pub seats: i32,
    pub remaining: OccurrenceAvailability,
}

pub struct CapacityLedger {
    occurrences: Arc<dyn OccurrenceStore>,
    /// Per-occurrence write locks; entries are created on first use
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    lock_timeout: Duration,
    low_water_fraction: f64,
}

impl CapacityLedger {
    pub fn new(
        occurrences: Arc<dyn OccurrenceStore>,
        lock_timeout: Duration,
        low_water_fraction: f64,
    ) -> Self {
        Self {
            occurrences,
            locks: DashMap::new(),
            lock_timeout,
            low_water_fraction,
        }
    }

    async fn lock_for(&self, id: Uuid) -> Result<tokio::sync::OwnedMutexGuard<()>> {
        let lock = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        timeout(self.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| EngineError::ConcurrencyConflict)
    }

    async fn load(&self, id: Uuid) -> Result<Occurrence> {
        self.occurrences
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("occurrence {id}")))
    }

    fn snapshot(&self, occurrence: &Occurrence, now: DateTime<Utc>) -> OccurrenceAvailability {
        OccurrenceAvailability {
            occurrence_id: occurrence.id,
            total: occurrence.capacity_total,
            available: occurrence.capacity_available,
            status: occurrence.status_at(now, self.low_water_fraction),
        }
    }

    /// Reserve `seats` against an occurrence.
    ///
    /// Fails without mutation when seats are invalid, the occurrence is
    /// closed or cancelled, the booking cutoff has passed, or fewer seats
    /// remain than requested.
    pub async fn reserve(&self, id: Uuid, seats: i32, now: DateTime<Utc>) -> Result<Reservation> {
        if seats <= 0 {
            return Err(EngineError::Validation(format!(
                "seat count must be positive, got {seats}"
            )));
        }

        let _guard = self.lock_for(id).await?;
        let occurrence = self.load(id).await?;

        match occurrence.state {
            OccurrenceState::Open => {}
            state => {
                return Err(EngineError::OccurrenceClosed {
                    status: state.as_str().to_string(),
                })
            }
        }
        let deadline = occurrence.booking_deadline();
        if now > deadline {
            return Err(EngineError::CutoffPassed { deadline });
        }
        if seats > occurrence.capacity_available {
            return Err(EngineError::CapacityExceeded {
                requested: seats,
                available: occurrence.capacity_available,
            });
        }

        let expected = occurrence.capacity_available;
        let remaining = expected - seats;
        if !self
            .occurrences
            .compare_and_set_available(id, expected, remaining)
            .await?
        {
            // Another process moved the count under us
            return Err(EngineError::ConcurrencyConflict);
        }

        tracing::debug!(occurrence_id = %id, seats, remaining, "Seats reserved");

        let mut updated = occurrence;
        updated.capacity_available = remaining;
        Ok(Reservation {
            occurrence_id: id,
            seats,
            remaining: self.snapshot(&updated, now),
        })
    }

    /// Release previously reserved seats (booking cancellation or payment
    /// failure). Closed and cancelled occurrences reject releases like any
    /// other capacity operation; refunds there settle against the booking,
    /// not the seat count. Restores are clamped at `capacity_total`; a clamp
    /// means the caller double-released and is logged as an anomaly.
    pub async fn release(
        &self,
        id: Uuid,
        seats: i32,
        now: DateTime<Utc>,
    ) -> Result<OccurrenceAvailability> {
        if seats <= 0 {
            return Err(EngineError::Validation(format!(
                "seat count must be positive, got {seats}"
            )));
        }

        let _guard = self.lock_for(id).await?;
        let occurrence = self.load(id).await?;

        match occurrence.state {
            OccurrenceState::Open => {}
            state => {
                return Err(EngineError::OccurrenceClosed {
                    status: state.as_str().to_string(),
                })
            }
        }

        let expected = occurrence.capacity_available;
        let restored = (expected + seats).min(occurrence.capacity_total);
        if restored != expected + seats {
            tracing::warn!(
                occurrence_id = %id,
                seats,
                available = expected,
                total = occurrence.capacity_total,
                "Release would exceed capacity total; clamping (possible double release)"
            );
        }
        if !self
            .occurrences
            .compare_and_set_available(id, expected, restored)
            .await?
        {
            return Err(EngineError::ConcurrencyConflict);
        }

        let mut updated = occurrence;
        updated.capacity_available = restored;
        Ok(self.snapshot(&updated, now))
    }

    /// Read the current capacity snapshot; status is derived, never stored.
    pub async fn peek(&self, id: Uuid) -> Result<OccurrenceAvailability> {
        let occurrence = self.load(id).await?;
        Ok(self.snapshot(&occurrence, Utc::now()))
    }
}

//! Repository traits over the engine's persisted collections.
//!
//! The engine never talks to a datastore directly; any backend that honors
//! these contracts (notably the `(tour_id, start_date_time)` uniqueness of
//! occurrences and the atomicity of `compare_and_set_available`) can sit
//! behind them. Two impls ship: in-memory (`memory`) and Postgres
//! (`postgres`).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Boost, EcoHistoryEntry, EcoPointsBalance, Occurrence, SchedulePattern, Tour,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait TourStore: Send + Sync {
    async fn insert(&self, tour: Tour) -> Result<Tour>;
    async fn get(&self, id: Uuid) -> Result<Option<Tour>>;
    async fn update(&self, tour: Tour) -> Result<Tour>;
}

#[async_trait]
pub trait PatternStore: Send + Sync {
    async fn insert(&self, pattern: SchedulePattern) -> Result<SchedulePattern>;
    async fn list_for_tour(&self, tour_id: Uuid) -> Result<Vec<SchedulePattern>>;
}

#[async_trait]
pub trait OccurrenceStore: Send + Sync {
    /// Insert a new occurrence. Fails when one already exists for the same
    /// `(tour_id, start_date_time)` key.
    async fn insert(&self, occurrence: Occurrence) -> Result<Occurrence>;
    async fn get(&self, id: Uuid) -> Result<Option<Occurrence>>;
    async fn list_for_tour(&self, tour_id: Uuid) -> Result<Vec<Occurrence>>;
    async fn exists_at(&self, tour_id: Uuid, start: DateTime<Utc>) -> Result<bool>;
    /// Operator edit of mutable fields; `capacity_total` is never changed.
    async fn update(&self, occurrence: Occurrence) -> Result<Occurrence>;
    /// Atomically set `capacity_available` to `new` iff it still equals
    /// `expected`. Returns whether the swap happened.
    async fn compare_and_set_available(&self, id: Uuid, expected: i32, new: i32) -> Result<bool>;
}

#[async_trait]
pub trait BoostStore: Send + Sync {
    async fn insert(&self, boost: Boost) -> Result<Boost>;
    /// All boosts in registry order.
    async fn list(&self) -> Result<Vec<Boost>>;
}

#[async_trait]
pub trait EcoStore: Send + Sync {
    /// Current balance; zero for users with no history.
    async fn balance(&self, user_id: Uuid) -> Result<EcoPointsBalance>;
    /// Atomically append a history entry and apply its delta to the cached
    /// balance. Fails without mutation if the delta would drive the balance
    /// negative.
    async fn append(&self, entry: EcoHistoryEntry) -> Result<EcoPointsBalance>;
    /// Full history, newest first.
    async fn history(&self, user_id: Uuid) -> Result<Vec<EcoHistoryEntry>>;
}

/// Bundle of the engine's repositories, cloned into services and handlers.
#[derive(Clone)]
pub struct Stores {
    pub tours: Arc<dyn TourStore>,
    pub patterns: Arc<dyn PatternStore>,
    pub occurrences: Arc<dyn OccurrenceStore>,
    pub boosts: Arc<dyn BoostStore>,
    pub eco: Arc<dyn EcoStore>,
}

impl Stores {
    /// All collections backed by one in-memory store.
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            tours: store.clone(),
            patterns: store.clone(),
            occurrences: store.clone(),
            boosts: store.clone(),
            eco: store,
        }
    }

    /// All collections backed by one Postgres pool.
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            tours: store.clone(),
            patterns: store.clone(),
            occurrences: store.clone(),
            boosts: store.clone(),
            eco: store,
        }
    }
}

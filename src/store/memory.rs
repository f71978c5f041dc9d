//! In-memory store backed by dashmap.
//!
//! Default backend when no `DATABASE_URL` is configured, and the backend the
//! engine's own tests run against. Uniqueness and CAS guarantees are enforced
//! with dashmap's per-entry locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::{
    Boost, EcoHistoryEntry, EcoPointsBalance, Occurrence, SchedulePattern, Tour,
};
use crate::store::{BoostStore, EcoStore, OccurrenceStore, PatternStore, TourStore};

#[derive(Default)]
struct EcoAccount {
    balance: i64,
    updated_at: Option<DateTime<Utc>>,
    history: Vec<EcoHistoryEntry>,
}

/// One store implementing every repository trait.
pub struct MemoryStore {
    tours: DashMap<Uuid, Tour>,
    patterns: DashMap<Uuid, SchedulePattern>,
    occurrences: DashMap<Uuid, Occurrence>,
    /// `(tour_id, start_date_time)` uniqueness index
    occurrence_index: DashMap<(Uuid, DateTime<Utc>), Uuid>,
    /// Registry order is insertion order
    boosts: RwLock<Vec<Boost>>,
    eco: DashMap<Uuid, EcoAccount>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tours: DashMap::new(),
            patterns: DashMap::new(),
            occurrences: DashMap::new(),
            occurrence_index: DashMap::new(),
            boosts: RwLock::new(Vec::new()),
            eco: DashMap::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TourStore for MemoryStore {
    async fn insert(&self, tour: Tour) -> Result<Tour> {
        self.tours.insert(tour.id, tour.clone());
        Ok(tour)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Tour>> {
        Ok(self.tours.get(&id).map(|t| t.clone()))
    }

    async fn update(&self, tour: Tour) -> Result<Tour> {
        if !self.tours.contains_key(&tour.id) {
            return Err(EngineError::NotFound(format!("tour {}", tour.id)));
        }
        self.tours.insert(tour.id, tour.clone());
        Ok(tour)
    }
}

#[async_trait]
impl PatternStore for MemoryStore {
    async fn insert(&self, pattern: SchedulePattern) -> Result<SchedulePattern> {
        self.patterns.insert(pattern.id, pattern.clone());
        Ok(pattern)
    }

    async fn list_for_tour(&self, tour_id: Uuid) -> Result<Vec<SchedulePattern>> {
        let mut patterns: Vec<SchedulePattern> = self
            .patterns
            .iter()
            .filter(|entry| entry.tour_id == tour_id)
            .map(|entry| entry.clone())
            .collect();
        patterns.sort_by_key(|p| p.start_date);
        Ok(patterns)
    }
}

#[async_trait]
impl OccurrenceStore for MemoryStore {
    async fn insert(&self, occurrence: Occurrence) -> Result<Occurrence> {
        let key = (occurrence.tour_id, occurrence.start_date_time);
        match self.occurrence_index.entry(key) {
            dashmap::Entry::Occupied(_) => Err(EngineError::Validation(format!(
                "occurrence already exists for tour {} at {}",
                occurrence.tour_id, occurrence.start_date_time
            ))),
            dashmap::Entry::Vacant(slot) => {
                slot.insert(occurrence.id);
                self.occurrences.insert(occurrence.id, occurrence.clone());
                Ok(occurrence)
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Occurrence>> {
        Ok(self.occurrences.get(&id).map(|o| o.clone()))
    }

    async fn list_for_tour(&self, tour_id: Uuid) -> Result<Vec<Occurrence>> {
        let mut occurrences: Vec<Occurrence> = self
            .occurrences
            .iter()
            .filter(|entry| entry.tour_id == tour_id)
            .map(|entry| entry.clone())
            .collect();
        occurrences.sort_by_key(|o| o.start_date_time);
        Ok(occurrences)
    }

    async fn exists_at(&self, tour_id: Uuid, start: DateTime<Utc>) -> Result<bool> {
        Ok(self.occurrence_index.contains_key(&(tour_id, start)))
    }

    async fn update(&self, occurrence: Occurrence) -> Result<Occurrence> {
        match self.occurrences.get_mut(&occurrence.id) {
            Some(mut existing) => {
                *existing = occurrence.clone();
                Ok(occurrence)
            }
            None => Err(EngineError::NotFound(format!(
                "occurrence {}",
                occurrence.id
            ))),
        }
    }

    async fn compare_and_set_available(&self, id: Uuid, expected: i32, new: i32) -> Result<bool> {
        match self.occurrences.get_mut(&id) {
            Some(mut occurrence) => {
                if occurrence.capacity_available == expected {
                    occurrence.capacity_available = new;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => Err(EngineError::NotFound(format!("occurrence {id}"))),
        }
    }
}

#[async_trait]
impl BoostStore for MemoryStore {
    async fn insert(&self, boost: Boost) -> Result<Boost> {
        self.boosts.write().await.push(boost.clone());
        Ok(boost)
    }

    async fn list(&self) -> Result<Vec<Boost>> {
        Ok(self.boosts.read().await.clone())
    }
}

#[async_trait]
impl EcoStore for MemoryStore {
    async fn balance(&self, user_id: Uuid) -> Result<EcoPointsBalance> {
        let account = self.eco.get(&user_id);
        Ok(EcoPointsBalance {
            user_id,
            points: account.as_ref().map_or(0, |a| a.balance),
            updated_at: account
                .as_ref()
                .and_then(|a| a.updated_at)
                .unwrap_or_else(Utc::now),
        })
    }

    async fn append(&self, entry: EcoHistoryEntry) -> Result<EcoPointsBalance> {
        let mut account = self.eco.entry(entry.user_id).or_default();
        let new_balance = account.balance + entry.delta;
        if new_balance < 0 {
            return Err(EngineError::Validation(format!(
                "delta {} would drive balance {} negative",
                entry.delta, account.balance
            )));
        }
        account.balance = new_balance;
        account.updated_at = Some(entry.ts);
        let balance = EcoPointsBalance {
            user_id: entry.user_id,
            points: new_balance,
            updated_at: entry.ts,
        };
        account.history.insert(0, entry);
        Ok(balance)
    }

    async fn history(&self, user_id: Uuid) -> Result<Vec<EcoHistoryEntry>> {
        Ok(self
            .eco
            .get(&user_id)
            .map(|a| a.history.clone())
            .unwrap_or_default())
    }
}

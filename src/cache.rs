//! In-memory caching using moka
//!
//! Boosts and patterns are operator-write/many-reader; customer-facing reads
//! tolerate slightly stale promotional data, so short TTLs are used. Capacity
//! state is never cached — the ledger always reads it strongly consistent.

use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::models::{Boost, SchedulePattern};

const BOOSTS_KEY: &str = "boosts";

/// Application cache holding boost and pattern listings
#[derive(Clone)]
pub struct AppCache {
    /// Full boost registry in registry order (singleton key)
    pub boosts: Cache<&'static str, Arc<Vec<Boost>>>,
    /// Schedule patterns per tour
    pub patterns: Cache<Uuid, Arc<Vec<SchedulePattern>>>,
}

impl AppCache {
    /// Create a new cache instance with configured TTLs
    pub fn new() -> Self {
        Self {
            // Boost registry: 1 entry, 60 s TTL
            boosts: Cache::builder()
                .max_capacity(1)
                .time_to_live(Duration::from_secs(60))
                .build(),

            // Patterns: 1000 tours, 5 min TTL, 2 min idle
            patterns: Cache::builder()
                .max_capacity(1000)
                .time_to_live(Duration::from_secs(5 * 60))
                .time_to_idle(Duration::from_secs(2 * 60))
                .build(),
        }
    }

    pub async fn boosts(&self) -> Option<Arc<Vec<Boost>>> {
        self.boosts.get(BOOSTS_KEY).await
    }

    pub async fn set_boosts(&self, boosts: Vec<Boost>) -> Arc<Vec<Boost>> {
        let boosts = Arc::new(boosts);
        self.boosts.insert(BOOSTS_KEY, boosts.clone()).await;
        boosts
    }

    pub async fn invalidate_boosts(&self) {
        self.boosts.invalidate(BOOSTS_KEY).await;
        info!("Boost cache invalidated");
    }

    pub async fn invalidate_patterns(&self, tour_id: Uuid) {
        self.patterns.invalidate(&tour_id).await;
        info!("Pattern cache invalidated for tour: {}", tour_id);
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            boosts_cached: self.boosts.entry_count() > 0,
            patterns_size: self.patterns.entry_count(),
        }
    }
}

impl Default for AppCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics for monitoring endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub boosts_cached: bool,
    pub patterns_size: u64,
}

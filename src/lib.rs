//! Availability and pricing engine for tour operators.
//!
//! Turns schedule patterns into bookable occurrences, guards seat capacity
//! against oversell, composes promotional boost pricing and keeps the
//! eco-points ledger.

pub mod availability;
pub mod cache;
pub mod config;
pub mod eco;
pub mod error;
pub mod ledger;
pub mod models;
pub mod pricing;
pub mod routes;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use crate::availability::AvailabilityService;
use crate::cache::AppCache;
use crate::config::Config;
use crate::eco::EcoLedger;
use crate::ledger::CapacityLedger;
use crate::pricing::BoostRegistry;
use crate::store::Stores;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub availability: Arc<AvailabilityService>,
    pub ledger: Arc<CapacityLedger>,
    pub boosts: BoostRegistry,
    pub eco: EcoLedger,
    pub cache: AppCache,
}

impl AppState {
    /// Wire all services over the given stores.
    pub fn new(stores: Stores, config: &Config) -> Self {
        let cache = AppCache::new();
        Self {
            availability: Arc::new(AvailabilityService::new(stores.clone(), cache.clone())),
            ledger: Arc::new(CapacityLedger::new(
                stores.occurrences.clone(),
                Duration::from_millis(config.lock_timeout_ms),
                config.low_water_fraction,
            )),
            boosts: BoostRegistry::new(stores.boosts.clone(), cache.clone()),
            eco: EcoLedger::new(stores.eco.clone()),
            stores,
            cache,
        }
    }
}

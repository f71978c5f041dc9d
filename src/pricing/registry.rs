//! Boost registry backed by the boost store, with a cached read path.
//!
//! Operator writes go straight to the store and invalidate the cache;
//! customer-facing reads (quoting, eco awards) go through the cache and
//! tolerate up to the TTL of staleness.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::cache::AppCache;
use crate::error::Result;
use crate::models::Boost;
use crate::store::BoostStore;

#[derive(Clone)]
pub struct BoostRegistry {
    store: Arc<dyn BoostStore>,
    cache: AppCache,
}

impl BoostRegistry {
    pub fn new(store: Arc<dyn BoostStore>, cache: AppCache) -> Self {
        Self { store, cache }
    }

    /// Register a boost. Validation failures leave the registry untouched.
    pub async fn create(&self, boost: Boost) -> Result<Boost> {
        boost.validate()?;
        let boost = self.store.insert(boost).await?;
        self.cache.invalidate_boosts().await;
        info!(boost_id = %boost.id, name = %boost.name, "Boost registered");
        Ok(boost)
    }

    /// All registered boosts, in registry order, through the cache.
    pub async fn list(&self) -> Result<Arc<Vec<Boost>>> {
        if let Some(cached) = self.cache.boosts().await {
            return Ok(cached);
        }
        let boosts = self.store.list().await?;
        Ok(self.cache.set_boosts(boosts).await)
    }

    /// Boosts whose activity window contains `now`. Eligibility filters are
    /// not applied here; the pricing composer checks them per purchase.
    pub async fn active_at(&self, now: DateTime<Utc>) -> Result<Vec<Boost>> {
        let all = self.list().await?;
        Ok(all
            .iter()
            .filter(|b| b.is_active_at(now))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoostKind;
    use crate::store::Stores;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn registry() -> BoostRegistry {
        let stores = Stores::in_memory();
        BoostRegistry::new(stores.boosts, AppCache::new())
    }

    fn boost(name: &str) -> Boost {
        Boost {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            kind: BoostKind::Event,
            multiplier: Some(dec!(1.2)),
            bonus_points: None,
            active_from: None,
            active_to: None,
            categories: None,
            min_amount: None,
            payment_methods: None,
            partner_id: None,
            conditions: None,
        }
    }

    #[tokio::test]
    async fn test_create_then_list_preserves_order() {
        let registry = registry();
        registry.create(boost("first")).await.unwrap();
        registry.create(boost("second")).await.unwrap();

        let listed = registry.list().await.unwrap();
        let names: Vec<&str> = listed.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_create_invalidates_cached_listing() {
        let registry = registry();
        registry.create(boost("first")).await.unwrap();
        assert_eq!(registry.list().await.unwrap().len(), 1);

        // second write must not be hidden by the warm cache
        registry.create(boost("second")).await.unwrap();
        assert_eq!(registry.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_boost_is_rejected() {
        let registry = registry();
        let mut b = boost("broken");
        b.multiplier = None;
        b.bonus_points = None;
        assert!(registry.create(b).await.is_err());
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_active_at_filters_expired() {
        let registry = registry();
        let now = Utc::now();
        let mut expired = boost("last summer");
        expired.active_to = Some(now - Duration::days(30));
        registry.create(expired).await.unwrap();
        registry.create(boost("current")).await.unwrap();

        let active = registry.active_at(now).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "current");
    }
}

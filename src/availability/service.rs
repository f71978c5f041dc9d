//! Materialization of patterns into concrete occurrences.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::availability::expander::expand;
use crate::cache::AppCache;
use crate::error::{EngineError, Result};
use crate::models::{Occurrence, OccurrenceState, SchedulePattern, Tour};
use crate::store::Stores;

/// Outcome of one materialization run
#[derive(Debug, Serialize)]
pub struct MaterializeReport {
    /// Occurrences created by this run
    pub created: usize,
    /// Dates skipped because an occurrence already existed
    pub skipped: usize,
    /// All dates the patterns cover within the range
    pub dates: Vec<NaiveDate>,
}

/// Operator edit of an occurrence's mutable fields
#[derive(Debug, Default, serde::Deserialize)]
pub struct OccurrenceEdit {
    pub state: Option<OccurrenceState>,
    pub capacity_available: Option<i32>,
    /// Explicit repricing; prices never recompute implicitly
    #[serde(with = "rust_decimal::serde::str_option", default)]
    pub price: Option<Decimal>,
}

/// Pattern authoring and occurrence materialization.
pub struct AvailabilityService {
    stores: Stores,
    cache: AppCache,
}

impl AvailabilityService {
    pub fn new(stores: Stores, cache: AppCache) -> Self {
        Self { stores, cache }
    }

    pub async fn create_tour(&self, tour: Tour) -> Result<Tour> {
        tour.validate()?;
        self.stores.tours.insert(tour).await
    }

    pub async fn get_tour(&self, id: Uuid) -> Result<Tour> {
        self.stores
            .tours
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("tour {id}")))
    }

    /// Create a pattern. Recurrence expressions are validated here, so
    /// expansion never fails during customer-facing reads.
    pub async fn create_pattern(&self, pattern: SchedulePattern) -> Result<SchedulePattern> {
        pattern.validate()?;
        self.get_tour(pattern.tour_id).await?;
        let created = self.stores.patterns.insert(pattern).await?;
        self.cache.invalidate_patterns(created.tour_id).await;
        Ok(created)
    }

    /// Customer-facing pattern listing (cache-backed; slightly stale is fine).
    pub async fn list_patterns(&self, tour_id: Uuid) -> Result<Vec<SchedulePattern>> {
        if let Some(cached) = self.cache.patterns.get(&tour_id).await {
            return Ok((*cached).clone());
        }
        let patterns = self.stores.patterns.list_for_tour(tour_id).await?;
        self.cache
            .patterns
            .insert(tour_id, std::sync::Arc::new(patterns.clone()))
            .await;
        Ok(patterns)
    }

    /// Materialize every pattern of a tour over `[range_start, range_end]`.
    ///
    /// Additive-only and idempotent: dates that already carry an occurrence
    /// (generated or manually created, edited or not) are skipped. Two
    /// patterns covering the same date is a configuration error surfaced to
    /// the operator; nothing is written in that case.
    pub async fn materialize_range(
        &self,
        tour_id: Uuid,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> Result<MaterializeReport> {
        if range_end < range_start {
            return Err(EngineError::Validation(format!(
                "range {range_start}..{range_end} is inverted"
            )));
        }
        let tour = self.get_tour(tour_id).await?;
        if !tour.is_bookable() {
            return Err(EngineError::Validation(format!(
                "tour {tour_id} is {} and cannot be materialized",
                tour.status.as_str()
            )));
        }

        // Strong read: materialization must not act on a stale pattern list
        let patterns = self.stores.patterns.list_for_tour(tour_id).await?;

        let mut by_date: BTreeMap<NaiveDate, Vec<&SchedulePattern>> = BTreeMap::new();
        for pattern in &patterns {
            for date in expand(pattern, range_start, range_end) {
                by_date.entry(date).or_default().push(pattern);
            }
        }

        let collisions: Vec<String> = by_date
            .iter()
            .filter(|(_, patterns)| patterns.len() > 1)
            .map(|(date, _)| date.to_string())
            .collect();
        if !collisions.is_empty() {
            return Err(EngineError::Configuration {
                message: format!(
                    "{} date(s) covered by more than one pattern",
                    collisions.len()
                ),
                errors: collisions,
            });
        }

        let mut created = 0;
        let mut skipped = 0;
        for (date, patterns) in &by_date {
            let pattern = patterns[0];
            let start = pattern.start_instant(*date)?;
            if self.stores.occurrences.exists_at(tour_id, start).await? {
                skipped += 1;
                continue;
            }
            let occurrence = Occurrence {
                id: Uuid::new_v4(),
                tour_id,
                start_date_time: start,
                capacity_total: pattern.capacity,
                capacity_available: pattern.capacity,
                price: pattern.price_override.unwrap_or(tour.base_price),
                currency: tour.currency.clone(),
                cutoff_hours: pattern
                    .cutoff_hours_override
                    .unwrap_or(tour.booking_cutoff_hours),
                state: OccurrenceState::Open,
                manually_edited: false,
                pattern_id: Some(pattern.id),
            };
            self.stores.occurrences.insert(occurrence).await?;
            created += 1;
        }

        tracing::info!(
            %tour_id,
            created,
            skipped,
            "Materialized range {range_start}..{range_end}"
        );

        Ok(MaterializeReport {
            created,
            skipped,
            dates: by_date.into_keys().collect(),
        })
    }

    pub async fn list_occurrences(&self, tour_id: Uuid) -> Result<Vec<Occurrence>> {
        self.stores.occurrences.list_for_tour(tour_id).await
    }

    /// Operator edit: state change, manual capacity adjustment or explicit
    /// repricing. Capacity is clamped into `0..=capacity_total`; edited
    /// records are marked so re-materialization never overwrites them.
    pub async fn edit_occurrence(&self, id: Uuid, edit: OccurrenceEdit) -> Result<Occurrence> {
        let mut occurrence = self
            .stores
            .occurrences
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("occurrence {id}")))?;

        if let Some(state) = edit.state {
            occurrence.state = state;
        }
        if let Some(available) = edit.capacity_available {
            if available < 0 {
                return Err(EngineError::Validation(
                    "capacity available must be non-negative".into(),
                ));
            }
            occurrence.capacity_available = available.min(occurrence.capacity_total);
        }
        if let Some(price) = edit.price {
            if price < Decimal::ZERO {
                return Err(EngineError::Validation("price must be non-negative".into()));
            }
            occurrence.price = price;
        }
        occurrence.manually_edited = true;

        self.stores.occurrences.update(occurrence).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CancellationPolicy, PatternKind, RecurrenceRule, TourStatus,
    };
    use chrono::{NaiveTime, Utc};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn service() -> AvailabilityService {
        AvailabilityService::new(Stores::in_memory(), AppCache::new())
    }

    async fn published_tour(svc: &AvailabilityService) -> Tour {
        svc.create_tour(Tour {
            id: Uuid::new_v4(),
            operator_id: Uuid::new_v4(),
            title: "Russkaya bay boat trip".to_string(),
            status: TourStatus::Published,
            base_price: dec!(18000),
            currency: "RUB".to_string(),
            min_group: 1,
            max_group: 12,
            cancellation_policy: CancellationPolicy::Standard,
            booking_cutoff_hours: 24,
            min_participants: 1,
            categories: vec!["sea".to_string()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await
        .unwrap()
    }

    fn weekend_pattern(tour_id: Uuid) -> SchedulePattern {
        SchedulePattern {
            id: Uuid::new_v4(),
            tour_id,
            kind: PatternKind::Recurrence {
                rule: RecurrenceRule::parse("FREQ=WEEKLY;BYDAY=SA,SU").unwrap(),
            },
            local_start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            timezone: chrono_tz::Asia::Kamchatka,
            start_date: date(2025, 7, 1),
            end_date: date(2025, 8, 31),
            capacity: 12,
            price_override: None,
            cutoff_hours_override: None,
            min_participants_override: None,
            blackout_dates: vec![],
            exceptions: vec![],
        }
    }

    #[tokio::test]
    async fn test_materialization_is_idempotent() {
        let svc = service();
        let tour = published_tour(&svc).await;
        svc.create_pattern(weekend_pattern(tour.id)).await.unwrap();

        let first = svc
            .materialize_range(tour.id, date(2025, 7, 1), date(2025, 7, 14))
            .await
            .unwrap();
        assert_eq!(first.created, 4);
        assert_eq!(first.skipped, 0);

        let second = svc
            .materialize_range(tour.id, date(2025, 7, 1), date(2025, 7, 14))
            .await
            .unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.skipped, 4);
        assert_eq!(first.dates, second.dates);

        let occurrences = svc.list_occurrences(tour.id).await.unwrap();
        assert_eq!(occurrences.len(), 4);
    }

    #[tokio::test]
    async fn test_materialization_tops_up_new_dates_only() {
        let svc = service();
        let tour = published_tour(&svc).await;
        svc.create_pattern(weekend_pattern(tour.id)).await.unwrap();

        svc.materialize_range(tour.id, date(2025, 7, 1), date(2025, 7, 7))
            .await
            .unwrap();
        let report = svc
            .materialize_range(tour.id, date(2025, 7, 1), date(2025, 7, 14))
            .await
            .unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.skipped, 2);
    }

    #[tokio::test]
    async fn test_colliding_patterns_are_a_configuration_error() {
        let svc = service();
        let tour = published_tour(&svc).await;
        svc.create_pattern(weekend_pattern(tour.id)).await.unwrap();

        let mut saturday_only = weekend_pattern(tour.id);
        saturday_only.id = Uuid::new_v4();
        saturday_only.kind = PatternKind::Recurrence {
            rule: RecurrenceRule::parse("FREQ=WEEKLY;BYDAY=SA").unwrap(),
        };
        svc.create_pattern(saturday_only).await.unwrap();

        let err = svc
            .materialize_range(tour.id, date(2025, 7, 1), date(2025, 7, 14))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Configuration { .. }));
        // Nothing was written
        assert!(svc.list_occurrences(tour.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manual_edits_survive_rematerialization() {
        let svc = service();
        let tour = published_tour(&svc).await;
        svc.create_pattern(weekend_pattern(tour.id)).await.unwrap();
        svc.materialize_range(tour.id, date(2025, 7, 1), date(2025, 7, 7))
            .await
            .unwrap();

        let occurrence = &svc.list_occurrences(tour.id).await.unwrap()[0];
        svc.edit_occurrence(
            occurrence.id,
            OccurrenceEdit {
                capacity_available: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        svc.materialize_range(tour.id, date(2025, 7, 1), date(2025, 7, 7))
            .await
            .unwrap();
        let after = svc.list_occurrences(tour.id).await.unwrap();
        let edited = after.iter().find(|o| o.id == occurrence.id).unwrap();
        assert_eq!(edited.capacity_available, 2);
        assert!(edited.manually_edited);
    }

    #[tokio::test]
    async fn test_price_resolved_once_from_override_or_base() {
        let svc = service();
        let tour = published_tour(&svc).await;
        let mut pattern = weekend_pattern(tour.id);
        pattern.price_override = Some(dec!(21000));
        svc.create_pattern(pattern).await.unwrap();

        svc.materialize_range(tour.id, date(2025, 7, 1), date(2025, 7, 7))
            .await
            .unwrap();
        for occurrence in svc.list_occurrences(tour.id).await.unwrap() {
            assert_eq!(occurrence.price, dec!(21000));
        }
    }

    #[tokio::test]
    async fn test_unpublished_tour_rejected() {
        let svc = service();
        let mut tour = published_tour(&svc).await;
        tour.status = TourStatus::Archived;
        svc.stores.tours.update(tour.clone()).await.unwrap();

        let err = svc
            .materialize_range(tour.id, date(2025, 7, 1), date(2025, 7, 7))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_edit_clamps_capacity_to_total() {
        let svc = service();
        let tour = published_tour(&svc).await;
        svc.create_pattern(weekend_pattern(tour.id)).await.unwrap();
        svc.materialize_range(tour.id, date(2025, 7, 1), date(2025, 7, 7))
            .await
            .unwrap();

        let occurrence = &svc.list_occurrences(tour.id).await.unwrap()[0];
        let edited = svc
            .edit_occurrence(
                occurrence.id,
                OccurrenceEdit {
                    capacity_available: Some(99),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.capacity_available, edited.capacity_total);
    }
}

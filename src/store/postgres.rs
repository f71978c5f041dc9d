//! Postgres store backed by sqlx.
//!
//! Enum and timezone columns are stored as text and parsed at the row
//! boundary; the no-oversell decrement is a single compare-and-swap UPDATE so
//! concurrent writers from other processes cannot interleave.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::{
    Boost, EcoHistoryEntry, EcoPointsBalance, Occurrence, PatternKind, RecurrenceRule,
    SchedulePattern, Tour,
};
use crate::store::{BoostStore, EcoStore, OccurrenceStore, PatternStore, TourStore};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Tour row from `tours`
#[derive(Debug, FromRow)]
struct TourRow {
    id: Uuid,
    operator_id: Uuid,
    title: String,
    status: String,
    base_price: Decimal,
    currency: String,
    min_group: i32,
    max_group: i32,
    cancellation_policy: String,
    booking_cutoff_hours: i64,
    min_participants: i32,
    categories: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TourRow> for Tour {
    type Error = EngineError;

    fn try_from(row: TourRow) -> Result<Self> {
        Ok(Tour {
            id: row.id,
            operator_id: row.operator_id,
            title: row.title,
            status: row.status.parse()?,
            base_price: row.base_price,
            currency: row.currency,
            min_group: row.min_group,
            max_group: row.max_group,
            cancellation_policy: row.cancellation_policy.parse()?,
            booking_cutoff_hours: row.booking_cutoff_hours,
            min_participants: row.min_participants,
            categories: row.categories,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Pattern row from `schedule_patterns`
#[derive(Debug, FromRow)]
struct PatternRow {
    id: Uuid,
    tour_id: Uuid,
    kind: String,
    rrule: Option<String>,
    dates: Option<Vec<NaiveDate>>,
    local_start_time: NaiveTime,
    timezone: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    capacity: i32,
    price_override: Option<Decimal>,
    cutoff_hours_override: Option<i64>,
    min_participants_override: Option<i32>,
    blackout_dates: Vec<NaiveDate>,
    exceptions: Vec<NaiveDate>,
}

impl TryFrom<PatternRow> for SchedulePattern {
    type Error = EngineError;

    fn try_from(row: PatternRow) -> Result<Self> {
        let kind = match row.kind.as_str() {
            "list" => PatternKind::List {
                dates: row.dates.unwrap_or_default(),
            },
            "rrule" => PatternKind::Recurrence {
                rule: RecurrenceRule::parse(row.rrule.as_deref().unwrap_or_default())?,
            },
            other => {
                return Err(EngineError::Validation(format!(
                    "unknown pattern kind '{other}'"
                )))
            }
        };
        let timezone = row
            .timezone
            .parse()
            .map_err(|_| EngineError::Validation(format!("unknown timezone '{}'", row.timezone)))?;
        Ok(SchedulePattern {
            id: row.id,
            tour_id: row.tour_id,
            kind,
            local_start_time: row.local_start_time,
            timezone,
            start_date: row.start_date,
            end_date: row.end_date,
            capacity: row.capacity,
            price_override: row.price_override,
            cutoff_hours_override: row.cutoff_hours_override,
            min_participants_override: row.min_participants_override,
            blackout_dates: row.blackout_dates,
            exceptions: row.exceptions,
        })
    }
}

/// Occurrence row from `occurrences`
#[derive(Debug, FromRow)]
struct OccurrenceRow {
    id: Uuid,
    tour_id: Uuid,
    start_date_time: DateTime<Utc>,
    capacity_total: i32,
    capacity_available: i32,
    price: Decimal,
    currency: String,
    cutoff_hours: i64,
    state: String,
    manually_edited: bool,
    pattern_id: Option<Uuid>,
}

impl TryFrom<OccurrenceRow> for Occurrence {
    type Error = EngineError;

    fn try_from(row: OccurrenceRow) -> Result<Self> {
        Ok(Occurrence {
            id: row.id,
            tour_id: row.tour_id,
            start_date_time: row.start_date_time,
            capacity_total: row.capacity_total,
            capacity_available: row.capacity_available,
            price: row.price,
            currency: row.currency,
            cutoff_hours: row.cutoff_hours,
            state: row.state.parse()?,
            manually_edited: row.manually_edited,
            pattern_id: row.pattern_id,
        })
    }
}

/// Boost row from `boosts`
#[derive(Debug, FromRow)]
struct BoostRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    kind: String,
    multiplier: Option<Decimal>,
    bonus_points: Option<i64>,
    active_from: Option<DateTime<Utc>>,
    active_to: Option<DateTime<Utc>>,
    categories: Option<Vec<String>>,
    min_amount: Option<Decimal>,
    payment_methods: Option<Vec<String>>,
    partner_id: Option<String>,
    conditions: Option<serde_json::Value>,
}

impl TryFrom<BoostRow> for Boost {
    type Error = EngineError;

    fn try_from(row: BoostRow) -> Result<Self> {
        Ok(Boost {
            id: row.id,
            name: row.name,
            description: row.description,
            kind: row.kind.parse()?,
            multiplier: row.multiplier,
            bonus_points: row.bonus_points,
            active_from: row.active_from,
            active_to: row.active_to,
            categories: row.categories,
            min_amount: row.min_amount,
            payment_methods: row.payment_methods,
            partner_id: row.partner_id,
            conditions: row.conditions,
        })
    }
}

/// History row from `eco_history`
#[derive(Debug, FromRow)]
struct EcoHistoryRow {
    id: Uuid,
    user_id: Uuid,
    ts: DateTime<Utc>,
    source: String,
    title: String,
    delta: i64,
}

impl TryFrom<EcoHistoryRow> for EcoHistoryEntry {
    type Error = EngineError;

    fn try_from(row: EcoHistoryRow) -> Result<Self> {
        Ok(EcoHistoryEntry {
            id: row.id,
            user_id: row.user_id,
            ts: row.ts,
            source: row.source.parse()?,
            title: row.title,
            delta: row.delta,
        })
    }
}

#[async_trait]
impl TourStore for PgStore {
    async fn insert(&self, tour: Tour) -> Result<Tour> {
        sqlx::query(
            r#"
            INSERT INTO tours (
                id, operator_id, title, status, base_price, currency,
                min_group, max_group, cancellation_policy,
                booking_cutoff_hours, min_participants, categories,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(tour.id)
        .bind(tour.operator_id)
        .bind(&tour.title)
        .bind(tour.status.as_str())
        .bind(tour.base_price)
        .bind(&tour.currency)
        .bind(tour.min_group)
        .bind(tour.max_group)
        .bind(tour.cancellation_policy.as_str())
        .bind(tour.booking_cutoff_hours)
        .bind(tour.min_participants)
        .bind(&tour.categories)
        .bind(tour.created_at)
        .bind(tour.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(tour)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Tour>> {
        let row = sqlx::query_as::<_, TourRow>(
            r#"
            SELECT
                id, operator_id, title, status, base_price, currency,
                min_group, max_group, cancellation_policy,
                booking_cutoff_hours, min_participants, categories,
                created_at, updated_at
            FROM tours
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Tour::try_from).transpose()
    }

    async fn update(&self, tour: Tour) -> Result<Tour> {
        let result = sqlx::query(
            r#"
            UPDATE tours
            SET title = $2, status = $3, base_price = $4, currency = $5,
                min_group = $6, max_group = $7, cancellation_policy = $8,
                booking_cutoff_hours = $9, min_participants = $10,
                categories = $11, updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(tour.id)
        .bind(&tour.title)
        .bind(tour.status.as_str())
        .bind(tour.base_price)
        .bind(&tour.currency)
        .bind(tour.min_group)
        .bind(tour.max_group)
        .bind(tour.cancellation_policy.as_str())
        .bind(tour.booking_cutoff_hours)
        .bind(tour.min_participants)
        .bind(&tour.categories)
        .bind(tour.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::NotFound(format!("tour {}", tour.id)));
        }
        Ok(tour)
    }
}

#[async_trait]
impl PatternStore for PgStore {
    async fn insert(&self, pattern: SchedulePattern) -> Result<SchedulePattern> {
        let (kind, rrule, dates) = match &pattern.kind {
            PatternKind::List { dates } => ("list", None, Some(dates.clone())),
            PatternKind::Recurrence { rule } => ("rrule", Some(rule.source.clone()), None),
        };
        sqlx::query(
            r#"
            INSERT INTO schedule_patterns (
                id, tour_id, kind, rrule, dates, local_start_time, timezone,
                start_date, end_date, capacity, price_override,
                cutoff_hours_override, min_participants_override,
                blackout_dates, exceptions
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(pattern.id)
        .bind(pattern.tour_id)
        .bind(kind)
        .bind(rrule)
        .bind(dates)
        .bind(pattern.local_start_time)
        .bind(pattern.timezone.name())
        .bind(pattern.start_date)
        .bind(pattern.end_date)
        .bind(pattern.capacity)
        .bind(pattern.price_override)
        .bind(pattern.cutoff_hours_override)
        .bind(pattern.min_participants_override)
        .bind(&pattern.blackout_dates)
        .bind(&pattern.exceptions)
        .execute(&self.pool)
        .await?;
        Ok(pattern)
    }

    async fn list_for_tour(&self, tour_id: Uuid) -> Result<Vec<SchedulePattern>> {
        let rows = sqlx::query_as::<_, PatternRow>(
            r#"
            SELECT
                id, tour_id, kind, rrule, dates, local_start_time, timezone,
                start_date, end_date, capacity, price_override,
                cutoff_hours_override, min_participants_override,
                blackout_dates, exceptions
            FROM schedule_patterns
            WHERE tour_id = $1
            ORDER BY start_date
            "#,
        )
        .bind(tour_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SchedulePattern::try_from).collect()
    }
}

#[async_trait]
impl OccurrenceStore for PgStore {
    async fn insert(&self, occurrence: Occurrence) -> Result<Occurrence> {
        let result = sqlx::query(
            r#"
            INSERT INTO occurrences (
                id, tour_id, start_date_time, capacity_total,
                capacity_available, price, currency, cutoff_hours, state,
                manually_edited, pattern_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (tour_id, start_date_time) DO NOTHING
            "#,
        )
        .bind(occurrence.id)
        .bind(occurrence.tour_id)
        .bind(occurrence.start_date_time)
        .bind(occurrence.capacity_total)
        .bind(occurrence.capacity_available)
        .bind(occurrence.price)
        .bind(&occurrence.currency)
        .bind(occurrence.cutoff_hours)
        .bind(occurrence.state.as_str())
        .bind(occurrence.manually_edited)
        .bind(occurrence.pattern_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::Validation(format!(
                "occurrence already exists for tour {} at {}",
                occurrence.tour_id, occurrence.start_date_time
            )));
        }
        Ok(occurrence)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Occurrence>> {
        let row = sqlx::query_as::<_, OccurrenceRow>(
            r#"
            SELECT
                id, tour_id, start_date_time, capacity_total,
                capacity_available, price, currency, cutoff_hours, state,
                manually_edited, pattern_id
            FROM occurrences
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Occurrence::try_from).transpose()
    }

    async fn list_for_tour(&self, tour_id: Uuid) -> Result<Vec<Occurrence>> {
        let rows = sqlx::query_as::<_, OccurrenceRow>(
            r#"
            SELECT
                id, tour_id, start_date_time, capacity_total,
                capacity_available, price, currency, cutoff_hours, state,
                manually_edited, pattern_id
            FROM occurrences
            WHERE tour_id = $1
            ORDER BY start_date_time
            "#,
        )
        .bind(tour_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Occurrence::try_from).collect()
    }

    async fn exists_at(&self, tour_id: Uuid, start: DateTime<Utc>) -> Result<bool> {
        let exists: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT 1
            FROM occurrences
            WHERE tour_id = $1 AND start_date_time = $2
            "#,
        )
        .bind(tour_id)
        .bind(start)
        .fetch_optional(&self.pool)
        .await?;
        Ok(exists.is_some())
    }

    async fn update(&self, occurrence: Occurrence) -> Result<Occurrence> {
        let result = sqlx::query(
            r#"
            UPDATE occurrences
            SET capacity_available = $2, price = $3, currency = $4,
                state = $5, manually_edited = $6
            WHERE id = $1
            "#,
        )
        .bind(occurrence.id)
        .bind(occurrence.capacity_available)
        .bind(occurrence.price)
        .bind(&occurrence.currency)
        .bind(occurrence.state.as_str())
        .bind(occurrence.manually_edited)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::NotFound(format!(
                "occurrence {}",
                occurrence.id
            )));
        }
        Ok(occurrence)
    }

    async fn compare_and_set_available(&self, id: Uuid, expected: i32, new: i32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE occurrences
            SET capacity_available = $3
            WHERE id = $1 AND capacity_available = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl BoostStore for PgStore {
    async fn insert(&self, boost: Boost) -> Result<Boost> {
        sqlx::query(
            r#"
            INSERT INTO boosts (
                id, name, description, kind, multiplier, bonus_points,
                active_from, active_to, categories, min_amount,
                payment_methods, partner_id, conditions
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(boost.id)
        .bind(&boost.name)
        .bind(&boost.description)
        .bind(boost.kind.as_str())
        .bind(boost.multiplier)
        .bind(boost.bonus_points)
        .bind(boost.active_from)
        .bind(boost.active_to)
        .bind(&boost.categories)
        .bind(boost.min_amount)
        .bind(&boost.payment_methods)
        .bind(&boost.partner_id)
        .bind(&boost.conditions)
        .execute(&self.pool)
        .await?;
        Ok(boost)
    }

    async fn list(&self) -> Result<Vec<Boost>> {
        let rows = sqlx::query_as::<_, BoostRow>(
            r#"
            SELECT
                id, name, description, kind, multiplier, bonus_points,
                active_from, active_to, categories, min_amount,
                payment_methods, partner_id, conditions
            FROM boosts
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Boost::try_from).collect()
    }
}

#[async_trait]
impl EcoStore for PgStore {
    async fn balance(&self, user_id: Uuid) -> Result<EcoPointsBalance> {
        let row: Option<(i64, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT points, updated_at
            FROM eco_balances
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        let (points, updated_at) = row.unwrap_or((0, Utc::now()));
        Ok(EcoPointsBalance {
            user_id,
            points,
            updated_at,
        })
    }

    async fn append(&self, entry: EcoHistoryEntry) -> Result<EcoPointsBalance> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT points
            FROM eco_balances
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(entry.user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let new_balance = current.unwrap_or(0) + entry.delta;
        if new_balance < 0 {
            // Dropping the transaction rolls back the row lock
            return Err(EngineError::Validation(format!(
                "delta {} would drive balance {} negative",
                entry.delta,
                current.unwrap_or(0)
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO eco_history (id, user_id, ts, source, title, delta)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.ts)
        .bind(entry.source.as_str())
        .bind(&entry.title)
        .bind(entry.delta)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO eco_balances (user_id, points, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET points = $2, updated_at = $3
            "#,
        )
        .bind(entry.user_id)
        .bind(new_balance)
        .bind(entry.ts)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(EcoPointsBalance {
            user_id: entry.user_id,
            points: new_balance,
            updated_at: entry.ts,
        })
    }

    async fn history(&self, user_id: Uuid) -> Result<Vec<EcoHistoryEntry>> {
        let rows = sqlx::query_as::<_, EcoHistoryRow>(
            r#"
            SELECT id, user_id, ts, source, title, delta
            FROM eco_history
            WHERE user_id = $1
            ORDER BY ts DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(EcoHistoryEntry::try_from).collect()
    }
}

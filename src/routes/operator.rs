//! Operator route handlers: tours, schedule patterns, materialization,
//! occurrence edits and the boost registry.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::availability::{MaterializeReport, OccurrenceEdit};
use crate::error::{EngineError, Result};
use crate::models::{
    Boost, BoostKind, CancellationPolicy, Occurrence, PatternKind, RecurrenceRule,
    SchedulePattern, Tour, TourStatus,
};
use crate::AppState;

/// Request body for tour creation
#[derive(Debug, Deserialize)]
pub struct CreateTourRequest {
    pub operator_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub status: Option<TourStatus>,
    #[serde(with = "rust_decimal::serde::str")]
    pub base_price: Decimal,
    pub currency: String,
    pub min_group: i32,
    pub max_group: i32,
    pub cancellation_policy: CancellationPolicy,
    pub booking_cutoff_hours: i64,
    pub min_participants: i32,
    #[serde(default)]
    pub categories: Vec<String>,
}

pub async fn create_tour(
    State(state): State<AppState>,
    Json(req): Json<CreateTourRequest>,
) -> Result<Json<Tour>> {
    let now = Utc::now();
    let tour = state
        .availability
        .create_tour(Tour {
            id: Uuid::new_v4(),
            operator_id: req.operator_id,
            title: req.title,
            status: req.status.unwrap_or(TourStatus::Draft),
            base_price: req.base_price,
            currency: req.currency,
            min_group: req.min_group,
            max_group: req.max_group,
            cancellation_policy: req.cancellation_policy,
            booking_cutoff_hours: req.booking_cutoff_hours,
            min_participants: req.min_participants,
            categories: req.categories,
            created_at: now,
            updated_at: now,
        })
        .await?;
    Ok(Json(tour))
}

pub async fn get_tour(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Tour>> {
    Ok(Json(state.availability.get_tour(id).await?))
}

/// Request body for pattern creation. Exactly one of `dates` and `rrule`
/// must be given; recurrence expressions are parsed and rejected here, so
/// stored patterns always expand cleanly.
#[derive(Debug, Deserialize)]
pub struct CreatePatternRequest {
    #[serde(default)]
    pub dates: Option<Vec<NaiveDate>>,
    #[serde(default)]
    pub rrule: Option<String>,
    pub local_start_time: NaiveTime,
    pub timezone: chrono_tz::Tz,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub capacity: i32,
    #[serde(with = "rust_decimal::serde::str_option", default)]
    pub price_override: Option<Decimal>,
    #[serde(default)]
    pub cutoff_hours_override: Option<i64>,
    #[serde(default)]
    pub min_participants_override: Option<i32>,
    #[serde(default)]
    pub blackout_dates: Vec<NaiveDate>,
    #[serde(default)]
    pub exceptions: Vec<NaiveDate>,
}

pub async fn create_pattern(
    State(state): State<AppState>,
    Path(tour_id): Path<Uuid>,
    Json(req): Json<CreatePatternRequest>,
) -> Result<Json<SchedulePattern>> {
    let kind = match (req.dates, req.rrule) {
        (Some(dates), None) => PatternKind::List { dates },
        (None, Some(rrule)) => PatternKind::Recurrence {
            rule: RecurrenceRule::parse(&rrule)?,
        },
        _ => {
            return Err(EngineError::Validation(
                "pattern must declare exactly one of 'dates' or 'rrule'".into(),
            ))
        }
    };
    let pattern = state
        .availability
        .create_pattern(SchedulePattern {
            id: Uuid::new_v4(),
            tour_id,
            kind,
            local_start_time: req.local_start_time,
            timezone: req.timezone,
            start_date: req.start_date,
            end_date: req.end_date,
            capacity: req.capacity,
            price_override: req.price_override,
            cutoff_hours_override: req.cutoff_hours_override,
            min_participants_override: req.min_participants_override,
            blackout_dates: req.blackout_dates,
            exceptions: req.exceptions,
        })
        .await?;
    Ok(Json(pattern))
}

pub async fn list_patterns(
    State(state): State<AppState>,
    Path(tour_id): Path<Uuid>,
) -> Result<Json<Vec<SchedulePattern>>> {
    Ok(Json(state.availability.list_patterns(tour_id).await?))
}

/// Request body for range materialization
#[derive(Debug, Deserialize)]
pub struct MaterializeRequest {
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
}

pub async fn materialize(
    State(state): State<AppState>,
    Path(tour_id): Path<Uuid>,
    Json(req): Json<MaterializeRequest>,
) -> Result<Json<MaterializeReport>> {
    let report = state
        .availability
        .materialize_range(tour_id, req.range_start, req.range_end)
        .await?;
    Ok(Json(report))
}

pub async fn list_occurrences(
    State(state): State<AppState>,
    Path(tour_id): Path<Uuid>,
) -> Result<Json<Vec<Occurrence>>> {
    Ok(Json(state.availability.list_occurrences(tour_id).await?))
}

pub async fn edit_occurrence(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(edit): Json<OccurrenceEdit>,
) -> Result<Json<Occurrence>> {
    Ok(Json(state.availability.edit_occurrence(id, edit).await?))
}

/// Request body for boost registration
#[derive(Debug, Deserialize)]
pub struct CreateBoostRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub kind: BoostKind,
    #[serde(with = "rust_decimal::serde::str_option", default)]
    pub multiplier: Option<Decimal>,
    #[serde(default)]
    pub bonus_points: Option<i64>,
    #[serde(default)]
    pub active_from: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    pub active_to: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(with = "rust_decimal::serde::str_option", default)]
    pub min_amount: Option<Decimal>,
    #[serde(default)]
    pub payment_methods: Option<Vec<String>>,
    #[serde(default)]
    pub partner_id: Option<String>,
    #[serde(default)]
    pub conditions: Option<serde_json::Value>,
}

pub async fn create_boost(
    State(state): State<AppState>,
    Json(req): Json<CreateBoostRequest>,
) -> Result<Json<Boost>> {
    let boost = state
        .boosts
        .create(Boost {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            kind: req.kind,
            multiplier: req.multiplier,
            bonus_points: req.bonus_points,
            active_from: req.active_from,
            active_to: req.active_to,
            categories: req.categories,
            min_amount: req.min_amount,
            payment_methods: req.payment_methods,
            partner_id: req.partner_id,
            conditions: req.conditions,
        })
        .await?;
    Ok(Json(boost))
}

pub async fn list_boosts(State(state): State<AppState>) -> Result<Json<Vec<Boost>>> {
    let boosts = state.boosts.list().await?;
    Ok(Json((*boosts).clone()))
}

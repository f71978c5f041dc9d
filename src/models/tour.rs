//! Tour offering model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// Tour lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TourStatus {
    Draft,
    Review,
    Published,
    Archived,
}

impl TourStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TourStatus::Draft => "draft",
            TourStatus::Review => "review",
            TourStatus::Published => "published",
            TourStatus::Archived => "archived",
        }
    }
}

impl std::str::FromStr for TourStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(TourStatus::Draft),
            "review" => Ok(TourStatus::Review),
            "published" => Ok(TourStatus::Published),
            "archived" => Ok(TourStatus::Archived),
            other => Err(EngineError::Validation(format!(
                "unknown tour status '{other}'"
            ))),
        }
    }
}

/// Cancellation policy attached to a tour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationPolicy {
    Flexible,
    Standard,
    Strict,
}

impl CancellationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationPolicy::Flexible => "flexible",
            CancellationPolicy::Standard => "standard",
            CancellationPolicy::Strict => "strict",
        }
    }
}

impl std::str::FromStr for CancellationPolicy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "flexible" => Ok(CancellationPolicy::Flexible),
            "standard" => Ok(CancellationPolicy::Standard),
            "strict" => Ok(CancellationPolicy::Strict),
            other => Err(EngineError::Validation(format!(
                "unknown cancellation policy '{other}'"
            ))),
        }
    }
}

/// Maximum booking cutoff window (one week)
pub const MAX_CUTOFF_HOURS: i64 = 168;

/// An operator's tour offering.
///
/// Owned exclusively by one operator. Archived tours retain their history but
/// accept no new bookings or materializations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tour {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub title: String,
    pub status: TourStatus,
    #[serde(with = "rust_decimal::serde::str")]
    pub base_price: Decimal,
    pub currency: String,
    pub min_group: i32,
    pub max_group: i32,
    pub cancellation_policy: CancellationPolicy,
    /// Hours before start after which booking closes
    pub booking_cutoff_hours: i64,
    pub min_participants: i32,
    /// Activity tags, matched against boost category filters
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tour {
    /// Validate invariants at creation time.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().len() < 3 {
            return Err(EngineError::Validation(
                "tour title must be at least 3 characters".into(),
            ));
        }
        if self.base_price < Decimal::ZERO {
            return Err(EngineError::Validation(
                "base price must be non-negative".into(),
            ));
        }
        if self.min_group < 0 || self.max_group < 1 || self.max_group < self.min_group {
            return Err(EngineError::Validation(format!(
                "invalid group bounds {}..{}",
                self.min_group, self.max_group
            )));
        }
        if !(0..=MAX_CUTOFF_HOURS).contains(&self.booking_cutoff_hours) {
            return Err(EngineError::Validation(format!(
                "booking cutoff must be 0..={MAX_CUTOFF_HOURS} hours"
            )));
        }
        if self.min_participants < 1 {
            return Err(EngineError::Validation(
                "min participants must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Only published tours accept new bookings or materializations.
    pub fn is_bookable(&self) -> bool {
        self.status == TourStatus::Published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_tour() -> Tour {
        Tour {
            id: Uuid::new_v4(),
            operator_id: Uuid::new_v4(),
            title: "Avacha volcano ascent".to_string(),
            status: TourStatus::Published,
            base_price: dec!(12000),
            currency: "RUB".to_string(),
            min_group: 1,
            max_group: 12,
            cancellation_policy: CancellationPolicy::Standard,
            booking_cutoff_hours: 24,
            min_participants: 1,
            categories: vec!["trek".to_string(), "volcano".to_string()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_valid_tour_passes() {
        assert!(sample_tour().validate().is_ok());
    }

    #[test]
    fn test_inverted_group_bounds_rejected() {
        let mut tour = sample_tour();
        tour.min_group = 10;
        tour.max_group = 4;
        assert!(tour.validate().is_err());
    }

    #[test]
    fn test_cutoff_over_one_week_rejected() {
        let mut tour = sample_tour();
        tour.booking_cutoff_hours = 169;
        assert!(tour.validate().is_err());
    }

    #[test]
    fn test_only_published_is_bookable() {
        let mut tour = sample_tour();
        assert!(tour.is_bookable());
        tour.status = TourStatus::Archived;
        assert!(!tour.is_bookable());
        tour.status = TourStatus::Draft;
        assert!(!tour.is_bookable());
    }
}

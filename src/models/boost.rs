//! Promotional boost rules.
//!
//! A boost never references a specific occurrence; its filters are evaluated
//! against the purchase context at pricing or award time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// Promotional rule category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostKind {
    TimeMultiplier,
    CategoryMultiplier,
    Streak,
    FirstAction,
    Referral,
    TierMultiplier,
    PaymentMethod,
    EcoChoice,
    Event,
    Bundle,
}

impl BoostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoostKind::TimeMultiplier => "time_multiplier",
            BoostKind::CategoryMultiplier => "category_multiplier",
            BoostKind::Streak => "streak",
            BoostKind::FirstAction => "first_action",
            BoostKind::Referral => "referral",
            BoostKind::TierMultiplier => "tier_multiplier",
            BoostKind::PaymentMethod => "payment_method",
            BoostKind::EcoChoice => "eco_choice",
            BoostKind::Event => "event",
            BoostKind::Bundle => "bundle",
        }
    }
}

impl std::str::FromStr for BoostKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "time_multiplier" => Ok(BoostKind::TimeMultiplier),
            "category_multiplier" => Ok(BoostKind::CategoryMultiplier),
            "streak" => Ok(BoostKind::Streak),
            "first_action" => Ok(BoostKind::FirstAction),
            "referral" => Ok(BoostKind::Referral),
            "tier_multiplier" => Ok(BoostKind::TierMultiplier),
            "payment_method" => Ok(BoostKind::PaymentMethod),
            "eco_choice" => Ok(BoostKind::EcoChoice),
            "event" => Ok(BoostKind::Event),
            "bundle" => Ok(BoostKind::Bundle),
            other => Err(EngineError::Validation(format!(
                "unknown boost kind '{other}'"
            ))),
        }
    }
}

/// The reservation context a boost is evaluated against.
///
/// Filters never look at an occurrence's historical state, only at what the
/// caller is buying right now.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseContext {
    pub category: Option<String>,
    #[serde(with = "rust_decimal::serde::str_option", default)]
    pub amount: Option<Decimal>,
    pub payment_method: Option<String>,
    pub partner_id: Option<String>,
    pub now: DateTime<Utc>,
}

/// A time-boxed, filter-gated promotional multiplier and/or flat bonus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Boost {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub kind: BoostKind,
    /// e.g. 1.2 = +20%; must be positive when present
    #[serde(with = "rust_decimal::serde::str_option", default)]
    pub multiplier: Option<Decimal>,
    /// Flat bonus points, summed separately, never multiplied
    pub bonus_points: Option<i64>,
    /// Activity window; an absent bound is unbounded on that side
    pub active_from: Option<DateTime<Utc>>,
    pub active_to: Option<DateTime<Utc>>,
    pub categories: Option<Vec<String>>,
    #[serde(with = "rust_decimal::serde::str_option", default)]
    pub min_amount: Option<Decimal>,
    pub payment_methods: Option<Vec<String>>,
    pub partner_id: Option<String>,
    /// Free-form extra conditions, carried but not interpreted by the engine
    pub conditions: Option<serde_json::Value>,
}

impl Boost {
    /// Validate invariants at creation time.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::Validation("boost name must not be empty".into()));
        }
        if self.multiplier.is_none() && self.bonus_points.is_none() {
            return Err(EngineError::Validation(
                "boost must declare a multiplier or bonus points".into(),
            ));
        }
        if let Some(mult) = self.multiplier {
            if mult <= Decimal::ZERO {
                return Err(EngineError::Validation(
                    "boost multiplier must be positive".into(),
                ));
            }
        }
        if let Some(bonus) = self.bonus_points {
            if bonus < 0 {
                return Err(EngineError::Validation(
                    "bonus points must be non-negative".into(),
                ));
            }
        }
        if let (Some(from), Some(to)) = (self.active_from, self.active_to) {
            if from > to {
                return Err(EngineError::Validation(format!(
                    "boost window {from}..{to} is inverted"
                )));
            }
        }
        Ok(())
    }

    /// Whether `now` falls within the activity window.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        let from_ok = self.active_from.map_or(true, |from| now >= from);
        let to_ok = self.active_to.map_or(true, |to| now <= to);
        from_ok && to_ok
    }

    /// Whether every declared filter is satisfied by the context.
    ///
    /// Filters are conjunctive restrictions: an absent filter is
    /// automatically satisfied, and a filter that the context carries no
    /// value for does not disqualify (except `min_amount`, where a missing
    /// amount counts as zero).
    pub fn is_eligible(&self, ctx: &PurchaseContext) -> bool {
        if let (Some(categories), Some(category)) = (&self.categories, &ctx.category) {
            if !categories.contains(category) {
                return false;
            }
        }
        if let Some(min_amount) = self.min_amount {
            if ctx.amount.unwrap_or(Decimal::ZERO) < min_amount {
                return false;
            }
        }
        if let (Some(methods), Some(method)) = (&self.payment_methods, &ctx.payment_method) {
            if !methods.contains(method) {
                return false;
            }
        }
        if let (Some(partner), Some(ctx_partner)) = (&self.partner_id, &ctx.partner_id) {
            if partner != ctx_partner {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bare_boost() -> Boost {
        Boost {
            id: Uuid::new_v4(),
            name: "Summer season".to_string(),
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

    fn context() -> PurchaseContext {
        PurchaseContext {
            category: None,
            amount: None,
            payment_method: None,
            partner_id: None,
            now: Utc::now(),
        }
    }

    #[test]
    fn test_open_ended_window_is_always_active() {
        assert!(bare_boost().is_active_at(Utc::now()));
    }

    #[test]
    fn test_future_active_from_is_inactive() {
        let mut boost = bare_boost();
        boost.active_from = Some(Utc::now() + chrono::Duration::days(1));
        assert!(!boost.is_active_at(Utc::now()));
    }

    #[test]
    fn test_past_active_to_is_inactive() {
        let mut boost = bare_boost();
        boost.active_to = Some(Utc::now() - chrono::Duration::days(1));
        assert!(!boost.is_active_at(Utc::now()));
    }

    #[test]
    fn test_absent_filters_are_satisfied() {
        assert!(bare_boost().is_eligible(&context()));
    }

    #[test]
    fn test_category_filter() {
        let mut boost = bare_boost();
        boost.categories = Some(vec!["volcano".to_string()]);

        let mut ctx = context();
        ctx.category = Some("fishing".to_string());
        assert!(!boost.is_eligible(&ctx));

        ctx.category = Some("volcano".to_string());
        assert!(boost.is_eligible(&ctx));
    }

    #[test]
    fn test_min_amount_treats_missing_amount_as_zero() {
        let mut boost = bare_boost();
        boost.min_amount = Some(dec!(10000));

        let mut ctx = context();
        assert!(!boost.is_eligible(&ctx));
        ctx.amount = Some(dec!(9999));
        assert!(!boost.is_eligible(&ctx));
        ctx.amount = Some(dec!(10000));
        assert!(boost.is_eligible(&ctx));
    }

    #[test]
    fn test_payment_method_filter() {
        let mut boost = bare_boost();
        boost.payment_methods = Some(vec!["sbp".to_string()]);

        let mut ctx = context();
        ctx.payment_method = Some("card".to_string());
        assert!(!boost.is_eligible(&ctx));
        ctx.payment_method = Some("sbp".to_string());
        assert!(boost.is_eligible(&ctx));
    }

    #[test]
    fn test_partner_filter() {
        let mut boost = bare_boost();
        boost.partner_id = Some("aero".to_string());

        let mut ctx = context();
        ctx.partner_id = Some("heli".to_string());
        assert!(!boost.is_eligible(&ctx));
        ctx.partner_id = Some("aero".to_string());
        assert!(boost.is_eligible(&ctx));
    }

    #[test]
    fn test_validate_rejects_nonpositive_multiplier() {
        let mut boost = bare_boost();
        boost.multiplier = Some(Decimal::ZERO);
        assert!(boost.validate().is_err());
    }

    #[test]
    fn test_validate_requires_effect() {
        let mut boost = bare_boost();
        boost.multiplier = None;
        boost.bonus_points = None;
        assert!(boost.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let mut boost = bare_boost();
        boost.active_from = Some(Utc::now());
        boost.active_to = Some(Utc::now() - chrono::Duration::hours(1));
        assert!(boost.validate().is_err());
    }
}

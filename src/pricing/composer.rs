//! Core pricing calculation functions.
//!
//! Pure functions for pricing math - no store access. Multipliers of all
//! active and eligible boosts stack multiplicatively; flat bonus points are
//! summed separately and never multiplied. The final total is rounded once,
//! at the end, to the currency's minor-unit precision, so recomputing the
//! same context always yields the same amount.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::models::{Boost, PurchaseContext};

/// Round to specified decimal places using banker's rounding (ROUND_HALF_EVEN).
///
/// Banker's rounding rounds to the nearest even number when the value is
/// exactly halfway between two possibilities. This reduces cumulative
/// rounding bias.
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// Minor-unit precision for a currency code.
pub fn minor_units(currency: &str) -> u32 {
    match currency {
        "JPY" | "KRW" | "VND" => 0,
        _ => 2,
    }
}

/// Combined multiplier of all active and eligible boosts.
///
/// Multiplication is commutative, so the result is independent of registry
/// order. With no applicable boosts the neutral element 1 is returned —
/// pricing never silently drops to zero when no promotion applies.
pub fn compute_multiplier(boosts: &[Boost], ctx: &PurchaseContext) -> Decimal {
    boosts
        .iter()
        .filter(|b| b.is_active_at(ctx.now) && b.is_eligible(ctx))
        .filter_map(|b| b.multiplier)
        .fold(Decimal::ONE, |acc, m| acc * m)
}

/// Flat bonus points of all active and eligible boosts, summed.
pub fn sum_bonus_points(boosts: &[Boost], ctx: &PurchaseContext) -> i64 {
    boosts
        .iter()
        .filter(|b| b.is_active_at(ctx.now) && b.is_eligible(ctx))
        .filter_map(|b| b.bonus_points)
        .sum()
}

/// Fully priced booking quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    /// `unit_price × participants + extras`, before boosts
    #[serde(with = "rust_decimal::serde::str")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub multiplier: Decimal,
    /// `round(subtotal × multiplier)` at minor-unit precision
    #[serde(with = "rust_decimal::serde::str")]
    pub total: Decimal,
    pub bonus_points: i64,
    pub currency: String,
}

/// Price a reservation context against the active boost set.
pub fn quote(
    unit_price: Decimal,
    currency: &str,
    participants: i32,
    extras: Decimal,
    boosts: &[Boost],
    ctx: &PurchaseContext,
) -> Result<PriceQuote> {
    if participants <= 0 {
        return Err(EngineError::Validation(format!(
            "participant count must be positive, got {participants}"
        )));
    }
    if unit_price < Decimal::ZERO || extras < Decimal::ZERO {
        return Err(EngineError::Validation(
            "price and extras must be non-negative".into(),
        ));
    }

    let subtotal = unit_price * Decimal::from(participants) + extras;
    let multiplier = compute_multiplier(boosts, ctx);
    let total = round_money(subtotal * multiplier, minor_units(currency));

    Ok(PriceQuote {
        subtotal,
        multiplier,
        total,
        bonus_points: sum_bonus_points(boosts, ctx),
        currency: currency.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoostKind;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn boost(name: &str, multiplier: Option<Decimal>, bonus: Option<i64>) -> Boost {
        Boost {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            kind: BoostKind::Event,
            multiplier,
            bonus_points: bonus,
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

    // ==================== round_money tests ====================

    #[test]
    fn test_round_money_bankers_rounding_to_even() {
        assert_eq!(round_money(dec!(2.5), 0), dec!(2));
        assert_eq!(round_money(dec!(3.5), 0), dec!(4));
        assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
        assert_eq!(round_money(dec!(1.236), 2), dec!(1.24));
    }

    // ==================== compute_multiplier tests ====================

    #[test]
    fn test_no_boosts_is_neutral() {
        assert_eq!(compute_multiplier(&[], &context()), Decimal::ONE);
    }

    #[test]
    fn test_multipliers_stack_multiplicatively() {
        let boosts = vec![
            boost("a", Some(dec!(1.2)), None),
            boost("b", Some(dec!(1.5)), None),
        ];
        assert_eq!(compute_multiplier(&boosts, &context()), dec!(1.80));
    }

    #[test]
    fn test_multiplier_is_order_independent() {
        let a = boost("a", Some(dec!(1.2)), None);
        let b = boost("b", Some(dec!(1.5)), None);
        let c = boost("c", Some(dec!(2)), None);
        let ctx = context();

        let permutations: [[&Boost; 3]; 6] = [
            [&a, &b, &c],
            [&a, &c, &b],
            [&b, &a, &c],
            [&b, &c, &a],
            [&c, &a, &b],
            [&c, &b, &a],
        ];
        let reference = compute_multiplier(&[a.clone(), b.clone(), c.clone()], &ctx);
        for perm in permutations {
            let list: Vec<Boost> = perm.iter().map(|b| (*b).clone()).collect();
            assert_eq!(compute_multiplier(&list, &ctx), reference);
        }
    }

    #[test]
    fn test_future_boost_excluded() {
        let mut b = boost("upcoming", Some(dec!(2)), None);
        b.active_from = Some(Utc::now() + Duration::days(1));
        assert_eq!(compute_multiplier(&[b], &context()), Decimal::ONE);
    }

    #[test]
    fn test_ineligible_boost_excluded() {
        let mut b = boost("volcano only", Some(dec!(2)), None);
        b.categories = Some(vec!["volcano".to_string()]);
        let mut ctx = context();
        ctx.category = Some("fishing".to_string());
        assert_eq!(compute_multiplier(&[b], &ctx), Decimal::ONE);
    }

    #[test]
    fn test_bonus_points_summed_not_multiplied() {
        let boosts = vec![
            boost("a", Some(dec!(1.2)), Some(100)),
            boost("b", None, Some(50)),
        ];
        assert_eq!(sum_bonus_points(&boosts, &context()), 150);
    }

    // ==================== quote tests ====================

    #[test]
    fn test_quote_applies_boost_to_subtotal() {
        // base 8000, 2 participants, extras 1200, boost 1.2 => 20640
        let boosts = vec![boost("season", Some(dec!(1.2)), None)];
        let q = quote(dec!(8000), "RUB", 2, dec!(1200), &boosts, &context()).unwrap();
        assert_eq!(q.subtotal, dec!(17200));
        assert_eq!(q.total, dec!(20640.00));
    }

    #[test]
    fn test_quote_without_boosts_uses_neutral_multiplier() {
        let q = quote(dec!(8000), "RUB", 2, dec!(1200), &[], &context()).unwrap();
        assert_eq!(q.multiplier, Decimal::ONE);
        assert_eq!(q.total, dec!(17200.00));
    }

    #[test]
    fn test_quote_is_deterministic() {
        let boosts = vec![
            boost("a", Some(dec!(1.17)), None),
            boost("b", Some(dec!(1.03)), Some(25)),
        ];
        let ctx = context();
        let first = quote(dec!(7999.99), "RUB", 3, dec!(450.50), &boosts, &ctx).unwrap();
        let second = quote(dec!(7999.99), "RUB", 3, dec!(450.50), &boosts, &ctx).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_quote_rounds_once_at_the_end() {
        // Intermediate amounts keep full precision: 3 × 33.335 = 100.005,
        // ×1.1 = 110.0055, rounded once on the final amount -> 110.01
        let boosts = vec![boost("a", Some(dec!(1.1)), None)];
        let q = quote(dec!(33.335), "RUB", 3, dec!(0), &boosts, &context()).unwrap();
        assert_eq!(q.total, dec!(110.01));

        // A true midpoint on the final amount rounds to even:
        // 2 × 50.0025 = 100.0050 -> 100.00
        let q = quote(dec!(50.0025), "RUB", 2, dec!(0), &[], &context()).unwrap();
        assert_eq!(q.total, dec!(100.00));
    }

    #[test]
    fn test_quote_zero_minor_unit_currency() {
        let boosts = vec![boost("a", Some(dec!(1.2)), None)];
        let q = quote(dec!(1001), "JPY", 1, dec!(0), &boosts, &context()).unwrap();
        assert_eq!(q.total, dec!(1201));
    }

    #[test]
    fn test_quote_rejects_nonpositive_participants() {
        assert!(quote(dec!(8000), "RUB", 0, dec!(0), &[], &context()).is_err());
    }
}

//! Boost registry and pricing composition.

pub mod composer;
pub mod registry;

pub use composer::{compute_multiplier, minor_units, quote, round_money, sum_bonus_points, PriceQuote};
pub use registry::BoostRegistry;

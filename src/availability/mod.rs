//! Availability expansion and occurrence materialization.

pub mod expander;
pub mod service;

pub use expander::expand;
pub use service::{AvailabilityService, MaterializeReport, OccurrenceEdit};

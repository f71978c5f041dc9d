//! Domain models for tours, schedules, occurrences, boosts and eco points.

pub mod boost;
pub mod eco;
pub mod occurrence;
pub mod schedule;
pub mod tour;

pub use boost::{Boost, BoostKind, PurchaseContext};
pub use eco::{EcoHistoryEntry, EcoPointsBalance, EcoSource};
pub use occurrence::{Occurrence, OccurrenceState, OccurrenceStatus};
pub use schedule::{Frequency, PatternKind, RecurrenceRule, SchedulePattern};
pub use tour::{CancellationPolicy, Tour, TourStatus};

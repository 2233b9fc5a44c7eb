//! Time decomposition and clock sources.
//!
//! # Responsibility
//! - Turn an epoch instant plus time zone into one field value per granularity.
//! - Parse user-supplied time zone names.
//! - Supply "now" through a swappable clock.

mod clock;
mod decompose;

pub use clock::{Clock, FixedClock, SystemClock};
pub use decompose::{decompose, field_value, parse_time_zone, TimeError};

//! Calendar tree domain model.
//!
//! # Responsibility
//! - Define the granularity ladder and the calendar node read model.
//! - Hold the defaults a `TimeTree` falls back on.

pub mod calendar_node;
pub mod config;
pub mod granularity;

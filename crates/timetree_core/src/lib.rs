//! Calendar tree index over a graph store.
//! This crate is the single source of truth for the tree invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod time;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::calendar_node::{CalendarNode, VALUE_ATTRIBUTE};
pub use model::config::{ConfigError, TimeTreeConfig};
pub use model::granularity::{Granularity, ParseGranularityError};
pub use repo::graph_repo::{
    Direction, Edge, EdgeId, GraphRepoError, GraphRepoResult, GraphStore, NodeId,
    SqliteGraphStore,
};
pub use service::time_tree::{Relation, TimeTree, TimeTreeError, TimeTreeResult};
pub use time::{decompose, field_value, parse_time_zone, Clock, FixedClock, SystemClock, TimeError};

/// Re-exported so callers can name time zones without a direct dependency.
pub use chrono_tz::Tz;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Calendar node read model.
//!
//! # Invariants
//! - `value` is `None` only for the root.
//! - `granularity` and `value` never change after the node is created.

use crate::model::granularity::Granularity;
use crate::repo::graph_repo::NodeId;
use serde::Serialize;

/// Name of the integer attribute holding a calendar node's field value.
pub const VALUE_ATTRIBUTE: &str = "value";

/// One calendar unit at one granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CalendarNode {
    /// Graph store node backing this calendar unit.
    pub id: NodeId,
    pub granularity: Granularity,
    /// Field value, e.g. `2024` for a year or `5` for May.
    pub value: Option<i64>,
}

impl CalendarNode {
    pub fn is_root(&self) -> bool {
        self.granularity == Granularity::Root
    }
}

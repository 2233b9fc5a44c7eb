//! Resolution ladder of the calendar tree.
//!
//! # Responsibility
//! - Define the fixed, totally ordered list of calendar granularities.
//! - Map granularities to and from the node tags persisted in the graph store.
//!
//! # Invariants
//! - Declaration order is ladder order: `Root` is coarsest, `Millisecond` is the leaf.
//! - Every granularity owns exactly one tag and no two granularities share one.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// One level of the calendar ladder.
///
/// `Root` is the virtual level above `Year`; exactly one node per store carries it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Root,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

static LADDER: [Granularity; 8] = [
    Granularity::Root,
    Granularity::Year,
    Granularity::Month,
    Granularity::Day,
    Granularity::Hour,
    Granularity::Minute,
    Granularity::Second,
    Granularity::Millisecond,
];

impl Granularity {
    /// All granularities in ladder order, root first.
    pub fn ladder() -> &'static [Granularity] {
        &LADDER
    }

    /// Node tag used to mark nodes of this granularity in the graph store.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Root => "TimeTreeRoot",
            Self::Year => "Year",
            Self::Month => "Month",
            Self::Day => "Day",
            Self::Hour => "Hour",
            Self::Minute => "Minute",
            Self::Second => "Second",
            Self::Millisecond => "Millisecond",
        }
    }

    /// Stable lowercase name, also accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
            Self::Millisecond => "millisecond",
        }
    }

    /// Next finer granularity, `None` for the leaf.
    pub fn next(self) -> Option<Self> {
        LADDER.get(self.position() + 1).copied()
    }

    pub fn is_leaf(self) -> bool {
        self.next().is_none()
    }

    /// Granularities a path from the root visits to reach `self`, root excluded.
    ///
    /// Empty for `Root`.
    pub fn path(self) -> &'static [Granularity] {
        &LADDER[1..=self.position()]
    }

    /// Maps a single tag back to its granularity.
    pub fn from_tag(tag: &str) -> Option<Self> {
        LADDER.iter().copied().find(|granularity| granularity.tag() == tag)
    }

    /// Returns the first granularity any of `tags` maps to.
    ///
    /// Foreign tags (added by other users of the same store) are ignored.
    pub fn from_tags<I, S>(tags: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter()
            .find_map(|tag| Self::from_tag(tag.as_ref()))
    }

    fn position(self) -> usize {
        self as usize
    }
}

impl Display for Granularity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a granularity name is not on the ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseGranularityError(pub String);

impl Display for ParseGranularityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown granularity `{}`; expected root|year|month|day|hour|minute|second|millisecond",
            self.0
        )
    }
}

impl Error for ParseGranularityError {}

impl FromStr for Granularity {
    type Err = ParseGranularityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        LADDER
            .iter()
            .copied()
            .find(|granularity| granularity.as_str() == normalized)
            .ok_or_else(|| ParseGranularityError(value.to_string()))
    }
}

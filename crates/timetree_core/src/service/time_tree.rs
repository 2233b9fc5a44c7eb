//! Calendar tree use-case service.
//!
//! # Responsibility
//! - Resolve instants to calendar nodes, creating the minimal missing path.
//! - Maintain parent/child hierarchy plus the per-level `NEXT` chain that
//!   spans parents.
//! - Offer read-only navigation that validates what it walks.
//!
//! # Invariants
//! - For one parent and value at most one child exists.
//! - `FIRST -> NEXT -> ... -> LAST` from a parent yields exactly its children
//!   in strictly increasing value order.
//! - The node after a parent's `LAST` is the `FIRST` child of the next parent
//!   at the same level that has children; symmetrically before `FIRST`.
//! - Corruption is reported, never repaired.

use crate::model::calendar_node::{CalendarNode, VALUE_ATTRIBUTE};
use crate::model::config::{ConfigError, TimeTreeConfig};
use crate::model::granularity::Granularity;
use crate::repo::graph_repo::{Direction, Edge, GraphRepoError, GraphStore, NodeId};
use crate::time::{decompose, Clock, SystemClock, TimeError};
use chrono_tz::Tz;
use log::{debug, error, info, trace};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by time tree operations.
pub type TimeTreeResult<T> = Result<T, TimeTreeError>;

/// Errors from time tree operations.
///
/// `Configuration` and `Structural` are fatal: the tree is not in a state the
/// operation can safely continue from, and retrying will not help.
#[derive(Debug)]
pub enum TimeTreeError {
    /// A node carries no granularity tag, or a leaf was asked for children.
    Configuration(String),
    /// Stored hierarchy or chain contradicts the tree invariants.
    Structural(String),
    /// Instant or time zone could not be decomposed.
    Time(TimeError),
    /// Rejected tree defaults.
    Config(ConfigError),
    /// Graph store failure.
    Repo(GraphRepoError),
}

impl Display for TimeTreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "time tree configuration error: {message}"),
            Self::Structural(message) => write!(f, "time tree structure corrupted: {message}"),
            Self::Time(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TimeTreeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Time(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Configuration(_) | Self::Structural(_) => None,
        }
    }
}

impl From<GraphRepoError> for TimeTreeError {
    fn from(value: GraphRepoError) -> Self {
        match value {
            GraphRepoError::MultipleEdges { .. } => structural(value.to_string()),
            other => Self::Repo(other),
        }
    }
}

impl From<TimeError> for TimeTreeError {
    fn from(value: TimeError) -> Self {
        Self::Time(value)
    }
}

impl From<ConfigError> for TimeTreeError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// Edge types the calendar tree is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Parent to child.
    Child,
    /// Parent to its lowest-valued child.
    First,
    /// Parent to its highest-valued child.
    Last,
    /// Node to its successor on the same level.
    Next,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Child => "CHILD",
            Self::First => "FIRST",
            Self::Last => "LAST",
            Self::Next => "NEXT",
        }
    }
}

/// Calendar tree facade over a graph store.
///
/// Every operation assumes it runs inside one transaction of the store's
/// connection; the tree takes no locks of its own.
pub struct TimeTree<S: GraphStore, C: Clock = SystemClock> {
    store: S,
    config: TimeTreeConfig,
    clock: C,
}

impl<S: GraphStore> TimeTree<S> {
    /// Creates tree with `Day` resolution and UTC defaults.
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: TimeTreeConfig::default(),
            clock: SystemClock,
        }
    }

    /// Creates tree with caller-provided defaults.
    pub fn with_config(store: S, config: TimeTreeConfig) -> TimeTreeResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            clock: SystemClock,
        })
    }
}

impl<S: GraphStore, C: Clock> TimeTree<S, C> {
    /// Replaces the clock used by the `get_now*` family.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> TimeTree<S, C2> {
        TimeTree {
            store: self.store,
            config: self.config,
            clock,
        }
    }

    pub fn config(&self) -> &TimeTreeConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Node for the current instant at default time zone and resolution.
    pub fn get_now(&self) -> TimeTreeResult<CalendarNode> {
        self.get_now_with(self.config.default_time_zone, self.config.default_resolution)
    }

    pub fn get_now_in_zone(&self, time_zone: Tz) -> TimeTreeResult<CalendarNode> {
        self.get_now_with(time_zone, self.config.default_resolution)
    }

    pub fn get_now_at_resolution(&self, resolution: Granularity) -> TimeTreeResult<CalendarNode> {
        self.get_now_with(self.config.default_time_zone, resolution)
    }

    pub fn get_now_with(
        &self,
        time_zone: Tz,
        resolution: Granularity,
    ) -> TimeTreeResult<CalendarNode> {
        self.resolve_instant(self.clock.now_millis(), time_zone, resolution)
    }

    /// Node for `epoch_millis` at default time zone and resolution.
    pub fn get_instant(&self, epoch_millis: i64) -> TimeTreeResult<CalendarNode> {
        self.get_instant_with(
            epoch_millis,
            self.config.default_time_zone,
            self.config.default_resolution,
        )
    }

    pub fn get_instant_in_zone(
        &self,
        epoch_millis: i64,
        time_zone: Tz,
    ) -> TimeTreeResult<CalendarNode> {
        self.get_instant_with(epoch_millis, time_zone, self.config.default_resolution)
    }

    pub fn get_instant_at_resolution(
        &self,
        epoch_millis: i64,
        resolution: Granularity,
    ) -> TimeTreeResult<CalendarNode> {
        self.get_instant_with(epoch_millis, self.config.default_time_zone, resolution)
    }

    pub fn get_instant_with(
        &self,
        epoch_millis: i64,
        time_zone: Tz,
        resolution: Granularity,
    ) -> TimeTreeResult<CalendarNode> {
        self.resolve_instant(epoch_millis, time_zone, resolution)
    }

    /// Returns the unique root, creating it on first use.
    ///
    /// # Errors
    /// - `Structural` when more than one root exists.
    pub fn get_or_create_root(&self) -> TimeTreeResult<NodeId> {
        let roots = self.store.find_nodes_by_tag(Granularity::Root.tag())?;
        match roots.as_slice() {
            [] => {
                let root = self.store.create_node(&[Granularity::Root.tag()])?;
                info!("event=time_tree_root_create module=time_tree status=ok node_id={root}");
                Ok(root)
            }
            [root] => Ok(*root),
            _ => Err(structural(format!(
                "found {} time tree roots, expected one",
                roots.len()
            ))),
        }
    }

    /// Resolves `epoch_millis` in `time_zone` down to `target`.
    ///
    /// Missing nodes on the path are created; existing ones are reused
    /// unchanged. `Granularity::Root` resolves to the root itself.
    pub fn resolve_instant(
        &self,
        epoch_millis: i64,
        time_zone: Tz,
        target: Granularity,
    ) -> TimeTreeResult<CalendarNode> {
        let path = decompose(epoch_millis, time_zone, target)?;

        let mut current = self.get_or_create_root()?;
        for (_, value) in path {
            current = self.find_or_create_child(current, value)?;
        }

        let node = self.node(current)?;
        if node.granularity != target {
            return Err(structural(format!(
                "resolved node {current} is a {} node, expected {target}",
                node.granularity
            )));
        }
        debug!(
            "event=time_tree_resolve module=time_tree status=ok epoch_millis={epoch_millis} time_zone={} granularity={target} node_id={current}",
            time_zone.name()
        );
        Ok(node)
    }

    /// Returns the child of `parent` holding `value`, creating and linking it
    /// when absent.
    ///
    /// # Errors
    /// - `Configuration` when `parent` is untagged or a leaf.
    /// - `Structural` when the walked neighbourhood contradicts the invariants.
    pub fn find_or_create_child(&self, parent: NodeId, value: i64) -> TimeTreeResult<NodeId> {
        let granularity = self.child_granularity(parent)?;

        let Some(first) = self.edge(parent, Relation::First, Direction::Outgoing)? else {
            return self.create_first_child_ever(parent, granularity, value);
        };

        let mut current = first.to;
        self.ensure_owned(parent, current, Relation::First)?;

        let mut walked: Option<(NodeId, i64)> = None;
        let current_value = loop {
            let current_value = self.value_of(current)?;
            if let Some((previous, previous_value)) = walked {
                if current_value <= previous_value {
                    return Err(structural(format!(
                        "children of {parent} out of order: {previous}={previous_value} is followed by {current}={current_value}"
                    )));
                }
            }
            if current_value >= value {
                break current_value;
            }

            walked = Some((current, current_value));
            let following = self
                .edge(current, Relation::Next, Direction::Outgoing)?
                .map(|edge| edge.to);
            match following {
                Some(next) if self.parent(next)? == parent => current = next,
                _ => return self.create_last_child(parent, granularity, current, following, value),
            }
        };

        if current_value == value {
            trace!(
                "event=time_tree_child_hit module=time_tree status=ok parent={parent} value={value} node_id={current}"
            );
            return Ok(current);
        }

        match walked {
            None => {
                let preceding = self
                    .edge(current, Relation::Next, Direction::Incoming)?
                    .map(|edge| edge.from);
                self.create_first_child(parent, granularity, preceding, current, value)
            }
            Some((previous, _)) => {
                self.create_child(parent, granularity, Some(previous), Some(current), value)
            }
        }
    }

    /// Parent of `node`.
    ///
    /// # Errors
    /// - `Structural` when `node` has no parent; only the root lacks one, and
    ///   asking for the root's parent is a caller bug.
    pub fn parent(&self, node: NodeId) -> TimeTreeResult<NodeId> {
        self.edge(node, Relation::Child, Direction::Incoming)?
            .map(|edge| edge.from)
            .ok_or_else(|| structural(format!("node {node} has no parent")))
    }

    /// Granularity of `node`, derived from its tags.
    ///
    /// # Errors
    /// - `Configuration` when no tag maps to a granularity.
    pub fn granularity_of(&self, node: NodeId) -> TimeTreeResult<Granularity> {
        let tags = self.store.node_tags(node)?;
        Granularity::from_tags(&tags).ok_or_else(|| {
            configuration(format!(
                "node {node} has no granularity tag (tags: [{}])",
                tags.join(", ")
            ))
        })
    }

    /// Loads the calendar read model of `node`.
    pub fn node(&self, node: NodeId) -> TimeTreeResult<CalendarNode> {
        let granularity = self.granularity_of(node)?;
        let value = match granularity {
            Granularity::Root => None,
            _ => Some(self.value_of(node)?),
        };
        Ok(CalendarNode {
            id: node,
            granularity,
            value,
        })
    }

    /// Parent of `node`, `None` for the root.
    pub fn parent_of(&self, node: NodeId) -> TimeTreeResult<Option<CalendarNode>> {
        if self.granularity_of(node)? == Granularity::Root {
            return Ok(None);
        }
        let parent = self.parent(node)?;
        self.node(parent).map(Some)
    }

    pub fn first_child(&self, node: NodeId) -> TimeTreeResult<Option<CalendarNode>> {
        self.neighbour(node, Relation::First, Direction::Outgoing)
    }

    pub fn last_child(&self, node: NodeId) -> TimeTreeResult<Option<CalendarNode>> {
        self.neighbour(node, Relation::Last, Direction::Outgoing)
    }

    /// Successor on the same level, possibly under another parent.
    pub fn next(&self, node: NodeId) -> TimeTreeResult<Option<CalendarNode>> {
        self.neighbour(node, Relation::Next, Direction::Outgoing)
    }

    /// Predecessor on the same level, possibly under another parent.
    pub fn previous(&self, node: NodeId) -> TimeTreeResult<Option<CalendarNode>> {
        self.neighbour(node, Relation::Next, Direction::Incoming)
    }

    /// Children of `node` in ascending value order.
    ///
    /// # Errors
    /// - `Structural` when the `FIRST..LAST` walk leaves the parent, is not
    ///   strictly increasing, or never reaches `LAST`.
    pub fn children(&self, node: NodeId) -> TimeTreeResult<Vec<CalendarNode>> {
        let first = self.edge(node, Relation::First, Direction::Outgoing)?;
        let last = self.edge(node, Relation::Last, Direction::Outgoing)?;
        let (first, last) = match (first, last) {
            (None, None) => return Ok(Vec::new()),
            (Some(first), Some(last)) => (first.to, last.to),
            (first, _) => {
                return Err(structural(format!(
                    "node {node} has {} edge but no {} edge",
                    if first.is_some() { "a FIRST" } else { "a LAST" },
                    if first.is_some() { "LAST" } else { "FIRST" },
                )))
            }
        };

        let mut children: Vec<CalendarNode> = Vec::new();
        let mut current = first;
        loop {
            self.ensure_owned(node, current, Relation::Next)?;
            let child = self.node(current)?;
            if let Some(previous) = children.last() {
                if child.value <= previous.value {
                    return Err(structural(format!(
                        "children of {node} out of order at {current}"
                    )));
                }
            }
            children.push(child);

            if current == last {
                return Ok(children);
            }
            current = self
                .edge(current, Relation::Next, Direction::Outgoing)?
                .map(|edge| edge.to)
                .ok_or_else(|| {
                    structural(format!(
                        "chain of {node} ends at {current} before reaching LAST {last}"
                    ))
                })?;
        }
    }

    fn create_first_child_ever(
        &self,
        parent: NodeId,
        granularity: Granularity,
        value: i64,
    ) -> TimeTreeResult<NodeId> {
        if self
            .edge(parent, Relation::Last, Direction::Outgoing)?
            .is_some()
        {
            return Err(structural(format!(
                "node {parent} has no FIRST edge but has a LAST edge"
            )));
        }

        let preceding = self.nearest_cousin(parent, Direction::Incoming, Relation::Last)?;
        let following = self.nearest_cousin(parent, Direction::Outgoing, Relation::First)?;

        let child = self.create_child(parent, granularity, preceding, following, value)?;
        self.store
            .create_edge(parent, child, Relation::First.as_str())?;
        self.store
            .create_edge(parent, child, Relation::Last.as_str())?;
        Ok(child)
    }

    fn create_first_child(
        &self,
        parent: NodeId,
        granularity: Granularity,
        preceding: Option<NodeId>,
        first: NodeId,
        value: i64,
    ) -> TimeTreeResult<NodeId> {
        let first_edge = self.boundary_edge(parent, Relation::First, first)?;
        self.store.delete_edge(first_edge.id)?;

        let child = self.create_child(parent, granularity, preceding, Some(first), value)?;
        self.store
            .create_edge(parent, child, Relation::First.as_str())?;
        Ok(child)
    }

    fn create_last_child(
        &self,
        parent: NodeId,
        granularity: Granularity,
        last: NodeId,
        following: Option<NodeId>,
        value: i64,
    ) -> TimeTreeResult<NodeId> {
        let last_edge = self.boundary_edge(parent, Relation::Last, last)?;
        self.store.delete_edge(last_edge.id)?;

        let child = self.create_child(parent, granularity, Some(last), following, value)?;
        self.store
            .create_edge(parent, child, Relation::Last.as_str())?;
        Ok(child)
    }

    fn create_child(
        &self,
        parent: NodeId,
        granularity: Granularity,
        previous: Option<NodeId>,
        next: Option<NodeId>,
        value: i64,
    ) -> TimeTreeResult<NodeId> {
        self.ensure_adjacent(previous, next)?;

        let child = self.store.create_node(&[granularity.tag()])?;
        self.store.set_int_attribute(child, VALUE_ATTRIBUTE, value)?;
        self.store
            .create_edge(parent, child, Relation::Child.as_str())?;

        if let Some(previous) = previous {
            if let Some(link) = self.edge(previous, Relation::Next, Direction::Outgoing)? {
                self.store.delete_edge(link.id)?;
            }
            self.store
                .create_edge(previous, child, Relation::Next.as_str())?;
        }
        if let Some(next) = next {
            self.store
                .create_edge(child, next, Relation::Next.as_str())?;
        }

        debug!(
            "event=time_tree_child_create module=time_tree status=ok parent={parent} granularity={granularity} value={value} node_id={child}"
        );
        Ok(child)
    }

    /// Boundary child (`Last` looking back, `First` looking forward) of the
    /// closest same-level parent that has children.
    fn nearest_cousin(
        &self,
        parent: NodeId,
        direction: Direction,
        boundary: Relation,
    ) -> TimeTreeResult<Option<NodeId>> {
        let mut visited = HashSet::from([parent]);
        let mut cursor = self
            .edge(parent, Relation::Next, direction)?
            .map(|edge| edge.other_end(direction));

        while let Some(candidate) = cursor {
            if !visited.insert(candidate) {
                return Err(structural(format!(
                    "NEXT chain around {parent} loops back to {candidate}"
                )));
            }
            if let Some(edge) = self.edge(candidate, boundary, Direction::Outgoing)? {
                return Ok(Some(edge.to));
            }
            cursor = self
                .edge(candidate, Relation::Next, direction)?
                .map(|edge| edge.other_end(direction));
        }
        Ok(None)
    }

    fn ensure_adjacent(&self, previous: Option<NodeId>, next: Option<NodeId>) -> TimeTreeResult<()> {
        if let Some(previous) = previous {
            let after = self
                .edge(previous, Relation::Next, Direction::Outgoing)?
                .map(|edge| edge.to);
            if after != next {
                return Err(structural(format!(
                    "node {previous} is followed by {}, expected {}",
                    describe(after),
                    describe(next)
                )));
            }
        }
        if let Some(next) = next {
            let before = self
                .edge(next, Relation::Next, Direction::Incoming)?
                .map(|edge| edge.from);
            if before != previous {
                return Err(structural(format!(
                    "node {next} is preceded by {}, expected {}",
                    describe(before),
                    describe(previous)
                )));
            }
        }
        Ok(())
    }

    fn boundary_edge(&self, parent: NodeId, boundary: Relation, expected: NodeId) -> TimeTreeResult<Edge> {
        match self.edge(parent, boundary, Direction::Outgoing)? {
            Some(edge) if edge.to == expected => Ok(edge),
            actual => Err(structural(format!(
                "node {expected} looks like the {} child of {parent}, but {} points to {}",
                boundary.as_str(),
                boundary.as_str(),
                describe(actual.map(|edge| edge.to))
            ))),
        }
    }

    fn ensure_owned(&self, parent: NodeId, child: NodeId, via: Relation) -> TimeTreeResult<()> {
        let owner = self.parent(child)?;
        if owner != parent {
            return Err(structural(format!(
                "{} walk from {parent} reached {child}, which belongs to {owner}",
                via.as_str()
            )));
        }
        Ok(())
    }

    fn child_granularity(&self, parent: NodeId) -> TimeTreeResult<Granularity> {
        let granularity = self.granularity_of(parent)?;
        granularity.next().ok_or_else(|| {
            configuration(format!(
                "{granularity} node {parent} is a leaf and cannot have children"
            ))
        })
    }

    fn value_of(&self, node: NodeId) -> TimeTreeResult<i64> {
        self.store
            .int_attribute(node, VALUE_ATTRIBUTE)?
            .ok_or_else(|| structural(format!("node {node} has no `{VALUE_ATTRIBUTE}` attribute")))
    }

    fn neighbour(
        &self,
        node: NodeId,
        relation: Relation,
        direction: Direction,
    ) -> TimeTreeResult<Option<CalendarNode>> {
        self.edge(node, relation, direction)?
            .map(|edge| self.node(edge.other_end(direction)))
            .transpose()
    }

    fn edge(
        &self,
        node: NodeId,
        relation: Relation,
        direction: Direction,
    ) -> TimeTreeResult<Option<Edge>> {
        Ok(self.store.single_edge(node, relation.as_str(), direction)?)
    }
}

fn describe(node: Option<NodeId>) -> String {
    node.map_or_else(|| "nothing".to_string(), |id| id.to_string())
}

fn structural(message: String) -> TimeTreeError {
    error!("event=time_tree_invariant module=time_tree status=error kind=structural message={message}");
    TimeTreeError::Structural(message)
}

fn configuration(message: String) -> TimeTreeError {
    error!("event=time_tree_invariant module=time_tree status=error kind=configuration message={message}");
    TimeTreeError::Configuration(message)
}

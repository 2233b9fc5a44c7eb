//! Graph store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the node/edge/attribute primitives the calendar tree is built from.
//! - Keep SQL details and id encoding inside the repository boundary.
//!
//! # Invariants
//! - The store never opens its own transaction; every call runs in whatever
//!   transaction the borrowed connection is currently in.
//! - `single_edge` never silently picks one of several matching edges.
//! - Edge types and tags are opaque strings; the store assigns them no meaning.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable graph node identifier.
pub type NodeId = Uuid;

/// Stable graph edge identifier.
pub type EdgeId = Uuid;

/// Result type used by graph store operations.
pub type GraphRepoResult<T> = Result<T, GraphRepoError>;

/// Errors from graph store operations.
#[derive(Debug)]
pub enum GraphRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target node does not exist.
    NodeNotFound(NodeId),
    /// Target edge does not exist.
    EdgeNotFound(EdgeId),
    /// A single-edge lookup matched more than one edge.
    MultipleEdges {
        node: NodeId,
        edge_type: String,
        direction: Direction,
        count: usize,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for GraphRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NodeNotFound(id) => write!(f, "graph node not found: {id}"),
            Self::EdgeNotFound(id) => write!(f, "graph edge not found: {id}"),
            Self::MultipleEdges {
                node,
                edge_type,
                direction,
                count,
            } => write!(
                f,
                "expected at most one {direction} `{edge_type}` edge on node {node}, found {count}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "graph store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "graph store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "graph store requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid graph data: {message}"),
        }
    }
}

impl Error for GraphRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for GraphRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for GraphRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Edge direction relative to the node a lookup starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Edges whose start node is the lookup node.
    Outgoing,
    /// Edges whose end node is the lookup node.
    Incoming,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Outgoing => f.write_str("outgoing"),
            Self::Incoming => f.write_str("incoming"),
        }
    }
}

/// Directed, typed edge read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: String,
}

impl Edge {
    /// Node on the far side of this edge when seen from `direction`.
    pub fn other_end(&self, direction: Direction) -> NodeId {
        match direction {
            Direction::Outgoing => self.to,
            Direction::Incoming => self.from,
        }
    }
}

/// Storage primitives consumed by the calendar tree.
pub trait GraphStore {
    /// Creates one node carrying `tags`.
    fn create_node(&self, tags: &[&str]) -> GraphRepoResult<NodeId>;
    /// Lists tags of one node in insertion-independent, sorted order.
    fn node_tags(&self, node: NodeId) -> GraphRepoResult<Vec<String>>;
    /// Creates one directed edge of `edge_type`.
    fn create_edge(&self, from: NodeId, to: NodeId, edge_type: &str) -> GraphRepoResult<Edge>;
    /// Deletes one edge.
    fn delete_edge(&self, edge: EdgeId) -> GraphRepoResult<()>;
    /// Loads the only edge of `edge_type` touching `node` in `direction`, if any.
    fn single_edge(
        &self,
        node: NodeId,
        edge_type: &str,
        direction: Direction,
    ) -> GraphRepoResult<Option<Edge>>;
    /// Reads one integer attribute.
    fn int_attribute(&self, node: NodeId, name: &str) -> GraphRepoResult<Option<i64>>;
    /// Writes one integer attribute, replacing a previous value.
    fn set_int_attribute(&self, node: NodeId, name: &str, value: i64) -> GraphRepoResult<()>;
    /// Lists nodes carrying `tag`, oldest first.
    fn find_nodes_by_tag(&self, tag: &str) -> GraphRepoResult<Vec<NodeId>>;
    /// Counts all nodes in the store.
    fn node_count(&self) -> GraphRepoResult<u64>;
    /// Counts all edges in the store.
    fn edge_count(&self) -> GraphRepoResult<u64>;
}

/// SQLite-backed graph store.
///
/// Borrowing a [`rusqlite::Transaction`] (through deref) makes every call part
/// of that transaction.
pub struct SqliteGraphStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGraphStore<'conn> {
    /// Creates store from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> GraphRepoResult<Self> {
        ensure_graph_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl GraphStore for SqliteGraphStore<'_> {
    fn create_node(&self, tags: &[&str]) -> GraphRepoResult<NodeId> {
        let node_uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO graph_nodes (node_uuid) VALUES (?1);",
            [node_uuid.to_string()],
        )?;
        for tag in tags {
            self.conn.execute(
                "INSERT OR IGNORE INTO graph_node_tags (node_uuid, tag) VALUES (?1, ?2);",
                params![node_uuid.to_string(), tag],
            )?;
        }
        Ok(node_uuid)
    }

    fn node_tags(&self, node: NodeId) -> GraphRepoResult<Vec<String>> {
        ensure_node_exists(self.conn, node)?;
        let mut stmt = self.conn.prepare(
            "SELECT tag
             FROM graph_node_tags
             WHERE node_uuid = ?1
             ORDER BY tag ASC;",
        )?;
        let mut rows = stmt.query([node.to_string()])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(row.get(0)?);
        }
        Ok(tags)
    }

    fn create_edge(&self, from: NodeId, to: NodeId, edge_type: &str) -> GraphRepoResult<Edge> {
        ensure_node_exists(self.conn, from)?;
        ensure_node_exists(self.conn, to)?;
        if edge_type.is_empty() {
            return Err(GraphRepoError::InvalidData(
                "edge type must not be empty".to_string(),
            ));
        }

        let edge_uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO graph_edges (edge_uuid, from_uuid, to_uuid, edge_type)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                edge_uuid.to_string(),
                from.to_string(),
                to.to_string(),
                edge_type,
            ],
        )?;
        Ok(Edge {
            id: edge_uuid,
            from,
            to,
            edge_type: edge_type.to_string(),
        })
    }

    fn delete_edge(&self, edge: EdgeId) -> GraphRepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM graph_edges WHERE edge_uuid = ?1;",
            [edge.to_string()],
        )?;
        if changed == 0 {
            return Err(GraphRepoError::EdgeNotFound(edge));
        }
        Ok(())
    }

    fn single_edge(
        &self,
        node: NodeId,
        edge_type: &str,
        direction: Direction,
    ) -> GraphRepoResult<Option<Edge>> {
        let sql = match direction {
            Direction::Outgoing => {
                "SELECT edge_uuid, from_uuid, to_uuid, edge_type
                 FROM graph_edges
                 WHERE from_uuid = ?1
                   AND edge_type = ?2
                 ORDER BY created_at ASC, edge_uuid ASC;"
            }
            Direction::Incoming => {
                "SELECT edge_uuid, from_uuid, to_uuid, edge_type
                 FROM graph_edges
                 WHERE to_uuid = ?1
                   AND edge_type = ?2
                 ORDER BY created_at ASC, edge_uuid ASC;"
            }
        };

        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params![node.to_string(), edge_type])?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            edges.push(parse_edge_row(row)?);
        }

        match edges.len() {
            0 | 1 => Ok(edges.pop()),
            count => Err(GraphRepoError::MultipleEdges {
                node,
                edge_type: edge_type.to_string(),
                direction,
                count,
            }),
        }
    }

    fn int_attribute(&self, node: NodeId, name: &str) -> GraphRepoResult<Option<i64>> {
        ensure_node_exists(self.conn, node)?;
        let value = self
            .conn
            .query_row(
                "SELECT int_value
                 FROM graph_node_attributes
                 WHERE node_uuid = ?1
                   AND name = ?2;",
                params![node.to_string(), name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_int_attribute(&self, node: NodeId, name: &str, value: i64) -> GraphRepoResult<()> {
        ensure_node_exists(self.conn, node)?;
        self.conn.execute(
            "INSERT INTO graph_node_attributes (node_uuid, name, int_value)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (node_uuid, name) DO UPDATE SET int_value = excluded.int_value;",
            params![node.to_string(), name, value],
        )?;
        Ok(())
    }

    fn find_nodes_by_tag(&self, tag: &str) -> GraphRepoResult<Vec<NodeId>> {
        let mut stmt = self.conn.prepare(
            "SELECT n.node_uuid
             FROM graph_nodes n
             INNER JOIN graph_node_tags t ON t.node_uuid = n.node_uuid
             WHERE t.tag = ?1
             ORDER BY n.created_at ASC, n.node_uuid ASC;",
        )?;
        let mut rows = stmt.query([tag])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "graph_nodes.node_uuid")?);
        }
        Ok(ids)
    }

    fn node_count(&self) -> GraphRepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM graph_nodes;", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn edge_count(&self) -> GraphRepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM graph_edges;", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn ensure_node_exists(conn: &Connection, node: NodeId) -> GraphRepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM graph_nodes WHERE node_uuid = ?1);",
        [node.to_string()],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(GraphRepoError::NodeNotFound(node))
    }
}

fn parse_edge_row(row: &Row<'_>) -> GraphRepoResult<Edge> {
    let edge_text: String = row.get("edge_uuid")?;
    let from_text: String = row.get("from_uuid")?;
    let to_text: String = row.get("to_uuid")?;
    Ok(Edge {
        id: parse_uuid(&edge_text, "graph_edges.edge_uuid")?,
        from: parse_uuid(&from_text, "graph_edges.from_uuid")?,
        to: parse_uuid(&to_text, "graph_edges.to_uuid")?,
        edge_type: row.get("edge_type")?,
    })
}

fn parse_uuid(value: &str, column: &'static str) -> GraphRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| GraphRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("graph_nodes", &["node_uuid", "created_at"]),
    ("graph_node_tags", &["node_uuid", "tag"]),
    ("graph_node_attributes", &["node_uuid", "name", "int_value"]),
    (
        "graph_edges",
        &["edge_uuid", "from_uuid", "to_uuid", "edge_type", "created_at"],
    ),
];

fn ensure_graph_connection_ready(conn: &Connection) -> GraphRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(GraphRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in REQUIRED_COLUMNS {
        if !table_exists(conn, table)? {
            return Err(GraphRepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(GraphRepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> GraphRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> GraphRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

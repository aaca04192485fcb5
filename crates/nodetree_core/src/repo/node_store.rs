//! Node store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD primitives over the `nodes` table.
//! - Provide compound writes (append, re-parent, move-to-front) that run
//!   inside a single `IMMEDIATE` transaction.
//! - Keep SQL details and ordering behavior inside the store boundary.
//!
//! # Invariants
//! - Child listing is deterministic: `ordering ASC, id ASC`.
//! - `max_ordering` is `0` for a parent without children.
//! - Deleting a node removes its whole subtree (`ON DELETE CASCADE`).
//! - `reparent_to_end` never makes a node its own ancestor.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::node::{Node, NodeId, NodeUpdate};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const NODE_COLUMNS: [&str; 6] = [
    "id",
    "title",
    "parent_node_id",
    "ordering",
    "created_at",
    "updated_at",
];

const NODE_SELECT_SQL: &str = "SELECT
    id,
    title,
    parent_node_id,
    ordering,
    created_at,
    updated_at
FROM nodes";

/// Result type used by node store operations.
pub type NodeStoreResult<T> = Result<T, NodeStoreError>;

/// Errors from node store operations.
#[derive(Debug)]
pub enum NodeStoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target node does not exist.
    NodeNotFound(NodeId),
    /// `parent_id` is `node_id` itself or one of its descendants.
    WouldCreateCycle { node_id: NodeId, parent_id: NodeId },
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
}

impl Display for NodeStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::WouldCreateCycle { node_id, parent_id } => write!(
                f,
                "node {parent_id} is node {node_id} or one of its descendants"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "node store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "node store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "node store requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for NodeStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for NodeStoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for NodeStoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage interface used by [`crate::TreeService`].
pub trait NodeStore {
    /// Loads one node by id.
    fn get_node(&self, id: NodeId) -> NodeStoreResult<Option<Node>>;
    /// Loads the node with no parent.
    fn get_root(&self) -> NodeStoreResult<Option<Node>>;
    /// Lists direct children of one parent, ordered.
    fn list_children(&self, parent_id: NodeId) -> NodeStoreResult<Vec<Node>>;
    /// Loads `id` and every descendant in one read. Empty when `id` is absent.
    fn list_subtree(&self, id: NodeId) -> NodeStoreResult<Vec<Node>>;
    /// Inserts one node with an explicit ordering.
    fn create_node(&self, title: &str, parent_id: NodeId, ordering: i64)
        -> NodeStoreResult<Node>;
    /// Applies a partial update and returns the stored row.
    fn update_node(&self, id: NodeId, update: &NodeUpdate) -> NodeStoreResult<Node>;
    /// Deletes one node and its descendants.
    fn delete_node(&self, id: NodeId) -> NodeStoreResult<()>;
    /// Highest `ordering` among children of `parent_id`, `0` when none.
    fn max_ordering(&self, parent_id: NodeId) -> NodeStoreResult<i64>;
    /// Atomically inserts a child after the current last sibling.
    fn append_child(&self, parent_id: NodeId, title: &str) -> NodeStoreResult<Node>;
    /// Atomically re-parents `id` to the end of `new_parent_id`'s children,
    /// optionally renaming it in the same write.
    ///
    /// Fails with `WouldCreateCycle` when `new_parent_id` lies in the subtree
    /// of `id`; the ancestry check and the write share one transaction.
    fn reparent_to_end(
        &self,
        id: NodeId,
        new_parent_id: NodeId,
        title: Option<&str>,
    ) -> NodeStoreResult<Node>;
    /// Atomically puts `id` first among its siblings and renumbers the rest
    /// `2..=N` in their prior order.
    fn move_to_front(&self, id: NodeId) -> NodeStoreResult<()>;
}

/// SQLite-backed node store.
pub struct SqliteNodeStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNodeStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> NodeStoreResult<Self> {
        ensure_node_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl NodeStore for SqliteNodeStore<'_> {
    fn get_node(&self, id: NodeId) -> NodeStoreResult<Option<Node>> {
        load_node(self.conn, id)
    }

    fn get_root(&self) -> NodeStoreResult<Option<Node>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NODE_SELECT_SQL}
             WHERE parent_node_id IS NULL
             ORDER BY id ASC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_node_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_children(&self, parent_id: NodeId) -> NodeStoreResult<Vec<Node>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NODE_SELECT_SQL}
             WHERE parent_node_id = ?1
             ORDER BY ordering ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([parent_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_node_row(row)?);
        }
        Ok(items)
    }

    fn list_subtree(&self, id: NodeId) -> NodeStoreResult<Vec<Node>> {
        // UNION (not UNION ALL) keeps the walk finite even over a corrupt cycle.
        let mut stmt = self.conn.prepare(&format!(
            "WITH RECURSIVE subtree(id) AS (
                SELECT id FROM nodes WHERE id = ?1
                UNION
                SELECT child.id
                FROM nodes child
                INNER JOIN subtree parent ON child.parent_node_id = parent.id
            )
            {NODE_SELECT_SQL}
            WHERE id IN (SELECT id FROM subtree)
            ORDER BY ordering ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_node_row(row)?);
        }
        Ok(items)
    }

    fn create_node(
        &self,
        title: &str,
        parent_id: NodeId,
        ordering: i64,
    ) -> NodeStoreResult<Node> {
        let id = insert_node(self.conn, title, parent_id, ordering)?;
        load_required_node(self.conn, id)
    }

    fn update_node(&self, id: NodeId, update: &NodeUpdate) -> NodeStoreResult<Node> {
        if update.is_empty() {
            return load_required_node(self.conn, id);
        }
        apply_update(self.conn, id, update)?;
        load_required_node(self.conn, id)
    }

    fn delete_node(&self, id: NodeId) -> NodeStoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM nodes WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(NodeStoreError::NodeNotFound(id));
        }
        Ok(())
    }

    fn max_ordering(&self, parent_id: NodeId) -> NodeStoreResult<i64> {
        max_ordering(self.conn, parent_id)
    }

    fn append_child(&self, parent_id: NodeId, title: &str) -> NodeStoreResult<Node> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let ordering = max_ordering(&tx, parent_id)? + 1;
        let id = insert_node(&tx, title, parent_id, ordering)?;
        let node = load_required_node(&tx, id)?;
        tx.commit()?;
        Ok(node)
    }

    fn reparent_to_end(
        &self,
        id: NodeId,
        new_parent_id: NodeId,
        title: Option<&str>,
    ) -> NodeStoreResult<Node> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_not_own_ancestor(&tx, id, new_parent_id)?;
        let ordering = max_ordering(&tx, new_parent_id)? + 1;
        let update = NodeUpdate {
            title: title.map(str::to_string),
            parent_node_id: Some(new_parent_id),
            ordering: Some(ordering),
        };
        apply_update(&tx, id, &update)?;
        let node = load_required_node(&tx, id)?;
        tx.commit()?;
        Ok(node)
    }

    fn move_to_front(&self, id: NodeId) -> NodeStoreResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let node = load_required_node(&tx, id)?;

        let sibling_ids = {
            let mut stmt = tx.prepare(
                "SELECT id
                 FROM nodes
                 WHERE parent_node_id IS ?1
                   AND id != ?2
                 ORDER BY ordering ASC, id ASC;",
            )?;
            let ids = stmt
                .query_map(params![node.parent_node_id, id], |row| row.get::<_, NodeId>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        set_ordering(&tx, id, 1)?;
        for (index, sibling_id) in sibling_ids.into_iter().enumerate() {
            set_ordering(&tx, sibling_id, index as i64 + 2)?;
        }

        tx.commit()?;
        Ok(())
    }
}

fn load_node(conn: &Connection, id: NodeId) -> NodeStoreResult<Option<Node>> {
    let mut stmt = conn.prepare(&format!("{NODE_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_node_row(row)?)),
        None => Ok(None),
    }
}

fn load_required_node(conn: &Connection, id: NodeId) -> NodeStoreResult<Node> {
    load_node(conn, id)?.ok_or(NodeStoreError::NodeNotFound(id))
}

/// Walks the parent chain up from `new_parent_id`; meeting `id` means a cycle.
fn ensure_not_own_ancestor(
    conn: &Connection,
    id: NodeId,
    new_parent_id: NodeId,
) -> NodeStoreResult<()> {
    let cycle = NodeStoreError::WouldCreateCycle {
        node_id: id,
        parent_id: new_parent_id,
    };
    let mut visited = HashSet::new();
    let mut cursor = Some(new_parent_id);
    while let Some(current) = cursor {
        if current == id || !visited.insert(current) {
            return Err(cycle);
        }
        cursor = load_required_node(conn, current)?.parent_node_id;
    }
    Ok(())
}

fn insert_node(
    conn: &Connection,
    title: &str,
    parent_id: NodeId,
    ordering: i64,
) -> NodeStoreResult<NodeId> {
    conn.execute(
        "INSERT INTO nodes (title, parent_node_id, ordering) VALUES (?1, ?2, ?3);",
        params![title, parent_id, ordering],
    )?;
    Ok(conn.last_insert_rowid())
}

fn apply_update(conn: &Connection, id: NodeId, update: &NodeUpdate) -> NodeStoreResult<()> {
    let changed = conn.execute(
        "UPDATE nodes
         SET title = COALESCE(?2, title),
             parent_node_id = COALESCE(?3, parent_node_id),
             ordering = COALESCE(?4, ordering),
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?1;",
        params![
            id,
            update.title.as_deref(),
            update.parent_node_id,
            update.ordering
        ],
    )?;
    if changed == 0 {
        return Err(NodeStoreError::NodeNotFound(id));
    }
    Ok(())
}

fn set_ordering(conn: &Connection, id: NodeId, ordering: i64) -> NodeStoreResult<()> {
    conn.execute(
        "UPDATE nodes
         SET ordering = ?2,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?1;",
        params![id, ordering],
    )?;
    Ok(())
}

fn max_ordering(conn: &Connection, parent_id: NodeId) -> NodeStoreResult<i64> {
    let max = conn.query_row(
        "SELECT COALESCE(MAX(ordering), 0)
         FROM nodes
         WHERE parent_node_id = ?1;",
        [parent_id],
        |row| row.get(0),
    )?;
    Ok(max)
}

fn parse_node_row(row: &Row<'_>) -> NodeStoreResult<Node> {
    Ok(Node {
        id: row.get("id")?,
        title: row.get("title")?,
        parent_node_id: row.get("parent_node_id")?,
        ordering: row.get("ordering")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn ensure_node_connection_ready(conn: &Connection) -> NodeStoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(NodeStoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let table_exists: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'nodes';",
            [],
            |_| Ok(true),
        )
        .optional()?
        .unwrap_or(false);
    if !table_exists {
        return Err(NodeStoreError::MissingRequiredTable("nodes"));
    }

    let mut stmt = conn.prepare("PRAGMA table_info(nodes);")?;
    let present = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    for column in NODE_COLUMNS {
        if !present.iter().any(|name| name == column) {
            return Err(NodeStoreError::MissingRequiredColumn {
                table: "nodes",
                column,
            });
        }
    }

    Ok(())
}

//! Versioned schema history for the `nodes` table.
//!
//! # Responsibility
//! - Bring a connection from any older schema version to the latest one.
//! - Seed the root node as part of the first schema version.
//!
//! # Invariants
//! - Each schema version runs once per database, in ascending order.
//! - Pending versions commit together with the new `PRAGMA user_version`.
//! - The root row is inserted only while no parentless row exists, so a
//!   database that already has a root, or lost it later, is never re-seeded.

use crate::db::{DbError, DbResult};
use rusqlite::{Connection, TransactionBehavior};

/// Title given to the root node when the schema is first created.
pub const ROOT_TITLE: &str = "Main Node";

enum Step {
    Sql(&'static str),
    SeedRoot,
}

struct SchemaVersion {
    version: u32,
    name: &'static str,
    steps: &'static [Step],
}

const HISTORY: &[SchemaVersion] = &[
    SchemaVersion {
        version: 1,
        name: "nodes",
        steps: &[Step::Sql(include_str!("0001_nodes.sql")), Step::SeedRoot],
    },
    SchemaVersion {
        version: 2,
        name: "single_root",
        steps: &[Step::Sql(include_str!("0002_single_root.sql"))],
    },
];

/// What one [`apply_migrations`] call changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    /// Names of the schema versions applied, oldest first.
    pub applied: Vec<&'static str>,
    pub root_seeded: bool,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Schema version a fully migrated database reports.
pub fn latest_version() -> u32 {
    HISTORY
        .iter()
        .map(|schema| schema.version)
        .max()
        .unwrap_or(0)
}

/// Upgrades `conn` to [`latest_version`] in one `IMMEDIATE` transaction.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the database is newer than this binary.
/// - Any SQLite failure; nothing is committed in that case.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<MigrationReport> {
    let from_version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let latest = latest_version();
    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let mut report = MigrationReport {
        from_version,
        to_version: from_version,
        applied: Vec::new(),
        root_seeded: false,
    };
    if from_version == latest {
        return Ok(report);
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for schema in HISTORY.iter().filter(|schema| schema.version > from_version) {
        for step in schema.steps {
            match step {
                Step::Sql(sql) => tx.execute_batch(sql)?,
                Step::SeedRoot => report.root_seeded |= seed_root(&tx)?,
            }
        }
        tx.pragma_update(None, "user_version", schema.version)?;
        report.to_version = schema.version;
        report.applied.push(schema.name);
    }
    tx.commit()?;

    Ok(report)
}

fn seed_root(conn: &Connection) -> DbResult<bool> {
    let inserted = conn.execute(
        "INSERT INTO nodes (title, parent_node_id, ordering)
         SELECT ?1, NULL, 0
         WHERE NOT EXISTS (SELECT 1 FROM nodes WHERE parent_node_id IS NULL);",
        [ROOT_TITLE],
    )?;
    Ok(inserted > 0)
}

// Schema Manager - versioned, additive migrations for the cost store
//
// The stored version lives in `PRAGMA user_version`. Every applied step is
// also written to `schema_migrations` so the history survives inspection.
//
// Logical index names map to physical ones:
//   name         -> idx_costs_name        (cost_name, advisory, not unique)
//   sum          -> idx_costs_sum         (amount)
//   category     -> idx_costs_category
//   year         -> idx_costs_year
//   month        -> idx_costs_month
//   monthAndYear -> idx_costs_month_year  (month, year)

use crate::error::{CostError, StorageError, StorageErrorReason};
use chrono::Utc;
use rusqlite::{params, Connection, TransactionBehavior};
use tracing::{debug, info};

/// Composite (month, year) index used by period lookups
pub const MONTH_YEAR_INDEX: &str = "idx_costs_month_year";

/// Highest version with a migration step attached.
pub const LATEST_VERSION: u32 = 2;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create costs store with single-field indexes",
        sql: "CREATE TABLE IF NOT EXISTS costs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cost_name TEXT NOT NULL,
                amount REAL NOT NULL,
                month INTEGER NOT NULL,
                year INTEGER NOT NULL,
                category TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_costs_name ON costs(cost_name);
            CREATE INDEX IF NOT EXISTS idx_costs_sum ON costs(amount);
            CREATE INDEX IF NOT EXISTS idx_costs_category ON costs(category);
            CREATE INDEX IF NOT EXISTS idx_costs_year ON costs(year);
            CREATE INDEX IF NOT EXISTS idx_costs_month ON costs(month);",
    },
    Migration {
        version: 2,
        description: "add composite monthAndYear index",
        sql: "CREATE INDEX IF NOT EXISTS idx_costs_month_year ON costs(month, year);",
    },
];

const LEDGER_SQL: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
        version INTEGER PRIMARY KEY,
        description TEXT NOT NULL,
        applied_at TEXT NOT NULL
    )";

// ============================================================================
// SCHEMA HANDLE & INTROSPECTION
// ============================================================================

/// Result of a successful `ensure_schema`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaHandle {
    pub name: String,
    pub version: u32,
    /// Versions migrated by this call (empty when the schema was already current).
    pub applied: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaInfo {
    pub version: u32,
    pub stores: Vec<String>,
    pub indexes: Vec<IndexInfo>,
}

impl SchemaInfo {
    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.iter().any(|i| i.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub version: u32,
    pub description: String,
    pub applied_at: String,
}

// ============================================================================
// ENSURE SCHEMA
// ============================================================================

pub fn stored_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

/// Bring the database named `name` up to `version`.
///
/// Same version: no-op. Higher version: runs every missing step in one
/// transaction. Lower version: `VersionConflict`, nothing is touched.
pub fn ensure_schema(conn: &mut Connection, name: &str, version: u32) -> Result<SchemaHandle, CostError> {
    if version == 0 {
        return Err(StorageError::new(
            StorageErrorReason::VersionConflict,
            "schema version must be at least 1",
        )
        .into());
    }

    if let Some(handle) = settled(name, stored_version(conn)?, version)? {
        return Ok(handle);
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    // Re-read under the write lock: another connection may have migrated
    // while this one was waiting for it.
    let current = stored_version(&tx)?;
    if let Some(handle) = settled(name, current, version)? {
        return Ok(handle);
    }

    tx.execute(LEDGER_SQL, [])?;

    let mut applied = Vec::new();
    for migration in MIGRATIONS
        .iter()
        .filter(|m| m.version > current && m.version <= version)
    {
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.description, Utc::now().to_rfc3339()],
        )?;
        info!(
            db = name,
            version = migration.version,
            "applied migration: {}",
            migration.description
        );
        applied.push(migration.version);
    }

    tx.pragma_update(None, "user_version", version)?;
    tx.commit()?;

    info!(db = name, from = current, to = version, "schema upgraded");

    Ok(SchemaHandle {
        name: name.to_string(),
        version,
        applied,
    })
}

/// `Some` when nothing needs migrating, an error when `version` is behind the store.
fn settled(name: &str, current: u32, version: u32) -> Result<Option<SchemaHandle>, CostError> {
    if version < current {
        return Err(StorageError::new(
            StorageErrorReason::VersionConflict,
            format!(
                "{} is at version {}, cannot open at version {}",
                name, current, version
            ),
        )
        .into());
    }

    if version == current {
        debug!(db = name, version, "schema already current");
        return Ok(Some(SchemaHandle {
            name: name.to_string(),
            version,
            applied: Vec::new(),
        }));
    }

    Ok(None)
}

/// Describe the stores and indexes currently present.
pub fn describe(conn: &Connection) -> Result<SchemaInfo, StorageError> {
    let version = stored_version(conn)?;

    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != 'schema_migrations'
         ORDER BY name",
    )?;
    let stores = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    let mut indexes = Vec::new();
    for store in &stores {
        let mut stmt = conn.prepare(
            "SELECT name, \"unique\" FROM pragma_index_list(?1)
             WHERE origin = 'c'
             ORDER BY name",
        )?;
        let listed = stmt
            .query_map([store], |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        for (name, unique) in listed {
            let mut cols = conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
            let columns = cols
                .query_map([&name], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            indexes.push(IndexInfo {
                name,
                columns,
                unique,
            });
        }
    }

    Ok(SchemaInfo {
        version,
        stores,
        indexes,
    })
}

/// Migration history, oldest first. Empty before the first upgrade.
pub fn applied_migrations(conn: &Connection) -> Result<Vec<AppliedMigration>, StorageError> {
    let ledger_exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations')",
        [],
        |row| row.get(0),
    )?;
    if !ledger_exists {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT version, description, applied_at FROM schema_migrations ORDER BY version",
    )?;
    let migrations = stmt
        .query_map([], |row| {
            Ok(AppliedMigration {
                version: row.get(0)?,
                description: row.get(1)?,
                applied_at: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(migrations)
}

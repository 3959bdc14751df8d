// Session Façade - the only place connections are opened and released
//
// One session = one connection lease + one transaction. The lease is
// released exactly once on every exit path: commit, rollback, early
// error, or a panic inside the caller's closure.

use crate::config::{StorageConfig, StorageLocation};
use crate::error::{is_unusable_medium, CostError, StorageError, StorageErrorReason};
use crate::schema::{self, SchemaHandle, SchemaInfo};
use rusqlite::{Connection, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// SESSION MODE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    ReadOnly,
    ReadWrite,
}

impl SessionMode {
    fn behavior(&self) -> TransactionBehavior {
        match self {
            // Readers take no lock until their first read
            SessionMode::ReadOnly => TransactionBehavior::Deferred,
            SessionMode::ReadWrite => TransactionBehavior::Immediate,
        }
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// Store/index handle passed to session closures.
/// Everything done through it belongs to a single transaction.
pub struct Session<'conn> {
    tx: rusqlite::Transaction<'conn>,
    mode: SessionMode,
    id: u64,
}

impl<'conn> Session<'conn> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.tx
    }

    /// Fail fast instead of letting the medium reject the write.
    pub(crate) fn require_writable(&self) -> Result<(), StorageError> {
        match self.mode {
            SessionMode::ReadWrite => Ok(()),
            SessionMode::ReadOnly => Err(StorageError::new(
                StorageErrorReason::ReadOnly,
                "write attempted in a read-only session",
            )),
        }
    }

    fn commit(self) -> Result<(), StorageError> {
        self.tx.commit().map_err(StorageError::from)
    }

    fn rollback(self) {
        if let Err(e) = self.tx.rollback() {
            warn!(session = self.id, "rollback failed: {}", e);
        }
    }
}

// ============================================================================
// SESSION PROVIDER
// ============================================================================

/// Anything that can run a closure inside one scoped transaction.
/// `CostManager` is generic over this so tests can swap in a fake.
pub trait SessionProvider {
    fn with_session<T, F>(&self, mode: SessionMode, f: F) -> Result<T, CostError>
    where
        F: FnOnce(&Session<'_>) -> Result<T, CostError>;
}

// ============================================================================
// SESSION STATS
// ============================================================================

#[derive(Debug, Default)]
pub struct SessionStats {
    opened: AtomicU64,
    released: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
}

impl SessionStats {
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::SeqCst)
    }

    pub fn rolled_back(&self) -> u64 {
        self.rolled_back.load(Ordering::SeqCst)
    }

    /// Sessions whose connection has not been released yet.
    pub fn in_flight(&self) -> u64 {
        self.opened().saturating_sub(self.released())
    }
}

/// Counts the release when dropped, whatever path dropped it.
struct Lease<'a> {
    stats: &'a SessionStats,
    id: u64,
}

impl<'a> Lease<'a> {
    fn acquire(stats: &'a SessionStats) -> Self {
        let id = stats.opened.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(session = id, "connection acquired");
        Self { stats, id }
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.stats.released.fetch_add(1, Ordering::SeqCst);
        debug!(session = self.id, "connection released");
    }
}

// ============================================================================
// DATABASE
// ============================================================================

enum Backend {
    File(PathBuf),
    /// In-memory databases vanish with their last connection, so one is kept and guarded.
    Memory(Mutex<Connection>),
}

/// Handle on a named, versioned cost database.
pub struct Database {
    name: String,
    version: u32,
    busy_timeout: Duration,
    backend: Backend,
    stats: Arc<SessionStats>,
}

impl Database {
    /// Open (creating or upgrading as needed) the database described by `config`.
    pub fn open(config: &StorageConfig) -> Result<Self, CostError> {
        let (backend, handle) = match &config.location {
            StorageLocation::File(path) => {
                let mut conn = open_file(path, config.busy_timeout()).map_err(|e| medium_error(path, e))?;
                // Forces the header read, so a foreign file fails here
                conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |_| Ok(()))
                    .map_err(|e| medium_error(path, e))?;
                let handle = schema::ensure_schema(&mut conn, &config.name, config.version)?;
                conn.close().map_err(|(_, e)| StorageError::from(e))?;
                (Backend::File(path.clone()), handle)
            }
            StorageLocation::Memory => {
                let mut conn = Connection::open_in_memory()
                    .map_err(|e| CostError::UnsupportedEnvironment(e.to_string()))?;
                let handle = schema::ensure_schema(&mut conn, &config.name, config.version)?;
                (Backend::Memory(Mutex::new(conn)), handle)
            }
        };

        info!(
            db = %handle.name,
            version = handle.version,
            migrated = handle.applied.len(),
            "database ready"
        );

        Ok(Self {
            name: config.name.clone(),
            version: config.version,
            busy_timeout: config.busy_timeout(),
            backend,
            stats: Arc::new(SessionStats::default()),
        })
    }

    /// Like `open`, but falls back to an in-memory database when the
    /// configured location cannot be used at all. A busy or locked file is
    /// returned as a storage error, never replaced.
    pub fn open_or_fallback(config: &StorageConfig) -> Result<Self, CostError> {
        match Self::open(config) {
            Err(CostError::UnsupportedEnvironment(reason)) => {
                warn!("storage unavailable ({}), falling back to in-memory database", reason);
                Self::open(&config.clone().in_memory())
            }
            other => other,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self.backend, Backend::Memory(_))
    }

    pub fn stats(&self) -> Arc<SessionStats> {
        Arc::clone(&self.stats)
    }

    /// Re-run schema creation at this handle's version.
    /// Returns the handle; `applied` is empty when nothing had to change.
    pub fn ensure_schema(&self) -> Result<SchemaHandle, CostError> {
        match &self.backend {
            Backend::File(path) => {
                let _lease = Lease::acquire(&self.stats);
                let mut conn = open_file(path, self.busy_timeout)?;
                let handle = schema::ensure_schema(&mut conn, &self.name, self.version);
                conn.close().map_err(|(_, e)| StorageError::from(e))?;
                handle
            }
            Backend::Memory(shared) => {
                let _lease = Lease::acquire(&self.stats);
                let mut conn = lock(shared);
                schema::ensure_schema(&mut conn, &self.name, self.version)
            }
        }
    }

    pub fn schema_info(&self) -> Result<SchemaInfo, CostError> {
        self.with_session(SessionMode::ReadOnly, |session| {
            Ok(schema::describe(session.conn())?)
        })
    }

    fn run<T, F>(&self, conn: &mut Connection, lease: &Lease<'_>, mode: SessionMode, f: F) -> Result<T, CostError>
    where
        F: FnOnce(&Session<'_>) -> Result<T, CostError>,
    {
        conn.pragma_update(None, "query_only", mode == SessionMode::ReadOnly)?;

        let tx = conn.transaction_with_behavior(mode.behavior())?;
        let session = Session {
            tx,
            mode,
            id: lease.id,
        };

        let stored = schema::stored_version(session.conn())?;
        if stored < self.version {
            session.rollback();
            return Err(StorageError::new(
                StorageErrorReason::SchemaNotReady,
                format!("{} is at version {}, expected {}", self.name, stored, self.version),
            )
            .into());
        }
        if stored > self.version {
            session.rollback();
            return Err(StorageError::new(
                StorageErrorReason::VersionConflict,
                format!("{} was upgraded to version {} by another handle", self.name, stored),
            )
            .into());
        }

        match f(&session) {
            Ok(value) => {
                session.commit()?;
                self.stats.committed.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }
            Err(err) => {
                warn!(session = lease.id, ?mode, "rolling back: {}", err);
                session.rollback();
                self.stats.rolled_back.fetch_add(1, Ordering::SeqCst);
                Err(err)
            }
        }
    }
}

impl SessionProvider for Database {
    fn with_session<T, F>(&self, mode: SessionMode, f: F) -> Result<T, CostError>
    where
        F: FnOnce(&Session<'_>) -> Result<T, CostError>,
    {
        match &self.backend {
            Backend::File(path) => {
                let mut conn = open_file(path, self.busy_timeout)?;
                let lease = Lease::acquire(&self.stats);
                let result = self.run(&mut conn, &lease, mode, f);
                let closed = conn.close().map_err(|(_, e)| StorageError::from(e));
                drop(lease);
                match (result, closed) {
                    (Ok(value), Ok(())) => Ok(value),
                    (Ok(_), Err(e)) => Err(e.into()),
                    (Err(e), _) => Err(e),
                }
            }
            Backend::Memory(shared) => {
                let mut conn = lock(shared);
                let lease = Lease::acquire(&self.stats);
                self.run(&mut conn, &lease, mode, f)
            }
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("in_memory", &self.is_in_memory())
            .finish()
    }
}

fn open_file(path: &Path, busy_timeout: Duration) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

/// A panicking session already rolled back on drop, so a poisoned guard is still usable.
fn lock(shared: &Mutex<Connection>) -> std::sync::MutexGuard<'_, Connection> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Only a file that can never hold the database is unsupported; contention
/// stays a storage error.
fn medium_error(path: &Path, err: rusqlite::Error) -> CostError {
    if is_unusable_medium(&err) {
        CostError::UnsupportedEnvironment(format!("{}: {}", path.display(), err))
    } else {
        err.into()
    }
}

// Error taxonomy for the cost store
// Validation failures are kept apart from storage failures so callers can
// tell "fix your input" from "try again later".

use crate::validation::ValidationError;
use rusqlite::ErrorCode;
use thiserror::Error;

// ============================================================================
// STORAGE ERRORS
// ============================================================================

/// Why a storage operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorReason {
    /// The medium is out of space (SQLITE_FULL).
    QuotaExceeded,
    /// A table or index constraint rejected the write.
    ConstraintViolation,
    /// The connection could not be opened, was busy, or was lost mid-session.
    ConnectionLost,
    /// The store or one of its indexes does not exist yet.
    SchemaNotReady,
    /// A write was attempted inside a read-only session.
    ReadOnly,
    /// The stored schema is newer than the one requested.
    VersionConflict,
    /// Disk-level I/O failure.
    Io,
    /// Row conversion failures and API misuse.
    Internal,
}

impl StorageErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageErrorReason::QuotaExceeded => "quota_exceeded",
            StorageErrorReason::ConstraintViolation => "constraint_violation",
            StorageErrorReason::ConnectionLost => "connection_lost",
            StorageErrorReason::SchemaNotReady => "schema_not_ready",
            StorageErrorReason::ReadOnly => "read_only",
            StorageErrorReason::VersionConflict => "version_conflict",
            StorageErrorReason::Io => "io",
            StorageErrorReason::Internal => "internal",
        }
    }
}

impl std::fmt::Display for StorageErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed open, transaction, or cursor step.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("storage error ({reason}): {message}")]
pub struct StorageError {
    pub reason: StorageErrorReason,
    pub message: String,
}

impl StorageError {
    pub fn new(reason: StorageErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        let reason = match &err {
            rusqlite::Error::SqliteFailure(failure, detail) => match failure.code {
                ErrorCode::DiskFull => StorageErrorReason::QuotaExceeded,
                ErrorCode::ConstraintViolation => StorageErrorReason::ConstraintViolation,
                ErrorCode::ReadOnly => StorageErrorReason::ReadOnly,
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::NotADatabase
                | ErrorCode::PermissionDenied => StorageErrorReason::ConnectionLost,
                ErrorCode::SystemIoFailure | ErrorCode::DatabaseCorrupt => StorageErrorReason::Io,
                _ if is_missing_schema(detail.as_deref()) => StorageErrorReason::SchemaNotReady,
                _ => StorageErrorReason::Internal,
            },
            _ => StorageErrorReason::Internal,
        };

        StorageError::new(reason, err.to_string())
    }
}

/// The file cannot serve as a cost database at all. Busy and locked
/// files are not unusable, only contended.
pub(crate) fn is_unusable_medium(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::PermissionDenied)
    )
}

fn is_missing_schema(detail: Option<&str>) -> bool {
    detail
        .map(|msg| msg.contains("no such table") || msg.contains("no such index"))
        .unwrap_or(false)
}

// ============================================================================
// TOP-LEVEL ERROR
// ============================================================================

#[derive(Error, Debug)]
pub enum CostError {
    /// The storage medium cannot be used at all; callers may degrade to memory.
    #[error("storage environment unsupported: {0}")]
    UnsupportedEnvironment(String),

    /// Detected before any write.
    #[error("invalid cost entry: {}", describe(.0))]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CostError {
    pub fn is_validation(&self) -> bool {
        matches!(self, CostError::Validation(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, CostError::Storage(_))
    }

    /// Reason code for storage failures, `None` for everything else.
    pub fn storage_reason(&self) -> Option<StorageErrorReason> {
        match self {
            CostError::Storage(err) => Some(err.reason),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for CostError {
    fn from(err: rusqlite::Error) -> Self {
        CostError::Storage(err.into())
    }
}

fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32, detail: Option<&str>) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(code),
            detail.map(|s| s.to_string()),
        )
    }

    #[test]
    fn test_result_codes_map_to_reasons() {
        let full: StorageError = sqlite_failure(rusqlite::ffi::SQLITE_FULL, None).into();
        assert_eq!(full.reason, StorageErrorReason::QuotaExceeded);

        let constraint: StorageError =
            sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT, Some("UNIQUE constraint failed")).into();
        assert_eq!(constraint.reason, StorageErrorReason::ConstraintViolation);

        let cant_open: StorageError = sqlite_failure(rusqlite::ffi::SQLITE_CANTOPEN, None).into();
        assert_eq!(cant_open.reason, StorageErrorReason::ConnectionLost);

        let readonly: StorageError = sqlite_failure(rusqlite::ffi::SQLITE_READONLY, None).into();
        assert_eq!(readonly.reason, StorageErrorReason::ReadOnly);
    }

    #[test]
    fn test_only_unusable_files_count_as_unusable_medium() {
        assert!(is_unusable_medium(&sqlite_failure(rusqlite::ffi::SQLITE_CANTOPEN, None)));
        assert!(is_unusable_medium(&sqlite_failure(rusqlite::ffi::SQLITE_NOTADB, None)));
        assert!(!is_unusable_medium(&sqlite_failure(rusqlite::ffi::SQLITE_BUSY, None)));
        assert!(!is_unusable_medium(&sqlite_failure(rusqlite::ffi::SQLITE_LOCKED, None)));
        assert!(!is_unusable_medium(&sqlite_failure(rusqlite::ffi::SQLITE_FULL, None)));
    }

    #[test]
    fn test_missing_table_is_schema_not_ready() {
        let err: StorageError =
            sqlite_failure(rusqlite::ffi::SQLITE_ERROR, Some("no such table: costs")).into();
        assert_eq!(err.reason, StorageErrorReason::SchemaNotReady);

        let err: StorageError =
            sqlite_failure(rusqlite::ffi::SQLITE_ERROR, Some("no such index: idx_costs_month_year"))
                .into();
        assert_eq!(err.reason, StorageErrorReason::SchemaNotReady);

        let err: StorageError = sqlite_failure(rusqlite::ffi::SQLITE_ERROR, Some("syntax error")).into();
        assert_eq!(err.reason, StorageErrorReason::Internal);
    }

    #[test]
    fn test_validation_and_storage_are_distinguishable() {
        let validation = CostError::Validation(vec![ValidationError::new("amount", "Required field is missing")]);
        assert!(validation.is_validation());
        assert!(!validation.is_storage());
        assert_eq!(validation.storage_reason(), None);
        assert!(validation.to_string().contains("amount"));

        let storage = CostError::from(StorageError::new(StorageErrorReason::QuotaExceeded, "full"));
        assert!(storage.is_storage());
        assert_eq!(storage.storage_reason(), Some(StorageErrorReason::QuotaExceeded));
    }
}

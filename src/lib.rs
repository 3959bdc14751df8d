// Cost Manager - Core Library
// Exposes the storage layer for use in the CLI, API server, and tests

pub mod config;
pub mod error;
pub mod import;
pub mod manager;
pub mod models;
pub mod query;
pub mod schema;
pub mod session;
pub mod store;
pub mod validation;
pub mod view;

// Re-export commonly used types
pub use config::{StorageConfig, StorageLocation};
pub use error::{CostError, StorageError, StorageErrorReason};
pub use import::{import_costs, import_csv, load_csv, CsvBatch, CsvRow, ImportReport, RejectedRow};
pub use manager::CostManager;
pub use models::{Category, CostEntry, CostEntryInput, Period, MAX_YEAR, MIN_YEAR};
pub use schema::{SchemaHandle, SchemaInfo};
pub use session::{Database, Session, SessionMode, SessionProvider, SessionStats};
pub use validation::ValidationError;
pub use view::CostLedgerView;

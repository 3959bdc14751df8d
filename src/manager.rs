// Query surface consumed by the UI layer
// Each call is one session; errors come back exactly as the session produced them.

use crate::config::StorageConfig;
use crate::error::CostError;
use crate::models::{Category, CostEntry, CostEntryInput, Period};
use crate::query;
use crate::session::{Database, SessionMode, SessionProvider};
use crate::store;

pub struct CostManager<P = Database> {
    sessions: P,
}

impl CostManager<Database> {
    /// Open the configured database, degrading to memory when the medium is unusable.
    pub fn open(config: &StorageConfig) -> Result<Self, CostError> {
        Ok(Self::new(Database::open_or_fallback(config)?))
    }

    pub fn database(&self) -> &Database {
        &self.sessions
    }
}

impl<P: SessionProvider> CostManager<P> {
    pub fn new(sessions: P) -> Self {
        Self { sessions }
    }

    pub fn append_cost(&self, input: &CostEntryInput) -> Result<CostEntry, CostError> {
        self.sessions
            .with_session(SessionMode::ReadWrite, |s| store::append(s, input))
    }

    pub fn list_costs(&self) -> Result<Vec<CostEntry>, CostError> {
        self.sessions
            .with_session(SessionMode::ReadOnly, |s| store::list_all(s))
    }

    pub fn list_costs_by_period(&self, month: u32, year: i32) -> Result<Vec<CostEntry>, CostError> {
        self.sessions.with_session(SessionMode::ReadOnly, |s| {
            query::find_by_period(s, Period::new(month, year))
        })
    }

    pub fn list_costs_by_year(&self, year: i32) -> Result<Vec<CostEntry>, CostError> {
        self.sessions
            .with_session(SessionMode::ReadOnly, |s| query::find_by_year(s, year))
    }

    pub fn list_costs_by_category(&self, category: Category) -> Result<Vec<CostEntry>, CostError> {
        self.sessions
            .with_session(SessionMode::ReadOnly, |s| query::find_by_category(s, category))
    }

    pub fn get_cost(&self, id: i64) -> Result<Option<CostEntry>, CostError> {
        self.sessions
            .with_session(SessionMode::ReadOnly, |s| store::get(s, id))
    }

    pub fn count_costs(&self) -> Result<i64, CostError> {
        self.sessions
            .with_session(SessionMode::ReadOnly, |s| store::count(s))
    }

    pub fn sessions(&self) -> &P {
        &self.sessions
    }
}

// Ledger view - the list of costs a UI shows
//
// The list is always the result of a query. After every mutation or filter
// change it is re-read from storage, so it carries store-assigned ids and
// never drifts from what was actually committed.

use crate::error::CostError;
use crate::manager::CostManager;
use crate::models::{CostEntry, CostEntryInput, Period};
use crate::session::SessionProvider;

#[derive(Debug, Clone, Default)]
pub struct CostLedgerView {
    entries: Vec<CostEntry>,
    filter: Option<Period>,
}

impl CostLedgerView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a view and load it right away.
    pub fn load<P: SessionProvider>(manager: &CostManager<P>) -> Result<Self, CostError> {
        let mut view = Self::new();
        view.refresh(manager)?;
        Ok(view)
    }

    pub fn entries(&self) -> &[CostEntry] {
        &self.entries
    }

    pub fn active_filter(&self) -> Option<Period> {
        self.filter
    }

    pub fn total_amount(&self) -> f64 {
        self.entries.iter().map(|e| e.amount).sum()
    }

    /// Re-read the list. On failure the previous contents stay in place.
    pub fn refresh<P: SessionProvider>(&mut self, manager: &CostManager<P>) -> Result<(), CostError> {
        self.entries = match self.filter {
            Some(period) => manager.list_costs_by_period(period.month, period.year)?,
            None => manager.list_costs()?,
        };
        Ok(())
    }

    /// Append through the manager, then refresh. Returns the stored entry.
    pub fn submit<P: SessionProvider>(
        &mut self,
        manager: &CostManager<P>,
        input: &CostEntryInput,
    ) -> Result<CostEntry, CostError> {
        let stored = manager.append_cost(input)?;
        self.refresh(manager)?;
        Ok(stored)
    }

    pub fn apply_filter<P: SessionProvider>(
        &mut self,
        manager: &CostManager<P>,
        period: Period,
    ) -> Result<(), CostError> {
        self.filter = Some(period);
        self.refresh(manager)
    }

    pub fn clear_filter<P: SessionProvider>(&mut self, manager: &CostManager<P>) -> Result<(), CostError> {
        self.filter = None;
        self.refresh(manager)
    }
}

// Query Index - exact-match lookups over the secondary indexes
//
// Lookups name their index with INDEXED BY, so a database whose schema
// lacks the index fails with SchemaNotReady instead of silently scanning.
// None of these indexes is unique: expect zero or more results.

use crate::error::CostError;
use crate::models::{Category, CostEntry, Period};
use crate::schema::MONTH_YEAR_INDEX;
use crate::session::Session;
use crate::store::{row_to_entry, COST_COLUMNS};
use rusqlite::Params;

fn scan<P: Params>(session: &Session<'_>, index: &str, filter: &str, params: P) -> Result<Vec<CostEntry>, CostError> {
    let sql = format!(
        "SELECT {} FROM costs INDEXED BY {} WHERE {} ORDER BY id",
        COST_COLUMNS, index, filter
    );
    let mut stmt = session.conn().prepare(&sql)?;

    let entries = stmt
        .query_map(params, row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

/// All entries recorded for exactly this (month, year).
pub fn find_by_period(session: &Session<'_>, period: Period) -> Result<Vec<CostEntry>, CostError> {
    scan(
        session,
        MONTH_YEAR_INDEX,
        "month = ?1 AND year = ?2",
        rusqlite::params![period.month, period.year],
    )
}

pub fn find_by_year(session: &Session<'_>, year: i32) -> Result<Vec<CostEntry>, CostError> {
    scan(session, "idx_costs_year", "year = ?1", [year])
}

pub fn find_by_category(session: &Session<'_>, category: Category) -> Result<Vec<CostEntry>, CostError> {
    scan(session, "idx_costs_category", "category = ?1", [category.as_str()])
}

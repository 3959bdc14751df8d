// Record Store - durable keyed storage of cost entries
// Every function runs inside the caller's session; none of them opens or
// closes a connection.

use crate::error::CostError;
use crate::models::{Category, CostEntry, CostEntryInput};
use crate::session::Session;
use crate::validation;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

pub(crate) const COST_COLUMNS: &str = "id, cost_name, amount, month, year, category";

/// Map a `SELECT COST_COLUMNS` row.
pub(crate) fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<CostEntry> {
    let category_str: String = row.get(5)?;
    let category = category_str.parse::<Category>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.into())
    })?;

    Ok(CostEntry {
        id: row.get(0)?,
        cost_name: row.get(1)?,
        amount: row.get(2)?,
        month: row.get(3)?,
        year: row.get(4)?,
        category,
    })
}

/// Validate and insert a new entry; the store assigns its id.
/// Nothing is written when validation fails.
pub fn append(session: &Session<'_>, input: &CostEntryInput) -> Result<CostEntry, CostError> {
    let cost = validation::validate(input)?;
    session.require_writable()?;

    let conn = session.conn();
    conn.execute(
        "INSERT INTO costs (cost_name, amount, month, year, category) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            cost.cost_name,
            cost.amount,
            cost.month,
            cost.year,
            cost.category.as_str(),
        ],
    )?;
    let id = conn.last_insert_rowid();

    debug!(session = session.id(), id, "cost appended");
    Ok(cost.with_id(id))
}

/// Upsert by primary key. The entry is re-validated first.
pub fn put(session: &Session<'_>, entry: &CostEntry) -> Result<CostEntry, CostError> {
    let cost = validation::validate(&CostEntryInput::from(entry))?;
    session.require_writable()?;

    session.conn().execute(
        "INSERT INTO costs (id, cost_name, amount, month, year, category)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            cost_name = excluded.cost_name,
            amount = excluded.amount,
            month = excluded.month,
            year = excluded.year,
            category = excluded.category",
        params![
            entry.id,
            cost.cost_name,
            cost.amount,
            cost.month,
            cost.year,
            cost.category.as_str(),
        ],
    )?;

    debug!(session = session.id(), id = entry.id, "cost stored");
    Ok(cost.with_id(entry.id))
}

pub fn get(session: &Session<'_>, id: i64) -> Result<Option<CostEntry>, CostError> {
    let sql = format!("SELECT {} FROM costs WHERE id = ?1", COST_COLUMNS);
    let entry = session
        .conn()
        .query_row(&sql, [id], row_to_entry)
        .optional()?;

    Ok(entry)
}

/// Every stored entry. Ordered by id for stable output, not as a guarantee.
pub fn list_all(session: &Session<'_>) -> Result<Vec<CostEntry>, CostError> {
    let sql = format!("SELECT {} FROM costs ORDER BY id", COST_COLUMNS);
    let mut stmt = session.conn().prepare(&sql)?;

    let entries = stmt
        .query_map([], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

pub fn count(session: &Session<'_>) -> Result<i64, CostError> {
    let count: i64 = session
        .conn()
        .query_row("SELECT COUNT(*) FROM costs", [], |row| row.get(0))?;

    Ok(count)
}

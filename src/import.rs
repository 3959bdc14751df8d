// CSV import of cost entries
// Header: costName,amount,month,year,category

use crate::error::CostError;
use crate::models::{CostEntry, CostEntryInput};
use crate::session::{SessionMode, SessionProvider};
use crate::store;
use crate::validation::ValidationError;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

/// A row that could not be read or failed validation. `line` counts the header as line 1.
#[derive(Debug)]
pub struct RejectedRow {
    pub line: usize,
    pub error: CostError,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub inserted: Vec<CostEntry>,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    pub line: usize,
    pub input: CostEntryInput,
}

/// Rows read from a CSV file. Rows whose cells could not be read at all
/// are already in `rejected`.
#[derive(Debug, Default)]
pub struct CsvBatch {
    pub rows: Vec<CsvRow>,
    pub rejected: Vec<RejectedRow>,
}

pub fn load_csv(csv_path: &Path) -> Result<CsvBatch> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open CSV file")?;
    let headers = rdr.headers().context("Failed to read CSV header")?.clone();

    let mut batch = CsvBatch::default();
    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e).context("Failed to read CSV file"),
            Err(e) => {
                let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
                batch.rejected.push(unreadable(line, "record", e.to_string()));
                continue;
            }
        };

        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        match record.deserialize::<CostEntryInput>(Some(&headers)) {
            Ok(input) => batch.rows.push(CsvRow { line, input }),
            Err(e) => batch.rejected.push(cell_error(&headers, line, &e)),
        }
    }

    Ok(batch)
}

fn cell_error(headers: &csv::StringRecord, line: usize, err: &csv::Error) -> RejectedRow {
    match err.kind() {
        csv::ErrorKind::Deserialize { err: de, .. } => {
            let field = de
                .field()
                .and_then(|i| headers.get(i as usize))
                .unwrap_or("record");
            unreadable(line, field, de.kind().to_string())
        }
        _ => unreadable(line, "record", err.to_string()),
    }
}

fn unreadable(line: usize, field: &str, reason: String) -> RejectedRow {
    warn!(line, field, "unreadable row: {}", reason);
    RejectedRow {
        line,
        error: CostError::Validation(vec![ValidationError::new(
            field,
            format!("Could not be read: {}", reason),
        )]),
    }
}

/// Append every valid row in one read-write session.
/// Invalid rows are skipped and reported; a storage failure aborts the whole batch.
/// Line numbers assume the rows came from a file with a header and no gaps.
pub fn import_costs<P: SessionProvider>(
    sessions: &P,
    inputs: &[CostEntryInput],
) -> Result<ImportReport, CostError> {
    append_rows(sessions, inputs.iter().enumerate().map(|(i, input)| (i + 2, input)))
}

/// Import a loaded CSV batch, keeping the rows that could not be read in the report.
pub fn import_csv<P: SessionProvider>(sessions: &P, batch: CsvBatch) -> Result<ImportReport, CostError> {
    let mut report = append_rows(sessions, batch.rows.iter().map(|row| (row.line, &row.input)))?;

    report.rejected.extend(batch.rejected);
    report.rejected.sort_by_key(|row| row.line);
    Ok(report)
}

fn append_rows<'a, P, I>(sessions: &P, rows: I) -> Result<ImportReport, CostError>
where
    P: SessionProvider,
    I: Iterator<Item = (usize, &'a CostEntryInput)>,
{
    let report = sessions.with_session(SessionMode::ReadWrite, |s| {
        let mut report = ImportReport::default();

        for (line, input) in rows {
            match store::append(s, input) {
                Ok(entry) => report.inserted.push(entry),
                Err(error @ CostError::Validation(_)) => {
                    warn!(line, "skipping row: {}", error);
                    report.rejected.push(RejectedRow { line, error });
                }
                Err(error) => return Err(error),
            }
        }

        Ok(report)
    })?;

    info!(
        inserted = report.inserted.len(),
        rejected = report.rejected.len(),
        "import finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::error::{StorageError, StorageErrorReason};
    use crate::session::{Database, Session};

    fn write_csv(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("costs.csv");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_csv_reads_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "costName,amount,month,year,category\nRent,1200,1,1990,Living\nGas,,2,1990,Car\n",
        );

        let batch = load_csv(&path).unwrap();
        assert_eq!(batch.rows.len(), 2);
        assert!(batch.rejected.is_empty());
        assert_eq!(batch.rows[0].input, CostEntryInput::new("Rent", 1200.0, 1, 1990, "Living"));
        assert_eq!(batch.rows[0].line, 2);
        assert_eq!(batch.rows[1].input.amount, None);
    }

    #[test]
    fn test_unreadable_cells_reject_only_their_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "costName,amount,month,year,category\n\
             Rent,1200,1,1990,Living\n\
             Gas,forty,2,1990,Car\n\
             Tires,300,-5,1990,Car\n\
             Gym,30,2,1990,Lifestyle\n",
        );

        let batch = load_csv(&path).unwrap();
        assert_eq!(batch.rows.iter().map(|r| r.line).collect::<Vec<_>>(), vec![2, 5]);
        assert_eq!(batch.rejected.iter().map(|r| r.line).collect::<Vec<_>>(), vec![3, 4]);

        let fields: Vec<_> = batch
            .rejected
            .iter()
            .map(|r| match &r.error {
                CostError::Validation(errors) => errors[0].field.clone(),
                other => panic!("unexpected error: {}", other),
            })
            .collect();
        assert_eq!(fields, vec!["amount", "month"]);

        let db = Database::open(&StorageConfig::default().in_memory()).unwrap();
        let report = import_csv(&db, batch).unwrap();
        assert_eq!(report.inserted.len(), 2);
        assert_eq!(report.rejected.iter().map(|r| r.line).collect::<Vec<_>>(), vec![3, 4]);

        println!("✅ Unreadable CSV rows test PASSED");
    }

    #[test]
    fn test_import_skips_invalid_rows() {
        let db = Database::open(&StorageConfig::default().in_memory()).unwrap();
        let inputs = vec![
            CostEntryInput::new("Rent", 1200.0, 1, 1990, "Living"),
            CostEntryInput::new("Gas", 40.0, 13, 1990, "Car"),
            CostEntryInput::new("Gym", 30.0, 2, 1990, "Lifestyle"),
        ];

        let report = import_costs(&db, &inputs).unwrap();
        assert_eq!(report.inserted.len(), 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].line, 3);
        assert!(report.rejected[0].error.is_validation());

        let count = db.with_session(SessionMode::ReadOnly, |s| store::count(s)).unwrap();
        assert_eq!(count, 2);

        println!("✅ Import test PASSED: {} inserted, {} rejected", report.inserted.len(), report.rejected.len());
    }

    /// Runs the closure on a real session, then reports the medium as full.
    struct FullDisk(Database);

    impl SessionProvider for FullDisk {
        fn with_session<T, F>(&self, mode: SessionMode, f: F) -> Result<T, CostError>
        where
            F: FnOnce(&Session<'_>) -> Result<T, CostError>,
        {
            self.0.with_session(mode, |s| {
                f(s)?;
                Err(StorageError::new(StorageErrorReason::QuotaExceeded, "disk full").into())
            })
        }
    }

    #[test]
    fn test_storage_failure_aborts_whole_import() {
        let full = FullDisk(Database::open(&StorageConfig::default().in_memory()).unwrap());
        let inputs = vec![CostEntryInput::new("Rent", 1200.0, 1, 1990, "Living")];

        let err = import_costs(&full, &inputs).unwrap_err();
        assert_eq!(err.storage_reason(), Some(StorageErrorReason::QuotaExceeded));

        let count = full.0.with_session(SessionMode::ReadOnly, |s| store::count(s)).unwrap();
        assert_eq!(count, 0);
    }
}

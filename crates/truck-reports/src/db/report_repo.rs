//! Report repository: upsert and lookups for the `reports` table.

use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use super::{Database, DatabaseError};

/// The live report for one truck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Four-digit truck name, or `no data (<tag>)` for unclassified files.
    pub truck_name: String,
    /// Storage key of the attachment bytes under the files directory.
    pub file_name: String,
    pub original_name: Option<String>,
    pub mail_uid: u32,
    /// RFC 3339 timestamp of the write.
    pub stored_at: String,
}

impl Report {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            truck_name: row.get("truck_name")?,
            file_name: row.get("file_name")?,
            original_name: row.get("original_name")?,
            mail_uid: row.get("mail_uid")?,
            stored_at: row.get("stored_at")?,
        })
    }
}

/// Inserts `report`, replacing every field of an existing report with the
/// same truck name.
pub fn upsert(db: &Database, report: &Report) -> Result<(), DatabaseError> {
    db.conn()?.execute(
        "INSERT INTO reports (truck_name, file_name, original_name, mail_uid, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(truck_name) DO UPDATE SET
            file_name = excluded.file_name,
            original_name = excluded.original_name,
            mail_uid = excluded.mail_uid,
            stored_at = excluded.stored_at",
        params![
            report.truck_name,
            report.file_name,
            report.original_name,
            report.mail_uid,
            report.stored_at,
        ],
    )?;
    Ok(())
}

pub fn find(db: &Database, truck_name: &str) -> Result<Option<Report>, DatabaseError> {
    let report = db
        .conn()?
        .query_row(
            "SELECT * FROM reports WHERE truck_name = ?1",
            params![truck_name],
            Report::from_row,
        )
        .optional()?;
    Ok(report)
}

/// All reports, ordered by truck name.
pub fn list(db: &Database) -> Result<Vec<Report>, DatabaseError> {
    let conn = db.conn()?;
    let mut stmt = conn.prepare("SELECT * FROM reports ORDER BY truck_name")?;
    let rows = stmt
        .query_map([], Report::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    let count = db
        .conn()?
        .query_row("SELECT COUNT(*) FROM reports", [], |r| r.get(0))?;
    Ok(count)
}

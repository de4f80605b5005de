//! Processed-mail ledger: the append-only `mail` table.
//!
//! IMAP UIDs are only unique within one folder and one UIDVALIDITY, so every
//! row and every lookup carries both.

use std::collections::HashSet;

use rusqlite::params;

use crate::email::FolderInfo;

use super::{Database, DatabaseError};

/// Records every uid in `uids` under `folder` in one transaction. Already
/// recorded uids are ignored. Returns how many rows were actually added.
pub fn insert_batch(
    db: &Database,
    folder: &FolderInfo,
    uids: &[u32],
    processed_at: &str,
) -> Result<usize, DatabaseError> {
    if uids.is_empty() {
        return Ok(0);
    }

    let mut conn = db.conn()?;
    let tx = conn.transaction()?;
    let mut added = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO mail (folder, uid_validity, mail_uid, processed_at)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for uid in uids {
            added += stmt.execute(params![folder.name, folder.uid_validity, uid, processed_at])?;
        }
    }
    tx.commit()?;
    Ok(added)
}

/// Uids recorded for this folder and UIDVALIDITY.
pub fn list_uids(db: &Database, folder: &FolderInfo) -> Result<HashSet<u32>, DatabaseError> {
    let conn = db.conn()?;
    let mut stmt =
        conn.prepare("SELECT mail_uid FROM mail WHERE folder = ?1 AND uid_validity = ?2")?;
    let uids = stmt
        .query_map(params![folder.name, folder.uid_validity], |row| {
            row.get::<_, u32>(0)
        })?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(uids)
}

/// Other UIDVALIDITY values with rows for `folder`. Non-empty means the
/// folder was recreated since those rows were written.
pub fn stale_validities(db: &Database, folder: &FolderInfo) -> Result<Vec<u32>, DatabaseError> {
    let conn = db.conn()?;
    let mut stmt = conn.prepare(
        "SELECT DISTINCT uid_validity FROM mail
         WHERE folder = ?1 AND uid_validity != ?2
         ORDER BY uid_validity",
    )?;
    let validities = stmt
        .query_map(params![folder.name, folder.uid_validity], |row| {
            row.get::<_, u32>(0)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(validities)
}

pub fn contains(db: &Database, folder: &FolderInfo, uid: u32) -> Result<bool, DatabaseError> {
    let count: u32 = db.conn()?.query_row(
        "SELECT COUNT(*) FROM mail WHERE folder = ?1 AND uid_validity = ?2 AND mail_uid = ?3",
        params![folder.name, folder.uid_validity, uid],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

/// Rows across all folders.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    let count = db
        .conn()?
        .query_row("SELECT COUNT(*) FROM mail", [], |r| r.get(0))?;
    Ok(count)
}

//! Schema versions, tracked in SQLite's `user_version` pragma.
//!
//! Each step runs in its own transaction together with the version bump, so
//! a failed step leaves the file at the previous version.

use rusqlite::Connection;

use super::error::DatabaseError;

/// Ordered schema steps. Version N is `SCHEMA[N - 1]`.
const SCHEMA: &[(&str, &str)] = &[
    ("reports", include_str!("sql/001_create_reports.sql")),
    ("mail ledger", include_str!("sql/002_create_mail.sql")),
];

pub fn latest_version() -> u32 {
    SCHEMA.len() as u32
}

pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Applies every step above the file's current version and returns the
/// resulting version.
pub fn migrate(conn: &mut Connection) -> Result<u32, DatabaseError> {
    let current = schema_version(conn)?;
    let latest = latest_version();
    if current > latest {
        return Err(DatabaseError::NewerSchema {
            found: current,
            supported: latest,
        });
    }

    for (version, &(name, sql)) in (1u32..).zip(SCHEMA).skip(current as usize) {
        let tx = conn.transaction()?;
        tx.execute_batch(sql)
            .map_err(|source| DatabaseError::Migration {
                version,
                name,
                source,
            })?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        log::info!("Applied schema v{} ({})", version, name);
    }

    Ok(latest)
}

//! SQLite persistence for reports and the processed-mail ledger.
//!
//! Both live in one file under the data directory. Repositories are plain
//! functions over a [`Database`] handle.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

pub mod error;
pub mod mail_repo;
pub mod migrations;
pub mod report_repo;

pub use error::DatabaseError;
pub use report_repo::Report;

/// Shared handle to the store. Clones refer to the same connection, and
/// callers take turns through [`Database::conn`].
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the store at `path`, creating missing directories and bringing
    /// the schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| DatabaseError::CreateDirectory {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let mut conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let version = migrations::migrate(&mut conn)?;

        log::info!(
            "Report store at {} (schema v{})",
            path.display(),
            version
        );
        Ok(Self::wrap(conn))
    }

    /// A private store that disappears with the last handle.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let mut conn = Connection::open_in_memory()?;
        migrations::migrate(&mut conn)?;
        Ok(Self::wrap(conn))
    }

    fn wrap(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Exclusive use of the connection until the guard is dropped.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::Poisoned)
    }

    /// Runs `job` on tokio's blocking pool, keeping SQLite I/O off the
    /// async worker threads.
    pub async fn run_blocking<F, T>(&self, job: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Database) -> Result<T, DatabaseError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || job(&db))
            .await
            .map_err(|e| DatabaseError::Task(e.to_string()))?
    }
}

//! Small `DuckDB` connection pool, split by access mode.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::duckdb::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Default)]
struct Idle {
    read_only: Vec<Connection>,
    read_write: Vec<Connection>,
}

impl Idle {
    fn slot(&mut self, mode: AccessMode) -> &mut Vec<Connection> {
        match mode {
            AccessMode::ReadOnly => &mut self.read_only,
            AccessMode::ReadWrite => &mut self.read_write,
        }
    }
}

struct Pool {
    db_path: PathBuf,
    max_idle: usize,
    // first connection opened; later ones are cloned from it so they share one instance
    root: Mutex<Option<Connection>>,
    idle: Mutex<Idle>,
}

impl Pool {
    fn open(&self, mode: AccessMode) -> Result<Connection, ::duckdb::Error> {
        let mut root = self
            .root
            .lock()
            .expect("duckdb root connection mutex poisoned");
        let connection = match root.as_ref() {
            Some(existing) => existing.try_clone()?,
            None => {
                let opened = Connection::open(&self.db_path)?;
                let connection = opened.try_clone()?;
                *root = Some(opened);
                connection
            }
        };
        configure(&connection, mode)?;
        Ok(connection)
    }
}

/// Hands out connections to one database file and keeps up to `max_idle`
/// of each mode around for reuse.
#[derive(Clone)]
pub struct DuckDbConnectionManager {
    pool: Arc<Pool>,
}

impl DuckDbConnectionManager {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_idle: usize) -> Self {
        Self {
            pool: Arc::new(Pool {
                db_path: path.into(),
                max_idle: max_idle.max(1),
                root: Mutex::new(None),
                idle: Mutex::new(Idle::default()),
            }),
        }
    }

    /// Reuse an idle connection of `mode` or open a new one.
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured.
    pub fn acquire(&self, mode: AccessMode) -> Result<PooledConnection, ::duckdb::Error> {
        let reused = self
            .pool
            .idle
            .lock()
            .expect("duckdb connection pool mutex poisoned")
            .slot(mode)
            .pop();

        let connection = match reused {
            Some(connection) => connection,
            None => self.pool.open(mode)?,
        };

        Ok(PooledConnection {
            mode,
            pool: Arc::clone(&self.pool),
            connection: Some(connection),
        })
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.pool.db_path
    }
}

/// A checked-out connection, returned to the pool on drop.
pub struct PooledConnection {
    mode: AccessMode,
    pool: Arc<Pool>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection unexpectedly missing")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        let mut idle = self
            .pool
            .idle
            .lock()
            .expect("duckdb connection pool mutex poisoned");
        let slot = idle.slot(self.mode);
        if slot.len() < self.pool.max_idle {
            slot.push(connection);
        }
    }
}

fn configure(connection: &Connection, mode: AccessMode) -> Result<(), ::duckdb::Error> {
    connection.execute_batch("PRAGMA disable_progress_bar;")?;
    if mode == AccessMode::ReadOnly {
        // access_mode is fixed once the instance is open; the query layer enforces read-only
        let _ = connection.execute_batch("SET access_mode = 'READ_ONLY';");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::duckdb::ToSql;
    use tempfile::tempdir;

    #[test]
    fn returned_connections_are_reused() {
        let temp = tempdir().expect("tempdir");
        let manager = DuckDbConnectionManager::new(temp.path().join("pool.duckdb"), 1);

        {
            let connection = manager.acquire(AccessMode::ReadWrite).expect("connection");
            connection
                .execute_batch("CREATE TABLE marker (id INTEGER); INSERT INTO marker VALUES (1);")
                .expect("create marker");
        }

        let connection = manager.acquire(AccessMode::ReadWrite).expect("connection");
        let count: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM marker",
                [] as [&dyn ToSql; 0],
                |row| row.get(0),
            )
            .expect("count");
        assert_eq!(count, 1);
        assert_eq!(manager.db_path(), temp.path().join("pool.duckdb"));
    }

    #[test]
    fn read_connections_see_committed_writes() {
        let temp = tempdir().expect("tempdir");
        let manager = DuckDbConnectionManager::new(temp.path().join("shared.duckdb"), 2);

        let reader = manager.acquire(AccessMode::ReadOnly).expect("reader");
        let writer = manager.acquire(AccessMode::ReadWrite).expect("writer");
        writer
            .execute_batch("CREATE TABLE marker (id INTEGER); INSERT INTO marker VALUES (7);")
            .expect("write marker");

        let id: i32 = reader
            .query_row(
                "SELECT id FROM marker",
                [] as [&dyn ToSql; 0],
                |row| row.get(0),
            )
            .expect("read marker");
        assert_eq!(id, 7);
    }
}

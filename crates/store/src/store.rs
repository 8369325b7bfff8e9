use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use keeper_fs::FileRecord;
use log::debug;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use thiserror::Error;

use crate::schema::{RECORD_COLUMNS, apply_pragmas, create_tables};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to prepare store location {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Persistent path -> record table.
///
/// Every operation is a single autocommit statement run under the connection
/// mutex: writes are serialized, and each one is durable before it returns.
pub struct IndexStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl IndexStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        apply_pragmas(&conn)?;
        create_tables(&conn)?;

        debug!("[store] opened {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    /// Open an existing store for snapshot reads only. Writes through this
    /// handle fail with `StoreError::Sqlite`.
    pub fn open_read_only(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or fully replace the record for `record.path`.
    pub fn upsert(&self, record: &FileRecord) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO files
                (path, name, extension, size_kb, modified_at, owner, observed_delta_size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.path,
                record.name,
                record.extension,
                to_sql_int(record.size_kb),
                record.modified_at,
                record.owner,
                to_sql_int(record.observed_delta_size),
            ],
        )?;
        Ok(())
    }

    /// Remove the record for exactly `path`. Returns the number of rows removed.
    pub fn delete_exact(&self, path: &str) -> Result<usize, StoreError> {
        let n = self
            .conn()
            .execute("DELETE FROM files WHERE path = ?1", params![path])?;
        Ok(n)
    }

    /// Remove every record whose path starts with `prefix`.
    ///
    /// Matching is literal (no LIKE wildcards). An empty prefix matches nothing.
    pub fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        if prefix.is_empty() {
            return Ok(0);
        }

        let n = self
            .conn()
            .execute("DELETE FROM files WHERE instr(path, ?1) = 1", params![prefix])?;
        Ok(n)
    }

    /// Set `observed_delta_size` on an existing record, leaving every other
    /// field alone. Returns 0 when `path` is not indexed; nothing is inserted.
    pub fn update_observed_size(&self, path: &str, size_kb: u64) -> Result<usize, StoreError> {
        let n = self.conn().execute(
            "UPDATE files SET observed_delta_size = ?1 WHERE path = ?2",
            params![to_sql_int(size_kb), path],
        )?;
        Ok(n)
    }

    pub fn get(&self, path: &str) -> Result<Option<FileRecord>, StoreError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM files WHERE path = ?1");
        let record = self
            .conn()
            .query_row(&sql, params![path], record_from_row)
            .optional()?;
        Ok(record)
    }

    pub fn all_paths(&self) -> Result<HashSet<String>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT path FROM files")?;
        let paths = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(paths)
    }

    /// Full snapshot ordered by path.
    pub fn all(&self) -> Result<Vec<FileRecord>, StoreError> {
        let conn = self.conn();
        let sql = format!("SELECT {RECORD_COLUMNS} FROM files ORDER BY path");
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(n.max(0) as usize)
    }
}

fn to_sql_int(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        path: row.get(0)?,
        name: row.get(1)?,
        extension: row.get(2)?,
        size_kb: row.get::<_, i64>(3)?.max(0) as u64,
        modified_at: row.get(4)?,
        owner: row.get(5)?,
        observed_delta_size: row.get::<_, i64>(6)?.max(0) as u64,
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

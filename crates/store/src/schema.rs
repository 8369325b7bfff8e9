use rusqlite::Connection;

const CREATE_TABLES_SQL: &str = "
    CREATE TABLE IF NOT EXISTS files (
        path                TEXT PRIMARY KEY,
        name                TEXT    NOT NULL,
        extension           TEXT    NOT NULL,
        size_kb             INTEGER NOT NULL,
        modified_at         TEXT    NOT NULL,
        owner               TEXT    NOT NULL,
        observed_delta_size INTEGER NOT NULL DEFAULT 0
    ) WITHOUT ROWID;
";

/// Column order shared by every SELECT that maps rows to records.
pub const RECORD_COLUMNS: &str =
    "path, name, extension, size_kb, modified_at, owner, observed_delta_size";

/// WAL lets report readers run alongside the writer; FULL sync makes every
/// autocommit durable before the call returns.
pub fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = FULL;",
    )
}

pub fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CREATE_TABLES_SQL)
}

//! Database schema definitions.

use crate::storage::StorageError;
use crate::storage::db::SqlitePool;

/// Monitor documents, keyed by hex id.
pub const MONITORS_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS monitors (
    id         TEXT PRIMARY KEY,
    document   TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

/// Host documents, keyed by hex id.
pub const HOSTS_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS hosts (
    id         TEXT PRIMARY KEY,
    document   TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

/// Appended measurement points.
///
/// `ts` is Unix microseconds; `tags` is a JSON object.
pub const POINTS_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS points (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    ts    INTEGER NOT NULL,
    name  TEXT NOT NULL,
    tags  TEXT NOT NULL DEFAULT '{}',
    value REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_points_name_ts ON points (name, ts);
"#;

/// Create all tables if they don't exist.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), StorageError> {
    for ddl in [MONITORS_TABLE_DDL, HOSTS_TABLE_DDL, POINTS_TABLE_DDL] {
        sqlx::raw_sql(ddl).execute(pool.inner()).await?;
    }

    tracing::debug!("Database schema initialized");
    Ok(())
}

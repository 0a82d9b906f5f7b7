use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params_from_iter, Connection, TransactionBehavior};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{ContentValues, ResultSet, Row, Value};
use crate::schema_manager::SchemaManager;

/// Type alias for the database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;
/// A connection checked out of [`DbPool`]
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Connection pool tuning
#[derive(Debug, Clone, Copy)]
pub struct DatabaseOptions {
    /// Upper bound on pooled connections
    pub max_connections: u32,
    /// How long to wait for a free pooled connection
    pub connection_timeout: Duration,
    /// How long a connection waits on SQLite's write lock
    pub busy_timeout: Duration,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connection_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&DatabaseConfig> for DatabaseOptions {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            connection_timeout: Duration::from_secs(config.connection_timeout_secs),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        }
    }
}

/// Database manager for handling connections and transactions
pub struct Database {
    pool: DbPool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("state", &self.pool.state()).finish()
    }
}

impl Database {
    /// Open (creating if needed) the database at `path` with default options
    pub fn new(path: &str) -> Result<Self> {
        Self::with_options(path, DatabaseOptions::default())
    }

    /// Open the database described by the configuration
    pub fn from_config(config: &DatabaseConfig) -> Result<Arc<Self>> {
        Self::with_options(&config.path, DatabaseOptions::from(config)).map(Arc::new)
    }

    /// Open (creating if needed) the database at `path`
    pub fn with_options(path: &str, options: DatabaseOptions) -> Result<Self> {
        let path = path
            .strip_prefix("sqlite://")
            .or_else(|| path.strip_prefix("sqlite:"))
            .unwrap_or(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let busy_timeout = options.busy_timeout;
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });
        let pool = Pool::builder()
            .max_size(options.max_connections)
            .connection_timeout(options.connection_timeout)
            .build(manager)?;

        let conn = pool.get()?;
        let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!(journal_mode = %journal_mode, "Journal mode set");

        SchemaManager::create_fixed_tables(&conn)?;
        info!(path = %path, max_connections = options.max_connections, "Database opened");

        Ok(Self { pool })
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }

    /// Run `f` against a pooled connection
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.get_connection()?;
        f(&conn)
    }

    /// Run `f` inside an `IMMEDIATE` transaction
    ///
    /// The write lock is taken before `f` runs and held until commit, so
    /// every read `f` performs stays valid for the writes that follow it.
    /// Returning an error rolls the transaction back.
    pub fn write<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// Insert `values` into `table`, returning the new row id
pub(crate) fn insert_row(conn: &Connection, table: &str, values: &ContentValues) -> rusqlite::Result<i64> {
    let columns: Vec<&str> = values.iter().map(|(column, _)| column.as_str()).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!("INSERT INTO {table} ({}) VALUES ({placeholders})", columns.join(", "));

    conn.execute(&sql, params_from_iter(values.iter().map(|(_, value)| value)))?;
    Ok(conn.last_insert_rowid())
}

/// Run a select and collect every row
pub(crate) fn fetch(conn: &Connection, sql: &str, args: &[Value]) -> Result<ResultSet> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Arc<[String]> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = stmt.query(params_from_iter(args.iter()))?;
    let mut results = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..width)
            .map(|idx| row.get_ref(idx).map(Value::from))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        results.push(Row::new(Arc::clone(&columns), values));
    }

    Ok(ResultSet::new(columns, results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_database_creates_parent_and_tables() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("provider.db");
        let db = Database::new(&format!("sqlite://{}", db_path.display())).unwrap();

        assert!(db_path.exists());
        let count: i64 = db
            .read(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name LIKE 'rapidandroid_%'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn test_write_rolls_back_on_error() {
        let temp_dir = tempdir().unwrap();
        let db = Database::new(temp_dir.path().join("rollback.db").to_str().unwrap()).unwrap();

        let result: Result<()> = db.write(|conn| {
            conn.execute(
                "INSERT INTO rapidandroid_monitor (phone, alias) VALUES ('555-0000', 'x')",
                [],
            )?;
            Err(crate::error::ProviderError::UnsupportedOperation("abort".into()))
        });
        assert!(result.is_err());

        let rows = db.read(|conn| fetch(conn, "SELECT * FROM rapidandroid_monitor", &[])).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_insert_row_and_fetch() {
        let temp_dir = tempdir().unwrap();
        let db = Database::new(temp_dir.path().join("fetch.db").to_str().unwrap()).unwrap();

        let values = ContentValues::new()
            .with("id", 7)
            .with("name", "integer")
            .with("regex", r"^\d+$")
            .with("datatype", "number");
        let id = db.write(|conn| Ok(insert_row(conn, "rapidandroid_fieldtype", &values)?)).unwrap();
        assert_eq!(id, 7);

        let rows = db
            .read(|conn| fetch(conn, "SELECT name FROM rapidandroid_fieldtype WHERE id = ?", &[Value::Integer(7)]))
            .unwrap();
        assert_eq!(rows.columns(), ["name".to_string()]);
        assert_eq!(rows.first().and_then(|r| r.get("name")), Some(&Value::from("integer")));
    }
}

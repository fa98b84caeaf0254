//! Database connection manager backed by an r2d2 SQLite pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};
use timekeep_domain::{AttendanceError, DatabaseConfig, Result};
use tokio::task;
use tracing::info;

use crate::errors::{InfraError, InfraResult};

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Pooled SQLite connection.
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Database manager that owns the connection pool.
pub struct DbManager {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl DbManager {
    /// Open (or create) the database at `db_path` with up to `pool_size`
    /// connections.
    pub fn new<P: AsRef<Path>>(db_path: P, pool_size: u32) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();

        let manager = SqliteConnectionManager::file(&path).with_init(apply_connection_pragmas);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(CONNECTION_TIMEOUT)
            .build(manager)
            .map_err(|err| {
                AttendanceError::Database(format!(
                    "failed to open database {}: {err}",
                    path.display()
                ))
            })?;

        info!(
            db_path = %path.display(),
            max_connections = pool.max_size(),
            "database.pool_initialised"
        );

        Ok(Self { pool, path })
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::new(&config.path, config.pool_size)
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<DbConnection> {
        self.pool.get().map_err(|err| InfraError::from(err).into())
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        create_schema(&conn).map_err(Into::into)
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verify the database is reachable and responding.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", params![], |row| row.get::<_, i32>(0))
            .map_err(InfraError::from)?;
        Ok(())
    }

    /// Run `op` on a pooled connection off the async runtime.
    pub async fn run<T, F>(self: &Arc<Self>, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> InfraResult<T> + Send + 'static,
    {
        let db = Arc::clone(self);
        task::spawn_blocking(move || -> Result<T> {
            let mut conn = db.get_connection()?;
            op(&mut conn).map_err(Into::into)
        })
        .await
        .map_err(|err| AttendanceError::Internal(format!("database task failed: {err}")))?
    }
}

fn apply_connection_pragmas(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA foreign_keys=ON;",
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)
}

fn create_schema(conn: &Connection) -> InfraResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, CAST(strftime('%s','now') AS INTEGER))",
        params![SCHEMA_VERSION],
    )?;
    Ok(())
}

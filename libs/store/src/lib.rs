//! Connection handles for the service's storage backends.
//!
//! [`DbHandle`] wraps a SeaORM [`DatabaseConnection`] with DSN-based engine
//! detection and the usual pool knobs; [`CacheHandle`] wraps a reconnecting
//! redis connection. Both are opened by infrastructure subsystems during
//! startup and reached by the domain modules through the service hub.

pub mod cache;

pub use cache::CacheHandle;

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use thiserror::Error;

/// Library-local result type.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Typed error for the connection handles.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown DSN: {0}")]
    UnknownDsn(String),

    #[error(transparent)]
    Sea(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Supported engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbEngine {
    Postgres,
    Sqlite,
}

/// Connection options.
///
/// Each knob maps onto the corresponding SeaORM pool setting; `None` leaves
/// the driver default in place.
#[derive(Clone, Debug)]
pub struct ConnectOpts {
    /// Maximum number of connections in the pool.
    pub max_conns: Option<u32>,
    /// Minimum number of connections in the pool.
    pub min_conns: Option<u32>,
    /// Timeout to acquire a connection from the pool.
    pub acquire_timeout: Option<Duration>,
    /// Idle timeout before a connection is closed.
    pub idle_timeout: Option<Duration>,
    /// Maximum lifetime for a connection.
    pub max_lifetime: Option<Duration>,
    /// For SQLite file DSNs, create parent directories if missing.
    pub create_sqlite_dirs: bool,
}

impl Default for ConnectOpts {
    fn default() -> Self {
        Self {
            max_conns: Some(10),
            min_conns: None,
            acquire_timeout: Some(Duration::from_secs(30)),
            idle_timeout: None,
            max_lifetime: None,
            create_sqlite_dirs: true,
        }
    }
}

/// Main handle; clones share the same underlying pool.
#[derive(Clone, Debug)]
pub struct DbHandle {
    engine: DbEngine,
    dsn: String,
    conn: DatabaseConnection,
}

impl DbHandle {
    /// Detect engine by DSN.
    ///
    /// Note: we only check scheme prefixes and don't mutate the tail
    /// (credentials etc.).
    pub fn detect(dsn: &str) -> Result<DbEngine> {
        // Trim only leading spaces/newlines to be forgiving with env files.
        let s = dsn.trim_start();

        if s.starts_with("postgres://") || s.starts_with("postgresql://") {
            Ok(DbEngine::Postgres)
        } else if s.starts_with("sqlite:") {
            Ok(DbEngine::Sqlite)
        } else {
            Err(StoreError::UnknownDsn(dsn.to_string()))
        }
    }

    /// Connect and build the handle.
    pub async fn connect(dsn: &str, opts: ConnectOpts) -> Result<Self> {
        let engine = Self::detect(dsn)?;
        if engine == DbEngine::Sqlite && opts.create_sqlite_dirs {
            prepare_sqlite_dirs(dsn)?;
        }

        let mut o = ConnectOptions::new(dsn.to_string());
        if let Some(n) = opts.max_conns {
            o.max_connections(n);
        }
        if let Some(n) = opts.min_conns {
            o.min_connections(n);
        }
        if let Some(t) = opts.acquire_timeout {
            o.acquire_timeout(t);
        }
        if let Some(t) = opts.idle_timeout {
            o.idle_timeout(t);
        }
        if let Some(t) = opts.max_lifetime {
            o.max_lifetime(t);
        }
        // Per-statement logging stays off; pool events are traced here.
        o.sqlx_logging(false);

        let conn = Database::connect(o).await?;
        tracing::debug!(engine = ?engine, "database pool opened");

        Ok(Self {
            engine,
            dsn: dsn.to_string(),
            conn,
        })
    }

    /// Get the backend.
    pub fn engine(&self) -> DbEngine {
        self.engine
    }

    /// Get the DSN used for this connection.
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Get the SeaORM connection (clone; cheap handle).
    pub fn sea(&self) -> DatabaseConnection {
        self.conn.clone()
    }

    /// Round-trip liveness probe against the pool.
    pub async fn ping(&self) -> Result<()> {
        self.conn.ping().await?;
        Ok(())
    }

    /// Graceful pool close. Other clones of this handle become unusable.
    pub async fn close(&self) -> Result<()> {
        self.conn.clone().close().await?;
        Ok(())
    }
}

/// For plain sqlite file paths, create the parent directory so the driver can
/// create the database file. `:memory:` and `file:`/query URI forms have no
/// directory to prepare.
fn prepare_sqlite_dirs(dsn: &str) -> Result<()> {
    if dsn.contains(":memory:") {
        return Ok(());
    }

    let raw = if let Some(rest) = dsn.strip_prefix("sqlite://") {
        rest
    } else if let Some(rest) = dsn.strip_prefix("sqlite:") {
        rest
    } else {
        dsn
    };

    if !raw.starts_with("file:") && !raw.contains('?') {
        if let Some(parent) = std::path::Path::new(raw).parent() {
            if !parent.as_os_str().is_empty() {
                // One-time blocking call during startup; acceptable for setup paths.
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_detection() {
        assert_eq!(
            DbHandle::detect("sqlite://test.db").unwrap(),
            DbEngine::Sqlite
        );
        assert_eq!(
            DbHandle::detect("sqlite::memory:").unwrap(),
            DbEngine::Sqlite
        );
        assert_eq!(
            DbHandle::detect("postgres://localhost/test").unwrap(),
            DbEngine::Postgres
        );
        assert_eq!(
            DbHandle::detect("postgresql://localhost/test").unwrap(),
            DbEngine::Postgres
        );
        assert!(DbHandle::detect("mysql://localhost/test").is_err());
        assert!(DbHandle::detect("unknown://test").is_err());
    }

    #[test]
    fn detection_tolerates_leading_whitespace() {
        assert_eq!(
            DbHandle::detect("  sqlite://test.db").unwrap(),
            DbEngine::Sqlite
        );
    }

    #[test]
    fn sqlite_parent_dirs_created() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/dir/app.db");
        let dsn = format!("sqlite://{}", path.display());

        prepare_sqlite_dirs(&dsn).unwrap();
        assert!(path.parent().unwrap().exists());
    }

    #[test]
    fn sqlite_memory_needs_no_dirs() {
        prepare_sqlite_dirs("sqlite::memory:").unwrap();
    }

    #[tokio::test]
    async fn sqlite_connect_ping_close() -> Result<()> {
        let db = DbHandle::connect("sqlite::memory:", ConnectOpts::default()).await?;
        assert_eq!(db.engine(), DbEngine::Sqlite);
        db.ping().await?;
        db.close().await?;
        Ok(())
    }
}

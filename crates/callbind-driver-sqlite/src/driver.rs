//! SQLite driver implementation

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection as RusqliteConnection, OpenFlags};

use callbind_core::{CallError, ConnectionInfo, Driver, Result};

use crate::SqliteConnection;

/// SQLite database driver
///
/// Procedures are emulated: register a SQL body under a routine name with
/// [`with_procedure`](Self::with_procedure) and call it with `CallKind::Procedure`.
#[derive(Debug, Clone, Default)]
pub struct SqliteDriver {
    procedures: Arc<HashMap<String, String>>,
}

impl SqliteDriver {
    /// Create a new SQLite driver instance
    pub fn new() -> Self {
        tracing::debug!("SQLite driver initialized");
        Self::default()
    }

    /// Register `body` as the procedure `name`. Names are case-insensitive.
    pub fn with_procedure(mut self, name: &str, body: &str) -> Self {
        Arc::make_mut(&mut self.procedures).insert(name.to_ascii_lowercase(), body.to_string());
        self
    }

    /// Expand `~/` and make relative paths absolute
    fn expand_path(path: &str) -> Result<String> {
        if path == ":memory:" || path.starts_with("file:") {
            return Ok(path.to_string());
        }

        let expanded = if let Some(rest) = path.strip_prefix("~/") {
            let home = std::env::var_os("HOME").ok_or_else(|| {
                CallError::Configuration("Unable to determine HOME directory".into())
            })?;
            std::path::PathBuf::from(home).join(rest)
        } else {
            std::path::PathBuf::from(path)
        };

        if expanded.is_relative() {
            Ok(std::env::current_dir()?
                .join(expanded)
                .to_string_lossy()
                .to_string())
        } else {
            Ok(expanded.to_string_lossy().to_string())
        }
    }
}

impl Driver for SqliteDriver {
    type Connection = SqliteConnection;

    fn name(&self) -> &'static str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, info), fields(path = %info.data_source))]
    fn open(&self, info: &ConnectionInfo) -> Result<SqliteConnection> {
        let path = info.data_source.trim();
        if path.is_empty() {
            return Err(CallError::Connection(
                "SQLite requires a data source. Use :memory: for an in-memory database".into(),
            ));
        }

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                CallError::Connection(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            let expanded_path = Self::expand_path(path)?;
            if !expanded_path.starts_with("file:")
                && let Some(parent) = std::path::Path::new(&expanded_path).parent()
                && !parent.exists()
            {
                return Err(CallError::Connection(format!(
                    "Parent directory does not exist: {}",
                    parent.display()
                )));
            }

            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            RusqliteConnection::open_with_flags(&expanded_path, flags).map_err(|e| {
                tracing::error!(error = %e, "failed to open SQLite database");
                CallError::Connection(format!(
                    "Failed to open SQLite database at '{}': {}",
                    expanded_path, e
                ))
            })?
        };

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| CallError::Connection(format!("Failed to enable foreign keys: {}", e)))?;

        if let Some(timeout) = info.get_string("busy_timeout_ms") {
            let millis: u64 = timeout.parse().map_err(|_| {
                CallError::Configuration(format!("Invalid busy_timeout_ms '{}'", timeout))
            })?;
            conn.busy_timeout(Duration::from_millis(millis))
                .map_err(|e| CallError::Connection(format!("Failed to set busy timeout: {}", e)))?;
        }

        tracing::info!(path = %path, "SQLite connection established");
        Ok(SqliteConnection::new(conn, Arc::clone(&self.procedures)))
    }
}

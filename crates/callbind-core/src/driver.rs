//! Database driver trait and connection configuration

use crate::{CallError, Connection, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Core driver trait that database drivers implement
///
/// A driver only knows how to open connections. Everything after that goes
/// through the [`Connection`] it hands back, which the caller owns exclusively.
pub trait Driver {
    type Connection: Connection;

    /// Unique identifier for this driver (e.g., "sqlite")
    fn name(&self) -> &'static str;

    /// Open a new connection.
    ///
    /// Fails with [`CallError::Connection`] when the database cannot be reached.
    fn open(&self, info: &ConnectionInfo) -> Result<Self::Connection>;
}

/// Connection configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Driver ID (e.g., "sqlite"); empty when parsed from a bare connection string
    #[serde(default)]
    pub driver: String,
    /// Data source: network alias, host/service or file path
    pub data_source: String,
    /// Username
    #[serde(default)]
    pub user: Option<String>,
    /// Password
    #[serde(default)]
    pub password: Option<String>,
    /// Additional driver-specific parameters
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl ConnectionInfo {
    /// Create a configuration for the given driver and data source
    pub fn new(driver: &str, data_source: &str) -> Self {
        Self {
            driver: driver.to_string(),
            data_source: data_source.to_string(),
            ..Self::default()
        }
    }

    /// Create a SQLite configuration
    pub fn new_sqlite(database_path: &str) -> Self {
        Self::new("sqlite", database_path)
    }

    /// Set the credentials
    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        self.user = Some(user.to_string());
        self.password = Some(password.to_string());
        self
    }

    /// Set a connection parameter
    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        let str_val = match value.into() {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        self.params.insert(key.to_string(), str_val);
        self
    }

    /// Get a string parameter
    pub fn get_string(&self, key: &str) -> Option<String> {
        if let Some(val) = self.params.get(key) {
            return Some(val.clone());
        }
        match key {
            "data_source" | "path" => Some(self.data_source.clone()),
            "user" | "username" => self.user.clone(),
            "password" => self.password.clone(),
            _ => None,
        }
    }

    /// Build a classic `User Id=..;Password=..;Data Source=..` connection string
    pub fn form_connection_string(user: &str, password: &str, data_source: &str) -> String {
        format!(
            "User Id={};Password={};Data Source={}",
            user, password, data_source
        )
    }

    /// Render this configuration as a connection string
    pub fn to_connection_string(&self) -> String {
        let mut parts = Vec::new();
        if let Some(user) = &self.user {
            parts.push(format!("User Id={}", user));
        }
        if let Some(password) = &self.password {
            parts.push(format!("Password={}", password));
        }
        parts.push(format!("Data Source={}", self.data_source));
        for (key, value) in &self.params {
            parts.push(format!("{}={}", key, value));
        }
        parts.join(";")
    }

    /// Parse a `key=value;key=value` connection string.
    ///
    /// Keys are case-insensitive. `User Id`, `Password` and `Data Source` map to
    /// their fields, anything else is kept in `params`.
    pub fn parse(conn_str: &str) -> Result<Self> {
        let mut info = Self::default();
        let mut has_source = false;

        for part in conn_str.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(CallError::Configuration(format!(
                    "Malformed connection string segment '{}'",
                    part
                )));
            };
            let value = value.trim().to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "user id" | "user" | "uid" => info.user = Some(value),
                "password" | "pwd" => info.password = Some(value),
                "data source" | "datasource" => {
                    info.data_source = value;
                    has_source = true;
                }
                "driver" => info.driver = value,
                other => {
                    info.params.insert(other.to_string(), value);
                }
            }
        }

        if !has_source {
            return Err(CallError::Configuration(
                "Connection string has no Data Source".into(),
            ));
        }
        Ok(info)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading connection file");
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_form_connection_string() {
        assert_eq!(
            ConnectionInfo::form_connection_string("hr", "hr", "localhost:1521/xe"),
            "User Id=hr;Password=hr;Data Source=localhost:1521/xe"
        );
    }

    #[test]
    fn test_parse_round_trips_formed_string() {
        let text = ConnectionInfo::form_connection_string("hr", "secret", "localhost:1521/xe");
        let info = ConnectionInfo::parse(&text).unwrap();

        assert_eq!(info.user.as_deref(), Some("hr"));
        assert_eq!(info.password.as_deref(), Some("secret"));
        assert_eq!(info.data_source, "localhost:1521/xe");
        assert_eq!(info.to_connection_string(), text);
    }

    #[test]
    fn test_parse_keeps_unknown_keys() {
        let info = ConnectionInfo::parse("data source=app.db; Pooling=false").unwrap();
        assert_eq!(info.data_source, "app.db");
        assert_eq!(info.get_string("pooling").as_deref(), Some("false"));
    }

    #[test]
    fn test_parse_rejects_missing_source() {
        let err = ConnectionInfo::parse("User Id=hr;Password=hr").unwrap_err();
        assert!(matches!(err, CallError::Configuration(_)));
    }

    #[test]
    fn test_parse_rejects_malformed_segment() {
        let err = ConnectionInfo::parse("Data Source=x;oops").unwrap_err();
        assert!(err.to_string().contains("oops"));
    }

    #[test]
    fn test_with_param_stringifies_values() {
        let info = ConnectionInfo::new_sqlite(":memory:")
            .with_param("busy_timeout", 500)
            .with_param("mode", "rw");
        assert_eq!(info.params["busy_timeout"], "500");
        assert_eq!(info.params["mode"], "rw");
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conn.toml");
        std::fs::write(
            &path,
            r#"
driver = "sqlite"
data_source = "hr.db"
user = "hr"

[params]
busy_timeout = "250"
"#,
        )
        .unwrap();

        let info = ConnectionInfo::load(&path).unwrap();
        assert_eq!(info.driver, "sqlite");
        assert_eq!(info.data_source, "hr.db");
        assert_eq!(info.user.as_deref(), Some("hr"));
        assert_eq!(info.password, None);
        assert_eq!(info.params["busy_timeout"], "250");
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = ConnectionInfo::from_toml_str("data_source = ").unwrap_err();
        assert!(matches!(err, CallError::ConnectionFile(_)));
    }
}

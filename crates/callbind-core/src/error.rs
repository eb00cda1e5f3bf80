//! Error types for callbind

use thiserror::Error;

/// Error raised by any stage of a database call.
///
/// Every variant is surfaced to the caller as-is. Nothing in the call layer
/// retries or swallows these.
#[derive(Error, Debug)]
pub enum CallError {
    /// The parameter, return-value or binding API was misused.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The driver could not open the connection or prepare the command.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The execution method does not match the configured call kind.
    #[error("Call kind error: {0}")]
    CallKind(String),

    /// An operation was attempted outside the state it is legal in.
    #[error("Not connected: {operation} is not valid while the call is {state}")]
    NotConnected {
        operation: &'static str,
        state: String,
    },

    /// Typed execution was requested with auto-bind off and no bindings.
    #[error("No output bindings are set (call add_binding or enable auto-bind)")]
    NoBindings,

    /// A binding references a column missing from the live result set.
    #[error("Cannot bind column {0}: not in the result set")]
    UnknownColumn(String),

    /// A binding references a field missing from the target record type.
    #[error("Field {0} does not exist on the record type bound to the call")]
    UnknownField(String),

    /// Two bindings compete for the same field or the same column.
    #[error("Ambiguous binding: {0}")]
    AmbiguousBinding(String),

    /// A value could not be coerced to the destination type.
    #[error(
        "Type mismatch on {}: cannot convert {source_type} to {target_type}: {diagnostic}",
        .column.as_deref().unwrap_or("value")
    )]
    TypeMismatch {
        column: Option<String>,
        source_type: String,
        target_type: String,
        diagnostic: String,
    },

    /// The driver failed while running an already prepared command.
    #[error("Driver error: {0}")]
    Driver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid connection file: {0}")]
    ConnectionFile(#[from] toml::de::Error),
}

impl CallError {
    /// Build a [`CallError::TypeMismatch`] for a value that is not tied to a column.
    pub fn type_mismatch(
        source_type: impl Into<String>,
        target_type: impl Into<String>,
        diagnostic: impl Into<String>,
    ) -> Self {
        CallError::TypeMismatch {
            column: None,
            source_type: source_type.into(),
            target_type: target_type.into(),
            diagnostic: diagnostic.into(),
        }
    }

    /// Attach the column name to a type mismatch. Other variants pass through.
    pub fn in_column(self, name: &str) -> Self {
        match self {
            CallError::TypeMismatch {
                source_type,
                target_type,
                diagnostic,
                ..
            } => CallError::TypeMismatch {
                column: Some(name.to_string()),
                source_type,
                target_type,
                diagnostic,
            },
            other => other,
        }
    }
}

/// Result type alias for callbind operations
pub type Result<T> = std::result::Result<T, CallError>;

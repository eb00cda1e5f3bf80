//! Call kinds, parameter directions and declared parameter types

use crate::Value;
use serde::{Deserialize, Serialize};

/// What kind of statement a call issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    /// Free-form SQL that returns rows
    Query,
    /// Free-form SQL that does not return rows
    Command,
    /// Named stored procedure, may return rows through an output cursor
    Procedure,
    /// Named stored function with a scalar return value
    Function,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Query => "query",
            CallKind::Command => "command",
            CallKind::Procedure => "procedure",
            CallKind::Function => "function",
        }
    }
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a call parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    In,
    Out,
    InOut,
    ReturnValue,
}

impl Direction {
    /// In and InOut parameters must carry a value
    pub fn requires_value(&self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }

    /// Whether the database writes a value back into this parameter
    pub fn is_output(&self) -> bool {
        !matches!(self, Direction::In)
    }
}

/// Declared database type of a call parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DbType {
    Char,
    Varchar,
    NVarchar,
    Clob,
    Int16,
    Int32,
    Int64,
    Decimal,
    Single,
    Double,
    Boolean,
    Date,
    Timestamp,
    TimestampTz,
    Raw,
    Blob,
    Json,
    /// Output cursor; describes its own shape, so never needs a size
    Cursor,
}

impl DbType {
    pub fn is_cursor(&self) -> bool {
        matches!(self, DbType::Cursor)
    }

    /// Date/time types accept only temporal values as input
    pub fn is_temporal(&self) -> bool {
        matches!(self, DbType::Date | DbType::Timestamp | DbType::TimestampTz)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, DbType::Int16 | DbType::Int32 | DbType::Int64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, DbType::Decimal | DbType::Single | DbType::Double)
    }
}

/// A parameter as staged for the driver
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub db_type: DbType,
    pub direction: Direction,
    /// Present for In and InOut parameters
    pub value: Option<Value>,
    /// Buffer size for output parameters
    pub size: Option<u32>,
}

//! Connection, command and cursor traits

use crate::{CallKind, Parameter, Result, Value};

/// An open database connection
///
/// All operations block. A connection drives a single in-flight command and
/// is not meant to be shared across threads.
pub trait Connection {
    type Command: Command;
    type Cursor: Cursor;

    /// Get the driver name (e.g., "sqlite")
    fn driver_name(&self) -> &str;

    /// Prepare a command for the given call kind.
    ///
    /// For `Query`/`Command` the statement is SQL text; for `Procedure`/`Function`
    /// it names the routine. Fails with `CallError::Connection` if the driver
    /// cannot prepare it.
    fn prepare(&mut self, statement: &str, kind: CallKind) -> Result<Self::Command>;

    /// Run a row-returning command and hand back its cursor
    fn execute_reader(&mut self, command: &mut Self::Command) -> Result<Self::Cursor>;

    /// Run a command without reading rows, returning the affected row count.
    ///
    /// Function calls publish their return value through
    /// [`Command::parameter_value`].
    fn execute_non_query(&mut self, command: &mut Self::Command) -> Result<u64>;

    /// Close the connection
    fn close(&mut self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// A prepared command with its bound parameters
pub trait Command {
    /// Bind a parameter by name
    fn bind_parameter(&mut self, parameter: &Parameter) -> Result<()>;

    /// Value written back by the database for an output or return-value
    /// parameter. `None` until the command has run.
    fn parameter_value(&self, name: &str) -> Option<&Value>;
}

/// Forward-only row cursor over a result set
pub trait Cursor {
    /// Column names in result order
    fn column_names(&self) -> &[String];

    /// Advance to the next row. Returns `false` once the rows are exhausted.
    fn next_row(&mut self) -> Result<bool>;

    /// Value of the current row at `index`; SQL NULL is [`Value::Null`]
    fn value_at(&self, index: usize) -> Result<Value>;
}

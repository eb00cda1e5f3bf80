//! Call execution
//!
//! A [`CallExecutor`] owns one call from configuration to release. It drives a
//! single connection and a single prepared command through
//! `Unconfigured → Connected → Executed → Closed`, with `Failed` reachable
//! from any step that talks to the database.

use uuid::Uuid;

use callbind_core::{
    CallError, CallKind, Command, Connection, ConnectionInfo, Cursor, DbType, Direction, Driver,
    Result, Value,
};

use crate::binder::ResultBinder;
use crate::binding::BindingTable;
use crate::coerce;
use crate::parameters::{ParameterSet, RETURN_VALUE_NAME};
use crate::record::{FieldValue, Record, convert};

/// What to call: the call kind and its statement text or routine name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    kind: CallKind,
    statement: String,
}

impl CallSpec {
    pub fn new(kind: CallKind, statement: impl Into<String>) -> Self {
        Self {
            kind,
            statement: statement.into(),
        }
    }

    pub fn query(sql: impl Into<String>) -> Self {
        Self::new(CallKind::Query, sql)
    }

    pub fn command(sql: impl Into<String>) -> Self {
        Self::new(CallKind::Command, sql)
    }

    pub fn procedure(name: impl Into<String>) -> Self {
        Self::new(CallKind::Procedure, name)
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self::new(CallKind::Function, name)
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }
}

/// Lifecycle state of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Unconfigured,
    Connected,
    Executed,
    Closed,
    Failed,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Unconfigured => "unconfigured",
            CallState::Connected => "connected",
            CallState::Executed => "executed",
            CallState::Closed => "closed",
            CallState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

type CommandOf<D> = <<D as Driver>::Connection as Connection>::Command;

/// One database call
///
/// Configure parameters and bindings, [`connect`](Self::connect), then run
/// exactly one of the `execute*` methods. The connection is released on
/// [`close`](Self::close) or when the executor is dropped, whichever comes
/// first.
pub struct CallExecutor<D: Driver> {
    id: Uuid,
    driver: D,
    spec: CallSpec,
    parameters: ParameterSet,
    bindings: BindingTable,
    auto_bind: bool,
    state: CallState,
    connection: Option<D::Connection>,
    command: Option<CommandOf<D>>,
}

impl<D: Driver> CallExecutor<D> {
    pub fn new(driver: D, spec: CallSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            driver,
            spec,
            parameters: ParameterSet::new(),
            bindings: BindingTable::new(),
            auto_bind: true,
            state: CallState::Unconfigured,
            connection: None,
            command: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn spec(&self) -> &CallSpec {
        &self.spec
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn auto_bind(&self) -> bool {
        self.auto_bind
    }

    fn transition(&mut self, next: CallState) {
        tracing::debug!(call_id = %self.id, from = %self.state, to = %next, "call state changed");
        self.state = next;
    }

    fn not_valid(&self, operation: &'static str) -> CallError {
        CallError::NotConnected {
            operation,
            state: self.state.to_string(),
        }
    }

    fn ensure_configurable(&self, operation: &'static str) -> Result<()> {
        match self.state {
            CallState::Unconfigured | CallState::Connected => Ok(()),
            _ => Err(self.not_valid(operation)),
        }
    }

    fn ensure_connected(&self, operation: &'static str) -> Result<()> {
        if self.state == CallState::Connected {
            Ok(())
        } else {
            Err(self.not_valid(operation))
        }
    }

    fn ensure_kind(&self, allowed: bool, operation: &str) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(CallError::CallKind(format!(
                "{} cannot be used on a {} call",
                operation, self.spec.kind
            )))
        }
    }

    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        db_type: DbType,
        direction: Direction,
        value: Option<Value>,
        size: Option<u32>,
    ) -> Result<()> {
        self.ensure_configurable("add_parameter")?;
        self.parameters
            .add_parameter(name, db_type, direction, value, size)
    }

    pub fn add_input(
        &mut self,
        name: impl Into<String>,
        db_type: DbType,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.ensure_configurable("add_input")?;
        self.parameters.add_input(name, db_type, value)
    }

    pub fn add_output(&mut self, name: impl Into<String>, db_type: DbType, size: u32) -> Result<()> {
        self.ensure_configurable("add_output")?;
        self.parameters.add_output(name, db_type, size)
    }

    /// Stage the return value. Must precede every other parameter.
    pub fn add_return_value(&mut self, db_type: DbType, size: Option<u32>) -> Result<()> {
        // An ordering mistake is reported as such in every state
        if !self.parameters.is_empty() {
            return self.parameters.add_return_value(db_type, size);
        }
        self.ensure_configurable("add_return_value")?;
        self.parameters.add_return_value(db_type, size)
    }

    pub fn add_binding(&mut self, column: impl Into<String>, field: impl Into<String>) -> Result<()> {
        self.ensure_configurable("add_binding")?;
        self.bindings.add_binding(column, field);
        Ok(())
    }

    /// Turn name-based matching of unbound columns on or off. On by default.
    pub fn set_auto_bind(&mut self, enabled: bool) -> Result<()> {
        self.ensure_configurable("set_auto_bind")?;
        self.auto_bind = enabled;
        Ok(())
    }

    /// Open the connection and prepare the command for this call's kind
    #[tracing::instrument(skip(self, info), fields(call_id = %self.id, kind = %self.spec.kind, driver = self.driver.name()))]
    pub fn connect(&mut self, info: &ConnectionInfo) -> Result<()> {
        if self.state != CallState::Unconfigured {
            return Err(self.not_valid("connect"));
        }

        let mut connection = match self.driver.open(info) {
            Ok(connection) => connection,
            Err(e) => {
                self.transition(CallState::Failed);
                return Err(as_connection_error(e));
            }
        };

        let command = match connection.prepare(&self.spec.statement, self.spec.kind) {
            Ok(command) => command,
            Err(e) => {
                if let Err(close_err) = connection.close() {
                    tracing::warn!(call_id = %self.id, error = %close_err, "failed to close connection after prepare error");
                }
                self.transition(CallState::Failed);
                return Err(as_connection_error(e));
            }
        };

        self.connection = Some(connection);
        self.command = Some(command);
        self.transition(CallState::Connected);
        Ok(())
    }

    /// Run the call and return the first column of every row as text
    #[tracing::instrument(skip(self), fields(call_id = %self.id))]
    pub fn execute(&mut self) -> Result<Vec<String>> {
        self.ensure_connected("execute")?;
        self.ensure_kind(self.spec.kind != CallKind::Function, "execute")?;

        let outcome = self.read_first_column();
        self.settle(outcome)
    }

    /// Run the call and bind every row into a `T`
    #[tracing::instrument(skip(self), fields(call_id = %self.id, record = std::any::type_name::<T>()))]
    pub fn execute_typed<T: Record>(&mut self) -> Result<Vec<T>> {
        self.ensure_connected("execute_typed")?;
        self.ensure_kind(self.spec.kind != CallKind::Function, "execute_typed")?;
        if !self.auto_bind && self.bindings.is_empty() {
            return Err(CallError::NoBindings);
        }
        self.bindings.validate()?;

        let outcome = self.read_records::<T>();
        self.settle(outcome)
    }

    /// Run a function call and convert its return value to `T`
    #[tracing::instrument(skip(self), fields(call_id = %self.id))]
    pub fn execute_function<T: FieldValue>(&mut self) -> Result<T> {
        self.ensure_connected("execute_function")?;
        self.ensure_kind(self.spec.kind == CallKind::Function, "execute_function")?;
        if self.parameters.return_value().is_none() {
            return Err(CallError::Configuration(
                "A function call needs a return value; call add_return_value first".into(),
            ));
        }

        let outcome = self.read_return_value::<T>();
        self.settle(outcome)
    }

    /// Run the call without reading rows and return the affected row count
    #[tracing::instrument(skip(self), fields(call_id = %self.id))]
    pub fn execute_non_query(&mut self) -> Result<u64> {
        self.ensure_connected("execute_non_query")?;
        self.ensure_kind(self.spec.kind != CallKind::Function, "execute_non_query")?;

        let outcome = self.run_non_query();
        self.settle(outcome)
    }

    /// Value the database wrote back into an output or return-value parameter
    pub fn output_value<T: FieldValue>(&self, name: &str) -> Result<T> {
        if self.state != CallState::Executed {
            return Err(self.not_valid("output_value"));
        }
        match self.parameters.get(name) {
            Some(p) if p.direction.is_output() => {}
            Some(_) => {
                return Err(CallError::Configuration(format!(
                    "Parameter {} is an input parameter",
                    name
                )));
            }
            None => {
                return Err(CallError::Configuration(format!(
                    "Parameter {} was never added",
                    name
                )));
            }
        }

        let value = self
            .command
            .as_ref()
            .and_then(|command| command.parameter_value(name))
            .ok_or_else(|| CallError::Driver(format!("No value was returned for parameter {}", name)))?;
        convert(value).map_err(|e| e.in_column(name))
    }

    /// Release the command and connection. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.state == CallState::Closed {
            return Ok(());
        }
        let result = self.release();
        self.transition(CallState::Closed);
        result
    }

    fn release(&mut self) -> Result<()> {
        self.command = None;
        match self.connection.take() {
            Some(mut connection) if !connection.is_closed() => connection.close(),
            _ => Ok(()),
        }
    }

    fn settle<R>(&mut self, outcome: Result<R>) -> Result<R> {
        match &outcome {
            Ok(_) => self.transition(CallState::Executed),
            Err(e) => {
                tracing::debug!(call_id = %self.id, error = %e, "call failed");
                self.transition(CallState::Failed);
            }
        }
        outcome
    }

    fn bound_command(&mut self) -> Result<(&mut D::Connection, &mut CommandOf<D>)> {
        let (Some(connection), Some(command)) = (self.connection.as_mut(), self.command.as_mut())
        else {
            return Err(CallError::NotConnected {
                operation: "execute",
                state: self.state.to_string(),
            });
        };
        for parameter in self.parameters.iter() {
            command.bind_parameter(parameter)?;
        }
        Ok((connection, command))
    }

    fn read_first_column(&mut self) -> Result<Vec<String>> {
        let (connection, command) = self.bound_command()?;
        let mut cursor = connection.execute_reader(command)?;

        let Some(first) = cursor.column_names().first().cloned() else {
            while cursor.next_row()? {}
            return Ok(Vec::new());
        };

        let mut rows = Vec::new();
        while cursor.next_row()? {
            let value = cursor.value_at(0)?;
            if value.is_null() {
                return Err(
                    CallError::type_mismatch("NULL", "String", "value is NULL").in_column(&first)
                );
            }
            let text = coerce::to_string(&value).map_err(|diagnostic| {
                CallError::type_mismatch(value.kind().to_string(), "String", diagnostic)
                    .in_column(&first)
            })?;
            rows.push(text);
        }
        Ok(rows)
    }

    fn read_records<T: Record>(&mut self) -> Result<Vec<T>> {
        let auto_bind = self.auto_bind;
        let mut resolved = self.bindings.clone();

        let (connection, command) = self.bound_command()?;
        let mut cursor = connection.execute_reader(command)?;
        let columns = cursor.column_names().to_vec();

        resolved.validate_against_columns(&columns)?;
        let schema = T::schema();
        if auto_bind {
            resolved.auto_fill(&columns, &schema.field_names());
        }

        let binder = ResultBinder::new(&schema, &resolved, &columns)?;
        tracing::debug!(
            columns = columns.len(),
            bound = binder.bound_columns(),
            "binding result set"
        );
        binder.bind_all(&mut cursor)
    }

    fn read_return_value<T: FieldValue>(&mut self) -> Result<T> {
        let (connection, command) = self.bound_command()?;
        connection.execute_non_query(command)?;
        let value = command.parameter_value(RETURN_VALUE_NAME).ok_or_else(|| {
            CallError::Driver("The function call did not produce a return value".into())
        })?;
        convert(value)
    }

    fn run_non_query(&mut self) -> Result<u64> {
        let (connection, command) = self.bound_command()?;
        let affected = connection.execute_non_query(command)?;
        tracing::debug!(affected, "non-query executed");
        Ok(affected)
    }
}

impl<D: Driver> Drop for CallExecutor<D> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(call_id = %self.id, error = %e, "failed to close connection on drop");
        }
    }
}

/// Opening and preparing only ever fail as connection errors
fn as_connection_error(error: CallError) -> CallError {
    match error {
        CallError::Connection(_) => error,
        other => CallError::Connection(other.to_string()),
    }
}

#[cfg(test)]
mod tests;

//! Scripted in-memory driver
//!
//! Plays back a fixed result set and output values so the call layer can be
//! exercised without a database. Every driver interaction is recorded in a
//! shared [`CallLog`] that tests can inspect after the call is gone.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use callbind_core::{
    CallError, CallKind, Command, Connection, ConnectionInfo, Cursor, Driver, Parameter, Result,
    Value,
};

/// What the scripted database answers with
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Values published for output and return-value parameters after execution
    pub outputs: HashMap<String, Value>,
    pub affected_rows: u64,
    pub fail_open: Option<String>,
    pub fail_prepare: Option<String>,
    pub fail_execute: Option<String>,
}

/// Record of everything the call layer asked the driver to do
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub opened: usize,
    pub closed: usize,
    pub prepared: Vec<(String, CallKind)>,
    pub bound: Vec<Parameter>,
    pub readers: usize,
    pub non_queries: usize,
    pub rows_fetched: usize,
}

impl CallLog {
    pub fn executions(&self) -> usize {
        self.readers + self.non_queries
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    script: Script,
    log: Arc<Mutex<CallLog>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer row-returning calls with the given result set
    pub fn with_result(mut self, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        self.script.columns = columns.iter().map(|c| c.to_string()).collect();
        self.script.rows = rows;
        self
    }

    pub fn with_output(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.script.outputs.insert(name.to_string(), value.into());
        self
    }

    pub fn with_affected_rows(mut self, count: u64) -> Self {
        self.script.affected_rows = count;
        self
    }

    pub fn failing_open(mut self, message: &str) -> Self {
        self.script.fail_open = Some(message.to_string());
        self
    }

    pub fn failing_prepare(mut self, message: &str) -> Self {
        self.script.fail_prepare = Some(message.to_string());
        self
    }

    pub fn failing_execute(mut self, message: &str) -> Self {
        self.script.fail_execute = Some(message.to_string());
        self
    }

    /// Snapshot of the interactions so far
    pub fn log(&self) -> CallLog {
        self.log.lock().clone()
    }
}

impl Driver for ScriptedDriver {
    type Connection = ScriptedConnection;

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn open(&self, info: &ConnectionInfo) -> Result<ScriptedConnection> {
        if let Some(message) = &self.script.fail_open {
            return Err(CallError::Connection(format!(
                "Failed to open '{}': {}",
                info.data_source, message
            )));
        }
        self.log.lock().opened += 1;
        Ok(ScriptedConnection {
            script: self.script.clone(),
            log: Arc::clone(&self.log),
            closed: false,
        })
    }
}

pub struct ScriptedConnection {
    script: Script,
    log: Arc<Mutex<CallLog>>,
    closed: bool,
}

impl ScriptedConnection {
    fn run(&self, command: &mut ScriptedCommand) -> Result<()> {
        if let Some(message) = &self.script.fail_execute {
            return Err(CallError::Driver(format!(
                "Failed to execute '{}': {}",
                command.statement, message
            )));
        }
        command.outputs = self.script.outputs.clone();
        Ok(())
    }
}

impl Connection for ScriptedConnection {
    type Command = ScriptedCommand;
    type Cursor = ScriptedCursor;

    fn driver_name(&self) -> &str {
        "scripted"
    }

    fn prepare(&mut self, statement: &str, kind: CallKind) -> Result<ScriptedCommand> {
        if let Some(message) = &self.script.fail_prepare {
            return Err(CallError::Connection(format!(
                "Failed to prepare '{}': {}",
                statement, message
            )));
        }
        self.log.lock().prepared.push((statement.to_string(), kind));
        Ok(ScriptedCommand {
            statement: statement.to_string(),
            outputs: HashMap::new(),
            log: Arc::clone(&self.log),
        })
    }

    fn execute_reader(&mut self, command: &mut ScriptedCommand) -> Result<ScriptedCursor> {
        self.run(command)?;
        self.log.lock().readers += 1;
        let mut cursor = ScriptedCursor::new(self.script.columns.clone(), self.script.rows.clone());
        cursor.log = Some(Arc::clone(&self.log));
        Ok(cursor)
    }

    fn execute_non_query(&mut self, command: &mut ScriptedCommand) -> Result<u64> {
        self.run(command)?;
        self.log.lock().non_queries += 1;
        Ok(self.script.affected_rows)
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.log.lock().closed += 1;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

pub struct ScriptedCommand {
    statement: String,
    outputs: HashMap<String, Value>,
    log: Arc<Mutex<CallLog>>,
}

impl Command for ScriptedCommand {
    fn bind_parameter(&mut self, parameter: &Parameter) -> Result<()> {
        self.log.lock().bound.push(parameter.clone());
        Ok(())
    }

    fn parameter_value(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }
}

/// Cursor over an in-memory row set
pub struct ScriptedCursor {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    position: Option<usize>,
    log: Option<Arc<Mutex<CallLog>>>,
}

impl ScriptedCursor {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            position: None,
            log: None,
        }
    }
}

impl Cursor for ScriptedCursor {
    fn column_names(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<bool> {
        let next = self.position.map_or(0, |p| p + 1);
        if next >= self.rows.len() {
            self.position = Some(self.rows.len());
            return Ok(false);
        }
        self.position = Some(next);
        if let Some(log) = &self.log {
            log.lock().rows_fetched += 1;
        }
        Ok(true)
    }

    fn value_at(&self, index: usize) -> Result<Value> {
        let row = self
            .position
            .and_then(|p| self.rows.get(p))
            .ok_or_else(|| CallError::Driver("Cursor is not positioned on a row".into()))?;
        row.get(index)
            .cloned()
            .ok_or_else(|| CallError::Driver(format!("Column index {} out of range", index)))
    }
}

//! SQLite connection implementation

use std::collections::HashMap;
use std::sync::Arc;

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection as RusqliteConnection, Statement};

use callbind_core::{
    CallError, CallKind, Command, Connection, Cursor, Direction, Parameter, Result, Value,
};

use crate::convert::{rusqlite_to_value, value_to_rusqlite};

/// Placeholder prefixes tried, in order, when binding a parameter by name
const NAME_PREFIXES: [&str; 3] = [":", "@", "$"];

/// SQLite connection wrapper
pub struct SqliteConnection {
    conn: Option<RusqliteConnection>,
    procedures: Arc<HashMap<String, String>>,
}

impl SqliteConnection {
    pub(crate) fn new(conn: RusqliteConnection, procedures: Arc<HashMap<String, String>>) -> Self {
        Self {
            conn: Some(conn),
            procedures,
        }
    }

    fn conn(&self) -> Result<&RusqliteConnection> {
        self.conn
            .as_ref()
            .ok_or_else(|| CallError::Driver("Connection is closed".into()))
    }

    /// Run a function call as `SELECT name(?1, ...)` and publish the result
    /// under the return-value parameter's name
    fn call_function(&self, command: &mut SqliteCommand) -> Result<u64> {
        let inputs: Vec<&Parameter> = command
            .parameters
            .iter()
            .filter(|p| p.direction.requires_value())
            .collect();
        let placeholders = (1..=inputs.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {}({})", command.sql, placeholders);

        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&sql).map_err(|e| {
            CallError::Driver(format!("Failed to call function {}: {}", command.sql, e))
        })?;
        for (position, parameter) in inputs.iter().enumerate() {
            let value = bound_value(parameter)?;
            stmt.raw_bind_parameter(position + 1, value).map_err(|e| {
                CallError::Driver(format!("Failed to bind {}: {}", parameter.name, e))
            })?;
        }

        let mut rows = stmt.raw_query();
        let result = match rows
            .next()
            .map_err(|e| CallError::Driver(format!("Failed to call function {}: {}", command.sql, e)))?
        {
            Some(row) => {
                let cell = row
                    .get_ref(0)
                    .map_err(|e| CallError::Driver(e.to_string()))?;
                rusqlite_to_value(cell, None)
            }
            None => Value::Null,
        };

        let return_name = command
            .parameters
            .iter()
            .find(|p| p.direction == Direction::ReturnValue)
            .map(|p| p.name.clone());
        command.outputs.clear();
        if let Some(name) = return_name {
            command.outputs.insert(name, result);
        }
        Ok(0)
    }
}

impl Connection for SqliteConnection {
    type Command = SqliteCommand;
    type Cursor = SqliteCursor;

    fn driver_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self))]
    fn prepare(&mut self, statement: &str, kind: CallKind) -> Result<SqliteCommand> {
        let sql = match kind {
            CallKind::Query | CallKind::Command => statement.to_string(),
            CallKind::Procedure => self
                .procedures
                .get(&statement.to_ascii_lowercase())
                .cloned()
                .ok_or_else(|| {
                    CallError::Connection(format!("Unknown procedure '{}'", statement))
                })?,
            CallKind::Function => {
                if !is_routine_name(statement) {
                    return Err(CallError::Connection(format!(
                        "Invalid function name '{}'",
                        statement
                    )));
                }
                statement.to_string()
            }
        };

        // Functions are compiled at call time, once the argument count is known
        if kind != CallKind::Function {
            self.conn()?.prepare_cached(&sql).map_err(|e| {
                CallError::Connection(format!("Failed to prepare '{}': {}", statement, e))
            })?;
        }

        Ok(SqliteCommand {
            kind,
            sql,
            parameters: Vec::new(),
            outputs: HashMap::new(),
        })
    }

    #[tracing::instrument(skip(self, command), fields(sql_preview = %command.sql.chars().take(100).collect::<String>()))]
    fn execute_reader(&mut self, command: &mut SqliteCommand) -> Result<SqliteCursor> {
        if command.kind == CallKind::Function {
            return Err(CallError::Driver(
                "Function calls return a value, not rows".into(),
            ));
        }

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached(&command.sql)
            .map_err(|e| CallError::Driver(format!("Failed to prepare query: {}", e)))?;
        bind_named(&mut stmt, &command.parameters)?;

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let decl_types = declared_types(&stmt);

        let mut rows = Vec::new();
        let mut query_rows = stmt.raw_query();
        while let Some(row) = query_rows
            .next()
            .map_err(|e| CallError::Driver(format!("Failed to fetch row: {}", e)))?
        {
            let mut values = Vec::with_capacity(columns.len());
            for (index, decl_type) in decl_types.iter().enumerate() {
                let cell = row
                    .get_ref(index)
                    .map_err(|e| CallError::Driver(e.to_string()))?;
                values.push(rusqlite_to_value(cell, decl_type.as_deref()));
            }
            rows.push(values);
        }

        command.outputs.clear();
        tracing::debug!(row_count = rows.len(), "query executed");
        Ok(SqliteCursor::new(columns, rows))
    }

    #[tracing::instrument(skip(self, command), fields(sql_preview = %command.sql.chars().take(100).collect::<String>()))]
    fn execute_non_query(&mut self, command: &mut SqliteCommand) -> Result<u64> {
        if command.kind == CallKind::Function {
            return self.call_function(command);
        }

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached(&command.sql)
            .map_err(|e| CallError::Driver(format!("Failed to prepare statement: {}", e)))?;
        bind_named(&mut stmt, &command.parameters)?;
        command.outputs.clear();

        if stmt.column_count() == 0 {
            let affected = stmt
                .raw_execute()
                .map_err(|e| CallError::Driver(format!("Failed to execute statement: {}", e)))?;
            tracing::debug!(affected_rows = affected, "statement executed");
            return Ok(affected as u64);
        }

        // Output parameters are filled from same-named columns of the first row
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let decl_types = declared_types(&stmt);
        let mut rows = stmt.raw_query();
        if let Some(row) = rows
            .next()
            .map_err(|e| CallError::Driver(format!("Failed to fetch row: {}", e)))?
        {
            let outputs = command
                .parameters
                .iter()
                .filter(|p| p.direction.is_output() && !p.db_type.is_cursor());
            for parameter in outputs {
                let Some(index) = columns
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(&parameter.name))
                else {
                    continue;
                };
                let cell = row
                    .get_ref(index)
                    .map_err(|e| CallError::Driver(e.to_string()))?;
                let decl_type = decl_types.get(index).and_then(|d| d.as_deref());
                command
                    .outputs
                    .insert(parameter.name.clone(), rusqlite_to_value(cell, decl_type));
            }
        }
        Ok(0)
    }

    fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        tracing::info!("closing SQLite connection");
        conn.close()
            .map_err(|(_, e)| CallError::Driver(format!("Failed to close connection: {}", e)))
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }
}

fn is_routine_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn declared_types(stmt: &Statement<'_>) -> Vec<Option<String>> {
    stmt.columns()
        .iter()
        .map(|c| c.decl_type().map(str::to_string))
        .collect()
}

fn bound_value(parameter: &Parameter) -> Result<SqlValue> {
    match &parameter.value {
        Some(value) => value_to_rusqlite(value, parameter.db_type).map_err(|e| e.in_column(&parameter.name)),
        None => Ok(SqlValue::Null),
    }
}

/// Bind In and InOut parameters to their named placeholders
fn bind_named(stmt: &mut Statement<'_>, parameters: &[Parameter]) -> Result<()> {
    for parameter in parameters.iter().filter(|p| p.direction.requires_value()) {
        let mut index = None;
        for prefix in NAME_PREFIXES {
            index = stmt
                .parameter_index(&format!("{}{}", prefix, parameter.name))
                .map_err(|e| CallError::Driver(e.to_string()))?;
            if index.is_some() {
                break;
            }
        }
        let Some(index) = index else {
            return Err(CallError::Driver(format!(
                "Statement has no parameter named :{}",
                parameter.name
            )));
        };

        let value = bound_value(parameter)?;
        stmt.raw_bind_parameter(index, value)
            .map_err(|e| CallError::Driver(format!("Failed to bind {}: {}", parameter.name, e)))?;
    }
    Ok(())
}

/// A prepared call: statement text, procedure body or function name
pub struct SqliteCommand {
    kind: CallKind,
    sql: String,
    parameters: Vec<Parameter>,
    outputs: HashMap<String, Value>,
}

impl SqliteCommand {
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl Command for SqliteCommand {
    fn bind_parameter(&mut self, parameter: &Parameter) -> Result<()> {
        if let Some(existing) = self.parameters.iter_mut().find(|p| p.name == parameter.name) {
            *existing = parameter.clone();
        } else {
            self.parameters.push(parameter.clone());
        }
        Ok(())
    }

    fn parameter_value(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }
}

/// Materialized result set
pub struct SqliteCursor {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    position: Option<usize>,
}

impl SqliteCursor {
    fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            position: None,
        }
    }
}

impl Cursor for SqliteCursor {
    fn column_names(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<bool> {
        let next = self.position.map_or(0, |p| p + 1);
        self.position = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }

    fn value_at(&self, index: usize) -> Result<Value> {
        self.position
            .and_then(|p| self.rows.get(p))
            .and_then(|row| row.get(index))
            .cloned()
            .ok_or_else(|| CallError::Driver(format!("No value at column {}", index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routine_names() {
        assert!(is_routine_name("min"));
        assert!(is_routine_name("_total2"));
        assert!(!is_routine_name("2fast"));
        assert!(!is_routine_name("min(1); drop table x"));
        assert!(!is_routine_name(""));
    }

    #[test]
    fn test_cursor_walks_rows_once() {
        let mut cursor = SqliteCursor::new(
            vec!["ID".into()],
            vec![vec![Value::Int64(1)], vec![Value::Int64(2)]],
        );
        assert!(cursor.value_at(0).is_err());
        assert!(cursor.next_row().unwrap());
        assert_eq!(cursor.value_at(0).unwrap(), Value::Int64(1));
        assert!(cursor.next_row().unwrap());
        assert!(!cursor.next_row().unwrap());
        assert!(!cursor.next_row().unwrap());
        assert!(cursor.value_at(0).is_err());
    }
}

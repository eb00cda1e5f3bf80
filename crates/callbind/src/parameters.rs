//! Call parameter staging
//!
//! A [`ParameterSet`] holds the parameters of one call in the order the caller
//! added them. Drivers bind by name, so the order only matters for the
//! metadata they send along.

use callbind_core::{CallError, DbType, Direction, Parameter, Result, Value};

/// Name under which the return value of a function call is staged
pub const RETURN_VALUE_NAME: &str = "return_value";

const MISSING_SIZE: &str = "Must specify a size for non-input parameters";
const MISSING_VALUE: &str = "Must specify a value for input or input/output parameters";
const RETURN_VALUE_NOT_FIRST: &str = "The return value must be added before any parameters";

/// Ordered, name-unique collection of call parameters
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    parameters: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter.
    ///
    /// Fails with [`CallError::Configuration`] when the name is taken, when an
    /// In/InOut parameter has no value, or when an output parameter of a sized
    /// type has no size. Input values are staged as text except for temporal
    /// types, which must be given a temporal [`Value`].
    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        db_type: DbType,
        direction: Direction,
        value: Option<Value>,
        size: Option<u32>,
    ) -> Result<()> {
        let name = name.into();

        if direction == Direction::ReturnValue {
            return Err(CallError::Configuration(
                "Return values are added with add_return_value".into(),
            ));
        }

        if direction.is_output() && !db_type.is_cursor() && size.unwrap_or(0) == 0 {
            return Err(CallError::Configuration(format!(
                "{} (parameter {})",
                MISSING_SIZE, name
            )));
        }

        if direction.requires_value() && value.is_none() {
            return Err(CallError::Configuration(format!(
                "{} (parameter {})",
                MISSING_VALUE, name
            )));
        }

        if self.contains(&name) {
            return Err(CallError::Configuration(format!(
                "Parameter name {} is already set",
                name
            )));
        }

        let value = match value {
            Some(value) => Some(stage_value(value, db_type)?),
            None => None,
        };

        tracing::trace!(parameter = %name, ?db_type, ?direction, "parameter staged");
        self.parameters.push(Parameter {
            name,
            db_type,
            direction,
            value,
            size: size.filter(|s| *s != 0),
        });
        Ok(())
    }

    /// Add an input parameter
    pub fn add_input(
        &mut self,
        name: impl Into<String>,
        db_type: DbType,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.add_parameter(name, db_type, Direction::In, Some(value.into()), None)
    }

    /// Add an output parameter. Cursors may pass a size of zero.
    pub fn add_output(&mut self, name: impl Into<String>, db_type: DbType, size: u32) -> Result<()> {
        self.add_parameter(name, db_type, Direction::Out, None, Some(size))
    }

    /// Stage the return value of a function call.
    ///
    /// Must come before every other parameter, and only once.
    pub fn add_return_value(&mut self, db_type: DbType, size: Option<u32>) -> Result<()> {
        if !self.parameters.is_empty() {
            return Err(CallError::Configuration(RETURN_VALUE_NOT_FIRST.into()));
        }

        self.parameters.push(Parameter {
            name: RETURN_VALUE_NAME.to_string(),
            db_type,
            direction: Direction::ReturnValue,
            value: None,
            size: size.filter(|s| *s != 0),
        });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// The staged return value, if any
    pub fn return_value(&self) -> Option<&Parameter> {
        self.parameters
            .first()
            .filter(|p| p.direction == Direction::ReturnValue)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// Convert a caller value to the form handed to the driver.
///
/// Temporal declared types keep their native value and reject anything else;
/// all other values travel as text. SQL NULL stays NULL.
fn stage_value(value: Value, db_type: DbType) -> Result<Value> {
    if value.is_null() {
        return Ok(value);
    }

    if db_type.is_temporal() {
        if value.is_temporal() {
            return Ok(value);
        }
        return Err(CallError::type_mismatch(
            value.kind().to_string(),
            format!("{:?}", db_type),
            "dates and times must be passed as date/time values",
        ));
    }

    match value {
        Value::String(_) | Value::Bytes(_) => Ok(value),
        other => Ok(Value::String(other.to_string())),
    }
}

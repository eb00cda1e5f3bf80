//! callbind - calling convention over a database's procedural interface
//!
//! This crate stages call parameters, runs queries, commands, stored
//! procedures and functions through a [`callbind_core::Driver`], and binds
//! result rows into plain Rust records.
//!
//! ```ignore
//! let mut call = CallExecutor::new(driver, CallSpec::procedure("hr.get_employees"));
//! call.add_input("department_id", DbType::Int32, 50)?;
//! call.add_output("employees", DbType::Cursor, 0)?;
//! call.connect(&ConnectionInfo::parse("User Id=hr;Password=hr;Data Source=xe")?)?;
//! let employees: Vec<Employee> = call.execute_typed()?;
//! ```

mod binder;
mod binding;
pub mod coerce;
mod executor;
mod normalize;
mod parameters;
mod record;
pub mod testing;

pub use binder::ResultBinder;
pub use binding::{Binding, BindingTable};
pub use executor::{CallExecutor, CallSpec, CallState};
pub use normalize::normalize_name;
pub use parameters::{ParameterSet, RETURN_VALUE_NAME};
pub use record::{FieldDescriptor, FieldKind, FieldValue, Record, RecordSchema, convert};

pub use callbind_core::{
    CallError, CallKind, ConnectionInfo, DbType, Direction, Parameter, Result, Value,
};

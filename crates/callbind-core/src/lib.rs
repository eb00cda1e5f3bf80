//! callbind core - value model and driver contract
//!
//! This crate defines what the call layer needs from a database driver and
//! nothing more:
//!
//! - `Driver` - opens connections
//! - `Connection` - prepares and runs commands
//! - `Command` / `Cursor` - parameter binding and row access
//! - `Value`, `Parameter`, `CallKind`, `DbType` - the shared data model
//! - `CallError` - the error taxonomy used across the workspace

mod connection;
mod driver;
mod error;
mod parameter;
mod types;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use parameter::*;
pub use types::*;

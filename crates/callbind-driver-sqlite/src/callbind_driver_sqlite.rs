//! SQLite driver for callbind
//!
//! SQLite has no stored routines, so the call kinds map onto it like this:
//!
//! - `Query` / `Command` run the statement text with `:name` parameters
//! - `Function` runs `SELECT routine(?1, ?2, ...)` over the input parameters
//! - `Procedure` runs a SQL body registered with [`SqliteDriver::with_procedure`]

mod connection;
mod convert;
mod driver;

pub use connection::{SqliteCommand, SqliteConnection, SqliteCursor};
pub use driver::SqliteDriver;

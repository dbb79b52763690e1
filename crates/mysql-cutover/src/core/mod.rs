//! Core abstractions shared by the lock guard, the switcher and the drivers.
//!
//! - [`schema`]: table and migration descriptors
//! - [`value`]: result rows
//! - [`traits`]: the session and connector seams drivers implement
//! - [`identifier`]: identifier and literal quoting

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

#[cfg(test)]
pub(crate) mod mock;

pub use schema::{Migration, Table};
pub use traits::{Connector, SqlExecutor};
pub use value::{Row, Value};

//! Database driver implementations of [`SqlExecutor`](crate::core::traits::SqlExecutor)
//! and [`Connector`](crate::core::traits::Connector).
//!
//! - [`mysql`]: MySQL/MariaDB via `mysql_async` (feature `mysql`, on by default)
//!
//! Other drivers only need to provide the same two traits.

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "mysql")]
pub use mysql::{MysqlConnector, MysqlExecutor};

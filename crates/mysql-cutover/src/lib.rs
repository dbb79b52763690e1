//! # mysql-cutover
//!
//! Metadata lock handling and atomic cut-over for online MySQL schema
//! migrations.
//!
//! An online migration copies a table into a shadow table while traffic
//! continues. Two steps need MySQL metadata locks on the live table:
//! installing the triggers that keep the shadow in sync, and the final
//! rename that swaps the shadow in. This library runs both so that they
//! cannot stall production traffic for long:
//!
//! - **Bounded lock waits**: the session `lock_wait_timeout` is lowered
//!   while lock-acquiring statements run and always restored afterwards
//! - **Blocker killing** (opt-in): long-running queries on the table are
//!   killed from a separate session when a statement stays blocked
//! - **Atomic switch**: one multi-table `RENAME TABLE`, retried on lock
//!   wait timeouts
//!
//! ## Example
//!
//! ```rust,no_run
//! use mysql_cutover::{
//!     AtomicSwitcher, Connection, CutoverConfig, GuardedStatementExecutor, LockWaitBudget,
//!     Migration, Table,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CutoverConfig::load("cutover.yaml")?;
//!     let guard_config = config.lock_guard.clone().with_env_overrides();
//!     let mysql = config.mysql.as_ref().ok_or("mysql section is required")?;
//!
//!     let connection = Connection::mysql(mysql, LockWaitBudget::from_config(&guard_config)).await?;
//!     let guard = GuardedStatementExecutor::from_config(connection.clone(), &guard_config);
//!
//!     let origin = Table::new("orders");
//!     guard
//!         .execute_guarded(&["CREATE TRIGGER ..."], &origin, None)
//!         .await?;
//!
//!     let migration = Migration::new(origin, Table::new("lhmn_orders"));
//!     let executor = GuardedStatementExecutor::from_config(connection, &guard_config);
//!     let mut switcher = AtomicSwitcher::new(migration, executor).with_config(&config.switch);
//!     switcher.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod core;
pub mod drivers;
pub mod error;
pub mod lock;
pub mod switcher;

// Re-exports for convenient access
pub use config::{CutoverConfig, LockGuardConfig, MysqlConfig, SwitchConfig};
pub use connection::{Connection, LockWaitBudget};
pub use crate::core::{Connector, Migration, Row, SqlExecutor, Table, Value};
pub use error::{CutoverError, DbError, DbErrorKind, DbResult, Result};
pub use lock::{
    tag_statement, GuardedStatementExecutor, QueryCensus, QueryKiller, RunningQuery,
    TimeoutGovernor,
};
pub use switcher::AtomicSwitcher;

#[cfg(feature = "mysql")]
pub use drivers::{MysqlConnector, MysqlExecutor};

//! Metadata lock contention handling.
//!
//! - [`timeout`]: session `lock_wait_timeout` get/set and scoped lowering
//! - [`census`]: finding long-running queries on a table
//! - [`killer`]: killing them
//! - [`guarded`]: running lock-acquiring statements with all of the above

pub mod census;
pub mod guarded;
pub mod killer;
pub mod timeout;

pub use census::{tag_statement, QueryCensus, RunningQuery, SENTINEL_MARKER};
pub use guarded::{ErrorCallback, GuardedStatementExecutor};
pub use killer::QueryKiller;
pub use timeout::{TimeoutGovernor, TimeoutScope, SHOW_LOCK_WAIT_TIMEOUT};

//! Database seams.
//!
//! - [`SqlExecutor`]: one database session that runs SQL text
//! - [`Connector`]: opens new, independent sessions
//!
//! The lock guard needs both: statements run on the primary session, while
//! the kill watcher must use its own session because the primary one may be
//! stuck waiting for a metadata lock. Each driver implements the pair once.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DbResult;

use super::value::Row;

/// A single database session.
///
/// Session state (such as `lock_wait_timeout`) set through one call is
/// visible to later calls on the same executor.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a statement and collect its rows. Statements without a result
    /// set return an empty vector.
    async fn execute(&self, sql: &str) -> DbResult<Vec<Row>>;

    /// Run a query and return its first row, if any.
    async fn select_one(&self, sql: &str) -> DbResult<Option<Row>> {
        Ok(self.execute(sql).await?.into_iter().next())
    }
}

/// Opens new database sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a fresh session that shares nothing with existing ones.
    async fn connect(&self) -> DbResult<Arc<dyn SqlExecutor>>;
}

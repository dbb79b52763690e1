//! The primary database session used for lock-sensitive work.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LockGuardConfig;
use crate::core::traits::{Connector, SqlExecutor};
use crate::core::value::Row;
use crate::error::{DbResult, Result};

/// Timing budget for statements that need a metadata lock.
///
/// The session `lock_wait_timeout` is set to the sum of the three parts:
/// a blocker must first be running for `long_query_threshold` to count as
/// long-running, the protected statement gets `statement_initialization_delay`
/// to show it is really stuck, and `max_statement_duration` to finish once
/// the blocker is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockWaitBudget {
    pub long_query_threshold: Duration,
    pub statement_initialization_delay: Duration,
    pub max_statement_duration: Duration,
}

impl Default for LockWaitBudget {
    fn default() -> Self {
        Self::from_config(&LockGuardConfig::default())
    }
}

impl LockWaitBudget {
    pub fn new(
        long_query_threshold: Duration,
        statement_initialization_delay: Duration,
        max_statement_duration: Duration,
    ) -> Self {
        Self {
            long_query_threshold,
            statement_initialization_delay,
            max_statement_duration,
        }
    }

    pub fn from_config(config: &LockGuardConfig) -> Self {
        Self::new(
            config.long_query_threshold(),
            config.statement_initialization_delay(),
            config.max_statement_duration(),
        )
    }

    /// Upper bound on how long a guarded statement may wait for its lock.
    pub fn metadata_lock_wait_timeout(&self) -> Duration {
        self.long_query_threshold + self.statement_initialization_delay + self.max_statement_duration
    }

    /// [`metadata_lock_wait_timeout`](Self::metadata_lock_wait_timeout) in
    /// whole seconds, rounded up, as `SET SESSION` expects.
    pub fn metadata_lock_wait_timeout_secs(&self) -> u64 {
        ceil_secs(self.metadata_lock_wait_timeout())
    }

    /// How long the watcher waits before looking for blockers.
    ///
    /// Never shorter than `long_query_threshold`, so anything the watcher
    /// finds was already running when the protected statement started.
    pub fn watcher_delay(&self) -> Duration {
        self.long_query_threshold + self.statement_initialization_delay
    }
}

pub(crate) fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// A long-lived database session plus the means to open independent ones.
///
/// Created once per migration run and shared by trigger installation and
/// the final switch.
#[derive(Clone)]
pub struct Connection {
    executor: Arc<dyn SqlExecutor>,
    connector: Arc<dyn Connector>,
    budget: LockWaitBudget,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Wrap an existing session.
    pub fn new(
        executor: Arc<dyn SqlExecutor>,
        connector: Arc<dyn Connector>,
        budget: LockWaitBudget,
    ) -> Self {
        Self {
            executor,
            connector,
            budget,
        }
    }

    /// Open the primary session through `connector`.
    pub async fn open(connector: Arc<dyn Connector>, budget: LockWaitBudget) -> Result<Self> {
        let executor = connector.connect().await?;
        Ok(Self::new(executor, connector, budget))
    }

    /// The primary session.
    pub fn executor(&self) -> &dyn SqlExecutor {
        self.executor.as_ref()
    }

    pub(crate) fn shared_executor(&self) -> Arc<dyn SqlExecutor> {
        Arc::clone(&self.executor)
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.connector)
    }

    pub fn budget(&self) -> LockWaitBudget {
        self.budget
    }

    pub fn metadata_lock_wait_timeout(&self) -> Duration {
        self.budget.metadata_lock_wait_timeout()
    }

    /// Run a statement on the primary session.
    pub async fn execute(&self, sql: &str) -> DbResult<Vec<Row>> {
        self.executor.execute(sql).await
    }

    /// Run a query on the primary session and return its first row.
    pub async fn select_one(&self, sql: &str) -> DbResult<Option<Row>> {
        self.executor.select_one(sql).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock::MockServer;

    #[test]
    fn test_default_budget_adds_up_to_fourteen_seconds() {
        let budget = LockWaitBudget::default();
        assert_eq!(budget.long_query_threshold, Duration::from_secs(10));
        assert_eq!(budget.metadata_lock_wait_timeout(), Duration::from_secs(14));
        assert_eq!(budget.metadata_lock_wait_timeout_secs(), 14);
        assert_eq!(budget.watcher_delay(), Duration::from_secs(12));
    }

    #[test]
    fn test_watcher_delay_never_below_threshold() {
        let budget = LockWaitBudget::new(Duration::from_secs(3), Duration::ZERO, Duration::ZERO);
        assert!(budget.watcher_delay() >= budget.long_query_threshold);
    }

    #[test]
    fn test_sub_second_budget_rounds_up() {
        let budget = LockWaitBudget::new(
            Duration::from_millis(1500),
            Duration::from_millis(200),
            Duration::ZERO,
        );
        assert_eq!(budget.metadata_lock_wait_timeout_secs(), 2);
    }

    #[tokio::test]
    async fn test_open_uses_connector_for_primary_session() {
        let server = MockServer::new();
        let conn = Connection::open(Arc::new(server.clone()), LockWaitBudget::default())
            .await
            .unwrap();
        conn.execute("SELECT 1").await.unwrap();
        assert_eq!(server.sessions_opened(), 1);
        assert_eq!(server.statements(), vec!["SELECT 1".to_string()]);
    }
}

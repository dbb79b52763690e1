//! Running statements that need a metadata lock.
//!
//! Each batch runs with a lowered session `lock_wait_timeout`, so a blocked
//! statement fails after a bounded wait instead of stalling every query that
//! queues up behind it. While a statement is outstanding, a watcher on a
//! separate session kills long-running queries on the table once the
//! statement has had time to prove it is blocked.

use std::collections::BTreeSet;

use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use crate::config::LockGuardConfig;
use crate::connection::Connection;
use crate::core::schema::Table;
use crate::error::{DbError, DbResult, Result};

use super::census::shield_from_census;
use super::killer::QueryKiller;
use super::timeout::TimeoutGovernor;

/// Receives a message when a guarded batch fails. When supplied, the
/// failure is reported here instead of being returned.
pub type ErrorCallback<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Executes batches of lock-acquiring statements on a [`Connection`].
pub struct GuardedStatementExecutor {
    connection: Connection,
    killer: QueryKiller,
    tables_with_long_queries: BTreeSet<String>,
}

impl GuardedStatementExecutor {
    /// Build an executor.
    ///
    /// `kill_long_running_queries` is fixed for the executor's lifetime.
    pub fn new(
        connection: Connection,
        kill_long_running_queries: bool,
        tables_with_long_queries: BTreeSet<String>,
    ) -> Self {
        let killer = QueryKiller::new(
            kill_long_running_queries,
            connection.budget().long_query_threshold,
        );
        Self {
            connection,
            killer,
            tables_with_long_queries,
        }
    }

    /// Build an executor from the kill flag and table list in `config`.
    /// Timings come from the connection's budget.
    pub fn from_config(connection: Connection, config: &LockGuardConfig) -> Self {
        Self::new(
            connection,
            config.kill_long_running_queries,
            config.tables_with_long_queries.clone(),
        )
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn killing_enabled(&self) -> bool {
        self.killer.is_enabled()
    }

    fn usually_has_long_queries(&self, table: &Table) -> bool {
        self.tables_with_long_queries.contains(&table.name)
    }

    /// Run `statements` in order on the primary session with a bounded lock
    /// wait.
    ///
    /// The first failing statement ends the batch. With `on_error`, the
    /// failure is passed to the callback and `Ok(())` is returned; without
    /// it, the database error is returned as-is. Either way the session
    /// timeout is restored before this returns.
    pub async fn execute_guarded<S>(
        &self,
        statements: &[S],
        table: &Table,
        on_error: Option<ErrorCallback<'_>>,
    ) -> Result<()>
    where
        S: AsRef<str> + Sync,
    {
        if self.usually_has_long_queries(table) && self.killer.is_enabled() {
            self.killer
                .sweep(&table.name, self.connection.executor())
                .await?;
        }

        let bound = self.connection.budget().metadata_lock_wait_timeout_secs();
        let governor = TimeoutGovernor::new(self.connection.shared_executor());
        let scope = governor.lower_to(bound).await?;

        let outcome = self.run_statements(statements, table).await;
        let original = scope.original();
        let restored = scope.restore().await;

        match outcome {
            Ok(()) => restored.map_err(|e| {
                error!(
                    "Failed to restore SESSION LOCK_WAIT_TIMEOUT to {} after statements on {} completed: {}",
                    original, table.name, e
                );
                e
            }),
            Err(primary) => {
                if let Err(e) = restored {
                    error!(
                        "Failed to restore SESSION LOCK_WAIT_TIMEOUT to {} after a failed statement on {}: {}",
                        original, table.name, e
                    );
                }
                Self::report(primary, bound, on_error)
            }
        }
    }

    async fn run_statements<S>(&self, statements: &[S], table: &Table) -> DbResult<()>
    where
        S: AsRef<str> + Sync,
    {
        for statement in statements {
            let sql = shield_from_census(statement.as_ref(), &table.name);
            let _watcher = self.arm_watcher(table);
            debug!("Executing guarded statement on {}: {}", table.name, sql);
            self.connection.execute(&sql).await?;
        }
        Ok(())
    }

    /// Spawn the kill watcher for one statement. Dropping the returned guard
    /// cancels the watcher if it has not fired yet; a watcher that already
    /// fired finishes its sweep on its own.
    fn arm_watcher(&self, table: &Table) -> Option<DropGuard> {
        if !self.killer.is_enabled() {
            return None;
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let delay = self.connection.budget().watcher_delay();
        let connector = self.connection.connector();
        let killer = self.killer.clone();
        let table_name = table.name.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            info!(
                "Statement on {} still waiting after {:?}; looking for blocking queries",
                table_name, delay
            );
            let session = match connector.connect().await {
                Ok(session) => session,
                Err(e) => {
                    warn!(
                        "Could not open a session to kill queries on {}: {}",
                        table_name, e
                    );
                    return;
                }
            };
            if let Err(e) = killer.sweep(&table_name, session.as_ref()).await {
                warn!("Killing queries on {} failed: {}", table_name, e);
            }
        });

        Some(token.drop_guard())
    }

    fn report(error: DbError, bound: u64, on_error: Option<ErrorCallback<'_>>) -> Result<()> {
        let Some(on_error) = on_error else {
            return Err(error.into());
        };
        if error.is_lock_wait_timeout() {
            on_error(&format!(
                "Transaction took more than {} seconds (SESSION LOCK_WAIT_TIMEOUT) to run.. ABORT! {}",
                bound, error
            ));
        } else {
            on_error(&error.message);
        }
        Ok(())
    }
}

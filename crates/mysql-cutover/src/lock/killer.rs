//! Killing queries that block metadata lock acquisition.

use std::time::Duration;

use tracing::info;

use crate::config::LockGuardConfig;
use crate::core::traits::SqlExecutor;
use crate::error::{DbErrorKind, Result};

use super::census::{QueryCensus, RunningQuery};

/// Issues `KILL` for long-running queries on a table.
///
/// Does nothing at all unless killing was enabled when it was built.
#[derive(Debug, Clone)]
pub struct QueryKiller {
    enabled: bool,
    threshold: Duration,
}

impl QueryKiller {
    pub fn new(enabled: bool, threshold: Duration) -> Self {
        Self { enabled, threshold }
    }

    pub fn from_config(config: &LockGuardConfig) -> Self {
        Self::new(config.kill_long_running_queries, config.long_query_threshold())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run a census on `table_name` and kill what it finds. Returns the
    /// number of queries killed.
    pub async fn sweep(&self, table_name: &str, executor: &dyn SqlExecutor) -> Result<usize> {
        if !self.enabled {
            return Ok(0);
        }
        let queries =
            QueryCensus::find_long_running_queries(table_name, self.threshold, executor).await?;
        self.kill_queries(table_name, &queries, executor).await
    }

    /// Kill each query by id.
    ///
    /// A query that finished between the census and its `KILL` is skipped;
    /// any other failure stops the sweep.
    pub async fn kill_queries(
        &self,
        table_name: &str,
        queries: &[RunningQuery],
        executor: &dyn SqlExecutor,
    ) -> Result<usize> {
        if !self.enabled {
            return Ok(0);
        }

        let mut killed = 0;
        for query in queries {
            info!(
                "Action on table {} detected; killing {}-second query: {}.",
                table_name, query.time_secs, query.info
            );
            match executor.execute(&format!("KILL {}", query.id)).await {
                Ok(_) => killed += 1,
                Err(e) if e.kind() == DbErrorKind::VanishedTarget => {
                    info!(
                        "Race condition detected. Process to kill no longer exists. Proceeding despite the following error: {}",
                        e
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(killed)
    }
}

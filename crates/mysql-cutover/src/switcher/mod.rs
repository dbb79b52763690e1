//! Atomic cut-over of the shadow table.
//!
//! The origin is archived and the destination takes its name in a single
//! `RENAME TABLE` statement. MySQL applies a multi-table rename atomically,
//! so no client ever sees the origin name missing.

use std::time::Duration;

use tracing::{info, warn};

use crate::config::SwitchConfig;
use crate::core::identifier::{mysql_ident, quote_literal, validate_identifier};
use crate::core::schema::Migration;
use crate::error::{CutoverError, Result};
use crate::lock::GuardedStatementExecutor;

/// Performs the cut-over, retrying lock wait timeouts.
pub struct AtomicSwitcher {
    migration: Migration,
    executor: GuardedStatementExecutor,
    max_retries: u32,
    retry_sleep_time: Duration,
    retries: u32,
}

impl AtomicSwitcher {
    /// Create a switcher. No retries are made unless configured.
    pub fn new(migration: Migration, executor: GuardedStatementExecutor) -> Self {
        Self {
            migration,
            executor,
            max_retries: 0,
            retry_sleep_time: Duration::ZERO,
            retries: 0,
        }
    }

    /// Apply a retry policy.
    pub fn with_config(mut self, config: &SwitchConfig) -> Self {
        self.max_retries = config.max_retries;
        self.retry_sleep_time = config.retry_sleep_time();
        self
    }

    pub fn set_max_retries(&mut self, max_retries: u32) {
        self.max_retries = max_retries;
    }

    pub fn set_retry_sleep_time(&mut self, retry_sleep_time: Duration) {
        self.retry_sleep_time = retry_sleep_time;
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_sleep_time(&self) -> Duration {
        self.retry_sleep_time
    }

    /// Failed attempts before the last [`run`](Self::run) finished.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn migration(&self) -> &Migration {
        &self.migration
    }

    /// The rename, as one statement.
    pub fn rename_statement(migration: &Migration) -> String {
        format!(
            "RENAME TABLE {} TO {}, {} TO {}",
            mysql_ident(&migration.origin.name),
            mysql_ident(migration.archive_name()),
            mysql_ident(&migration.destination.name),
            mysql_ident(&migration.origin.name)
        )
    }

    /// Statements issued per attempt.
    pub fn statements(&self) -> Vec<String> {
        vec![Self::rename_statement(&self.migration)]
    }

    /// Check names and table existence before touching anything.
    pub async fn validate(&self) -> Result<()> {
        let origin = &self.migration.origin.name;
        let destination = &self.migration.destination.name;
        let archive = self.migration.archive_name();

        for name in [origin.as_str(), destination.as_str(), archive] {
            validate_identifier(name)?;
        }
        if archive == origin || archive == destination {
            return Err(CutoverError::Validation(format!(
                "archive name `{}` must differ from `{}` and `{}`",
                archive, origin, destination
            )));
        }
        if origin == destination {
            return Err(CutoverError::Validation(format!(
                "origin and destination are both `{}`",
                origin
            )));
        }

        if !self.table_exists(origin).await? || !self.table_exists(destination).await? {
            return Err(CutoverError::Validation(format!(
                "`{}` and `{}` must exist",
                origin, destination
            )));
        }
        if self.table_exists(archive).await? {
            return Err(CutoverError::Validation(format!(
                "archive table `{}` already exists",
                archive
            )));
        }
        Ok(())
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) AS n FROM information_schema.TABLES WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = {}",
            quote_literal(name)
        );
        let row = self.executor.connection().select_one(&sql).await?;
        Ok(row.and_then(|r| r.get_u64("n")).unwrap_or(0) > 0)
    }

    /// Validate, then rename.
    ///
    /// A lock wait timeout is retried up to `max_retries` times with
    /// `retry_sleep_time` between attempts. When retries run out, or on any
    /// other failure, the database error from the last attempt is returned
    /// unchanged.
    ///
    /// An error from restoring the session timeout is returned as well, even
    /// though the rename has already committed; the tables may be swapped
    /// when `run` fails this way.
    pub async fn run(&mut self) -> Result<()> {
        self.retries = 0;
        self.validate().await?;

        let statements = self.statements();
        loop {
            let outcome = self
                .executor
                .execute_guarded(&statements, &self.migration.origin, None)
                .await;
            match outcome {
                Ok(()) => {
                    info!(
                        "Switched {} into place; original archived as {} after {} retries",
                        self.migration.destination.name,
                        self.migration.archive_name(),
                        self.retries
                    );
                    return Ok(());
                }
                Err(e) if e.is_lock_wait_timeout() && self.retries < self.max_retries => {
                    self.retries += 1;
                    warn!(
                        "Retrying sql={} error={} retries={}/{}",
                        statements.join("; "), e, self.retries, self.max_retries
                    );
                    tokio::time::sleep(self.retry_sleep_time).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

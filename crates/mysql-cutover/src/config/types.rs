//! Configuration type definitions.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Environment variable that turns query killing on for the whole process.
pub const KILL_LONG_RUNNING_QUERIES_ENV: &str = "CUTOVER_KILL_LONG_RUNNING_QUERIES";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CutoverConfig {
    /// MySQL connection settings. Optional so the lock guard can be driven
    /// by a caller-supplied executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mysql: Option<MysqlConfig>,

    /// Metadata lock guard behaviour.
    #[serde(default)]
    pub lock_guard: LockGuardConfig,

    /// Atomic switch retry policy.
    #[serde(default)]
    pub switch: SwitchConfig,
}

/// MySQL connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct MysqlConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disable, prefer, require, verify-ca, verify-full (default: "prefer").
    #[serde(default = "default_prefer")]
    pub ssl_mode: String,
}

impl fmt::Debug for MysqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MysqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Settings for statements that need a metadata lock.
///
/// The three durations add up to the session `lock_wait_timeout` installed
/// while guarded statements run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockGuardConfig {
    /// Queries on the table running longer than this are considered blockers (default: 10).
    #[serde(default = "default_long_query_threshold")]
    pub long_query_threshold_secs: u64,

    /// Grace period for a guarded statement to start (default: 2).
    #[serde(default = "default_statement_initialization_delay")]
    pub statement_initialization_delay_secs: u64,

    /// Expected upper bound for the guarded statement itself once it has its lock (default: 2).
    #[serde(default = "default_max_statement_duration")]
    pub max_statement_duration_secs: u64,

    /// Kill long-running queries that block guarded statements (default: false).
    #[serde(default)]
    pub kill_long_running_queries: bool,

    /// Tables that usually carry long queries; they get a kill sweep before
    /// the first statement of a batch.
    #[serde(default)]
    pub tables_with_long_queries: BTreeSet<String>,
}

impl Default for LockGuardConfig {
    fn default() -> Self {
        Self {
            long_query_threshold_secs: default_long_query_threshold(),
            statement_initialization_delay_secs: default_statement_initialization_delay(),
            max_statement_duration_secs: default_max_statement_duration(),
            kill_long_running_queries: false,
            tables_with_long_queries: BTreeSet::new(),
        }
    }
}

impl LockGuardConfig {
    /// Apply process-wide overrides from the environment.
    ///
    /// Only [`KILL_LONG_RUNNING_QUERIES_ENV`] is read. The result is meant to
    /// be passed on explicitly; nothing downstream reads the environment.
    pub fn with_env_overrides(self) -> Self {
        let value = std::env::var(KILL_LONG_RUNNING_QUERIES_ENV).ok();
        self.with_kill_override(value.as_deref())
    }

    pub(crate) fn with_kill_override(mut self, value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()) {
            Some(v) if v == "true" => self.kill_long_running_queries = true,
            Some(v) if v == "false" => self.kill_long_running_queries = false,
            Some(v) => {
                info!(
                    "Ignoring {}={}: expected 'true' or 'false'",
                    KILL_LONG_RUNNING_QUERIES_ENV, v
                );
            }
            None => {}
        }
        self
    }

    /// Queries running longer than this are candidates for killing.
    pub fn long_query_threshold(&self) -> Duration {
        Duration::from_secs(self.long_query_threshold_secs)
    }

    /// Grace period before a guarded statement is considered blocked.
    pub fn statement_initialization_delay(&self) -> Duration {
        Duration::from_secs(self.statement_initialization_delay_secs)
    }

    /// Expected duration of a guarded statement once it holds its lock.
    pub fn max_statement_duration(&self) -> Duration {
        Duration::from_secs(self.max_statement_duration_secs)
    }

    /// Whether a table is known to usually carry long queries.
    pub fn usually_has_long_queries(&self, table_name: &str) -> bool {
        self.tables_with_long_queries.contains(table_name)
    }
}

/// Retry policy for the atomic switch.
///
/// Both values default to zero: the switch is attempted once unless the
/// caller asks for retries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchConfig {
    /// Extra attempts after a lock wait timeout.
    #[serde(default)]
    pub max_retries: u32,

    /// Pause between attempts in milliseconds.
    #[serde(default)]
    pub retry_sleep_ms: u64,
}

impl SwitchConfig {
    /// Pause between attempts.
    pub fn retry_sleep_time(&self) -> Duration {
        Duration::from_millis(self.retry_sleep_ms)
    }
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_prefer() -> String {
    "prefer".to_string()
}

fn default_long_query_threshold() -> u64 {
    10
}

fn default_statement_initialization_delay() -> u64 {
    2
}

fn default_max_statement_duration() -> u64 {
    2
}

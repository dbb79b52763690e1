//! Configuration validation.

use super::CutoverConfig;
use crate::error::{CutoverError, Result};

/// Largest value MySQL accepts for `lock_wait_timeout`.
pub const MAX_LOCK_WAIT_TIMEOUT_SECS: u64 = 31_536_000;

/// Validate the configuration.
pub fn validate(config: &CutoverConfig) -> Result<()> {
    if let Some(mysql) = &config.mysql {
        if mysql.host.is_empty() {
            return Err(CutoverError::Config("mysql.host is required".into()));
        }
        if mysql.database.is_empty() {
            return Err(CutoverError::Config("mysql.database is required".into()));
        }
        if mysql.user.is_empty() {
            return Err(CutoverError::Config("mysql.user is required".into()));
        }
    }

    let guard = &config.lock_guard;
    if guard.long_query_threshold_secs == 0 {
        return Err(CutoverError::Config(
            "lock_guard.long_query_threshold_secs must be at least 1".into(),
        ));
    }

    let total = guard
        .long_query_threshold_secs
        .checked_add(guard.statement_initialization_delay_secs)
        .and_then(|t| t.checked_add(guard.max_statement_duration_secs));
    match total {
        Some(total) if total <= MAX_LOCK_WAIT_TIMEOUT_SECS => {}
        _ => {
            return Err(CutoverError::Config(format!(
                "lock_guard durations must add up to at most {} seconds",
                MAX_LOCK_WAIT_TIMEOUT_SECS
            )));
        }
    }

    if guard
        .tables_with_long_queries
        .iter()
        .any(|name| name.trim().is_empty())
    {
        return Err(CutoverError::Config(
            "lock_guard.tables_with_long_queries cannot contain empty names".into(),
        ));
    }

    Ok(())
}

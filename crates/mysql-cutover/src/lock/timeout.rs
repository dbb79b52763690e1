//! Session `lock_wait_timeout` handling.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::core::traits::SqlExecutor;
use crate::error::{CutoverError, Result};

/// Query reading the session lock wait timeout.
pub const SHOW_LOCK_WAIT_TIMEOUT: &str = "SHOW SESSION VARIABLES LIKE 'LOCK_WAIT_TIMEOUT'";

/// Reads and writes `lock_wait_timeout` on one session.
#[derive(Clone)]
pub struct TimeoutGovernor {
    executor: Arc<dyn SqlExecutor>,
}

impl TimeoutGovernor {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self { executor }
    }

    /// Current session `lock_wait_timeout`, in seconds.
    pub async fn get_session_timeout(&self) -> Result<u64> {
        let row = self
            .executor
            .select_one(SHOW_LOCK_WAIT_TIMEOUT)
            .await?
            .ok_or_else(|| CutoverError::unexpected(SHOW_LOCK_WAIT_TIMEOUT, "no rows returned"))?;
        row.get_u64("Value").ok_or_else(|| {
            CutoverError::unexpected(SHOW_LOCK_WAIT_TIMEOUT, "missing or non-numeric Value column")
        })
    }

    /// Set the session `lock_wait_timeout`.
    pub async fn set_session_timeout(&self, seconds: u64) -> Result<()> {
        self.executor
            .execute(&format!("SET SESSION LOCK_WAIT_TIMEOUT={}", seconds))
            .await?;
        info!(
            "Set transaction timeout (SESSION LOCK_WAIT_TIMEOUT) to {} seconds.",
            seconds
        );
        Ok(())
    }

    /// Install `seconds` as the session timeout, remembering the current value.
    ///
    /// The returned scope must be [restored](TimeoutScope::restore). If it
    /// is dropped instead (the owning future was cancelled or panicked) the
    /// restore is spawned onto the current runtime.
    pub async fn lower_to(&self, seconds: u64) -> Result<TimeoutScope> {
        let original = self.get_session_timeout().await?;
        self.set_session_timeout(seconds).await?;
        Ok(TimeoutScope {
            governor: self.clone(),
            original,
            pending: true,
        })
    }
}

/// A lowered session timeout that still has to be put back.
#[must_use = "the original lock_wait_timeout is only restored through TimeoutScope::restore"]
pub struct TimeoutScope {
    governor: TimeoutGovernor,
    original: u64,
    pending: bool,
}

impl TimeoutScope {
    /// Value in effect before the scope was entered.
    pub fn original(&self) -> u64 {
        self.original
    }

    /// Put the original value back. Runs at most once per scope.
    pub async fn restore(mut self) -> Result<()> {
        self.pending = false;
        self.governor.set_session_timeout(self.original).await
    }
}

impl Drop for TimeoutScope {
    fn drop(&mut self) {
        if !self.pending {
            return;
        }
        self.pending = false;

        let original = self.original;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    "Lock-sensitive work was interrupted; restoring SESSION LOCK_WAIT_TIMEOUT to {} in the background",
                    original
                );
                let governor = self.governor.clone();
                handle.spawn(async move {
                    if let Err(e) = governor.set_session_timeout(original).await {
                        error!(
                            "Failed to restore SESSION LOCK_WAIT_TIMEOUT to {}: {}",
                            original, e
                        );
                    }
                });
            }
            Err(_) => {
                error!(
                    "No async runtime available; SESSION LOCK_WAIT_TIMEOUT was left lowered instead of {}",
                    original
                );
            }
        }
    }
}

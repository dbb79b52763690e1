//! In-memory stand-in for a MySQL server, for unit tests.
//!
//! Models just enough server behaviour for the lock guard and the switch:
//! per-session `lock_wait_timeout`, a processlist that `KILL` removes
//! entries from, a set of tables that `RENAME TABLE` rewrites, scripted
//! failures, and statements that wait for a metadata lock held by a
//! processlist entry until it is killed or the session timeout runs out.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::core::traits::{Connector, SqlExecutor};
use crate::core::value::{Row, Value};
use crate::error::{DbError, DbResult, ER_NO_SUCH_THREAD};

/// MySQL's default `lock_wait_timeout`.
pub(crate) const DEFAULT_LOCK_WAIT_TIMEOUT: u64 = 31_536_000;

#[derive(Debug, Clone)]
pub(crate) struct Process {
    pub id: u64,
    pub command: String,
    pub info: Option<String>,
    pub time: u64,
}

#[derive(Default)]
struct State {
    next_session: u64,
    log: Vec<(u64, String)>,
    timeouts: HashMap<u64, u64>,
    processes: Vec<Process>,
    tables: BTreeSet<String>,
    failures: Vec<(String, DbError)>,
    locks: Vec<(String, u64)>,
    refuse_connections: bool,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    killed: Notify,
}

#[derive(Clone, Default)]
pub(crate) struct MockServer {
    inner: Arc<Inner>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.state.lock().unwrap()
    }

    /// Open a new session.
    pub fn session(&self) -> MockSession {
        let mut state = self.state();
        state.next_session += 1;
        let id = state.next_session;
        state.timeouts.insert(id, DEFAULT_LOCK_WAIT_TIMEOUT);
        MockSession {
            server: self.clone(),
            id,
        }
    }

    pub fn sessions_opened(&self) -> u64 {
        self.state().next_session
    }

    pub fn refuse_connections(&self) {
        self.state().refuse_connections = true;
    }

    pub fn add_table(&self, name: &str) {
        self.state().tables.insert(name.to_string());
    }

    pub fn tables(&self) -> BTreeSet<String> {
        self.state().tables.clone()
    }

    /// Add a processlist entry running `info` for `time` seconds.
    pub fn add_process(&self, id: u64, command: &str, info: Option<&str>, time: u64) {
        self.state().processes.push(Process {
            id,
            command: command.to_string(),
            info: info.map(str::to_string),
            time,
        });
    }

    pub fn process_ids(&self) -> Vec<u64> {
        self.state().processes.iter().map(|p| p.id).collect()
    }

    /// Remove a processlist entry without a `KILL`, as if it finished on its own.
    pub fn finish_process(&self, id: u64) {
        self.state().processes.retain(|p| p.id != id);
        self.inner.killed.notify_waiters();
    }

    /// Fail the next statement starting with `prefix`.
    pub fn fail_next(&self, prefix: &str, error: DbError) {
        self.state().failures.push((prefix.to_string(), error));
    }

    /// Make statements starting with `prefix` wait for a lock held by `process_id`.
    pub fn hold_lock(&self, prefix: &str, process_id: u64) {
        self.state().locks.push((prefix.to_string(), process_id));
    }

    pub fn session_timeout(&self, session_id: u64) -> u64 {
        self.state().timeouts.get(&session_id).copied().unwrap_or(0)
    }

    /// Every statement executed, in order.
    pub fn statements(&self) -> Vec<String> {
        self.state().log.iter().map(|(_, sql)| sql.clone()).collect()
    }

    /// Statements executed on one session.
    pub fn statements_on(&self, session_id: u64) -> Vec<String> {
        self.state()
            .log
            .iter()
            .filter(|(id, _)| *id == session_id)
            .map(|(_, sql)| sql.clone())
            .collect()
    }

    /// `(session, statement)` pairs for statements starting with `prefix`.
    pub fn executed_matching(&self, prefix: &str) -> Vec<(u64, String)> {
        self.state()
            .log
            .iter()
            .filter(|(_, sql)| sql.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn count_matching(&self, prefix: &str) -> usize {
        self.executed_matching(prefix).len()
    }

    fn blocker_for(&self, sql: &str) -> Option<u64> {
        let state = self.state();
        state
            .locks
            .iter()
            .filter(|(prefix, _)| sql.starts_with(prefix.as_str()))
            .map(|(_, pid)| *pid)
            .find(|pid| state.processes.iter().any(|p| p.id == *pid))
    }

    async fn wait_for_lock(&self, session_id: u64, sql: &str) -> DbResult<()> {
        let timeout = Duration::from_secs(self.session_timeout(session_id));
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.inner.killed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.blocker_for(sql).is_none() {
                return Ok(());
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(DbError::lock_wait_timeout());
            }
        }
    }

    async fn run(&self, session_id: u64, sql: &str) -> DbResult<Vec<Row>> {
        {
            let mut state = self.state();
            state.log.push((session_id, sql.to_string()));
            if let Some(pos) = state
                .failures
                .iter()
                .position(|(prefix, _)| sql.starts_with(prefix.as_str()))
            {
                return Err(state.failures.remove(pos).1);
            }
        }

        self.wait_for_lock(session_id, sql).await?;

        if sql.starts_with("SHOW SESSION VARIABLES LIKE 'LOCK_WAIT_TIMEOUT'") {
            let value = self.session_timeout(session_id);
            return Ok(vec![Row::new([
                ("Variable_name", "lock_wait_timeout".to_string()),
                ("Value", value.to_string()),
            ])]);
        }
        if let Some(value) = sql.strip_prefix("SET SESSION LOCK_WAIT_TIMEOUT=") {
            let value = value
                .trim()
                .parse()
                .map_err(|_| DbError::server(1232, "42000", "Incorrect argument type"))?;
            self.state().timeouts.insert(session_id, value);
            return Ok(Vec::new());
        }
        if sql.contains("INFORMATION_SCHEMA.PROCESSLIST") {
            return Ok(self.census(sql));
        }
        if let Some(id) = sql.strip_prefix("KILL ") {
            return self.kill(id.trim());
        }
        if sql.contains("information_schema.TABLES") {
            let name = between(sql, "TABLE_NAME = '", "'").unwrap_or_default();
            let count = u64::from(self.state().tables.contains(&name));
            return Ok(vec![Row::new([("n", Value::from(count))])]);
        }
        if let Some(renames) = sql.strip_prefix("RENAME TABLE ") {
            self.rename(renames)?;
            return Ok(Vec::new());
        }
        Ok(Vec::new())
    }

    fn census(&self, sql: &str) -> Vec<Row> {
        let pattern = between(sql, "INFO LIKE '%", "%'")
            .unwrap_or_default()
            .replace("\\_", "_")
            .replace("\\%", "%");
        let threshold: u64 = between(sql, "TIME > ", "\n")
            .or_else(|| sql.split("TIME > ").nth(1).map(str::to_string))
            .and_then(|t| t.trim().parse().ok())
            .unwrap_or(0);

        self.state()
            .processes
            .iter()
            .filter(|p| p.command != "Sleep" && p.time > threshold)
            .filter_map(|p| p.info.as_ref().map(|info| (p, info)))
            .filter(|(_, info)| info.contains(&pattern))
            .filter(|(_, info)| !info.contains("INFORMATION_SCHEMA.PROCESSLIST"))
            .filter(|(_, info)| !info.contains(crate::lock::SENTINEL_MARKER))
            .map(|(p, info)| {
                Row::new([
                    ("ID", Value::from(p.id)),
                    ("INFO", Value::from(info.clone())),
                    ("TIME", Value::from(p.time)),
                ])
            })
            .collect()
    }

    fn kill(&self, id: &str) -> DbResult<Vec<Row>> {
        let id: u64 = id
            .parse()
            .map_err(|_| DbError::server(1064, "42000", "You have an error in your SQL syntax"))?;
        {
            let mut state = self.state();
            let before = state.processes.len();
            state.processes.retain(|p| p.id != id);
            if state.processes.len() == before {
                return Err(DbError::server(
                    ER_NO_SUCH_THREAD,
                    "HY000",
                    format!("Unknown thread id: {}", id),
                ));
            }
        }
        self.inner.killed.notify_waiters();
        Ok(Vec::new())
    }

    fn rename(&self, renames: &str) -> DbResult<()> {
        let mut state = self.state();
        let mut tables = state.tables.clone();
        for pair in renames.split(',') {
            let mut parts = pair.split(" TO ");
            let (from, to) = match (parts.next(), parts.next()) {
                (Some(from), Some(to)) => (unquote(from), unquote(to)),
                _ => return Err(DbError::server(1064, "42000", "You have an error in your SQL syntax")),
            };
            if !tables.remove(&from) {
                return Err(DbError::server(1146, "42S02", format!("Table '{}' doesn't exist", from)));
            }
            if !tables.insert(to.clone()) {
                return Err(DbError::server(1050, "42S01", format!("Table '{}' already exists", to)));
            }
        }
        state.tables = tables;
        Ok(())
    }
}

fn between(haystack: &str, start: &str, end: &str) -> Option<String> {
    let from = haystack.find(start)? + start.len();
    let len = haystack[from..].find(end)?;
    Some(haystack[from..from + len].to_string())
}

fn unquote(name: &str) -> String {
    let name = name.split("/*").next().unwrap_or(name).trim();
    name.strip_prefix('`')
        .and_then(|n| n.strip_suffix('`'))
        .map(|n| n.replace("``", "`"))
        .unwrap_or_else(|| name.to_string())
}

#[async_trait]
impl Connector for MockServer {
    async fn connect(&self) -> DbResult<Arc<dyn SqlExecutor>> {
        if self.state().refuse_connections {
            return Err(DbError::server(1040, "08004", "Too many connections"));
        }
        Ok(Arc::new(self.session()))
    }
}

/// One session on a [`MockServer`].
#[derive(Clone)]
pub(crate) struct MockSession {
    server: MockServer,
    id: u64,
}

impl MockSession {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[async_trait]
impl SqlExecutor for MockSession {
    async fn execute(&self, sql: &str) -> DbResult<Vec<Row>> {
        self.server.run(self.id, sql).await
    }
}

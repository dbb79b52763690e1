//! Finding queries that may hold a metadata lock on a table.

use std::borrow::Cow;
use std::time::Duration;

use tracing::{debug, warn};

use crate::connection::ceil_secs;
use crate::core::identifier::{escape_like, quote_ident};
use crate::core::traits::SqlExecutor;
use crate::error::Result;

/// Marker carried by statements this crate (or its caller) issues on
/// purpose. Queries containing it are never selected for killing.
pub const SENTINEL_MARKER: &str = "mysql-cutover";

/// Append the sentinel marker comment to a statement.
pub fn tag_statement(sql: &str) -> String {
    format!("{} /* {} */", sql.trim_end(), SENTINEL_MARKER)
}

/// Tag `sql` if a census on `table_name` would otherwise match it.
///
/// A guarded statement that waits long enough looks exactly like a
/// long-running query on its own table; without the marker the watcher
/// would kill the statement it is protecting. Matching is case-insensitive,
/// as `LIKE` is against the processlist.
pub(crate) fn shield_from_census<'a>(sql: &'a str, table_name: &str) -> Cow<'a, str> {
    let folded = sql.to_lowercase();
    if folded.contains(&quote_ident(table_name).to_lowercase())
        && !folded.contains(SENTINEL_MARKER)
    {
        Cow::Owned(tag_statement(sql))
    } else {
        Cow::Borrowed(sql)
    }
}

/// A query seen in the processlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningQuery {
    /// Connection id, as accepted by `KILL`.
    pub id: u64,
    /// Query text.
    pub info: String,
    /// Seconds the query has been running.
    pub time_secs: u64,
}

/// Processlist census.
pub struct QueryCensus;

impl QueryCensus {
    /// SQL selecting active queries on `table_name` running longer than
    /// `threshold_secs`.
    pub fn census_sql(table_name: &str, threshold_secs: u64) -> String {
        format!(
            "SELECT ID, INFO, TIME FROM INFORMATION_SCHEMA.PROCESSLIST
WHERE command <> 'Sleep'
  AND INFO LIKE '%{}%'
  AND INFO NOT LIKE '%{}%'
  AND INFO NOT LIKE '%INFORMATION_SCHEMA.PROCESSLIST%'
  AND TIME > {}",
            escape_like(&quote_ident(table_name)),
            escape_like(SENTINEL_MARKER),
            threshold_secs
        )
    }

    /// Queries referencing `` `table_name` `` that have been running for
    /// longer than `threshold`. Empty when nothing qualifies.
    pub async fn find_long_running_queries(
        table_name: &str,
        threshold: Duration,
        executor: &dyn SqlExecutor,
    ) -> Result<Vec<RunningQuery>> {
        let sql = Self::census_sql(table_name, ceil_secs(threshold));
        let rows = executor.execute(&sql).await?;

        let mut queries = Vec::with_capacity(rows.len());
        for row in rows {
            let (Some(id), Some(info), Some(time_secs)) = (
                row.get_u64("ID"),
                row.get_string("INFO"),
                row.get_u64("TIME"),
            ) else {
                warn!("Skipping incomplete processlist row: {:?}", row);
                continue;
            };
            queries.push(RunningQuery {
                id,
                info,
                time_secs,
            });
        }

        debug!(
            "Found {} queries on {} running longer than {:?}",
            queries.len(),
            table_name,
            threshold
        );
        Ok(queries)
    }
}

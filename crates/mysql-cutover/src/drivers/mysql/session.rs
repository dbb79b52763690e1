//! A single MySQL session.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Row as MySqlRow, Value as MySqlValue};
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::traits::SqlExecutor;
use crate::core::value::{Row, Value};
use crate::error::{DbError, DbResult};

use super::db_error;

/// One MySQL connection used as a [`SqlExecutor`].
///
/// Calls are serialized; a statement waiting for a lock holds the session
/// until it returns.
pub struct MysqlExecutor {
    conn: Mutex<Option<Conn>>,
    connection_id: u32,
}

impl MysqlExecutor {
    pub fn new(conn: Conn) -> Self {
        let connection_id = conn.id();
        Self {
            conn: Mutex::new(Some(conn)),
            connection_id,
        }
    }

    /// Server-side connection id (the id `KILL` would take).
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    /// Close the session. Later calls fail.
    pub async fn disconnect(&self) -> DbResult<()> {
        match self.conn.lock().await.take() {
            Some(conn) => conn.disconnect().await.map_err(db_error),
            None => Ok(()),
        }
    }

    fn convert_row(row: MySqlRow) -> Row {
        let columns = row.columns_ref();
        let pairs: Vec<(String, Value)> = (0..row.len())
            .map(|idx| {
                let name = columns
                    .get(idx)
                    .map(|c| c.name_str().into_owned())
                    .unwrap_or_default();
                let value = row.as_ref(idx).map(convert_value).unwrap_or(Value::Null);
                (name, value)
            })
            .collect();
        Row::new(pairs)
    }
}

fn convert_value(value: &MySqlValue) -> Value {
    match value {
        MySqlValue::NULL => Value::Null,
        MySqlValue::Int(v) => Value::Int(*v),
        MySqlValue::UInt(v) => Value::UInt(*v),
        MySqlValue::Float(v) => Value::Float(f64::from(*v)),
        MySqlValue::Double(v) => Value::Float(*v),
        MySqlValue::Bytes(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        // Dates and times only show up in diagnostics here
        other => Value::Text(other.as_sql(true).trim_matches('\'').to_string()),
    }
}

#[async_trait]
impl SqlExecutor for MysqlExecutor {
    async fn execute(&self, sql: &str) -> DbResult<Vec<Row>> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| DbError::other("MySQL session is closed"))?;

        debug!("[conn {}] {}", self.connection_id, sql);
        let rows: Vec<MySqlRow> = conn.query(sql).await.map_err(db_error)?;
        Ok(rows.into_iter().map(Self::convert_row).collect())
    }
}

//! MySQL/MariaDB driver.
//!
//! - [`MysqlExecutor`]: one dedicated session, implementing `SqlExecutor`
//! - [`MysqlConnector`]: opens unpooled sessions, implementing `Connector`
//!
//! Sessions are never pooled: session variables such as `lock_wait_timeout`
//! must stay with the session that set them, and the kill watcher needs a
//! session that is guaranteed not to be the blocked one.
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod connector;
mod session;

pub use connector::MysqlConnector;
pub use session::MysqlExecutor;

use mysql_async::Error as MysqlError;

use crate::error::DbError;

/// Keep the server's code and SQLSTATE so error classification can use them.
pub(crate) fn db_error(e: MysqlError) -> DbError {
    match e {
        MysqlError::Server(server) => DbError::server(server.code, server.state, server.message),
        other => DbError::other(other.to_string()),
    }
}

//! Opening MySQL sessions.

use std::sync::Arc;

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, SslOpts};
use tracing::{info, warn};

use crate::config::MysqlConfig;
use crate::connection::{Connection, LockWaitBudget};
use crate::core::traits::{Connector, SqlExecutor};
use crate::error::{DbResult, Result};

use super::{db_error, MysqlExecutor};

/// Opens a new, unpooled MySQL session per [`connect`](Connector::connect).
#[derive(Clone)]
pub struct MysqlConnector {
    opts: Opts,
    endpoint: String,
}

impl MysqlConnector {
    /// Build connection options from configuration.
    pub fn new(config: &MysqlConfig) -> Self {
        let ssl_opts = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
                None
            }
            "prefer" | "require" => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
            "verify-ca" | "verify_ca" | "verify-full" | "verify_identity" => Some(SslOpts::default()),
            _ => {
                warn!(
                    "Unknown ssl_mode '{}', defaulting to Preferred",
                    config.ssl_mode
                );
                Some(SslOpts::default().with_danger_accept_invalid_certs(true))
            }
        };

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.port)
            .db_name(Some(&config.database))
            .user(Some(&config.user))
            .pass(Some(&config.password))
            .init(vec!["SET NAMES utf8mb4"]);

        if let Some(ssl) = ssl_opts {
            builder = builder.ssl_opts(ssl);
        }

        Self {
            opts: builder.into(),
            endpoint: format!("{}:{}/{}", config.host, config.port, config.database),
        }
    }

    /// Open a session with the concrete executor type.
    pub async fn open(&self) -> DbResult<MysqlExecutor> {
        let mut conn = Conn::new(self.opts.clone()).await.map_err(db_error)?;
        conn.query_drop("SELECT 1").await.map_err(db_error)?;
        let executor = MysqlExecutor::new(conn);
        info!(
            "Connected to MySQL: {} (connection id {})",
            self.endpoint,
            executor.connection_id()
        );
        Ok(executor)
    }
}

#[async_trait]
impl Connector for MysqlConnector {
    async fn connect(&self) -> DbResult<Arc<dyn SqlExecutor>> {
        Ok(Arc::new(self.open().await?))
    }
}

impl Connection {
    /// Open the primary MySQL session for a migration run.
    pub async fn mysql(config: &MysqlConfig, budget: LockWaitBudget) -> Result<Self> {
        Connection::open(Arc::new(MysqlConnector::new(config)), budget).await
    }
}

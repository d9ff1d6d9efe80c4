// SPDX-License-Identifier: Apache-2.0

//! Connection factory
//!
//! Dispatches on the template's engine kind and opens one independent SQLx
//! connection per call.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::engine::connection_url::build_connection_url;
use crate::engine::drivers::mysql::MySqlTargetConnection;
use crate::engine::drivers::postgres::PostgresConnection;
use crate::engine::error::EngineResult;
use crate::engine::traits::{Connector, TargetConnection};
use crate::engine::types::{CredentialTemplate, EngineKind, Target};

/// Default handshake timeout per connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Production connector backed by SQLx.
#[derive(Debug, Clone)]
pub struct SqlxConnector {
    connect_timeout: Duration,
}

impl SqlxConnector {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for SqlxConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for SqlxConnector {
    async fn connect(
        &self,
        template: &CredentialTemplate,
        target: Option<&Target>,
    ) -> EngineResult<Box<dyn TargetConnection>> {
        let kind = template.engine_kind()?;
        let url = build_connection_url(kind, template, target)?;
        let database = template.database_for(target);

        debug!(engine = %kind, database, host = %template.host, "Opening connection");

        match kind {
            EngineKind::Postgres => {
                let conn = PostgresConnection::connect(&url, database, self.connect_timeout).await?;
                Ok(Box::new(conn))
            }
            EngineKind::MySql => {
                let conn =
                    MySqlTargetConnection::connect(&url, database, self.connect_timeout).await?;
                Ok(Box::new(conn))
            }
        }
    }
}

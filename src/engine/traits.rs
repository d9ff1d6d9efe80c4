// SPDX-License-Identifier: Apache-2.0

//! Connector traits
//!
//! The fan-out engine only ever talks to databases through these two traits.
//! `Connector` is the connection factory; every call hands back an
//! independent `TargetConnection` that the caller owns and must close.

use async_trait::async_trait;

use crate::engine::error::EngineResult;
use crate::engine::types::{CredentialTemplate, QueryResult, Target};

/// Builds connections from a credential template.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new connection.
    ///
    /// With `target` set, the connection is bound to that database instead
    /// of the template's default one. Nothing is cached or pooled between
    /// calls.
    async fn connect(
        &self,
        template: &CredentialTemplate,
        target: Option<&Target>,
    ) -> EngineResult<Box<dyn TargetConnection>>;
}

/// A live session with one database.
#[async_trait]
pub trait TargetConnection: Send {
    /// Runs `sql` and materializes every returned row.
    async fn fetch_all(&mut self, sql: &str) -> EngineResult<QueryResult>;

    /// Closes the session, releasing the server-side connection.
    async fn close(self: Box<Self>) -> EngineResult<()>;
}

// SPDX-License-Identifier: Apache-2.0

//! Normalized error types for the fan-out engine
//!
//! All driver-specific errors are mapped to these unified error types so
//! callers can tell run-fatal failures from per-target ones.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all engine operations
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
pub enum EngineError {
    #[error("Unsupported database engine: {engine}")]
    UnsupportedEngine { engine: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Target discovery failed: {message}")]
    DiscoveryFailed { message: String },

    #[error("Query execution error: {message}")]
    ExecutionError { message: String },

    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Failed to persist '{name}': {message}")]
    PersistFailed { name: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Coarse classification carried by failure outcomes and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedEngine,
    Connection,
    Discovery,
    QueryExecution,
    Timeout,
    Cancelled,
    Persist,
    Config,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedEngine => "unsupported_engine",
            Self::Connection => "connection",
            Self::Discovery => "discovery",
            Self::QueryExecution => "query_execution",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Persist => "persist",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EngineError {
    pub fn unsupported_engine(engine: impl Into<String>) -> Self {
        Self::UnsupportedEngine { engine: engine.into() }
    }

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: msg.into() }
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed { message: msg.into() }
    }

    pub fn discovery_failed(msg: impl Into<String>) -> Self {
        Self::DiscoveryFailed { message: msg.into() }
    }

    pub fn execution_error(msg: impl Into<String>) -> Self {
        Self::ExecutionError { message: msg.into() }
    }

    pub fn persist_failed(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::PersistFailed {
            name: name.into(),
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config { message: msg.into() }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal { message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedEngine { .. } => ErrorKind::UnsupportedEngine,
            Self::ConnectionFailed { .. } | Self::AuthenticationFailed { .. } => {
                ErrorKind::Connection
            }
            Self::DiscoveryFailed { .. } => ErrorKind::Discovery,
            Self::ExecutionError { .. } => ErrorKind::QueryExecution,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::PersistFailed { .. } => ErrorKind::Persist,
            Self::Config { .. } => ErrorKind::Config,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Whether this error ends the whole run rather than a single target.
    ///
    /// Only errors raised before fan-out starts are fatal; everything raised
    /// inside a target task is converted into a failure outcome.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryFailed { .. } | Self::Config { .. } | Self::UnsupportedEngine { .. }
        )
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

// SPDX-License-Identifier: Apache-2.0

// Data Engine Module
// Connection building and result materialization for every supported engine

pub mod connection_url;
pub mod drivers;
pub mod error;
pub mod factory;
pub mod traits;
pub mod types;

pub use error::{EngineError, EngineResult, ErrorKind};
pub use factory::SqlxConnector;
pub use traits::{Connector, TargetConnection};
pub use types::*;

// SPDX-License-Identifier: Apache-2.0

//! Target discovery.
//!
//! Runs a discovery query on the control connection and turns the first
//! column of every row into a target, in the order the database returned.

use std::collections::HashSet;

use tracing::{instrument, warn};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::TargetConnection;
use crate::engine::types::{EngineKind, Target, Value};

/// Every connectable, non-template database on the server.
pub const POSTGRES_DISCOVERY_QUERY: &str = "SELECT datname FROM pg_database \
     WHERE datistemplate = false AND datallowconn \
     ORDER BY datname";

/// Every schema except the server's own bookkeeping ones.
pub const MYSQL_DISCOVERY_QUERY: &str = "SELECT schema_name FROM information_schema.schemata \
     WHERE schema_name NOT IN ('information_schema', 'mysql', 'performance_schema', 'sys') \
     ORDER BY schema_name";

pub fn default_discovery_query(kind: EngineKind) -> &'static str {
    match kind {
        EngineKind::Postgres => POSTGRES_DISCOVERY_QUERY,
        EngineKind::MySql => MYSQL_DISCOVERY_QUERY,
    }
}

/// Lists the targets to fan out to.
///
/// Zero rows is a valid, empty target list. Any failure to run the query is
/// a `DiscoveryFailed` error, which ends the run.
#[instrument(skip_all, fields(query_len = discovery_query.len()))]
pub async fn resolve(
    conn: &mut dyn TargetConnection,
    discovery_query: &str,
) -> EngineResult<Vec<Target>> {
    let result = conn
        .fetch_all(discovery_query)
        .await
        .map_err(|e| EngineError::discovery_failed(e.to_string()))?;

    let mut targets = Vec::with_capacity(result.rows.len());
    let mut seen = HashSet::with_capacity(result.rows.len());
    for (idx, row) in result.rows.iter().enumerate() {
        match row.values.first().and_then(identifier) {
            Some(name) if seen.contains(&name) => {
                warn!(row = idx, target_db = %name, "Duplicate target in discovery result, skipping");
            }
            Some(name) => {
                seen.insert(name.clone());
                targets.push(Target::new(name));
            }
            None => warn!(row = idx, "Discovery row has no usable identifier, skipping"),
        }
    }

    tracing::info!(count = targets.len(), "Targets discovered");
    Ok(targets)
}

fn identifier(value: &Value) -> Option<String> {
    let name = match value {
        Value::Null => return None,
        Value::Text(s) => s.clone(),
        // information_schema columns come back as binary on some MySQL builds
        Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        Value::Int(i) => i.to_string(),
        other => other.to_cell_string(),
    };

    // names are opaque: whitespace is kept, blank names are rejected
    if name.trim().is_empty() {
        None
    } else {
        Some(name)
    }
}

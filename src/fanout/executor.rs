// SPDX-License-Identifier: Apache-2.0

//! Per-target query execution.

use tracing::{instrument, warn};

use crate::engine::traits::Connector;
use crate::engine::types::{CredentialTemplate, Target};

use super::types::Outcome;

/// Runs `query` against one target and classifies the result.
///
/// Never returns an error: every failure becomes an `Outcome::Failure`.
/// The connection is closed once the query attempt is over; if this future
/// is dropped instead (deadline, cancellation), dropping the connection
/// tears the socket down.
#[instrument(skip_all, fields(target_db = %target))]
pub async fn execute(
    connector: &dyn Connector,
    template: &CredentialTemplate,
    target: &Target,
    query: &str,
) -> Outcome {
    let mut conn = match connector.connect(template, Some(target)).await {
        Ok(conn) => conn,
        Err(e) => return Outcome::failure(target, &e),
    };

    let result = conn.fetch_all(query).await;

    if let Err(e) = conn.close().await {
        warn!("Failed to close connection to {}: {}", target, e);
    }

    match result {
        Ok(result) => Outcome::from_result(target.clone(), result),
        Err(e) => Outcome::failure(target, &e),
    }
}

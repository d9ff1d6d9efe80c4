// SPDX-License-Identifier: Apache-2.0

//! Hands every artifact of a run to a sink.

use tracing::{error, info, instrument};

use crate::export::sink::ArtifactSink;
use crate::export::types::{PersistFailure, PersistSummary};
use crate::fanout::types::RunResult;

/// Persists each artifact once.
///
/// A failed write is logged and recorded; it never stops the remaining
/// writes and never removes artifacts already written.
#[instrument(skip_all)]
pub async fn persist_run(result: &RunResult, sink: &dyn ArtifactSink) -> PersistSummary {
    let mut summary = PersistSummary::default();

    for artifact in result.artifacts() {
        match sink.persist(&artifact.table, &artifact.name).await {
            Ok(path) => summary.written.push(path),
            Err(e) => {
                error!(artifact = %artifact.name, "Failed to persist artifact: {}", e);
                summary.failed.push(PersistFailure {
                    name: artifact.name.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    if result.is_no_data() {
        info!("Nothing to persist");
    } else {
        info!(
            written = summary.written.len(),
            failed = summary.failed.len(),
            "Artifacts persisted"
        );
    }
    summary
}

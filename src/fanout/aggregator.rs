// SPDX-License-Identifier: Apache-2.0

//! Combines outcomes into artifacts.
//!
//! Works purely on the outcome envelopes: row values are moved around but
//! never read.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::engine::types::{ColumnInfo, QueryResult, Target, Value};

use super::types::{AggregationMode, Artifact, Notice, NoticeStatus, Outcome, RunResult, TargetEntry};

/// Name of the column unified mode appends to tag each row with its source.
pub const SOURCE_COLUMN: &str = "database";

/// Fallback when the result set already has a column called `database`.
const SOURCE_COLUMN_ALT: &str = "source_database";

/// Builds the run result.
///
/// Outcomes are sorted by target first, so the same outcome set always
/// produces the same result regardless of completion order.
pub fn aggregate(mut outcomes: Vec<Outcome>, mode: AggregationMode, unified_name: &str) -> RunResult {
    outcomes.sort_by(|a, b| a.target().cmp(b.target()));

    if outcomes.is_empty() {
        info!("No targets to aggregate");
        return RunResult::NoData {
            notices: Vec::new(),
        };
    }

    match mode {
        AggregationMode::Unified => unify(outcomes, unified_name),
        AggregationMode::Separate => separate(outcomes),
    }
}

fn unify(outcomes: Vec<Outcome>, unified_name: &str) -> RunResult {
    let mut columns: Option<Vec<ColumnInfo>> = None;
    let mut rows = Vec::new();
    let mut notices = Vec::new();
    let mut execution_time_ms = 0.0;

    for outcome in outcomes {
        match outcome {
            Outcome::Success { target, result } => {
                let columns = columns.get_or_insert_with(|| tagged_columns(&result.columns));
                let width = columns.len() - 1;

                if result.columns.len() != width {
                    warn!(
                        target_db = %target,
                        expected = width,
                        actual = result.columns.len(),
                        "Column layout differs from the first target, aligning rows"
                    );
                }

                execution_time_ms += result.execution_time_ms;
                let tag = Value::Text(target.to_string());
                rows.extend(result.rows.into_iter().map(|mut row| {
                    row.values.resize(width, Value::Null);
                    row.values.push(tag.clone());
                    row
                }));
            }
            Outcome::Empty { target } => {
                info!(target_db = %target, "No rows to merge");
                notices.push(Notice {
                    target,
                    status: NoticeStatus::Empty,
                });
            }
            Outcome::Failure {
                target,
                kind,
                message,
            } => {
                warn!(target_db = %target, kind = %kind, "Excluded from merged result: {}", message);
                notices.push(Notice {
                    target,
                    status: NoticeStatus::Failed { kind, message },
                });
            }
        }
    }

    match columns {
        Some(columns) => RunResult::Unified {
            artifact: Artifact {
                name: unified_name.to_string(),
                table: QueryResult {
                    columns,
                    rows,
                    execution_time_ms,
                },
            },
            notices,
        },
        None => {
            info!("No results found in any database");
            RunResult::NoData { notices }
        }
    }
}

fn separate(outcomes: Vec<Outcome>) -> RunResult {
    let mut entries = BTreeMap::new();

    for outcome in outcomes {
        let (target, entry): (Target, TargetEntry) = match outcome {
            Outcome::Success { target, result } => {
                let artifact = Artifact {
                    name: target.to_string(),
                    table: result,
                };
                (target, TargetEntry::Artifact(artifact))
            }
            Outcome::Empty { target } => {
                info!(target_db = %target, "No rows for this target");
                (target, TargetEntry::Empty)
            }
            Outcome::Failure {
                target,
                kind,
                message,
            } => {
                warn!(target_db = %target, kind = %kind, "No artifact for failed target: {}", message);
                (target, TargetEntry::Failed { kind, message })
            }
        };
        entries.insert(target, entry);
    }

    RunResult::Separate { entries }
}

fn tagged_columns(columns: &[ColumnInfo]) -> Vec<ColumnInfo> {
    let name = if columns.iter().any(|c| c.name == SOURCE_COLUMN) {
        SOURCE_COLUMN_ALT
    } else {
        SOURCE_COLUMN
    };

    let mut tagged = columns.to_vec();
    tagged.push(ColumnInfo::text(name));
    tagged
}

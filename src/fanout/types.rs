// SPDX-License-Identifier: Apache-2.0

//! Types for the fan-out engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::error::{EngineError, ErrorKind};
use crate::engine::types::{QueryResult, Target};

/// Result envelope for one target. Exactly one is produced per target.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Query ran and returned at least one row
    Success { target: Target, result: QueryResult },
    /// Query ran and returned zero rows
    Empty { target: Target },
    /// Connecting, querying or materializing failed
    Failure {
        target: Target,
        kind: ErrorKind,
        message: String,
    },
}

impl Outcome {
    /// Classifies a query result: zero rows is `Empty`, anything else `Success`.
    pub fn from_result(target: Target, result: QueryResult) -> Self {
        if result.is_empty() {
            Self::Empty { target }
        } else {
            Self::Success { target, result }
        }
    }

    pub fn failure(target: &Target, error: &EngineError) -> Self {
        Self::Failure {
            target: target.clone(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn target(&self) -> &Target {
        match self {
            Self::Success { target, .. } | Self::Empty { target } | Self::Failure { target, .. } => {
                target
            }
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            Self::Success { result, .. } => result.row_count(),
            _ => 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// How outcomes are combined into artifacts. Fixed for the whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// One artifact holding every row, tagged with its source target
    #[default]
    Unified,
    /// One artifact per target
    Separate,
}

impl FromStr for AggregationMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unified" | "unify" | "y" | "yes" => Ok(Self::Unified),
            "separate" | "n" | "no" => Ok(Self::Separate),
            other => Err(EngineError::config(format!(
                "Unknown aggregation mode '{other}' (expected 'unified' or 'separate')"
            ))),
        }
    }
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unified => f.write_str("unified"),
            Self::Separate => f.write_str("separate"),
        }
    }
}

/// A tabular result ready to be handed to an artifact sink.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub name: String,
    pub table: QueryResult,
}

/// Why a target contributed nothing to the artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NoticeStatus {
    Empty,
    Failed { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub target: Target,
    #[serde(flatten)]
    pub status: NoticeStatus,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            NoticeStatus::Empty => write!(f, "{}: no rows", self.target),
            NoticeStatus::Failed { kind, message } => {
                write!(f, "{}: failed [{}] {}", self.target, kind, message)
            }
        }
    }
}

/// Per-target result in separate mode.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetEntry {
    Artifact(Artifact),
    Empty,
    Failed { kind: ErrorKind, message: String },
}

/// What a run produced, derived from the outcomes and the mode.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RunResult {
    /// Every successful row in one artifact; the rest reported as notices
    Unified {
        artifact: Artifact,
        notices: Vec<Notice>,
    },
    /// One entry per target
    Separate { entries: BTreeMap<Target, TargetEntry> },
    /// Nothing to persist
    NoData { notices: Vec<Notice> },
}

impl RunResult {
    pub fn artifacts(&self) -> Vec<&Artifact> {
        match self {
            Self::Unified { artifact, .. } => vec![artifact],
            Self::Separate { entries } => entries
                .values()
                .filter_map(|entry| match entry {
                    TargetEntry::Artifact(artifact) => Some(artifact),
                    _ => None,
                })
                .collect(),
            Self::NoData { .. } => Vec::new(),
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData { .. })
    }

    /// Empty and failed targets, in target order.
    pub fn notices(&self) -> Vec<Notice> {
        match self {
            Self::Unified { notices, .. } | Self::NoData { notices } => notices.clone(),
            Self::Separate { entries } => entries
                .iter()
                .filter_map(|(target, entry)| {
                    let status = match entry {
                        TargetEntry::Artifact(_) => return None,
                        TargetEntry::Empty => NoticeStatus::Empty,
                        TargetEntry::Failed { kind, message } => NoticeStatus::Failed {
                            kind: *kind,
                            message: message.clone(),
                        },
                    };
                    Some(Notice {
                        target: target.clone(),
                        status,
                    })
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{ColumnInfo, Row, Value};

    fn one_row() -> QueryResult {
        QueryResult {
            columns: vec![ColumnInfo::text("id")],
            rows: vec![Row {
                values: vec![Value::Int(1)],
            }],
            execution_time_ms: 1.0,
        }
    }

    #[test]
    fn zero_rows_classify_as_empty() {
        let outcome = Outcome::from_result(Target::new("db_b"), QueryResult::empty());
        assert!(matches!(outcome, Outcome::Empty { .. }));
        assert_eq!(outcome.row_count(), 0);

        let outcome = Outcome::from_result(Target::new("db_a"), one_row());
        assert_eq!(outcome.row_count(), 1);
    }

    #[test]
    fn failure_keeps_kind_and_message() {
        let outcome = Outcome::failure(
            &Target::new("db_c"),
            &EngineError::connection_failed("connection refused"),
        );
        match outcome {
            Outcome::Failure { target, kind, message } => {
                assert_eq!(target.as_str(), "db_c");
                assert_eq!(kind, ErrorKind::Connection);
                assert!(message.contains("connection refused"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn aggregation_mode_parses_prompt_answers() {
        assert_eq!("y".parse::<AggregationMode>().unwrap(), AggregationMode::Unified);
        assert_eq!("Separate".parse::<AggregationMode>().unwrap(), AggregationMode::Separate);
        assert!("maybe".parse::<AggregationMode>().is_err());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(Outcome::Empty {
            target: Target::new("db_b"),
        })
        .unwrap();
        assert_eq!(json["status"], "empty");
        assert_eq!(json["target"], "db_b");
    }
}

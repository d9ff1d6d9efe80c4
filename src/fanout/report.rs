// SPDX-License-Identifier: Apache-2.0

//! End-of-run summary.

use std::fmt;

use serde::Serialize;

use crate::engine::error::ErrorKind;
use crate::engine::types::Target;
use crate::metrics::RunMetricsSnapshot;

use super::types::Outcome;

#[derive(Debug, Clone, Serialize)]
pub struct FailedTarget {
    pub target: Target,
    pub kind: ErrorKind,
    pub message: String,
}

/// Counts and per-target details for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub total: usize,
    pub with_rows: usize,
    pub empty: Vec<Target>,
    pub failed: Vec<FailedTarget>,
    pub rows_total: usize,
    pub elapsed_ms: f64,
    pub metrics: RunMetricsSnapshot,
}

impl RunReport {
    pub fn from_outcomes(outcomes: &[Outcome], elapsed_ms: f64, metrics: RunMetricsSnapshot) -> Self {
        let mut report = Self {
            total: outcomes.len(),
            with_rows: 0,
            empty: Vec::new(),
            failed: Vec::new(),
            rows_total: 0,
            elapsed_ms,
            metrics,
        };

        for outcome in outcomes {
            match outcome {
                Outcome::Success { result, .. } => {
                    report.with_rows += 1;
                    report.rows_total += result.row_count();
                }
                Outcome::Empty { target } => report.empty.push(target.clone()),
                Outcome::Failure {
                    target,
                    kind,
                    message,
                } => report.failed.push(FailedTarget {
                    target: target.clone(),
                    kind: *kind,
                    message: message.clone(),
                }),
            }
        }

        report.empty.sort();
        report.failed.sort_by(|a, b| a.target.cmp(&b.target));
        report
    }

    /// Targets whose query ran to completion, with or without rows.
    pub fn succeeded(&self) -> usize {
        self.with_rows + self.empty.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "completed with {}/{} targets succeeded ({} with rows, {} empty, {} failed; {} rows in {:.0} ms, peak concurrency {})",
            self.succeeded(),
            self.total,
            self.with_rows,
            self.empty.len(),
            self.failed.len(),
            self.rows_total,
            self.elapsed_ms,
            self.metrics.peak_in_flight,
        )?;
        for failed in &self.failed {
            write!(f, "\n  failed  {} [{}] {}", failed.target, failed.kind, failed.message)?;
        }
        for target in &self.empty {
            write!(f, "\n  empty   {}", target)?;
        }
        Ok(())
    }
}

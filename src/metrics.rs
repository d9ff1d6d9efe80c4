// SPDX-License-Identifier: Apache-2.0

//! Lightweight in-memory metrics for a single fan-out run.
//!
//! One `RunMetrics` is created per run and shared with every target task
//! through an `Arc`; nothing outlives the run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::engine::error::ErrorKind;
use crate::fanout::types::Outcome;

#[derive(Debug, Default)]
pub struct RunMetrics {
    started: AtomicU64,
    finished: AtomicU64,
    in_flight: AtomicU64,
    peak_in_flight: AtomicU64,
    successes: AtomicU64,
    empties: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    cancelled: AtomicU64,
    duration_total_ms: AtomicU64,
    duration_max_ms: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Marks a task as actively executing until the guard is dropped.
    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.started.fetch_add(1, Ordering::Relaxed);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        fetch_max(&self.peak_in_flight, now);
        InFlightGuard {
            metrics: Arc::clone(self),
        }
    }

    /// Records the outcome of one target and how long it took.
    pub fn record(&self, outcome: &Outcome, duration_ms: f64) {
        let duration_ms = duration_ms.max(0.0) as u64;
        self.finished.fetch_add(1, Ordering::Relaxed);
        self.duration_total_ms
            .fetch_add(duration_ms, Ordering::Relaxed);
        fetch_max(&self.duration_max_ms, duration_ms);

        match outcome {
            Outcome::Success { .. } => {
                self.successes.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Empty { .. } => {
                self.empties.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Failure { kind, .. } => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                match kind {
                    ErrorKind::Timeout => {
                        self.timeouts.fetch_add(1, Ordering::Relaxed);
                    }
                    ErrorKind::Cancelled => {
                        self.cancelled.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {}
                }
            }
        }
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> RunMetricsSnapshot {
        let finished = self.finished.load(Ordering::Relaxed);
        let duration_total = self.duration_total_ms.load(Ordering::Relaxed);
        let max_ms = self.duration_max_ms.load(Ordering::Relaxed);

        let avg_ms = if finished > 0 {
            Some(duration_total as f64 / finished as f64)
        } else {
            None
        };

        RunMetricsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            finished,
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
            successes: self.successes.load(Ordering::Relaxed),
            empties: self.empties.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            avg_ms,
            max_ms: if finished > 0 { Some(max_ms) } else { None },
        }
    }
}

/// Decrements the in-flight gauge when dropped, on every exit path.
pub struct InFlightGuard {
    metrics: Arc<RunMetrics>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.metrics.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn fetch_max(cell: &AtomicU64, value: u64) {
    let mut current = cell.load(Ordering::Relaxed);
    while value > current {
        match cell.compare_exchange(current, value, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => break,
            Err(next) => current = next,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetricsSnapshot {
    pub started: u64,
    pub finished: u64,
    pub peak_in_flight: u64,
    pub successes: u64,
    pub empties: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub cancelled: u64,
    pub avg_ms: Option<f64>,
    pub max_ms: Option<u64>,
}

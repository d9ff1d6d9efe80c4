// SPDX-License-Identifier: Apache-2.0

//! Fan-out engine
//!
//! Discovers targets, runs one query against each of them with bounded
//! concurrency, and folds the per-target outcomes into artifacts.

pub mod aggregator;
pub mod executor;
pub mod report;
pub mod resolver;
pub mod runner;
pub mod scheduler;
pub mod types;

pub use aggregator::aggregate;
pub use report::RunReport;
pub use runner::{FanoutRunner, RunOutput};
pub use scheduler::{Scheduler, SchedulerOptions, DEFAULT_MAX_CONCURRENCY};
pub use types::{AggregationMode, Artifact, Notice, NoticeStatus, Outcome, RunResult, TargetEntry};

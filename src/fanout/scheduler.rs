// SPDX-License-Identifier: Apache-2.0

//! Bounded-concurrency fan-out scheduler.
//!
//! Spawns one task per target. A semaphore limits how many of them execute
//! at the same time; the rest wait for a permit. Each task yields exactly one
//! outcome, and a failing, timed-out or panicking task never affects its
//! siblings.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::engine::error::{EngineError, ErrorKind};
use crate::engine::traits::Connector;
use crate::engine::types::{CredentialTemplate, Target};
use crate::metrics::RunMetrics;

use super::executor;
use super::types::Outcome;

/// Default number of targets queried at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Upper bound on concurrently executing targets (values below 1 act as 1)
    pub max_concurrency: usize,
    /// Deadline for one target, counted from the moment it gets a slot
    pub task_timeout: Option<Duration>,
    /// Cancels every target that has not finished yet
    pub cancel: CancellationToken,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            task_timeout: None,
            cancel: CancellationToken::new(),
        }
    }
}

pub struct Scheduler {
    connector: Arc<dyn Connector>,
    options: SchedulerOptions,
    metrics: Arc<RunMetrics>,
}

impl Scheduler {
    pub fn new(connector: Arc<dyn Connector>, options: SchedulerOptions) -> Self {
        Self {
            connector,
            options,
            metrics: RunMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &Arc<RunMetrics> {
        &self.metrics
    }

    /// Queries every target and waits for all of them.
    ///
    /// Returns one outcome per target, in submission order.
    #[instrument(skip_all, fields(targets = targets.len(), max_concurrency = self.options.max_concurrency))]
    pub async fn run(
        &self,
        targets: &[Target],
        template: Arc<CredentialTemplate>,
        query: Arc<str>,
    ) -> Vec<Outcome> {
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let mut handles = Vec::with_capacity(targets.len());

        for target in targets {
            let task = TargetTask {
                target: target.clone(),
                connector: Arc::clone(&self.connector),
                template: Arc::clone(&template),
                query: Arc::clone(&query),
                semaphore: Arc::clone(&semaphore),
                metrics: Arc::clone(&self.metrics),
                timeout: self.options.task_timeout,
                cancel: self.options.cancel.clone(),
            };

            handles.push(tokio::spawn(task.run()));
        }

        let joined = join_all(handles).await;

        let mut outcomes = Vec::with_capacity(joined.len());
        for (target, result) in targets.iter().zip(joined) {
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Task for {} did not complete: {}", target, e);
                    let outcome = Outcome::Failure {
                        target: target.clone(),
                        kind: ErrorKind::Internal,
                        message: format!("Target task panicked: {e}"),
                    };
                    self.metrics.record(&outcome, 0.0);
                    outcome
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }
}

/// Everything one spawned task owns.
struct TargetTask {
    target: Target,
    connector: Arc<dyn Connector>,
    template: Arc<CredentialTemplate>,
    query: Arc<str>,
    semaphore: Arc<Semaphore>,
    metrics: Arc<RunMetrics>,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl TargetTask {
    async fn run(self) -> Outcome {
        let start = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Outcome::failure(&self.target, &EngineError::Cancelled),
            outcome = self.admitted() => outcome,
        };

        self.metrics
            .record(&outcome, start.elapsed().as_secs_f64() * 1000.0);
        log_outcome(&outcome);
        outcome
    }

    async fn admitted(&self) -> Outcome {
        let _permit = match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return Outcome::failure(
                    &self.target,
                    &EngineError::internal("scheduler semaphore closed"),
                )
            }
        };
        let _in_flight = self.metrics.enter();

        let work = executor::execute(
            self.connector.as_ref(),
            &self.template,
            &self.target,
            &self.query,
        );

        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(outcome) => outcome,
                Err(_) => Outcome::failure(
                    &self.target,
                    &EngineError::Timeout {
                        timeout_ms: limit.as_millis() as u64,
                    },
                ),
            },
            None => work.await,
        }
    }
}

fn log_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Success { target, result } => {
            info!(target_db = %target, rows = result.row_count(), "Target processed")
        }
        Outcome::Empty { target } => info!(target_db = %target, "No rows returned"),
        Outcome::Failure {
            target,
            kind,
            message,
        } => warn!(target_db = %target, kind = %kind, "Target failed: {}", message),
    }
}

// SPDX-License-Identifier: Apache-2.0

//! Run orchestration: discover targets, fan out, aggregate.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::RunSettings;
use crate::engine::error::{EngineError, EngineResult, ErrorKind};
use crate::engine::traits::Connector;
use crate::engine::types::{CredentialTemplate, Target};

use super::aggregator::aggregate;
use super::report::RunReport;
use super::resolver::{default_discovery_query, resolve};
use super::scheduler::{Scheduler, SchedulerOptions};
use super::types::{AggregationMode, RunResult};

/// Everything a finished run hands back.
#[derive(Debug)]
pub struct RunOutput {
    pub run_id: Uuid,
    /// Targets in discovery order
    pub targets: Vec<Target>,
    pub result: RunResult,
    pub report: RunReport,
}

pub struct FanoutRunner {
    connector: Arc<dyn Connector>,
    settings: RunSettings,
    cancel: CancellationToken,
}

impl FanoutRunner {
    pub fn new(connector: Arc<dyn Connector>, settings: RunSettings) -> Self {
        Self {
            connector,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `cancel` to stop the run early.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Runs `query` on every discovered target and aggregates the outcomes.
    ///
    /// Only a failure before fan-out starts (bad engine, unreachable control
    /// connection, failing discovery query) is returned as an error. Once
    /// targets are known, per-target failures end up in the result instead.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty, mode = %mode))]
    pub async fn run(
        &self,
        template: CredentialTemplate,
        discovery_query: Option<&str>,
        query: &str,
        mode: AggregationMode,
    ) -> EngineResult<RunOutput> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let start = Instant::now();

        let targets = self.discover(&template, discovery_query).await?;

        let scheduler = Scheduler::new(
            Arc::clone(&self.connector),
            SchedulerOptions {
                max_concurrency: self.settings.max_concurrency,
                task_timeout: self.settings.task_timeout,
                cancel: self.cancel.clone(),
            },
        );

        let outcomes = scheduler
            .run(&targets, Arc::new(template), Arc::from(query))
            .await;

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let report = RunReport::from_outcomes(&outcomes, elapsed_ms, scheduler.metrics().snapshot());
        let result = aggregate(outcomes, mode, &self.settings.unified_name);

        info!(
            total = report.total,
            succeeded = report.succeeded(),
            failed = report.failed.len(),
            rows = report.rows_total,
            "Fan-out finished"
        );

        Ok(RunOutput {
            run_id,
            targets,
            result,
            report,
        })
    }

    /// Opens the control connection and lists the targets.
    async fn discover(
        &self,
        template: &CredentialTemplate,
        discovery_query: Option<&str>,
    ) -> EngineResult<Vec<Target>> {
        let kind = template.engine_kind()?;
        let discovery_query = discovery_query.unwrap_or_else(|| default_discovery_query(kind));

        let mut conn = self
            .connector
            .connect(template, None)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::UnsupportedEngine | ErrorKind::Config => e,
                _ => EngineError::discovery_failed(format!("Control connection failed: {e}")),
            })?;

        let targets = resolve(conn.as_mut(), discovery_query).await;

        if let Err(e) = conn.close().await {
            warn!("Failed to close control connection: {}", e);
        }

        let targets = targets?;
        if targets.is_empty() {
            warn!("Discovery returned no targets");
        }
        Ok(targets)
    }
}

// SPDX-License-Identifier: Apache-2.0

//! In-memory connector used by the integration tests.
//!
//! The control connection (no target) answers the discovery query with the
//! configured target names; target connections follow a per-target script.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use dbfanout::engine::error::{EngineError, EngineResult};
use dbfanout::engine::traits::{Connector, TargetConnection};
use dbfanout::engine::types::{ColumnInfo, CredentialTemplate, QueryResult, Row, Target, Value};

#[derive(Debug, Clone)]
pub enum Script {
    /// Returns `n` rows of `(id, total)`
    Rows(i64),
    Empty,
    RefuseConnect,
    FailQuery,
    Panic,
}

/// Open-connection gauge shared by every mock connection.
#[derive(Debug, Default)]
pub struct Probe {
    open: AtomicUsize,
    peak: AtomicUsize,
    connects: AtomicUsize,
    closed: AtomicUsize,
    discovery_sql: Mutex<Option<String>>,
}

impl Probe {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn discovery_sql(&self) -> Option<String> {
        self.discovery_sql.lock().unwrap().clone()
    }
}

pub struct MockConnector {
    targets: Vec<String>,
    scripts: HashMap<String, Script>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    fail_discovery: bool,
    probe: Arc<Probe>,
}

impl MockConnector {
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            scripts: HashMap::new(),
            delays: HashMap::new(),
            default_delay: Duration::ZERO,
            fail_discovery: false,
            probe: Arc::new(Probe::default()),
        }
    }

    pub fn script(mut self, target: &str, script: Script) -> Self {
        self.scripts.insert(target.to_string(), script);
        self
    }

    pub fn delay(mut self, target: &str, delay: Duration) -> Self {
        self.delays.insert(target.to_string(), delay);
        self
    }

    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn fail_discovery(mut self) -> Self {
        self.fail_discovery = true;
        self
    }

    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        template: &CredentialTemplate,
        target: Option<&Target>,
    ) -> EngineResult<Box<dyn TargetConnection>> {
        template.engine_kind()?;

        let Some(target) = target else {
            return Ok(Box::new(ControlConnection {
                targets: self.targets.clone(),
                fail: self.fail_discovery,
                probe: Arc::clone(&self.probe),
            }));
        };

        let script = self
            .scripts
            .get(target.as_str())
            .cloned()
            .unwrap_or(Script::Rows(1));

        if matches!(script, Script::RefuseConnect) {
            return Err(EngineError::connection_failed(format!(
                "connection to {} refused",
                target
            )));
        }

        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        let open = self.probe.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.peak.fetch_max(open, Ordering::SeqCst);

        Ok(Box::new(MockConnection {
            target: target.clone(),
            script,
            delay: self
                .delays
                .get(target.as_str())
                .copied()
                .unwrap_or(self.default_delay),
            probe: Arc::clone(&self.probe),
        }))
    }
}

struct ControlConnection {
    targets: Vec<String>,
    fail: bool,
    probe: Arc<Probe>,
}

#[async_trait]
impl TargetConnection for ControlConnection {
    async fn fetch_all(&mut self, sql: &str) -> EngineResult<QueryResult> {
        *self.probe.discovery_sql.lock().unwrap() = Some(sql.to_string());
        if self.fail {
            return Err(EngineError::execution_error("permission denied for pg_database"));
        }

        Ok(QueryResult {
            columns: vec![ColumnInfo::text("datname")],
            rows: self
                .targets
                .iter()
                .map(|name| Row {
                    values: vec![Value::Text(name.clone())],
                })
                .collect(),
            execution_time_ms: 0.1,
        })
    }

    async fn close(self: Box<Self>) -> EngineResult<()> {
        Ok(())
    }
}

struct MockConnection {
    target: Target,
    script: Script,
    delay: Duration,
    probe: Arc<Probe>,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.probe.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TargetConnection for MockConnection {
    async fn fetch_all(&mut self, _sql: &str) -> EngineResult<QueryResult> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.script {
            Script::Rows(n) => Ok(QueryResult {
                columns: vec![ColumnInfo::text("id"), ColumnInfo::text("total")],
                rows: (1..=n)
                    .map(|i| Row {
                        values: vec![Value::Int(i), Value::Int(i * 10)],
                    })
                    .collect(),
                execution_time_ms: 1.0,
            }),
            Script::Empty => Ok(QueryResult::empty()),
            Script::FailQuery => Err(EngineError::execution_error(format!(
                "relation \"orders\" does not exist in {}",
                self.target
            ))),
            Script::Panic => panic!("driver blew up on {}", self.target),
            Script::RefuseConnect => unreachable!("refused before connecting"),
        }
    }

    async fn close(self: Box<Self>) -> EngineResult<()> {
        self.probe.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn template() -> CredentialTemplate {
    CredentialTemplate {
        engine: "postgresql".into(),
        host: "localhost".into(),
        port: 5432,
        username: "reader".into(),
        password: "secret".into(),
        database: "postgres".into(),
    }
}

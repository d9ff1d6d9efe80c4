// dbfanout - run one read query across many databases sharing a schema
// Core library

pub mod config;
pub mod engine;
pub mod export;
pub mod fanout;
pub mod metrics;
pub mod observability;

pub use config::{ConnectionProfile, RunSettings};
pub use engine::{Connector, EngineError, EngineResult, ErrorKind, SqlxConnector, TargetConnection};
pub use export::{persist_run, ArtifactFormat, ArtifactSink, FileSink, PersistSummary};
pub use fanout::{AggregationMode, FanoutRunner, Outcome, RunOutput, RunReport, RunResult};

// SPDX-License-Identifier: Apache-2.0

//! Connection profiles, query files and run settings.
//!
//! Profiles live in a YAML file with a top-level `databases:` map:
//!
//! ```yaml
//! databases:
//!   reporting:
//!     engine: postgresql
//!     host: db.internal
//!     port: 5432
//!     username: reader
//!     password: "s3cr@t"
//!     database: postgres
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::CredentialTemplate;
use crate::export::types::ArtifactFormat;
use crate::fanout::scheduler::DEFAULT_MAX_CONCURRENCY;

pub const DEFAULT_PROFILES_FILE: &str = "conn_profiles.yaml";
pub const DEFAULT_SQL_DIR: &str = "sql";
pub const DEFAULT_OUTPUT_DIR: &str = "out";
pub const DEFAULT_UNIFIED_NAME: &str = "grouped_results";

#[derive(Debug, Deserialize)]
struct ProfileStore {
    #[serde(default)]
    databases: BTreeMap<String, ConnectionProfile>,
}

/// One named entry of the profile file.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionProfile {
    #[serde(flatten)]
    pub credentials: CredentialTemplate,
    /// Overrides the engine's built-in target discovery query
    #[serde(default)]
    pub discovery_query: Option<String>,
}

/// Loads the profile called `name` from the YAML file at `path`.
pub fn load_profile(path: &Path, name: &str) -> EngineResult<ConnectionProfile> {
    let content = fs::read_to_string(path).map_err(|e| {
        EngineError::config(format!(
            "Connection profile file not found at {}: {}",
            path.display(),
            e
        ))
    })?;

    let mut store: ProfileStore = serde_yaml::from_str(&content)
        .map_err(|e| EngineError::config(format!("Invalid profile file {}: {}", path.display(), e)))?;

    let profile = store.databases.remove(name).ok_or_else(|| {
        EngineError::config(format!(
            "Connection profile '{}' not found in {}",
            name,
            path.display()
        ))
    })?;

    info!(profile = name, engine = %profile.credentials.engine, "Connection profile loaded");
    Ok(profile)
}

/// Reads the query text from `<sql_dir>/<file>`.
///
/// An empty file is only a warning: the run goes ahead and each target will
/// report whatever the server makes of an empty statement.
pub fn load_query(sql_dir: &Path, file: &str) -> EngineResult<String> {
    let path = sql_dir.join(file);
    if !path.is_file() {
        return Err(EngineError::config(format!(
            "Query file not found: {}",
            path.display()
        )));
    }

    let query = fs::read_to_string(&path)
        .map_err(|e| EngineError::config(format!("Failed to read {}: {}", path.display(), e)))?;

    if query.trim().is_empty() {
        warn!(path = %path.display(), "Query file is empty");
    }

    info!(path = %path.display(), "Query loaded");
    Ok(query)
}

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub max_concurrency: usize,
    pub task_timeout: Option<Duration>,
    pub output_dir: PathBuf,
    /// Artifact name used in unified mode
    pub unified_name: String,
    pub format: ArtifactFormat,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            task_timeout: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            unified_name: DEFAULT_UNIFIED_NAME.to_string(),
            format: ArtifactFormat::default(),
        }
    }
}

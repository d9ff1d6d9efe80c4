// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::error::EngineError;

/// File format artifacts are written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ArtifactFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }
}

impl FromStr for ArtifactFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsx" | "excel" => Ok(Self::Xlsx),
            "csv" => Ok(Self::Csv),
            other => Err(EngineError::config(format!(
                "Unknown artifact format '{other}' (expected 'xlsx' or 'csv')"
            ))),
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PersistFailure {
    pub name: String,
    pub message: String,
}

/// What `persist_run` managed to write.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PersistSummary {
    pub written: Vec<PathBuf>,
    pub failed: Vec<PersistFailure>,
}

impl PersistSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// SPDX-License-Identifier: Apache-2.0

//! Artifact sinks.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::QueryResult;
use crate::export::types::ArtifactFormat;
use crate::export::writers::create_writer;

/// Destination for aggregated tables.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Writes one table under a name derived from `name` and returns where it
    /// went.
    async fn persist(&self, table: &QueryResult, name: &str) -> EngineResult<PathBuf>;
}

/// Writes each artifact to `<output_dir>/<name>_<YYYYmmdd_HHMMSS>.<ext>`.
#[derive(Debug, Clone)]
pub struct FileSink {
    output_dir: PathBuf,
    format: ArtifactFormat,
}

impl FileSink {
    pub fn new(output_dir: impl Into<PathBuf>, format: ArtifactFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn format(&self) -> ArtifactFormat {
        self.format
    }

    fn render(&self, table: &QueryResult, name: &str) -> EngineResult<Vec<u8>> {
        let mut writer = create_writer(self.format, name)?;
        writer.write_header(&table.columns)?;
        for row in &table.rows {
            writer.write_row(&table.columns, row)?;
        }
        writer.finish()
    }
}

#[async_trait]
impl ArtifactSink for FileSink {
    #[instrument(skip(self, table), fields(rows = table.row_count(), format = %self.format))]
    async fn persist(&self, table: &QueryResult, name: &str) -> EngineResult<PathBuf> {
        let bytes = self.render(table, name)?;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| {
                EngineError::persist_failed(
                    name,
                    format!("Failed to create {}: {}", self.output_dir.display(), e),
                )
            })?;

        let path = unique_path(&self.output_dir, name, self.format, Local::now()).await;
        write_file(&path, &bytes)
            .await
            .map_err(|e| EngineError::persist_failed(name, format!("Failed to write {}: {}", path.display(), e)))?;

        info!(path = %path.display(), bytes = bytes.len(), "Artifact written");
        Ok(path)
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await
}

/// Path for an artifact written at `now`.
pub fn artifact_path(
    output_dir: &Path,
    name: &str,
    format: ArtifactFormat,
    now: DateTime<Local>,
) -> PathBuf {
    output_dir.join(format!(
        "{}_{}.{}",
        sanitize_name(name),
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    ))
}

/// Avoids clobbering an artifact written within the same second.
async fn unique_path(
    output_dir: &Path,
    name: &str,
    format: ArtifactFormat,
    now: DateTime<Local>,
) -> PathBuf {
    let base = artifact_path(output_dir, name, format, now);
    if !tokio::fs::try_exists(&base).await.unwrap_or(false) {
        return base;
    }

    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut n = 2;
    loop {
        let candidate = output_dir.join(format!("{stem}_{n}.{}", format.extension()));
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

/// Replaces characters that are unsafe in file names.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "artifact".to_string()
    } else {
        cleaned.to_string()
    }
}

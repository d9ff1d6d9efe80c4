// SPDX-License-Identifier: Apache-2.0

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{ColumnInfo, Row, Value};
use crate::export::writers::ArtifactWriter;

pub struct CsvWriter {
    name: String,
    writer: csv::Writer<Vec<u8>>,
}

impl CsvWriter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            writer: csv::WriterBuilder::new()
                .flexible(false)
                .from_writer(Vec::new()),
        }
    }

    fn fail(&self, e: impl std::fmt::Display) -> EngineError {
        EngineError::persist_failed(&self.name, e.to_string())
    }
}

impl ArtifactWriter for CsvWriter {
    fn write_header(&mut self, columns: &[ColumnInfo]) -> EngineResult<()> {
        if columns.is_empty() {
            return Ok(());
        }

        self.writer
            .write_record(columns.iter().map(|col| col.name.as_str()))
            .map_err(|e| self.fail(e))
    }

    fn write_row(&mut self, columns: &[ColumnInfo], row: &Row) -> EngineResult<()> {
        if columns.is_empty() {
            return Ok(());
        }

        let fields = (0..columns.len())
            .map(|idx| row.values.get(idx).unwrap_or(&Value::Null).to_cell_string());
        self.writer.write_record(fields).map_err(|e| self.fail(e))
    }

    fn finish(self: Box<Self>) -> EngineResult<Vec<u8>> {
        let name = self.name;
        self.writer
            .into_inner()
            .map_err(|e| EngineError::persist_failed(name, e.to_string()))
    }
}

// SPDX-License-Identifier: Apache-2.0

use crate::engine::error::EngineResult;
use crate::engine::types::{ColumnInfo, Row};
use crate::export::types::ArtifactFormat;

pub mod csv;
pub mod xlsx;

/// Renders one table into the bytes of an artifact file.
///
/// Writers buffer in memory; the sink owns the file I/O.
pub trait ArtifactWriter: Send {
    fn write_header(&mut self, columns: &[ColumnInfo]) -> EngineResult<()>;
    fn write_row(&mut self, columns: &[ColumnInfo], row: &Row) -> EngineResult<()>;
    fn finish(self: Box<Self>) -> EngineResult<Vec<u8>>;
}

pub fn create_writer(format: ArtifactFormat, name: &str) -> EngineResult<Box<dyn ArtifactWriter>> {
    match format {
        ArtifactFormat::Csv => Ok(Box::new(csv::CsvWriter::new(name)) as Box<dyn ArtifactWriter>),
        ArtifactFormat::Xlsx => {
            Ok(Box::new(xlsx::XlsxWriter::new(name)?) as Box<dyn ArtifactWriter>)
        }
    }
}

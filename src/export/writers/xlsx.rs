// SPDX-License-Identifier: Apache-2.0

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use tracing::warn;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{ColumnInfo, Row, Value};
use crate::export::writers::ArtifactWriter;

const SHEET_NAME: &str = "Results";

/// Excel's hard limit on the length of one cell's text.
const MAX_CELL_CHARS: usize = 32_767;

/// Single-sheet workbook: bold header row, then one row per result row.
pub struct XlsxWriter {
    name: String,
    workbook: Workbook,
    current_row: u32,
    header_format: Format,
}

impl XlsxWriter {
    pub fn new(name: &str) -> EngineResult<Self> {
        let mut workbook = Workbook::new();
        workbook
            .add_worksheet()
            .set_name(SHEET_NAME)
            .map_err(|e| EngineError::persist_failed(name, e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            workbook,
            current_row: 0,
            header_format: Format::new().set_bold(),
        })
    }

    fn fail(&self, e: XlsxError) -> EngineError {
        EngineError::persist_failed(&self.name, e.to_string())
    }

    fn write_value(
        worksheet: &mut Worksheet,
        row: u32,
        col: u16,
        value: &Value,
    ) -> Result<(), XlsxError> {
        match value {
            Value::Null => {}
            Value::Bool(b) => {
                worksheet.write_boolean(row, col, *b)?;
            }
            Value::Int(i) => {
                worksheet.write_number(row, col, *i as f64)?;
            }
            Value::Float(f) => {
                worksheet.write_number(row, col, *f)?;
            }
            other => {
                worksheet.write_string(row, col, fit_cell(other.to_cell_string(), row, col))?;
            }
        }
        Ok(())
    }
}

fn fit_cell(text: String, row: u32, col: u16) -> String {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => {
            warn!(row, col, chars = text.chars().count(), "Cell text exceeds the XLSX limit, truncating");
            text[..cut].to_string()
        }
        None => text,
    }
}

impl ArtifactWriter for XlsxWriter {
    fn write_header(&mut self, columns: &[ColumnInfo]) -> EngineResult<()> {
        let worksheet = match self.workbook.worksheet_from_index(0) {
            Ok(worksheet) => worksheet,
            Err(e) => return Err(EngineError::persist_failed(&self.name, e.to_string())),
        };

        for (col_idx, col) in columns.iter().enumerate() {
            if let Err(e) =
                worksheet.write_string_with_format(0, col_idx as u16, &col.name, &self.header_format)
            {
                return Err(self.fail(e));
            }
        }

        self.current_row = 1;
        Ok(())
    }

    fn write_row(&mut self, columns: &[ColumnInfo], row: &Row) -> EngineResult<()> {
        let worksheet = match self.workbook.worksheet_from_index(0) {
            Ok(worksheet) => worksheet,
            Err(e) => return Err(EngineError::persist_failed(&self.name, e.to_string())),
        };

        for idx in 0..columns.len() {
            let value = row.values.get(idx).unwrap_or(&Value::Null);
            if let Err(e) = Self::write_value(worksheet, self.current_row, idx as u16, value) {
                return Err(EngineError::persist_failed(&self.name, e.to_string()));
            }
        }

        self.current_row += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> EngineResult<Vec<u8>> {
        self.workbook
            .save_to_buffer()
            .map_err(|e| EngineError::persist_failed(&self.name, format!("Failed to generate XLSX: {e}")))
    }
}

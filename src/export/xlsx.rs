//! Spreadsheet serialization of normalized tables.

use anyhow::Result;
use chrono::Utc;
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::normalize::Table;

/// Width of the identity column in the generated sheet.
const IDENTITY_WIDTH: f64 = 20.0;

/// Width of every other column.
const COLUMN_WIDTH: f64 = 15.0;

/// Writes normalized tables as `.xlsx` workbooks.
pub struct SheetWriter {
    output_dir: PathBuf,
}

impl SheetWriter {
    /// Create a writer that places workbooks under the given directory.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write one table; the file name is the table's suggested stem plus
    /// a millisecond timestamp so repeated exports never collide.
    pub fn write(&self, table: &Table) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        for (index, column) in table.columns.iter().enumerate() {
            let col = index as u16;
            worksheet.write_string(0, col, column.as_str())?;
            let width = if index == 0 { IDENTITY_WIDTH } else { COLUMN_WIDTH };
            worksheet.set_column_width(col, width)?;
        }

        for (row_index, row) in table.rows.iter().enumerate() {
            for (col_index, column) in table.columns.iter().enumerate() {
                if let Some(value) = row.get(column) {
                    worksheet.write_string(
                        row_index as u32 + 1,
                        col_index as u16,
                        value.as_str(),
                    )?;
                }
            }
        }

        let file_name = format!(
            "{}_{}.xlsx",
            sanitize_stem(&table.file_stem),
            Utc::now().timestamp_millis()
        );
        let path = self.output_dir.join(file_name);
        workbook.save(&path)?;

        debug!(path = %path.display(), rows = table.rows.len(), "wrote workbook");
        Ok(path)
    }

    /// Directory the writer targets.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Strip path separators and other filesystem-hostile characters from a
/// suggested file stem.
fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();

    if cleaned.trim().is_empty() {
        "export".to_string()
    } else {
        cleaned
    }
}

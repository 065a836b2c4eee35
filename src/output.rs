//! Tabular output
//!
//! Rows are flattened onto one column list: the static columns first, then
//! every field column in the order it is first seen across rows.

use crate::types::{Cell, ResultRow, STATIC_COLUMNS};
use crate::log_debug;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use indexmap::{IndexMap, IndexSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Output file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// Destination for result rows
pub trait TableSink {
    fn write_rows(&mut self, rows: &[ResultRow]) -> Result<()>;
}

/// Column order for a set of rows
pub fn columns(rows: &[ResultRow]) -> Vec<String> {
    let mut columns: IndexSet<String> = STATIC_COLUMNS.iter().map(|c| (*c).to_string()).collect();
    for row in rows {
        for column in row.field_columns() {
            if !columns.contains(column) {
                columns.insert(column.to_string());
            }
        }
    }
    columns.into_iter().collect()
}

/// RFC 4180 CSV writer
pub struct CsvSink<W: Write> {
    writer: W,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record<'a>(&mut self, fields: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let line = fields
            .into_iter()
            .map(escape_csv)
            .collect::<Vec<_>>()
            .join(",");
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        Ok(())
    }
}

impl<W: Write> TableSink for CsvSink<W> {
    fn write_rows(&mut self, rows: &[ResultRow]) -> Result<()> {
        let columns = columns(rows);
        self.write_record(columns.iter().map(String::as_str))?;
        for row in rows {
            let cells: Vec<String> = columns.iter().map(|c| row.get(c).to_string()).collect();
            self.write_record(cells.iter().map(String::as_str))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// JSON array of objects, one per row, keys in column order
pub struct JsonSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TableSink for JsonSink<W> {
    fn write_rows(&mut self, rows: &[ResultRow]) -> Result<()> {
        let columns = columns(rows);
        let records: Vec<IndexMap<&str, Cell>> = rows
            .iter()
            .map(|row| columns.iter().map(|c| (c.as_str(), row.get(c))).collect())
            .collect();
        serde_json::to_writer_pretty(&mut self.writer, &records)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// `extracted_data_<UTC timestamp>.<ext>` in the working directory
pub fn default_output_path(format: OutputFormat, now: DateTime<Utc>) -> PathBuf {
    PathBuf::from(format!(
        "extracted_data_{}.{}",
        now.format("%Y%m%dT%H%M%SZ"),
        format.extension()
    ))
}

/// Write rows to a file in the chosen format
pub fn write_rows_to_file(rows: &[ResultRow], path: &Path, format: OutputFormat) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    let writer = BufWriter::new(file);
    match format {
        OutputFormat::Csv => CsvSink::new(writer).write_rows(rows)?,
        OutputFormat::Json => JsonSink::new(writer).write_rows(rows)?,
    }
    log_debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

//! Tabular export
//!
//! Renders query rows as CSV (through a polars `DataFrame`) or Excel, and
//! parses uploaded CSV back into JSON records.

use crate::db::Row;
use crate::error::{AgentError, Result};
use chrono::{DateTime, Local};
use indexmap::IndexSet;
use polars::prelude::*;
use rust_xlsxwriter::Workbook;
use serde_json::Value;
use std::fmt;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Excel,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xlsx",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            _ => Err(AgentError::Export(format!("Unsupported format: {}", s))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => f.write_str("csv"),
            ExportFormat::Excel => f.write_str("excel"),
        }
    }
}

/// `exported_data_<YYYYmmdd_HHMMSS>.<ext>`
pub fn export_filename(extension: &str, now: DateTime<Local>) -> String {
    format!("exported_data_{}.{}", now.format("%Y%m%d_%H%M%S"), extension)
}

/// Column names in first-seen order across all rows.
pub fn column_names(rows: &[Row]) -> Vec<String> {
    let mut names = IndexSet::new();
    for row in rows {
        for key in row.keys() {
            names.insert(key.clone());
        }
    }
    names.into_iter().collect()
}

pub fn export_rows(rows: &[Row], format: ExportFormat) -> Result<Vec<u8>> {
    if rows.is_empty() {
        return Err(AgentError::Export("No data to export".to_string()));
    }
    match format {
        ExportFormat::Csv => rows_to_csv(rows),
        ExportFormat::Excel => rows_to_xlsx(rows),
    }
}

/// One typed column, with the type decided over every row rather than a sample.
///
/// Bools, integers (signed, then unsigned) and numbers keep a numeric column;
/// anything mixed becomes text, with nested values written as JSON.
fn column_series(name: &str, rows: &[Row]) -> Series {
    let values: Vec<Option<&Value>> = rows
        .iter()
        .map(|row| row.get(name).filter(|v| !v.is_null()))
        .collect();
    let present = || values.iter().flatten();

    if present().next().is_none() {
        return Series::new(name, vec![None::<String>; values.len()]);
    }
    if present().all(|v| v.is_boolean()) {
        let column: Vec<Option<bool>> = values.iter().map(|v| v.and_then(Value::as_bool)).collect();
        return Series::new(name, column);
    }
    if present().all(|v| v.is_i64()) {
        let column: Vec<Option<i64>> = values.iter().map(|v| v.and_then(Value::as_i64)).collect();
        return Series::new(name, column);
    }
    if present().all(|v| v.is_u64()) {
        let column: Vec<Option<u64>> = values.iter().map(|v| v.and_then(Value::as_u64)).collect();
        return Series::new(name, column);
    }
    if present().all(|v| v.is_number()) {
        let column: Vec<Option<f64>> = values.iter().map(|v| v.and_then(Value::as_f64)).collect();
        return Series::new(name, column);
    }

    let column: Vec<Option<String>> = values
        .iter()
        .map(|v| {
            v.map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        })
        .collect();
    Series::new(name, column)
}

fn rows_to_dataframe(rows: &[Row]) -> Result<DataFrame> {
    let columns: Vec<Series> = column_names(rows)
        .iter()
        .map(|name| column_series(name, rows))
        .collect();
    Ok(DataFrame::new(columns)?)
}

fn rows_to_csv(rows: &[Row]) -> Result<Vec<u8>> {
    let mut df = rows_to_dataframe(rows)?;
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf).include_header(true).finish(&mut df)?;
    Ok(buf)
}

fn rows_to_xlsx(rows: &[Row]) -> Result<Vec<u8>> {
    let columns = column_names(rows);
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string(0, col as u16, name)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let r = (idx + 1) as u32;
        for (col, name) in columns.iter().enumerate() {
            let c = col as u16;
            match row.get(name) {
                None | Some(Value::Null) => {}
                Some(Value::Bool(b)) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
                Some(Value::Number(n)) => match n.as_f64() {
                    Some(f) => {
                        worksheet.write_number(r, c, f)?;
                    }
                    None => {
                        worksheet.write_string(r, c, n.to_string())?;
                    }
                },
                Some(Value::String(s)) => {
                    worksheet.write_string(r, c, s)?;
                }
                Some(other) => {
                    worksheet.write_string(r, c, other.to_string())?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Persist bytes to a named temp file that outlives this process.
pub fn persist_temp(bytes: &[u8], extension: &str) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("exported_data_")
        .suffix(&format!(".{}", extension))
        .tempfile()?;
    file.write_all(bytes)?;
    let (_, path) = file.keep().map_err(|e| AgentError::Io(e.error))?;
    Ok(path)
}

/// Parse CSV (header row, column types inferred from every line) into JSON records.
pub fn csv_to_records(content: &[u8]) -> Result<Vec<Value>> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(content.to_vec()))
        .finish()?;
    let mut buf = Vec::new();
    JsonWriter::new(&mut buf)
        .with_json_format(JsonFormat::Json)
        .finish(&mut df)?;
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(&buf)?)
}

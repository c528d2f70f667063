//! Output formatting
//!
//! Renders rows as a table, JSON, NDJSON or YAML.

mod table;

pub use table::TableFormatter;

use crate::pipeline::{Column, Row};
use clap::ValueEnum;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    /// One JSON object per line, written as rows arrive
    Ndjson,
    Yaml,
}

/// Rows collected for rendering, projected onto the selected columns
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<Column>,
    pub rows: Vec<Map<String, Value>>,
}

impl QueryResult {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: &Row) {
        self.rows.push(row.project(&self.columns));
    }

    pub fn format(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => TableFormatter::format(self),
            OutputFormat::Json => serde_json::to_string_pretty(&self.rows).unwrap_or_else(|_| "[]".to_string()),
            OutputFormat::Ndjson => self
                .rows
                .iter()
                .map(|r| Value::Object(r.clone()).to_string())
                .collect::<Vec<_>>()
                .join("\n"),
            OutputFormat::Yaml => serde_yaml::to_string(&self.rows).unwrap_or_else(|_| "[]".to_string()),
        }
    }
}

/// Single NDJSON line for a row
pub fn ndjson_line(row: &Row, columns: &[Column]) -> String {
    Value::Object(row.project(columns)).to_string()
}

use std::borrow::Cow;

use comfy_table::{presets::ASCII_BORDERS_ONLY_CONDENSED, Table};
use serde_json::Value;

use super::QueryResult;
use crate::pipeline::Column;

/// Maximum width for JSON-valued columns
const MAX_JSON_COLUMN_WIDTH: usize = 60;

/// Truncate a string to max_len chars, adding "..." if truncated
fn truncate_value(s: &str, max_len: usize) -> Cow<'_, str> {
    if s.chars().count() <= max_len {
        Cow::Borrowed(s)
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        Cow::Owned(format!("{}...", truncated))
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => truncate_value(&other.to_string(), MAX_JSON_COLUMN_WIDTH).into_owned(),
    }
}

pub struct TableFormatter;

impl TableFormatter {
    pub fn format(result: &QueryResult) -> String {
        if result.rows.is_empty() {
            return "(0 rows)".to_string();
        }

        let mut table = Table::new();
        table.load_preset(ASCII_BORDERS_ONLY_CONDENSED);
        table.set_header(result.columns.iter().map(|c| c.name()));

        for row in &result.rows {
            table.add_row(
                result
                    .columns
                    .iter()
                    .map(|c: &Column| cell(row.get(c.name()))),
            );
        }

        let count = result.rows.len();
        format!(
            "{}\n({} row{})",
            table,
            count,
            if count == 1 { "" } else { "s" }
        )
    }
}

//! Console rendering shared by provider commands and the CLI.

use clap::ValueEnum;
use serde::Serialize;
use serde_json::{Map, Value};

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Left-aligned table with a header and a divider line.
pub fn render_table(columns: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let render_row = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render_row(columns.to_vec())];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        lines.push(render_row(row.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}

/// Tables go to stderr so stdout stays clean for `eval`.
pub fn print_table(columns: &[&str], rows: &[Vec<String>]) {
    eprintln!("{}", render_table(columns, rows));
}

/// One `key: value` line per entry. Nested values are shown as JSON.
pub fn render_record(record: &Map<String, Value>) -> String {
    record
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("{}: {}", key, s),
            other => format!("{}: {}", key, other),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn print_record(record: &Map<String, Value>) {
    if record.is_empty() {
        eprintln!("{{}}");
    } else {
        eprintln!("{}", render_record(record));
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: {}", e),
    }
}

/// Print a message on stderr.
pub fn print_note(message: &str) {
    eprintln!("{}", message);
}

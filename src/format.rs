//! Plain-text rendering for the command-line subcommands.
//!
//! Results print like the MySQL client: a boxed ASCII table for rows, a
//! one-line summary for acknowledgments and the raw DDL for structures.

use crate::models::{MetadataNode, ResultColumn, ResultSet, SemanticType};
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(_) | JsonValue::Object(_) => value.to_string(),
    }
}

/// Render any result for a terminal.
pub fn format_result(result: &ResultSet, elapsed_ms: u64) -> String {
    match result {
        ResultSet::Rows { columns, data, .. } => format_as_table(columns, data, elapsed_ms),
        ResultSet::Affected { records_affected } => {
            let row_text = if *records_affected == 1 { "row" } else { "rows" };
            format!(
                "Query OK, {} {} affected ({:.2} sec)\n",
                records_affected,
                row_text,
                elapsed_ms as f64 / 1000.0
            )
        }
        ResultSet::Structure { query } => format!("{}\n", query),
    }
}

pub fn format_as_table(columns: &[ResultColumn], rows: &[Vec<JsonValue>], elapsed_ms: u64) -> String {
    if columns.is_empty() {
        return "Empty set\n".to_string();
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(format_value).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.name.width()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    let mut output = String::new();
    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("| {} ", pad(&col.name, *w, Align::Center)))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);
    output.push_str(&separator);

    for row in &cells {
        let line: String = columns
            .iter()
            .zip(&widths)
            .zip(row)
            .map(|((col, w), cell)| {
                let align = if col.column_type == SemanticType::Number {
                    Align::Right
                } else {
                    Align::Left
                };
                format!("| {} ", pad(cell, *w, align))
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&line);
    }
    output.push_str(&separator);

    let row_text = if rows.len() == 1 { "row" } else { "rows" };
    output.push_str(&format!(
        "{} {} in set ({:.2} sec)\n",
        rows.len(),
        row_text,
        elapsed_ms as f64 / 1000.0
    ));
    output
}

/// Indented outline of a node list.
pub fn format_tree(nodes: &[MetadataNode]) -> String {
    let mut output = String::new();
    write_nodes(&mut output, nodes, 0);
    output
}

fn write_nodes(output: &mut String, nodes: &[MetadataNode], depth: usize) {
    for node in nodes {
        let marker = if node.collapsed { "+" } else { "-" };
        output.push_str(&"  ".repeat(depth));
        output.push_str(&format!("{} {}", marker, node.label));
        if let Some(details) = &node.details {
            output.push_str(&format!("  ({})", details));
        }
        output.push('\n');
        if let Some(children) = &node.children {
            write_nodes(output, children, depth + 1);
        }
    }
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
    Center,
}

// `format!` width counts chars, not terminal columns.
fn pad(text: &str, width: usize, align: Align) -> String {
    let fill = width.saturating_sub(text.width());
    match align {
        Align::Left => format!("{}{}", text, " ".repeat(fill)),
        Align::Right => format!("{}{}", " ".repeat(fill), text),
        Align::Center => {
            let left = fill / 2;
            format!("{}{}{}", " ".repeat(left), text, " ".repeat(fill - left))
        }
    }
}

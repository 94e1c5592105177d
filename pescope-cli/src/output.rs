use comfy_table::{presets, CellAlignment, ContentArrangement, Table};
use serde::Serialize;

use crate::app::GlobalOptions;

/// Prints `data` as pretty JSON with `--json`, otherwise hands it to `display`.
pub fn print_output<T: Serialize>(
    data: &T,
    opts: &GlobalOptions,
    display: impl FnOnce(&T),
) -> anyhow::Result<()> {
    if opts.json {
        println!("{}", serde_json::to_string_pretty(data)?);
    } else {
        display(data);
    }
    Ok(())
}

/// Column alignment.
#[derive(Clone, Copy)]
pub enum Align {
    Left,
    Right,
}

/// Borderless, whitespace-aligned table.
pub struct TabWriter {
    table: Table,
    indent: &'static str,
    rows: usize,
}

impl TabWriter {
    /// Creates a table from `(header, alignment)` pairs.
    pub fn new(columns: &[(&str, Align)]) -> Self {
        let mut table = Table::new();
        table
            .load_preset(presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Disabled)
            .set_header(columns.iter().map(|(name, _)| *name));

        // two spaces between columns, none at the outer edges
        let last = columns.len().saturating_sub(1);
        for (index, (_, align)) in columns.iter().enumerate() {
            if let Some(column) = table.column_mut(index) {
                column.set_cell_alignment(match align {
                    Align::Left => CellAlignment::Left,
                    Align::Right => CellAlignment::Right,
                });
                column.set_padding((u16::from(index != 0), u16::from(index != last)));
            }
        }

        Self {
            table,
            indent: "",
            rows: 0,
        }
    }

    /// Prefixes every printed line with `prefix`.
    pub fn indent(mut self, prefix: &'static str) -> Self {
        self.indent = prefix;
        self
    }

    /// Adds a row in column order.
    pub fn row(&mut self, values: Vec<String>) {
        self.table.add_row(values);
        self.rows += 1;
    }

    /// Prints the table, or `(none)` when no row was added.
    pub fn print(&self) {
        if self.rows == 0 {
            println!("{}(none)", self.indent);
            return;
        }
        for line in self.table.to_string().lines() {
            println!("{}{}", self.indent, line.trim_end());
        }
    }
}

/// Prints aligned `key: value` lines.
pub fn print_fields(fields: &[(&str, String)]) {
    let width = fields.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    for (key, value) in fields {
        println!("{:<width$}  {value}", format!("{key}:"), width = width + 1);
    }
}

/// `0x`-prefixed lower-case hex.
pub fn hex(value: u64) -> String {
    format!("0x{value:x}")
}

/// [`hex`] or `-` for absent values.
pub fn hex_opt(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), hex)
}

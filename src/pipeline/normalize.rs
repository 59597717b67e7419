//! Normalization: turn a transformed table into enum-ready rows.
//!
//! Passes run in a fixed order on the table in place:
//!
//! 1. drop empty `children` lists (recursively)
//! 2. drop value ranges (`"10h to 7Fh"`), which are not enumerable
//! 3. synthesize `name` from `definition`, `description` or `brief`
//! 4. rewrite values from NVMe notation (`1Ah`) to C hex (`0x1A`)
//!
//! The `value`-dependent passes only run when the first row of the table
//! had a `value` field.

use crate::output::{Row, Table};
use tracing::{debug, warn};

/// Substring marking a reserved or continuous value range.
const RANGE_MARKER: &str = "to";

/// Apply every normalization pass to `table`.
pub fn normalize(table: &mut Table) {
    remove_empty_children(&mut table.rows);
    remove_value_ranges(table);
    generate_names(table);
    convert_values_to_hex(table);
}

fn remove_empty_children(rows: &mut [Row]) {
    for row in rows {
        match row.children.as_mut() {
            Some(children) if children.is_empty() => row.children = None,
            Some(children) => remove_empty_children(children),
            None => {}
        }
    }
}

fn remove_value_ranges(table: &mut Table) {
    if !table.has_heading("value") {
        return;
    }
    let before = table.rows.len();
    table.rows.retain(|row| {
        row.value
            .as_deref()
            .map_or(true, |value| !value.contains(RANGE_MARKER))
    });
    debug!(
        "Table '{}': dropped {} range rows",
        table.name,
        before - table.rows.len()
    );
}

fn generate_names(table: &mut Table) {
    for row in table.rows.iter_mut().filter(|row| row.name.is_none()) {
        let source = row
            .field("definition")
            .or_else(|| row.field("description"))
            .or(row.brief.as_deref());
        match source {
            Some(source) => row.name = Some(symbol_from(source)),
            None => warn!(
                "Table '{}': row has no name, definition, description or brief",
                table.name
            ),
        }
    }
}

/// `"Temperature Threshold"` → `"TEMPERATURE_THRESHOLD"`.
fn symbol_from(text: &str) -> String {
    text.trim().to_uppercase().replace(['\n', ' '], "_")
}

fn convert_values_to_hex(table: &mut Table) {
    if !table.has_heading("value") {
        return;
    }
    for value in table.rows.iter_mut().filter_map(|row| row.value.as_mut()) {
        *value = to_hex(value);
    }
}

/// `"1Ah"` → `"0x1A"`. Values already in C notation are left alone.
fn to_hex(value: &str) -> String {
    let value = value.trim();
    if value.starts_with("0x") {
        return value.to_string();
    }
    let digits = value.strip_suffix('h').unwrap_or(value);
    format!("0x{digits}")
}

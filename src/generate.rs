//! C header generation from normalized tables.
//!
//! Every table becomes one `enum`, preceded by a Doxygen block that
//! documents each member:
//!
//! ```text
//! /**
//!  * @var ARBITRATION Arbitration
//!  * @enum feat_tbl
//!  */
//! enum feat_tbl {
//!     ARBITRATION = 0x01,
//! };
//! ```
//!
//! Names and values are emitted as found; no C identifier validation is
//! done here.

use crate::error::SpectractError;
use crate::output::{Row, TableMap};
use std::path::Path;
use tracing::{info, warn};

/// One enumerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub symbol: String,
    pub value: Option<String>,
    pub doc: String,
}

/// An enum derived from one normalized table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedEnum {
    pub name: String,
    pub members: Vec<EnumMember>,
}

impl GeneratedEnum {
    /// Build the enum for `rows`. Rows without a name are skipped.
    pub fn from_rows(name: &str, rows: &[Row]) -> Self {
        let members = rows
            .iter()
            .filter_map(|row| {
                let Some(symbol) = row.name.clone() else {
                    warn!("Enum '{}': skipping row without a name", name);
                    return None;
                };
                Some(EnumMember {
                    symbol,
                    value: row.value.clone(),
                    doc: single_line(row.description()),
                })
            })
            .collect();

        Self {
            name: name.to_string(),
            members,
        }
    }

    /// Render the documentation block and the declaration.
    pub fn render(&self) -> String {
        let mut out = String::from("/**\n");
        for member in &self.members {
            if member.doc.is_empty() {
                out.push_str(&format!(" * @var {}\n", member.symbol));
            } else {
                out.push_str(&format!(" * @var {} {}\n", member.symbol, member.doc));
            }
        }
        out.push_str(&format!(" * @enum {}\n", self.name));
        out.push_str(" */\n");

        out.push_str(&format!("enum {} {{\n", self.name));
        for member in &self.members {
            match &member.value {
                Some(value) => out.push_str(&format!("    {} = {},\n", member.symbol, value)),
                None => out.push_str(&format!("    {},\n", member.symbol)),
            }
        }
        out.push_str("};\n");
        out
    }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Render a whole header: a file-level Doxygen block, then one enum per
/// table in name order.
pub fn generate_header(tables: &TableMap, header_name: &str) -> String {
    let mut out = format!("/**\n * @headerfile {header_name}\n */\n");
    for (name, rows) in tables {
        out.push('\n');
        out.push_str(&GeneratedEnum::from_rows(name, rows).render());
    }
    out
}

/// Read a normalized table file.
pub async fn load_tables(path: &Path) -> Result<TableMap, SpectractError> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SpectractError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => SpectractError::InvalidTableFile {
            path: path.to_path_buf(),
            detail: e.to_string(),
        },
    })?;

    serde_yaml::from_str(&text).map_err(|e| SpectractError::InvalidTableFile {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Generate a header from the normalized table file at `input` and write it
/// to `output`. Returns the number of enums written.
pub async fn generate_to_file(input: &Path, output: &Path) -> Result<usize, SpectractError> {
    let tables = load_tables(input).await?;
    let header_name = output
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "header.h".to_string());

    let header = generate_header(&tables, &header_name);
    crate::schedule::write_atomic(output, header.as_bytes()).await?;

    info!(
        "Wrote {} enums to {}",
        tables.len(),
        output.display()
    );
    Ok(tables.len())
}

//! Output types: typed rows, tables, and the merged table map.
//!
//! A [`Row`] keeps the fields the header generator understands as typed
//! members (`name`, `value`, bit/byte spans) and everything else verbatim in
//! [`Row::fields`], keyed by the column heading it came from. Serialisation
//! flattens those extra fields next to the typed ones so the YAML reads like
//! the table it was extracted from.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A `bits` or `bytes` cell.
///
/// Cells that do not read as `hi:lo` or `n` keep their text, so the typed
/// key still round-trips through YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Span {
    /// `[high, low]`.
    Range([u32; 2]),
    Text(String),
}

/// One record of an extracted table.
///
/// `children` is `Some` for rows produced by the transformer and becomes
/// `None` once the normalizer has removed an empty list, so the key only
/// appears in the output when the row had continuation rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits: Option<Span>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<Span>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Cells stored verbatim under their heading (`description`, `definition`, …).
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Row>>,
}

impl Row {
    /// A fresh row as the transformer creates it: no fields, empty children.
    pub fn new() -> Self {
        Self {
            children: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// Look up a verbatim field by heading.
    pub fn field(&self, heading: &str) -> Option<&str> {
        self.fields.get(heading).map(String::as_str)
    }

    /// Names of every populated field, typed or verbatim.
    pub fn field_names(&self) -> BTreeSet<String> {
        let typed = [
            ("name", self.name.is_some()),
            ("brief", self.brief.is_some()),
            ("verbose", self.verbose.is_some()),
            ("bits", self.bits.is_some()),
            ("bytes", self.bytes.is_some()),
            ("value", self.value.is_some()),
        ];
        typed
            .iter()
            .filter(|(_, present)| *present)
            .map(|(key, _)| key.to_string())
            .chain(self.fields.keys().cloned())
            .collect()
    }

    /// Text used for the `@var` documentation line: `description`, else
    /// `definition`, else `brief`.
    pub fn description(&self) -> &str {
        self.field("description")
            .or_else(|| self.field("definition"))
            .or(self.brief.as_deref())
            .unwrap_or("")
    }
}

/// A table built for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Target name; becomes the key in [`TableMap`] and the C enum name.
    pub name: String,
    /// Caption found above the first selected table, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Field names present on the first row.
    pub headings: BTreeSet<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, caption: Option<String>, rows: Vec<Row>) -> Self {
        let headings = rows.first().map(Row::field_names).unwrap_or_default();
        Self {
            name: name.into(),
            caption,
            headings,
            rows,
        }
    }

    pub fn has_heading(&self, heading: &str) -> bool {
        self.headings.contains(heading)
    }
}

/// The serialised artifact: table name → normalized rows.
///
/// A sorted map so the file is identical regardless of which worker
/// finished first.
pub type TableMap = BTreeMap<String, Vec<Row>>;

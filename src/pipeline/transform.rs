//! Row transformation: raw cell grids → typed [`Row`] records.
//!
//! ## Nested tables
//!
//! Many NVMe tables describe a field and then break it down in a nested
//! table placed to the right of the parent's columns:
//!
//! ```text
//! | Bits | Description                         |
//! | 31:8 | Reserved                            |
//! | 7:0  | Feature Identifier (FID): …         |
//! |      | Value | Definition                  |   ← subheading row
//! |      | 00h   | Reserved                    |   ← child of 7:0
//! |      | 01h   | Arbitration                 |   ← child of 7:0
//! ```
//!
//! Rows with a blank first cell continue the latest top-level row. A
//! continuation whose cell at the nested-table offset is `bits`, `bytes`,
//! `value` or `code` introduces the nested headings; later continuations
//! are parsed with them.
//!
//! ## Cell classification
//!
//! Each cell runs through a fixed list of rules, first match wins:
//!
//! 1. `bits` / `bytes` columns holding `hi:lo`
//! 2. `Brief (NAME): verbose`
//! 3. `Brief: verbose`
//! 4. anything else, stored verbatim under its heading (unparsable spans
//!    keep their text in the typed `bits` / `bytes` slot)

use crate::output::{Row, Span};
use crate::pipeline::tables::extract_headings;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Cell texts that mark a continuation row as nested-table headings.
const SUBHEADING_MARKERS: [&str; 4] = ["bits", "bytes", "value", "code"];

static RE_NAME_BRIEF_VERBOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<brief>.+?)\((?P<name>.+?)\):(?P<verbose>.+)").unwrap());

static RE_BRIEF_VERBOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<brief>.+?):(?P<verbose>.+)").unwrap());

/// What a single cell contributes to its row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// A `bits` or `bytes` span, `[high, low]`.
    Span { heading: String, span: [u32; 2] },
    NameBriefVerbose {
        name: String,
        brief: String,
        verbose: String,
    },
    BriefVerbose { brief: String, verbose: String },
    Verbatim { heading: String, text: String },
}

impl Field {
    /// Store the field on `row`, replacing any earlier value for the same key.
    fn apply(self, row: &mut Row) {
        match self {
            Field::Span { heading, span } => {
                if heading == "bits" {
                    row.bits = Some(Span::Range(span));
                } else {
                    row.bytes = Some(Span::Range(span));
                }
            }
            Field::NameBriefVerbose {
                name,
                brief,
                verbose,
            } => {
                row.name = Some(name);
                row.brief = Some(brief);
                row.verbose = Some(verbose);
            }
            Field::BriefVerbose { brief, verbose } => {
                row.brief = Some(brief);
                row.verbose = Some(verbose);
            }
            Field::Verbatim { heading, text } => match heading.as_str() {
                "name" => row.name = Some(text),
                "brief" => row.brief = Some(text),
                "verbose" => row.verbose = Some(text),
                "value" => row.value = Some(text),
                "bits" => row.bits = Some(Span::Text(text)),
                "bytes" => row.bytes = Some(Span::Text(text)),
                _ => {
                    row.fields.insert(heading, text);
                }
            },
        }
    }
}

/// A classification rule: `(heading, cell) → Some(field)` when it applies.
type Rule = fn(&str, &str) -> Option<Field>;

const RULES: [Rule; 3] = [span_rule, name_brief_verbose_rule, brief_verbose_rule];

fn span_rule(heading: &str, cell: &str) -> Option<Field> {
    if heading != "bits" && heading != "bytes" {
        return None;
    }
    let mut parts = cell.trim().splitn(2, ':');
    let high = parts.next()?.trim().parse::<u32>().ok()?;
    let low = match parts.next() {
        Some(low) => low.trim().parse::<u32>().ok()?,
        None => high,
    };
    Some(Field::Span {
        heading: heading.to_string(),
        span: [high, low],
    })
}

fn name_brief_verbose_rule(_heading: &str, cell: &str) -> Option<Field> {
    let flat = cell.replace('\n', "");
    let caps = RE_NAME_BRIEF_VERBOSE.captures(&flat)?;
    Some(Field::NameBriefVerbose {
        name: caps["name"].trim().to_lowercase(),
        brief: caps["brief"].trim().to_string(),
        verbose: caps["verbose"].trim().to_string(),
    })
}

fn brief_verbose_rule(_heading: &str, cell: &str) -> Option<Field> {
    let flat = cell.replace('\n', "");
    let caps = RE_BRIEF_VERBOSE.captures(&flat)?;
    Some(Field::BriefVerbose {
        brief: caps["brief"].trim().to_string(),
        verbose: caps["verbose"].trim().to_string(),
    })
}

/// Classify one cell under `heading`.
pub fn classify(heading: &str, cell: &str) -> Field {
    RULES
        .iter()
        .find_map(|rule| rule(heading, cell))
        .unwrap_or_else(|| Field::Verbatim {
            heading: heading.to_string(),
            text: cell.to_string(),
        })
}

/// Parse the cells at `offset..offset + headings.len()` of a raw row.
///
/// Missing cells read as empty.
pub fn parse_row(cells: &[String], headings: &[String], offset: usize) -> Row {
    let mut row = Row::new();
    for (i, heading) in headings.iter().enumerate() {
        let cell = cells.get(offset + i).map(String::as_str).unwrap_or("");
        classify(heading, cell).apply(&mut row);
    }
    row
}

/// Nested-table headings seen since the last top-level row.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Subheadings {
    NoSubheadings,
    HasSubheadings(Vec<String>),
}

/// Turn the data rows of a table into [`Row`]s.
pub fn transform_rows(headings: &[String], rows: &[Vec<String>]) -> Vec<Row> {
    let offset = headings.len();
    let mut output: Vec<Row> = Vec::new();
    let mut state = Subheadings::NoSubheadings;

    for cells in rows {
        let first = cells.first().map(String::as_str).unwrap_or("");
        if !first.is_empty() {
            output.push(parse_row(cells, headings, 0));
            state = Subheadings::NoSubheadings;
            continue;
        }

        let nested = cells.get(offset).map(String::as_str).unwrap_or("");
        if nested.is_empty() {
            continue;
        }
        let Some(parent) = output.last_mut() else {
            warn!("Continuation row before any top-level row: {:?}", cells);
            continue;
        };

        let is_marker = SUBHEADING_MARKERS.contains(&nested.trim().to_lowercase().as_str());
        if state == Subheadings::NoSubheadings && is_marker {
            state = Subheadings::HasSubheadings(extract_headings(cells));
            continue;
        }

        let child = match &state {
            Subheadings::HasSubheadings(subheadings) => parse_row(cells, subheadings, offset),
            Subheadings::NoSubheadings => parse_row(cells, headings, offset),
        };
        parent.children.get_or_insert_with(Vec::new).push(child);
    }

    output
}

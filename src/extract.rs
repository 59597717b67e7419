//! Per-target extraction: PDF pages → one transformed [`Table`].
//!
//! The scheduler only sees the [`TableSource`] trait. The default
//! implementation, [`PdfTableSource`], loads the page layouts through
//! pdfium, then runs caption and table detection on two scoped threads.
//! Pairing captions with tables and selecting the requested indices happens
//! in [`build_table`], which is pure and tested without a PDF.

use crate::config::{ExtractConfig, PageRange};
use crate::error::{SpectractError, TargetError, TargetResult};
use crate::job::Target;
use crate::output::Table;
use crate::pipeline::captions::{extract_captions, CaptionStyle};
use crate::pipeline::layout::{bind_pdfium, load_layouts, PageLayout};
use crate::pipeline::tables::{detect_tables, RawTable};
use crate::pipeline::transform::transform_rows;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Produces the table for one target.
///
/// Runs on a blocking thread. Return `Ok(Err(_))` for problems confined to
/// the target and `Err(_)` for problems that must stop the batch.
pub trait TableSource: Send + Sync {
    fn extract(&self, target: &Target) -> TargetResult<Table>;
}

/// The pdfium-backed [`TableSource`].
#[derive(Debug, Clone)]
pub struct PdfTableSource {
    lib_path: Option<PathBuf>,
    password: Option<String>,
    line_scale: f32,
    caption_style: CaptionStyle,
}

impl PdfTableSource {
    /// Build a source from `config`, binding pdfium once up front so a
    /// missing library fails before any target is dispatched.
    pub fn from_config(config: &ExtractConfig) -> Result<Self, SpectractError> {
        bind_pdfium(config.pdfium_lib_path.as_deref())?;
        Ok(Self {
            lib_path: config.pdfium_lib_path.clone(),
            password: config.password.clone(),
            line_scale: config.line_scale,
            caption_style: CaptionStyle {
                font_size: config.caption_font_size,
                join_gap: config.caption_tolerance,
            },
        })
    }

    fn layouts(&self, path: &Path, pages: PageRange, name: &str) -> TargetResult<Vec<PageLayout>> {
        if let Err(e) = check_pdf(path, name) {
            return Ok(Err(e));
        }
        let pdfium = bind_pdfium(self.lib_path.as_deref())?;
        Ok(load_layouts(
            &pdfium,
            path,
            self.password.as_deref(),
            pages,
            name,
        ))
    }

    /// Captions of the first page and the tables of every page, detected in
    /// parallel.
    fn detect(&self, layouts: &[PageLayout]) -> (Vec<String>, Vec<RawTable>) {
        std::thread::scope(|scope| {
            let captions = scope.spawn(|| {
                layouts
                    .first()
                    .map(|page| extract_captions(page, &self.caption_style))
                    .unwrap_or_default()
            });
            let tables: Vec<RawTable> = layouts
                .iter()
                .flat_map(|page| detect_tables(page, self.line_scale))
                .collect();
            // A panic in caption detection is a bug, resurface it here.
            let captions = captions
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            (captions, tables)
        })
    }
}

impl TableSource for PdfTableSource {
    fn extract(&self, target: &Target) -> TargetResult<Table> {
        let layouts = match self.layouts(&target.input, target.pages, &target.name)? {
            Ok(layouts) => layouts,
            Err(e) => return Ok(Err(e)),
        };
        let (captions, tables) = self.detect(&layouts);
        debug!(
            "Target '{}': {} tables, {} captions on pages {}",
            target.name,
            tables.len(),
            captions.len(),
            target.pages
        );
        build_table(target, tables, captions).map(Ok)
    }
}

/// Check that `path` exists and starts with the `%PDF` magic bytes.
fn check_pdf(path: &Path, name: &str) -> Result<(), TargetError> {
    let mut file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => TargetError::FileNotFound {
            name: name.to_string(),
            path: path.to_path_buf(),
        },
        _ => TargetError::UnreadablePdf {
            name: name.to_string(),
            detail: format!("{}: {}", path.display(), e),
        },
    })?;

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
        return Err(TargetError::UnreadablePdf {
            name: name.to_string(),
            detail: format!("{}: not a PDF file", path.display()),
        });
    }
    Ok(())
}

/// Pair detected tables with captions and build the selected table.
///
/// The first selected table supplies the caption and the headings; the
/// heading row of every selected table is dropped and the remaining rows are
/// concatenated in order.
pub fn build_table(
    target: &Target,
    tables: Vec<RawTable>,
    captions: Vec<String>,
) -> Result<Table, SpectractError> {
    if tables.len() != captions.len() {
        return Err(SpectractError::CaptionMismatch {
            name: target.name.clone(),
            pages: target.pages.to_string(),
            tables: tables.len(),
            captions: captions.len(),
        });
    }
    let last = target.tables.last();
    if last >= tables.len() {
        return Err(SpectractError::TableIndexOutOfRange {
            name: target.name.clone(),
            index: last,
            found: tables.len(),
        });
    }

    let first = target.tables.first();
    let headings = tables[first].headings();
    let rows: Vec<Vec<String>> = tables[target.tables.iter()]
        .iter()
        .flat_map(|table| table.data_rows().iter().cloned())
        .collect();

    let caption = captions.into_iter().nth(first);
    Ok(Table::new(
        target.name.clone(),
        caption,
        transform_rows(&headings, &rows),
    ))
}

// ── Inspection ───────────────────────────────────────────────────────────

/// What the heuristics see on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    /// 1-indexed page number.
    pub page: usize,
    pub captions: Vec<String>,
    pub tables: Vec<RawTable>,
}

/// Run caption and table detection on each page of `pages` and report the
/// raw results, without pairing or transforming them.
pub async fn inspect(
    path: &Path,
    pages: PageRange,
    config: &ExtractConfig,
) -> Result<Vec<PageReport>, SpectractError> {
    let path = path.to_path_buf();
    let lib_path = config.pdfium_lib_path.clone();
    let password = config.password.clone();
    let line_scale = config.line_scale;
    let style = CaptionStyle {
        font_size: config.caption_font_size,
        join_gap: config.caption_tolerance,
    };

    tokio::task::spawn_blocking(move || {
        let name = path.display().to_string();
        if let Err(TargetError::FileNotFound { path, .. }) = check_pdf(&path, &name) {
            return Err(SpectractError::FileNotFound { path });
        }
        let pdfium = bind_pdfium(lib_path.as_deref())?;
        let layouts = load_layouts(&pdfium, &path, password.as_deref(), pages, &name)
            .map_err(|e| SpectractError::InvalidTarget {
                name: name.clone(),
                detail: e.to_string(),
            })?;

        Ok(layouts
            .iter()
            .map(|layout| PageReport {
                page: layout.index + 1,
                captions: extract_captions(layout, &style),
                tables: detect_tables(layout, line_scale),
            })
            .collect())
    })
    .await
    .map_err(|e| SpectractError::Internal(format!("Inspect task panicked: {e}")))?
}

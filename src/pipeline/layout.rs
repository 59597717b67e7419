//! Page layout: the positional view of a PDF page every heuristic works on.
//!
//! pdfium is only touched here. It hands out glyphs (one per character,
//! with font and bounding box) and path objects; this module turns them into
//! plain data (a [`PageLayout`]) so caption and table detection are pure
//! functions that can be tested with hand-built pages.
//!
//! All coordinates use a top-left origin, in PDF points.

use crate::config::PageRange;
use crate::error::{SpectractError, TargetError};
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Path objects thinner than this are treated as a single line.
const RULING_THICKNESS: f32 = 2.0;

/// An axis-aligned box, top-left origin.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    fn from_pdfrect(rect: PdfRect, page_height: f32) -> Self {
        Self {
            x0: rect.left().value,
            y0: page_height - rect.top().value,
            x1: rect.right().value,
            y1: page_height - rect.bottom().value,
        }
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    #[inline(always)]
    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    #[inline(always)]
    pub(crate) fn merge(&mut self, other: &Self) {
        self.x0 = self.x0.min(other.x0);
        self.y0 = self.y0.min(other.y0);
        self.x1 = self.x1.max(other.x1);
        self.y1 = self.y1.max(other.y1);
    }

    /// True when `y` lies within the vertical extent of the box.
    #[inline(always)]
    pub(crate) fn spans_y(&self, y: f32) -> bool {
        y >= self.y0 && y <= self.y1
    }
}

/// One character drawn on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub ch: char,
    pub bbox: BBox,
    pub font_name: String,
    pub font_size: f32,
    pub bold: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A straight line segment drawn on the page.
///
/// For a horizontal ruling `position` is its y and `start..end` its x
/// extent; for a vertical ruling the axes swap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ruling {
    pub orientation: Orientation,
    pub position: f32,
    pub start: f32,
    pub end: f32,
}

impl Ruling {
    pub fn horizontal(y: f32, x0: f32, x1: f32) -> Self {
        Self {
            orientation: Orientation::Horizontal,
            position: y,
            start: x0.min(x1),
            end: x0.max(x1),
        }
    }

    pub fn vertical(x: f32, y0: f32, y1: f32) -> Self {
        Self {
            orientation: Orientation::Vertical,
            position: x,
            start: y0.min(y1),
            end: y0.max(y1),
        }
    }

    #[inline(always)]
    pub fn length(&self) -> f32 {
        self.end - self.start
    }

    /// Rulings implied by the bounds of a path object.
    ///
    /// Thin objects are a single line; anything larger is taken as a
    /// rectangle and contributes its four edges.
    pub fn from_bounds(b: &BBox) -> Vec<Ruling> {
        let thin_x = b.width() <= RULING_THICKNESS;
        let thin_y = b.height() <= RULING_THICKNESS;
        match (thin_x, thin_y) {
            (true, true) => vec![],
            (false, true) => vec![Ruling::horizontal((b.y0 + b.y1) / 2.0, b.x0, b.x1)],
            (true, false) => vec![Ruling::vertical((b.x0 + b.x1) / 2.0, b.y0, b.y1)],
            (false, false) => vec![
                Ruling::horizontal(b.y0, b.x0, b.x1),
                Ruling::horizontal(b.y1, b.x0, b.x1),
                Ruling::vertical(b.x0, b.y0, b.y1),
                Ruling::vertical(b.x1, b.y0, b.y1),
            ],
        }
    }
}

/// A run of glyphs on one line sharing a font, like a `pdftohtml -xml`
/// `<text>` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    pub bbox: BBox,
    pub font_name: String,
    pub font_size: f32,
    pub bold: bool,
    pub text: String,
}

impl TextElement {
    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.bbox.x0
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.bbox.x1
    }

    fn start(glyph: &Glyph) -> Self {
        Self {
            bbox: glyph.bbox,
            font_name: glyph.font_name.clone(),
            font_size: glyph.font_size,
            bold: glyph.bold,
            text: glyph.ch.to_string(),
        }
    }

    /// Whether `glyph` continues this element on the same line.
    fn accepts(&self, glyph: &Glyph) -> bool {
        let (_, cy) = glyph.bbox.center();
        let gap = glyph.bbox.x0 - self.bbox.x1;
        glyph.font_name == self.font_name
            && glyph.bold == self.bold
            && (glyph.font_size - self.font_size).abs() < 0.1
            && self.bbox.spans_y(cy)
            && gap <= self.font_size.max(1.0)
            && glyph.bbox.x0 >= self.bbox.x0 - 1.0
    }
}

/// Everything the heuristics need to know about one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    /// 0-indexed page number.
    pub index: usize,
    pub width: f32,
    pub height: f32,
    /// Glyphs in content-stream order.
    pub glyphs: Vec<Glyph>,
    pub rulings: Vec<Ruling>,
}

impl PageLayout {
    /// Group glyphs into text elements, sorted top-to-bottom then
    /// left-to-right.
    pub fn text_elements(&self) -> Vec<TextElement> {
        let mut elements: Vec<TextElement> = Vec::new();
        let mut current: Option<TextElement> = None;

        for glyph in &self.glyphs {
            if glyph.ch.is_whitespace() {
                if let Some(el) = current.as_mut() {
                    el.text.push(' ');
                }
                continue;
            }
            match current.as_mut() {
                Some(el) if el.accepts(glyph) => {
                    el.text.push(glyph.ch);
                    el.bbox.merge(&glyph.bbox);
                }
                _ => {
                    if let Some(done) = current.take() {
                        elements.push(finish_element(done));
                    }
                    current = Some(TextElement::start(glyph));
                }
            }
        }
        if let Some(done) = current {
            elements.push(finish_element(done));
        }

        elements.sort_by(|a, b| {
            a.bbox
                .y0
                .total_cmp(&b.bbox.y0)
                .then(a.bbox.x0.total_cmp(&b.bbox.x0))
        });
        elements
    }
}

fn finish_element(mut el: TextElement) -> TextElement {
    let trimmed = el.text.trim_end().len();
    el.text.truncate(trimmed);
    el
}

// ── pdfium access ────────────────────────────────────────────────────────

/// Bind to libpdfium, at `lib_path` when given, else the system library.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, SpectractError> {
    let bindings = match lib_path {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| SpectractError::PdfiumBindingFailed(e.to_string()))?;
    Ok(Pdfium::new(bindings))
}

/// Load the layout of every page in `pages`.
///
/// `name` identifies the target in the returned errors.
pub fn load_layouts(
    pdfium: &Pdfium,
    pdf_path: &Path,
    password: Option<&str>,
    pages: PageRange,
    name: &str,
) -> Result<Vec<PageLayout>, TargetError> {
    let unreadable = |detail: String| TargetError::UnreadablePdf {
        name: name.to_string(),
        detail,
    };

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| unreadable(format!("{}: {:?}", pdf_path.display(), e)))?;

    let doc_pages = document.pages();
    let total_pages = doc_pages.len() as usize;

    let mut layouts = Vec::with_capacity(pages_to_load(pages, total_pages));
    for idx in pages.to_indices() {
        if idx >= total_pages {
            return Err(TargetError::PageOutOfRange {
                name: name.to_string(),
                page: idx + 1,
                total: total_pages,
            });
        }
        let page = doc_pages
            .get(idx as u16)
            .map_err(|e| unreadable(format!("page {}: {:?}", idx + 1, e)))?;
        let layout = read_page_layout(&page, idx)
            .map_err(|e| unreadable(format!("page {}: {:?}", idx + 1, e)))?;
        layouts.push(layout);
    }

    Ok(layouts)
}

/// Number of pages `load_layouts` can return, bounded by the document.
fn pages_to_load(pages: PageRange, total_pages: usize) -> usize {
    (pages.last.saturating_sub(pages.first) + 1).min(total_pages)
}

fn read_page_layout(page: &PdfPage, index: usize) -> Result<PageLayout, PdfiumError> {
    let width = page.width().value;
    let height = page.height().value;

    let mut glyphs = Vec::new();
    let text = page.text()?;
    for ch in text.chars().iter() {
        let Some(c) = ch.unicode_char() else {
            continue;
        };
        if c.is_control() {
            continue;
        }
        let Ok(rect) = ch.tight_bounds() else {
            continue;
        };
        let font_name = ch.font_name();
        glyphs.push(Glyph {
            ch: c,
            bbox: BBox::from_pdfrect(rect, height),
            bold: is_bold(ch.font_weight(), &font_name),
            font_name,
            font_size: ch.unscaled_font_size().value,
        });
    }

    let mut rulings = Vec::new();
    for object in page.objects().iter() {
        if object.object_type() != PdfPageObjectType::Path {
            continue;
        }
        let Ok(bounds) = object.bounds() else {
            continue;
        };
        let bbox = BBox::from_pdfrect(bounds.to_rect(), height);
        rulings.extend(Ruling::from_bounds(&bbox));
    }

    debug!(
        "Page {}: {} glyphs, {} rulings",
        index + 1,
        glyphs.len(),
        rulings.len()
    );

    Ok(PageLayout {
        index,
        width,
        height,
        glyphs,
        rulings,
    })
}

fn is_bold(weight: Option<PdfFontWeight>, font_name: &str) -> bool {
    let heavy = match weight {
        Some(PdfFontWeight::Weight700Bold)
        | Some(PdfFontWeight::Weight800)
        | Some(PdfFontWeight::Weight900) => true,
        Some(PdfFontWeight::Custom(w)) => w >= 700,
        _ => false,
    };
    heavy || font_name.to_ascii_lowercase().contains("bold")
}

// ── Test helpers ─────────────────────────────────────────────────────────

/// Lay out `text` as glyphs on one line starting at `(x, y)`, each glyph
/// `advance` points wide. Used to build pages in tests.
#[cfg(test)]
pub(crate) fn glyph_run(text: &str, x: f32, y: f32, size: f32, bold: bool) -> Vec<Glyph> {
    let advance = size * 0.5;
    text.chars()
        .enumerate()
        .map(|(i, ch)| {
            let x0 = x + i as f32 * advance;
            Glyph {
                ch,
                bbox: BBox::new(x0, y, x0 + advance, y + size),
                font_name: if bold { "Arial-Bold" } else { "Arial" }.to_string(),
                font_size: size,
                bold,
            }
        })
        .collect()
}

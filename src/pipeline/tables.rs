//! Table detection: rebuild ruled tables from line segments and glyphs.
//!
//! The NVMe specification draws every table with full cell borders, so the
//! grid can be recovered from the rulings alone:
//!
//! ```text
//! rulings ──▶ merge collinear ──▶ drop short ──▶ connected components
//!                                                      │
//!        cell text ◀── assign glyphs ◀── grid + edges ◀┘
//! ```
//!
//! A merged cell has no ruling between its grid cells. Its text is moved to
//! the top-left grid cell of the span, so a vertically merged first column
//! shows up as one filled cell followed by blank continuation cells.

use crate::pipeline::layout::{BBox, Glyph, Orientation, PageLayout, Ruling};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Distance, in points, under which two positions are considered equal.
const TOLERANCE: f32 = 2.0;

/// Horizontal gap, as a fraction of the font size, that implies a space.
const WORD_GAP: f32 = 0.3;

/// The unprocessed grid of one detected table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// 0-indexed page the table was found on.
    pub page: usize,
    pub bbox: BBox,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Column headings taken from the first row.
    pub fn headings(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| extract_headings(row))
            .unwrap_or_default()
    }

    /// Every row after the heading row.
    pub fn data_rows(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or(&[])
    }
}

/// Normalise a heading row: drop empty cells, remove line breaks,
/// lower-case. A first heading mentioning "value" becomes exactly `value`.
pub fn extract_headings(row: &[String]) -> Vec<String> {
    let mut headings: Vec<String> = row
        .iter()
        .map(|cell| cell.replace('\n', "").trim().to_lowercase())
        .filter(|cell| !cell.is_empty())
        .collect();

    if let Some(first) = headings.first_mut() {
        if first.contains("value") {
            *first = "value".to_string();
        }
    }
    headings
}

/// Find every ruled table on a page, top-to-bottom then left-to-right.
///
/// Rulings shorter than the page dimension divided by `line_scale` are
/// ignored.
pub fn detect_tables(layout: &PageLayout, line_scale: f32) -> Vec<RawTable> {
    let min_h = layout.width / line_scale;
    let min_v = layout.height / line_scale;

    let (horizontal, vertical): (Vec<Ruling>, Vec<Ruling>) = layout
        .rulings
        .iter()
        .partition(|r| r.orientation == Orientation::Horizontal);

    let horizontal: Vec<Ruling> = merge_collinear(horizontal)
        .into_iter()
        .filter(|r| r.length() >= min_h)
        .collect();
    let vertical: Vec<Ruling> = merge_collinear(vertical)
        .into_iter()
        .filter(|r| r.length() >= min_v)
        .collect();

    let mut tables: Vec<RawTable> = connected_grids(&horizontal, &vertical)
        .into_iter()
        .filter_map(|grid| grid.into_table(layout))
        .collect();

    tables.sort_by(|a, b| {
        a.bbox
            .y0
            .total_cmp(&b.bbox.y0)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    debug!("Page {}: {} tables", layout.index + 1, tables.len());
    tables
}

// ── Ruling geometry ──────────────────────────────────────────────────────

/// Join rulings lying on the same line whose extents touch or overlap.
fn merge_collinear(mut rulings: Vec<Ruling>) -> Vec<Ruling> {
    rulings.sort_by(|a, b| {
        a.position
            .total_cmp(&b.position)
            .then(a.start.total_cmp(&b.start))
    });

    loop {
        let mut merged: Vec<Ruling> = Vec::with_capacity(rulings.len());
        for ruling in &rulings {
            let target = merged.iter_mut().rev().find(|m| {
                (m.position - ruling.position).abs() <= TOLERANCE
                    && ruling.start <= m.end + TOLERANCE
                    && ruling.end >= m.start - TOLERANCE
            });
            match target {
                Some(m) => {
                    m.start = m.start.min(ruling.start);
                    m.end = m.end.max(ruling.end);
                }
                None => merged.push(*ruling),
            }
        }
        if merged.len() == rulings.len() {
            return merged;
        }
        rulings = merged;
    }
}

fn intersects(h: &Ruling, v: &Ruling) -> bool {
    v.position >= h.start - TOLERANCE
        && v.position <= h.end + TOLERANCE
        && h.position >= v.start - TOLERANCE
        && h.position <= v.end + TOLERANCE
}

/// Sorted positions with near-duplicates collapsed.
fn cluster_positions(rulings: &[Ruling]) -> Vec<f32> {
    let mut positions: Vec<f32> = rulings.iter().map(|r| r.position).collect();
    positions.sort_by(f32::total_cmp);
    positions.dedup_by(|later, earlier| (*later - *earlier).abs() <= TOLERANCE);
    positions
}

/// The rulings of one table.
struct Grid {
    horizontal: Vec<Ruling>,
    vertical: Vec<Ruling>,
}

/// Group rulings into tables: horizontals and verticals that cross belong
/// to the same table.
fn connected_grids(horizontal: &[Ruling], vertical: &[Ruling]) -> Vec<Grid> {
    let n = horizontal.len() + vertical.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for (hi, h) in horizontal.iter().enumerate() {
        for (vi, v) in vertical.iter().enumerate() {
            if intersects(h, v) {
                let a = find(&mut parent, hi);
                let b = find(&mut parent, horizontal.len() + vi);
                parent[a] = b;
            }
        }
    }

    let mut grids: Vec<(usize, Grid)> = Vec::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        let idx = match grids.iter().position(|(r, _)| *r == root) {
            Some(idx) => idx,
            None => {
                grids.push((
                    root,
                    Grid {
                        horizontal: Vec::new(),
                        vertical: Vec::new(),
                    },
                ));
                grids.len() - 1
            }
        };
        let grid = &mut grids[idx].1;
        if i < horizontal.len() {
            grid.horizontal.push(horizontal[i]);
        } else {
            grid.vertical.push(vertical[i - horizontal.len()]);
        }
    }

    grids.into_iter().map(|(_, grid)| grid).collect()
}

// ── Cell assembly ────────────────────────────────────────────────────────

/// Text collected for one cell, with the last glyph box to detect line
/// changes.
#[derive(Default)]
struct CellText {
    text: String,
    last: Option<Glyph>,
}

impl CellText {
    fn push(&mut self, glyph: &Glyph) {
        if glyph.ch.is_whitespace() {
            if !self.text.is_empty() && !self.text.ends_with(char::is_whitespace) {
                self.text.push(' ');
            }
            return;
        }
        if let Some(last) = &self.last {
            let (_, cy) = glyph.bbox.center();
            if !last.bbox.spans_y(cy) {
                let trimmed = self.text.trim_end().len();
                self.text.truncate(trimmed);
                self.text.push('\n');
            } else if glyph.bbox.x0 - last.bbox.x1 > last.font_size * WORD_GAP
                && !self.text.ends_with(char::is_whitespace)
            {
                self.text.push(' ');
            }
        }
        self.text.push(glyph.ch);
        self.last = Some(glyph.clone());
    }

    fn finish(self) -> String {
        self.text
            .lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

impl Grid {
    fn has_left_edge(&self, x: f32, y0: f32, y1: f32) -> bool {
        let mid = (y0 + y1) / 2.0;
        self.vertical.iter().any(|v| {
            (v.position - x).abs() <= TOLERANCE && v.start <= mid && v.end >= mid
        })
    }

    fn has_top_edge(&self, y: f32, x0: f32, x1: f32) -> bool {
        let mid = (x0 + x1) / 2.0;
        self.horizontal.iter().any(|h| {
            (h.position - y).abs() <= TOLERANCE && h.start <= mid && h.end >= mid
        })
    }

    fn into_table(self, layout: &PageLayout) -> Option<RawTable> {
        let xs = cluster_positions(&self.vertical);
        let ys = cluster_positions(&self.horizontal);
        if xs.len() < 2 || ys.len() < 2 {
            return None;
        }
        let (n_cols, n_rows) = (xs.len() - 1, ys.len() - 1);
        let bbox = BBox::new(xs[0], ys[0], xs[n_cols], ys[n_rows]);

        // Top-left grid cell of the merged cell each grid cell belongs to.
        let mut anchors = vec![vec![(0usize, 0usize); n_cols]; n_rows];
        for (r, row) in anchors.iter_mut().enumerate() {
            for (c, anchor) in row.iter_mut().enumerate() {
                let (mut ar, mut ac) = (r, c);
                loop {
                    if ac > 0 && !self.has_left_edge(xs[ac], ys[ar], ys[ar + 1]) {
                        ac -= 1;
                    } else if ar > 0 && !self.has_top_edge(ys[ar], xs[ac], xs[ac + 1]) {
                        ar -= 1;
                    } else {
                        break;
                    }
                }
                *anchor = (ar, ac);
            }
        }

        let mut cells: Vec<Vec<CellText>> = (0..n_rows)
            .map(|_| (0..n_cols).map(|_| CellText::default()).collect())
            .collect();

        for glyph in &layout.glyphs {
            let (cx, cy) = glyph.bbox.center();
            let (Some(c), Some(r)) = (slot(&xs, cx), slot(&ys, cy)) else {
                continue;
            };
            let (ar, ac) = anchors[r][c];
            cells[ar][ac].push(glyph);
        }

        let rows = cells
            .into_iter()
            .map(|row| row.into_iter().map(CellText::finish).collect())
            .collect();

        Some(RawTable {
            page: layout.index,
            bbox,
            rows,
        })
    }
}

/// Index `i` such that `bounds[i] <= v < bounds[i + 1]`.
fn slot(bounds: &[f32], v: f32) -> Option<usize> {
    bounds.windows(2).position(|w| v >= w[0] && v < w[1])
}

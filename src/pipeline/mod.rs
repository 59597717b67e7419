//! Pipeline stages for table extraction.
//!
//! Each submodule implements one step. Only [`layout`] talks to pdfium;
//! everything after it works on plain data and is tested with hand-built
//! pages and cell grids.
//!
//! ## Data Flow
//!
//! ```text
//!             ┌──▶ captions ──┐
//! layout ─────┤               ├──▶ transform ──▶ normalize
//! (pdfium)    └──▶ tables ────┘    (Row tree)    (enum-ready)
//! ```
//!
//! 1. [`layout`]     glyphs and ruling segments of each page
//! 2. [`captions`]   bold `Figure …` titles, broken fragments rejoined
//! 3. [`tables`]     ruled grids rebuilt from line segments, cell text
//!    assigned from glyph positions
//! 4. [`transform`]  cell grids to typed rows with nested children
//! 5. [`normalize`]  drop ranges, synthesize names, hex-format values

pub mod captions;
pub mod layout;
pub mod normalize;
pub mod tables;
pub mod transform;

//! Caption extraction: find the bold "Figure N: …" titles above tables.
//!
//! The NVMe specification labels every table with a bold caption starting
//! with `Figure`. Long captions sometimes come out of the text layer as two
//! elements that touch end-to-start (a false break after a hyphen); those
//! are stitched back together before filtering.
//!
//! Captions are matched to tables purely by position: the n-th caption on
//! the page belongs to the n-th table.

use crate::pipeline::layout::{PageLayout, TextElement};

/// Text every caption starts with.
const CAPTION_PREFIX: &str = "Figure";

/// Font sizes within this many points of the configured caption size match.
const FONT_SIZE_TOLERANCE: f32 = 0.5;

/// Which text elements count as caption text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptionStyle {
    /// Required font size; `None` accepts any bold text.
    pub font_size: Option<f32>,
    /// Largest gap between two fragments that are joined, exclusive.
    pub join_gap: f32,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size: None,
            join_gap: 3.0,
        }
    }
}

impl CaptionStyle {
    fn matches(&self, element: &TextElement) -> bool {
        element.bold
            && self
                .font_size
                .map_or(true, |size| (element.font_size - size).abs() <= FONT_SIZE_TOLERANCE)
    }
}

/// Captions of a page, in reading order.
pub fn extract_captions(layout: &PageLayout, style: &CaptionStyle) -> Vec<String> {
    captions_from_elements(layout.text_elements(), style)
}

/// Run the caption filters over already grouped text elements.
pub fn captions_from_elements(elements: Vec<TextElement>, style: &CaptionStyle) -> Vec<String> {
    let candidates = elements
        .into_iter()
        .filter(|e| style.matches(e))
        .filter(|e| !e.text.trim().is_empty())
        .collect();

    join_broken_elements(candidates, style.join_gap)
        .into_iter()
        .filter(|e| e.text.starts_with(CAPTION_PREFIX))
        .map(|e| e.text)
        .collect()
}

/// Merge each element into its predecessor when its left edge starts less
/// than `max_gap` after the predecessor's right edge.
fn join_broken_elements(elements: Vec<TextElement>, max_gap: f32) -> Vec<TextElement> {
    let mut joined: Vec<TextElement> = Vec::with_capacity(elements.len());
    for element in elements {
        match joined.last_mut() {
            Some(prev) if (0.0..max_gap).contains(&(element.left() - prev.right())) => {
                prev.text.push_str(&element.text);
                prev.bbox.merge(&element.bbox);
            }
            _ => joined.push(element),
        }
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::layout::{glyph_run, BBox};

    fn element(text: &str, x0: f32, x1: f32, y: f32, bold: bool) -> TextElement {
        TextElement {
            bbox: BBox::new(x0, y, x1, y + 10.0),
            font_name: "Arial-Bold".into(),
            font_size: 10.0,
            bold,
            text: text.into(),
        }
    }

    #[test]
    fn keeps_only_bold_figure_text() {
        let elements = vec![
            element("Figure 84: Feature Identifiers", 50.0, 250.0, 100.0, true),
            element("Figure 85: not bold", 50.0, 250.0, 300.0, false),
            element("Bits", 50.0, 70.0, 120.0, true),
        ];
        let captions = captions_from_elements(elements, &CaptionStyle::default());
        assert_eq!(captions, vec!["Figure 84: Feature Identifiers"]);
    }

    #[test]
    fn joins_fragments_closer_than_the_gap() {
        let elements = vec![
            element("Figure 91: Get Features – Tem-", 50.0, 250.0, 100.0, true),
            element("perature Threshold", 252.5, 340.0, 100.0, true),
        ];
        let captions = captions_from_elements(elements, &CaptionStyle::default());
        assert_eq!(
            captions,
            vec!["Figure 91: Get Features – Tem-perature Threshold"]
        );
    }

    #[test]
    fn fragments_at_the_gap_stay_apart() {
        let elements = vec![
            element("Figure 1: A", 50.0, 100.0, 100.0, true),
            element("Figure 2: B", 103.0, 150.0, 100.0, true),
        ];
        let captions = captions_from_elements(elements, &CaptionStyle::default());
        assert_eq!(captions, vec!["Figure 1: A", "Figure 2: B"]);
    }

    #[test]
    fn overlapping_fragments_are_not_joined() {
        let elements = vec![
            element("Figure 1: A", 50.0, 100.0, 100.0, true),
            element("Figure 2: B", 90.0, 150.0, 100.0, true),
        ];
        assert_eq!(
            captions_from_elements(elements, &CaptionStyle::default()).len(),
            2
        );
    }

    #[test]
    fn last_caption_is_kept() {
        let elements = vec![
            element("Figure 1: A", 50.0, 100.0, 100.0, true),
            element("Figure 2: B", 50.0, 100.0, 400.0, true),
            element("Figure 3: C", 50.0, 100.0, 700.0, true),
        ];
        let captions = captions_from_elements(elements, &CaptionStyle::default());
        assert_eq!(captions.len(), 3);
        assert_eq!(captions[2], "Figure 3: C");
    }

    #[test]
    fn font_size_filter_applies_when_configured() {
        let mut small = element("Figure 9: footnote", 50.0, 150.0, 700.0, true);
        small.font_size = 7.0;
        let elements = vec![element("Figure 8: Main", 50.0, 150.0, 100.0, true), small];
        let style = CaptionStyle {
            font_size: Some(10.0),
            ..CaptionStyle::default()
        };
        assert_eq!(captions_from_elements(elements, &style), vec!["Figure 8: Main"]);
    }

    #[test]
    fn extracts_from_page_layout() {
        let mut glyphs = glyph_run("Figure 12: Opcodes for Admin Commands", 72.0, 90.0, 9.0, true);
        glyphs.extend(glyph_run("Opcode", 72.0, 120.0, 9.0, true));
        glyphs.extend(glyph_run("Figure text in body", 72.0, 400.0, 9.0, false));
        let layout = PageLayout {
            glyphs,
            ..PageLayout::default()
        };
        assert_eq!(
            extract_captions(&layout, &CaptionStyle::default()),
            vec!["Figure 12: Opcodes for Admin Commands"]
        );
    }
}

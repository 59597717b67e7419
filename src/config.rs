//! Configuration types for table extraction.
//!
//! All extraction behaviour is controlled through [`ExtractConfig`], built via
//! its [`ExtractConfigBuilder`]. The geometric tolerances live here rather
//! than as scattered constants so a layout that drifts from the NVMe
//! conventions can be tuned from the command line.

use crate::error::SpectractError;
use crate::extract::TableSource;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for an extraction batch.
///
/// # Example
/// ```rust
/// use spectract::ExtractConfig;
///
/// let config = ExtractConfig::builder()
///     .concurrency(4)
///     .line_scale(40.0)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Clone)]
pub struct ExtractConfig {
    /// Number of targets extracted at the same time. Default: 10.
    pub concurrency: usize,

    /// Rulings shorter than `page dimension / line_scale` are ignored when
    /// detecting tables. Default: 35.
    ///
    /// Larger values keep shorter lines, which helps with tables made of
    /// small cells but lets underlines and decorations through.
    pub line_scale: f32,

    /// Maximum horizontal gap, in points, between two caption fragments that
    /// are joined back into one caption. Default: 3.
    pub caption_tolerance: f32,

    /// Font size of caption text. `None` accepts bold text of any size.
    pub caption_font_size: Option<f32>,

    /// Explicit path to libpdfium. `None` binds the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Password for encrypted PDFs.
    pub password: Option<String>,

    /// Custom extraction backend. `None` uses [`crate::extract::PdfTableSource`].
    pub table_source: Option<Arc<dyn TableSource>>,

    /// Optional per-target progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            line_scale: 35.0,
            caption_tolerance: 3.0,
            caption_font_size: None,
            pdfium_lib_path: None,
            password: None,
            table_source: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractConfig")
            .field("concurrency", &self.concurrency)
            .field("line_scale", &self.line_scale)
            .field("caption_tolerance", &self.caption_tolerance)
            .field("caption_font_size", &self.caption_font_size)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "table_source",
                &self.table_source.as_ref().map(|_| "<dyn TableSource>"),
            )
            .finish()
    }
}

impl ExtractConfig {
    /// Create a new builder for `ExtractConfig`.
    pub fn builder() -> ExtractConfigBuilder {
        ExtractConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractConfig`].
#[derive(Debug)]
pub struct ExtractConfigBuilder {
    config: ExtractConfig,
}

impl ExtractConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn line_scale(mut self, scale: f32) -> Self {
        self.config.line_scale = scale;
        self
    }

    pub fn caption_tolerance(mut self, points: f32) -> Self {
        self.config.caption_tolerance = points;
        self
    }

    pub fn caption_font_size(mut self, size: f32) -> Self {
        self.config.caption_font_size = Some(size);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn table_source(mut self, source: Arc<dyn TableSource>) -> Self {
        self.config.table_source = Some(source);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractConfig, SpectractError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(SpectractError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.line_scale.is_nan() || c.line_scale <= 0.0 {
            return Err(SpectractError::InvalidConfig(format!(
                "Line scale must be positive, got {}",
                c.line_scale
            )));
        }
        if c.caption_tolerance < 0.0 {
            return Err(SpectractError::InvalidConfig(format!(
                "Caption tolerance must not be negative, got {}",
                c.caption_tolerance
            )));
        }
        Ok(self.config)
    }
}

// ── Ranges ───────────────────────────────────────────────────────────────

/// A contiguous, 1-indexed, inclusive page range such as `42` or `42-43`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub first: usize,
    pub last: usize,
}

impl PageRange {
    pub fn single(page: usize) -> Self {
        Self {
            first: page,
            last: page,
        }
    }

    /// 0-indexed page numbers covered by the range. Page `0` reads as the
    /// first page.
    pub fn to_indices(&self) -> RangeInclusive<usize> {
        self.first.saturating_sub(1)..=self.last.saturating_sub(1)
    }
}

impl FromStr for PageRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (first, last) = parse_span(s)?;
        if first < 1 {
            return Err(format!("pages are 1-indexed, minimum is 1 (got {first})"));
        }
        Ok(Self { first, last })
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}-{}", self.first, self.last)
        }
    }
}

/// Which tables of a page range to extract, 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableIndices {
    /// One table.
    Single(usize),
    /// A run of tables, inclusive; their rows are concatenated.
    Range(usize, usize),
}

impl TableIndices {
    /// The table whose caption and headings describe the whole selection.
    pub fn first(&self) -> usize {
        match self {
            TableIndices::Single(i) | TableIndices::Range(i, _) => *i,
        }
    }

    pub fn last(&self) -> usize {
        match self {
            TableIndices::Single(i) | TableIndices::Range(_, i) => *i,
        }
    }

    pub fn iter(&self) -> RangeInclusive<usize> {
        self.first()..=self.last()
    }
}

impl FromStr for TableIndices {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (first, last) = parse_span(s)?;
        if first == last && !s.contains('-') {
            Ok(TableIndices::Single(first))
        } else {
            Ok(TableIndices::Range(first, last))
        }
    }
}

impl fmt::Display for TableIndices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableIndices::Single(i) => write!(f, "{i}"),
            TableIndices::Range(a, b) => write!(f, "{a}-{b}"),
        }
    }
}

/// Parse `"n"` or `"a-b"` into an inclusive pair.
fn parse_span(s: &str) -> Result<(usize, usize), String> {
    let s = s.trim();
    let parse = |part: &str| {
        part.trim()
            .parse::<usize>()
            .map_err(|_| format!("'{}' is not a number", part.trim()))
    };

    match s.split_once('-') {
        Some((start, end)) => {
            let (start, end) = (parse(start)?, parse(end)?);
            if start > end {
                return Err(format!(
                    "invalid range '{start}-{end}': start must be <= end"
                ));
            }
            Ok((start, end))
        }
        None => {
            let n = parse(s)?;
            Ok((n, n))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let c = ExtractConfig::default();
        assert_eq!(c.concurrency, 10);
        assert_eq!(c.line_scale, 35.0);
        assert_eq!(c.caption_tolerance, 3.0);
        assert!(c.caption_font_size.is_none());
        assert!(c.table_source.is_none());
    }

    #[test]
    fn builder_rejects_zero_concurrency() {
        let err = ExtractConfig::builder().concurrency(0).build().unwrap_err();
        assert!(err.to_string().contains("Concurrency"));
    }

    #[test]
    fn builder_rejects_non_positive_line_scale() {
        assert!(ExtractConfig::builder().line_scale(0.0).build().is_err());
        assert!(ExtractConfig::builder().line_scale(f32::NAN).build().is_err());
    }

    #[test]
    fn page_range_parsing() {
        assert_eq!("42".parse::<PageRange>().unwrap(), PageRange::single(42));
        assert_eq!(
            "42-43".parse::<PageRange>().unwrap(),
            PageRange { first: 42, last: 43 }
        );
        assert!("0".parse::<PageRange>().is_err());
        assert!("9-3".parse::<PageRange>().is_err());
        assert!("x".parse::<PageRange>().is_err());
    }

    #[test]
    fn page_range_indices_are_zero_based() {
        let r = PageRange { first: 2, last: 4 };
        assert_eq!(r.to_indices().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(r.to_string(), "2-4");
        assert_eq!(PageRange::single(7).to_string(), "7");
    }

    #[test]
    fn page_zero_does_not_underflow() {
        assert_eq!(PageRange::single(0).to_indices().collect::<Vec<_>>(), vec![0]);
        let r: PageRange = serde_json::from_str(r#"{"first":0,"last":2}"#).unwrap();
        assert_eq!(r.to_indices().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn table_indices_parsing() {
        assert_eq!("0".parse::<TableIndices>().unwrap(), TableIndices::Single(0));
        assert_eq!(
            "0-1".parse::<TableIndices>().unwrap(),
            TableIndices::Range(0, 1)
        );
        assert_eq!(
            " 2 - 2 ".parse::<TableIndices>().unwrap(),
            TableIndices::Range(2, 2)
        );
        assert!("3-1".parse::<TableIndices>().is_err());
    }

    #[test]
    fn table_indices_iterate_inclusively() {
        let t = TableIndices::Range(1, 3);
        assert_eq!(t.first(), 1);
        assert_eq!(t.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(TableIndices::Single(5).iter().count(), 1);
    }
}

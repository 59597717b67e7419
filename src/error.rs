//! Error types for the spectract library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SpectractError`]: **fatal**, the batch cannot proceed or its output
//!   would be wrong (malformed job file, caption/table misalignment, PDFium
//!   not available). Returned as `Err(SpectractError)` from the top-level
//!   entry points and mapped to exit status 1 by the CLI.
//!
//! * [`TargetError`]: **non-fatal**, a single target could not be read
//!   (missing PDF, page outside the document). The scheduler logs it and the
//!   target simply contributes nothing to the merged output.
//!
//! A caption paired with the wrong table renames every enum generated from
//! it, so structural errors are fatal.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the spectract library.
#[derive(Debug, Error)]
pub enum SpectractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A job file or normalized table file was not found.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The batch job file is not valid YAML or has the wrong shape.
    #[error("Invalid job file '{path}': {detail}")]
    InvalidJobFile { path: PathBuf, detail: String },

    /// A normalized table file is not valid YAML or has the wrong shape.
    #[error("Invalid table file '{path}': {detail}")]
    InvalidTableFile { path: PathBuf, detail: String },

    /// A job entry has an unparsable page range or table index.
    #[error("Invalid target '{name}': {detail}")]
    InvalidTarget { name: String, detail: String },

    // ── Structural errors ─────────────────────────────────────────────────
    /// The number of detected tables differs from the number of captions.
    #[error(
        "Target '{name}': found {tables} tables but {captions} captions on pages {pages}\n\
The page layout does not follow the caption-per-table convention."
    )]
    CaptionMismatch {
        name: String,
        pages: String,
        tables: usize,
        captions: usize,
    },

    /// The requested table index exceeds the tables found on the pages.
    #[error("Target '{name}': table index {index} is out of range ({found} tables found)")]
    TableIndexOutOfRange {
        name: String,
        index: usize,
        found: usize,
    },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium system-wide or set PDFIUM_LIB_PATH=/path/to/libpdfium."
    )]
    PdfiumBindingFailed(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The merged tables could not be serialised.
    #[error("Failed to serialise tables: {0}")]
    Serialize(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single target.
///
/// The scheduler absorbs these: the target is dropped from the merged
/// output and the rest of the batch continues.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum TargetError {
    /// The input PDF does not exist.
    #[error("Target '{name}': PDF not found: '{path}'")]
    FileNotFound { name: String, path: PathBuf },

    /// The page range reaches past the end of the document.
    #[error("Target '{name}': page {page} is out of range (document has {total} pages)")]
    PageOutOfRange {
        name: String,
        page: usize,
        total: usize,
    },

    /// pdfium could not open the document or one of its pages.
    #[error("Target '{name}': unreadable PDF: {detail}")]
    UnreadablePdf { name: String, detail: String },
}

/// Outcome of extracting a single target.
///
/// The outer error aborts the batch, the inner one only drops the target.
pub type TargetResult<T> = Result<Result<T, TargetError>, SpectractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_mismatch_display() {
        let e = SpectractError::CaptionMismatch {
            name: "feat_tbl".into(),
            pages: "42".into(),
            tables: 3,
            captions: 2,
        };
        let msg = e.to_string();
        assert!(msg.contains("feat_tbl"), "got: {msg}");
        assert!(msg.contains("3 tables but 2 captions"), "got: {msg}");
    }

    #[test]
    fn table_index_display() {
        let e = SpectractError::TableIndexOutOfRange {
            name: "opc".into(),
            index: 4,
            found: 2,
        };
        assert!(e.to_string().contains("index 4"));
        assert!(e.to_string().contains("2 tables found"));
    }

    #[test]
    fn target_page_out_of_range_display() {
        let e = TargetError::PageOutOfRange {
            name: "cns".into(),
            page: 900,
            total: 500,
        };
        assert!(e.to_string().contains("page 900"));
        assert!(e.to_string().contains("500 pages"));
    }

    #[test]
    fn invalid_job_file_display() {
        let e = SpectractError::InvalidJobFile {
            path: PathBuf::from("jobs.yaml"),
            detail: "expected a sequence".into(),
        };
        assert!(e.to_string().contains("jobs.yaml"));
        assert!(e.to_string().contains("expected a sequence"));
    }
}

//! # spectract
//!
//! Extract the ruled tables of the NVMe specification PDFs into YAML, and
//! generate C enum declarations from them.
//!
//! ## Why this crate?
//!
//! The specification defines opcodes, feature identifiers and status codes
//! in hundreds of tables. Copying them by hand into a driver header is slow
//! and error-prone. The tables follow strict conventions (full cell borders,
//! a bold `Figure N:` caption above each one, nested value tables to the
//! right of their parent field), so their structure can be recovered from
//! the positions of glyphs and line segments alone.
//!
//! ## Pipeline Overview
//!
//! ```text
//! job.yaml
//!  │
//!  ├─ 1. Jobs       resolve targets (path expansion, page and table ranges)
//!  ├─ 2. Layout     glyphs + rulings per page via pdfium (spawn_blocking)
//!  ├─ 3. Detect     captions ‖ ruled tables, paired by position
//!  ├─ 4. Transform  cell grids → rows, nested tables → children
//!  ├─ 5. Normalize  drop ranges, synthesize names, 1Ah → 0x1A
//!  └─ 6. Output     one sorted YAML map, then C header via `generate`
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spectract::{extract_to_file, generate_to_file, ExtractConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractConfig::default();
//!     let stats = extract_to_file(
//!         Path::new("jobs.yaml"),
//!         Path::new("tables.yaml"),
//!         &config,
//!     )
//!     .await?;
//!     eprintln!("{}/{} targets", stats.extracted, stats.total_targets);
//!
//!     generate_to_file(Path::new("tables.yaml"), Path::new("nvme.h")).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `spectract` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! spectract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod generate;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod schedule;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractConfig, ExtractConfigBuilder, PageRange, TableIndices};
pub use error::{SpectractError, TargetError, TargetResult};
pub use extract::{build_table, inspect, PageReport, PdfTableSource, TableSource};
pub use generate::{generate_header, generate_to_file, load_tables, GeneratedEnum};
pub use job::{load_targets, JobEntry, Target};
pub use output::{Row, Span, Table, TableMap};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use schedule::{
    extract_to_file, run_batch, run_batch_sync, schedule, to_yaml, BatchOutput, BatchStats,
};

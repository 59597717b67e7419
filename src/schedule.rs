//! Batch scheduling: job file → concurrent extraction → one YAML file.
//!
//! Every target becomes one blocking task on tokio's blocking pool, with at
//! most [`ExtractConfig::concurrency`] in flight. All tasks run to
//! completion; results are then merged in job order, so the later of two
//! targets with the same name wins no matter which finished first.
//!
//! Per-target failures ([`TargetError`]) are logged and the target is left
//! out. Any [`SpectractError`] from a task aborts the batch before anything
//! is written.

use crate::config::ExtractConfig;
use crate::error::{SpectractError, TargetError};
use crate::extract::{PdfTableSource, TableSource};
use crate::job::{load_targets, Target};
use crate::output::{Table, TableMap};
use crate::pipeline::normalize::normalize;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    pub tables: TableMap,
    pub stats: BatchStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Targets in the job file.
    pub total_targets: usize,
    /// Targets that produced a table.
    pub extracted: usize,
    /// Targets dropped because of a non-fatal error.
    pub skipped: usize,
    /// Top-level rows across all produced tables.
    pub total_rows: usize,
    pub duration_ms: u64,
}

type TaskResult = Result<Result<Table, TargetError>, SpectractError>;

/// Extract every target and merge the normalized tables by name.
pub async fn schedule(
    targets: Vec<Target>,
    config: &ExtractConfig,
) -> Result<BatchOutput, SpectractError> {
    let start = Instant::now();
    let total = targets.len();

    let source: Arc<dyn TableSource> = match &config.table_source {
        Some(source) => Arc::clone(source),
        None => Arc::new(PdfTableSource::from_config(config)?),
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }
    info!(
        "Extracting {} targets, {} at a time",
        total, config.concurrency
    );

    let mut results: Vec<(usize, String, TaskResult)> =
        stream::iter(targets.into_iter().enumerate().map(|(idx, target)| {
            let source = Arc::clone(&source);
            let cb = config.progress_callback.clone();
            async move {
                let name = target.name.clone();
                if let Some(ref cb) = cb {
                    cb.on_target_start(&name);
                }
                let result = run_target(source, target).await;
                if let Some(ref cb) = cb {
                    match &result {
                        Ok(Ok(table)) => cb.on_target_complete(&name, table.rows.len()),
                        Ok(Err(e)) => cb.on_target_error(&name, &e.to_string()),
                        Err(e) => cb.on_target_error(&name, &e.to_string()),
                    }
                }
                (idx, name, result)
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    results.sort_by_key(|(idx, _, _)| *idx);

    let mut tables = TableMap::new();
    let mut stats = BatchStats {
        total_targets: total,
        ..BatchStats::default()
    };
    for (_, name, result) in results {
        match result? {
            Ok(table) => {
                debug!("Target '{}': {} rows", name, table.rows.len());
                if tables.contains_key(&table.name) {
                    warn!("Target '{}' replaces an earlier table of the same name", name);
                }
                stats.extracted += 1;
                tables.insert(table.name, table.rows);
            }
            Err(e) => {
                warn!("Skipping target: {}", e);
                stats.skipped += 1;
            }
        }
    }
    stats.total_rows = tables.values().map(Vec::len).sum();
    stats.duration_ms = start.elapsed().as_millis() as u64;

    info!(
        "Batch complete: {}/{} targets, {} tables, {}ms",
        stats.extracted,
        total,
        tables.len(),
        stats.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, stats.extracted);
    }

    Ok(BatchOutput { tables, stats })
}

/// Extract and normalize one target on the blocking pool.
async fn run_target(source: Arc<dyn TableSource>, target: Target) -> TaskResult {
    let name = target.name.clone();
    tokio::task::spawn_blocking(move || {
        let mut table = match source.extract(&target)? {
            Ok(table) => table,
            Err(e) => return Ok(Err(e)),
        };
        normalize(&mut table);
        Ok(Ok(table))
    })
    .await
    .map_err(|e| SpectractError::Internal(format!("Target '{name}' panicked: {e}")))?
}

/// Load a job file and run it.
pub async fn run_batch(
    job_file: &Path,
    config: &ExtractConfig,
) -> Result<BatchOutput, SpectractError> {
    let targets = load_targets(job_file).await?;
    info!("Loaded {} targets from {}", targets.len(), job_file.display());
    schedule(targets, config).await
}

/// Run a job file and write the merged tables to `output` as YAML.
///
/// Nothing is written when the batch fails.
pub async fn extract_to_file(
    job_file: &Path,
    output: &Path,
    config: &ExtractConfig,
) -> Result<BatchStats, SpectractError> {
    let batch = run_batch(job_file, config).await?;
    let yaml = to_yaml(&batch.tables)?;
    write_atomic(output, yaml.as_bytes()).await?;
    info!("Wrote {} tables to {}", batch.tables.len(), output.display());
    Ok(batch.stats)
}

/// Serialise a table map as block-style YAML.
pub fn to_yaml(tables: &TableMap) -> Result<String, SpectractError> {
    serde_yaml::to_string(tables).map_err(|e| SpectractError::Serialize(e.to_string()))
}

/// Synchronous wrapper around [`run_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_batch_sync(
    job_file: &Path,
    config: &ExtractConfig,
) -> Result<BatchOutput, SpectractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SpectractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(job_file, config))
}

/// Write `bytes` next to `path` and rename into place, so readers never see
/// a partial file.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SpectractError> {
    let write_failed = |source: std::io::Error| SpectractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_failed)
}

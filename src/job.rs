//! Batch job files and the targets they describe.
//!
//! A job file is a YAML sequence of entries:
//!
//! ```yaml
//! - input: ~/specs/nvme-base.pdf
//!   pages: 42
//!   tables: 0-1
//!   name: feat_tbl
//! ```
//!
//! `pages` and `tables` accept a number or an `"a-b"` string. Entries are
//! resolved into [`Target`]s before any extraction starts, so a malformed
//! entry fails the batch without partial output.

use crate::config::{PageRange, TableIndices};
use crate::error::SpectractError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

static RE_ENV_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:\{(?P<braced>[A-Za-z_][A-Za-z0-9_]*)\}|(?P<bare>[A-Za-z_][A-Za-z0-9_]*))")
        .unwrap()
});

/// A number or a string, as YAML writes `42` and `"42-43"` differently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// One entry of a job file, as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEntry {
    pub input: String,
    pub pages: Scalar,
    pub tables: Scalar,
    pub name: String,
}

/// One unit of extraction work with every field resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Absolute path to the PDF.
    pub input: PathBuf,
    pub pages: PageRange,
    pub tables: TableIndices,
    pub name: String,
}

impl JobEntry {
    /// Expand the input path and parse the page and table ranges.
    pub fn resolve(&self) -> Result<Target, SpectractError> {
        let invalid = |detail: String| SpectractError::InvalidTarget {
            name: self.name.clone(),
            detail,
        };

        let pages = self
            .pages
            .to_string()
            .parse::<PageRange>()
            .map_err(|e| invalid(format!("pages: {e}")))?;
        let tables = self
            .tables
            .to_string()
            .parse::<TableIndices>()
            .map_err(|e| invalid(format!("tables: {e}")))?;
        let input = expand_path(&self.input).map_err(|e| invalid(format!("input: {e}")))?;

        Ok(Target {
            input,
            pages,
            tables,
            name: self.name.clone(),
        })
    }
}

/// Parse job file text. `path` is only used in error messages.
pub fn parse_jobs(text: &str, path: &Path) -> Result<Vec<JobEntry>, SpectractError> {
    serde_yaml::from_str::<Option<Vec<JobEntry>>>(text)
        .map(Option::unwrap_or_default)
        .map_err(|e| SpectractError::InvalidJobFile {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}

/// Read a job file and resolve every entry.
pub async fn load_targets(path: &Path) -> Result<Vec<Target>, SpectractError> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SpectractError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => SpectractError::InvalidJobFile {
            path: path.to_path_buf(),
            detail: e.to_string(),
        },
    })?;

    parse_jobs(&text, path)?
        .iter()
        .map(JobEntry::resolve)
        .collect()
}

/// Expand `~` and `$VAR` / `${VAR}`, then make the path absolute against
/// the current directory. Unset variables are left as written, as is `~`
/// when no home directory can be found.
pub fn expand_path(path: &str) -> std::io::Result<PathBuf> {
    let expanded = RE_ENV_VAR.replace_all(path, |caps: &Captures| {
        let var = caps
            .name("braced")
            .or_else(|| caps.name("bare"))
            .map(|m| m.as_str())
            .unwrap_or_default();
        std::env::var(var).unwrap_or_else(|_| caps[0].to_string())
    });

    let home = expanded
        .strip_prefix('~')
        .filter(|rest| rest.is_empty() || rest.starts_with('/'))
        .and_then(|rest| Some(dirs::home_dir()?.join(rest.trim_start_matches('/'))));
    let expanded = home.unwrap_or_else(|| PathBuf::from(&*expanded));

    std::path::absolute(expanded)
}

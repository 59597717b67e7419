//! CLI binary for spectract.
//!
//! A thin shim over the library crate that maps subcommands and flags to
//! `ExtractConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use spectract::{
    extract_to_file, generate_to_file, inspect, BatchProgressCallback, ExtractConfig, PageRange,
    ProgressCallback,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback: one bar for the batch plus a log line per
/// target. Targets complete out of order, so timings are keyed by name.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading job file…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed(&self, name: &str) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(name)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_targets: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} targets  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_targets as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_targets} tables…"))
        ));
    }

    fn on_target_start(&self, name: &str) {
        self.start_times
            .lock()
            .unwrap()
            .insert(name.to_string(), Instant::now());
        self.bar.set_message(name.to_string());
    }

    fn on_target_complete(&self, name: &str, rows: usize) {
        let secs = self.elapsed(name);
        self.bar.println(format!(
            "  {} {:<24}  {:<10}  {}",
            green("✓"),
            name,
            dim(&format!("{rows:>4} rows")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_target_error(&self, name: &str, error: &str) {
        let secs = self.elapsed(name);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['\u{2026}']).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<24}  {}  {}",
            red("✗"),
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_targets: usize, success_count: usize) {
        let failed = total_targets.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} tables extracted",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} tables extracted  ({} skipped)",
                if failed == total_targets {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_targets,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract every table listed in a job file
  spectract extract jobs.yaml -o tables.yaml

  # Generate a C header from the extracted tables
  spectract generate tables.yaml -o nvme.h

  # See what the heuristics find on a page
  spectract inspect nvme-base.pdf --pages 42

JOB FILE:
  - input: ~/specs/nvme-base.pdf   # ~ and $VAR are expanded
    pages: 42                      # or "42-43"
    tables: 0-1                    # table indices on those pages, 0-based
    name: feat_tbl                 # key in tables.yaml, enum name in the header

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium; the system library is used otherwise
  RUST_LOG                Override the log filter (e.g. spectract=debug)
"#;

/// Extract NVMe specification tables from PDFs and generate C headers.
#[derive(Parser, Debug)]
#[command(
    name = "spectract",
    version,
    about = "Extract NVMe specification tables from PDFs and generate C headers",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SPECTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SPECTRACT_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "SPECTRACT_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the tables listed in a job file into one YAML file.
    Extract(ExtractArgs),
    /// Generate a C header from an extracted YAML file.
    Generate(GenerateArgs),
    /// Print the captions and raw tables found on a page range.
    Inspect(InspectArgs),
}

/// Options shared by commands that read PDFs.
#[derive(Args, Debug)]
struct PdfArgs {
    /// Ignore rulings shorter than page size / LINE_SCALE.
    #[arg(long, env = "SPECTRACT_LINE_SCALE", default_value_t = 35.0)]
    line_scale: f32,

    /// Only treat bold text of this font size as captions.
    #[arg(long, env = "SPECTRACT_CAPTION_FONT_SIZE")]
    caption_font_size: Option<f32>,

    /// Path to libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "SPECTRACT_PASSWORD")]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// YAML job file listing the targets.
    job_file: PathBuf,

    /// Where to write the extracted tables.
    #[arg(short, long, env = "SPECTRACT_OUTPUT", default_value = "tables.yaml")]
    output: PathBuf,

    /// Number of targets extracted at the same time.
    #[arg(short, long, env = "SPECTRACT_CONCURRENCY", default_value_t = 10)]
    concurrency: usize,

    #[command(flatten)]
    pdf: PdfArgs,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// YAML file produced by `spectract extract`.
    tables: PathBuf,

    /// Where to write the header.
    #[arg(short, long, env = "SPECTRACT_HEADER", default_value = "header.h")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// PDF file to inspect.
    input: PathBuf,

    /// Page range: 5 or 42-43.
    #[arg(long)]
    pages: PageRange,

    /// Output structured JSON instead of text.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    pdf: PdfArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs; verbose mode shows both.
    let show_progress =
        !cli.quiet && !cli.no_progress && matches!(cli.command, Command::Extract(_));
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Extract(ref args) => run_extract(args, show_progress, cli.quiet).await,
        Command::Generate(ref args) => run_generate(args, cli.quiet).await,
        Command::Inspect(ref args) => run_inspect(args).await,
    }
}

async fn run_extract(args: &ExtractArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let mut builder = ExtractConfig::builder().concurrency(args.concurrency);
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = apply_pdf_args(builder, &args.pdf)
        .build()
        .context("Invalid configuration")?;

    let stats = extract_to_file(&args.job_file, &args.output, &config)
        .await
        .context("Extraction failed")?;

    if !quiet {
        eprintln!(
            "{}  {}/{} targets  {} rows  {}ms  →  {}",
            if stats.skipped == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.extracted,
            stats.total_targets,
            stats.total_rows,
            stats.duration_ms,
            bold(&args.output.display().to_string()),
        );
    }
    Ok(())
}

async fn run_generate(args: &GenerateArgs, quiet: bool) -> Result<()> {
    let enums = generate_to_file(&args.tables, &args.output)
        .await
        .context("Header generation failed")?;

    if !quiet {
        eprintln!(
            "{}  {} enums  →  {}",
            green("✔"),
            enums,
            bold(&args.output.display().to_string()),
        );
    }
    Ok(())
}

async fn run_inspect(args: &InspectArgs) -> Result<()> {
    let config = apply_pdf_args(ExtractConfig::builder(), &args.pdf)
        .build()
        .context("Invalid configuration")?;

    let reports = inspect(&args.input, args.pages, &config)
        .await
        .context("Failed to inspect PDF")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialize report")?
        );
        return Ok(());
    }

    for report in &reports {
        println!(
            "{}",
            bold(&format!(
                "Page {}: {} captions, {} tables",
                report.page,
                report.captions.len(),
                report.tables.len()
            ))
        );
        for (i, caption) in report.captions.iter().enumerate() {
            println!("  {} {}", cyan(&format!("[{i}]")), caption);
        }
        for (i, table) in report.tables.iter().enumerate() {
            let columns = table.rows.first().map(Vec::len).unwrap_or(0);
            println!(
                "  {} {} rows × {} columns  {}",
                cyan(&format!("table {i}")),
                table.rows.len(),
                columns,
                dim(&format!("headings: {}", table.headings().join(" | "))),
            );
            for row in &table.rows {
                let cells: Vec<String> = row.iter().map(|c| c.replace('\n', "⏎")).collect();
                println!("    {}", dim(&cells.join(" | ")));
            }
        }
    }
    Ok(())
}

fn apply_pdf_args(
    mut builder: spectract::ExtractConfigBuilder,
    args: &PdfArgs,
) -> spectract::ExtractConfigBuilder {
    builder = builder.line_scale(args.line_scale);
    if let Some(size) = args.caption_font_size {
        builder = builder.caption_font_size(size);
    }
    if let Some(ref path) = args.pdfium_lib {
        builder = builder.pdfium_lib_path(path);
    }
    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd);
    }
    builder
}

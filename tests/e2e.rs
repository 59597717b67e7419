//! End-to-end tests for spectract.
//!
//! PDF access is replaced by an in-memory `TableSource` that serves raw cell
//! grids per page, so everything from the job file to the generated header
//! runs without pdfium. Job files, inputs and outputs live in a `tempfile`
//! directory.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use spectract::pipeline::layout::BBox;
use spectract::pipeline::tables::RawTable;
use spectract::{
    build_table, extract_to_file, generate_to_file, load_tables, run_batch, BatchProgressCallback,
    ExtractConfig, Span, SpectractError, Table, TableSource, Target, TargetError, TargetResult,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("spectract=debug")
        .with_test_writer()
        .try_init();
}

fn grid(rows: &[&[&str]]) -> RawTable {
    RawTable {
        page: 0,
        bbox: BBox::default(),
        rows: rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect(),
    }
}

/// Serves fixed tables and captions per page. Inputs must exist on disk,
/// like real PDFs.
struct FakeSpec {
    pages: HashMap<usize, (Vec<RawTable>, Vec<String>)>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSpec {
    fn new() -> Self {
        let mut pages = HashMap::new();
        pages.insert(
            42,
            (
                vec![
                    grid(&[
                        &["Bits", "Description"],
                        &["31:8", "Reserved", "", ""],
                        &["7:0", "Feature Identifier (FID): feature to set.", "", ""],
                        &["", "", "Value", "Definition"],
                        &["", "", "01h", "Arbitration"],
                        &["", "", "02h", "Power\nManagement"],
                    ]),
                    grid(&[
                        &["Value (Hex)", "Definition"],
                        &["00h", "Reserved"],
                        &["01h", "Arbitration"],
                        &["02h", "Power\nManagement"],
                        &["03h to 7Fh", "Reserved"],
                    ]),
                ],
                vec![
                    "Figure 1: Set Features Dword 10".to_string(),
                    "Figure 2: Feature Identifiers".to_string(),
                ],
            ),
        );
        pages.insert(
            100,
            (
                vec![grid(&[
                    &["Opcode", "Description"],
                    &["06h", "Identify"],
                    &["09h", "Set Features"],
                ])],
                vec!["Figure 3: Admin Opcodes".to_string()],
            ),
        );
        pages.insert(
            43,
            (
                vec![
                    grid(&[
                        &["Value", "Definition"],
                        &["00h", "Reserved"],
                        &["01h", "Arbitration"],
                    ]),
                    grid(&[
                        &["Value", "Definition"],
                        &["02h", "Power\nManagement"],
                        &["03h", "LBA Range Type"],
                        &["04h to 7Fh", "Reserved"],
                    ]),
                ],
                vec![
                    "Figure 4: Feature Identifiers".to_string(),
                    "Figure 4: Feature Identifiers (continued)".to_string(),
                ],
            ),
        );
        pages.insert(
            7,
            (
                vec![grid(&[&["Value", "Definition"], &["00h", "Only"]])],
                Vec::new(),
            ),
        );
        Self {
            pages,
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl TableSource for FakeSpec {
    fn extract(&self, target: &Target) -> TargetResult<Table> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if !target.input.exists() {
            return Ok(Err(TargetError::FileNotFound {
                name: target.name.clone(),
                path: target.input.clone(),
            }));
        }
        let Some((tables, captions)) = self.pages.get(&target.pages.first) else {
            return Ok(Err(TargetError::PageOutOfRange {
                name: target.name.clone(),
                page: target.pages.first,
                total: 120,
            }));
        };
        build_table(target, tables.clone(), captions.clone()).map(Ok)
    }
}

/// A temp directory holding a stand-in PDF and a job file.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("nvme.pdf"), b"%PDF-1.7\n").expect("write pdf");
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn job(&self, file: &str, entries: &[(&str, &str, &str, &str)]) -> PathBuf {
        let mut yaml = String::new();
        for (input, pages, tables, name) in entries {
            yaml.push_str(&format!(
                "- input: {}\n  pages: {pages}\n  tables: {tables}\n  name: {name}\n",
                self.path(input).display()
            ));
        }
        let path = self.path(file);
        std::fs::write(&path, yaml).expect("write job");
        path
    }
}

fn config(source: Arc<dyn TableSource>) -> ExtractConfig {
    ExtractConfig::builder()
        .table_source(source)
        .build()
        .expect("config")
}

const JOBS: &[(&str, &str, &str, &str)] = &[
    ("nvme.pdf", "42", "1", "feat_tbl"),
    ("nvme.pdf", "42", "0", "set_features_cdw10"),
    ("nvme.pdf", "100", "0", "admin_opc"),
];

// ── Extraction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn feature_identifier_table_is_normalized() {
    init_tracing();
    let ws = Workspace::new();
    let job = ws.job("jobs.yaml", &JOBS[..1]);
    let out = ws.path("tables.yaml");

    let stats = extract_to_file(&job, &out, &config(Arc::new(FakeSpec::new())))
        .await
        .expect("extract");
    assert_eq!(stats.extracted, 1);

    let tables = load_tables(&out).await.expect("load");
    let rows = &tables["feat_tbl"];
    let pairs: Vec<(&str, &str)> = rows
        .iter()
        .map(|r| (r.name.as_deref().unwrap(), r.value.as_deref().unwrap()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("RESERVED", "0x00"),
            ("ARBITRATION", "0x01"),
            ("POWER_MANAGEMENT", "0x02"),
        ]
    );
    assert!(rows.iter().all(|r| r.children.is_none()));
}

#[tokio::test]
async fn nested_value_table_becomes_children() {
    let ws = Workspace::new();
    let job = ws.job("jobs.yaml", &JOBS[1..2]);
    let batch = run_batch(&job, &config(Arc::new(FakeSpec::new())))
        .await
        .expect("batch");

    let rows = &batch.tables["set_features_cdw10"];
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].name.as_deref(), Some("RESERVED"));
    assert!(rows[0].children.is_none());

    let fid = &rows[1];
    assert_eq!(fid.name.as_deref(), Some("fid"));
    assert_eq!(fid.brief.as_deref(), Some("Feature Identifier"));
    assert_eq!(fid.bits, Some(Span::Range([7, 0])));
    let children = fid.children.as_ref().expect("children");
    assert_eq!(children.len(), 2);
    assert_eq!(children[1].field("definition"), Some("Power\nManagement"));
}

#[tokio::test]
async fn output_is_byte_identical_across_runs_and_job_orders() {
    let ws = Workspace::new();
    let forward = ws.job("forward.yaml", JOBS);
    let reversed: Vec<_> = JOBS.iter().rev().cloned().collect();
    let backward = ws.job("backward.yaml", &reversed);

    let source = Arc::new(FakeSpec::new());
    let cfg = ExtractConfig::builder()
        .table_source(source)
        .concurrency(3)
        .build()
        .expect("config");

    let a = ws.path("a.yaml");
    let b = ws.path("b.yaml");
    let c = ws.path("c.yaml");
    extract_to_file(&forward, &a, &cfg).await.expect("a");
    extract_to_file(&forward, &b, &cfg).await.expect("b");
    extract_to_file(&backward, &c, &cfg).await.expect("c");

    let a = std::fs::read(a).unwrap();
    assert_eq!(a, std::fs::read(b).unwrap());
    assert_eq!(a, std::fs::read(c).unwrap());
}

#[tokio::test]
async fn missing_pdf_contributes_nothing() {
    let ws = Workspace::new();
    let job = ws.job(
        "jobs.yaml",
        &[
            ("absent.pdf", "42", "1", "ghost"),
            ("nvme.pdf", "100", "0", "admin_opc"),
        ],
    );
    let batch = run_batch(&job, &config(Arc::new(FakeSpec::new())))
        .await
        .expect("batch");

    assert_eq!(batch.tables.keys().collect::<Vec<_>>(), vec!["admin_opc"]);
    assert_eq!(batch.stats.skipped, 1);
    assert_eq!(batch.stats.total_targets, 2);
}

#[tokio::test]
async fn caption_mismatch_fails_without_output() {
    let ws = Workspace::new();
    let job = ws.job(
        "jobs.yaml",
        &[
            ("nvme.pdf", "100", "0", "admin_opc"),
            ("nvme.pdf", "7", "0", "uncaptioned"),
        ],
    );
    let out = ws.path("tables.yaml");
    let err = extract_to_file(&job, &out, &config(Arc::new(FakeSpec::new())))
        .await
        .unwrap_err();

    assert!(matches!(err, SpectractError::CaptionMismatch { .. }));
    assert!(!out.exists());
}

#[tokio::test]
async fn malformed_job_file_fails_without_output() {
    let ws = Workspace::new();
    let job = ws.path("jobs.yaml");
    std::fs::write(&job, "- input: [nvme.pdf\n  pages: 42\n").unwrap();
    let out = ws.path("tables.yaml");

    let err = extract_to_file(&job, &out, &config(Arc::new(FakeSpec::new())))
        .await
        .unwrap_err();
    assert!(matches!(err, SpectractError::InvalidJobFile { .. }));
    assert!(!out.exists());
}

#[tokio::test]
async fn missing_job_file_is_reported() {
    let ws = Workspace::new();
    let err = run_batch(
        &ws.path("nope.yaml"),
        &config(Arc::new(FakeSpec::new())),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SpectractError::FileNotFound { .. }));
}

#[tokio::test]
async fn slow_targets_are_all_awaited_within_the_concurrency_limit() {
    let ws = Workspace::new();
    let entries: Vec<(&str, &str, &str, &str)> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|name| ("nvme.pdf", "100", "0", *name))
        .collect();
    let job = ws.job("jobs.yaml", &entries);

    struct Done(AtomicUsize);
    impl BatchProgressCallback for Done {
        fn on_target_complete(&self, _: &str, _: usize) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let source = Arc::new(FakeSpec::new().with_delay(Duration::from_millis(50)));
    let done = Arc::new(Done(AtomicUsize::new(0)));
    let cfg = ExtractConfig::builder()
        .table_source(source.clone())
        .progress_callback(done.clone())
        .concurrency(2)
        .build()
        .expect("config");

    let batch = run_batch(&job, &cfg).await.expect("batch");
    assert_eq!(batch.tables.len(), 5);
    assert_eq!(done.0.load(Ordering::SeqCst), 5);
    assert!(source.max_in_flight.load(Ordering::SeqCst) <= 2);
}

// ── Header generation ────────────────────────────────────────────────────────

#[test]
fn extracted_tables_generate_a_header() {
    let ws = Workspace::new();
    let job = ws.job("jobs.yaml", JOBS);
    let tables = ws.path("tables.yaml");
    let header = ws.path("nvme.h");
    let cfg = config(Arc::new(FakeSpec::new()));

    let enums = tokio_test::block_on(async {
        extract_to_file(&job, &tables, &cfg).await.expect("extract");
        generate_to_file(&tables, &header).await.expect("generate")
    });
    assert_eq!(enums, 3);

    let text = std::fs::read_to_string(&header).unwrap();
    assert!(text.starts_with("/**\n * @headerfile nvme.h\n */\n"));
    assert!(text.contains("enum feat_tbl {\n    RESERVED = 0x00,\n    ARBITRATION = 0x01,\n"));
    assert!(text.contains(" * @var POWER_MANAGEMENT Power Management\n"));
    assert!(text.contains("enum admin_opc {"));
    // The opcode table has no value column, so values stay unset.
    assert!(text.contains("    IDENTIFY,\n"));

    let admin = text.find("enum admin_opc").unwrap();
    let feat = text.find("enum feat_tbl").unwrap();
    assert!(admin < feat);
}

#[tokio::test]
async fn table_range_concatenates_into_one_enum() {
    let ws = Workspace::new();
    let job = ws.job("jobs.yaml", &[("nvme.pdf", "43", "\"0-1\"", "feat_tbl")]);
    let tables = ws.path("tables.yaml");
    let header = ws.path("nvme.h");
    let cfg = config(Arc::new(FakeSpec::new()));

    extract_to_file(&job, &tables, &cfg).await.expect("extract");
    let loaded = load_tables(&tables).await.expect("load");
    let rows = &loaded["feat_tbl"];
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_deref().unwrap()).collect();
    assert_eq!(
        names,
        vec!["RESERVED", "ARBITRATION", "POWER_MANAGEMENT", "LBA_RANGE_TYPE"]
    );

    let enums = generate_to_file(&tables, &header).await.expect("generate");
    assert_eq!(enums, 1);
    let text = std::fs::read_to_string(&header).unwrap();
    assert_eq!(text.matches("enum feat_tbl {").count(), 1);
    assert_eq!(text.matches(" = 0x").count(), rows.len());
    let arbitration = text.find("ARBITRATION = 0x01").unwrap();
    let lba = text.find("LBA_RANGE_TYPE = 0x03").unwrap();
    assert!(arbitration < lba);
}

#[test]
fn generating_from_a_missing_file_fails() {
    let ws = Workspace::new();
    let err = tokio_test::block_on(generate_to_file(
        Path::new("/nonexistent/tables.yaml"),
        &ws.path("out.h"),
    ))
    .unwrap_err();
    assert!(matches!(err, SpectractError::FileNotFound { .. }));
    assert!(!ws.path("out.h").exists());
}

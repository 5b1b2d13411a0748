//! CLI binary for electoral-roll-ocr.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints the JSON result.
//!
//! Exit codes: 0 success, 1 processing failure, 2 invalid input,
//! 3 no records found.

use anyhow::{Context, Result};
use clap::Parser;
use electoral_roll_ocr::{
    extract, inspect, write_json_atomic, ErrorKind, ErrorResponse, ExtractionConfig,
    ExtractionError, ExtractionProgressCallback, IncompleteBlockPolicy, LanguageHints,
    PageFailurePolicy, PageSelection, ProgressCallback, RecordField,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
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

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_extraction_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rendering PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Reading");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&page_num)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Reading {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, record_count: usize) {
        let secs = self.elapsed_secs(page_num);
        let mark = if record_count == 0 {
            cyan("○")
        } else {
            green("✓")
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<12}  {}",
            mark,
            page_num,
            total,
            dim(&format!("{record_count:>4} records")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_pages: usize, total_records: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} records from {} pages",
                green("✔"),
                bold(&total_records.to_string()),
                total_pages
            );
        } else {
            eprintln!(
                "{} {} records from {} pages  ({} skipped)",
                cyan("⚠"),
                bold(&total_records.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract all pages, JSON envelope on stdout
  roll2json ward-12.pdf

  # Write to a file
  roll2json ward-12.pdf -o ward-12.json

  # Only the record array, pages 3 to 10
  roll2json --records-only --pages 3-10 ward-12.pdf

  # Keep going when a page fails OCR
  roll2json --skip-failed-pages ward-12.pdf

  # Inspect PDF metadata (no OCR)
  roll2json --inspect-only ward-12.pdf

OUTPUT:
  {"status":"success","data":[{"name":"राम कुमार","surname":"कुमार","age":45,...}],
   "message":"Extracted 1 records from 1 pages","warnings":["No match found on page 2"]}

  On failure the envelope is {"status":"error","kind":...,"code":...,"detail":...}.

EXIT CODES:
  0  success
  1  processing failure (rasterisation, OCR engine, I/O)
  2  invalid input (missing file, not a PDF, too large, bad password, bad flags)
  3  no valid records found

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to libpdfium (file or directory)
  TESSERACT_CMD     Path to the tesseract executable
  RUST_LOG          Overrides the log filter (e.g. electoral_roll_ocr=debug)

SETUP:
  tesseract with the Hindi language pack is required:
    Debian/Ubuntu:  apt-get install tesseract-ocr tesseract-ocr-hin
    macOS:          brew install tesseract tesseract-lang
"#;

/// Extract voter records from scanned electoral-roll PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "roll2json",
    version,
    about = "Extract voter records from scanned Hindi/English electoral-roll PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write JSON to this file instead of stdout.
    #[arg(short, long, env = "ROLL2JSON_OUTPUT")]
    output: Option<PathBuf>,

    /// Rendering DPI (72–600).
    #[arg(long, env = "ROLL2JSON_DPI", default_value_t = 400,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "ROLL2JSON_PAGES", default_value = "all")]
    pages: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "ROLL2JSON_PASSWORD")]
    password: Option<String>,

    /// OCR language hints, `+`-separated.
    #[arg(long, env = "ROLL2JSON_LANG", default_value = "hin+eng")]
    lang: String,

    /// tesseract executable.
    #[arg(long, env = "TESSERACT_CMD", default_value = "tesseract")]
    tesseract: PathBuf,

    /// tesseract page segmentation mode (`--psm`).
    #[arg(long, env = "ROLL2JSON_PSM", value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: Option<u8>,

    /// Fields a record must have, comma-separated.
    #[arg(long, env = "ROLL2JSON_REQUIRE", default_value = "name,age,house_number")]
    require: String,

    /// Keep an incomplete record open across a blank line instead of dropping it.
    #[arg(long, env = "ROLL2JSON_CARRY_INCOMPLETE")]
    carry_incomplete: bool,

    /// Record failed pages as warnings and continue with the rest.
    #[arg(long, env = "ROLL2JSON_SKIP_FAILED_PAGES")]
    skip_failed_pages: bool,

    /// Reject inputs larger than this many MiB.
    #[arg(long, env = "ROLL2JSON_MAX_SIZE_MB", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_size_mb: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "ROLL2JSON_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print only the record array instead of the status envelope.
    #[arg(long)]
    records_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "ROLL2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no OCR.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs (includes raw OCR text).
    #[arg(short, long, env = "ROLL2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ROLL2JSON_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO library logs are hidden while the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.inspect_only;
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

    match run(&cli, show_progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let extraction_err = err
                .chain()
                .find_map(|e| e.downcast_ref::<ExtractionError>());
            if let Some(e) = extraction_err {
                if !cli.records_only && !cli.inspect_only {
                    if let Ok(json) = serde_json::to_string_pretty(&ErrorResponse::from(e)) {
                        println!("{json}");
                    }
                }
            }
            eprintln!("{} {:#}", red("error:"), err);
            ExitCode::from(exit_status(extraction_err.map(ExtractionError::kind)))
        }
    }
}

fn exit_status(kind: Option<ErrorKind>) -> u8 {
    match kind {
        Some(ErrorKind::InvalidInput) => 2,
        Some(ErrorKind::EmptyExtraction) => 3,
        Some(ErrorKind::ProcessingFailure) | None => 1,
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(cli, None)?;
        let meta = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
        );
        return Ok(());
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(cli, progress_cb)?;

    // ── Run extraction ───────────────────────────────────────────────────
    let output = extract(&cli.input, &config)
        .await
        .context("Extraction failed")?;
    let stats = output.stats.clone();

    match (&cli.output, cli.records_only) {
        (Some(path), false) => {
            write_json_atomic(path, &output.into_response())
                .await
                .context("Failed to write output")?;
        }
        (Some(path), true) => {
            let json = serde_json::to_string_pretty(&output.records)
                .context("Failed to serialise records")?;
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        (None, false) => {
            let json = serde_json::to_string_pretty(&output.into_response())
                .context("Failed to serialise output")?;
            println!("{json}");
        }
        (None, true) => {
            let json = serde_json::to_string_pretty(&output.records)
                .context("Failed to serialise records")?;
            println!("{json}");
        }
    }

    if !cli.quiet && !show_progress {
        eprintln!(
            "Extracted {} records from {}/{} pages in {}ms",
            stats.total_records, stats.processed_pages, stats.total_pages, stats.total_duration_ms
        );
        if stats.no_match_pages > 0 {
            eprintln!("  {} pages without a record", stats.no_match_pages);
        }
    }
    if let (Some(path), false) = (&cli.output, cli.quiet) {
        eprintln!("   →  {}", bold(&path.display().to_string()));
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let pages = parse_pages(&cli.pages)?;
    let required = parse_required(&cli.require)?;
    let languages: LanguageHints = cli.lang.parse().context("Invalid --lang")?;

    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .pages(pages)
        .languages(languages)
        .tesseract_cmd(&cli.tesseract)
        .required_fields(required)
        .incomplete_blocks(if cli.carry_incomplete {
            IncompleteBlockPolicy::Carry
        } else {
            IncompleteBlockPolicy::Discard
        })
        .on_page_failure(if cli.skip_failed_pages {
            PageFailurePolicy::Skip
        } else {
            PageFailurePolicy::Abort
        })
        .max_input_bytes(cli.max_size_mb.saturating_mul(1024 * 1024))
        .download_timeout_secs(cli.download_timeout);

    if let Some(psm) = cli.psm {
        builder = builder.page_segmentation_mode(psm);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--require` into record fields.
fn parse_required(s: &str) -> Result<Vec<RecordField>> {
    s.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| {
            f.parse::<RecordField>()
                .map_err(|e| anyhow::anyhow!("Invalid --require field: {e}"))
        })
        .collect()
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}

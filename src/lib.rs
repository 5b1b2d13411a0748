//! # electoral-roll-ocr
//!
//! Extract structured voter records from scanned Hindi/English electoral-roll
//! PDFs.
//!
//! Each page is rasterised, cleaned up into a binary image, read by an OCR
//! engine and then parsed: Devanagari field labels (`निर्वाचक का नाम`,
//! `उम्र`, `मकान संख्या`, …) anchor the values, blank lines separate one
//! elector's block from the next, and page headers (section, polling station)
//! are copied onto every record of their page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL, %PDF + size checks
//!  ├─ 2. Render     rasterise pages via pdfium at 400 DPI (one page in memory at a time)
//!  ├─ 3. Normalize  grayscale → Otsu binarisation → non-local-means denoising
//!  ├─ 4. Recognize  tesseract with `hin+eng` language hints
//!  ├─ 5. Clean      line endings, invisible characters, trailing whitespace
//!  ├─ 6. Segment    label patterns + blank-line record segmentation
//!  └─ 7. Output     records in page order + per-page diagnostics
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use electoral_roll_ocr::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let output = extract("roll.pdf", &config).await?;
//!     for record in &output.records {
//!         println!("{:?} ({:?})", record.name, record.age);
//!     }
//!     println!("{}", serde_json::to_string_pretty(&output.into_response())?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `roll2json` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! electoral-roll-ocr = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime Requirements
//!
//! * a pdfium shared library (`PDFIUM_LIB_PATH`, the working directory, or the
//!   system library path);
//! * the `tesseract` executable with the `hin` and `eng` traineddata installed.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, IncompleteBlockPolicy, LanguageHints,
    PageFailurePolicy, PageSelection,
};
pub use error::{ErrorKind, ExtractionError, PageError, PipelineStage};
pub use extract::{
    extract, extract_from_bytes, extract_sync, extract_to_file, inspect, write_json_atomic,
    Extractor,
};
pub use output::{
    DocumentMetadata, ErrorResponse, ExtractionOutput, ExtractionResponse, ExtractionStats,
    Gender, PageReport, RecordField, VoterRecord,
};
pub use pipeline::recognize::{TesseractRecognizer, TextRecognizer};
pub use pipeline::render::{PageSink, PdfiumRasterizer, Rasterizer};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};

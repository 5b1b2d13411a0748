//! Error types for the electoral-roll-ocr library.
//!
//! Two layers of errors reflect two distinct failure scopes:
//!
//! * [`ExtractionError`] is **fatal**: the document cannot be turned into a
//!   record list (bad input file, pdfium unavailable, a page failed OCR, or
//!   nothing at all was extracted). Returned as `Err(ExtractionError)` from the
//!   top-level `extract*` functions.
//!
//! * [`PageError`]: a single page failed in one [`PipelineStage`]. Under the
//!   default [`crate::config::PageFailurePolicy::Abort`] it is wrapped in
//!   [`ExtractionError::ProcessingFailed`] and aborts the document; under
//!   `Skip` it is stored in [`crate::output::PageReport`] instead.
//!
//! Component errors ([`NormalizeError`], [`RecognitionError`]) never reach the
//! caller directly. The page aggregator converts them into a [`PageError`].
//!
//! Every fatal error belongs to one of three caller-facing kinds
//! ([`ErrorKind`]): invalid input, processing failure, or empty extraction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the electoral-roll-ocr library.
#[derive(Debug, Error)]
pub enum ExtractionError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input is neither a usable file path nor an HTTP/HTTPS URL.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// The input was read but does not start with the `%PDF` signature.
    #[error("Input is not a valid PDF: '{source_name}'\nFirst bytes: {magic:?}")]
    NotAPdf { source_name: String, magic: [u8; 4] },

    /// The input exceeds the configured size limit.
    #[error("Input '{source_name}' is {size} bytes, above the {limit}-byte limit")]
    FileTooLarge {
        source_name: String,
        size: u64,
        limit: u64,
    },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection matches no page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Processing errors ─────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// A page failed during rasterisation, normalisation or recognition.
    ///
    /// Aborts the whole document: records from earlier pages are dropped.
    #[error("Processing failed: {0}")]
    ProcessingFailed(#[from] PageError),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory), place the library\n\
next to the binary, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    // ── Outcome errors ────────────────────────────────────────────────────
    /// Every page was processed without error but no valid record was found.
    #[error("No data could be extracted from the PDF ({no_match_pages}/{total_pages} pages without a valid record)")]
    EmptyExtraction {
        total_pages: usize,
        no_match_pages: usize,
    },
}

/// Caller-facing classification of an [`ExtractionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Wrong file type, size, password or configuration.
    InvalidInput,
    /// Rasterisation, normalisation or recognition failed.
    ProcessingFailure,
    /// Processing succeeded but produced zero valid records.
    EmptyExtraction,
}

impl ErrorKind {
    /// HTTP status an adapter should answer with.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 400,
            ErrorKind::EmptyExtraction => 422,
            ErrorKind::ProcessingFailure => 500,
        }
    }
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::FileNotFound { .. }
            | ExtractionError::PermissionDenied { .. }
            | ExtractionError::InvalidInput { .. }
            | ExtractionError::NotAPdf { .. }
            | ExtractionError::FileTooLarge { .. }
            | ExtractionError::DownloadFailed { .. }
            | ExtractionError::DownloadTimeout { .. }
            | ExtractionError::PasswordRequired { .. }
            | ExtractionError::WrongPassword { .. }
            | ExtractionError::PageOutOfRange { .. }
            | ExtractionError::InvalidConfig(_) => ErrorKind::InvalidInput,
            ExtractionError::EmptyExtraction { .. } => ErrorKind::EmptyExtraction,
            ExtractionError::CorruptPdf { .. }
            | ExtractionError::ProcessingFailed(_)
            | ExtractionError::PdfiumBindingFailed(_)
            | ExtractionError::OutputWriteFailed { .. }
            | ExtractionError::Internal(_) => ErrorKind::ProcessingFailure,
        }
    }

    /// Shorthand for `self.kind().status_code()`.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}

/// The pipeline stage a page was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Rasterize,
    Normalize,
    Recognize,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineStage::Rasterize => "rasterisation",
            PipelineStage::Normalize => "image normalisation",
            PipelineStage::Recognize => "text recognition",
        })
    }
}

/// A failure of a single page.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("Page {page}: {stage} failed: {detail}")]
pub struct PageError {
    /// 1-indexed page number.
    pub page: usize,
    pub stage: PipelineStage,
    pub detail: String,
}

impl PageError {
    pub fn new(page: usize, stage: PipelineStage, detail: impl Into<String>) -> Self {
        Self {
            page,
            stage,
            detail: detail.into(),
        }
    }
}

/// Image normaliser failures.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The raster has a zero width or height.
    #[error("page image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// Text recognition adapter failures.
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// The OCR engine binary could not be started.
    #[error("could not start OCR engine '{command}': {source}")]
    EngineUnavailable {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The OCR engine ran but exited unsuccessfully.
    #[error("OCR engine exited with {status}: {stderr}")]
    EngineFailed { status: String, stderr: String },

    /// The normalised page could not be handed to the engine.
    #[error("could not stage page image for OCR: {0}")]
    Staging(String),
}

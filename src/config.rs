//! Configuration types for electoral-roll extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The recognizer command, language hints,
//! DPI and required-field set live here and are passed into the pipeline at
//! construction; the library keeps no process-wide state.

use crate::error::ExtractionError;
use crate::output::RecordField;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default size limit for input PDFs (10 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Configuration for an extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use electoral_roll_ocr::{ExtractionConfig, PageFailurePolicy};
///
/// let config = ExtractionConfig::builder()
///     .dpi(300)
///     .languages("hin+eng".parse().unwrap())
///     .on_page_failure(PageFailurePolicy::Skip)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 300);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–600. Default: 400.
    ///
    /// Devanagari matras and the conjunct half-forms are tiny on printed rolls;
    /// below ~300 DPI tesseract starts confusing `उम्र` and `मकान` labels.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 12000.
    pub max_rendered_pixels: u32,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Language hints handed to the recognizer. Default: `hin+eng`.
    pub languages: LanguageHints,

    /// Path or name of the tesseract executable. Default: `tesseract`.
    pub tesseract_cmd: PathBuf,

    /// Optional tesseract page segmentation mode (`--psm`).
    pub page_segmentation_mode: Option<u8>,

    /// Fields a record must carry to be emitted. Default: name, age, house_number.
    pub required_fields: Vec<RecordField>,

    /// What a blank line does to an incomplete record. Default: [`IncompleteBlockPolicy::Discard`].
    pub incomplete_blocks: IncompleteBlockPolicy,

    /// What a page failure does to the document. Default: [`PageFailurePolicy::Abort`].
    pub on_page_failure: PageFailurePolicy,

    /// Reject inputs larger than this many bytes. Default: 10 MiB.
    pub max_input_bytes: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 400,
            max_rendered_pixels: 12_000,
            pages: PageSelection::default(),
            password: None,
            languages: LanguageHints::default(),
            tesseract_cmd: PathBuf::from("tesseract"),
            page_segmentation_mode: None,
            required_fields: default_required_fields(),
            incomplete_blocks: IncompleteBlockPolicy::default(),
            on_page_failure: PageFailurePolicy::default(),
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

fn default_required_fields() -> Vec<RecordField> {
    vec![RecordField::Name, RecordField::Age, RecordField::HouseNumber]
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pages", &self.pages)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("languages", &self.languages)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field("page_segmentation_mode", &self.page_segmentation_mode)
            .field("required_fields", &self.required_fields)
            .field("incomplete_blocks", &self.incomplete_blocks)
            .field("on_page_failure", &self.on_page_failure)
            .field("max_input_bytes", &self.max_input_bytes)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn languages(mut self, hints: LanguageHints) -> Self {
        self.config.languages = hints;
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<PathBuf>) -> Self {
        self.config.tesseract_cmd = cmd.into();
        self
    }

    pub fn page_segmentation_mode(mut self, psm: u8) -> Self {
        self.config.page_segmentation_mode = Some(psm);
        self
    }

    pub fn required_fields(mut self, fields: impl IntoIterator<Item = RecordField>) -> Self {
        let mut fields: Vec<RecordField> = fields.into_iter().collect();
        let mut seen = Vec::with_capacity(fields.len());
        fields.retain(|f| {
            if seen.contains(f) {
                false
            } else {
                seen.push(*f);
                true
            }
        });
        self.config.required_fields = fields;
        self
    }

    pub fn incomplete_blocks(mut self, policy: IncompleteBlockPolicy) -> Self {
        self.config.incomplete_blocks = policy;
        self
    }

    pub fn on_page_failure(mut self, policy: PageFailurePolicy) -> Self {
        self.config.on_page_failure = policy;
        self
    }

    pub fn max_input_bytes(mut self, bytes: u64) -> Self {
        self.config.max_input_bytes = bytes;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractionError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ExtractionError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.required_fields.is_empty() {
            return Err(ExtractionError::InvalidConfig(
                "At least one required field is needed to decide record validity".into(),
            ));
        }
        if c.languages.is_empty() {
            return Err(ExtractionError::InvalidConfig(
                "At least one recognition language is needed".into(),
            ));
        }
        if c.max_input_bytes == 0 {
            return Err(ExtractionError::InvalidConfig(
                "max_input_bytes must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Handling of an incomplete record when a blank line is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IncompleteBlockPolicy {
    /// Drop the record and start a fresh one. (default)
    #[default]
    Discard,
    /// Keep accumulating into the same record across the blank line.
    ///
    /// Tolerates OCR output that breaks one elector block with stray blank
    /// lines, at the cost of merging fields from adjacent blocks when a block
    /// is genuinely incomplete.
    Carry,
}

/// Handling of a page whose rasterisation, normalisation or recognition fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageFailurePolicy {
    /// Abort the whole document with `ProcessingFailed`. (default)
    #[default]
    Abort,
    /// Record the failure in the page report and continue with the next page.
    Skip,
}

/// Specifies which pages of the PDF to process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Process all pages (default).
    #[default]
    All,
    /// Process a single page (1-indexed).
    Single(usize),
    /// Process a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Process specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Ordered set of recognition language codes, e.g. `hin+eng`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageHints(Vec<String>);

impl LanguageHints {
    pub fn new(codes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(codes.into_iter().map(Into::into).collect())
    }

    pub fn codes(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for LanguageHints {
    fn default() -> Self {
        Self::new(["hin", "eng"])
    }
}

impl fmt::Display for LanguageHints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("+"))
    }
}

impl FromStr for LanguageHints {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let codes: Vec<String> = s
            .split(['+', ','])
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if codes.is_empty() {
            return Err(ExtractionError::InvalidConfig(format!(
                "no language codes in '{s}'"
            )));
        }
        if let Some(bad) = codes
            .iter()
            .find(|c| !c.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_'))
        {
            return Err(ExtractionError::InvalidConfig(format!(
                "invalid language code '{bad}'"
            )));
        }
        Ok(Self(codes))
    }
}

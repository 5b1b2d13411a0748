//! Document-level extraction entry points and the page aggregator.
//!
//! [`Extractor`] owns the configuration and the two external collaborators
//! (rasteriser and text recogniser) and runs every page through
//! normalise → recognise → clean → segment, strictly in page order.
//! Records are concatenated page by page; the first page failure aborts the
//! document unless [`PageFailurePolicy::Skip`] is configured.

use crate::config::{ExtractionConfig, PageFailurePolicy};
use crate::error::{ExtractionError, PageError, PipelineStage};
use crate::output::{
    DocumentMetadata, ExtractionOutput, ExtractionResponse, ExtractionStats, PageReport,
    VoterRecord,
};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::normalize::normalize_page;
use crate::pipeline::postprocess::clean_ocr_text;
use crate::pipeline::recognize::{TesseractRecognizer, TextRecognizer};
use crate::pipeline::render::{self, PageSink, PdfiumRasterizer, Rasterizer};
use crate::pipeline::segment::{segment_page, PageSegmentation, SegmentRules};
use image::DynamicImage;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs extractions with a fixed configuration and collaborator set.
///
/// Cheap to clone; clones share the rasteriser and recogniser.
#[derive(Clone)]
pub struct Extractor {
    config: ExtractionConfig,
    rasterizer: Arc<dyn Rasterizer>,
    recognizer: Arc<dyn TextRecognizer>,
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extractor")
            .field("config", &self.config)
            .field("recognizer", &self.recognizer.name())
            .finish_non_exhaustive()
    }
}

impl Extractor {
    /// pdfium rasteriser and tesseract recogniser, both taken from `config`.
    pub fn new(config: ExtractionConfig) -> Self {
        let recognizer = TesseractRecognizer::from_config(&config);
        Self::with_components(config, Arc::new(PdfiumRasterizer), Arc::new(recognizer))
    }

    /// Use caller-supplied collaborators.
    pub fn with_components(
        config: ExtractionConfig,
        rasterizer: Arc<dyn Rasterizer>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Self {
        Self {
            config,
            rasterizer,
            recognizer,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract records from a PDF path or HTTP/HTTPS URL.
    pub async fn extract(&self, input_str: impl AsRef<str>) -> Result<ExtractionOutput, ExtractionError> {
        let input_str = input_str.as_ref();
        info!("Starting extraction: {}", input_str);
        let resolved = input::resolve_input(input_str, &self.config).await?;
        self.extract_resolved(resolved).await
    }

    /// Extract records from PDF bytes held in memory.
    pub async fn extract_bytes(
        &self,
        bytes: &[u8],
        source_name: &str,
    ) -> Result<ExtractionOutput, ExtractionError> {
        let resolved = ResolvedInput::from_bytes(bytes, source_name, self.config.max_input_bytes)?;
        self.extract_resolved(resolved).await
    }

    async fn extract_resolved(
        &self,
        resolved: ResolvedInput,
    ) -> Result<ExtractionOutput, ExtractionError> {
        let this = self.clone();
        // `resolved` moves into the task so a staged temp copy outlives it.
        tokio::task::spawn_blocking(move || this.extract_path(resolved.path()))
            .await
            .map_err(|e| ExtractionError::Internal(format!("Extraction task panicked: {}", e)))?
    }

    /// Blocking extraction of an already validated local PDF.
    pub fn extract_path(&self, pdf_path: &Path) -> Result<ExtractionOutput, ExtractionError> {
        let started = Instant::now();
        let mut aggregator = PageAggregator::new(&self.config, self.recognizer.as_ref());
        self.rasterizer
            .rasterize(pdf_path, &self.config, &mut aggregator)?;
        aggregator.finish(started)
    }
}

// ── Page aggregator ──────────────────────────────────────────────────────

struct PageAggregator<'a> {
    config: &'a ExtractionConfig,
    recognizer: &'a dyn TextRecognizer,
    rules: SegmentRules,
    selected_pages: usize,
    records: Vec<VoterRecord>,
    pages: Vec<PageReport>,
    first_failure: Option<PageError>,
    work_ms: u64,
    recognition_ms: u64,
}

impl<'a> PageAggregator<'a> {
    fn new(config: &'a ExtractionConfig, recognizer: &'a dyn TextRecognizer) -> Self {
        Self {
            config,
            recognizer,
            rules: SegmentRules::from(config),
            selected_pages: 0,
            records: Vec::new(),
            pages: Vec::new(),
            first_failure: None,
            work_ms: 0,
            recognition_ms: 0,
        }
    }

    fn process(
        &mut self,
        page_num: usize,
        image: DynamicImage,
    ) -> Result<(PageSegmentation, usize), PageError> {
        let binary = normalize_page(&image)
            .map_err(|e| PageError::new(page_num, PipelineStage::Normalize, e.to_string()))?;
        drop(image);

        let ocr_start = Instant::now();
        let raw = self
            .recognizer
            .recognize(&binary, &self.config.languages)
            .map_err(|e| PageError::new(page_num, PipelineStage::Recognize, e.to_string()))?;
        self.recognition_ms += ocr_start.elapsed().as_millis() as u64;
        debug!("OCR text from page {}:\n{}", page_num, raw);

        let text = clean_ocr_text(&raw);
        let chars = text.chars().count();
        Ok((segment_page(&text, &self.rules), chars))
    }

    fn finish(self, started: Instant) -> Result<ExtractionOutput, ExtractionError> {
        let failed_pages = self.pages.iter().filter(|p| p.error.is_some()).count();
        let processed_pages = self.pages.len() - failed_pages;
        let no_match_pages = self
            .pages
            .iter()
            .filter(|p| p.error.is_none() && p.no_match)
            .count();

        if processed_pages == 0 {
            if let Some(e) = self.first_failure {
                return Err(ExtractionError::ProcessingFailed(e));
            }
        }
        if self.records.is_empty() {
            return Err(ExtractionError::EmptyExtraction {
                total_pages: self.pages.len(),
                no_match_pages,
            });
        }

        let total_duration_ms = started.elapsed().as_millis() as u64;
        let stats = ExtractionStats {
            total_pages: self.pages.len(),
            processed_pages,
            failed_pages,
            no_match_pages,
            total_records: self.records.len(),
            discarded_blocks: self.pages.iter().map(|p| p.discarded_blocks).sum(),
            total_duration_ms,
            render_duration_ms: total_duration_ms.saturating_sub(self.work_ms),
            recognition_duration_ms: self.recognition_ms,
        };

        info!(
            "Extraction complete: {} records from {}/{} pages, {}ms total",
            stats.total_records, processed_pages, stats.total_pages, total_duration_ms
        );
        if let Some(cb) = &self.config.progress_callback {
            cb.on_extraction_complete(self.selected_pages, stats.total_records);
        }

        Ok(ExtractionOutput {
            records: self.records,
            pages: self.pages,
            stats,
        })
    }
}

impl PageSink for PageAggregator<'_> {
    fn begin(&mut self, selected_pages: usize, document_pages: usize) {
        self.selected_pages = selected_pages;
        debug!(
            "Selected {} of {} pages for extraction",
            selected_pages, document_pages
        );
        if let Some(cb) = &self.config.progress_callback {
            cb.on_extraction_start(selected_pages);
        }
    }

    fn page(
        &mut self,
        page_num: usize,
        raster: Result<DynamicImage, PageError>,
    ) -> Result<(), ExtractionError> {
        let total = self.selected_pages;
        if let Some(cb) = &self.config.progress_callback {
            cb.on_page_start(page_num, total);
        }

        let start = Instant::now();
        let outcome = raster.and_then(|image| self.process(page_num, image));
        let duration_ms = start.elapsed().as_millis() as u64;
        self.work_ms += duration_ms;

        match outcome {
            Ok((seg, text_chars)) => {
                let record_count = seg.records.len();
                if record_count == 0 {
                    warn!("No match found on page {}", page_num);
                } else {
                    info!("Matched {} records on page {}", record_count, page_num);
                }
                self.pages.push(PageReport {
                    page_num,
                    record_count,
                    discarded_blocks: seg.discarded_blocks,
                    no_match: record_count == 0,
                    text_chars,
                    duration_ms,
                    error: None,
                });
                self.records.extend(seg.records);
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_page_complete(page_num, total, record_count);
                }
                Ok(())
            }
            Err(e) => {
                if let Some(cb) = &self.config.progress_callback {
                    cb.on_page_error(page_num, total, &e.to_string());
                }
                match self.config.on_page_failure {
                    PageFailurePolicy::Abort => {
                        warn!("{}; aborting document", e);
                        Err(ExtractionError::ProcessingFailed(e))
                    }
                    PageFailurePolicy::Skip => {
                        warn!("{}; skipping page", e);
                        self.pages.push(PageReport {
                            page_num,
                            record_count: 0,
                            discarded_blocks: 0,
                            no_match: true,
                            text_chars: 0,
                            duration_ms,
                            error: Some(e.clone()),
                        });
                        self.first_failure.get_or_insert(e);
                        Ok(())
                    }
                }
            }
        }
    }
}

// ── Free-function API ────────────────────────────────────────────────────

/// Extract voter records from a PDF file or URL.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// * invalid input (missing file, not a PDF, too large, bad password),
/// * a page failing rasterisation, normalisation or recognition,
/// * zero valid records in the whole document ([`ExtractionError::EmptyExtraction`]).
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractionError> {
    Extractor::new(config.clone()).extract(input_str).await
}

/// Extract voter records from PDF bytes in memory.
///
/// The bytes are size- and magic-checked before anything is written; the
/// staged temp copy is removed on return.
///
/// # Example
/// ```rust,no_run
/// use electoral_roll_ocr::{extract_from_bytes, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("roll.pdf")?;
/// let output = extract_from_bytes(&bytes, &ExtractionConfig::default()).await?;
/// println!("{} records", output.records.len());
/// # Ok(())
/// # }
/// ```
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractionError> {
    Extractor::new(config.clone())
        .extract_bytes(bytes, "upload.pdf")
        .await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractionError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractionError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, config))
}

/// Extract and write the success envelope as JSON to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, ExtractionError> {
    let output = extract(input_str, config).await?;
    let stats = output.stats.clone();
    write_json_atomic(output_path.as_ref(), &output.into_response()).await?;
    Ok(stats)
}

/// Serialise `response` and atomically replace `path` with it.
pub async fn write_json_atomic(
    path: &Path,
    response: &ExtractionResponse,
) -> Result<(), ExtractionError> {
    let write_err = |source: std::io::Error| ExtractionError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_vec_pretty(response)
        .map_err(|e| ExtractionError::Internal(format!("JSON serialisation failed: {}", e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Read PDF metadata without rasterising or recognising anything.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<DocumentMetadata, ExtractionError> {
    let resolved = input::resolve_input(input_str.as_ref(), config).await?;
    render::extract_metadata(resolved.path(), config.password.as_deref()).await
}

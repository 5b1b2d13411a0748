//! PDF rasterisation: render selected pages to `DynamicImage` via pdfium.
//!
//! Pages are rendered one at a time and pushed into a [`PageSink`]; the
//! raster is dropped as soon as the sink returns, so at most one page image
//! is alive at a time regardless of document length. Rendering runs on the
//! caller's thread; async callers move it into `spawn_blocking`.
//!
//! The scale is `dpi / 72` (PDF user space is 72 units per inch), with
//! `max_rendered_pixels` capping the longest edge so oversized pages stay
//! bounded in memory.

use crate::config::ExtractionConfig;
use crate::error::{ExtractionError, PageError, PipelineStage};
use crate::output::DocumentMetadata;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Receives rendered pages in ascending page order.
pub trait PageSink {
    /// Called once before the first page.
    ///
    /// `selected_pages` is the number of pages that will follow,
    /// `document_pages` the page count of the whole PDF.
    fn begin(&mut self, selected_pages: usize, document_pages: usize);

    /// Called once per selected page with its 1-indexed number. A raster
    /// failure arrives as `Err`; returning `Err` stops rendering.
    fn page(
        &mut self,
        page_num: usize,
        raster: Result<DynamicImage, PageError>,
    ) -> Result<(), ExtractionError>;
}

/// Anything that can turn a PDF file into page rasters.
pub trait Rasterizer: Send + Sync {
    fn rasterize(
        &self,
        pdf_path: &Path,
        config: &ExtractionConfig,
        sink: &mut dyn PageSink,
    ) -> Result<(), ExtractionError>;
}

/// pdfium-backed rasterizer.
///
/// The library is bound per document: `PDFIUM_LIB_PATH` (a file, or a
/// directory holding the platform library) first, then the working
/// directory, then the system library path.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumRasterizer;

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(
        &self,
        pdf_path: &Path,
        config: &ExtractionConfig,
        sink: &mut dyn PageSink,
    ) -> Result<(), ExtractionError> {
        let pdfium = bind_pdfium()?;
        let document = open_document(&pdfium, pdf_path, config.password.as_deref())?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let indices = config.pages.to_indices(total_pages);
        if indices.is_empty() {
            return Err(ExtractionError::PageOutOfRange {
                page: first_requested_page(config),
                total: total_pages,
            });
        }
        sink.begin(indices.len(), total_pages);

        let render_config = render_config(config);
        for idx in indices {
            let page_num = idx + 1;
            let raster = pages
                .get(idx as u16)
                .and_then(|page| {
                    page.render_with_config(&render_config)
                        .map(|bitmap| bitmap.as_image())
                })
                .map_err(|e| PageError::new(page_num, PipelineStage::Rasterize, format!("{:?}", e)));

            if let Ok(image) = &raster {
                debug!(
                    "Rendered page {} → {}x{} px",
                    page_num,
                    image.width(),
                    image.height()
                );
            }
            sink.page(page_num, raster)?;
        }

        Ok(())
    }
}

fn render_config(config: &ExtractionConfig) -> PdfRenderConfig {
    let max = config.max_rendered_pixels as i32;
    PdfRenderConfig::new()
        .scale_page_by_factor(config.dpi as f32 / 72.0)
        .set_maximum_width(max)
        .set_maximum_height(max)
}

fn first_requested_page(config: &ExtractionConfig) -> usize {
    use crate::config::PageSelection;
    match &config.pages {
        PageSelection::All => 1,
        PageSelection::Single(p) => *p,
        PageSelection::Range(start, _) => *start,
        PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(1),
    }
}

/// Bind to a pdfium shared library.
pub fn bind_pdfium() -> Result<Pdfium, ExtractionError> {
    let bindings = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(p) => {
            let p = PathBuf::from(p);
            let lib = if p.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&p)
            } else {
                p
            };
            debug!("Binding pdfium from PDFIUM_LIB_PATH: {}", lib.display());
            Pdfium::bind_to_library(&lib)
        }
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ExtractionError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, ExtractionError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                ExtractionError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                ExtractionError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            ExtractionError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// Extract document metadata from a PDF without rendering pages.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, ExtractionError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| ExtractionError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, ExtractionError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
        is_encrypted: password.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageSelection;

    #[test]
    fn test_first_requested_page() {
        let config = ExtractionConfig::builder()
            .pages(PageSelection::Set(vec![9, 4, 7]))
            .build()
            .unwrap();
        assert_eq!(first_requested_page(&config), 4);

        let config = ExtractionConfig::builder()
            .pages(PageSelection::Range(12, 20))
            .build()
            .unwrap();
        assert_eq!(first_requested_page(&config), 12);
        assert_eq!(first_requested_page(&ExtractionConfig::default()), 1);
    }

    #[test]
    fn test_open_document_maps_unreadable_pdf() {
        let Ok(pdfium) = bind_pdfium() else {
            println!("SKIP: pdfium library not available");
            return;
        };
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut tmp, b"%PDF-1.7\nnot really a document").unwrap();

        let password = String::from("roll-secret");
        let err = open_document(&pdfium, tmp.path(), Some(password.as_str()))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ExtractionError::CorruptPdf { .. } | ExtractionError::WrongPassword { .. }
        ));

        let err = open_document(&pdfium, tmp.path(), None).err().unwrap();
        assert!(matches!(err, ExtractionError::CorruptPdf { .. }));
    }
}

//! Text recognition adapter: binary page image → raw text.
//!
//! The pipeline talks to OCR through [`TextRecognizer`]. The shipped
//! implementation, [`TesseractRecognizer`], shells out to the `tesseract`
//! executable: the page is written to a temporary PNG and the engine's
//! stdout is returned verbatim. Lines are separated by `\n`, blank lines mark
//! block boundaries.
//!
//! Recognition has no timeout. A hung engine blocks the page (and with it the
//! document) until the process exits.

use crate::config::{ExtractionConfig, LanguageHints};
use crate::error::RecognitionError;
use image::{GrayImage, ImageFormat};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Anything that can turn a normalised page into text.
pub trait TextRecognizer: Send + Sync {
    /// Recognise one page. `languages` is an ordered hint list such as `hin+eng`.
    fn recognize(&self, image: &GrayImage, languages: &LanguageHints)
        -> Result<String, RecognitionError>;

    /// Engine name for logs.
    fn name(&self) -> &str {
        "ocr"
    }
}

/// Runs the tesseract CLI once per page.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    command: PathBuf,
    page_segmentation_mode: Option<u8>,
    dpi: Option<u32>,
}

impl TesseractRecognizer {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            page_segmentation_mode: None,
            dpi: None,
        }
    }

    /// Command, `--psm` and source resolution taken from the configuration.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            command: config.tesseract_cmd.clone(),
            page_segmentation_mode: config.page_segmentation_mode,
            dpi: Some(config.dpi),
        }
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    fn run(&self, png: &Path, languages: &LanguageHints) -> Result<String, RecognitionError> {
        let mut cmd = Command::new(&self.command);
        cmd.arg(png).arg("stdout").arg("-l").arg(languages.to_string());
        if let Some(psm) = self.page_segmentation_mode {
            cmd.arg("--psm").arg(psm.to_string());
        }
        if let Some(dpi) = self.dpi {
            cmd.arg("--dpi").arg(dpi.to_string());
        }

        let output = cmd
            .output()
            .map_err(|source| RecognitionError::EngineUnavailable {
                command: self.command.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::EngineFailed {
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(
        &self,
        image: &GrayImage,
        languages: &LanguageHints,
    ) -> Result<String, RecognitionError> {
        let mut tmp = tempfile::Builder::new()
            .prefix("roll-page-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| RecognitionError::Staging(e.to_string()))?;
        image
            .write_to(&mut tmp, ImageFormat::Png)
            .map_err(|e| RecognitionError::Staging(e.to_string()))?;
        tmp.flush()
            .map_err(|e| RecognitionError::Staging(e.to_string()))?;

        debug!(
            "Running {} on {}x{} page ({})",
            self.command.display(),
            image.width(),
            image.height(),
            languages
        );
        self.run(tmp.path(), languages)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_missing_engine_is_unavailable() {
        let recognizer = TesseractRecognizer::new("/nonexistent/bin/tesseract-roll-test");
        let page = GrayImage::from_pixel(8, 8, Luma([255]));
        let err = recognizer
            .recognize(&page, &LanguageHints::default())
            .unwrap_err();
        match err {
            RecognitionError::EngineUnavailable { command, .. } => {
                assert!(command.contains("tesseract-roll-test"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_config() {
        let config = ExtractionConfig::builder()
            .tesseract_cmd("/opt/tess/bin/tesseract")
            .page_segmentation_mode(6)
            .dpi(300)
            .build()
            .unwrap();
        let r = TesseractRecognizer::from_config(&config);
        assert_eq!(r.command(), Path::new("/opt/tess/bin/tesseract"));
        assert_eq!(r.page_segmentation_mode, Some(6));
        assert_eq!(r.dpi, Some(300));
        assert_eq!(r.name(), "tesseract");
    }

    #[cfg(unix)]
    #[test]
    fn test_engine_failure_carries_stderr() {
        // `false` ignores its arguments and exits 1.
        let recognizer = TesseractRecognizer::new("false");
        let page = GrayImage::from_pixel(4, 4, Luma([0]));
        let err = recognizer
            .recognize(&page, &LanguageHints::default())
            .unwrap_err();
        assert!(matches!(err, RecognitionError::EngineFailed { .. }));
    }
}

//! Pipeline stages for electoral-roll extraction.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the external collaborators (pdfium, tesseract) can be
//! swapped behind their traits.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ normalize ──▶ recognize ──▶ postprocess ──▶ fields + segment
//! (path/URL) (pdfium)   (Otsu+NLM)    (tesseract)   (text cleanup)   (records)
//! ```
//!
//! 1. [`input`]    : canonicalise the path or URL, check `%PDF` magic and size
//! 2. [`render`]   : rasterise selected pages at the configured DPI
//! 3. [`normalize`]: grayscale, Otsu binarisation, non-local-means denoising
//! 4. [`recognize`]: hand the binary page to the OCR engine
//! 5. [`postprocess`]: deterministic cleanup of raw OCR text
//! 6. [`fields`]   : Devanagari label patterns (page header + per line)
//! 7. [`segment`]  : blank-line record segmentation and validity

pub mod fields;
pub mod input;
pub mod normalize;
pub mod postprocess;
pub mod recognize;
pub mod render;
pub mod segment;

//! Input resolution: normalise a user-supplied path, URL or byte buffer to a
//! local PDF file.
//!
//! pdfium opens documents by path, so URL downloads and in-memory uploads are
//! staged into a `TempDir` that lives as long as the [`ResolvedInput`]. Every
//! source is checked against the configured size limit and the `%PDF` magic
//! before rasterisation starts.

use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use futures::{Stream, StreamExt};
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// The resolved input: a local path, or a staged temp copy.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was downloaded or uploaded; the PDF lives in a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until processing completes.
    Staged { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Staged { path, .. } => path,
        }
    }

    /// Validate an in-memory upload and stage it for pdfium.
    pub fn from_bytes(
        bytes: &[u8],
        source_name: &str,
        max_bytes: u64,
    ) -> Result<Self, ExtractionError> {
        validate_pdf_bytes(bytes, source_name, max_bytes)?;
        stage(bytes, &staged_file_name(source_name))
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file path.
///
/// URLs are downloaded to a temporary directory; local paths are checked for
/// existence, readability, size and PDF magic.
pub async fn resolve_input(
    input: &str,
    config: &ExtractionConfig,
) -> Result<ResolvedInput, ExtractionError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ExtractionError::InvalidInput {
            input: String::new(),
            reason: "no input path or URL given".into(),
        });
    }
    if is_url(input) {
        download_url(input, config).await
    } else {
        resolve_local(input, config.max_input_bytes)
    }
}

/// Size and `%PDF` checks shared by every input source.
pub fn validate_pdf_bytes(
    bytes: &[u8],
    source_name: &str,
    max_bytes: u64,
) -> Result<(), ExtractionError> {
    check_size(bytes.len() as u64, source_name, max_bytes)?;
    check_magic(bytes, source_name)
}

fn check_size(size: u64, source_name: &str, max_bytes: u64) -> Result<(), ExtractionError> {
    if size > max_bytes {
        return Err(ExtractionError::FileTooLarge {
            source_name: source_name.to_string(),
            size,
            limit: max_bytes,
        });
    }
    Ok(())
}

fn check_magic(head: &[u8], source_name: &str) -> Result<(), ExtractionError> {
    if head.starts_with(PDF_MAGIC) {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = head.len().min(4);
    magic[..n].copy_from_slice(&head[..n]);
    Err(ExtractionError::NotAPdf {
        source_name: source_name.to_string(),
        magic,
    })
}

/// Resolve a local file path, validating existence, size and PDF magic bytes.
fn resolve_local(path_str: &str, max_bytes: u64) -> Result<ResolvedInput, ExtractionError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ExtractionError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(ExtractionError::InvalidInput {
            input: path_str.to_string(),
            reason: "is a directory".into(),
        });
    }

    let source_name = path.display().to_string();
    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractionError::PermissionDenied { path });
        }
        Err(_) => return Err(ExtractionError::FileNotFound { path }),
    };

    let size = file
        .metadata()
        .map_err(|e| ExtractionError::Internal(format!("stat {}: {}", source_name, e)))?
        .len();
    check_size(size, &source_name, max_bytes)?;

    let mut head = Vec::with_capacity(PDF_MAGIC.len());
    (&mut file)
        .take(PDF_MAGIC.len() as u64)
        .read_to_end(&mut head)
        .map_err(|e| ExtractionError::Internal(format!("read {}: {}", source_name, e)))?;
    check_magic(&head, &source_name)?;

    debug!("Resolved local PDF: {} ({} bytes)", path.display(), size);
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(
    url: &str,
    config: &ExtractionConfig,
) -> Result<ResolvedInput, ExtractionError> {
    info!("Downloading PDF from: {}", url);
    let timeout_secs = config.download_timeout_secs;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExtractionError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_send_err = |e: reqwest::Error| {
        if e.is_timeout() {
            ExtractionError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ExtractionError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_send_err)?;

    if !response.status().is_success() {
        return Err(ExtractionError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    // Refuse early when the server announces an oversized body.
    if let Some(len) = response.content_length() {
        check_size(len, url, config.max_input_bytes)?;
    }

    let filename = extract_filename(url);
    let bytes = read_body_limited(
        response.bytes_stream(),
        url,
        config.max_input_bytes,
        map_send_err,
    )
    .await?;
    validate_pdf_bytes(&bytes, url, config.max_input_bytes)?;

    let staged = stage(&bytes, &filename)?;
    info!("Downloaded to: {}", staged.path().display());
    Ok(staged)
}

/// Collect a response body, giving up as soon as it grows past `max_bytes`.
///
/// Chunked responses carry no `Content-Length`, so the limit has to be
/// enforced while reading.
async fn read_body_limited<S, B, E>(
    chunks: S,
    source_name: &str,
    max_bytes: u64,
    map_err: impl Fn(E) -> ExtractionError,
) -> Result<Vec<u8>, ExtractionError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    let mut chunks = std::pin::pin!(chunks);
    let mut body = Vec::new();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(&map_err)?;
        body.extend_from_slice(chunk.as_ref());
        check_size(body.len() as u64, source_name, max_bytes)?;
    }
    Ok(body)
}

fn stage(bytes: &[u8], filename: &str) -> Result<ResolvedInput, ExtractionError> {
    let temp_dir = TempDir::new().map_err(|e| ExtractionError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(filename);
    std::fs::write(&path, bytes)
        .map_err(|e| ExtractionError::Internal(format!("Failed to write temp file: {}", e)))?;
    Ok(ResolvedInput::Staged {
        path,
        _temp_dir: temp_dir,
    })
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return staged_file_name(last);
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

/// A file name safe to join onto the staging directory.
fn staged_file_name(source_name: &str) -> String {
    let base = Path::new(source_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    if base.is_empty() || base == ".." {
        "upload.pdf".to_string()
    } else {
        base.to_string()
    }
}

//! Upload validation and confidence banding.
//!
//! Both are pure functions of the data model. Every entry point that yields
//! a file (path argument, in-memory bytes) goes through the same
//! [`UploadValidator`] so the policy cannot diverge.

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{ClientError, ValidationError};

/// Upload ceiling: 10 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Fallback type for files whose extension is not recognised.
const UNKNOWN_MIME: &str = "application/octet-stream";

// =============================================================================
// Upload Candidate
// =============================================================================

/// Where the bytes of a candidate come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Already in memory (dropped or piped in)
    Memory(Bytes),
    /// On disk; read only when the attempt reaches submission
    Path(PathBuf),
}

/// A user-selected file, between selection and submission.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub file_name: String,
    pub declared_mime: String,
    pub size_bytes: u64,
    pub source: FileSource,
}

impl UploadCandidate {
    /// Candidate backed by in-memory bytes.
    pub fn from_bytes(
        file_name: impl Into<String>,
        declared_mime: impl Into<String>,
        contents: impl Into<Bytes>,
    ) -> Self {
        let contents = contents.into();
        Self {
            file_name: file_name.into(),
            declared_mime: declared_mime.into(),
            size_bytes: contents.len() as u64,
            source: FileSource::Memory(contents),
        }
    }

    /// Candidate backed by a file on disk.
    ///
    /// Only the metadata is read here. Without an explicit type the MIME
    /// type is declared from the file extension.
    pub async fn from_path(
        path: impl AsRef<Path>,
        declared_mime: Option<String>,
    ) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ClientError::File {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if !metadata.is_file() {
            return Err(ClientError::File {
                path: path.display().to_string(),
                reason: "not a regular file".to_string(),
            });
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let declared_mime =
            declared_mime.unwrap_or_else(|| mime_from_extension(path).to_string());

        Ok(Self {
            file_name,
            declared_mime,
            size_bytes: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Load the file contents for submission.
    ///
    /// At most `limit + 1` bytes are read, and the size is checked again on
    /// what was read rather than on the metadata seen at selection.
    pub async fn contents(&self, limit: u64) -> Result<Bytes, ValidationError> {
        let contents = match &self.source {
            FileSource::Memory(bytes) => bytes.clone(),
            FileSource::Path(path) => {
                let unreadable = |e: std::io::Error| ValidationError::Unreadable {
                    reason: format!("{}: {}", path.display(), e),
                };
                let file = tokio::fs::File::open(path).await.map_err(unreadable)?;
                read_capped(file, limit).await.map_err(unreadable)?
            }
        };

        let size = contents.len() as u64;
        if size > limit {
            return Err(ValidationError::TooLarge { size, limit });
        }
        Ok(contents)
    }
}

/// Read `reader` to the end, stopping one byte past `limit`.
///
/// A result longer than `limit` means the source is oversized; its true
/// length is not known.
pub async fn read_capped<R>(reader: R, limit: u64) -> std::io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut contents = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut contents)
        .await?;
    Ok(Bytes::from(contents))
}

/// Declared MIME type for a path, by extension.
pub fn mime_from_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "dcm" => "application/dicom",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => UNKNOWN_MIME,
    }
}

// =============================================================================
// Validator
// =============================================================================

/// Accept/reject policy applied before anything reaches the network.
#[derive(Debug, Clone, Copy)]
pub struct UploadValidator {
    max_bytes: u64,
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Check a declared type and size.
    ///
    /// The type check runs first; a non-image is `UnsupportedType` whatever
    /// its size.
    pub fn check(&self, declared_mime: &str, size_bytes: u64) -> Result<(), ValidationError> {
        if !is_image_mime(declared_mime) {
            return Err(ValidationError::UnsupportedType {
                mime: declared_mime.to_string(),
            });
        }

        if size_bytes > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size: size_bytes,
                limit: self.max_bytes,
            });
        }

        Ok(())
    }

    pub fn validate(&self, candidate: &UploadCandidate) -> Result<(), ValidationError> {
        self.check(&candidate.declared_mime, candidate.size_bytes)
    }
}

/// True for `image/<subtype>`, ignoring case and parameters.
pub fn is_image_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.split_once('/') {
        Some((kind, subtype)) => kind == "image" && !subtype.is_empty(),
        None => false,
    }
}

// =============================================================================
// Confidence Banding
// =============================================================================

/// Lower bound (inclusive) of the High band.
pub const HIGH_CONFIDENCE: f64 = 0.70;

/// Lower bound (inclusive) of the Medium band.
pub const MEDIUM_CONFIDENCE: f64 = 0.50;

/// Qualitative label derived from a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= HIGH_CONFIDENCE {
            ConfidenceBand::High
        } else if confidence >= MEDIUM_CONFIDENCE {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceBand::High => "High",
            ConfidenceBand::Medium => "Medium",
            ConfidenceBand::Low => "Low",
        }
    }
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

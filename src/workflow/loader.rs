//! # Loading and validation
//!
//! ## Design
//!
//! Fail as early as possible: the type and byte checks run before anything
//! is decoded, and the pixel cap runs right after decode so an oversized
//! source never reaches the session.
//!
//! ## Implementation
//!
//! - bytes: declared MIME must be `image/*`; without one the signature is
//!   sniffed with `infer`
//! - file path: existence + metadata size check before reading
//! - data URL: `data:image/...;base64,` with a decoded-size estimate checked
//!   before decoding

use std::path::Path;

use base64::{Engine as _, engine::general_purpose};

use crate::geometry::Size;

use super::source::FileInput;
use super::{WorkflowConfig, WorkflowError};

/// Check the declared type (or signature) and the upload byte cap.
pub fn validate_upload(file: &FileInput, config: &WorkflowConfig) -> Result<(), WorkflowError> {
    match file.mime.as_deref() {
        Some(mime) => {
            if !is_image_mime(mime) {
                return Err(WorkflowError::InvalidFileType {
                    detected: Some(mime.to_string()),
                });
            }
        }
        None => validate_image_signature(&file.bytes)?,
    }

    if file.size() > config.max_upload_bytes {
        return Err(WorkflowError::FileTooLarge {
            size: file.size(),
            limit: config.max_upload_bytes,
        });
    }

    Ok(())
}

/// Reject sources above the upload pixel cap.
pub fn validate_resolution(size: Size, config: &WorkflowConfig) -> Result<(), WorkflowError> {
    if size.pixel_count() > config.max_upload_pixels() {
        return Err(WorkflowError::ResolutionTooHigh {
            width: size.width,
            height: size.height,
            max_width: config.max_upload_resolution.width,
            max_height: config.max_upload_resolution.height,
        });
    }
    Ok(())
}

fn is_image_mime(mime: &str) -> bool {
    mime.trim().to_ascii_lowercase().starts_with("image/")
}

fn validate_image_signature(bytes: &[u8]) -> Result<(), WorkflowError> {
    if bytes.is_empty() {
        return Err(WorkflowError::InvalidFileType { detected: None });
    }

    let kind = infer::get(bytes).ok_or(WorkflowError::InvalidFileType { detected: None })?;
    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(WorkflowError::InvalidFileType {
            detected: Some(kind.mime_type().to_string()),
        });
    }
    Ok(())
}

impl FileInput {
    /// Read a local file. The size cap is checked from metadata before the
    /// file is read; the MIME type is left to signature sniffing.
    pub fn from_path(path: impl AsRef<Path>, max_bytes: u64) -> Result<Self, WorkflowError> {
        let path = path.as_ref();
        log::info!("📁 reading image file: {}", path.display());

        if !path.exists() {
            return Err(WorkflowError::FileSystem(format!(
                "file not found: {}",
                path.display()
            )));
        }

        let metadata = std::fs::metadata(path)
            .map_err(|e| WorkflowError::FileSystem(format!("cannot stat file: {}", e)))?;
        if metadata.len() > max_bytes {
            return Err(WorkflowError::FileTooLarge {
                size: metadata.len(),
                limit: max_bytes,
            });
        }

        let bytes = std::fs::read(path)
            .map_err(|e| WorkflowError::FileSystem(format!("cannot read file: {}", e)))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self::from_bytes(name, None, bytes))
    }

    /// Parse a `data:image/...;base64,` URL.
    pub fn from_data_url(name: impl Into<String>, data: &str, max_bytes: u64) -> Result<Self, WorkflowError> {
        let normalized = data.trim();
        let rest = normalized
            .strip_prefix("data:")
            .ok_or(WorkflowError::InvalidFileType { detected: None })?;
        let (mime, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| WorkflowError::Decode("missing base64 marker".to_string()))?;

        if !is_image_mime(mime) {
            return Err(WorkflowError::InvalidFileType {
                detected: Some(mime.to_string()),
            });
        }

        let estimated = estimate_base64_decoded_len(payload);
        if estimated > max_bytes {
            return Err(WorkflowError::FileTooLarge {
                size: estimated,
                limit: max_bytes,
            });
        }

        let bytes = general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| WorkflowError::Decode(format!("invalid base64 payload: {}", e)))?;

        Ok(Self::from_bytes(name, Some(mime), bytes))
    }
}

/// Upper bound of the decoded length of a base64 payload.
fn estimate_base64_decoded_len(payload: &str) -> u64 {
    let len = payload.trim().len() as u64;
    len.saturating_add(3) / 4 * 3
}

//! # Inputs and artifacts
//!
//! - [`FileInput`]: an upload as handed over by the glue, not yet validated
//! - [`SourceImage`]: the decoded source owned by the session
//! - [`OutputArtifact`]: the published result of the last successful pass

use bytes::Bytes;
use serde::Serialize;

use crate::geometry::Size;

use super::host::{HandleToken, Surface};

/// Fallback base for download names when no file name is known.
pub const DEFAULT_BASE_NAME: &str = "wallfit";

/// An upload before validation.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub name: String,
    /// Declared MIME type. `None` means "sniff the signature".
    pub mime: Option<String>,
    pub bytes: Bytes,
}

impl FileInput {
    pub fn from_bytes(name: impl Into<String>, mime: Option<&str>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime: mime.map(str::to_string),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// File name without its last extension, `wallfit` when empty.
    pub fn base_name(&self) -> String {
        base_name_of(&self.name)
    }
}

pub(crate) fn base_name_of(name: &str) -> String {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = match file_name.rfind('.') {
        Some(index) if index > 0 => &file_name[..index],
        _ => file_name,
    };
    if stem.is_empty() {
        DEFAULT_BASE_NAME.to_string()
    } else {
        stem.to_string()
    }
}

/// What the session remembers about the loaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMeta {
    pub name: String,
    pub mime: Option<String>,
    pub size: u64,
}

impl From<&FileInput> for FileMeta {
    fn from(file: &FileInput) -> Self {
        Self {
            name: file.name.clone(),
            mime: file.mime.clone(),
            size: file.size(),
        }
    }
}

/// Decoded source owned by the session.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub surface: Surface,
    pub size: Size,
}

impl SourceImage {
    pub fn new(surface: Surface) -> Self {
        let size = surface.size();
        Self { surface, size }
    }
}

/// Encoded output of a successful pass.
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
    pub quality: f64,
    pub warnings: Vec<String>,
    pub handle: HandleToken,
}

impl OutputArtifact {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_strips_last_extension() {
        assert_eq!(base_name_of("holiday.photo.png"), "holiday.photo");
        assert_eq!(base_name_of("/tmp/shots/beach.JPG"), "beach");
        assert_eq!(base_name_of("README"), "README");
        assert_eq!(base_name_of(".hidden"), ".hidden");
        assert_eq!(base_name_of(""), DEFAULT_BASE_NAME);
    }

    #[test]
    fn file_input_reports_size() {
        let file = FileInput::from_bytes("a.png", Some("image/png"), vec![0u8; 10]);
        assert_eq!(file.size(), 10);
        assert_eq!(FileMeta::from(&file).mime.as_deref(), Some("image/png"));
    }
}

//! # Host capabilities
//!
//! ## Design
//!
//! Decoding, resampling and encoding sit behind [`ImageHost`] so the workflow
//! can run against the native implementation below or a scripted fake in
//! tests. Temporary object handles (preview URLs, download blobs) go through
//! [`ObjectHandles`] for the same reason.
//!
//! ## Native implementation
//!
//! - decode: `image::ImageReader` with format sniffing
//! - rasterize: `fast_image_resize` convolution on RGB8, cropping via
//!   `ResizeOptions::crop`; falls back to `image::imageops` on failure
//! - encode: `image::codecs::jpeg::JpegEncoder`

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use fast_image_resize as fr;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageBuffer, Rgb};
use serde::{Deserialize, Serialize};

use crate::geometry::{PixelRect, Size};

use super::config::{ResampleFilter, ViewportClass};
use super::WorkflowError;

/// Decoded source raster, cheap to clone.
#[derive(Clone)]
pub struct Surface {
    image: Arc<DynamicImage>,
}

impl Surface {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn size(&self) -> Size {
        let (width, height) = self.image.dimensions();
        Size::new(width, height)
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size = self.size();
        write!(f, "Surface({}x{})", size.width, size.height)
    }
}

/// Rasterized pixels ready for encoding.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub size: Size,
    pub image: DynamicImage,
}

/// Output codec. JPEG is the only one offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// Pixel capabilities the workflow consumes.
pub trait ImageHost: Send + Sync {
    /// Source dimensions from the file header, without decoding pixels.
    fn probe_size(&self, bytes: &[u8]) -> Result<Size, WorkflowError>;

    fn decode(&self, bytes: &[u8]) -> Result<Surface, WorkflowError>;

    /// Sample `region` (whole surface when `None`) into a `size` buffer.
    fn rasterize(
        &self,
        surface: &Surface,
        region: Option<PixelRect>,
        size: Size,
        filter: ResampleFilter,
    ) -> Result<PixelBuffer, WorkflowError>;

    /// Encode at `quality` in `(0, 1]`. An empty buffer means failure.
    fn encode(
        &self,
        pixels: &PixelBuffer,
        format: OutputFormat,
        quality: f64,
    ) -> Result<Vec<u8>, WorkflowError>;

    fn is_compact_viewport(&self) -> bool;
}

/// Opaque token for a temporary object (object URL, blob handle).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleToken(String);

impl HandleToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lifecycle of temporary object handles.
pub trait ObjectHandles: Send + Sync {
    fn create(&self, bytes: &Bytes) -> HandleToken;
    fn release(&self, token: &HandleToken);
}

/// Handle registry that only tracks which tokens are live.
#[derive(Debug, Default)]
pub struct InMemoryHandles {
    next_id: AtomicU64,
    live: Mutex<HashSet<HandleToken>>,
}

impl InMemoryHandles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live_set().len()
    }

    pub fn is_live(&self, token: &HandleToken) -> bool {
        self.live_set().contains(token)
    }

    fn live_set(&self) -> std::sync::MutexGuard<'_, HashSet<HandleToken>> {
        match self.live.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("handle registry lock poisoned, continuing with recovered state");
                poisoned.into_inner()
            }
        }
    }
}

impl ObjectHandles for InMemoryHandles {
    fn create(&self, bytes: &Bytes) -> HandleToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let token = HandleToken::new(format!("blob:wallfit/{}", id));
        log::debug!("handle created: {} ({} bytes)", token.as_str(), bytes.len());
        self.live_set().insert(token.clone());
        token
    }

    fn release(&self, token: &HandleToken) {
        if !self.live_set().remove(token) {
            log::debug!("handle already released: {}", token.as_str());
        }
    }
}

/// Default host backed by `image` and `fast_image_resize`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeHost {
    viewport: ViewportClass,
}

impl NativeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_viewport(viewport: ViewportClass) -> Self {
        Self { viewport }
    }

    fn resize_with_fast_image_resize(
        image: &DynamicImage,
        region: PixelRect,
        size: Size,
        filter: ResampleFilter,
    ) -> Result<DynamicImage, WorkflowError> {
        let src = image.to_rgb8();
        let (src_width, src_height) = src.dimensions();

        let src_image =
            fr::images::Image::from_vec_u8(src_width, src_height, src.into_raw(), fr::PixelType::U8x3)
                .map_err(|e| WorkflowError::EncodeFailed(format!("source buffer: {}", e)))?;
        let mut dst_image = fr::images::Image::new(size.width, size.height, fr::PixelType::U8x3);

        let mut resizer = fr::Resizer::new();
        let options = fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(filter.to_fast_filter()))
            .crop(
                region.x as f64,
                region.y as f64,
                region.width as f64,
                region.height as f64,
            );

        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| WorkflowError::EncodeFailed(format!("fast_image_resize: {}", e)))?;

        let rgb = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(size.width, size.height, dst_image.into_vec())
            .ok_or_else(|| WorkflowError::EncodeFailed("resized buffer has wrong length".to_string()))?;

        Ok(DynamicImage::ImageRgb8(rgb))
    }
}

impl ImageHost for NativeHost {
    fn probe_size(&self, bytes: &[u8]) -> Result<Size, WorkflowError> {
        let (width, height) = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| WorkflowError::Decode(format!("unrecognized format: {}", e)))?
            .into_dimensions()
            .map_err(|e| WorkflowError::Decode(format!("unreadable header: {}", e)))?;
        Ok(Size::new(width, height))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Surface, WorkflowError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| WorkflowError::Decode(format!("unrecognized format: {}", e)))?;
        let decoded = reader
            .decode()
            .map_err(|e| WorkflowError::Decode(e.to_string()))?;
        Ok(Surface::new(decoded))
    }

    fn rasterize(
        &self,
        surface: &Surface,
        region: Option<PixelRect>,
        size: Size,
        filter: ResampleFilter,
    ) -> Result<PixelBuffer, WorkflowError> {
        if !size.is_positive() {
            return Err(WorkflowError::EncodeFailed(format!(
                "invalid output size {}x{}",
                size.width, size.height
            )));
        }

        let source = surface.size();
        let region = region.unwrap_or(PixelRect::new(0, 0, source.width, source.height));
        let image = surface.image();

        let rasterized = match Self::resize_with_fast_image_resize(image, region, size, filter) {
            Ok(resized) => resized,
            Err(err) => {
                log::warn!("⚠️ fast_image_resize failed, falling back to image::resize_exact: {}", err);
                let cropped = if region.is_full(source) {
                    image.clone()
                } else {
                    image.crop_imm(region.x, region.y, region.width, region.height)
                };
                cropped.resize_exact(size.width, size.height, filter.to_image_filter())
            }
        };

        Ok(PixelBuffer {
            size,
            image: rasterized,
        })
    }

    fn encode(
        &self,
        pixels: &PixelBuffer,
        format: OutputFormat,
        quality: f64,
    ) -> Result<Vec<u8>, WorkflowError> {
        match format {
            OutputFormat::Jpeg => {
                let jpeg_quality = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
                let converted;
                let rgb = match pixels.image.as_rgb8() {
                    Some(rgb) => rgb,
                    None => {
                        converted = pixels.image.to_rgb8();
                        &converted
                    }
                };

                let mut buffer = Vec::new();
                JpegEncoder::new_with_quality(&mut buffer, jpeg_quality)
                    .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
                    .map_err(|e| WorkflowError::EncodeFailed(e.to_string()))?;
                Ok(buffer)
            }
        }
    }

    fn is_compact_viewport(&self) -> bool {
        self.viewport == ViewportClass::Compact
    }
}

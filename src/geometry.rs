//! # Geometry helpers
//!
//! Small numeric building blocks shared by the crop model, the drag engine and
//! the encode pipeline. Everything here is pure and allocation free.
//!
//! Three coordinate spaces show up across the crate:
//!
//! - normalized: fractions of the source image (`crop::NormalizedRect`)
//! - source: source image pixels, as floats while dragging ([`SourceRect`]) and
//!   as integers when sampling ([`PixelRect`])
//! - display: preview box pixels ([`DisplayRect`])

use serde::{Deserialize, Serialize};

/// Clamp `value` into `[min, max]`.
///
/// Unlike [`f64::clamp`] this never panics: when `min > max` the result is
/// `max`. The drag math relies on that ordering when the available room is
/// already smaller than the minimum edge.
pub fn clamp_value(value: f64, min: f64, max: f64) -> f64 {
    max.min(min.max(value))
}

/// Convert a pointer delta measured in display pixels to source pixels.
///
/// Returns `0.0` while the display extent is unknown (zero).
pub fn scale_delta(delta_display: f64, source_dim: u32, display_dim: f64) -> f64 {
    if display_dim > 0.0 {
        delta_display * source_dim as f64 / display_dim
    } else {
        0.0
    }
}

/// Integer width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `true` when both sides are non-zero.
    pub fn is_positive(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Width over height, `None` for degenerate sizes.
    pub fn aspect_ratio(&self) -> Option<f64> {
        self.is_positive()
            .then(|| self.width as f64 / self.height as f64)
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// `"1920x1080"`, the key format used by preset options and file names.
    pub fn key(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Parse a `"WxH"` key. Both sides must be positive integers.
    pub fn parse_key(key: &str) -> Option<Self> {
        let (w, h) = key.trim().split_once(['x', 'X', '×'])?;
        let width = w.trim().parse::<u32>().ok()?;
        let height = h.trim().parse::<u32>().ok()?;
        let size = Self::new(width, height);
        size.is_positive().then_some(size)
    }
}

/// Integer rectangle in source pixels, used when sampling the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// `true` if this rect covers the whole `source`.
    pub fn is_full(&self, source: Size) -> bool {
        self.x == 0 && self.y == 0 && self.width == source.width && self.height == source.height
    }
}

impl From<PixelRect> for SourceRect {
    fn from(rect: PixelRect) -> Self {
        SourceRect::new(
            rect.x as f64,
            rect.y as f64,
            rect.width as f64,
            rect.height as f64,
        )
    }
}

/// Floating point rectangle in source pixels.
///
/// Drag math works in this space so sub-pixel pointer motion accumulates
/// without rounding drift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SourceRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }
}

/// Rectangle in preview (display) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DisplayRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Where the source lands inside a preview box of `box_width × box_height`
/// when letterboxed (object-fit: contain).
///
/// Returns `None` while either the box or the source has no extent.
pub fn fit_display_rect(box_width: f64, box_height: f64, source: Size) -> Option<DisplayRect> {
    if box_width <= 0.0 || box_height <= 0.0 {
        return None;
    }
    let source_ratio = source.aspect_ratio()?;
    let box_ratio = box_width / box_height;

    if source_ratio > box_ratio {
        let height = box_width / source_ratio;
        Some(DisplayRect::new(0.0, (box_height - height) / 2.0, box_width, height))
    } else {
        let width = box_height * source_ratio;
        Some(DisplayRect::new((box_width - width) / 2.0, 0.0, width, box_height))
    }
}

/// Uniformly shrink `size` so that neither side exceeds `max_dimension` and the
/// area stays within `max_pixels`. Never scales up.
///
/// Sides are floored and kept at least 1px.
pub fn downscale_to_limits(size: Size, max_dimension: u32, max_pixels: u64) -> Size {
    if !size.is_positive() {
        return size;
    }

    let width = size.width as f64;
    let height = size.height as f64;
    let pixel_scale = (max_pixels as f64 / (width * height)).sqrt();
    let mut scale = 1.0_f64
        .min(max_dimension as f64 / width)
        .min(max_dimension as f64 / height)
        .min(pixel_scale);

    if !scale.is_finite() || scale <= 0.0 {
        scale = 1.0;
    }
    if scale >= 1.0 {
        return size;
    }

    Size::new(
        ((width * scale).floor() as u32).max(1),
        ((height * scale).floor() as u32).max(1),
    )
}

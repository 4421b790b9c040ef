//! Normalized crop rectangle and its conversions.
//!
//! The rectangle is stored as fractions of the source image so it survives
//! preview resizes untouched. Every mutation goes through
//! [`NormalizedRect::clamped`]; the model never holds a rect that leaves the
//! unit square or has a non-positive extent.

use serde::{Deserialize, Serialize};

use crate::geometry::{DisplayRect, PixelRect, Size, SourceRect, clamp_value};

/// Smallest normalized width/height the model keeps.
pub const MIN_NORMALIZED_EXTENT: f64 = 0.0001;
/// Upper bound for per-side inset ratios.
pub const MAX_INSET_RATIO: f64 = 0.45;

/// Crop rectangle in unit-square coordinates relative to the source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    /// The whole source, `{0, 0, 1, 1}`.
    pub const FULL: Self = Self::new(0.0, 0.0, 1.0, 1.0);

    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Pull the rect back inside the unit square.
    ///
    /// Extents are clamped first so the position bound `1 - extent` is known.
    pub fn clamped(self) -> Self {
        let width = clamp_value(self.width, MIN_NORMALIZED_EXTENT, 1.0);
        let height = clamp_value(self.height, MIN_NORMALIZED_EXTENT, 1.0);
        Self {
            x: clamp_value(self.x, 0.0, 1.0 - width),
            y: clamp_value(self.y, 0.0, 1.0 - height),
            width,
            height,
        }
    }

    pub fn is_full(&self) -> bool {
        *self == Self::FULL
    }
}

impl Default for NormalizedRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// Owns the crop rectangle for the current source.
#[derive(Debug, Clone, Default)]
pub struct CropModel {
    rect: NormalizedRect,
    source: Option<Size>,
}

impl CropModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(source: Size) -> Self {
        let mut model = Self::new();
        model.set_source_size(Some(source));
        model
    }

    pub fn rect(&self) -> NormalizedRect {
        self.rect
    }

    /// Replace the rect, re-clamping it.
    pub fn set_rect(&mut self, rect: NormalizedRect) {
        self.rect = rect.clamped();
    }

    pub fn source_size(&self) -> Option<Size> {
        self.source
    }

    /// Degenerate sizes are treated as "unknown".
    pub fn set_source_size(&mut self, source: Option<Size>) {
        self.source = source.filter(Size::is_positive);
    }

    pub fn reset_to_full_source(&mut self) {
        self.rect = NormalizedRect::FULL;
    }

    /// Default crop when nothing is selected: a centered rect inset by
    /// `inset_ratio` of the source on every side.
    pub fn set_default_inset(&mut self, inset_ratio: f64) {
        if self.source.is_none() {
            self.reset_to_full_source();
            return;
        }

        let inset = clamp_value(inset_ratio, 0.0, MAX_INSET_RATIO);
        let width = clamp_value(1.0 - inset * 2.0, MIN_NORMALIZED_EXTENT, 1.0);
        let height = clamp_value(1.0 - inset * 2.0, MIN_NORMALIZED_EXTENT, 1.0);
        self.set_rect(NormalizedRect::new(
            (1.0 - width) / 2.0,
            (1.0 - height) / 2.0,
            width,
            height,
        ));
    }

    /// Shrink the current rect by `inset_ratio` of its own extent per side.
    ///
    /// Used for template safe areas layered on top of an auto-crop.
    pub fn apply_inset(&mut self, inset_ratio: f64) {
        if self.source.is_none() {
            return;
        }
        let inset = clamp_value(inset_ratio, 0.0, MAX_INSET_RATIO);
        if inset <= 0.0 {
            return;
        }

        let current = self.rect;
        let width = clamp_value(current.width, MIN_NORMALIZED_EXTENT, 1.0);
        let height = clamp_value(current.height, MIN_NORMALIZED_EXTENT, 1.0);
        let next_width = clamp_value(width * (1.0 - inset * 2.0), MIN_NORMALIZED_EXTENT, 1.0);
        let next_height = clamp_value(height * (1.0 - inset * 2.0), MIN_NORMALIZED_EXTENT, 1.0);

        self.set_rect(NormalizedRect::new(
            clamp_value(current.x + width * inset, 0.0, 1.0 - next_width),
            clamp_value(current.y + height * inset, 0.0, 1.0 - next_height),
            next_width,
            next_height,
        ));
    }

    /// Largest centered rect with the aspect ratio of `target_width ×
    /// target_height`. Falls back to the full source when either the target
    /// or the source size is unknown.
    pub fn auto_crop_for_target(&mut self, target_width: u32, target_height: u32) {
        let target = Size::new(target_width, target_height);
        let (Some(target_ratio), Some(source_ratio)) = (
            target.aspect_ratio(),
            self.source.and_then(|source| source.aspect_ratio()),
        ) else {
            self.reset_to_full_source();
            return;
        };

        let mut width = 1.0;
        let mut height = 1.0;
        if source_ratio > target_ratio {
            width = target_ratio / source_ratio;
        } else {
            height = source_ratio / target_ratio;
        }

        self.set_rect(NormalizedRect::new(
            (1.0 - width) / 2.0,
            (1.0 - height) / 2.0,
            width,
            height,
        ));
    }

    /// Integer rect in source pixels, the region actually sampled.
    ///
    /// Sizes are rounded with a 1px floor; the origin is clamped after
    /// rounding so the rect never spills past the source edge.
    pub fn to_source_pixel_rect(&self) -> Option<PixelRect> {
        let source = self.source?;
        let rect = self.rect.clamped();

        let width = (rect.width * source.width as f64).round().max(1.0);
        let height = (rect.height * source.height as f64).round().max(1.0);
        let max_x = (source.width as f64 - width).max(0.0);
        let max_y = (source.height as f64 - height).max(0.0);
        let x = clamp_value((rect.x * source.width as f64).round(), 0.0, max_x);
        let y = clamp_value((rect.y * source.height as f64).round(), 0.0, max_y);

        Some(PixelRect::new(x as u32, y as u32, width as u32, height as u32))
    }

    /// Unrounded rect in source pixels.
    pub fn source_rect(&self) -> Option<SourceRect> {
        let source = self.source?;
        let width = clamp_value(self.rect.width, MIN_NORMALIZED_EXTENT, 1.0) * source.width as f64;
        let height =
            clamp_value(self.rect.height, MIN_NORMALIZED_EXTENT, 1.0) * source.height as f64;
        let max_x = (source.width as f64 - width).max(0.0);
        let max_y = (source.height as f64 - height).max(0.0);

        Some(SourceRect::new(
            clamp_value(self.rect.x * source.width as f64, 0.0, max_x),
            clamp_value(self.rect.y * source.height as f64, 0.0, max_y),
            width,
            height,
        ))
    }

    /// Set the crop from a rect in source pixels. Ignored while the source
    /// size is unknown.
    pub fn set_from_source_rect(&mut self, rect: SourceRect) {
        let Some(source) = self.source else {
            return;
        };
        let source_width = source.width as f64;
        let source_height = source.height as f64;

        let width = clamp_value(rect.width, 1.0, source_width);
        let height = clamp_value(rect.height, 1.0, source_height);
        let x = clamp_value(rect.x, 0.0, source_width - width);
        let y = clamp_value(rect.y, 0.0, source_height - height);

        self.set_rect(NormalizedRect::new(
            x / source_width,
            y / source_height,
            width / source_width,
            height / source_height,
        ));
    }

    pub fn set_from_source_pixel_rect(&mut self, rect: PixelRect) {
        self.set_from_source_rect(rect.into());
    }

    /// Aspect ratio a locked crop must keep: the active target's ratio, else
    /// the source's own ratio, else `1`.
    pub fn aspect_ratio(&self, active_target: Option<Size>) -> f64 {
        active_target
            .and_then(|target| target.aspect_ratio())
            .or_else(|| self.source.and_then(|source| source.aspect_ratio()))
            .unwrap_or(1.0)
    }

    /// Minimum crop width (source px) while the ratio is locked.
    ///
    /// The larger of `min_edge` and the width implied by a `min_edge` tall
    /// crop, capped by the widest crop the source allows at this ratio.
    pub fn min_crop_width(&self, ratio: f64, min_edge: f64) -> f64 {
        let Some(source) = self.source else {
            return 1.0;
        };
        let ratio = if ratio.is_finite() && ratio > 0.0 { ratio } else { 1.0 };
        let max_width = (source.width as f64).min(source.height as f64 * ratio).max(1.0);
        let desired = min_edge.max(min_edge * ratio);
        clamp_value(desired, 1.0, max_width)
    }

    /// Minimum crop height (source px) for freeform resizing.
    pub fn min_crop_height(&self, min_edge: f64) -> f64 {
        match self.source {
            Some(source) => clamp_value(min_edge, 1.0, source.height as f64),
            None => 1.0,
        }
    }

    /// Minimum crop width (source px) for freeform resizing.
    pub fn min_free_crop_width(&self, min_edge: f64) -> f64 {
        match self.source {
            Some(source) => clamp_value(min_edge, 1.0, source.width as f64),
            None => 1.0,
        }
    }

    /// Crop rect positioned over the displayed image, for the overlay window.
    pub fn to_display_rect(&self, image_rect: DisplayRect) -> DisplayRect {
        let rect = self.rect.clamped();
        DisplayRect::new(
            image_rect.x + rect.x * image_rect.width,
            image_rect.y + rect.y * image_rect.height,
            rect.width * image_rect.width,
            rect.height * image_rect.height,
        )
    }
}

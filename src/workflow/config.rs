//! # Workflow configuration
//!
//! ## Design
//!
//! Every tunable of the load → encode chain lives in [`WorkflowConfig`]. The
//! service keeps it behind a lock and every pass works on a snapshot, so a
//! config change never lands halfway through a pass.
//!
//! ## Implementation
//!
//! - `Default` is the production configuration.
//! - Deserialization fills missing fields from `Default` (`#[serde(default)]`),
//!   so partial JSON files are fine.
//! - [`WorkflowConfig::validate`] rejects values the workflow cannot honor.

use std::time::Duration;

use fast_image_resize as fr;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::WorkflowError;
use crate::geometry::Size;

const MIB: u64 = 1024 * 1024;

/// Maximum allowed per-side inset ratio.
const MAX_INSET_RATIO: f64 = 0.45;
/// Upper bound for the debounce interval.
const MAX_DEBOUNCE_MS: u64 = 10_000;
/// Upper bound for quality reduction attempts.
const MAX_QUALITY_ATTEMPTS: u32 = 64;

/// Device class of the viewport the output is produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewportClass {
    #[default]
    Desktop,
    Compact,
}

impl ViewportClass {
    pub fn from_compact(is_compact: bool) -> Self {
        if is_compact { Self::Compact } else { Self::Desktop }
    }
}

/// Output ceiling for one viewport class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLimits {
    /// Longest allowed output edge.
    pub max_dimension: u32,
    /// Largest allowed `width * height`.
    pub max_pixels: u64,
}

/// Resampling filter for rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleFilter {
    Bilinear,
    CatmullRom,
    #[default]
    Lanczos3,
}

impl ResampleFilter {
    pub fn parse(value: &str) -> Result<Self, WorkflowError> {
        match value.trim().to_lowercase().as_str() {
            "bilinear" => Ok(Self::Bilinear),
            "catmullrom" | "catmull-rom" => Ok(Self::CatmullRom),
            "lanczos3" | "lanczos" => Ok(Self::Lanczos3),
            other => Err(WorkflowError::Config(format!(
                "unknown resample filter: {} (expected bilinear / catmullrom / lanczos3)",
                other
            ))),
        }
    }

    pub(crate) fn to_fast_filter(self) -> fr::FilterType {
        match self {
            Self::Bilinear => fr::FilterType::Bilinear,
            Self::CatmullRom => fr::FilterType::CatmullRom,
            Self::Lanczos3 => fr::FilterType::Lanczos3,
        }
    }

    pub(crate) fn to_image_filter(self) -> FilterType {
        match self {
            Self::Bilinear => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Workflow configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: u64,
    /// Largest accepted source. Compared by pixel count, so any shape of
    /// the same area passes.
    pub max_upload_resolution: Size,
    /// Byte budget for the encoded output.
    pub max_output_bytes: u64,
    pub desktop_limits: OutputLimits,
    pub compact_limits: OutputLimits,
    /// First encode quality, `(0, 1]`.
    pub start_quality: f64,
    /// Quality floor for the budget search.
    pub min_quality: f64,
    pub quality_step: f64,
    pub max_quality_attempts: u32,
    /// Minimum crop edge in source pixels.
    pub min_crop_edge: f64,
    /// Inset of the default crop when no target is selected.
    pub default_inset_ratio: f64,
    /// Extra inset applied on top of an auto-crop for templated presets.
    pub template_inset_ratio: f64,
    pub debounce_ms: u64,
    pub resample_filter: ResampleFilter,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 20 * MIB,
            max_upload_resolution: Size::new(5120, 2880),
            max_output_bytes: 15 * MIB,
            desktop_limits: OutputLimits {
                max_dimension: 8192,
                max_pixels: 33_177_600,
            },
            compact_limits: OutputLimits {
                max_dimension: 4096,
                max_pixels: 16_777_216,
            },
            start_quality: 0.9,
            min_quality: 0.6,
            quality_step: 0.07,
            max_quality_attempts: 8,
            min_crop_edge: 48.0,
            default_inset_ratio: 0.04,
            template_inset_ratio: 0.04,
            debounce_ms: 200,
            resample_filter: ResampleFilter::Lanczos3,
        }
    }
}

impl WorkflowConfig {
    pub fn limits_for(&self, viewport: ViewportClass) -> OutputLimits {
        match viewport {
            ViewportClass::Desktop => self.desktop_limits,
            ViewportClass::Compact => self.compact_limits,
        }
    }

    pub fn max_upload_pixels(&self) -> u64 {
        self.max_upload_resolution.pixel_count()
    }

    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Range checks for every field.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.max_upload_bytes == 0 {
            return Err(WorkflowError::Config("max_upload_bytes must be positive".to_string()));
        }
        if !self.max_upload_resolution.is_positive() {
            return Err(WorkflowError::Config(
                "max_upload_resolution must have positive sides".to_string(),
            ));
        }
        if self.max_output_bytes == 0 {
            return Err(WorkflowError::Config("max_output_bytes must be positive".to_string()));
        }
        for (name, limits) in [
            ("desktop_limits", self.desktop_limits),
            ("compact_limits", self.compact_limits),
        ] {
            if limits.max_dimension == 0 || limits.max_pixels == 0 {
                return Err(WorkflowError::Config(format!(
                    "{} must have a positive max_dimension and max_pixels",
                    name
                )));
            }
        }
        if !(self.start_quality > 0.0 && self.start_quality <= 1.0) {
            return Err(WorkflowError::Config("start_quality must be in (0, 1]".to_string()));
        }
        if !(self.min_quality > 0.0 && self.min_quality <= self.start_quality) {
            return Err(WorkflowError::Config(
                "min_quality must be in (0, start_quality]".to_string(),
            ));
        }
        if !(self.quality_step > 0.0 && self.quality_step <= 1.0) {
            return Err(WorkflowError::Config("quality_step must be in (0, 1]".to_string()));
        }
        if !(1..=MAX_QUALITY_ATTEMPTS).contains(&self.max_quality_attempts) {
            return Err(WorkflowError::Config(format!(
                "max_quality_attempts must be in 1..={}",
                MAX_QUALITY_ATTEMPTS
            )));
        }
        if !(self.min_crop_edge.is_finite() && self.min_crop_edge >= 1.0) {
            return Err(WorkflowError::Config("min_crop_edge must be at least 1".to_string()));
        }
        for (name, ratio) in [
            ("default_inset_ratio", self.default_inset_ratio),
            ("template_inset_ratio", self.template_inset_ratio),
        ] {
            if !(0.0..=MAX_INSET_RATIO).contains(&ratio) {
                return Err(WorkflowError::Config(format!(
                    "{} must be in [0, {}]",
                    name, MAX_INSET_RATIO
                )));
            }
        }
        if self.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(WorkflowError::Config(format!(
                "debounce_ms must not exceed {}",
                MAX_DEBOUNCE_MS
            )));
        }
        Ok(())
    }
}

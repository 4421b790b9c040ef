//! # Encode-and-fit pipeline
//!
//! ## Design
//!
//! A pass is a pure function of its [`PassPlan`]: the session is read once,
//! the plan is moved onto a blocking thread and the result comes back as a
//! [`RenderedOutput`] or a [`WorkflowError`]. Nothing here touches the session.
//!
//! ## Steps
//!
//! 1. clamp the target size to the viewport class limits (uniform, never up)
//! 2. rasterize the crop region at the clamped size
//! 3. encode at the start quality; an empty result fails the pass
//! 4. while over budget, step quality down towards the floor and re-encode
//! 5. still over budget → [`WorkflowError::BudgetExceeded`]

use std::time::Instant;

use crate::geometry::{PixelRect, Size, downscale_to_limits};

use super::config::{OutputLimits, ResampleFilter, WorkflowConfig};
use super::host::{ImageHost, OutputFormat, Surface};
use super::WorkflowError;

const MIB: f64 = 1024.0 * 1024.0;
/// Quality must stay this far above the floor for another step to run.
const QUALITY_EPSILON: f64 = 0.001;

/// `15`, `17.5`: megabytes for user-facing messages.
pub fn format_megabytes(bytes: u64) -> String {
    let value = bytes as f64 / MIB;
    if value.fract().abs() < 1e-9 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

/// Human readable byte count (`"2.00 MB"`, `"512 B"`), `"--"` for zero.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "--".to_string();
    }
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut index = 0;
    while value >= 1024.0 && index < UNITS.len() - 1 {
        value /= 1024.0;
        index += 1;
    }
    if index == 0 {
        return format!("{} B", bytes);
    }
    let precision = if value < 10.0 { 2 } else { 1 };
    format!("{:.*} {}", precision, value, UNITS[index])
}

/// Output size after applying the viewport class limits.
pub fn clamp_output_size(target: Size, limits: OutputLimits) -> Size {
    downscale_to_limits(target, limits.max_dimension, limits.max_pixels)
}

/// Quality search parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSettings {
    pub start_quality: f64,
    pub min_quality: f64,
    pub quality_step: f64,
    pub max_attempts: u32,
    pub budget: u64,
}

impl From<&WorkflowConfig> for FitSettings {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            start_quality: config.start_quality,
            min_quality: config.min_quality,
            quality_step: config.quality_step,
            max_attempts: config.max_quality_attempts,
            budget: config.max_output_bytes,
        }
    }
}

/// Outcome of a successful quality search.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub bytes: Vec<u8>,
    pub quality: f64,
    /// Re-encodes after the first one.
    pub attempts: u32,
    pub start_quality: f64,
    pub budget: u64,
}

impl FitResult {
    pub fn quality_reduced(&self) -> bool {
        self.quality < self.start_quality
    }

    /// Warning shown when the budget was only met by lowering quality.
    pub fn quality_warning(&self) -> Option<String> {
        self.quality_reduced().then(|| {
            format!(
                "Quality adjusted to {}% to stay under {} MB.",
                (self.quality * 100.0).round() as i64,
                format_megabytes(self.budget)
            )
        })
    }
}

/// Encode at the start quality and step quality down until the output fits.
///
/// `encode` is called with the quality to try; an empty buffer is treated as
/// an encoder failure. The search is deterministic for a deterministic
/// encoder.
pub fn encode_to_fit<F>(settings: &FitSettings, mut encode: F) -> Result<FitResult, WorkflowError>
where
    F: FnMut(f64) -> Result<Vec<u8>, WorkflowError>,
{
    let mut encode_checked = |quality: f64| -> Result<Vec<u8>, WorkflowError> {
        let bytes = encode(quality)?;
        if bytes.is_empty() {
            return Err(WorkflowError::EncodeFailed(format!(
                "encoder returned no data at quality {:.2}",
                quality
            )));
        }
        Ok(bytes)
    };

    let mut quality = settings.start_quality;
    let mut bytes = encode_checked(quality)?;
    let mut attempts = 0;

    while bytes.len() as u64 > settings.budget
        && quality > settings.min_quality + QUALITY_EPSILON
        && attempts < settings.max_attempts
    {
        quality = settings.min_quality.max(quality - settings.quality_step);
        bytes = encode_checked(quality)?;
        attempts += 1;
        log::debug!(
            "quality step {}: q={:.2} size={}",
            attempts,
            quality,
            bytes.len()
        );
    }

    if bytes.len() as u64 > settings.budget {
        return Err(WorkflowError::BudgetExceeded {
            size: bytes.len() as u64,
            budget: settings.budget,
        });
    }

    Ok(FitResult {
        bytes,
        quality,
        attempts,
        start_quality: settings.start_quality,
        budget: settings.budget,
    })
}

/// Everything one pass needs, captured from the session up front.
#[derive(Clone)]
pub struct PassPlan {
    pub surface: Surface,
    pub region: Option<PixelRect>,
    pub target: Size,
    pub limits: OutputLimits,
    pub filter: ResampleFilter,
    pub format: OutputFormat,
    pub fit: FitSettings,
}

/// Encoded pass result before it is published as an artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedOutput {
    pub size: Size,
    pub fit: FitResult,
}

/// Run one rasterize + encode-to-fit pass. Blocking.
pub fn render_pass(host: &dyn ImageHost, plan: &PassPlan) -> Result<RenderedOutput, WorkflowError> {
    let started = Instant::now();
    let size = clamp_output_size(plan.target, plan.limits);
    if size != plan.target {
        log::info!(
            "🧩 output clamped: {}x{} -> {}x{}",
            plan.target.width,
            plan.target.height,
            size.width,
            size.height
        );
    }

    let raster_start = Instant::now();
    let pixels = host.rasterize(&plan.surface, plan.region, size, plan.filter)?;
    let raster_elapsed = raster_start.elapsed();

    let encode_start = Instant::now();
    let fit = encode_to_fit(&plan.fit, |quality| host.encode(&pixels, plan.format, quality))?;
    let encode_elapsed = encode_start.elapsed();

    if fit.quality_reduced() {
        log::warn!(
            "⚠️ quality reduced to {:.2} after {} re-encodes to fit {} bytes",
            fit.quality,
            fit.attempts,
            fit.budget
        );
    }

    log::info!(
        "✅ pass rendered {}x{} - bytes={} q={:.2} raster={}ms encode={}ms total={}ms",
        size.width,
        size.height,
        fit.bytes.len(),
        fit.quality,
        raster_elapsed.as_millis(),
        encode_elapsed.as_millis(),
        started.elapsed().as_millis()
    );

    Ok(RenderedOutput { size, fit })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    fn settings(budget: u64) -> FitSettings {
        FitSettings {
            start_quality: 0.9,
            min_quality: 0.6,
            quality_step: 0.07,
            max_attempts: 8,
            budget,
        }
    }

    #[test]
    fn fits_at_start_quality_without_warning() {
        let result = encode_to_fit(&settings(15 * MB), |_| Ok(vec![0; 1024])).unwrap();
        assert_eq!(result.quality, 0.9);
        assert_eq!(result.attempts, 0);
        assert!(result.quality_warning().is_none());
    }

    #[test]
    fn steps_down_until_within_budget() {
        // 10 MB per 0.1 quality: fits once quality drops to 0.76.
        let result = encode_to_fit(&settings(8 * MB), |q| {
            Ok(vec![0; (q * 10.0 * MB as f64) as usize])
        })
        .unwrap();
        assert_eq!(result.attempts, 2);
        assert!((result.quality - 0.76).abs() < 1e-9);
        assert_eq!(
            result.quality_warning().as_deref(),
            Some("Quality adjusted to 76% to stay under 8 MB.")
        );
    }

    #[test]
    fn stops_at_floor_and_reports_budget_exceeded() {
        let mut tried = Vec::new();
        let result = encode_to_fit(&settings(18 * MB), |q| {
            tried.push(q);
            Ok(vec![0; (22 * MB) as usize])
        });
        assert!(matches!(
            result,
            Err(WorkflowError::BudgetExceeded { budget, .. }) if budget == 18 * MB
        ));
        let expected = [0.9, 0.83, 0.76, 0.69, 0.62, 0.6];
        assert_eq!(tried.len(), expected.len());
        for (got, want) in tried.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }
    }

    #[test]
    fn attempt_cap_bounds_the_search() {
        let mut calls = 0;
        let capped = FitSettings {
            quality_step: 0.01,
            max_attempts: 3,
            ..settings(1)
        };
        let result = encode_to_fit(&capped, |_| {
            calls += 1;
            Ok(vec![0; 10])
        });
        assert!(matches!(result, Err(WorkflowError::BudgetExceeded { .. })));
        assert_eq!(calls, 4);
    }

    #[test]
    fn empty_encode_fails_the_pass() {
        let result = encode_to_fit(&settings(MB), |_| Ok(Vec::new()));
        assert!(matches!(result, Err(WorkflowError::EncodeFailed(_))));
    }

    #[test]
    fn search_is_deterministic() {
        let run = || {
            encode_to_fit(&settings(5 * MB), |q| Ok(vec![0; (q * 7.0 * MB as f64) as usize]))
                .map(|fit| fit.quality)
                .ok()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn clamp_uses_viewport_limits() {
        let compact = OutputLimits {
            max_dimension: 4096,
            max_pixels: 16_777_216,
        };
        assert_eq!(
            clamp_output_size(Size::new(5120, 2880), compact),
            Size::new(4096, 2304)
        );
        assert_eq!(
            clamp_output_size(Size::new(1920, 1080), compact),
            Size::new(1920, 1080)
        );
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(0), "--");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2 * MB), "2.00 MB");
        assert_eq!(format_bytes(15 * MB + MB / 2), "15.5 MB");
        assert_eq!(format_megabytes(15 * MB), "15");
        assert_eq!(format_megabytes(15 * MB + MB / 2), "15.5");
    }
}

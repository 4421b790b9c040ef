//! # Session state
//!
//! ## Design
//!
//! [`Session`] is the single owner of everything one editing session knows:
//! the loaded file, the decoded source, the crop, the target selection, the
//! pass flags and the published output. The service keeps it behind one
//! mutex; no method here blocks or awaits.
//!
//! ## Implementation
//!
//! - methods that change the crop or the target return `true` when a pass
//!   should be scheduled
//! - every handle the session drops is released through [`ObjectHandles`]
//! - `load_epoch` changes whenever the source is replaced, so a pass or a
//!   decode that finishes after a reset can tell its result is stale

use bytes::Bytes;
use serde::Serialize;

use crate::crop::{CropDragController, CropModel, DragConstraints, DragStart, NormalizedRect, PointerSample};
use crate::geometry::{PixelRect, Size};

use super::error::StatusReport;
use super::host::{HandleToken, ObjectHandles, OutputFormat};
use super::pipeline::{PassPlan, RenderedOutput, format_bytes};
use super::presets::{CustomSizeInputs, TargetSelection, TemplateId, compact_viewport_warning};
use super::scheduler::PassGate;
use super::source::{DEFAULT_BASE_NAME, FileMeta, OutputArtifact, SourceImage, base_name_of};
use super::{FitSettings, ViewportClass, WorkflowConfig, WorkflowError};

/// Tone of the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTone {
    #[default]
    Idle,
    Ready,
    Warn,
    Error,
}

/// Status line shown next to the preview.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Status {
    pub message: String,
    pub tone: StatusTone,
    /// Error code when `tone` is `Error`.
    pub code: Option<&'static str>,
}

impl Status {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn ready() -> Self {
        Self {
            tone: StatusTone::Ready,
            ..Self::default()
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            tone: StatusTone::Warn,
            code: None,
        }
    }

    pub fn error(err: &WorkflowError) -> Self {
        Self {
            message: err.to_string(),
            tone: StatusTone::Error,
            code: Some(err.code()),
        }
    }
}

/// Why a pass did not run or its result was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoSource,
    Busy,
    SourceReplaced,
}

/// Result of one pass as seen by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PassOutcome {
    Completed(OutputSummary),
    Failed(StatusReport),
    Skipped { reason: SkipReason },
}

/// Everything captured under the lock to run one pass without it.
#[derive(Clone)]
pub struct PassTicket {
    pub plan: PassPlan,
    pub warnings: Vec<String>,
    pub show_ready: bool,
    pub epoch: u64,
}

/// Published output as reported to the glue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputSummary {
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
    pub size_label: String,
    pub quality: f64,
    pub warnings: Vec<String>,
    pub handle: String,
    pub mime_type: &'static str,
    pub download_name: Option<String>,
}

/// Serializable view of the whole session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub file: Option<FileMeta>,
    pub source_size: Option<Size>,
    pub preview_handle: Option<String>,
    pub crop: NormalizedRect,
    pub crop_pixels: Option<PixelRect>,
    pub selection: TargetSelection,
    pub custom: CustomSizeInputs,
    pub template_overlay: Option<TemplateId>,
    pub preview_label: Option<String>,
    pub processing: bool,
    pub pending: bool,
    pub dragging: bool,
    pub output: Option<OutputSummary>,
    pub status: Status,
}

#[derive(Debug, Default)]
pub struct Session {
    pub(super) file: Option<FileMeta>,
    pub(super) preview: Option<HandleToken>,
    pub(super) source: Option<SourceImage>,
    pub(super) crop: CropModel,
    pub(super) selection: TargetSelection,
    pub(super) custom: CustomSizeInputs,
    pub(super) template_overlay: Option<TemplateId>,
    pub(super) preset_triggered: bool,
    pub(super) gate: PassGate,
    pub(super) output: Option<OutputArtifact>,
    pub(super) status: Status,
    pub(super) drag: CropDragController,
    pub(super) load_epoch: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(&self) -> Option<&FileMeta> {
        self.file.as_ref()
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn crop(&self) -> &CropModel {
        &self.crop
    }

    pub fn selection(&self) -> &TargetSelection {
        &self.selection
    }

    pub fn custom_inputs(&self) -> &CustomSizeInputs {
        &self.custom
    }

    pub fn template_overlay(&self) -> Option<TemplateId> {
        self.template_overlay
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn output(&self) -> Option<&OutputArtifact> {
        self.output.as_ref()
    }

    pub fn gate(&self) -> &PassGate {
        &self.gate
    }

    /// Record `err` as the status and hand it back.
    pub(super) fn fail<T>(&mut self, err: WorkflowError) -> Result<T, WorkflowError> {
        log::warn!("⚠️ [{}] {}", err.code(), err);
        self.status = Status::error(&err);
        Err(err)
    }

    // ----- handles -----

    pub fn reset_output(&mut self, handles: &dyn ObjectHandles) {
        if let Some(previous) = self.output.take() {
            handles.release(&previous.handle);
        }
    }

    /// Replace the published output, releasing the previous handle.
    pub fn publish_output(&mut self, artifact: OutputArtifact, handles: &dyn ObjectHandles) {
        self.reset_output(handles);
        self.output = Some(artifact);
    }

    /// Release the preview handle and drop the decoded source.
    pub fn cleanup_source(&mut self, handles: &dyn ObjectHandles) {
        if let Some(preview) = self.preview.take() {
            handles.release(&preview);
        }
        self.source = None;
        self.drag.cancel();
        self.load_epoch = self.load_epoch.wrapping_add(1);
    }

    /// Back to the initial state. A running pass keeps its gate claim and
    /// its result is dropped when it finishes.
    pub fn reset_all(&mut self, handles: &dyn ObjectHandles) {
        self.cleanup_source(handles);
        self.reset_output(handles);
        self.file = None;
        self.crop.set_source_size(None);
        self.crop.reset_to_full_source();
        self.selection = TargetSelection::None;
        self.custom = CustomSizeInputs::default();
        self.template_overlay = None;
        self.preset_triggered = false;
        self.gate.clear_pending();
        self.status = Status::idle();
        log::info!("🧹 session reset");
    }

    // ----- loading -----

    /// Forget the previous file and start loading a new one. Returns the
    /// epoch the decode result must match.
    pub(super) fn begin_load(
        &mut self,
        meta: FileMeta,
        preview: HandleToken,
        handles: &dyn ObjectHandles,
    ) -> u64 {
        self.cleanup_source(handles);
        self.reset_output(handles);
        self.crop.set_source_size(None);
        self.file = Some(meta);
        self.preview = Some(preview);
        self.status = Status::idle();
        self.load_epoch
    }

    pub(super) fn is_current_load(&self, epoch: u64) -> bool {
        self.load_epoch == epoch
    }

    /// Install a decoded source and derive its initial crop: the active
    /// target's auto-crop (plus template inset), else the default inset.
    pub(super) fn install_source(&mut self, source: SourceImage, config: &WorkflowConfig) {
        self.crop.set_source_size(Some(source.size));
        match self.selection.size() {
            Some(target) => {
                self.crop.auto_crop_for_target(target.width, target.height);
                if self.template_overlay == Some(TemplateId::YoutubeBanner) {
                    self.crop.apply_inset(config.template_inset_ratio);
                }
            }
            None => self.crop.set_default_inset(config.default_inset_ratio),
        }
        self.source = Some(source);
        self.status = Status::idle();
    }

    /// Drop a source that failed validation after decode, file included.
    pub(super) fn reject_source(&mut self, err: &WorkflowError, handles: &dyn ObjectHandles) {
        self.cleanup_source(handles);
        self.reset_output(handles);
        self.file = None;
        self.crop.set_source_size(None);
        self.status = Status::error(err);
    }

    // ----- crop -----

    /// Replace the crop rect. Returns whether a pass should follow.
    pub fn set_crop_rect(&mut self, rect: NormalizedRect) -> bool {
        self.crop.set_rect(rect);
        self.has_source()
    }

    /// Replace the crop from a source pixel rect.
    pub fn set_crop_pixels(&mut self, rect: PixelRect) -> bool {
        if !self.has_source() {
            return false;
        }
        self.crop.set_from_source_pixel_rect(rect);
        true
    }

    pub fn begin_crop_drag(&mut self, start: DragStart, min_edge: f64) -> bool {
        if !self.has_source() {
            return false;
        }
        let constraints = DragConstraints {
            locked_target: self.selection.size(),
            min_edge,
        };
        self.drag.begin(&self.crop, start, constraints)
    }

    pub fn update_crop_drag(&mut self, pointer: PointerSample) -> bool {
        self.drag.update(&mut self.crop, pointer)
    }

    pub fn end_crop_drag(&mut self, pointer_id: i64) -> bool {
        self.drag.end(pointer_id)
    }

    // ----- passes -----

    /// Claim the gate and capture a pass. `Err` carries the reason nothing
    /// was captured.
    pub(super) fn begin_pass(
        &mut self,
        config: &WorkflowConfig,
        viewport: ViewportClass,
    ) -> Result<PassTicket, SkipReason> {
        let Some(source) = self.source.as_ref() else {
            return Err(SkipReason::NoSource);
        };
        if !self.gate.try_begin() {
            return Err(SkipReason::Busy);
        }

        let show_ready = std::mem::take(&mut self.preset_triggered);
        let warnings = compact_viewport_warning(&self.selection, viewport == ViewportClass::Compact)
            .map(|warning| vec![warning.to_string()])
            .unwrap_or_default();

        let plan = PassPlan {
            surface: source.surface.clone(),
            region: self.crop.to_source_pixel_rect(),
            target: self.resolve_target_size(),
            limits: config.limits_for(viewport),
            filter: config.resample_filter,
            format: OutputFormat::Jpeg,
            fit: FitSettings::from(config),
        };

        Ok(PassTicket {
            plan,
            warnings,
            show_ready,
            epoch: self.load_epoch,
        })
    }

    /// Release the gate and apply a pass result. The returned flag says
    /// whether a follow-up pass was requested while this one ran.
    pub(super) fn finish_pass(
        &mut self,
        ticket: PassTicket,
        result: Result<RenderedOutput, WorkflowError>,
        handles: &dyn ObjectHandles,
    ) -> (PassOutcome, bool) {
        let follow_up = self.gate.finish();

        if !self.is_current_load(ticket.epoch) || !self.has_source() {
            log::info!("🗑️ pass result dropped: source changed while rendering");
            return (
                PassOutcome::Skipped {
                    reason: SkipReason::SourceReplaced,
                },
                follow_up,
            );
        }

        let outcome = match result {
            Ok(rendered) => {
                let mut warnings = ticket.warnings;
                if let Some(warning) = rendered.fit.quality_warning() {
                    warnings.push(warning);
                }

                let bytes = Bytes::from(rendered.fit.bytes);
                let handle = handles.create(&bytes);
                self.publish_output(
                    OutputArtifact {
                        bytes,
                        width: rendered.size.width,
                        height: rendered.size.height,
                        quality: rendered.fit.quality,
                        warnings: warnings.clone(),
                        handle,
                    },
                    handles,
                );

                self.status = if !warnings.is_empty() {
                    Status::warn(warnings.join(" "))
                } else if ticket.show_ready {
                    Status::ready()
                } else {
                    Status::idle()
                };

                match self.output_summary() {
                    Some(summary) => PassOutcome::Completed(summary),
                    None => PassOutcome::Skipped {
                        reason: SkipReason::SourceReplaced,
                    },
                }
            }
            Err(err) => {
                log::error!("❌ pass failed [{}]: {:?}", err.code(), err);
                self.reset_output(handles);
                self.status = Status::error(&err);
                PassOutcome::Failed(StatusReport::from(&err))
            }
        };

        (outcome, follow_up)
    }

    // ----- presentation -----

    /// Label over the preview, `None` until a source is ready.
    pub fn preview_label(&self) -> Option<String> {
        self.file.as_ref()?;
        self.preview.as_ref()?;
        let source = self.source.as_ref()?;

        if let Some(target) = self.selection.size() {
            return Some(format!("Crop · {} × {}px", target.width, target.height));
        }
        if let Some(rect) = self.crop.to_source_pixel_rect() {
            if !rect.is_full(source.size) {
                return Some(format!("Crop · {} × {}px", rect.width, rect.height));
            }
        }
        Some(format!(
            "Original · {} × {}px",
            source.size.width, source.size.height
        ))
    }

    /// Output size, else the selected target, else the source size.
    pub fn output_dimensions(&self) -> Size {
        self.output
            .as_ref()
            .map(OutputArtifact::size)
            .or_else(|| self.selection.size())
            .or_else(|| self.source.as_ref().map(|source| source.size))
            .unwrap_or(Size::new(1, 1))
    }

    /// `<base>-<w>x<h>.jpg`, only once an output exists.
    pub fn download_file_name(&self) -> Option<String> {
        let output = self.output.as_ref()?;
        let base = self
            .file
            .as_ref()
            .map(|file| base_name_of(&file.name))
            .unwrap_or_else(|| DEFAULT_BASE_NAME.to_string());
        let size = self.output_dimensions();
        Some(format!(
            "{}-{}x{}.{}",
            base,
            size.width,
            size.height,
            OutputFormat::Jpeg.extension()
        ))
    }

    pub fn output_summary(&self) -> Option<OutputSummary> {
        let output = self.output.as_ref()?;
        Some(OutputSummary {
            width: output.width,
            height: output.height,
            bytes: output.byte_len(),
            size_label: format_bytes(output.byte_len()),
            quality: output.quality,
            warnings: output.warnings.clone(),
            handle: output.handle.as_str().to_string(),
            mime_type: OutputFormat::Jpeg.mime_type(),
            download_name: self.download_file_name(),
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            file: self.file.clone(),
            source_size: self.source.as_ref().map(|source| source.size),
            preview_handle: self.preview.as_ref().map(|token| token.as_str().to_string()),
            crop: self.crop.rect(),
            crop_pixels: self.crop.to_source_pixel_rect(),
            selection: self.selection.clone(),
            custom: self.custom.clone(),
            template_overlay: self.template_overlay,
            preview_label: self.preview_label(),
            processing: self.gate.is_processing(),
            pending: self.gate.is_pending(),
            dragging: self.drag.is_active(),
            output: self.output_summary(),
            status: self.status.clone(),
        }
    }
}

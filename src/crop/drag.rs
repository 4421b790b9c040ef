//! Pointer-driven crop editing.
//!
//! A drag goes `idle → dragging → idle`. [`CropDragController::begin`] captures
//! the crop in source pixels together with the display mapping and the ratio
//! lock; every [`CropDragController::update`] recomputes the rect from that
//! captured start, so the result depends only on the total pointer delta.

use crate::geometry::{DisplayRect, Size, SourceRect, clamp_value, scale_delta};

use super::handles::{Handle, HandleDescriptor};
use super::model::CropModel;

/// Primary mouse button as reported by pointer events.
const PRIMARY_BUTTON: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Move,
    Resize(Handle),
}

/// Pointer position in client (display) pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub pointer_id: i64,
    pub client_x: f64,
    pub client_y: f64,
}

impl PointerSample {
    pub fn new(pointer_id: i64, client_x: f64, client_y: f64) -> Self {
        Self {
            pointer_id,
            client_x,
            client_y,
        }
    }
}

/// Everything the glue knows at pointer-down.
#[derive(Debug, Clone, Copy)]
pub struct DragStart {
    pub pointer: PointerSample,
    /// `None` for touch/pen input without a button.
    pub button: Option<u16>,
    /// Handle under the pointer; `None` means the window body (move).
    pub handle: Option<Handle>,
    /// Where the source is drawn inside the preview box.
    pub image_rect: DisplayRect,
}

/// Constraints resolved from the current target selection.
#[derive(Debug, Clone, Copy)]
pub struct DragConstraints {
    /// Active preset or custom size; locks the ratio when present.
    pub locked_target: Option<Size>,
    /// Minimum crop edge in source pixels.
    pub min_edge: f64,
}

/// State of one pointer interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub pointer_id: i64,
    pub mode: DragMode,
    pub start_client: (f64, f64),
    pub start_rect: SourceRect,
    pub image_rect: DisplayRect,
    pub ratio: Option<f64>,
    pub min_width: f64,
    pub min_height: f64,
    pub source: Size,
}

impl DragSession {
    pub fn is_ratio_locked(&self) -> bool {
        self.ratio.is_some()
    }

    /// Rect (source px) for the pointer at `client_x, client_y`.
    pub fn rect_for_pointer(&self, client_x: f64, client_y: f64) -> SourceRect {
        let dx = scale_delta(
            client_x - self.start_client.0,
            self.source.width,
            self.image_rect.width,
        );
        let dy = scale_delta(
            client_y - self.start_client.1,
            self.source.height,
            self.image_rect.height,
        );

        match (self.mode, self.ratio) {
            (DragMode::Move, _) => self.translated(dx, dy),
            (DragMode::Resize(handle), Some(ratio)) => {
                self.resize_locked(handle.descriptor(), ratio, dx, dy)
            }
            (DragMode::Resize(handle), None) => self.resize_freeform(handle.descriptor(), dx, dy),
        }
    }

    fn translated(&self, dx: f64, dy: f64) -> SourceRect {
        let start = self.start_rect;
        SourceRect::new(
            clamp_value(start.x + dx, 0.0, self.source.width as f64 - start.width),
            clamp_value(start.y + dy, 0.0, self.source.height as f64 - start.height),
            start.width,
            start.height,
        )
    }

    /// Moving edges are clamped between the minimum edge and the source
    /// boundary; the opposite edge never moves.
    fn resize_freeform(&self, descriptor: HandleDescriptor, dx: f64, dy: f64) -> SourceRect {
        let start = self.start_rect;
        let mut rect = start;

        if !descriptor.x.is_fixed() {
            let anchor = descriptor.x.anchor(start.x, start.width);
            let available = descriptor
                .x
                .available(start.x, start.width, self.source.width as f64);
            rect.width = clamp_value(
                start.width + descriptor.x.growth(dx),
                self.min_width,
                available,
            );
            rect.x = descriptor.x.place(anchor, rect.width);
        }

        if !descriptor.y.is_fixed() {
            let anchor = descriptor.y.anchor(start.y, start.height);
            let available = descriptor
                .y
                .available(start.y, start.height, self.source.height as f64);
            rect.height = clamp_value(
                start.height + descriptor.y.growth(dy),
                self.min_height,
                available,
            );
            rect.y = descriptor.y.place(anchor, rect.height);
        }

        rect
    }

    fn resize_locked(
        &self,
        descriptor: HandleDescriptor,
        ratio: f64,
        dx: f64,
        dy: f64,
    ) -> SourceRect {
        let start = self.start_rect;
        let source_width = self.source.width as f64;
        let source_height = self.source.height as f64;

        let max_global_width = source_width.min(source_height * ratio).max(1.0);
        let bounded_min_width = clamp_value(self.min_width, 1.0, max_global_width);
        let clamp_width = |value: f64, limit: f64| {
            let bounded_max = bounded_min_width.max(limit.min(max_global_width));
            clamp_value(value, bounded_min_width, bounded_max)
        };

        let (x_motion, y_motion) = (descriptor.x, descriptor.y);

        if descriptor.is_corner() {
            let anchor_x = x_motion.anchor(start.x, start.width);
            let anchor_y = y_motion.anchor(start.y, start.height);
            let width_from_pointer = start.width + x_motion.growth(dx);
            let height_from_pointer = start.height + y_motion.growth(dy);
            let limit = x_motion
                .available(start.x, start.width, source_width)
                .min(y_motion.available(start.y, start.height, source_height) * ratio);

            let width = clamp_width(width_from_pointer.max(height_from_pointer * ratio), limit);
            let height = width / ratio;
            return SourceRect::new(
                x_motion.place(anchor_x, width),
                y_motion.place(anchor_y, height),
                width,
                height,
            );
        }

        if !x_motion.is_fixed() {
            // e / w: vertical center stays put.
            let center_y = start.center_y();
            let max_by_vertical =
                (center_y * 2.0 * ratio).min((source_height - center_y) * 2.0 * ratio);
            let anchor = x_motion.anchor(start.x, start.width);
            let limit = x_motion
                .available(start.x, start.width, source_width)
                .min(max_by_vertical);

            let width = clamp_width(start.width + x_motion.growth(dx), limit);
            let height = width / ratio;
            return SourceRect::new(
                clamp_value(x_motion.place(anchor, width), 0.0, source_width - width),
                clamp_value(center_y - height / 2.0, 0.0, source_height - height),
                width,
                height,
            );
        }

        if !y_motion.is_fixed() {
            // n / s: horizontal center stays put.
            let center_x = start.center_x();
            let max_by_horizontal =
                (center_x * 2.0 / ratio).min((source_width - center_x) * 2.0 / ratio);
            let anchor = y_motion.anchor(start.y, start.height);
            let limit = y_motion
                .available(start.y, start.height, source_height)
                .min(max_by_horizontal);

            let width = clamp_width((start.height + y_motion.growth(dy)) * ratio, limit * ratio);
            let height = width / ratio;
            return SourceRect::new(
                clamp_value(center_x - width / 2.0, 0.0, source_width - width),
                clamp_value(y_motion.place(anchor, height), 0.0, source_height - height),
                width,
                height,
            );
        }

        start
    }
}

/// Holds at most one open [`DragSession`].
#[derive(Debug, Default)]
pub struct CropDragController {
    session: Option<DragSession>,
}

impl CropDragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// Open a drag session. Returns `false` (and changes nothing) when a
    /// session is already open, the source size is unknown, or a non-primary
    /// button was pressed.
    pub fn begin(
        &mut self,
        crop: &CropModel,
        start: DragStart,
        constraints: DragConstraints,
    ) -> bool {
        if self.session.is_some() {
            log::debug!(
                "crop drag ignored: pointer {} already dragging",
                start.pointer.pointer_id
            );
            return false;
        }
        if start.button.is_some_and(|button| button != PRIMARY_BUTTON) {
            return false;
        }
        let (Some(source), Some(start_rect)) = (crop.source_size(), crop.source_rect()) else {
            return false;
        };

        let ratio = constraints
            .locked_target
            .map(|target| crop.aspect_ratio(Some(target)));
        let (min_width, min_height) = match ratio {
            Some(ratio) => {
                let min_width = crop.min_crop_width(ratio, constraints.min_edge);
                (min_width, min_width / ratio)
            }
            None => (
                crop.min_free_crop_width(constraints.min_edge),
                crop.min_crop_height(constraints.min_edge),
            ),
        };
        let mode = start.handle.map_or(DragMode::Move, DragMode::Resize);

        log::debug!(
            "crop drag start: mode={:?} locked={} rect={:?}",
            mode,
            ratio.is_some(),
            start_rect
        );

        self.session = Some(DragSession {
            pointer_id: start.pointer.pointer_id,
            mode,
            start_client: (start.pointer.client_x, start.pointer.client_y),
            start_rect,
            image_rect: start.image_rect,
            ratio,
            min_width,
            min_height,
            source,
        });
        true
    }

    /// Apply a pointer move to `crop`. Returns `true` when the crop changed;
    /// moves from any other pointer are ignored.
    pub fn update(&mut self, crop: &mut CropModel, pointer: PointerSample) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        if session.pointer_id != pointer.pointer_id {
            return false;
        }

        let rect = session.rect_for_pointer(pointer.client_x, pointer.client_y);
        crop.set_from_source_rect(rect);
        true
    }

    /// Close the session on pointer-up / pointer-cancel from the owning pointer.
    pub fn end(&mut self, pointer_id: i64) -> bool {
        match &self.session {
            Some(session) if session.pointer_id == pointer_id => {
                log::debug!("crop drag end: pointer {}", pointer_id);
                self.session = None;
                true
            }
            _ => false,
        }
    }

    /// Drop any open session, e.g. when the source is replaced.
    pub fn cancel(&mut self) {
        self.session = None;
    }
}

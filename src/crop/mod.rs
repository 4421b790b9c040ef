//! # Crop editing
//!
//! ## Design
//!
//! The crop is kept normalized ([`model::NormalizedRect`]) so it is independent
//! of how large the preview is drawn. Pointer interaction converts to source
//! pixels once at drag start and back again on every move.
//!
//! - [`model`]: the rect, its clamping rules and conversions
//! - [`handles`]: the eight resize handles as axis descriptors
//! - [`drag`]: the move / freeform / ratio-locked resize engine

pub mod drag;
pub mod handles;
pub mod model;

pub use drag::{
    CropDragController, DragConstraints, DragMode, DragSession, DragStart, PointerSample,
};
pub use handles::{AxisMotion, Handle, HandleDescriptor};
pub use model::{CropModel, NormalizedRect};

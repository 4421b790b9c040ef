//! Resize handles and their edge descriptors.
//!
//! Each of the eight handles is described by how it moves the horizontal and
//! vertical extent of the crop. The resize algorithms in [`super::drag`] only
//! ever look at the descriptor, never at the handle itself.

use serde::{Deserialize, Serialize};

/// How a handle moves one axis of the rect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisMotion {
    /// The axis is untouched.
    Fixed,
    /// The leading edge (left / top) follows the pointer; the trailing edge is
    /// the anchor.
    Leading,
    /// The trailing edge (right / bottom) follows the pointer; the leading edge
    /// is the anchor.
    Trailing,
}

impl AxisMotion {
    pub fn is_fixed(self) -> bool {
        matches!(self, Self::Fixed)
    }

    /// Growth of the extent for a pointer delta along this axis.
    pub fn growth(self, delta: f64) -> f64 {
        match self {
            Self::Fixed => 0.0,
            Self::Leading => -delta,
            Self::Trailing => delta,
        }
    }

    /// Coordinate of the edge that stays put.
    pub fn anchor(self, start: f64, length: f64) -> f64 {
        match self {
            Self::Leading => start + length,
            Self::Fixed | Self::Trailing => start,
        }
    }

    /// Room between the anchor and the source boundary on the moving side.
    pub fn available(self, start: f64, length: f64, extent: f64) -> f64 {
        match self {
            Self::Fixed => extent,
            Self::Leading => start + length,
            Self::Trailing => extent - start,
        }
    }

    /// Start coordinate of a rect of `length` that keeps `anchor` in place.
    pub fn place(self, anchor: f64, length: f64) -> f64 {
        match self {
            Self::Leading => anchor - length,
            Self::Fixed | Self::Trailing => anchor,
        }
    }
}

/// Per-handle pair of axis motions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleDescriptor {
    pub x: AxisMotion,
    pub y: AxisMotion,
}

impl HandleDescriptor {
    pub fn is_corner(&self) -> bool {
        !self.x.is_fixed() && !self.y.is_fixed()
    }
}

/// The eight resize handles around the crop window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handle {
    N,
    S,
    E,
    W,
    Ne,
    Nw,
    Se,
    Sw,
}

const HANDLE_TABLE: [(Handle, HandleDescriptor); 8] = [
    (Handle::N, HandleDescriptor { x: AxisMotion::Fixed, y: AxisMotion::Leading }),
    (Handle::S, HandleDescriptor { x: AxisMotion::Fixed, y: AxisMotion::Trailing }),
    (Handle::E, HandleDescriptor { x: AxisMotion::Trailing, y: AxisMotion::Fixed }),
    (Handle::W, HandleDescriptor { x: AxisMotion::Leading, y: AxisMotion::Fixed }),
    (Handle::Ne, HandleDescriptor { x: AxisMotion::Trailing, y: AxisMotion::Leading }),
    (Handle::Nw, HandleDescriptor { x: AxisMotion::Leading, y: AxisMotion::Leading }),
    (Handle::Se, HandleDescriptor { x: AxisMotion::Trailing, y: AxisMotion::Trailing }),
    (Handle::Sw, HandleDescriptor { x: AxisMotion::Leading, y: AxisMotion::Trailing }),
];

impl Handle {
    pub const ALL: [Handle; 8] = [
        Handle::N,
        Handle::S,
        Handle::E,
        Handle::W,
        Handle::Ne,
        Handle::Nw,
        Handle::Se,
        Handle::Sw,
    ];

    pub fn descriptor(self) -> HandleDescriptor {
        HANDLE_TABLE
            .iter()
            .find(|(handle, _)| *handle == self)
            .map(|(_, descriptor)| *descriptor)
            .unwrap_or(HandleDescriptor {
                x: AxisMotion::Fixed,
                y: AxisMotion::Fixed,
            })
    }

    /// Parse the `data-handle` value used by the overlay markup.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "n" => Some(Self::N),
            "s" => Some(Self::S),
            "e" => Some(Self::E),
            "w" => Some(Self::W),
            "ne" => Some(Self::Ne),
            "nw" => Some(Self::Nw),
            "se" => Some(Self::Se),
            "sw" => Some(Self::Sw),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::N => "n",
            Self::S => "s",
            Self::E => "e",
            Self::W => "w",
            Self::Ne => "ne",
            Self::Nw => "nw",
            Self::Se => "se",
            Self::Sw => "sw",
        }
    }

    /// CSS cursor shown while hovering or dragging this handle.
    pub fn cursor(self) -> &'static str {
        match self {
            Self::N | Self::S => "ns-resize",
            Self::E | Self::W => "ew-resize",
            Self::Ne | Self::Sw => "nesw-resize",
            Self::Nw | Self::Se => "nwse-resize",
        }
    }
}

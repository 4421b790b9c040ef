//! # Presets and target size
//!
//! ## Design
//!
//! The active target is one tagged value, [`TargetSelection`]. Holding a
//! single value is what makes preset groups mutually exclusive: picking a
//! preset in one group replaces whatever another group or the custom inputs
//! had set.
//!
//! ## Implementation
//!
//! - the catalog is a static table of four groups keyed by `"WxH"`
//! - resolver operations are `Session` methods returning whether a pass
//!   should be scheduled; the service does the scheduling
//! - custom inputs keep their raw text; parsing follows leading-integer
//!   semantics (`"1920px"` → 1920)

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::geometry::Size;

use super::session::{Session, Status};
use super::{WorkflowConfig, WorkflowError};

const COMPACT_RISKY_DESKTOP_PRESETS: [&str; 3] = ["3840x2160", "4480x2520", "5120x2880"];

/// Warning added on compact viewports for the largest desktop presets.
pub const COMPACT_HIGH_RES_WARNING: &str =
    "High resolution presets (4K/4.5K/5K) may take longer to process on mobile devices.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetGroup {
    Desktop,
    Mobile,
    Aspect,
    Social,
}

impl PresetGroup {
    pub const ALL: [PresetGroup; 4] = [Self::Desktop, Self::Mobile, Self::Aspect, Self::Social];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
            Self::Aspect => "aspect",
            Self::Social => "social",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "desktop" => Some(Self::Desktop),
            "mobile" => Some(Self::Mobile),
            "aspect" => Some(Self::Aspect),
            "social" => Some(Self::Social),
            _ => None,
        }
    }
}

/// Overlay templates a preset can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateId {
    #[serde(rename = "youtube-banner")]
    YoutubeBanner,
}

impl TemplateId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::YoutubeBanner => "youtube-banner",
        }
    }

    /// Unknown identifiers map to `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "youtube-banner" => Some(Self::YoutubeBanner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresetOption {
    pub group: PresetGroup,
    /// `"WxH"` option value.
    pub key: String,
    pub label: &'static str,
    pub size: Size,
    pub template: Option<TemplateId>,
}

fn option(group: PresetGroup, label: &'static str, width: u32, height: u32) -> PresetOption {
    let size = Size::new(width, height);
    PresetOption {
        group,
        key: size.key(),
        label,
        size,
        template: None,
    }
}

static CATALOG: Lazy<Vec<PresetOption>> = Lazy::new(|| {
    use PresetGroup::*;

    vec![
        option(Desktop, "HD", 1280, 720),
        option(Desktop, "HD+", 1600, 900),
        option(Desktop, "Full HD", 1920, 1080),
        option(Desktop, "QHD", 2560, 1440),
        option(Desktop, "Ultrawide QHD", 3440, 1440),
        option(Desktop, "4K UHD", 3840, 2160),
        option(Desktop, "4.5K", 4480, 2520),
        option(Desktop, "5K", 5120, 2880),
        option(Mobile, "Full HD portrait", 1080, 1920),
        option(Mobile, "iPhone 15", 1179, 2556),
        option(Mobile, "iPhone 15 Pro Max", 1290, 2796),
        option(Mobile, "Pixel 8", 1080, 2400),
        option(Mobile, "QHD+ portrait", 1440, 3200),
        option(Aspect, "1:1", 2048, 2048),
        option(Aspect, "4:3", 2048, 1536),
        option(Aspect, "3:2", 2160, 1440),
        option(Aspect, "16:9", 1920, 1080),
        option(Aspect, "21:9", 2560, 1080),
        option(Aspect, "4:5", 1080, 1350),
        option(Aspect, "9:16", 1080, 1920),
        option(Social, "Instagram post", 1080, 1080),
        option(Social, "Instagram portrait", 1080, 1350),
        option(Social, "Story / Reel", 1080, 1920),
        option(Social, "X header", 1500, 500),
        option(Social, "Link preview", 1200, 630),
        PresetOption {
            template: Some(TemplateId::YoutubeBanner),
            ..option(Social, "YouTube banner", 2560, 1440)
        },
    ]
});

pub fn catalog() -> &'static [PresetOption] {
    &CATALOG
}

pub fn group_options(group: PresetGroup) -> impl Iterator<Item = &'static PresetOption> {
    catalog().iter().filter(move |option| option.group == group)
}

pub fn find_preset(group: PresetGroup, key: &str) -> Option<&'static PresetOption> {
    let size = Size::parse_key(key)?;
    group_options(group).find(|option| option.size == size)
}

/// The active output target.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TargetSelection {
    Preset {
        group: PresetGroup,
        key: String,
        size: Size,
        template: Option<TemplateId>,
    },
    Custom {
        size: Size,
    },
    #[default]
    None,
}

impl TargetSelection {
    pub fn size(&self) -> Option<Size> {
        match self {
            Self::Preset { size, .. } | Self::Custom { size } => Some(*size),
            Self::None => None,
        }
    }

    pub fn is_preset(&self) -> bool {
        matches!(self, Self::Preset { .. })
    }

    pub fn preset_group(&self) -> Option<PresetGroup> {
        match self {
            Self::Preset { group, .. } => Some(*group),
            _ => None,
        }
    }

    pub fn template(&self) -> Option<TemplateId> {
        match self {
            Self::Preset { template, .. } => *template,
            _ => None,
        }
    }

    /// `true` for the largest desktop presets, which get a warning on compact
    /// viewports.
    pub fn is_compact_risky(&self) -> bool {
        match self {
            Self::Preset {
                group: PresetGroup::Desktop,
                key,
                ..
            } => COMPACT_RISKY_DESKTOP_PRESETS.contains(&key.as_str()),
            _ => false,
        }
    }
}

/// Raw text of the custom width/height inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CustomSizeInputs {
    pub width: String,
    pub height: String,
    /// Inputs are disabled while a preset is active.
    pub disabled: bool,
}

impl CustomSizeInputs {
    pub fn has_values(&self) -> bool {
        !self.width.trim().is_empty() || !self.height.trim().is_empty()
    }

    pub fn clear(&mut self) {
        self.width.clear();
        self.height.clear();
    }
}

/// Leading positive integer of `value`, if any.
///
/// Leading whitespace and a `+` sign are skipped; parsing stops at the first
/// non-digit. Zero, negatives and values past `u32` are rejected.
pub fn parse_dimension(value: &str) -> Option<u32> {
    let trimmed = value.trim_start();
    if trimmed.starts_with('-') {
        return None;
    }
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());

    unsigned[..end].parse::<u32>().ok().filter(|value| *value > 0)
}

/// Compact-viewport warning for the current selection, if any.
pub fn compact_viewport_warning(selection: &TargetSelection, is_compact: bool) -> Option<&'static str> {
    (is_compact && selection.is_compact_risky()).then_some(COMPACT_HIGH_RES_WARNING)
}

impl Session {
    /// Select `key` in `group`, or clear the group when `key` is `None`.
    ///
    /// Returns `true` when a pass should be scheduled.
    pub fn select_preset(
        &mut self,
        group: PresetGroup,
        key: Option<&str>,
        config: &WorkflowConfig,
    ) -> Result<bool, WorkflowError> {
        let Some(key) = key.map(str::trim).filter(|key| !key.is_empty()) else {
            return Ok(self.clear_preset_group(group));
        };

        let Some(preset) = find_preset(group, key) else {
            return self.fail(WorkflowError::UnknownPreset {
                group: group.as_str().to_string(),
                key: key.to_string(),
            });
        };

        self.custom.clear();
        self.custom.disabled = true;
        self.selection = TargetSelection::Preset {
            group,
            key: preset.key.clone(),
            size: preset.size,
            template: preset.template,
        };
        self.template_overlay = preset.template;
        self.preset_triggered = true;
        self.crop
            .auto_crop_for_target(preset.size.width, preset.size.height);
        if preset.template == Some(TemplateId::YoutubeBanner) {
            self.crop.apply_inset(config.template_inset_ratio);
        }

        log::info!(
            "🎯 preset selected: {}:{} template={:?}",
            group.as_str(),
            preset.key,
            preset.template.map(TemplateId::as_str)
        );
        Ok(true)
    }

    fn clear_preset_group(&mut self, group: PresetGroup) -> bool {
        if self.selection.preset_group() == Some(group) {
            self.selection = TargetSelection::None;
            self.template_overlay = None;
        }

        self.custom.disabled = self.selection.is_preset();
        if self.selection.is_preset() || self.custom.has_values() {
            return false;
        }

        self.selection = TargetSelection::None;
        self.preset_triggered = false;
        self.crop.reset_to_full_source();
        true
    }

    /// Update the raw custom input text. Ignored while the inputs are
    /// disabled.
    pub fn set_custom_inputs(&mut self, width: &str, height: &str) -> bool {
        if self.custom.disabled {
            return false;
        }
        self.custom.width = width.to_string();
        self.custom.height = height.to_string();
        true
    }

    /// Validate the custom inputs and make them the active target.
    ///
    /// Validation failures set the error status and change nothing else.
    pub fn apply_custom_size(&mut self) -> Result<bool, WorkflowError> {
        let width_raw = self.custom.width.trim();
        let height_raw = self.custom.height.trim();
        if width_raw.is_empty() || height_raw.is_empty() {
            return self.fail(WorkflowError::MissingCustomSize);
        }

        let (Some(width), Some(height)) = (parse_dimension(width_raw), parse_dimension(height_raw))
        else {
            return self.fail(WorkflowError::InvalidCustomSize);
        };

        self.custom.width = width.to_string();
        self.custom.height = height.to_string();
        self.custom.disabled = false;

        let size = Size::new(width, height);
        self.selection = TargetSelection::Custom { size };
        self.template_overlay = None;
        self.preset_triggered = true;
        self.crop.auto_crop_for_target(width, height);
        self.status = Status::idle();

        log::info!("🎯 custom size applied: {}", size.key());
        Ok(true)
    }

    /// Swap width and height text, then apply when both are present.
    pub fn swap_custom_size(&mut self) -> Result<bool, WorkflowError> {
        let width = self.custom.width.trim().to_string();
        let height = self.custom.height.trim().to_string();
        self.custom.width = height;
        self.custom.height = width;

        if self.custom.width.is_empty() || self.custom.height.is_empty() {
            self.status = Status::idle();
            return Ok(false);
        }

        self.apply_custom_size()
    }

    fn has_active_clear_selection(&self) -> bool {
        self.custom.has_values() || self.selection.size().is_some()
    }

    /// Drop every size selection but keep the crop.
    pub fn clear_selected_size(&mut self) -> bool {
        if !self.has_active_clear_selection() {
            return false;
        }

        self.selection = TargetSelection::None;
        self.custom.clear();
        self.custom.disabled = false;
        self.preset_triggered = false;
        self.gate.clear_pending();
        self.template_overlay = None;
        self.status = Status::idle();

        self.source.is_some()
    }

    /// Active selection, else crop pixel extent, else source size, else 1×1.
    pub fn resolve_target_size(&self) -> Size {
        self.selection
            .size()
            .or_else(|| self.crop.to_source_pixel_rect().map(|rect| rect.size()))
            .or_else(|| self.source.as_ref().map(|source| source.size))
            .unwrap_or(Size::new(1, 1))
    }
}

//! # Workflow errors
//!
//! One enum for every failure the load → resolve → encode chain can report.
//! `Display` is the user-facing status line; [`WorkflowError::code`] and
//! [`WorkflowError::stage`] give the UI glue stable identifiers to branch on.

use serde::Serialize;

use super::pipeline::format_megabytes;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Please upload a valid image file.")]
    InvalidFileType { detected: Option<String> },

    #[error("File is larger than {} MB. Please choose a smaller image.", format_megabytes(*.limit))]
    FileTooLarge { size: u64, limit: u64 },

    #[error(
        "Image resolution is too high. Try a smaller image (max {max_width} × {max_height})."
    )]
    ResolutionTooHigh {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    #[error("Could not load this image. Try a different file.")]
    Decode(String),

    #[error("Could not read this file: {0}")]
    FileSystem(String),

    #[error("Could not process image at this size. Try a smaller resolution.")]
    EncodeFailed(String),

    #[error(
        "Output exceeds {} MB at minimum quality. Try a smaller resolution.",
        format_megabytes(*.budget)
    )]
    BudgetExceeded { size: u64, budget: u64 },

    #[error("Enter both custom width and height.")]
    MissingCustomSize,

    #[error("Custom size must use positive numbers.")]
    InvalidCustomSize,

    #[error("Unknown preset {group}:{key}.")]
    UnknownPreset { group: String, key: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl WorkflowError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFileType { .. } => "E_INVALID_FILE_TYPE",
            Self::FileTooLarge { .. } => "E_FILE_TOO_LARGE",
            Self::ResolutionTooHigh { .. } => "E_RESOLUTION_TOO_HIGH",
            Self::Decode(_) => "E_DECODE",
            Self::FileSystem(_) => "E_FILE_SYSTEM",
            Self::EncodeFailed(_) => "E_ENCODE",
            Self::BudgetExceeded { .. } => "E_BUDGET_EXCEEDED",
            Self::MissingCustomSize => "E_CUSTOM_SIZE_MISSING",
            Self::InvalidCustomSize => "E_CUSTOM_SIZE_INVALID",
            Self::UnknownPreset { .. } => "E_UNKNOWN_PRESET",
            Self::Config(_) => "E_CONFIG",
        }
    }

    /// Workflow stage the error was raised in.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidFileType { .. } | Self::FileTooLarge { .. } => "validate",
            Self::FileSystem(_) => "load",
            Self::ResolutionTooHigh { .. } | Self::Decode(_) => "decode",
            Self::EncodeFailed(_) | Self::BudgetExceeded { .. } => "encode",
            Self::MissingCustomSize | Self::InvalidCustomSize | Self::UnknownPreset { .. } => {
                "resolve"
            }
            Self::Config(_) => "config",
        }
    }
}

impl From<WorkflowError> for String {
    fn from(error: WorkflowError) -> Self {
        error.to_string()
    }
}

/// Error payload handed to UI glue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub code: &'static str,
    pub stage: &'static str,
    pub message: String,
}

impl From<&WorkflowError> for StatusReport {
    fn from(error: &WorkflowError) -> Self {
        Self {
            code: error.code(),
            stage: error.stage(),
            message: error.to_string(),
        }
    }
}

impl From<WorkflowError> for StatusReport {
    fn from(error: WorkflowError) -> Self {
        Self::from(&error)
    }
}

//! Application error type
//!
//! # Design
//!
//! `AppError` is what the binary and any embedding glue see. Workflow
//! failures pass through unchanged so their status line stays intact; the
//! remaining variants cover what happens around the workflow (settings files,
//! writing the output).
//!
//! # Implementation
//!
//! - `thiserror` derives the messages.
//! - `From` conversions for `WorkflowError` and `std::io::Error`, no manual
//!   `map_err` at call sites.
//! - `Serialize` emits the message string for JSON consumers.

use serde::Serialize;

use crate::workflow::{SkipReason, StatusReport, WorkflowError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Load / resolve / encode failure.
    #[error("{0}")]
    Workflow(#[from] WorkflowError),

    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file missing fields or not valid JSON.
    #[error("settings error: {0}")]
    Settings(String),

    /// Invalid command line value.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// A pass ran and failed; carries the status it reported.
    #[error("{}", .0.message)]
    Render(StatusReport),

    #[error("no output produced ({0:?})")]
    NoOutput(SkipReason),
}

impl AppError {
    /// Stable code, `E_APP_*` outside the workflow.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Workflow(err) => err.code(),
            Self::Io(_) => "E_APP_IO",
            Self::Settings(_) => "E_APP_SETTINGS",
            Self::Argument(_) => "E_APP_ARGUMENT",
            Self::Render(report) => report.code,
            Self::NoOutput(_) => "E_APP_NO_OUTPUT",
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

//! # Image workflow
//!
//! Load → resolve target → render → encode-to-fit, plus the session state
//! and debounce scheduling around it.
//!
//! ## Layout
//!
//! | module | role |
//! |--------|------|
//! | `config` | [`WorkflowConfig`] and per-viewport output limits |
//! | `error` | [`WorkflowError`] with stable codes and user-facing messages |
//! | `host` | decode / rasterize / encode capability and object handles |
//! | `source` | uploads, decoded sources and published artifacts |
//! | `loader` | type, byte and pixel caps; file and data URL inputs |
//! | `pipeline` | output clamp and the quality search under the byte budget |
//! | `presets` | preset catalog, target selection, custom sizes |
//! | `session` | all per-session state, status and snapshots |
//! | `scheduler` | processing/pending gate and the debounce timer |
//! | `service` | async orchestration over all of the above |

mod config;
mod error;
mod host;
mod loader;
mod pipeline;
mod presets;
mod scheduler;
mod service;
mod session;
mod source;

pub use config::{OutputLimits, ResampleFilter, ViewportClass, WorkflowConfig};
pub use error::{StatusReport, WorkflowError};
pub use host::{
    HandleToken, ImageHost, InMemoryHandles, NativeHost, ObjectHandles, OutputFormat, PixelBuffer,
    Surface,
};
pub use loader::{validate_resolution, validate_upload};
pub use pipeline::{
    FitResult, FitSettings, PassPlan, RenderedOutput, clamp_output_size, encode_to_fit,
    format_bytes, format_megabytes, render_pass,
};
pub use presets::{
    COMPACT_HIGH_RES_WARNING, CustomSizeInputs, PresetGroup, PresetOption, TargetSelection,
    TemplateId, catalog, compact_viewport_warning, find_preset, group_options, parse_dimension,
};
pub use scheduler::{Debouncer, PassGate, ScheduleDecision, decide_schedule};
pub use service::WorkflowService;
pub use session::{
    OutputSummary, PassOutcome, Session, SessionSnapshot, SkipReason, Status, StatusTone,
};
pub use source::{DEFAULT_BASE_NAME, FileInput, FileMeta, OutputArtifact, SourceImage};

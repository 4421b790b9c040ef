//! # wallfit: crop, resize and fit images under a byte budget
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            glue (CLI, UI bindings, tests)                │
//! │   file in ── presets / custom size ── pointer events     │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ WorkflowService (Arc, async)
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕                                                  │
//! │  ┌─ workflow                                             │
//! │  │   ├─ loader     type / size / pixel caps              │
//! │  │   ├─ presets    catalog + target selection            │
//! │  │   ├─ session    state, status, snapshots              │
//! │  │   ├─ scheduler  debounce + coalescing gate            │
//! │  │   └─ pipeline   clamp → rasterize → encode-to-fit     │
//! │  │                                                       │
//! │  ├─ crop ─────── normalized rect + 8-handle drag engine  │
//! │  ├─ geometry ─── sizes, rects, display mapping           │
//! │  ├─ settings ─── JSON config files                       │
//! │  └─ error ────── AppError                                │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | module | role |
//! |--------|------|
//! | [`error`] | `AppError`, what the binary reports |
//! | [`geometry`] | coordinate types and pure numeric helpers |
//! | [`crop`] | crop model, resize handles, drag engine |
//! | [`workflow`] | load → resolve → encode-to-fit with debounce |
//! | [`settings`] | reading and writing `WorkflowConfig` files |

pub mod crop;
pub mod error;
pub mod geometry;
pub mod settings;
pub mod workflow;

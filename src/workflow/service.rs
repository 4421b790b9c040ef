//! # Workflow service
//!
//! ## Design
//!
//! `WorkflowService` orchestrates; it holds no logic of its own beyond
//! sequencing:
//! 1. take a config snapshot
//! 2. mutate the session under its lock
//! 3. schedule a pass when the mutation asks for one
//! 4. run decode / render on the blocking pool, outside the lock
//!
//! ## Implementation
//!
//! - config lives behind `RwLock<WorkflowConfig>`; every operation reads one
//!   snapshot and uses it throughout
//! - the session mutex is never held across an `.await`
//! - the debounce timer keeps only a `Weak` reference, so dropping the last
//!   service handle also ends pending passes

use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::Instant;

use crate::crop::{DragStart, NormalizedRect, PointerSample};
use crate::geometry::PixelRect;

use super::host::{ImageHost, InMemoryHandles, NativeHost, ObjectHandles};
use super::loader::{validate_resolution, validate_upload};
use super::pipeline::{format_bytes, render_pass};
use super::presets::PresetGroup;
use super::scheduler::{Debouncer, ScheduleDecision};
use super::session::{PassOutcome, Session, SessionSnapshot};
use super::source::{FileInput, FileMeta, OutputArtifact, SourceImage};
use super::{ViewportClass, WorkflowConfig, WorkflowError};

pub struct WorkflowService {
    config: RwLock<WorkflowConfig>,
    session: Mutex<Session>,
    host: Arc<dyn ImageHost>,
    handles: Arc<dyn ObjectHandles>,
    debouncer: Debouncer,
}

impl WorkflowService {
    /// Build a service over the given host capabilities.
    ///
    /// # Example
    /// ```rust,ignore
    /// use std::sync::Arc;
    /// use wallfit::workflow::{InMemoryHandles, NativeHost, WorkflowConfig, WorkflowService};
    ///
    /// let service = WorkflowService::new(
    ///     WorkflowConfig::default(),
    ///     Arc::new(NativeHost::new()),
    ///     Arc::new(InMemoryHandles::new()),
    /// )?;
    /// # Ok::<(), wallfit::workflow::WorkflowError>(())
    /// ```
    pub fn new(
        config: WorkflowConfig,
        host: Arc<dyn ImageHost>,
        handles: Arc<dyn ObjectHandles>,
    ) -> Result<Arc<Self>, WorkflowError> {
        config.validate()?;
        Ok(Arc::new(Self {
            config: RwLock::new(config),
            session: Mutex::new(Session::new()),
            host,
            handles,
            debouncer: Debouncer::new(),
        }))
    }

    /// Service backed by [`NativeHost`] and an in-memory handle registry.
    pub fn native(config: WorkflowConfig, viewport: ViewportClass) -> Result<Arc<Self>, WorkflowError> {
        Self::new(
            config,
            Arc::new(NativeHost::with_viewport(viewport)),
            Arc::new(InMemoryHandles::new()),
        )
    }

    /// Configuration snapshot for one operation.
    pub fn config_snapshot(&self) -> Result<WorkflowConfig, WorkflowError> {
        self.config
            .read()
            .map(|config| config.clone())
            .map_err(|_| WorkflowError::Config("config read lock poisoned".to_string()))
    }

    /// Swap the configuration. Passes already running keep their snapshot.
    pub fn update_config(&self, next: WorkflowConfig) -> Result<(), WorkflowError> {
        next.validate()?;
        let mut config = self
            .config
            .write()
            .map_err(|_| WorkflowError::Config("config write lock poisoned".to_string()))?;

        log::info!(
            "⚙️ config updated: budget={} quality={:.2}..{:.2} debounce={}ms filter={:?}",
            format_bytes(next.max_output_bytes),
            next.min_quality,
            next.start_quality,
            next.debounce_ms,
            next.resample_filter
        );
        *config = next;
        Ok(())
    }

    pub fn handles(&self) -> &Arc<dyn ObjectHandles> {
        &self.handles
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("session lock poisoned, continuing with recovered state");
                poisoned.into_inner()
            }
        }
    }

    fn viewport(&self) -> ViewportClass {
        ViewportClass::from_compact(self.host.is_compact_viewport())
    }

    // ----- scheduling -----

    /// Debounced request for a pass.
    ///
    /// Without a source nothing happens; during a pass the request is
    /// folded into one follow-up; otherwise the timer is (re)armed.
    pub fn schedule_process(self: &Arc<Self>) -> ScheduleDecision {
        let decision = {
            let mut session = self.lock_session();
            let has_source = session.has_source();
            session.gate.request(has_source)
        };

        if decision.cancels_timer() {
            self.debouncer.cancel();
        }
        if decision != ScheduleDecision::Arm {
            log::trace!("pass request: {:?}", decision);
            return decision;
        }

        let delay = match self.config_snapshot() {
            Ok(config) => config.debounce_interval(),
            Err(err) => {
                log::warn!("⚠️ {}; using default debounce", err);
                WorkflowConfig::default().debounce_interval()
            }
        };
        let service: Weak<Self> = Arc::downgrade(self);
        self.debouncer.arm(delay, move || async move {
            if let Some(service) = service.upgrade() {
                service.process_image().await;
            }
        });
        decision
    }

    /// `true` while a timer is armed or a pass is running or queued.
    pub fn is_busy(&self) -> bool {
        let gate = *self.lock_session().gate();
        self.debouncer.is_armed() || gate.is_processing() || gate.is_pending()
    }

    /// Run a pass now, then any follow-up requested while it ran.
    ///
    /// Returns the outcome of the last pass that ran.
    pub async fn process_image(&self) -> PassOutcome {
        let mut last: Option<PassOutcome> = None;

        loop {
            let config = match self.config_snapshot() {
                Ok(config) => config,
                Err(err) => return PassOutcome::Failed(err.into()),
            };
            let viewport = self.viewport();

            let ticket = {
                let mut session = self.lock_session();
                match session.begin_pass(&config, viewport) {
                    Ok(ticket) => ticket,
                    Err(reason) => {
                        log::debug!("pass skipped: {:?}", reason);
                        return last.unwrap_or(PassOutcome::Skipped { reason });
                    }
                }
            };

            let started = Instant::now();
            let host = Arc::clone(&self.host);
            let plan = ticket.plan.clone();
            let result = match tokio::task::spawn_blocking(move || render_pass(host.as_ref(), &plan)).await {
                Ok(result) => result,
                Err(err) => Err(WorkflowError::EncodeFailed(format!("render task failed: {}", err))),
            };

            let (outcome, follow_up) = {
                let mut session = self.lock_session();
                session.finish_pass(ticket, result, self.handles.as_ref())
            };
            log::debug!(
                "pass finished in {}ms (follow_up={})",
                started.elapsed().as_millis(),
                follow_up
            );

            if !follow_up {
                return outcome;
            }
            log::debug!("🔁 running coalesced follow-up pass");
            last = Some(outcome);
        }
    }

    /// Drop the debounce delay and run any scheduled pass right away.
    pub async fn process_now(&self) -> PassOutcome {
        self.debouncer.cancel();
        self.process_image().await
    }

    // ----- loading -----

    /// Validate, decode and install `file`, then schedule a pass.
    ///
    /// Errors are also recorded as the session status.
    pub async fn handle_file(self: &Arc<Self>, file: FileInput) -> Result<(), WorkflowError> {
        let started = Instant::now();
        let config = self.config_snapshot()?;

        if let Err(err) = validate_upload(&file, &config) {
            return self.lock_session().fail(err);
        }

        log::info!(
            "📥 loading {} ({}, {})",
            file.name,
            file.mime.as_deref().unwrap_or("sniffed"),
            format_bytes(file.size())
        );

        self.debouncer.cancel();
        let preview = self.handles.create(&file.bytes);
        let epoch = {
            let mut session = self.lock_session();
            session.begin_load(FileMeta::from(&file), preview, self.handles.as_ref())
        };

        // Header dimensions are checked first so an oversized source is
        // rejected before its pixels are allocated.
        let host = Arc::clone(&self.host);
        let bytes = file.bytes.clone();
        let limits = config.clone();
        let decoded = match tokio::task::spawn_blocking(move || {
            let header = host.probe_size(&bytes)?;
            validate_resolution(header, &limits)?;
            host.decode(&bytes)
        })
        .await
        {
            Ok(result) => result,
            Err(err) => Err(WorkflowError::Decode(format!("decode task failed: {}", err))),
        };

        {
            let mut session = self.lock_session();
            if !session.is_current_load(epoch) {
                log::info!("🗑️ decode of {} dropped: superseded", file.name);
                return Ok(());
            }

            let source = match decoded.and_then(|surface| {
                let source = SourceImage::new(surface);
                validate_resolution(source.size, &config).map(|()| source)
            }) {
                Ok(source) => source,
                Err(err @ WorkflowError::ResolutionTooHigh { .. }) => {
                    log::warn!("⚠️ {} rejected: {}", file.name, err);
                    session.reject_source(&err, self.handles.as_ref());
                    return Err(err);
                }
                Err(err) => return session.fail(err),
            };

            log::info!(
                "✅ source ready {}x{} in {}ms",
                source.size.width,
                source.size.height,
                started.elapsed().as_millis()
            );
            session.install_source(source, &config);
        }

        self.schedule_process();
        Ok(())
    }

    // ----- target selection -----

    pub fn select_preset(self: &Arc<Self>, group: PresetGroup, key: Option<&str>) -> Result<(), WorkflowError> {
        let config = self.config_snapshot()?;
        let needs_pass = self.lock_session().select_preset(group, key, &config)?;
        if needs_pass {
            self.schedule_process();
        }
        Ok(())
    }

    /// Returns `false` when the inputs are disabled.
    pub fn set_custom_inputs(&self, width: &str, height: &str) -> bool {
        self.lock_session().set_custom_inputs(width, height)
    }

    pub fn apply_custom_size(self: &Arc<Self>) -> Result<(), WorkflowError> {
        let needs_pass = self.lock_session().apply_custom_size()?;
        if needs_pass {
            self.schedule_process();
        }
        Ok(())
    }

    pub fn swap_custom_size(self: &Arc<Self>) -> Result<(), WorkflowError> {
        let needs_pass = self.lock_session().swap_custom_size()?;
        if needs_pass {
            self.schedule_process();
        }
        Ok(())
    }

    pub fn clear_selected_size(self: &Arc<Self>) {
        let needs_pass = self.lock_session().clear_selected_size();
        if needs_pass {
            self.schedule_process();
        }
    }

    pub fn reset_all(&self) {
        self.debouncer.cancel();
        self.lock_session().reset_all(self.handles.as_ref());
    }

    // ----- crop -----

    pub fn set_crop(self: &Arc<Self>, rect: NormalizedRect) {
        let needs_pass = self.lock_session().set_crop_rect(rect);
        if needs_pass {
            self.schedule_process();
        }
    }

    pub fn set_crop_pixels(self: &Arc<Self>, rect: PixelRect) {
        let needs_pass = self.lock_session().set_crop_pixels(rect);
        if needs_pass {
            self.schedule_process();
        }
    }

    pub fn begin_crop_drag(&self, start: DragStart) -> Result<bool, WorkflowError> {
        let min_edge = self.config_snapshot()?.min_crop_edge;
        Ok(self.lock_session().begin_crop_drag(start, min_edge))
    }

    /// Apply a pointer move; schedules a pass when the crop changed.
    pub fn update_crop_drag(self: &Arc<Self>, pointer: PointerSample) -> bool {
        let changed = self.lock_session().update_crop_drag(pointer);
        if changed {
            self.schedule_process();
        }
        changed
    }

    pub fn end_crop_drag(&self, pointer_id: i64) -> bool {
        self.lock_session().end_crop_drag(pointer_id)
    }

    // ----- queries -----

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock_session().snapshot()
    }

    pub fn output(&self) -> Option<OutputArtifact> {
        self.lock_session().output().cloned()
    }

    pub fn download_file_name(&self) -> Option<String> {
        self.lock_session().download_file_name()
    }
}

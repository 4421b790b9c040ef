//! # Pass scheduling
//!
//! ## Design
//!
//! Two pieces with separate jobs:
//!
//! - [`PassGate`] holds the `processing` / `pending` flags. It lives inside
//!   the session so flag changes and state changes happen under one lock.
//! - [`Debouncer`] owns the single timer slot. Re-arming replaces the old
//!   timer, so a burst of requests collapses into one pass.
//!
//! ## Implementation
//!
//! The decision for a request is a pure function ([`decide_schedule`]) so the
//! coalescing rules are unit-testable without a runtime. The timer task
//! sleeps, spawns the pass as its own task and waits for it. Aborting the
//! timer only detaches a pass that already started, it never cancels it.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// What to do with a scheduling request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// No source loaded; nothing to do.
    Skip,
    /// A pass is running; remember to run one more when it finishes.
    MarkPending,
    /// Start (or restart) the debounce timer.
    Arm,
}

impl ScheduleDecision {
    /// Both non-skip outcomes drop an armed timer.
    pub fn cancels_timer(self) -> bool {
        !matches!(self, Self::Skip)
    }
}

pub fn decide_schedule(has_source: bool, processing: bool) -> ScheduleDecision {
    match (has_source, processing) {
        (false, _) => ScheduleDecision::Skip,
        (true, true) => ScheduleDecision::MarkPending,
        (true, false) => ScheduleDecision::Arm,
    }
}

/// Processing / pending flags for the encode pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassGate {
    processing: bool,
    pending: bool,
}

impl PassGate {
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn request(&mut self, has_source: bool) -> ScheduleDecision {
        let decision = decide_schedule(has_source, self.processing);
        if decision == ScheduleDecision::MarkPending {
            self.pending = true;
        }
        decision
    }

    /// Claim the gate for a pass. `false` while another pass runs.
    pub fn try_begin(&mut self) -> bool {
        if self.processing {
            return false;
        }
        self.processing = true;
        true
    }

    /// Release the gate. Returns whether a follow-up pass was requested
    /// meanwhile; the pending flag is consumed either way.
    pub fn finish(&mut self) -> bool {
        self.processing = false;
        std::mem::take(&mut self.pending)
    }

    pub fn clear_pending(&mut self) {
        self.pending = false;
    }
}

/// Single-slot debounce timer.
#[derive(Debug, Default)]
pub struct Debouncer {
    slot: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("debounce slot lock poisoned, continuing with recovered state");
                poisoned.into_inner()
            }
        }
    }

    /// `true` while a timer is waiting or the pass it fired is still running.
    pub fn is_armed(&self) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Drop the armed timer, if any. Returns whether it was still active.
    pub fn cancel(&self) -> bool {
        match self.slot().take() {
            Some(handle) => {
                let was_waiting = !handle.is_finished();
                handle.abort();
                was_waiting
            }
            None => false,
        }
    }

    /// Replace any armed timer with one that spawns `task` after `delay`.
    ///
    /// Needs a Tokio runtime; without one the request is dropped with a
    /// warning and `false` is returned.
    pub fn arm<F, Fut>(&self, delay: Duration, task: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                log::warn!("⚠️ no async runtime, pass not scheduled: {}", err);
                return false;
            }
        };

        let mut slot = self.slot();
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        let spawner = runtime.clone();
        *slot = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = spawner.spawn(task()).await {
                log::warn!("⚠️ scheduled pass ended abnormally: {}", err);
            }
        }));
        true
    }
}

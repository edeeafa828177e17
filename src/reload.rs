//! Live reload notifications.
//!
//! Steps report written output through a [`ReloadSink`]. The dev server
//! implements the sink over a broadcast channel; one-shot builds use
//! [`NullReload`].

use crate::build::step::{ReloadKind, StepId};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Mutex;

/// Payload pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadEvent {
    /// Step that produced the change
    pub step: StepId,
    /// Output directory the change is scoped to
    pub scope: PathBuf,
    pub kind: ReloadKind,
}

impl ReloadEvent {
    pub fn new(step: StepId, scope: impl Into<PathBuf>, kind: ReloadKind) -> Self {
        Self { step, scope: scope.into(), kind }
    }

    /// JSON form sent on the event stream.
    pub fn to_json(&self) -> String {
        // Serializing a struct of plain fields cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Receiver of reload notifications.
pub trait ReloadSink: Send + Sync {
    fn notify(&self, event: ReloadEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReload;

impl ReloadSink for NullReload {
    fn notify(&self, event: ReloadEvent) {
        log::trace!("reload ({}) dropped: no server", event.step);
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingReload {
    events: Mutex<Vec<ReloadEvent>>,
}

impl RecordingReload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far.
    pub fn events(&self) -> Vec<ReloadEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ReloadSink for RecordingReload {
    fn notify(&self, event: ReloadEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

//! Incremental build support.
//!
//! Two independent filters decide which inputs a step re-processes:
//!
//! 1. **Since last run**: a file is included iff the step has never completed
//!    successfully in this process, or the file was modified after the
//!    step's last successful completion.
//! 2. **Newer than output**: a file is excluded when the output of the same
//!    relative path exists and is at least as new as the input.
//!
//! A step may enable either or both; a file must pass every enabled filter.

use crate::build::discovery::SourceFile;
use crate::build::step::StepId;
use std::collections::HashMap;
use std::path::Path;
use std::time::SystemTime;

/// Last successful completion time of each step, for the process lifetime.
#[derive(Debug, Default, Clone)]
pub struct RunLedger {
    completed: HashMap<StepId, SystemTime>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last successful completion of `step`, if it ever completed.
    pub fn last_run(&self, step: StepId) -> Option<SystemTime> {
        self.completed.get(&step).copied()
    }

    /// Record a successful completion of `step` at `at`.
    pub fn record(&mut self, step: StepId, at: SystemTime) {
        self.completed.insert(step, at);
    }

    /// Forget every recorded run, so the next run of each step is a full one.
    pub fn reset(&mut self) {
        self.completed.clear();
    }
}

/// Modification time of a file, if it can be read.
pub fn modified_time(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

/// Keep files modified strictly after `since`; keep everything when `since`
/// is undefined.
pub fn filter_since(files: Vec<SourceFile>, since: Option<SystemTime>) -> Vec<SourceFile> {
    let Some(since) = since else {
        return files;
    };

    files
        .into_iter()
        .filter(|f| match modified_time(&f.path) {
            Some(mtime) => mtime > since,
            // Unknown mtime: process rather than silently skip
            None => true,
        })
        .collect()
}

/// Drop files whose output under `destination` is at least as new as the input.
pub fn filter_newer_than_output(files: Vec<SourceFile>, destination: &Path) -> Vec<SourceFile> {
    files
        .into_iter()
        .filter(|f| {
            let Some(src_time) = modified_time(&f.path) else {
                return true;
            };
            match modified_time(&destination.join(&f.relative)) {
                Some(dst_time) => {
                    let fresh = src_time > dst_time;
                    if !fresh {
                        log::debug!("Skipping {} (output is up to date)", f.relative.display());
                    }
                    fresh
                }
                None => true,
            }
        })
        .collect()
}

//! Build result types.
//!
//! Contains types for representing the outcome of pipeline runs.

use crate::build::step::{CompileError, StepId, StepOutcome};
use std::path::PathBuf;
use std::time::Duration;

/// Result of running a single step.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Step that ran
    pub step: StepId,
    /// Inputs that passed the incremental filters
    pub processed: usize,
    /// Output files written
    pub outputs: Vec<PathBuf>,
    /// Per-file compile errors
    pub errors: Vec<CompileError>,
    /// Warning messages (if any)
    pub warnings: Vec<String>,
    /// Step duration
    pub duration: Duration,
}

impl StepResult {
    /// Create a result from a finished step run.
    pub fn from_outcome(step: StepId, outcome: StepOutcome, duration: Duration) -> Self {
        Self {
            step,
            processed: outcome.processed,
            outputs: outcome.outputs,
            errors: outcome.errors,
            warnings: outcome.warnings,
            duration,
        }
    }

    /// True when the step had nothing to do.
    pub fn is_noop(&self) -> bool {
        self.processed == 0 && self.outputs.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Result of a complete pipeline run.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Results for each step, in completion order
    pub steps: Vec<StepResult>,
    /// Whether the output root was removed first
    pub cleaned: bool,
    /// Total build duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step result.
    pub fn add_result(&mut self, result: StepResult) {
        self.steps.push(result);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    pub fn get(&self, step: StepId) -> Option<&StepResult> {
        self.steps.iter().find(|r| r.step == step)
    }

    /// Number of input files processed across all steps.
    pub fn processed_count(&self) -> usize {
        self.steps.iter().map(|r| r.processed).sum()
    }

    /// Number of compile errors across all steps.
    pub fn error_count(&self) -> usize {
        self.steps.iter().map(|r| r.errors.len()).sum()
    }

    /// Check if the run finished without compile errors.
    pub fn is_success(&self) -> bool {
        self.error_count() == 0
    }

    /// Get all outputs produced.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.steps.iter().flat_map(|r| r.outputs.iter()).collect()
    }

    /// Get all warnings.
    pub fn all_warnings(&self) -> Vec<&String> {
        self.steps.iter().flat_map(|r| r.warnings.iter()).collect()
    }

    /// Get all compile errors.
    pub fn all_errors(&self) -> Vec<&CompileError> {
        self.steps.iter().flat_map(|r| r.errors.iter()).collect()
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let processed = self.processed_count();
        let written = self.all_outputs().len();
        let errors = self.all_errors();

        if errors.is_empty() {
            lines.push(format!(
                "Build succeeded: {} steps, {} files processed, {} written in {:?}",
                self.steps.len(),
                processed,
                written,
                self.total_duration
            ));
        } else {
            lines.push(format!(
                "Build finished with {} error(s): {} files processed, {} written",
                errors.len(),
                processed,
                written
            ));
            for error in &errors {
                lines.push(format!("  - {}", error));
            }
        }

        let warnings = self.all_warnings();
        if !warnings.is_empty() {
            lines.push(format!("Warnings ({}): ", warnings.len()));
            for warning in warnings.iter().take(5) {
                lines.push(format!("  - {}", warning));
            }
            if warnings.len() > 5 {
                lines.push(format!("  ... and {} more", warnings.len() - 5));
            }
        }

        lines.join("\n")
    }
}

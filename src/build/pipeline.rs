//! Build pipeline orchestration.
//!
//! The pipeline owns the step graph and the run ledger. A full build cleans
//! the output root and runs the graph level by level; steps of one level run
//! on scoped worker threads. Single steps can be re-run on demand, which is
//! what the watcher does.

use crate::build::clean::{clean_output, CleanError};
use crate::build::context::BuildContext;
use crate::build::graph::{GraphError, StepGraph};
use crate::build::incremental::RunLedger;
use crate::build::result::{BuildResult, StepResult};
use crate::build::step::{StepError, StepId, TransformStep};
use crate::build::steps::{standard_steps, StepsError};
use crate::reload::{NullReload, ReloadEvent, ReloadSink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Instant, SystemTime};
use thiserror::Error;

/// Error that aborts a pipeline run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    #[error(transparent)]
    Step(#[from] StepError),
    #[error(transparent)]
    Clean(#[from] CleanError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Setup(#[from] StepsError),
    /// Requested step is not part of the graph
    #[error("Unknown step '{0}'")]
    UnknownStep(StepId),
}

/// Build pipeline for executing steps.
pub struct Pipeline {
    context: BuildContext,
    graph: StepGraph,
    ledger: Mutex<RunLedger>,
    reload: Arc<dyn ReloadSink>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("context", &self.context)
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a pipeline running the standard steps.
    pub fn new(context: BuildContext) -> Result<Self, PipelineError> {
        let graph = standard_steps(&context)?;
        Ok(Self::with_graph(context, graph))
    }

    /// Create a pipeline over a custom step graph.
    pub fn with_graph(context: BuildContext, graph: StepGraph) -> Self {
        Self { context, graph, ledger: Mutex::new(RunLedger::new()), reload: Arc::new(NullReload) }
    }

    /// Send reload events to `sink`.
    pub fn with_reload(mut self, sink: Arc<dyn ReloadSink>) -> Self {
        self.reload = sink;
        self
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    pub fn graph(&self) -> &StepGraph {
        &self.graph
    }

    /// Last successful completion of `step` in this process.
    pub fn last_run(&self, step: StepId) -> Option<SystemTime> {
        self.ledger().last_run(step)
    }

    fn ledger(&self) -> MutexGuard<'_, RunLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove the output root and forget previous runs.
    ///
    /// Returns `true` if an output root existed.
    pub fn clean(&self) -> Result<bool, PipelineError> {
        let removed = clean_output(&self.context.output_root())?;
        self.ledger().reset();
        Ok(removed)
    }

    /// Clean, then run every step in dependency order.
    pub fn build(&self) -> Result<BuildResult, PipelineError> {
        let start = Instant::now();
        let levels = self.graph.levels()?;

        let mut result = BuildResult::new();
        result.cleaned = self.clean()?;

        for level in &levels {
            for step_result in self.run_level(level)? {
                result.add_result(step_result);
            }
        }

        Ok(result.with_duration(start.elapsed()))
    }

    /// Run one step.
    pub fn run_step(&self, id: StepId) -> Result<StepResult, PipelineError> {
        let step = self.graph.get(id).ok_or(PipelineError::UnknownStep(id))?;
        Ok(self.execute(step)?)
    }

    /// Run steps one after another in the given order.
    pub fn run_steps(&self, ids: &[StepId]) -> Result<Vec<StepResult>, PipelineError> {
        ids.iter().map(|id| self.run_step(*id)).collect()
    }

    /// Execute one step: consult and update the ledger, then notify reload.
    fn execute(&self, step: &TransformStep) -> Result<StepResult, StepError> {
        let last_run = self.last_run(step.id);
        log::info!("Starting '{}'...", step.id);
        let start = Instant::now();

        let outcome = step.run(last_run)?;
        self.ledger().record(step.id, SystemTime::now());

        let result = StepResult::from_outcome(step.id, outcome, start.elapsed());
        log::debug!(
            "[{}] {} processed, {} written, {} error(s)",
            step.id,
            result.processed,
            result.outputs.len(),
            result.errors.len()
        );

        if step.notifies_reload && !result.outputs.is_empty() {
            self.reload.notify(ReloadEvent::new(step.id, &step.destination, step.reload_kind));
        }

        log::info!("Finished '{}' after {:?}", step.id, result.duration);
        Ok(result)
    }

    /// Execute a single level of steps in parallel.
    fn run_level(&self, steps: &[&TransformStep]) -> Result<Vec<StepResult>, StepError> {
        let jobs = self.context.jobs();

        if jobs == 1 || steps.len() <= 1 {
            return steps.iter().map(|s| self.execute(s)).collect();
        }

        let results = Mutex::new(Vec::with_capacity(steps.len()));
        let next_idx = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..jobs.min(steps.len()) {
                let results = &results;
                let next_idx = &next_idx;

                s.spawn(move || loop {
                    let idx = next_idx.fetch_add(1, Ordering::SeqCst);
                    if idx >= steps.len() {
                        break;
                    }
                    let result = self.execute(steps[idx]);
                    results.lock().unwrap_or_else(PoisonError::into_inner).push((idx, result));
                });
            }
        });

        // Sort results by original index to keep declaration order
        let mut results = results.into_inner().unwrap_or_else(PoisonError::into_inner);
        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, r)| r).collect()
    }
}

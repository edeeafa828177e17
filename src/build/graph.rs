//! Step dependency graph.
//!
//! Steps declare the steps they depend on; the graph turns those edges into
//! a topological order and into levels of mutually independent steps.

use crate::build::step::{StepId, TransformStep};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Error during build order calculation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphError {
    /// Circular dependency detected
    #[error("Circular dependency detected involving step '{0}'")]
    CyclicDependency(StepId),
    /// The same step was added twice
    #[error("Step '{0}' is defined more than once")]
    DuplicateStep(StepId),
    /// A step depends on a step that is not in the graph
    #[error("Step '{step}' depends on '{dependency}', which is not defined")]
    UnknownDependency { step: StepId, dependency: StepId },
}

/// A collection of steps with dependency information.
#[derive(Debug, Default)]
pub struct StepGraph {
    steps: Vec<TransformStep>,
}

impl StepGraph {
    pub fn new() -> Self {
        Self { steps: vec![] }
    }

    /// Add a step to the graph.
    pub fn add_step(&mut self, step: TransformStep) -> Result<(), GraphError> {
        if self.get(step.id).is_some() {
            return Err(GraphError::DuplicateStep(step.id));
        }
        self.steps.push(step);
        Ok(())
    }

    /// All steps in declaration order.
    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    pub fn get(&self, id: StepId) -> Option<&TransformStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every declared dependency must be a step of this graph.
    fn check_dependencies(&self) -> Result<(), GraphError> {
        for step in &self.steps {
            if let Some(missing) = step.depends_on.iter().find(|d| self.get(**d).is_none()) {
                return Err(GraphError::UnknownDependency { step: step.id, dependency: *missing });
            }
        }
        Ok(())
    }

    /// Get steps in build order (dependencies before dependents).
    pub fn build_order(&self) -> Result<Vec<&TransformStep>, GraphError> {
        self.check_dependencies()?;
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        for step in &self.steps {
            self.visit(step, &mut visited, &mut visiting, &mut result)?;
        }

        Ok(result)
    }

    fn visit<'a>(
        &'a self,
        step: &'a TransformStep,
        visited: &mut HashSet<StepId>,
        visiting: &mut HashSet<StepId>,
        result: &mut Vec<&'a TransformStep>,
    ) -> Result<(), GraphError> {
        if visited.contains(&step.id) {
            return Ok(());
        }

        if !visiting.insert(step.id) {
            return Err(GraphError::CyclicDependency(step.id));
        }

        for &dep_id in &step.depends_on {
            if let Some(dep) = self.get(dep_id) {
                self.visit(dep, visited, visiting, result)?;
            }
        }

        visiting.remove(&step.id);
        visited.insert(step.id);
        result.push(step);

        Ok(())
    }

    /// Group steps into levels; every dependency of a step sits in an
    /// earlier level. Steps within a level keep declaration order.
    pub fn levels(&self) -> Result<Vec<Vec<&TransformStep>>, GraphError> {
        // Surface unknown dependencies and cycles with the offending step id
        self.build_order()?;

        let mut level_of: HashMap<StepId, usize> = HashMap::new();
        let mut remaining: Vec<&TransformStep> = self.steps.iter().collect();
        let mut levels: Vec<Vec<&TransformStep>> = Vec::new();

        while !remaining.is_empty() {
            let current = levels.len();
            let (ready, blocked): (Vec<_>, Vec<_>) = remaining
                .into_iter()
                .partition(|s| s.depends_on.iter().all(|d| level_of.contains_key(d)));

            if ready.is_empty() {
                return Err(GraphError::CyclicDependency(blocked[0].id));
            }

            for step in &ready {
                level_of.insert(step.id, current);
            }
            levels.push(ready);
            remaining = blocked;
        }

        Ok(levels)
    }
}

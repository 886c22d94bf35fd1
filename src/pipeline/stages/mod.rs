//! Stage functions and the registry that resolves them by name.

pub mod builtin;
pub mod script;

pub use builtin::{add_value, identity, multiply_value, square_value, subtract_value};
pub use script::ScriptStage;

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::payload::Payload;
use crate::pipeline::pipe::{Stage, StageArgs, StageFn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name-indexed set of stage functions, used when building pipes from
/// configuration.
#[derive(Clone, Default)]
pub struct StageRegistry {
    functions: BTreeMap<String, Arc<dyn StageFn>>,
}

impl StageRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in arithmetic stages.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("add_value", builtin::add_value);
        registry.register("subtract_value", builtin::subtract_value);
        registry.register("multiply_value", builtin::multiply_value);
        registry.register("square_value", builtin::square_value);
        registry.register("identity", builtin::identity);
        registry
    }

    /// Register (or replace) a function under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&StageArgs<'_>) -> PipelineResult<Payload> + Send + Sync + 'static,
    {
        self.register_arc(name, Arc::new(func));
    }

    pub fn register_arc(&mut self, name: impl Into<String>, func: Arc<dyn StageFn>) {
        self.functions.insert(name.into(), func);
    }

    pub fn get(&self, name: &str) -> PipelineResult<Arc<dyn StageFn>> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownStage(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Build a stage named `name` running the function registered as `function`.
    pub fn stage(&self, name: &str, function: &str, bound: Payload) -> PipelineResult<Stage> {
        Ok(Stage::from_arc(name, self.get(function)?).with_bound(bound))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

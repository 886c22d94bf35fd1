//! Pipe: an ordered, composable chain of payload-transforming stages.
//!
//! Each stage is a function `(payload, bound args) -> payload` together with
//! the bound arguments supplied when it was appended. Invoking a pipe folds the
//! payload through the stages in order: the keys a stage returns are merged
//! over the running payload, which becomes the input of the next stage.
//!
//! Bound arguments belong to one stage only. They are handed to the stage in
//! [`StageArgs`] next to the payload instead of being written into it, so they
//! never leak into later stages. Defaults given to [`Pipe::with_defaults`] are
//! bound to the first stage.
//!
//! ```ignore
//! let pipe = Pipe::new()
//!     .then_with("add", stages::add_value, Payload::from([("value", 5)]))
//!     .then("square", stages::square_value);
//!
//! let out = pipe.invoke(&Payload::from([("passthrough", 10)]))?;
//! assert_eq!(out.get("passthrough"), Some(&Value::Int(225)));
//! ```

use crate::pipeline::error::PipelineResult;
use crate::pipeline::payload::{Payload, Value, TRACE};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Arguments passed to a stage: the running payload plus the stage's bound arguments.
#[derive(Debug, Clone, Copy)]
pub struct StageArgs<'a> {
    payload: &'a Payload,
    bound: &'a Payload,
}

impl<'a> StageArgs<'a> {
    pub fn new(payload: &'a Payload, bound: &'a Payload) -> Self {
        Self { payload, bound }
    }

    /// The running payload.
    pub fn payload(&self) -> &'a Payload {
        self.payload
    }

    /// Arguments bound to this stage.
    pub fn bound(&self) -> &'a Payload {
        self.bound
    }

    /// Keyword lookup: bound arguments shadow payload keys.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.bound.get(key).or_else(|| self.payload.get(key))
    }
}

/// A stage function.
///
/// Any `Fn(&StageArgs) -> PipelineResult<Payload>` closure or fn item is a stage.
pub trait StageFn: Send + Sync {
    fn call(&self, args: &StageArgs<'_>) -> PipelineResult<Payload>;
}

impl<F> StageFn for F
where
    F: Fn(&StageArgs<'_>) -> PipelineResult<Payload> + Send + Sync,
{
    fn call(&self, args: &StageArgs<'_>) -> PipelineResult<Payload> {
        self(args)
    }
}

/// A named stage with its bound arguments.
#[derive(Clone)]
pub struct Stage {
    name: String,
    func: Arc<dyn StageFn>,
    bound: Payload,
}

impl Stage {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&StageArgs<'_>) -> PipelineResult<Payload> + Send + Sync + 'static,
    {
        Self::from_arc(name, Arc::new(func))
    }

    /// Build a stage around a shared function (e.g. one looked up in a registry).
    pub fn from_arc(name: impl Into<String>, func: Arc<dyn StageFn>) -> Self {
        Self {
            name: name.into(),
            func,
            bound: Payload::new(),
        }
    }

    pub fn with_bound(mut self, bound: Payload) -> Self {
        self.bound = bound;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bound(&self) -> &Payload {
        &self.bound
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("bound", &self.bound)
            .finish()
    }
}

/// Ordered sequence of stages. An empty pipe is the identity.
#[derive(Debug, Clone, Default)]
pub struct Pipe {
    stages: Vec<Stage>,
    /// Bound to the first stage at invocation time.
    defaults: Payload,
    /// Defaults of a chained stage-less pipe, bound to the next stage pushed.
    pending: Payload,
    trace: bool,
}

impl Pipe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipe whose first stage receives `defaults` as bound arguments.
    pub fn with_defaults(defaults: Payload) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    /// Pipe that records each stage's output under the `trace` key.
    pub fn traced() -> Self {
        Self {
            trace: true,
            ..Self::default()
        }
    }

    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    pub fn is_traced(&self) -> bool {
        self.trace
    }

    /// Append a stage with no bound arguments.
    pub fn then<F>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&StageArgs<'_>) -> PipelineResult<Payload> + Send + Sync + 'static,
    {
        self.then_stage(Stage::new(name, func))
    }

    /// Append a stage with bound arguments visible to that stage only.
    pub fn then_with<F>(self, name: impl Into<String>, func: F, bound: Payload) -> Self
    where
        F: Fn(&StageArgs<'_>) -> PipelineResult<Payload> + Send + Sync + 'static,
    {
        self.then_stage(Stage::new(name, func).with_bound(bound))
    }

    pub fn then_stage(mut self, stage: Stage) -> Self {
        self.push(stage);
        self
    }

    pub fn push(&mut self, mut stage: Stage) {
        if !self.pending.is_empty() {
            stage.bound = std::mem::take(&mut self.pending).merged_with(&stage.bound);
        }
        self.stages.push(stage);
    }

    /// Concatenate `other` after `self`, preserving order.
    ///
    /// `other`'s defaults stay bound to the first stage that follows them. When
    /// `other` has no stages they carry over to the next stage appended, so
    /// `a.chain(b).chain(c)` and `a.chain(b.chain(c))` bind the same arguments.
    pub fn chain(mut self, other: Pipe) -> Self {
        let Pipe {
            stages,
            defaults,
            pending,
            trace,
        } = other;

        if self.stages.is_empty() {
            self.defaults = self.defaults.merged_with(&defaults);
        } else {
            self.pending = std::mem::take(&mut self.pending).merged_with(&defaults);
        }
        for stage in stages {
            self.push(stage);
        }
        self.pending = std::mem::take(&mut self.pending).merged_with(&pending);
        self.trace |= trace;
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn defaults(&self) -> &Payload {
        &self.defaults
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(Stage::name)
    }

    /// Bound arguments for stage `index`, with the pipe defaults applied to the first.
    fn bound_for(&self, index: usize) -> Cow<'_, Payload> {
        let stage = &self.stages[index];
        if index == 0 && !self.defaults.is_empty() {
            Cow::Owned(self.defaults.merged_with(&stage.bound))
        } else {
            Cow::Borrowed(&stage.bound)
        }
    }

    /// Fold `payload` through every stage in order.
    pub fn invoke(&self, payload: &Payload) -> PipelineResult<Payload> {
        let mut current = payload.clone();

        if self.trace {
            let entry = trace_entry("input", payload);
            current.insert(TRACE, Value::List(vec![entry]));
        }

        for (index, stage) in self.stages.iter().enumerate() {
            let bound = self.bound_for(index);
            let output = stage
                .func
                .call(&StageArgs::new(&current, &bound))
                .map_err(|e| e.in_stage(stage.name.as_str()))?;

            current.merge_from(&output);

            if self.trace {
                let entry = trace_entry(&stage.name, &output);
                match current.get_mut(TRACE) {
                    Some(Value::List(entries)) => entries.push(entry),
                    _ => {
                        current.insert(TRACE, Value::List(vec![entry]));
                    }
                }
            }
        }

        Ok(current)
    }
}

fn trace_entry(function: &str, output: &Payload) -> Value {
    let mut snapshot = output.clone();
    snapshot.remove(TRACE);
    Value::Map(
        Payload::new()
            .with("function", function)
            .with("output", snapshot),
    )
}

//! Stage backed by a compiled Rhai script.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::payload::Payload;
use crate::pipeline::pipe::{StageArgs, StageFn};
use crate::scripting::{CompiledScript, ScriptEngine};
use std::sync::Arc;

/// Runs a script with `payload` and `args` in scope; see [`crate::scripting`].
#[derive(Debug, Clone)]
pub struct ScriptStage {
    engine: Arc<ScriptEngine>,
    script: CompiledScript,
}

impl ScriptStage {
    /// Compile `source` on `engine`. Compile errors surface here, at
    /// construction time, as [`PipelineError::Script`](crate::pipeline::PipelineError::Script).
    pub fn compile(engine: Arc<ScriptEngine>, name: &str, source: &str) -> PipelineResult<Self> {
        let script = engine.compile(name, source)?;
        Ok(Self { engine, script })
    }

    pub fn name(&self) -> &str {
        self.script.name()
    }

    pub fn source(&self) -> &str {
        self.script.source()
    }
}

impl StageFn for ScriptStage {
    fn call(&self, args: &StageArgs<'_>) -> PipelineResult<Payload> {
        self.engine
            .execute(&self.script, args.payload(), args.bound())
    }
}

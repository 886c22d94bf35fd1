//! Rhai script engine for payload stages.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::payload::Payload;
use crate::scripting::convert::{payload_from_dynamic, payload_to_dynamic};
use crate::scripting::{CompiledScript, ScriptCache, SharedScriptCache, TRANSFORM_FN};
use rhai::{Dynamic, Engine, Scope};
use std::sync::{Arc, RwLock};

/// Script engine shared by every script stage of a graph.
pub struct ScriptEngine {
    engine: Engine,
    cache: SharedScriptCache,
}

impl ScriptEngine {
    /// Create a new script engine with default configuration
    pub fn new() -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine);
        Self {
            engine,
            cache: Arc::new(RwLock::new(ScriptCache::new())),
        }
    }

    /// Configure the Rhai engine with built-in functions and safety limits
    fn configure_engine(engine: &mut Engine) {
        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(32);
        engine.set_max_operations(10_000);
        engine.set_max_string_size(10_000);
        engine.set_max_array_size(1_000);
        engine.set_max_map_size(1_000);

        engine.register_fn("abs", |x: f64| x.abs());
        engine.register_fn("sqrt", |x: f64| x.sqrt());
        engine.register_fn("pow", |x: f64, y: f64| x.powf(y));
        engine.register_fn("exp", |x: f64| x.exp());
        engine.register_fn("ln", |x: f64| x.ln());
        engine.register_fn("floor", |x: f64| x.floor());
        engine.register_fn("ceil", |x: f64| x.ceil());
        engine.register_fn("round", |x: f64| x.round());

        // f64::clamp panics when min > max; scripts must not be able to do that.
        engine.register_fn("clamp", |x: f64, min: f64, max: f64| x.max(min).min(max));
        engine.register_fn("min", |a: f64, b: f64| a.min(b));
        engine.register_fn("max", |a: f64, b: f64| a.max(b));
        engine.register_fn("lerp", |a: f64, b: f64, t: f64| a + (b - a) * t);
        engine.register_fn(
            "map_range",
            |x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64| {
                out_min + (x - in_min) * (out_max - out_min) / (in_max - in_min)
            },
        );

        engine.register_fn("to_int", |x: f64| x as i64);
        engine.register_fn("to_float", |x: i64| x as f64);
        engine.register_fn("pi", || std::f64::consts::PI);
    }

    /// Compile a script and cache it
    pub fn compile(&self, name: &str, source: &str) -> PipelineResult<CompiledScript> {
        let mut cache = self
            .cache
            .write()
            .map_err(|e| PipelineError::Script(format!("failed to acquire cache lock: {}", e)))?;

        cache.get_or_compile(&self.engine, name, source)
    }

    /// Run a compiled script against a payload and the stage's bound arguments.
    ///
    /// The result must be a map; anything else is a contract violation.
    pub fn execute(
        &self,
        script: &CompiledScript,
        payload: &Payload,
        bound: &Payload,
    ) -> PipelineResult<Payload> {
        let payload = payload_to_dynamic(payload);
        let args = payload_to_dynamic(bound);

        let mut scope = Scope::new();
        let result = if script.has_transform() {
            self.engine
                .call_fn::<Dynamic>(&mut scope, script.ast(), TRANSFORM_FN, (payload, args))
        } else {
            scope.push_dynamic("payload", payload);
            scope.push_dynamic("args", args);
            self.engine
                .eval_ast_with_scope::<Dynamic>(&mut scope, script.ast())
        };

        let value = result.map_err(|e| {
            PipelineError::Script(format!("execution error in '{}': {}", script.name(), e))
        })?;

        payload_from_dynamic(value)
    }

    /// Compile and execute a script in one step
    pub fn eval(&self, source: &str, payload: &Payload) -> PipelineResult<Payload> {
        let script = self.compile("inline", source)?;
        self.execute(&script, payload, &Payload::new())
    }

    /// Validate a script without executing it
    pub fn validate(&self, source: &str) -> PipelineResult<()> {
        self.engine
            .compile(source)
            .map(|_| ())
            .map_err(|e| PipelineError::Script(format!("validation error: {}", e)))
    }

    /// Clear the script cache
    pub fn clear_cache(&self) -> PipelineResult<()> {
        let mut cache = self
            .cache
            .write()
            .map_err(|e| PipelineError::Script(format!("failed to acquire cache lock: {}", e)))?;
        cache.clear();
        Ok(())
    }

    pub fn cached_scripts(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("cached_scripts", &self.cached_scripts())
            .finish()
    }
}

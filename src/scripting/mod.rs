//! Rhai scripting for pipe stages.
//!
//! A script stage sees two maps in scope:
//!
//! - `payload` - the running payload handed to the stage
//! - `args` - the arguments bound to the stage
//!
//! and must evaluate to a map, which is merged over the running payload like
//! the output of any other stage. Returning anything else (including `()`) is
//! a contract violation.
//!
//! A script may instead define `fn transform(payload, args)`; when present it
//! is called in place of evaluating the script body.
//!
//! ## Example Scripts
//!
//! Doubling the primary value:
//! ```rhai
//! #{ passthrough: payload.passthrough * 2 }
//! ```
//!
//! Scaling with a bound factor and a fallback:
//! ```rhai
//! fn transform(payload, args) {
//!     let k = if "k" in args { args.k } else { 1.0 };
//!     #{ passthrough: payload.passthrough * k, scaled: true }
//! }
//! ```
//!
//! The usual math helpers are registered: `abs`, `sqrt`, `pow`, `floor`,
//! `ceil`, `round`, `min`, `max`, `clamp`, `lerp`, `map_range`, `pi()`.

mod convert;
mod engine;

pub use convert::{from_dynamic, payload_from_dynamic, payload_to_dynamic, to_dynamic};
pub use engine::ScriptEngine;

use crate::pipeline::error::{PipelineError, PipelineResult};
use rhai::{Engine, AST};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Name of the optional entry function a script may define.
pub const TRANSFORM_FN: &str = "transform";

/// A compiled stage script.
#[derive(Clone)]
pub struct CompiledScript {
    ast: AST,
    source: String,
    name: String,
    /// Whether the script defines [`TRANSFORM_FN`].
    has_transform: bool,
}

impl CompiledScript {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_transform(&self) -> bool {
        self.has_transform
    }

    pub(crate) fn ast(&self) -> &AST {
        &self.ast
    }
}

impl std::fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledScript")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("has_transform", &self.has_transform)
            .finish()
    }
}

/// Cache for compiled scripts, keyed by source text.
#[derive(Default)]
pub struct ScriptCache {
    cache: HashMap<String, CompiledScript>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached script or compile and cache it.
    ///
    /// A cache hit keeps the name the script was first compiled under.
    pub fn get_or_compile(
        &mut self,
        engine: &Engine,
        name: &str,
        source: &str,
    ) -> PipelineResult<CompiledScript> {
        if let Some(script) = self.cache.get(source) {
            return Ok(script.clone());
        }

        let ast = engine
            .compile(source)
            .map_err(|e| PipelineError::Script(format!("compile error in '{}': {}", name, e)))?;

        let has_transform = ast.iter_functions().any(|f| f.name == TRANSFORM_FN);
        let script = CompiledScript {
            ast,
            source: source.to_string(),
            name: name.to_string(),
            has_transform,
        };

        self.cache.insert(source.to_string(), script.clone());
        Ok(script)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

/// Thread-safe script cache wrapper
pub type SharedScriptCache = Arc<RwLock<ScriptCache>>;

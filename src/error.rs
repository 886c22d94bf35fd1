//! Error handling for layerpipe
//!
//! Engine failures are [`PipelineError`]s; this module wraps them together
//! with I/O and configuration failures into [`LayerPipeError`], the error
//! type of the configuration layer and the CLI.

use crate::pipeline::PipelineError;
use thiserror::Error;

/// Main error type for layerpipe operations
#[derive(Error, Debug)]
pub enum LayerPipeError {
    /// Errors raised by the graph engine
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Errors related to graph configuration files
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<LayerPipeError>,
    },
}

impl LayerPipeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        LayerPipeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The engine error underneath any context, if this is one.
    pub fn pipeline_error(&self) -> Option<&PipelineError> {
        match self {
            LayerPipeError::Pipeline(e) => Some(e),
            LayerPipeError::WithContext { source, .. } => source.pipeline_error(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for LayerPipeError {
    fn from(err: serde_json::Error) -> Self {
        LayerPipeError::Serialization(err.to_string())
    }
}

/// Result type alias for layerpipe operations
pub type Result<T> = std::result::Result<T, LayerPipeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, PipelineError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| LayerPipeError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| LayerPipeError::from(e).with_context(f()))
    }
}

impl<T> ResultExt<T> for std::io::Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| LayerPipeError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| LayerPipeError::from(e).with_context(f()))
    }
}

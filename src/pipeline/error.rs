//! Pipeline-specific error types.

use crate::pipeline::id::{LayerId, NodeId};
use thiserror::Error;

/// Errors that can occur within the pipeline system.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no pipe attached")]
    MissingPipe,

    #[error("Node '{node}' failed: {source}")]
    Node {
        node: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Stage contract violation: {0}")]
    ContractViolation(String),

    #[error("Invalid argument '{key}': expected {expected}")]
    InvalidArgument { key: String, expected: &'static str },

    #[error("Script error: {0}")]
    Script(String),

    #[error("Unknown stage function '{0}'")]
    UnknownStage(String),

    #[error("Unknown node {0:?}")]
    UnknownNode(NodeId),

    #[error("Unknown layer {0:?}")]
    UnknownLayer(LayerId),

    #[error("Node {node:?} already belongs to layer {layer:?}")]
    NodeAlreadyAssigned { node: NodeId, layer: LayerId },

    #[error("Node {0:?} is not a processing node")]
    NotProcessingNode(NodeId),

    #[error("Cannot connect layer {0:?} to itself")]
    SelfLoop(LayerId),

    #[error("Connecting {from:?} -> {to:?} would create a cycle")]
    CycleDetected { from: LayerId, to: LayerId },

    #[error("Fan-in mismatch at layer {layer:?}: expected {expected} upstream inputs, {arrived} arrived")]
    FanInMismatch {
        layer: LayerId,
        expected: usize,
        arrived: usize,
    },

    #[error("Run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Wrap this error with the name of the stage that produced it.
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        PipelineError::Stage {
            stage: stage.into(),
            source: Box::new(self),
        }
    }

    /// Wrap this error with the name of the node that produced it.
    pub fn in_node(self, node: impl Into<String>) -> Self {
        PipelineError::Node {
            node: node.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with node and stage wrappers peeled off.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            PipelineError::Node { source, .. } | PipelineError::Stage { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

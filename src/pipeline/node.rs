//! Node abstraction for the pipeline.
//!
//! The node kinds form a closed set, so they are dispatched through the
//! [`Node`] enum rather than a trait object; every operation is a plain
//! `match` the compiler can inline.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::nodes::{DataNode, MixerNode, ProcessingNode};
use crate::pipeline::payload::Payload;
use crate::pipeline::pipe::Pipe;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of a [`Node`], used in events, snapshots and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Data,
    Processing,
    Mixer,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Data => "data",
            NodeKind::Processing => "processing",
            NodeKind::Mixer => "mixer",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enum dispatch over the node kinds.
#[derive(Debug, Clone)]
pub enum Node {
    Data(DataNode),
    Processing(ProcessingNode),
    Mixer(MixerNode),
}

impl Node {
    /// Data node without a fixed payload (a pass-through or sink).
    pub fn data(name: impl Into<String>) -> Self {
        Node::Data(DataNode::new(name))
    }

    /// Data node seeded with a fixed payload.
    pub fn seeded(name: impl Into<String>, data: Payload) -> Self {
        Node::Data(DataNode::new(name).with_data(data))
    }

    /// Processing node with its pipe.
    pub fn processing(name: impl Into<String>, pipe: Pipe) -> Self {
        Node::Processing(ProcessingNode::new(name).with_pipe(pipe))
    }

    pub fn mixer(name: impl Into<String>) -> Self {
        Node::Mixer(MixerNode::new(name))
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Data(n) => n.name(),
            Node::Processing(n) => n.name(),
            Node::Mixer(n) => n.name(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Data(_) => NodeKind::Data,
            Node::Processing(_) => NodeKind::Processing,
            Node::Mixer(_) => NodeKind::Mixer,
        }
    }

    pub fn is_mixer(&self) -> bool {
        matches!(self, Node::Mixer(_))
    }

    /// Process a single payload (or none, at the entry of a run).
    ///
    /// A mixer given a single payload merges just that one. Errors carry the
    /// node name.
    pub fn process(&mut self, incoming: Option<&Payload>) -> PipelineResult<Payload> {
        let result = match self {
            Node::Data(n) => Ok(n.process(incoming)),
            Node::Processing(n) => n.process(incoming),
            Node::Mixer(n) => Ok(n.merge(incoming)),
        };
        result.map_err(|e| e.in_node(self.name()))
    }

    pub fn as_data(&self) -> Option<&DataNode> {
        match self {
            Node::Data(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_processing(&self) -> Option<&ProcessingNode> {
        match self {
            Node::Processing(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_processing_mut(&mut self) -> Option<&mut ProcessingNode> {
        match self {
            Node::Processing(n) => Some(n),
            _ => None,
        }
    }
}

impl From<DataNode> for Node {
    fn from(n: DataNode) -> Self {
        Node::Data(n)
    }
}

impl From<ProcessingNode> for Node {
    fn from(n: ProcessingNode) -> Self {
        Node::Processing(n)
    }
}

impl From<MixerNode> for Node {
    fn from(n: MixerNode) -> Self {
        Node::Mixer(n)
    }
}

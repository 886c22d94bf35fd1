//! Layer: a group of nodes at the same depth plus its edges to other layers.
//!
//! Layers live in the [`Graph`](crate::pipeline::Graph) arena and refer to
//! nodes and other layers by id. Edge lists keep insertion order; the
//! incoming list is the connect order that mixers merge in.

use crate::pipeline::id::{LayerId, NodeId};

#[derive(Debug, Clone, Default)]
pub struct Layer {
    name: String,
    nodes: Vec<NodeId>,
    outgoing: Vec<LayerId>,
    incoming: Vec<LayerId>,
}

impl Layer {
    pub(crate) fn new(name: impl Into<String>, nodes: Vec<NodeId>) -> Self {
        Self {
            name: name.into(),
            nodes,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member nodes in execution order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Downstream layers in connect order.
    pub fn outgoing(&self) -> &[LayerId] {
        &self.outgoing
    }

    /// Upstream layers in connect order.
    pub fn incoming(&self) -> &[LayerId] {
        &self.incoming
    }

    pub fn is_terminal(&self) -> bool {
        self.outgoing.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Position of `node` within the layer.
    pub fn position(&self, node: NodeId) -> Option<usize> {
        self.nodes.iter().position(|&n| n == node)
    }

    /// Record an edge to `to`. Returns `false` if it was already present.
    pub(crate) fn connect_to(&mut self, to: LayerId) -> bool {
        if self.outgoing.contains(&to) {
            return false;
        }
        self.outgoing.push(to);
        true
    }

    pub(crate) fn add_incoming(&mut self, from: LayerId) {
        if !self.incoming.contains(&from) {
            self.incoming.push(from);
        }
    }

    /// Rank of `from` among the incoming layers, in connect order.
    pub fn incoming_rank(&self, from: LayerId) -> Option<usize> {
        self.incoming.iter().position(|&l| l == from)
    }
}

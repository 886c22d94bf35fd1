//! Read-only structural view of a graph and its renderers.
//!
//! A [`TopologySnapshot`] lists layers in depth order with their nodes, plus
//! the layer-to-layer edges. It carries everything a visualizer needs and
//! nothing that affects execution. Rendering is implemented by
//! [`TopologyExporter`] for Graphviz DOT, Mermaid and JSON.

use crate::pipeline::id::{LayerId, NodeId};
use crate::pipeline::node::NodeKind;
use serde::Serialize;

/// Snapshot of a single node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// Stage names of a processing node's pipe, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<String>,
}

/// Snapshot of a single layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSnapshot {
    pub id: LayerId,
    pub name: String,
    /// Longest distance from a layer without inputs.
    pub depth: usize,
    pub nodes: Vec<NodeSnapshot>,
}

/// Snapshot of a layer-to-layer edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeSnapshot {
    pub from: LayerId,
    pub to: LayerId,
}

/// Complete pipeline topology snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopologySnapshot {
    pub layers: Vec<LayerSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

impl TopologySnapshot {
    pub fn layer(&self, id: LayerId) -> Option<&LayerSnapshot> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Node-level edges: every node of `from` feeds every node of `to`.
    pub fn node_edges(&self) -> Vec<(NodeId, NodeId)> {
        let mut edges = Vec::new();
        for edge in &self.edges {
            let (Some(from), Some(to)) = (self.layer(edge.from), self.layer(edge.to)) else {
                continue;
            };
            for a in &from.nodes {
                for b in &to.nodes {
                    edges.push((a.id, b.id));
                }
            }
        }
        edges
    }
}

/// Rendering of a topology snapshot to text formats.
pub trait TopologyExporter {
    /// Graphviz DOT, one cluster per layer.
    fn to_dot(&self) -> String;

    /// Mermaid flowchart, one subgraph per layer.
    fn to_mermaid(&self) -> String;

    fn to_json(&self) -> Result<String, serde_json::Error>;
}

impl TopologyExporter for TopologySnapshot {
    fn to_dot(&self) -> String {
        let mut output = String::from("digraph layerpipe {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str("  node [shape=box, style=rounded];\n");

        for layer in &self.layers {
            output.push_str(&format!("  subgraph cluster_{} {{\n", layer.id.0));
            output.push_str(&format!("    label=\"{}\";\n", escape_dot(&layer.name)));
            for node in &layer.nodes {
                let (shape, color) = match node.kind {
                    NodeKind::Data => ("box", "lightblue"),
                    NodeKind::Processing => ("box", "lightgreen"),
                    NodeKind::Mixer => ("diamond", "lightcoral"),
                };
                output.push_str(&format!(
                    "    n{} [label=\"{}\", shape={}, fillcolor={}, style=\"rounded,filled\"];\n",
                    node.id.0,
                    node_label(node, "\\n", escape_dot),
                    shape,
                    color
                ));
            }
            output.push_str("  }\n");
        }

        for (from, to) in self.node_edges() {
            output.push_str(&format!("  n{} -> n{};\n", from.0, to.0));
        }

        output.push_str("}\n");
        output
    }

    fn to_mermaid(&self) -> String {
        let mut diagram = String::from("flowchart LR\n");

        for layer in &self.layers {
            diagram.push_str(&format!(
                "    subgraph L{}[\"{}\"]\n",
                layer.id.0,
                escape_mermaid(&layer.name)
            ));
            for node in &layer.nodes {
                let label = node_label(node, "<br/>", escape_mermaid);
                let shape = match node.kind {
                    NodeKind::Data => format!("n{}[/\"{}\"/]", node.id.0, label),
                    NodeKind::Processing => format!("n{}[\"{}\"]", node.id.0, label),
                    NodeKind::Mixer => format!("n{}{{{{\"{}\"}}}}", node.id.0, label),
                };
                diagram.push_str(&format!("        {shape}\n"));
            }
            diagram.push_str("    end\n");
        }

        for (from, to) in self.node_edges() {
            diagram.push_str(&format!("    n{} --> n{}\n", from.0, to.0));
        }

        diagram
    }

    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn node_label(node: &NodeSnapshot, line_break: &str, escape: fn(&str) -> String) -> String {
    let mut label = escape(&node.name);
    if !node.stages.is_empty() {
        label.push_str(line_break);
        label.push_str(&escape(&node.stages.join(" | ")));
    }
    label
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_mermaid(s: &str) -> String {
    s.replace('"', "#quot;").replace('\n', " ")
}

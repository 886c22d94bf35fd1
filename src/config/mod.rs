//! Graph configuration files
//!
//! A graph can be declared in TOML or JSON and turned into a runnable
//! [`Graph`]. The format mirrors the engine model: named layers holding
//! nodes, plus named layer-to-layer connections.
//!
//! # Example
//!
//! ```toml
//! name = "example"
//! entry = "input"
//!
//! [input]
//! passthrough = 10
//!
//! [[layers]]
//! name = "input"
//! [[layers.nodes]]
//! name = "InputNode"
//! kind = "data"
//!
//! [[layers]]
//! name = "math"
//! [[layers.nodes]]
//! name = "AdderNode"
//! kind = "processing"
//! stages = [{ function = "add_value", args = { value = 5 } }]
//!
//! [[connections]]
//! from = "input"
//! to = "math"
//! ```
//!
//! ```ignore
//! use layerpipe::config::GraphConfig;
//!
//! let mut built = GraphConfig::load("demos/arithmetic.toml")?.build()?;
//! let report = built.run()?;
//! ```

use crate::error::{LayerPipeError, Result};
use crate::pipeline::{
    Graph, LayerId, Node, NodeId, NodeKind, Payload, Pipe, RunObserver, RunReport, ScriptStage,
    Stage, StageRegistry,
};
use crate::scripting::ScriptEngine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Top-level graph declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub name: String,

    /// Layer the run starts at (defaults to the first declared layer)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,

    /// Payload delivered to the entry layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Payload>,

    #[serde(default)]
    pub layers: Vec<LayerConfig>,

    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

/// A named layer and its nodes, in execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub kind: NodeKind,

    /// Fixed payload of a data node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,

    /// Pipe defaults of a processing node
    #[serde(default, skip_serializing_if = "Payload::is_empty")]
    pub defaults: Payload,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<StageConfig>,

    /// Record a per-stage trace in the output payload
    #[serde(default)]
    pub trace: bool,
}

/// One stage: a registered `function` or an inline Rhai `script`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    /// Display name; defaults to the function name or `script`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Arguments bound to the stage
    #[serde(default, skip_serializing_if = "Payload::is_empty")]
    pub args: Payload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub from: String,
    pub to: String,
}

/// A graph built from a [`GraphConfig`], ready to run.
#[derive(Debug)]
pub struct BuiltGraph {
    pub name: String,
    pub graph: Graph,
    pub entry: LayerId,
    pub input: Option<Payload>,
    pub layer_ids: BTreeMap<String, LayerId>,
    pub node_ids: BTreeMap<String, NodeId>,
}

impl BuiltGraph {
    /// Run the configured input from the configured entry.
    pub fn run(&mut self) -> Result<RunReport> {
        let input = self.input.clone();
        self.run_with_input(input)
    }

    /// Run `input` from the configured entry.
    pub fn run_with_input(&mut self, input: Option<Payload>) -> Result<RunReport> {
        Ok(self.graph.run(self.entry, input)?)
    }

    pub fn set_observer(&mut self, observer: Box<dyn RunObserver>) {
        self.graph.set_observer(observer);
    }

    pub fn layer(&self, name: &str) -> Option<LayerId> {
        self.layer_ids.get(name).copied()
    }

    pub fn node(&self, name: &str) -> Option<NodeId> {
        self.node_ids.get(name).copied()
    }
}

impl GraphConfig {
    /// Load a graph file, choosing the format from the extension
    /// (`.json` is JSON, anything else is TOML).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LayerPipeError::Config(format!("Failed to read graph file {:?}: {}", path, e))
        })?;

        let parsed = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        };
        parsed.map_err(|e| e.with_context(format!("Failed to parse graph file {:?}", path)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| LayerPipeError::Config(e.to_string()))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| LayerPipeError::Config(e.to_string()))
    }

    /// Save as TOML or JSON depending on the extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            _ => toml::to_string_pretty(self).map_err(|e| {
                LayerPipeError::Serialization(format!("Failed to serialize graph: {}", e))
            })?,
        };

        std::fs::write(path, content).map_err(|e| {
            LayerPipeError::Config(format!("Failed to write graph file {:?}: {}", path, e))
        })
    }

    /// Build with the built-in stages and a fresh script engine.
    pub fn build(&self) -> Result<BuiltGraph> {
        self.build_with(&StageRegistry::with_builtins(), Arc::new(ScriptEngine::new()))
    }

    /// Build, resolving `function` stages through `registry` and compiling
    /// `script` stages on `engine`.
    pub fn build_with(
        &self,
        registry: &StageRegistry,
        engine: Arc<ScriptEngine>,
    ) -> Result<BuiltGraph> {
        let mut graph = Graph::new();
        let mut layer_ids = BTreeMap::new();
        let mut node_ids = BTreeMap::new();

        for layer in &self.layers {
            if layer_ids.contains_key(&layer.name) {
                return Err(LayerPipeError::Config(format!(
                    "duplicate layer '{}'",
                    layer.name
                )));
            }

            let mut members = Vec::with_capacity(layer.nodes.len());
            for node in &layer.nodes {
                if node_ids.contains_key(&node.name) {
                    return Err(LayerPipeError::Config(format!(
                        "duplicate node '{}'",
                        node.name
                    )));
                }
                let built = build_node(node, registry, &engine)
                    .map_err(|e| e.with_context(format!("node '{}'", node.name)))?;
                let id = graph.add_node(built);
                node_ids.insert(node.name.clone(), id);
                members.push(id);
            }

            let id = graph.add_named_layer(layer.name.as_str(), members)?;
            layer_ids.insert(layer.name.clone(), id);
        }

        let lookup = |name: &str| {
            layer_ids
                .get(name)
                .copied()
                .ok_or_else(|| LayerPipeError::Config(format!("unknown layer '{}'", name)))
        };

        for connection in &self.connections {
            let from = lookup(&connection.from)?;
            let to = lookup(&connection.to)?;
            graph.connect(from, to).map_err(|e| {
                LayerPipeError::from(e).with_context(format!(
                    "connection '{}' -> '{}'",
                    connection.from, connection.to
                ))
            })?;
        }

        let entry = match &self.entry {
            Some(name) => lookup(name)?,
            None if !self.layers.is_empty() => LayerId(0),
            None => return Err(LayerPipeError::Config("graph has no layers".to_string())),
        };

        tracing::debug!(
            "Built graph '{}': {} layers, {} nodes",
            self.name,
            graph.layer_count(),
            graph.node_count()
        );

        Ok(BuiltGraph {
            name: self.name.clone(),
            graph,
            entry,
            input: self.input.clone(),
            layer_ids,
            node_ids,
        })
    }
}

fn build_node(
    config: &NodeConfig,
    registry: &StageRegistry,
    engine: &Arc<ScriptEngine>,
) -> Result<Node> {
    check_node_fields(config)?;
    match config.kind {
        NodeKind::Data => Ok(match &config.data {
            Some(data) => Node::seeded(config.name.as_str(), data.clone()),
            None => Node::data(config.name.as_str()),
        }),
        NodeKind::Processing => {
            let mut pipe = Pipe::with_defaults(config.defaults.clone());
            pipe.set_trace(config.trace);
            for stage in &config.stages {
                pipe.push(build_stage(stage, registry, engine)?);
            }
            Ok(Node::processing(config.name.as_str(), pipe))
        }
        NodeKind::Mixer => Ok(Node::mixer(config.name.as_str())),
    }
}

/// Reject fields the node kind has no use for.
fn check_node_fields(config: &NodeConfig) -> Result<()> {
    let mut unused = Vec::new();
    if config.kind != NodeKind::Processing {
        if !config.stages.is_empty() {
            unused.push("stages");
        }
        if !config.defaults.is_empty() {
            unused.push("defaults");
        }
        if config.trace {
            unused.push("trace");
        }
    }
    if config.kind != NodeKind::Data && config.data.is_some() {
        unused.push("data");
    }

    if unused.is_empty() {
        Ok(())
    } else {
        Err(LayerPipeError::Config(format!(
            "{} node '{}' does not take {}",
            config.kind,
            config.name,
            unused.join(", ")
        )))
    }
}

fn build_stage(
    config: &StageConfig,
    registry: &StageRegistry,
    engine: &Arc<ScriptEngine>,
) -> Result<Stage> {
    let stage = match (&config.function, &config.script) {
        (Some(function), None) => {
            let name = config.name.as_deref().unwrap_or(function.as_str());
            registry.stage(name, function, config.args.clone())?
        }
        (None, Some(source)) => {
            let name = config.name.as_deref().unwrap_or("script");
            let script = ScriptStage::compile(Arc::clone(engine), name, source)?;
            Stage::from_arc(name, Arc::new(script)).with_bound(config.args.clone())
        }
        (Some(_), Some(_)) => {
            return Err(LayerPipeError::Config(
                "stage sets both 'function' and 'script'".to_string(),
            ))
        }
        (None, None) => {
            return Err(LayerPipeError::Config(
                "stage needs a 'function' or a 'script'".to_string(),
            ))
        }
    };
    Ok(stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{PipelineError, Value, PASSTHROUGH};

    const LINEAR: &str = r##"
        name = "linear"
        entry = "input"

        [input]
        passthrough = 10

        [[layers]]
        name = "input"
        [[layers.nodes]]
        name = "Input"
        kind = "data"

        [[layers]]
        name = "math"
        [[layers.nodes]]
        name = "Adder"
        kind = "processing"
        stages = [
            { function = "add_value", args = { value = 5 } },
            { script = "#{ passthrough: payload.passthrough * 2 }", name = "double" },
        ]

        [[connections]]
        from = "input"
        to = "math"
    "##;

    #[test]
    fn test_parse_toml() {
        let config = GraphConfig::from_toml_str(LINEAR).unwrap();
        assert_eq!(config.name, "linear");
        assert_eq!(config.layers.len(), 2);
        assert_eq!(config.layers[1].nodes[0].kind, NodeKind::Processing);
        assert_eq!(config.layers[1].nodes[0].stages.len(), 2);
        assert_eq!(
            config.connections,
            vec![ConnectionConfig {
                from: "input".into(),
                to: "math".into()
            }]
        );
    }

    #[test]
    fn test_build_and_run() {
        let mut built = GraphConfig::from_toml_str(LINEAR).unwrap().build().unwrap();
        assert_eq!(built.layer("math"), Some(LayerId(1)));
        assert_eq!(built.node("Adder"), Some(NodeId(1)));

        let report = built.run().unwrap();
        assert_eq!(
            report.final_payload().and_then(|p| p.get(PASSTHROUGH)),
            Some(&Value::Int(30))
        );

        let stages: Vec<String> = built
            .graph
            .topology()
            .layers[1]
            .nodes[0]
            .stages
            .clone();
        assert_eq!(stages, vec!["add_value", "double"]);
    }

    #[test]
    fn test_entry_defaults_to_first_layer() {
        let mut config = GraphConfig::from_toml_str(LINEAR).unwrap();
        config.entry = None;
        assert_eq!(config.build().unwrap().entry, LayerId(0));
    }

    #[test]
    fn test_unknown_layer_in_connection() {
        let mut config = GraphConfig::from_toml_str(LINEAR).unwrap();
        config.connections.push(ConnectionConfig {
            from: "math".into(),
            to: "nowhere".into(),
        });
        let err = config.build().unwrap_err();
        assert!(err.to_string().contains("unknown layer 'nowhere'"));
    }

    #[test]
    fn test_unknown_stage_function() {
        let mut config = GraphConfig::from_toml_str(LINEAR).unwrap();
        config.layers[1].nodes[0].stages[0].function = Some("cube_value".into());
        let err = config.build().unwrap_err();
        assert!(matches!(
            err.pipeline_error(),
            Some(PipelineError::UnknownStage(name)) if name == "cube_value"
        ));
    }

    #[test]
    fn test_stage_needs_exactly_one_source() {
        let mut config = GraphConfig::from_toml_str(LINEAR).unwrap();
        config.layers[1].nodes[0].stages[0].script = Some("payload".into());
        assert!(config.build().is_err());

        config.layers[1].nodes[0].stages[0] = StageConfig::default();
        assert!(config.build().is_err());
    }

    #[test]
    fn test_script_compile_error_is_config_time() {
        let mut config = GraphConfig::from_toml_str(LINEAR).unwrap();
        config.layers[1].nodes[0].stages[1].script = Some("let x = ;".into());
        let err = config.build().unwrap_err();
        assert!(matches!(err.pipeline_error(), Some(PipelineError::Script(_))));
    }

    #[test]
    fn test_fields_foreign_to_node_kind_are_rejected() {
        let mut config = GraphConfig::from_toml_str(LINEAR).unwrap();
        config.layers[0].nodes[0].stages = config.layers[1].nodes[0].stages.clone();
        config.layers[0].nodes[0].trace = true;
        let err = config.build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: data node 'Input' does not take stages, trace"
        );

        let mut config = GraphConfig::from_toml_str(LINEAR).unwrap();
        config.layers[1].nodes[0].data = Some(Payload::from([("passthrough", 1)]));
        let err = config.build().unwrap_err();
        assert!(err.to_string().contains("processing node 'Adder' does not take data"));

        let mut config = GraphConfig::from_toml_str(LINEAR).unwrap();
        config.layers[1].nodes.push(NodeConfig {
            name: "Mixer".into(),
            kind: NodeKind::Mixer,
            data: None,
            defaults: Payload::from([("value", 2)]),
            stages: Vec::new(),
            trace: false,
        });
        let err = config.build().unwrap_err();
        assert!(err.to_string().contains("mixer node 'Mixer' does not take defaults"));
    }

    #[test]
    fn test_cycle_in_connections() {
        let mut config = GraphConfig::from_toml_str(LINEAR).unwrap();
        config.connections.push(ConnectionConfig {
            from: "math".into(),
            to: "input".into(),
        });
        let err = config.build().unwrap_err();
        assert!(matches!(
            err.pipeline_error(),
            Some(PipelineError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_json_format() {
        let json = r#"{
            "name": "json",
            "layers": [
                { "name": "only", "nodes": [
                    { "name": "Seed", "kind": "data", "data": { "passthrough": 4 } }
                ] }
            ]
        }"#;
        let mut built = GraphConfig::from_json_str(json).unwrap().build().unwrap();
        let report = built.run().unwrap();
        assert_eq!(
            report.final_payload(),
            Some(&Payload::from([(PASSTHROUGH, 4)]))
        );
    }

    #[test]
    fn test_empty_graph_is_an_error() {
        assert!(GraphConfig::default().build().is_err());
    }
}

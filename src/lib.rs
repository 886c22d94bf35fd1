//! layerpipe - layered DAG payload engine
//!
//! A payload (a map of named values) flows through a graph of layers. Each
//! layer groups nodes; layers are connected by directed edges and run in
//! topological order from an entry layer.
//!
//! # Features
//!
//! - **Pipes**: ordered stage chains, from built-in arithmetic functions,
//!   Rust closures or Rhai scripts
//! - **Nodes**: data (seed / passthrough), processing (runs a pipe) and
//!   mixer (fan-in merge with an all-inputs barrier)
//! - **Observation**: a per-node event side channel (`tracing` or a
//!   crossbeam channel)
//! - **Configuration**: graphs declared in TOML or JSON
//! - **Rendering**: topology export to DOT, Mermaid and JSON
//!
//! # Modules
//!
//! - [`pipeline`]: graph engine (payloads, pipes, nodes, layers, scheduling)
//! - [`scripting`]: Rhai engine backing script stages
//! - [`config`]: graph file format and graph building
//! - [`error`]: crate-level error type
//!
//! # Example
//!
//! ```ignore
//! use layerpipe::pipeline::{Graph, Node, Payload, Pipe, stages::builtin};
//!
//! let mut graph = Graph::new();
//! let input = graph.add_node(Node::data("Input"));
//! let adder = graph.add_node(Node::processing("Adder", Pipe::new().then("add", builtin::add_value)));
//! let l0 = graph.add_layer([input])?;
//! let l1 = graph.add_layer([adder])?;
//! graph.connect(l0, l1)?;
//!
//! let report = graph.run(l0, Some(Payload::from([("passthrough", 10)])))?;
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod scripting;

pub use config::{BuiltGraph, GraphConfig};
pub use error::{LayerPipeError, Result, ResultExt};
pub use pipeline::{Graph, LayerId, Node, NodeId, Payload, Pipe, PipelineError, RunReport, Value};
pub use scripting::ScriptEngine;

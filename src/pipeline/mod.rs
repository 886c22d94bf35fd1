//! Layered DAG payload engine.
//!
//! A payload (a string-keyed map of values) flows through layers of nodes.
//! Processing nodes run a [`Pipe`] of stages, data nodes seed or pass through
//! payloads, and mixer nodes merge everything delivered to them.
//!
//! # Architecture
//!
//! ```text
//! [Input] ──► [Adder, Multiplier] ──► [Subtractor, Squarer] ──► [Mixer] ──► [Output]
//! ```
//!
//! # Design
//!
//! - **Arena** - `Graph` owns nodes and layers; `NodeId` / `LayerId` index into it.
//! - **Enum dispatch** - `Node` is a closed enum over the three node kinds.
//! - **Deterministic** - layers run in a topological order computed per run,
//!   nodes in insertion order, mixers merge in connect order.
//! - **Fail fast** - cycles are rejected at connect time and a mixer whose
//!   inputs cannot all arrive fails with `FanInMismatch` instead of waiting.
//! - **Side channel** - every node invocation is reported to a `RunObserver`.

pub mod compiler;
pub mod error;
pub mod executor;
pub mod id;
pub mod layer;
pub mod node;
pub mod nodes;
pub mod observer;
pub mod payload;
pub mod pipe;
pub mod stages;
pub mod topology;

pub use compiler::{LayerCompiler, PlanStats, RunPlan};
pub use error::{PipelineError, PipelineResult};
pub use executor::{CancelToken, Graph, NodeOutput, RunReport};
pub use id::{LayerId, NodeId};
pub use layer::Layer;
pub use node::{Node, NodeKind};
pub use nodes::{DataNode, MixerNode, ProcessingNode};
pub use observer::{ChannelObserver, NodeEvent, NoopObserver, RunObserver, TracingObserver};
pub use payload::{Payload, Value, PASSTHROUGH, TRACE};
pub use pipe::{Pipe, Stage, StageArgs, StageFn};
pub use stages::{ScriptStage, StageRegistry};
pub use topology::{EdgeSnapshot, LayerSnapshot, NodeSnapshot, TopologyExporter, TopologySnapshot};

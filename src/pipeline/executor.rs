//! Graph arena and run scheduler.
//!
//! A run propagates one payload from an entry layer through every layer
//! reachable from it. Each run:
//! 1. Compile a [`RunPlan`]: reachable layers in topological order.
//! 2. Deliver the input payload to the entry layer.
//! 3. Process layers in plan order. Ordinary nodes process each delivered
//!    payload independently; mixer nodes wait for every configured upstream
//!    `(layer, node)` pair and merge all deliveries at once.
//! 4. Forward every produced payload to every downstream layer.
//! 5. Record the outputs of terminal layers in the [`RunReport`].
//!
//! All per-run state (inboxes, fan-in bookkeeping) lives on the stack of
//! [`Graph::run_with_cancel`], so nothing leaks between runs.

use crate::pipeline::compiler::{LayerCompiler, RunPlan};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::{LayerId, NodeId};
use crate::pipeline::layer::Layer;
use crate::pipeline::node::{Node, NodeKind};
use crate::pipeline::observer::{NodeEvent, NoopObserver, RunObserver};
use crate::pipeline::payload::Payload;
use crate::pipeline::pipe::Pipe;
use crate::pipeline::topology::{EdgeSnapshot, LayerSnapshot, NodeSnapshot, TopologySnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Cooperative cancellation flag, checked before each layer runs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One activation of a node in a terminal layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeOutput {
    pub layer: LayerId,
    pub node: NodeId,
    pub name: String,
    pub payload: Payload,
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub entry: LayerId,
    /// Terminal node activations, in execution order.
    pub outputs: Vec<NodeOutput>,
    /// Node invocations across all layers.
    pub invocations: usize,
    /// Layers in the order they ran.
    pub layers_run: Vec<LayerId>,
    /// Layers not reachable from the entry.
    pub skipped_layers: Vec<LayerId>,
    pub started_at: DateTime<Utc>,
    pub elapsed_us: u64,
}

impl RunReport {
    /// The last terminal output of the run.
    pub fn final_payload(&self) -> Option<&Payload> {
        self.outputs.last().map(|o| &o.payload)
    }

    /// Terminal outputs produced by `node`.
    pub fn outputs_of(&self, node: NodeId) -> impl Iterator<Item = &Payload> {
        self.outputs
            .iter()
            .filter(move |o| o.node == node)
            .map(|o| &o.payload)
    }
}

/// A node and the layer it belongs to.
struct NodeSlot {
    node: Node,
    layer: Option<LayerId>,
}

/// A payload waiting in a layer's inbox, tagged with its producer.
#[derive(Debug, Clone)]
struct Delivery {
    from_layer: LayerId,
    from_node: NodeId,
    payload: Payload,
}

/// Arena owning all nodes and layers.
///
/// Nodes and layers are referred to by [`NodeId`] / [`LayerId`], which index
/// directly into the arena.
pub struct Graph {
    nodes: Vec<NodeSlot>,
    layers: Vec<Layer>,
    observer: Box<dyn RunObserver>,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            layers: Vec::new(),
            observer: Box::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: impl RunObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn set_observer(&mut self, observer: Box<dyn RunObserver>) {
        self.observer = observer;
    }

    // ── Graph building ──

    /// Add a node to the arena. Returns its NodeId.
    pub fn add_node(&mut self, node: impl Into<Node>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeSlot {
            node: node.into(),
            layer: None,
        });
        id
    }

    /// Group nodes into a new layer named after its id.
    pub fn add_layer(&mut self, nodes: impl IntoIterator<Item = NodeId>) -> PipelineResult<LayerId> {
        let name = format!("layer{}", self.layers.len());
        self.add_named_layer(name, nodes)
    }

    /// Group nodes into a new layer. A node may belong to one layer only.
    pub fn add_named_layer(
        &mut self,
        name: impl Into<String>,
        nodes: impl IntoIterator<Item = NodeId>,
    ) -> PipelineResult<LayerId> {
        let id = LayerId(self.layers.len() as u32);
        let nodes: Vec<NodeId> = nodes.into_iter().collect();

        let mut seen = BTreeSet::new();
        for &node in &nodes {
            let slot = self
                .nodes
                .get(node.index())
                .ok_or(PipelineError::UnknownNode(node))?;
            if let Some(layer) = slot.layer {
                return Err(PipelineError::NodeAlreadyAssigned { node, layer });
            }
            if !seen.insert(node) {
                return Err(PipelineError::NodeAlreadyAssigned { node, layer: id });
            }
        }

        for &node in &nodes {
            self.nodes[node.index()].layer = Some(id);
        }
        let layer = Layer::new(name, nodes);
        tracing::debug!(
            "Added layer {} '{}' with {} nodes",
            id,
            layer.name(),
            layer.nodes().len()
        );
        self.layers.push(layer);
        Ok(id)
    }

    /// Connect `from` to `to`. Returns `false` if the edge already existed.
    ///
    /// Self-loops and edges that would close a cycle are rejected.
    pub fn connect(&mut self, from: LayerId, to: LayerId) -> PipelineResult<bool> {
        self.check_layer(from)?;
        self.check_layer(to)?;
        if from == to {
            return Err(PipelineError::SelfLoop(from));
        }
        if self.layers[from.index()].outgoing().contains(&to) {
            return Ok(false);
        }
        if LayerCompiler::would_create_cycle(&self.layers, from, to) {
            return Err(PipelineError::CycleDetected { from, to });
        }

        self.layers[from.index()].connect_to(to);
        self.layers[to.index()].add_incoming(from);
        tracing::debug!("Connected layer {} -> {}", from, to);
        Ok(true)
    }

    /// Connect `from` to each of `targets`, in order.
    pub fn connect_all(&mut self, from: LayerId, targets: &[LayerId]) -> PipelineResult<()> {
        for &to in targets {
            self.connect(from, to)?;
        }
        Ok(())
    }

    /// Attach (or replace) the pipe of a processing node.
    pub fn set_pipe(&mut self, node: NodeId, pipe: Pipe) -> PipelineResult<()> {
        let slot = self
            .nodes
            .get_mut(node.index())
            .ok_or(PipelineError::UnknownNode(node))?;
        let processing = slot
            .node
            .as_processing_mut()
            .ok_or(PipelineError::NotProcessingNode(node))?;
        processing.set_pipe(pipe);
        Ok(())
    }

    fn check_layer(&self, id: LayerId) -> PipelineResult<()> {
        if id.index() < self.layers.len() {
            Ok(())
        } else {
            Err(PipelineError::UnknownLayer(id))
        }
    }

    // ── Inspection ──

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).map(|slot| &slot.node)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.index())
    }

    /// Layer a node belongs to, if any.
    pub fn layer_of(&self, node: NodeId) -> Option<LayerId> {
        self.nodes.get(node.index()).and_then(|slot| slot.layer)
    }

    /// First node with the given name.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|slot| slot.node.name() == name)
            .map(|i| NodeId(i as u32))
    }

    /// First layer with the given name.
    pub fn find_layer(&self, name: &str) -> Option<LayerId> {
        self.layers
            .iter()
            .position(|layer| layer.name() == name)
            .map(|i| LayerId(i as u32))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, slot)| (NodeId(i as u32), &slot.node))
    }

    pub fn layers(&self) -> impl Iterator<Item = (LayerId, &Layer)> {
        self.layers
            .iter()
            .enumerate()
            .map(|(i, layer)| (LayerId(i as u32), layer))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Forward edges of a node: every node in every layer its layer feeds.
    pub fn successors(&self, node: NodeId) -> Vec<NodeId> {
        let Some(layer) = self.layer_of(node).and_then(|l| self.layer(l)) else {
            return Vec::new();
        };
        layer
            .outgoing()
            .iter()
            .flat_map(|&next| self.layers[next.index()].nodes().iter().copied())
            .collect()
    }

    /// Payloads a data node has emitted across runs, oldest first.
    pub fn data_history(&self, node: NodeId) -> Option<&[Payload]> {
        self.node(node)?.as_data().map(|d| d.history())
    }

    /// Forget the history of every data node.
    pub fn clear_history(&mut self) {
        for slot in &mut self.nodes {
            if let Node::Data(data) = &mut slot.node {
                data.clear_history();
            }
        }
    }

    /// Snapshot of every layer, ordered by depth then id.
    pub fn topology(&self) -> TopologySnapshot {
        let depths = LayerCompiler::depths(&self.layers);
        let mut order: Vec<LayerId> = (0..self.layers.len()).map(|i| LayerId(i as u32)).collect();
        order.sort_by_key(|l| (depths[l.index()], *l));
        self.snapshot(&order, &depths)
    }

    /// Snapshot of the given layers, in the given order.
    ///
    /// Edges to layers outside the list are left out. Unknown ids are ignored.
    pub fn topology_of(&self, layers: &[LayerId]) -> TopologySnapshot {
        let depths = LayerCompiler::depths(&self.layers);
        let order: Vec<LayerId> = layers
            .iter()
            .copied()
            .filter(|l| l.index() < self.layers.len())
            .collect();
        self.snapshot(&order, &depths)
    }

    fn snapshot(&self, order: &[LayerId], depths: &[usize]) -> TopologySnapshot {
        let included: BTreeSet<LayerId> = order.iter().copied().collect();

        let layers = order
            .iter()
            .map(|&id| {
                let layer = &self.layers[id.index()];
                LayerSnapshot {
                    id,
                    name: layer.name().to_string(),
                    depth: depths[id.index()],
                    nodes: layer
                        .nodes()
                        .iter()
                        .map(|&node_id| {
                            let node = &self.nodes[node_id.index()].node;
                            NodeSnapshot {
                                id: node_id,
                                name: node.name().to_string(),
                                kind: node.kind(),
                                stages: node
                                    .as_processing()
                                    .and_then(|p| p.pipe())
                                    .map(|pipe| pipe.stage_names().map(str::to_string).collect())
                                    .unwrap_or_default(),
                            }
                        })
                        .collect(),
                }
            })
            .collect();

        let edges = order
            .iter()
            .flat_map(|&from| {
                self.layers[from.index()]
                    .outgoing()
                    .iter()
                    .filter(|to| included.contains(to))
                    .map(move |&to| EdgeSnapshot { from, to })
            })
            .collect();

        TopologySnapshot { layers, edges }
    }

    // ── Running ──

    /// Compile the run plan for `entry` without running it.
    pub fn plan(&self, entry: LayerId) -> PipelineResult<RunPlan> {
        let layers = &self.layers;
        let nodes = &self.nodes;
        LayerCompiler::compile(
            layers,
            entry,
            |l| {
                layers[l.index()]
                    .nodes()
                    .iter()
                    .any(|n| nodes[n.index()].node.is_mixer())
            },
            |incoming| incoming.iter().map(|l| layers[l.index()].nodes().len()).sum(),
        )
    }

    /// Run `input` through the graph starting at `entry`.
    pub fn run(&mut self, entry: LayerId, input: Option<Payload>) -> PipelineResult<RunReport> {
        self.run_with_cancel(entry, input, &CancelToken::new())
    }

    /// Like [`Graph::run`], stopping with [`PipelineError::Cancelled`] once
    /// `cancel` is set.
    pub fn run_with_cancel(
        &mut self,
        entry: LayerId,
        input: Option<Payload>,
        cancel: &CancelToken,
    ) -> PipelineResult<RunReport> {
        let plan = self.plan(entry)?;

        for &skipped in &plan.skipped {
            tracing::warn!(
                "Layer '{}' ({}) is not reachable from entry {} and will not run",
                self.layers[skipped.index()].name(),
                skipped,
                entry
            );
        }

        tracing::info!(
            "Run started at layer {}: {} of {} layers scheduled",
            entry,
            plan.stats.scheduled_layers,
            plan.stats.total_layers
        );

        let started_at = Utc::now();
        let start = Instant::now();
        let result = self.execute(&plan, input.as_ref(), cancel);

        match result {
            Ok((outputs, invocations)) => {
                let elapsed_us = start.elapsed().as_micros() as u64;
                tracing::info!(
                    "Run finished: {} invocations, {} terminal outputs in {} us",
                    invocations,
                    outputs.len(),
                    elapsed_us
                );
                Ok(RunReport {
                    entry,
                    outputs,
                    invocations,
                    layers_run: plan.order,
                    skipped_layers: plan.skipped,
                    started_at,
                    elapsed_us,
                })
            }
            Err(e) => {
                tracing::error!("Run from layer {} failed: {}", entry, e);
                Err(e)
            }
        }
    }

    fn execute(
        &mut self,
        plan: &RunPlan,
        input: Option<&Payload>,
        cancel: &CancelToken,
    ) -> PipelineResult<(Vec<NodeOutput>, usize)> {
        let Graph {
            nodes,
            layers,
            observer,
        } = self;
        let layers: &[Layer] = layers;

        let mut inboxes: Vec<Vec<Delivery>> = vec![Vec::new(); layers.len()];
        let mut outputs = Vec::new();
        let mut invocations = 0usize;
        // Data node history, committed only when the whole run succeeds.
        let mut emitted: Vec<(NodeId, Payload)> = Vec::new();

        for &layer_id in &plan.order {
            if cancel.is_cancelled() {
                tracing::info!("Run cancelled before layer {}", layer_id);
                return Err(PipelineError::Cancelled);
            }

            let layer = &layers[layer_id.index()];
            let mut deliveries = std::mem::take(&mut inboxes[layer_id.index()]);
            let is_entry = layer_id == plan.entry;

            tracing::debug!(
                "Processing layer {} '{}' with {} deliveries",
                layer_id,
                layer.name(),
                if is_entry { 1 } else { deliveries.len() }
            );

            // Mixers merge in (incoming connect order, producer position) order.
            if !is_entry {
                deliveries.sort_by_key(|d| {
                    (
                        layer.incoming_rank(d.from_layer),
                        layers[d.from_layer.index()].position(d.from_node),
                    )
                });
            }

            let mut produced: Vec<Delivery> = Vec::new();

            for &node_id in layer.nodes() {
                let node = &mut nodes[node_id.index()].node;

                let activations: Vec<(Vec<Payload>, Payload)> = if is_entry {
                    let output = node.process(input)?;
                    vec![(input.cloned().into_iter().collect(), output)]
                } else if let Node::Mixer(mixer) = node {
                    check_barrier(layers, layer_id, &deliveries)?;
                    let merged = mixer.merge(deliveries.iter().map(|d| &d.payload));
                    let inputs = deliveries.iter().map(|d| d.payload.clone()).collect();
                    vec![(inputs, merged)]
                } else {
                    let mut activations = Vec::with_capacity(deliveries.len());
                    for delivery in &deliveries {
                        let output = node.process(Some(&delivery.payload))?;
                        activations.push((vec![delivery.payload.clone()], output));
                    }
                    activations
                };

                for (inputs, output) in activations {
                    invocations += 1;
                    observer.record(&NodeEvent {
                        layer: layer_id,
                        node: node_id,
                        name: node.name().to_string(),
                        kind: node.kind(),
                        inputs,
                        output: output.clone(),
                    });

                    if node.kind() == NodeKind::Data {
                        emitted.push((node_id, output.clone()));
                    }

                    if layer.is_terminal() {
                        outputs.push(NodeOutput {
                            layer: layer_id,
                            node: node_id,
                            name: node.name().to_string(),
                            payload: output.clone(),
                        });
                    }

                    produced.push(Delivery {
                        from_layer: layer_id,
                        from_node: node_id,
                        payload: output,
                    });
                }
            }

            for &next in layer.outgoing() {
                inboxes[next.index()].extend(produced.iter().cloned());
            }
        }

        for (node_id, payload) in emitted {
            if let Node::Data(data) = &mut nodes[node_id.index()].node {
                data.record(payload);
            }
        }

        Ok((outputs, invocations))
    }
}

/// Every configured upstream `(layer, node)` pair must have delivered.
fn check_barrier(layers: &[Layer], layer_id: LayerId, deliveries: &[Delivery]) -> PipelineResult<()> {
    let expected: BTreeSet<(LayerId, NodeId)> = layers[layer_id.index()]
        .incoming()
        .iter()
        .flat_map(|&from| {
            layers[from.index()]
                .nodes()
                .iter()
                .map(move |&node| (from, node))
        })
        .collect();
    let arrived: BTreeSet<(LayerId, NodeId)> = deliveries
        .iter()
        .map(|d| (d.from_layer, d.from_node))
        .collect();

    if arrived == expected {
        Ok(())
    } else {
        Err(PipelineError::FanInMismatch {
            layer: layer_id,
            expected: expected.len(),
            arrived: arrived.intersection(&expected).count(),
        })
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.len())
            .field("layers", &self.layers)
            .finish()
    }
}

use super::error::{PipelineError, PipelineResult};
use super::id::LayerId;
use super::layer::Layer;
use std::collections::VecDeque;

/// Statistics about a compiled run plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanStats {
    pub total_layers: usize,
    pub scheduled_layers: usize,
    pub skipped_layers: usize,
    pub terminal_layers: usize,
}

/// Execution plan for one entry layer.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub entry: LayerId,
    /// Layers reachable from the entry, in topological order.
    pub order: Vec<LayerId>,
    /// Layers not reachable from the entry.
    pub skipped: Vec<LayerId>,
    pub stats: PlanStats,
}

/// Compiles the layer graph into a run plan.
pub struct LayerCompiler;

impl LayerCompiler {
    /// Compute the run plan for `entry`.
    ///
    /// Only layers forward-reachable from the entry are scheduled. A layer
    /// that `holds_mixer` reports true for must have every configured
    /// upstream layer scheduled too, otherwise its barrier could never be
    /// met and the plan is rejected with [`PipelineError::FanInMismatch`].
    pub fn compile(
        layers: &[Layer],
        entry: LayerId,
        holds_mixer: impl Fn(LayerId) -> bool,
        expected_inputs: impl Fn(&[LayerId]) -> usize,
    ) -> PipelineResult<RunPlan> {
        let n = layers.len();
        if entry.index() >= n {
            return Err(PipelineError::UnknownLayer(entry));
        }

        let reachable = Self::forward_reachability(layers, entry);
        let order = Self::topological_sort(layers, entry, &reachable);

        // A cycle would leave reachable layers unscheduled; `connect` rejects
        // cycles, so this only fires if that invariant is broken.
        let scheduled = reachable.iter().filter(|&&r| r).count();
        if order.len() != scheduled {
            tracing::warn!(
                "Layer graph has a cycle! Only {} of {} reachable layers scheduled.",
                order.len(),
                scheduled
            );
        }

        for &layer_id in &order {
            let layer = &layers[layer_id.index()];
            if layer_id == entry || !holds_mixer(layer_id) {
                continue;
            }
            let arrived: Vec<LayerId> = layer
                .incoming()
                .iter()
                .copied()
                .filter(|l| reachable[l.index()])
                .collect();
            if arrived.len() != layer.incoming().len() {
                return Err(PipelineError::FanInMismatch {
                    layer: layer_id,
                    expected: expected_inputs(layer.incoming()),
                    arrived: expected_inputs(&arrived),
                });
            }
        }

        let skipped: Vec<LayerId> = (0..n)
            .filter(|&i| !reachable[i])
            .map(|i| LayerId(i as u32))
            .collect();

        let stats = PlanStats {
            total_layers: n,
            scheduled_layers: order.len(),
            skipped_layers: skipped.len(),
            terminal_layers: order
                .iter()
                .filter(|l| layers[l.index()].is_terminal())
                .count(),
        };

        Ok(RunPlan {
            entry,
            order,
            skipped,
            stats,
        })
    }

    /// Forward reachability from `entry` using DFS.
    fn forward_reachability(layers: &[Layer], entry: LayerId) -> Vec<bool> {
        let mut reachable = vec![false; layers.len()];
        let mut stack = vec![entry];
        reachable[entry.index()] = true;

        while let Some(layer) = stack.pop() {
            for &next in layers[layer.index()].outgoing() {
                if !reachable[next.index()] {
                    reachable[next.index()] = true;
                    stack.push(next);
                }
            }
        }

        reachable
    }

    /// Topological sort of the reachable layers using Kahn's algorithm.
    ///
    /// Ties are broken by discovery order (outgoing connect order, FIFO), so
    /// the order is deterministic.
    fn topological_sort(layers: &[Layer], entry: LayerId, reachable: &[bool]) -> Vec<LayerId> {
        let mut in_degree = vec![0usize; layers.len()];
        for (i, layer) in layers.iter().enumerate() {
            if !reachable[i] {
                continue;
            }
            for &next in layer.outgoing() {
                in_degree[next.index()] += 1;
            }
        }

        let mut queue = VecDeque::new();
        let mut order = Vec::new();
        queue.push_back(entry);

        while let Some(layer) = queue.pop_front() {
            order.push(layer);
            for &next in layers[layer.index()].outgoing() {
                in_degree[next.index()] -= 1;
                if in_degree[next.index()] == 0 {
                    queue.push_back(next);
                }
            }
        }

        order
    }

    /// Whether adding `from -> to` would close a cycle, i.e. `to` already reaches `from`.
    pub fn would_create_cycle(layers: &[Layer], from: LayerId, to: LayerId) -> bool {
        let mut visited = vec![false; layers.len()];
        let mut stack = vec![to];

        while let Some(current) = stack.pop() {
            if current == from {
                return true;
            }
            let idx = current.index();
            if idx >= layers.len() || visited[idx] {
                continue;
            }
            visited[idx] = true;
            stack.extend(layers[idx].outgoing().iter().copied());
        }
        false
    }

    /// Depth of every layer: the longest path from any layer without inputs.
    pub fn depths(layers: &[Layer]) -> Vec<usize> {
        let n = layers.len();
        let mut in_degree: Vec<usize> = layers.iter().map(|l| l.incoming().len()).collect();
        let mut depth = vec![0usize; n];
        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();

        while let Some(i) = queue.pop_front() {
            for &next in layers[i].outgoing() {
                let j = next.index();
                depth[j] = depth[j].max(depth[i] + 1);
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    queue.push_back(j);
                }
            }
        }

        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::id::NodeId;

    /// Build layers (one node each) and wire `edges` in order.
    fn build(n: usize, edges: &[(u32, u32)]) -> Vec<Layer> {
        let mut layers: Vec<Layer> = (0..n)
            .map(|i| Layer::new(format!("l{i}"), vec![NodeId(i as u32)]))
            .collect();
        for &(from, to) in edges {
            layers[from as usize].connect_to(LayerId(to));
            layers[to as usize].add_incoming(LayerId(from));
        }
        layers
    }

    fn no_mixers(_: LayerId) -> bool {
        false
    }

    fn one_per_layer(incoming: &[LayerId]) -> usize {
        incoming.len()
    }

    #[test]
    fn test_linear_order() {
        let layers = build(3, &[(0, 1), (1, 2)]);
        let plan = LayerCompiler::compile(&layers, LayerId(0), no_mixers, one_per_layer).unwrap();
        assert_eq!(plan.order, vec![LayerId(0), LayerId(1), LayerId(2)]);
        assert!(plan.skipped.is_empty());
        assert_eq!(plan.stats.terminal_layers, 1);
    }

    #[test]
    fn test_diamond_order() {
        // 0 -> 1, 0 -> 2, 1 -> 3, 2 -> 3
        let layers = build(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let plan = LayerCompiler::compile(&layers, LayerId(0), no_mixers, one_per_layer).unwrap();

        let pos = |id: u32| plan.order.iter().position(|&l| l == LayerId(id)).unwrap();
        assert_eq!(plan.order.len(), 4);
        assert!(pos(0) < pos(1));
        assert!(pos(0) < pos(2));
        assert!(pos(1) < pos(3));
        assert!(pos(2) < pos(3));
    }

    #[test]
    fn test_unreachable_layers_skipped() {
        // 2 feeds 1 but is not reachable from 0
        let layers = build(3, &[(0, 1), (2, 1)]);
        let plan = LayerCompiler::compile(&layers, LayerId(0), no_mixers, one_per_layer).unwrap();
        assert_eq!(plan.order, vec![LayerId(0), LayerId(1)]);
        assert_eq!(plan.skipped, vec![LayerId(2)]);
        assert!(!plan.order.contains(&LayerId(2)));
    }

    #[test]
    fn test_unreachable_mixer_input_fails_fast() {
        let layers = build(3, &[(0, 1), (2, 1)]);
        let err = LayerCompiler::compile(&layers, LayerId(0), |l| l == LayerId(1), one_per_layer)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::FanInMismatch {
                layer: LayerId(1),
                expected: 2,
                arrived: 1
            }
        ));
    }

    #[test]
    fn test_unknown_entry() {
        let layers = build(1, &[]);
        let err = LayerCompiler::compile(&layers, LayerId(5), no_mixers, one_per_layer).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownLayer(LayerId(5))));
    }

    #[test]
    fn test_would_create_cycle() {
        let layers = build(3, &[(0, 1), (1, 2)]);
        assert!(LayerCompiler::would_create_cycle(&layers, LayerId(2), LayerId(0)));
        assert!(LayerCompiler::would_create_cycle(&layers, LayerId(1), LayerId(0)));
        assert!(!LayerCompiler::would_create_cycle(&layers, LayerId(0), LayerId(2)));
    }

    #[test]
    fn test_depths_use_longest_path() {
        // 0 -> 1 -> 2, 0 -> 2
        let layers = build(3, &[(0, 1), (1, 2), (0, 2)]);
        assert_eq!(LayerCompiler::depths(&layers), vec![0, 1, 2]);
    }
}

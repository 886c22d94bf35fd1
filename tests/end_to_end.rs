//! End-to-end runs of the arithmetic graph

mod common;

use common::builders::{arithmetic_graph, chain_graph};
use common::{passthrough, passthrough_of};
use crossbeam_channel::unbounded;
use layerpipe::pipeline::{
    CancelToken, ChannelObserver, Node, NodeKind, Payload, PipelineError, TopologyExporter,
};

#[test]
fn test_arithmetic_graph_final_output() {
    let mut g = arithmetic_graph();
    let report = g.graph.run(g.entry, Some(passthrough(10))).unwrap();

    assert_eq!(report.outputs.len(), 1);
    assert_eq!(report.outputs[0].node, g.output_node);
    assert_eq!(report.final_payload(), Some(&passthrough(900)));
    assert_eq!(report.layers_run, vec![g.entry, g.math, g.adjust, g.mix, g.output]);
    assert!(report.skipped_layers.is_empty());
    // 1 input + 2 math + 4 adjust + 1 mixer + 1 output
    assert_eq!(report.invocations, 9);
}

#[test]
fn test_branches_read_the_original_input() {
    let mut g = arithmetic_graph();
    let (tx, rx) = unbounded();
    g.graph.set_observer(Box::new(ChannelObserver::new(tx)));
    g.graph.run(g.entry, Some(passthrough(10))).unwrap();

    let events: Vec<_> = rx.try_iter().collect();
    let outputs_of = |name: &str| -> Vec<i64> {
        events
            .iter()
            .filter(|e| e.name == name)
            .map(|e| passthrough_of(&e.output))
            .collect()
    };

    assert_eq!(outputs_of("AdderNode"), vec![15]);
    assert_eq!(outputs_of("MultiplierNode"), vec![30]);
    assert_eq!(outputs_of("SubtractorNode"), vec![12, 27]);
    assert_eq!(outputs_of("SquarerNode"), vec![225, 900]);
    assert_eq!(outputs_of("MixerNode"), vec![900]);
    assert_eq!(outputs_of("OutputNode"), vec![900]);

    let mixer = events.iter().find(|e| e.kind == NodeKind::Mixer).unwrap();
    let merged_inputs: Vec<i64> = mixer.inputs.iter().map(passthrough_of).collect();
    assert_eq!(merged_inputs, vec![12, 27, 225, 900]);
}

#[test]
fn test_repeated_runs_are_identical() {
    let mut g = arithmetic_graph();
    let first = g.graph.run(g.entry, Some(passthrough(10))).unwrap();
    let second = g.graph.run(g.entry, Some(passthrough(10))).unwrap();

    assert_eq!(first.outputs, second.outputs);
    assert_eq!(first.invocations, second.invocations);
    assert_eq!(g.graph.data_history(g.output_node).unwrap().len(), 2);
}

#[test]
fn test_run_from_inner_layer() {
    let mut g = arithmetic_graph();
    let report = g.graph.run(g.adjust, Some(passthrough(4))).unwrap();

    // Input and math are not reachable from `adjust`.
    assert_eq!(report.skipped_layers, vec![g.entry, g.math]);
    // Subtractor 1, Squarer 16: the squarer wins the merge.
    assert_eq!(report.final_payload(), Some(&passthrough(16)));
}

#[test]
fn test_stage_error_names_node_and_stage() {
    let mut g = arithmetic_graph();
    let input = Payload::from([("passthrough", "ten")]);
    let err = g.graph.run(g.entry, Some(input)).unwrap_err();

    let message = err.to_string();
    assert!(message.contains("AdderNode"), "{message}");
    assert!(message.contains("add_value"), "{message}");
    assert!(matches!(
        err.root_cause(),
        PipelineError::InvalidArgument { .. }
    ));
}

#[test]
fn test_cancelled_before_first_layer() {
    let mut g = arithmetic_graph();
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = g
        .graph
        .run_with_cancel(g.entry, Some(passthrough(10)), &cancel)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
}

#[test]
fn test_long_chain() {
    let (mut graph, entry) = chain_graph(64);
    let report = graph.run(entry, Some(passthrough(0))).unwrap();
    assert_eq!(report.final_payload(), Some(&passthrough(64)));
    assert_eq!(report.layers_run.len(), 64);
}

#[test]
fn test_adding_a_mixer_input_layer_after_the_fact() {
    let mut g = arithmetic_graph();
    let extra = g.graph.add_node(Node::seeded("Extra", passthrough(1)));
    let extra_layer = g.graph.add_named_layer("extra", [extra]).unwrap();
    g.graph.connect(extra_layer, g.mix).unwrap();

    // `extra` is not reachable from the entry, so the mixer can never see all
    // of its inputs.
    let err = g.graph.run(g.entry, Some(passthrough(10))).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::FanInMismatch {
            expected: 3,
            arrived: 2,
            ..
        }
    ));
}

#[test]
fn test_topology_render() {
    let g = arithmetic_graph();
    let topology = g.graph.topology();

    let names: Vec<&str> = topology.layers.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["input", "math", "adjust", "mix", "output"]);
    // input->math 2, math->adjust 4, adjust->mix 2, mix->output 1
    assert_eq!(topology.node_edges().len(), 9);

    let dot = topology.to_dot();
    assert!(dot.contains("label=\"AdderNode\\nadd_value\""));
    let mermaid = topology.to_mermaid();
    assert!(mermaid.contains("n5{{\"MixerNode\"}}"));
}

//! Test graph builders

use layerpipe::pipeline::stages::builtin;
use layerpipe::pipeline::{Graph, LayerId, Node, NodeId, Payload, Pipe};

/// The two-branch arithmetic graph:
///
/// ```text
/// Input -> [Adder(+5), Multiplier(*3)] -> [Subtractor(-3), Squarer] -> Mixer -> Output
/// ```
pub struct ArithmeticGraph {
    pub graph: Graph,
    pub entry: LayerId,
    pub math: LayerId,
    pub adjust: LayerId,
    pub mix: LayerId,
    pub output: LayerId,
    pub input: NodeId,
    pub adder: NodeId,
    pub multiplier: NodeId,
    pub subtractor: NodeId,
    pub squarer: NodeId,
    pub mixer: NodeId,
    pub output_node: NodeId,
}

pub fn arithmetic_graph() -> ArithmeticGraph {
    let mut graph = Graph::new();

    let input = graph.add_node(Node::data("InputNode"));
    let adder = graph.add_node(Node::processing(
        "AdderNode",
        Pipe::new().then_with("add_value", builtin::add_value, Payload::from([("value", 5)])),
    ));
    let multiplier = graph.add_node(Node::processing(
        "MultiplierNode",
        Pipe::with_defaults(Payload::from([("m", 3)])).then("multiply_value", builtin::multiply_value),
    ));
    let subtractor = graph.add_node(Node::processing(
        "SubtractorNode",
        Pipe::new().then_with(
            "subtract_value",
            builtin::subtract_value,
            Payload::from([("value", 3)]),
        ),
    ));
    let squarer = graph.add_node(Node::processing(
        "SquarerNode",
        Pipe::new().then("square_value", builtin::square_value),
    ));
    let mixer = graph.add_node(Node::mixer("MixerNode"));
    let output_node = graph.add_node(Node::data("OutputNode"));

    let entry = graph.add_named_layer("input", [input]).unwrap();
    let math = graph.add_named_layer("math", [adder, multiplier]).unwrap();
    let adjust = graph.add_named_layer("adjust", [subtractor, squarer]).unwrap();
    let mix = graph.add_named_layer("mix", [mixer]).unwrap();
    let output = graph.add_named_layer("output", [output_node]).unwrap();

    graph.connect(entry, math).unwrap();
    graph.connect(math, adjust).unwrap();
    graph.connect(adjust, mix).unwrap();
    graph.connect(mix, output).unwrap();

    ArithmeticGraph {
        graph,
        entry,
        math,
        adjust,
        mix,
        output,
        input,
        adder,
        multiplier,
        subtractor,
        squarer,
        mixer,
        output_node,
    }
}

/// Graph of `depth` single-node layers, each adding 1.
pub fn chain_graph(depth: usize) -> (Graph, LayerId) {
    let mut graph = Graph::new();
    let mut previous: Option<LayerId> = None;
    let mut entry = None;

    for i in 0..depth {
        let node = graph.add_node(Node::processing(
            format!("Step{}", i),
            Pipe::new().then("add_value", builtin::add_value),
        ));
        let layer = graph.add_layer([node]).unwrap();
        if let Some(prev) = previous {
            graph.connect(prev, layer).unwrap();
        }
        entry.get_or_insert(layer);
        previous = Some(layer);
    }

    (graph, entry.unwrap_or(LayerId(0)))
}

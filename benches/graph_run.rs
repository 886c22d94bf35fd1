//! Benchmarks for pipe invocation and graph runs
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use layerpipe::pipeline::stages::builtin;
use layerpipe::pipeline::{Graph, LayerId, Node, Payload, Pipe, ScriptStage, Stage, StageRegistry};
use layerpipe::scripting::ScriptEngine;
use std::sync::Arc;

fn input() -> Payload {
    Payload::from([("passthrough", 10)])
}

fn chain(depth: usize) -> (Graph, LayerId) {
    let mut graph = Graph::new();
    let mut previous: Option<LayerId> = None;
    let mut entry = LayerId(0);
    for i in 0..depth {
        let node = graph.add_node(Node::processing(
            format!("Step{}", i),
            Pipe::new().then("add_value", builtin::add_value),
        ));
        let layer = graph.add_layer([node]).expect("fresh node");
        match previous {
            Some(prev) => {
                graph.connect(prev, layer).expect("acyclic chain");
            }
            None => entry = layer,
        }
        previous = Some(layer);
    }
    (graph, entry)
}

/// One entry layer of `width` processing nodes feeding a single mixer.
fn fan_in(width: usize) -> (Graph, LayerId) {
    let mut graph = Graph::new();
    let nodes: Vec<_> = (0..width)
        .map(|i| {
            graph.add_node(Node::processing(
                format!("Branch{}", i),
                Pipe::new().then("square_value", builtin::square_value),
            ))
        })
        .collect();
    let mixer = graph.add_node(Node::mixer("Mixer"));
    let entry = graph.add_layer(nodes).expect("fresh nodes");
    let mix = graph.add_layer([mixer]).expect("fresh node");
    graph.connect(entry, mix).expect("acyclic");
    (graph, entry)
}

fn bench_pipe_invoke(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipe_invoke");
    let registry = StageRegistry::with_builtins();

    for len in [1, 8, 64].iter() {
        let mut pipe = Pipe::new();
        for _ in 0..*len {
            pipe.push(
                registry
                    .stage("add_value", "add_value", Payload::new())
                    .expect("builtin"),
            );
        }
        let payload = input();

        group.throughput(Throughput::Elements(*len as u64));
        group.bench_with_input(BenchmarkId::new("builtin", len), &pipe, |b, pipe| {
            b.iter(|| black_box(pipe.invoke(&payload)));
        });
    }

    group.finish();
}

fn bench_script_stage(c: &mut Criterion) {
    let engine = Arc::new(ScriptEngine::new());
    let stage = ScriptStage::compile(
        engine,
        "double",
        "#{ passthrough: payload.passthrough * 2 }",
    )
    .expect("valid script");
    let pipe = Pipe::new().then_stage(Stage::from_arc("double", Arc::new(stage)));
    let payload = input();

    c.bench_function("script_stage", |b| {
        b.iter(|| black_box(pipe.invoke(&payload)));
    });
}

fn bench_graph_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_run");

    for depth in [4, 32, 128].iter() {
        let (mut graph, entry) = chain(*depth);
        group.throughput(Throughput::Elements(*depth as u64));
        group.bench_function(BenchmarkId::new("chain", depth), |b| {
            b.iter(|| black_box(graph.run(entry, Some(input()))));
        });
    }

    for width in [4, 32, 128].iter() {
        let (mut graph, entry) = fan_in(*width);
        group.throughput(Throughput::Elements(*width as u64));
        group.bench_function(BenchmarkId::new("fan_in", width), |b| {
            b.iter(|| black_box(graph.run(entry, Some(input()))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pipe_invoke, bench_script_stage, bench_graph_run);

criterion_main!(benches);

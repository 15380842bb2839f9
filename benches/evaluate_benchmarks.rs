//! Fixpoint evaluation benchmarks over synthetic fact/rule sets, mirroring
//! the teacher's `benches/query_benchmarks.rs` shape.

use buildtrace_advisor::{parse_program, Engine, Fact, Value};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn make_engine(size: u32) -> Engine {
    let program = parse_program(
        "path(?X, ?Y) :- edge(?X, ?Y). path(?X, ?Z) :- path(?X, ?Y), edge(?Y, ?Z).",
    )
    .unwrap();
    let mut engine = Engine::new();
    for i in 0..size {
        engine.add_fact(Fact::new(
            "edge",
            vec![Value::Int(i as i64), Value::Int(i as i64 + 1)],
        ));
    }
    engine.load_rules(&program);
    engine
}

fn bench_transitive_closure(c: &mut Criterion) {
    let mut group = c.benchmark_group("transitive_closure_fixpoint");
    for size in [10u32, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut engine = make_engine(size);
                engine.evaluate().unwrap();
            });
        });
    }
    group.finish();
}

fn bench_fact_builder(c: &mut Criterion) {
    use buildtrace_advisor::fact_builder::{build_facts, TraceEvent};
    use std::collections::HashMap;

    let mut group = c.benchmark_group("fact_builder");
    for size in [10u32, 100, 1_000] {
        let events: Vec<TraceEvent> = (0..size)
            .map(|i| TraceEvent {
                name: format!("event-{i}"),
                category: "action processing".to_string(),
                start_us: i as f64,
                duration_us: 10.0,
                pid: None,
                tid: None,
                args: HashMap::from([(
                    "target".to_string(),
                    Value::String(format!("//pkg:target-{i}")),
                )]),
            })
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &events, |b, events| {
            b.iter(|| build_facts(events));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_transitive_closure, bench_fact_builder);
criterion_main!(benches);

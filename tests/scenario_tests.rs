//! End-to-end scenario tests against the public API, per `spec.md` §8
//! (S1-S6). Each test is named after its scenario letter.

use buildtrace_advisor::fact_builder::{build_facts, TraceEvent};
use buildtrace_advisor::{parse_program, Atom, Engine, Fact, SuggestionEvaluator, Term, Value};
use std::collections::HashMap;

fn event(name: &str, category: &str, start: f64, dur: f64, args: &[(&str, Value)]) -> TraceEvent {
    TraceEvent {
        name: name.to_string(),
        category: category.to_string(),
        start_us: start,
        duration_us: dur,
        pid: None,
        tid: None,
        args: args.iter().map(|(k, v)| (k.to_string(), v.clone())).collect::<HashMap<_, _>>(),
    }
}

/// S1: empty program, empty events → only zero-valued aggregates, no
/// suggestions.
#[test]
fn s1_empty_program_empty_events() {
    let mut engine = Engine::new();
    engine.add_facts(build_facts(&[]));
    engine.evaluate().unwrap();

    let total_duration = Atom::new("total_duration", vec![Term::var("D")]);
    let total_actions = Atom::new("total_actions", vec![Term::var("N")]);
    let max_concurrency = Atom::new("max_concurrency", vec![Term::var("C")]);

    assert_eq!(
        engine.query_one(&total_duration).unwrap().unwrap().get("D"),
        Some(&Value::Float(0.0))
    );
    assert_eq!(
        engine.query_one(&total_actions).unwrap().unwrap().get("N"),
        Some(&Value::Int(0))
    );
    assert_eq!(
        engine.query_one(&max_concurrency).unwrap().unwrap().get("C"),
        Some(&Value::Int(0))
    );

    let evaluator = SuggestionEvaluator::from_program(Default::default());
    let report = evaluator.evaluate(&[]).unwrap();
    assert!(report.suggestions.is_empty());
}

/// S2: one actionable event with a target and mnemonic produces the full
/// expected fact set.
#[test]
fn s2_single_actionable_event() {
    let events = vec![event(
        "Compile",
        "action processing",
        0.0,
        1000.0,
        &[
            ("target", Value::String("//a:b".to_string())),
            ("mnemonic", Value::String("CppCompile".to_string())),
        ],
    )];
    let mut engine = Engine::new();
    engine.add_facts(build_facts(&events));
    engine.evaluate().unwrap();

    let has_target = Atom::new("has_target", vec![Term::Constant(Value::Int(0))]);
    assert_eq!(engine.query_count(&has_target).unwrap(), 1);

    let is_actionable = Atom::new("is_actionable", vec![Term::Constant(Value::Int(0))]);
    assert_eq!(engine.query_count(&is_actionable).unwrap(), 1);

    let target_time = Atom::new(
        "target_time",
        vec![Term::Constant(Value::String("//a:b".into())), Term::var("D")],
    );
    assert_eq!(
        engine.query_one(&target_time).unwrap().unwrap().get("D"),
        Some(&Value::Float(1000.0))
    );

    let critical_path_percent = Atom::new("critical_path_percent", vec![Term::var("P")]);
    assert_eq!(
        engine.query_one(&critical_path_percent).unwrap().unwrap().get("P"),
        Some(&Value::Float(100.0))
    );
}

/// S3: three overlapping events → max_concurrency(2).
#[test]
fn s3_overlap_sweep() {
    let events = vec![
        event("a", "x", 0.0, 100.0, &[]),
        event("b", "x", 50.0, 100.0, &[]),
        event("c", "x", 120.0, 30.0, &[]),
    ];
    let mut engine = Engine::new();
    engine.add_facts(build_facts(&events));
    engine.evaluate().unwrap();

    let max_concurrency = Atom::new("max_concurrency", vec![Term::var("C")]);
    assert_eq!(
        engine.query_one(&max_concurrency).unwrap().unwrap().get("C"),
        Some(&Value::Int(2))
    );
}

/// S4: negation-as-failure — an event with a target but no actionable
/// classification is an "orphan".
#[test]
fn s4_negation_as_failure() {
    let events = vec![event(
        "Setup",
        "general information",
        0.0,
        10.0,
        &[("target", Value::String("//a:b".to_string()))],
    )];
    let mut engine = Engine::new();
    engine.add_facts(build_facts(&events));
    let program = parse_program("orphan(?X) :- has_target(?X), not is_actionable(?X).").unwrap();
    engine.load_rules(&program);
    engine.evaluate().unwrap();

    let orphan = Atom::new("orphan", vec![Term::Constant(Value::Int(0))]);
    assert_eq!(engine.query_count(&orphan).unwrap(), 1);
}

/// S5: aggregate + comparison — only the target above the 50% threshold is
/// derived as "hot".
#[test]
fn s5_aggregate_and_comparison() {
    let mut engine = Engine::new();
    engine.add_fact(Fact::new(
        "target_time",
        vec![Value::String("//x".into()), Value::Int(800)],
    ));
    engine.add_fact(Fact::new(
        "target_time",
        vec![Value::String("//y".into()), Value::Int(200)],
    ));
    engine.add_fact(Fact::new("total_duration", vec![Value::Int(1000)]));

    let program = parse_program(
        "hot(?T) :- target_time(?T, ?D), ?P = (?D * 100) / 1000, ?P > 50.",
    )
    .unwrap();
    engine.load_rules(&program);
    engine.evaluate().unwrap();

    let hot = Atom::new("hot", vec![Term::var("T")]);
    let results = engine.query(&hot).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].get("T"), Some(&Value::String("//x".into())));
}

/// S6: template rendering, including the `format_time(?V)` metric special
/// case.
#[test]
fn s6_template_rendering() {
    let program = parse_program(
        r#"
        rule slow_target {
            when: target_time(?T, ?D), ?D > 1000000.
            then: suggestion(performance, high, "Slow target {?T}", "Consider remote caching", ?T, [["duration", format_time(?D)]]).
        }
        "#,
    )
    .unwrap();
    let evaluator = SuggestionEvaluator::from_program(program);

    let events = vec![event(
        "LinkBinary",
        "action processing",
        0.0,
        1_500_000.0,
        &[
            ("target", Value::String("//x".to_string())),
            ("mnemonic", Value::String("CppLink".to_string())),
        ],
    )];
    let report = evaluator.evaluate(&events).unwrap();
    assert_eq!(report.suggestions.len(), 1);
    let suggestion = &report.suggestions[0];
    assert_eq!(suggestion.title, "Slow target //x");
    assert_eq!(suggestion.target, "//x");
    assert_eq!(suggestion.metrics[0].value, "1.50s");
}

/// Dedup property: two suggestion rules that both fire for the same target
/// collapse to one output (keeping the first by impact ordering).
#[test]
fn dedup_collapses_same_rule_and_target() {
    let program = parse_program(
        r#"
        rule slow_target {
            when: target_time(?T, ?D), ?D > 100.
            then: suggestion(performance, high, "Slow {?T}", "body", ?T).
        }
        "#,
    )
    .unwrap();
    let evaluator = SuggestionEvaluator::from_program(program);
    let events = vec![
        event("a", "action processing", 0.0, 200.0, &[("target", Value::String("//x".into())), ("mnemonic", Value::String("M".into()))]),
        event("b", "action processing", 0.0, 300.0, &[("target", Value::String("//x".into())), ("mnemonic", Value::String("M".into()))]),
    ];
    let report = evaluator.evaluate(&events).unwrap();
    assert_eq!(report.suggestions.len(), 1);
}

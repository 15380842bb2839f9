//! Tests for `SuggestionEvaluator::load`'s external rule-directory path
//! (`spec.md` §4.5: "an embedded set and optionally an external directory
//! of `*.dl` files").

use buildtrace_advisor::fact_builder::TraceEvent;
use buildtrace_advisor::{SuggestionEvaluator, Value};
use std::collections::HashMap;
use std::fs;
use tempfile::tempdir;

fn event_with_target(target: &str, dur: f64) -> TraceEvent {
    TraceEvent {
        name: "Compile".to_string(),
        category: "action processing".to_string(),
        start_us: 0.0,
        duration_us: dur,
        pid: None,
        tid: None,
        args: HashMap::from([
            ("target".to_string(), Value::String(target.to_string())),
            ("mnemonic".to_string(), Value::String("CppCompile".to_string())),
        ]),
    }
}

#[test]
fn loads_dl_files_from_external_directory() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("custom.dl"),
        r#"
        rule custom_slow {
            when: target_time(?T, ?D), ?D > 500.
            then: suggestion(performance, high, "Custom slow {?T}", "body", ?T).
        }
        "#,
    )
    .unwrap();

    let evaluator = SuggestionEvaluator::load(Some(dir.path())).unwrap();
    let report = evaluator.evaluate(&[event_with_target("//a:b", 1000.0)]).unwrap();
    assert!(report.suggestions.iter().any(|s| s.rule_id == "custom_slow"));
}

#[test]
fn non_dl_files_in_the_directory_are_ignored() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), "not a rule file").unwrap();

    let evaluator = SuggestionEvaluator::load(Some(dir.path())).unwrap();
    // The embedded rule set still loads; no panic or error from the stray file.
    let report = evaluator.evaluate(&[]).unwrap();
    assert!(report.suggestions.is_empty());
}

#[test]
fn a_malformed_rule_file_is_skipped_without_aborting_load() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("broken.dl"), "this is not valid ( syntax").unwrap();
    fs::write(
        dir.path().join("good.dl"),
        r#"
        rule good_rule {
            when: target_time(?T, ?D), ?D > 500.
            then: suggestion(performance, medium, "Slow {?T}", "body", ?T).
        }
        "#,
    )
    .unwrap();

    let evaluator = SuggestionEvaluator::load(Some(dir.path())).unwrap();
    let report = evaluator.evaluate(&[event_with_target("//a:b", 1000.0)]).unwrap();
    assert!(report.suggestions.iter().any(|s| s.rule_id == "good_rule"));
}

//! # Suggestion Evaluator
//!
//! Loads rule texts (an embedded set plus an optional external directory
//! of `*.dl` files), parses them, feeds derivation rules into the
//! [`Engine`](crate::engine::Engine), drives fact generation, evaluates
//! each [`SuggestionRule`]'s body against the post-fixpoint fact store, and
//! renders, orders and deduplicates the resulting [`Suggestion`]s
//! (`spec.md` §4.5).

mod render;

pub use render::render_template;

use crate::ast::{Program, SuggestionRule};
use crate::engine::{Engine, EvaluationDiagnostics};
use crate::error::{RuleLoadCause, RuleLoadError};
use crate::fact_builder::{self, TraceEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One rendered optimisation suggestion (`spec.md` §6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub rule_id: String,
    #[serde(rename = "type")]
    pub suggestion_type: String,
    pub impact: String,
    pub title: String,
    pub body: String,
    pub target: String,
    pub metrics: Vec<Metric>,
}

/// One rendered `[label, value]` row (`spec.md` §6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub label: String,
    pub value: String,
}

/// The `{ suggestions, rulesEvaluated, factsGenerated, evaluationTimeMs }`
/// payload of `spec.md` §6.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionReport {
    pub suggestions: Vec<Suggestion>,
    #[serde(rename = "rulesEvaluated")]
    pub rules_evaluated: usize,
    #[serde(rename = "factsGenerated")]
    pub facts_generated: usize,
    #[serde(rename = "evaluationTimeMs")]
    pub evaluation_time_ms: u128,
}

impl From<EvaluationDiagnostics> for SuggestionReport {
    fn from(d: EvaluationDiagnostics) -> Self {
        SuggestionReport {
            suggestions: Vec::new(),
            rules_evaluated: d.rules_evaluated,
            facts_generated: d.facts_generated,
            evaluation_time_ms: d.evaluation_time_ms,
        }
    }
}

fn impact_rank(impact: &str) -> u8 {
    match impact {
        "high" => 0,
        "medium" => 1,
        "low" => 2,
        _ => 3,
    }
}

/// Drives the full pipeline: embedded + external rule texts → parse → load
/// into a fresh [`Engine`] seeded with the trace's facts → fixpoint →
/// suggestion-rule evaluation → ordered, deduplicated suggestions.
pub struct SuggestionEvaluator {
    program: Program,
}

impl SuggestionEvaluator {
    /// Builds an evaluator from the embedded rule set plus, if given, every
    /// `*.dl` file in `external_dir` (`spec.md` §4.5).
    pub fn load(external_dir: Option<&Path>) -> Result<SuggestionEvaluator, RuleLoadError> {
        let mut program = Program::new();
        for (name, text) in embedded_rules() {
            match crate::parser::parse_program(text) {
                Ok(p) => program.extend(p),
                Err(e) => {
                    tracing::warn!(rule_file = name, error = %e, "failed to parse embedded rule file");
                }
            }
        }
        if let Some(dir) = external_dir {
            let entries = std::fs::read_dir(dir).map_err(|e| RuleLoadError {
                path: dir.to_path_buf(),
                source: RuleLoadCause::Io(e),
            })?;
            for entry in entries {
                let entry = entry.map_err(|e| RuleLoadError {
                    path: dir.to_path_buf(),
                    source: RuleLoadCause::Io(e),
                })?;
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("dl") {
                    continue;
                }
                match load_rule_file(&path) {
                    Ok(p) => program.extend(p),
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to load rule file"),
                }
            }
        }
        crate::engine::stratify::check(&program.rules).map_err(|e| RuleLoadError {
            path: external_dir.map(Path::to_path_buf).unwrap_or_default(),
            source: RuleLoadCause::Stratification(e),
        })?;
        Ok(SuggestionEvaluator { program })
    }

    pub fn from_program(program: Program) -> SuggestionEvaluator {
        SuggestionEvaluator { program }
    }

    /// Runs the fact builder over `events`, evaluates derivation rules to
    /// fixpoint, then evaluates every suggestion rule and returns the
    /// ordered, deduplicated report.
    pub fn evaluate(&self, events: &[TraceEvent]) -> Result<SuggestionReport, crate::error::EvaluationError> {
        let mut engine = Engine::new();
        engine.add_facts(fact_builder::build_facts(events));
        engine.load_rules(&self.program);
        if let Err(e) = engine.check_stratification() {
            tracing::warn!(error = %e, "rule set is not stratifiable; evaluation order may affect results");
        }
        let diagnostics = engine.evaluate()?;

        let mut suggestions = Vec::new();
        for rule in &self.program.suggestion_rules {
            match evaluate_suggestion_rule(&engine, rule) {
                Ok(mut rendered) => suggestions.append(&mut rendered),
                Err(e) => {
                    tracing::warn!(rule_id = %rule.id, error = %e, "suggestion rule evaluation failed; skipping");
                }
            }
        }

        order_and_dedup(&mut suggestions);

        let mut report: SuggestionReport = diagnostics.into();
        report.suggestions = suggestions;
        Ok(report)
    }
}

fn evaluate_suggestion_rule(
    engine: &Engine,
    rule: &SuggestionRule,
) -> Result<Vec<Suggestion>, crate::error::EvaluationError> {
    let bindings_list = crate::engine::evaluate_clauses(engine, &rule.conditions)?;

    let mut out = Vec::new();
    for bindings in bindings_list {
        let rendered = render::render_template(&rule.template, &bindings);
        out.push(Suggestion {
            id: format!("{}-{}", rule.id, out.len()),
            rule_id: rule.id.clone(),
            suggestion_type: rendered.suggestion_type,
            impact: rendered.impact,
            title: rendered.title,
            body: rendered.body,
            target: rendered.target,
            metrics: rendered
                .metrics
                .into_iter()
                .map(|(label, value)| Metric { label, value })
                .collect(),
        });
    }
    Ok(out)
}

/// Sorts by impact (`high < medium < low < other`), stable within a group,
/// then removes duplicates by `(rule_id, target)`, keeping the first
/// occurrence (`spec.md` §4.5).
fn order_and_dedup(suggestions: &mut Vec<Suggestion>) {
    suggestions.sort_by_key(|s| impact_rank(&s.impact));
    let mut seen = HashSet::new();
    suggestions.retain(|s| seen.insert((s.rule_id.clone(), s.target.clone())));
}

fn load_rule_file(path: &Path) -> Result<Program, RuleLoadError> {
    let text = std::fs::read_to_string(path).map_err(|e| RuleLoadError {
        path: path.to_path_buf(),
        source: RuleLoadCause::Io(e),
    })?;
    crate::parser::parse_program(&text).map_err(|e| RuleLoadError {
        path: path.to_path_buf(),
        source: RuleLoadCause::Parse(e),
    })
}

/// The rule texts shipped with the crate, analogous to the teacher's
/// embedded default rule catalog.
fn embedded_rules() -> Vec<(&'static str, &'static str)> {
    vec![(
        "defaults.dl",
        r#"
        orphan(?X) :- has_target(?X), not is_actionable(?X).
        "#,
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact_builder::TraceEvent;
    use crate::value::Value;
    use std::collections::HashMap as Map;

    fn ev(name: &str, category: &str, start: f64, dur: f64, args: &[(&str, Value)]) -> TraceEvent {
        TraceEvent {
            name: name.to_string(),
            category: category.to_string(),
            start_us: start,
            duration_us: dur,
            pid: None,
            tid: None,
            args: args.iter().map(|(k, v)| (k.to_string(), v.clone())).collect::<Map<_, _>>(),
        }
    }

    #[test]
    fn s6_template_rendering() {
        let program = crate::parser::parse_program(
            r#"
            rule slow_target {
                when: target_time(?T, ?D), ?D > 1000000.
                then: suggestion(performance, high, "Slow target {?T}", "body", ?T, [["duration", format_time(?D)]]).
            }
            "#,
        )
        .unwrap();
        let evaluator = SuggestionEvaluator::from_program(program);
        let mut engine = Engine::new();
        engine.add_fact(crate::engine::Fact::new(
            "target_time",
            vec![Value::String("//x".into()), Value::Int(1_500_000)],
        ));
        // Re-run pipeline manually since `evaluate` builds facts from events.
        engine.evaluate().unwrap();
        let rule = &evaluator.program.suggestion_rules[0];
        let results = crate::engine::evaluate_clauses(&engine, &rule.conditions).unwrap();
        assert_eq!(results.len(), 1);
        let bindings = &results[0];
        assert_eq!(
            render::render(&rule.template.title, bindings),
            "Slow target //x"
        );
        assert_eq!(
            render::render_metric_value(&rule.template.metrics[0].value, bindings),
            "1.50s"
        );
    }

    #[test]
    fn empty_program_empty_events_yields_no_suggestions_s1() {
        let evaluator = SuggestionEvaluator::from_program(Program::new());
        let report = evaluator.evaluate(&[]).unwrap();
        assert!(report.suggestions.is_empty());
    }

    #[test]
    fn dedup_by_rule_and_target() {
        let mut suggestions = vec![
            Suggestion {
                id: "a-0".into(),
                rule_id: "a".into(),
                suggestion_type: "t".into(),
                impact: "high".into(),
                title: "t1".into(),
                body: "b1".into(),
                target: "//x".into(),
                metrics: vec![],
            },
            Suggestion {
                id: "a-1".into(),
                rule_id: "a".into(),
                suggestion_type: "t".into(),
                impact: "low".into(),
                title: "t2".into(),
                body: "b2".into(),
                target: "//x".into(),
                metrics: vec![],
            },
        ];
        order_and_dedup(&mut suggestions);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].title, "t1");
    }

    #[test]
    fn orders_by_impact() {
        let mut suggestions = vec![
            Suggestion {
                id: "a-0".into(),
                rule_id: "a".into(),
                suggestion_type: "t".into(),
                impact: "low".into(),
                title: "low".into(),
                body: String::new(),
                target: "//x".into(),
                metrics: vec![],
            },
            Suggestion {
                id: "b-0".into(),
                rule_id: "b".into(),
                suggestion_type: "t".into(),
                impact: "high".into(),
                title: "high".into(),
                body: String::new(),
                target: "//y".into(),
                metrics: vec![],
            },
        ];
        order_and_dedup(&mut suggestions);
        assert_eq!(suggestions[0].title, "high");
    }

    /// `spec.md` §6.3's wire record round-trips through `serde_json`,
    /// matching the teacher's pervasive `serde_json` use for its own wire
    /// types (`SPEC_FULL.md` §10.5).
    #[test]
    fn suggestion_report_round_trips_through_json() {
        let report = SuggestionReport {
            suggestions: vec![Suggestion {
                id: "slow_target-0".into(),
                rule_id: "slow_target".into(),
                suggestion_type: "performance".into(),
                impact: "high".into(),
                title: "Slow target //x".into(),
                body: "Consider remote caching".into(),
                target: "//x".into(),
                metrics: vec![Metric {
                    label: "duration".into(),
                    value: "1.50s".into(),
                }],
            }],
            rules_evaluated: 3,
            facts_generated: 42,
            evaluation_time_ms: 7,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"rulesEvaluated\":3"));
        assert!(json.contains("\"type\":\"performance\""));
        let parsed: SuggestionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.suggestions[0].title, report.suggestions[0].title);
        assert_eq!(parsed.rules_evaluated, report.rules_evaluated);
    }

    #[test]
    fn load_rejects_a_non_stratifiable_external_rule_set() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cyclic.dl"), "p(?X) :- q(?X), not p(?X).\n").unwrap();
        let err = SuggestionEvaluator::load(Some(dir.path())).unwrap_err();
        assert!(matches!(err.source, RuleLoadCause::Stratification(_)));
    }

    #[test]
    fn evaluate_drives_fact_builder_end_to_end() {
        let program = crate::parser::parse_program(
            r#"
            rule actionable_found {
                when: is_actionable(?I).
                then: suggestion(performance, medium, "Actionable event", "body", "//a:b").
            }
            "#,
        )
        .unwrap();
        let evaluator = SuggestionEvaluator::from_program(program);
        let events = vec![ev(
            "Compile",
            "action processing",
            0.0,
            1000.0,
            &[
                ("target", Value::String("//a:b".into())),
                ("mnemonic", Value::String("CppCompile".into())),
            ],
        )];
        let report = evaluator.evaluate(&events).unwrap();
        assert_eq!(report.suggestions.len(), 1);
        assert_eq!(report.suggestions[0].target, "//a:b");
    }
}

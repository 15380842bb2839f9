//! # Engine
//!
//! Stores facts and derivation rules, evaluates them to a bottom-up
//! fixpoint (`spec.md` §4.4), and answers queries over bindings. The
//! engine is single-threaded and its fact store is monotone during a
//! single `evaluate` call (`spec.md` §5).

mod builtins;
pub mod stratify;

use crate::ast::{AggregateOp, Atom, Clause, CompareOp, Expression, Program, Rule, Term};
use crate::config::EngineConfig;
use crate::error::EvaluationError;
use crate::value::{canonical_key, Value};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub use builtins::{format_time, BuiltinFn};

/// A ground tuple indexed by predicate name (`spec.md` §3). Derives
/// `Serialize`/`Deserialize` per `spec.md` §10.5's wire-format requirement,
/// matching the teacher's pervasive `serde` use for its own fact/value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub predicate: String,
    pub args: Vec<Value>,
}

impl Fact {
    pub fn new(predicate: impl Into<String>, args: Vec<Value>) -> Fact {
        Fact {
            predicate: predicate.into(),
            args,
        }
    }
}

/// A mapping from variable name to a ground value, scoped to one rule
/// evaluation (`spec.md` §3). Cloned before extension so sibling
/// candidates never interfere (`spec.md` §5).
pub type Bindings = HashMap<String, Value>;

/// The predicate-indexed, append-only fact store, per `spec.md` §9
/// ("Monotone fact store"): a map predicate → ordered list, plus a
/// per-predicate hash set keyed by a canonical argument-tuple string for
/// O(1) duplicate detection on insert.
#[derive(Debug, Default)]
struct FactStore {
    facts: HashMap<String, Vec<Fact>>,
    seen: HashMap<String, HashSet<String>>,
}

impl FactStore {
    fn len(&self) -> usize {
        self.facts.values().map(Vec::len).sum()
    }

    fn get(&self, predicate: &str) -> &[Fact] {
        self.facts
            .get(predicate)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Inserts a fact if its predicate+args aren't already present.
    /// Returns `true` if the fact was newly added.
    fn insert(&mut self, fact: Fact) -> bool {
        let key = canonical_key(&fact.args);
        let seen = self.seen.entry(fact.predicate.clone()).or_default();
        if !seen.insert(key) {
            return false;
        }
        self.facts.entry(fact.predicate.clone()).or_default().push(fact);
        true
    }
}

/// Diagnostics returned by [`Engine::evaluate`] (`spec.md` §6.3, §7).
#[derive(Debug, Clone, Default)]
pub struct EvaluationDiagnostics {
    pub rules_evaluated: usize,
    pub facts_generated: usize,
    pub evaluation_time_ms: u128,
    pub iterations: usize,
}

/// Stores facts, derivation rules and built-in functions; evaluates to
/// fixpoint and answers queries (`spec.md` §4.4).
pub struct Engine {
    store: FactStore,
    rules: Vec<Rule>,
    builtins: HashMap<&'static str, BuiltinFn>,
    config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Engine {
        Engine {
            store: FactStore::default(),
            rules: Vec::new(),
            builtins: builtins::default_builtins(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(config: EngineConfig) -> Engine {
        Engine {
            store: FactStore::default(),
            rules: Vec::new(),
            builtins: builtins::default_builtins(),
            config,
        }
    }

    /// Appends a fact directly; duplicates are filtered on insert, not on
    /// a separate pass (`spec.md` §4.4.1).
    pub fn add_fact(&mut self, fact: Fact) {
        self.store.insert(fact);
    }

    pub fn add_facts(&mut self, facts: impl IntoIterator<Item = Fact>) {
        for f in facts {
            self.add_fact(f);
        }
    }

    /// Loads derivation rules from a parsed program, appending to the
    /// engine's rule list in order.
    pub fn load_rules(&mut self, program: &Program) {
        self.rules.extend(program.rules.iter().cloned());
    }

    pub fn fact_count(&self) -> usize {
        self.store.len()
    }

    /// Runs the dependency/stratification check of `spec.md` §9
    /// ("Stratified negation"): reports a negation edge that closes a
    /// cycle across relations, without otherwise changing evaluation.
    pub fn check_stratification(&self) -> Result<(), stratify::StratificationError> {
        stratify::check(&self.rules)
    }

    /// Semi-naïve bottom-up fixpoint evaluation (`spec.md` §4.4.2).
    pub fn evaluate(&mut self) -> Result<EvaluationDiagnostics, EvaluationError> {
        let start = std::time::Instant::now();
        let mut iterations = 0usize;
        loop {
            iterations += 1;
            if let Some(max) = self.config.max_iterations {
                if iterations > max {
                    tracing::warn!(iterations, "fixpoint iteration cap reached");
                    return Err(EvaluationError::IterationCapExceeded(max));
                }
            }
            let mut new_count = 0usize;
            // Borrow the fields we need disjointly so each derived fact can
            // be inserted into the store as soon as it's produced: a
            // consumer rule later in this same pass (e.g. one negating a
            // predicate a prior rule derives) must see it, per spec.md
            // §4.4.2's "rule ordering influences the fixpoint" note.
            let Engine { rules, store, builtins, .. } = self;
            for rule in rules.iter() {
                for bindings in eval_body(&rule.body, &*store, &*builtins)? {
                    if let Some(fact) = instantiate_head(&rule.head, &bindings) {
                        if store.insert(fact) {
                            new_count += 1;
                        }
                    }
                }
            }
            tracing::debug!(iteration = iterations, new_facts = new_count, "fixpoint step");
            if let Some(max_facts) = self.config.max_facts {
                if self.store.len() > max_facts {
                    return Err(EvaluationError::FactCapExceeded(max_facts));
                }
            }
            if new_count == 0 {
                break;
            }
        }
        let diagnostics = EvaluationDiagnostics {
            rules_evaluated: self.rules.len(),
            facts_generated: self.store.len(),
            evaluation_time_ms: start.elapsed().as_millis(),
            iterations,
        };
        tracing::info!(
            rules_evaluated = diagnostics.rules_evaluated,
            facts_generated = diagnostics.facts_generated,
            elapsed_ms = diagnostics.evaluation_time_ms,
            "evaluation complete"
        );
        Ok(diagnostics)
    }

    /// Runs `atom` against the fact store and returns every satisfying
    /// binding set (`spec.md` §4.4.3).
    pub fn query(&self, atom: &Atom) -> Result<Vec<Bindings>, EvaluationError> {
        eval_clause(
            &Clause::AtomClause(atom.clone()),
            vec![Bindings::new()],
            &self.store,
            &self.builtins,
        )
    }

    /// `query`, returning only the first satisfying binding set, if any.
    pub fn query_one(&self, atom: &Atom) -> Result<Option<Bindings>, EvaluationError> {
        Ok(self.query(atom)?.into_iter().next())
    }

    /// Counts satisfying bindings without materializing them all.
    pub fn query_count(&self, atom: &Atom) -> Result<usize, EvaluationError> {
        Ok(self.query(atom)?.len())
    }

    /// Streaming query: an iterator over satisfying bindings rather than a
    /// materialized `Vec`, for symmetry with `query`/`query_one`.
    pub fn query_iter(
        &self,
        atom: &Atom,
    ) -> Result<impl Iterator<Item = Bindings>, EvaluationError> {
        Ok(self.query(atom)?.into_iter())
    }
}

/// Evaluates an arbitrary clause list (e.g. a [`crate::ast::SuggestionRule`]'s
/// `conditions`) against an engine's post-fixpoint fact store, returning
/// every satisfying binding set. Exposed for the suggestion evaluator,
/// which doesn't have a single head atom to drive `query` with.
pub fn evaluate_clauses(engine: &Engine, body: &[Clause]) -> Result<Vec<Bindings>, EvaluationError> {
    eval_body(body, &engine.store, &engine.builtins)
}

/// Evaluates a rule/query body left-to-right, threading a list of
/// candidate bindings: start with the singleton `{∅}`; each clause expands
/// each candidate into zero or more extended candidates; short-circuits
/// once the candidate list is empty (`spec.md` §4.4.2).
fn eval_body(
    body: &[Clause],
    store: &FactStore,
    builtins: &HashMap<&'static str, BuiltinFn>,
) -> Result<Vec<Bindings>, EvaluationError> {
    eval_body_from(body, vec![Bindings::new()], store, builtins)
}

/// `eval_body`, seeded with caller-supplied candidates instead of the empty
/// binding. Used by `Clause::Aggregation` to evaluate its nested body in a
/// *cloned* copy of the enclosing bindings (`spec.md` §4.4.2), so variables
/// already bound outside the aggregate — typically a group-by key — carry
/// into and constrain it.
fn eval_body_from(
    body: &[Clause],
    mut candidates: Vec<Bindings>,
    store: &FactStore,
    builtins: &HashMap<&'static str, BuiltinFn>,
) -> Result<Vec<Bindings>, EvaluationError> {
    for clause in body {
        if candidates.is_empty() {
            break;
        }
        candidates = eval_clause(clause, candidates, store, builtins)?;
    }
    Ok(candidates)
}

fn eval_clause(
    clause: &Clause,
    candidates: Vec<Bindings>,
    store: &FactStore,
    builtins: &HashMap<&'static str, BuiltinFn>,
) -> Result<Vec<Bindings>, EvaluationError> {
    match clause {
        Clause::AtomClause(atom) => {
            let mut out = Vec::new();
            for bindings in candidates {
                for fact in store.get(&atom.predicate) {
                    if fact.args.len() != atom.terms.len() {
                        continue;
                    }
                    if let Some(extended) = unify(&atom.terms, &fact.args, &bindings) {
                        out.push(extended);
                    }
                }
            }
            Ok(out)
        }
        Clause::Negation(atom) => {
            let mut out = Vec::new();
            for bindings in candidates {
                let matched = store.get(&atom.predicate).iter().any(|fact| {
                    fact.args.len() == atom.terms.len()
                        && unify(&atom.terms, &fact.args, &bindings).is_some()
                });
                if !matched {
                    out.push(bindings);
                }
            }
            Ok(out)
        }
        Clause::Comparison { left, op, right } => {
            let mut out = Vec::new();
            for bindings in candidates {
                let (Some(lv), Some(rv)) = (resolve_term(left, &bindings), resolve_term(right, &bindings))
                else {
                    continue;
                };
                let equal = lv.values_equal(&rv);
                let ord = lv.compare(&rv);
                if op.apply(ord, equal) {
                    out.push(bindings);
                }
            }
            Ok(out)
        }
        Clause::Assignment { var, expr } => {
            let mut out = Vec::new();
            for mut bindings in candidates {
                match eval_expression(expr, &bindings, builtins) {
                    Ok(value) => {
                        bindings.insert(var.clone(), value);
                        out.push(bindings);
                    }
                    // Division by zero is the one evaluation error that's
                    // fatal rather than a per-candidate drop (`spec.md` §7).
                    Err(EvaluationError::DivisionByZero) => {
                        return Err(EvaluationError::DivisionByZero)
                    }
                    Err(_) => continue,
                }
            }
            Ok(out)
        }
        Clause::Aggregation {
            op,
            var,
            body,
            into,
        } => {
            let mut out = Vec::new();
            for bindings in candidates {
                let rows = eval_body_from(body, vec![bindings.clone()], store, builtins)?;
                let values: Vec<f64> = rows
                    .iter()
                    .filter_map(|row| match (op, var) {
                        (AggregateOp::Count, _) => Some(1.0),
                        (_, Some(v)) => row.get(v).and_then(Value::as_f64),
                        (_, None) => None,
                    })
                    .collect();
                let reduced = match op {
                    AggregateOp::Count => Some(values.len() as f64),
                    AggregateOp::Sum => Some(values.iter().sum()),
                    AggregateOp::Max => {
                        if values.is_empty() {
                            None
                        } else {
                            values.iter().cloned().fold(f64::NEG_INFINITY, f64::max).into()
                        }
                    }
                    AggregateOp::Min => {
                        if values.is_empty() {
                            None
                        } else {
                            values.iter().cloned().fold(f64::INFINITY, f64::min).into()
                        }
                    }
                    AggregateOp::Avg => {
                        if values.is_empty() {
                            None
                        } else {
                            Some(values.iter().sum::<f64>() / values.len() as f64)
                        }
                    }
                };
                if let Some(v) = reduced {
                    let mut extended = bindings;
                    extended.insert(into.clone(), numeric_value(v));
                    out.push(extended);
                }
            }
            Ok(out)
        }
    }
}

/// Represents a float as `Value::Int` when it's a whole number, else as
/// `Value::Float` — keeps aggregate results printing without a spurious
/// `.0` while still comparing numerically like any other value.
fn numeric_value(v: f64) -> Value {
    if v.fract() == 0.0 && v.is_finite() && v.abs() < i64::MAX as f64 {
        Value::Int(v as i64)
    } else {
        Value::Float(v)
    }
}

/// Unifies an atom's terms against a fact's ground arguments under the
/// given bindings. Variables bind if fresh, or must equal the already
/// bound value; constants must equal the fact value; wildcards match
/// anything. Returns the extended bindings on success.
fn unify(terms: &[Term], args: &[Value], bindings: &Bindings) -> Option<Bindings> {
    let mut extended = bindings.clone();
    for (term, value) in terms.iter().zip(args) {
        match term {
            Term::Wildcard => {}
            Term::Variable(name) => match extended.get(name) {
                Some(existing) => {
                    if !existing.values_equal(value) {
                        return None;
                    }
                }
                None => {
                    extended.insert(name.clone(), value.clone());
                }
            },
            Term::Constant(c) => {
                if !c.values_equal(value) {
                    return None;
                }
            }
        }
    }
    Some(extended)
}

fn resolve_term(term: &Term, bindings: &Bindings) -> Option<Value> {
    match term {
        Term::Variable(v) => bindings.get(v).cloned(),
        Term::Constant(c) => Some(c.clone()),
        Term::Wildcard => None,
    }
}

fn eval_expression(
    expr: &Expression,
    bindings: &Bindings,
    builtins: &HashMap<&'static str, BuiltinFn>,
) -> Result<Value, EvaluationError> {
    match expr {
        Expression::Term(t) => resolve_term(t, bindings)
            .ok_or_else(|| EvaluationError::NotNumeric("unresolved term".to_string())),
        Expression::Binary { left, op, right } => {
            let l = eval_expression(left, bindings, builtins)?;
            let r = eval_expression(right, bindings, builtins)?;
            let lf = l
                .as_f64()
                .ok_or_else(|| EvaluationError::NotNumeric(l.canonical_string()))?;
            let rf = r
                .as_f64()
                .ok_or_else(|| EvaluationError::NotNumeric(r.canonical_string()))?;
            use crate::ast::ArithOp::*;
            let result = match op {
                Add => lf + rf,
                Sub => lf - rf,
                Mul => lf * rf,
                Div => {
                    if rf == 0.0 {
                        return Err(EvaluationError::DivisionByZero);
                    }
                    lf / rf
                }
                Mod => {
                    if rf == 0.0 {
                        return Err(EvaluationError::DivisionByZero);
                    }
                    lf % rf
                }
            };
            Ok(numeric_value(result))
        }
        Expression::Call { name, args } => {
            let values = args
                .iter()
                .map(|a| eval_expression(a, bindings, builtins))
                .collect::<Result<Vec<_>, _>>()?;
            let f = builtins
                .get(name.as_str())
                .ok_or_else(|| EvaluationError::UnknownFunction(name.clone()))?;
            f(&values)
        }
    }
}

/// Instantiates a rule head against a binding set. If any head variable is
/// unbound, returns `None` — the derived fact is silently dropped, per
/// `spec.md` §3 and §7 ("unresolved heads silently drop the fact").
fn instantiate_head(head: &Atom, bindings: &Bindings) -> Option<Fact> {
    let mut args = Vec::with_capacity(head.terms.len());
    for term in &head.terms {
        match term {
            Term::Constant(c) => args.push(c.clone()),
            Term::Variable(v) => args.push(bindings.get(v)?.clone()),
            Term::Wildcard => return None,
        }
    }
    Some(Fact::new(head.predicate.clone(), args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    fn run(program_src: &str, facts: Vec<Fact>) -> Engine {
        let program = parse_program(program_src).unwrap();
        let mut engine = Engine::new();
        engine.add_facts(facts);
        engine.load_rules(&program);
        engine.evaluate().unwrap();
        engine
    }

    #[test]
    fn s4_negation_as_failure() {
        let engine = run(
            "orphan(?X) :- has_target(?X), not is_actionable(?X).",
            vec![Fact::new("has_target", vec![Value::Int(0)])],
        );
        let atom = Atom::new("orphan", vec![Term::var("X")]);
        assert_eq!(engine.query_count(&atom).unwrap(), 1);
    }

    #[test]
    fn a_derived_fact_is_visible_to_a_later_rule_in_the_same_pass() {
        // `missing` negates `derived`, and `derived` is produced by the
        // rule immediately before it in source order. If facts were batched
        // per iteration instead of inserted immediately, `missing` would
        // evaluate against the pre-iteration snapshot (no `derived` facts
        // yet) and wrongly conclude `missing(1)`, which the monotone store
        // would then keep forever.
        let engine = run(
            "derived(?X) :- base(?X), flag(?X). missing(?X) :- base(?X), not derived(?X).",
            vec![
                Fact::new("base", vec![Value::Int(1)]),
                Fact::new("flag", vec![Value::Int(1)]),
            ],
        );
        let missing = Atom::new("missing", vec![Term::var("X")]);
        assert_eq!(engine.query_count(&missing).unwrap(), 0);
        let derived = Atom::new("derived", vec![Term::var("X")]);
        assert_eq!(engine.query_count(&derived).unwrap(), 1);
    }

    #[test]
    fn aggregation_is_constrained_by_the_enclosing_group_key() {
        // The aggregate's nested body must see ?C already bound from the
        // outer atom, so each category's sum only includes its own rows
        // rather than the sum across every category.
        let engine = run(
            "cat_total(?C, ?S) :- category(?C), aggregate(sum(?D), event_time(?C, ?D), ?S).",
            vec![
                Fact::new("category", vec![Value::String("a".into())]),
                Fact::new("category", vec![Value::String("b".into())]),
                Fact::new("event_time", vec![Value::String("a".into()), Value::Int(10)]),
                Fact::new("event_time", vec![Value::String("a".into()), Value::Int(20)]),
                Fact::new("event_time", vec![Value::String("b".into()), Value::Int(5)]),
            ],
        );
        let atom = Atom::new("cat_total", vec![Term::var("C"), Term::var("S")]);
        let results = engine.query(&atom).unwrap();
        assert_eq!(results.len(), 2);
        for bindings in results {
            match bindings.get("C").unwrap() {
                Value::String(c) if c == "a" => {
                    assert_eq!(bindings.get("S"), Some(&Value::Int(30)))
                }
                Value::String(c) if c == "b" => {
                    assert_eq!(bindings.get("S"), Some(&Value::Int(5)))
                }
                other => panic!("unexpected category {other:?}"),
            }
        }
    }

    #[test]
    fn s5_aggregate_and_comparison() {
        let engine = run(
            "hot(?T) :- target_time(?T, ?D), ?P = (?D * 100) / 1000, ?P > 50.",
            vec![
                Fact::new("target_time", vec![Value::String("//x".into()), Value::Int(800)]),
                Fact::new("target_time", vec![Value::String("//y".into()), Value::Int(200)]),
                Fact::new("total_duration", vec![Value::Int(1000)]),
            ],
        );
        let atom = Atom::new("hot", vec![Term::var("T")]);
        let results = engine.query(&atom).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get("T"), Some(&Value::String("//x".into())));
    }

    #[test]
    fn transitive_closure_fixpoint() {
        let engine = run(
            r#"
            edge("a", "b").
            edge("b", "c").
            path(?X, ?Y) :- edge(?X, ?Y).
            path(?X, ?Z) :- path(?X, ?Y), edge(?Y, ?Z).
            "#,
            vec![],
        );
        let atom = Atom::new("path", vec![Term::var("X"), Term::var("Y")]);
        assert_eq!(engine.query_count(&atom).unwrap(), 3);
    }

    #[test]
    fn monotonicity_second_evaluate_is_idempotent() {
        let program = parse_program(
            r#"
            edge("a", "b").
            path(?X, ?Y) :- edge(?X, ?Y).
            "#,
        )
        .unwrap();
        let mut engine = Engine::new();
        engine.load_rules(&program);
        engine.evaluate().unwrap();
        let before = engine.fact_count();
        engine.evaluate().unwrap();
        assert_eq!(before, engine.fact_count());
    }

    #[test]
    fn division_by_zero_is_fatal() {
        let mut engine = Engine::new();
        let program = parse_program("bad(?X) :- a(?X), ?Y = ?X / 0.").unwrap();
        engine.add_fact(Fact::new("a", vec![Value::Int(1)]));
        engine.load_rules(&program);
        assert!(engine.evaluate().is_err());
    }

    #[test]
    fn unbound_head_variable_drops_fact() {
        // ?Y never appears in the body; instantiation must drop the fact,
        // not panic.
        let mut engine = Engine::new();
        let program = parse_program("derived(?X, ?Y) :- a(?X).").unwrap();
        engine.add_fact(Fact::new("a", vec![Value::Int(1)]));
        engine.load_rules(&program);
        engine.evaluate().unwrap();
        let atom = Atom::new("derived", vec![Term::Wildcard, Term::Wildcard]);
        assert_eq!(engine.query_count(&atom).unwrap(), 0);
    }
}

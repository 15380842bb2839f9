//! # Fact Builder
//!
//! Lifts an ordered sequence of trace events into ground facts across the
//! fixed predicate set of `spec.md` §4.3. Grouped/aggregate emissions are
//! sorted by their grouping key before emission for deterministic output
//! (`spec.md` §9 Open Question (b): ascending lexicographic order on the
//! category/mnemonic/target string).

use crate::engine::Fact;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};

/// One trace event, per the trace-event contract of `spec.md` §6.2. Only
/// complete duration records (`duration_us > 0`) should be passed in —
/// filtering incomplete records is the collaborator's responsibility.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub name: String,
    pub category: String,
    pub start_us: f64,
    pub duration_us: f64,
    pub pid: Option<i64>,
    pub tid: Option<i64>,
    pub args: HashMap<String, Value>,
}

const ACTIONABLE_CATEGORIES: &[&str] = &[
    "action processing",
    "complete action execution",
    "Fetching repository",
    "package creation",
];

const SYSTEM_CATEGORIES: &[&str] = &[
    "general information",
    "build phase marker",
    "gc notification",
    "skyframe evaluator",
    "action count (local)",
    "critical path component",
    "Conflict checking",
    "bazel module processing",
];

fn non_empty_target(ev: &TraceEvent) -> Option<&str> {
    match ev.args.get("target") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
        _ => None,
    }
}

fn mnemonic(ev: &TraceEvent) -> Option<&str> {
    match ev.args.get("mnemonic") {
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

fn is_actionable(ev: &TraceEvent) -> bool {
    non_empty_target(ev).is_some()
        || (ACTIONABLE_CATEGORIES.contains(&ev.category.as_str()) && mnemonic(ev).is_some())
}

fn is_system(ev: &TraceEvent) -> bool {
    SYSTEM_CATEGORIES.contains(&ev.category.as_str())
}

fn fact(pred: &str, args: Vec<Value>) -> Fact {
    Fact::new(pred, args)
}

fn s(v: impl Into<String>) -> Value {
    Value::String(v.into())
}

fn i(v: i64) -> Value {
    Value::Int(v)
}

fn fl(v: f64) -> Value {
    Value::Float(v)
}

/// Sweeps start/end time points to find the maximum number of events active
/// at any instant, per `spec.md` §4.3's "Max concurrency" sweep. Start
/// points at the same timestamp as an end point are ordered strictly
/// before it, so a closed-then-reopened interval boundary doesn't
/// undercount.
fn max_concurrency(events: &[TraceEvent]) -> i64 {
    #[derive(PartialEq, Eq, PartialOrd, Ord)]
    enum Kind {
        Start,
        End,
    }
    let mut points: Vec<(ordered_float_bits, Kind)> = Vec::new();
    for ev in events {
        points.push((bits(ev.start_us), Kind::Start));
        points.push((bits(ev.start_us + ev.duration_us), Kind::End));
    }
    points.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut running = 0i64;
    let mut max = 0i64;
    for (_, kind) in points {
        match kind {
            Kind::Start => {
                running += 1;
                max = max.max(running);
            }
            Kind::End => running -= 1,
        }
    }
    max
}

// f64 doesn't implement Ord; this is a total order over finite timestamps
// sufficient for the sweep (trace timestamps are never NaN).
#[allow(non_camel_case_types)]
type ordered_float_bits = i64;
fn bits(v: f64) -> ordered_float_bits {
    (v * 1000.0).round() as i64
}

/// Builds the full set of ground facts for one trace, per `spec.md` §4.3.
pub fn build_facts(events: &[TraceEvent]) -> Vec<Fact> {
    let mut facts = Vec::new();

    for (idx, ev) in events.iter().enumerate() {
        let idx = idx as i64;
        facts.push(fact(
            "trace_event",
            vec![
                i(idx),
                s(ev.name.clone()),
                s(ev.category.clone()),
                fl(ev.start_us),
                fl(ev.duration_us),
            ],
        ));
        if let Some(tid) = ev.tid {
            facts.push(fact("trace_event_tid", vec![i(idx), i(tid)]));
        }
        if let Some(pid) = ev.pid {
            facts.push(fact("trace_event_pid", vec![i(idx), i(pid)]));
        }
        if let Some(m) = mnemonic(ev) {
            facts.push(fact("trace_event_mnemonic", vec![i(idx), s(m)]));
        }
        if let Some(t) = non_empty_target(ev) {
            facts.push(fact("trace_event_target", vec![i(idx), s(t)]));
            facts.push(fact("has_target", vec![i(idx)]));
        }
        if is_actionable(ev) {
            facts.push(fact("is_actionable", vec![i(idx)]));
        }
        if is_system(ev) {
            facts.push(fact("is_system", vec![i(idx)]));
        }
    }

    let total_duration = events
        .iter()
        .map(|e| e.start_us + e.duration_us)
        .fold(0.0_f64, f64::max);
    let total_action_time: f64 = events.iter().map(|e| e.duration_us).sum();
    let total_actions = events.len() as i64;
    let actionable: Vec<&TraceEvent> = events.iter().filter(|e| is_actionable(e)).collect();
    let actionable_time: f64 = actionable.iter().map(|e| e.duration_us).sum();
    let actionable_count = actionable.len() as i64;

    facts.push(fact("total_duration", vec![fl(total_duration)]));
    facts.push(fact("total_action_time", vec![fl(total_action_time)]));
    facts.push(fact("total_actions", vec![i(total_actions)]));
    facts.push(fact("actionable_time", vec![fl(actionable_time)]));
    facts.push(fact("actionable_count", vec![i(actionable_count)]));
    facts.push(fact("max_concurrency", vec![i(max_concurrency(events))]));

    // Grouped aggregates, sorted ascending by grouping key for determinism.
    let mut by_category: BTreeMap<String, (f64, i64)> = BTreeMap::new();
    for ev in events {
        let entry = by_category.entry(ev.category.clone()).or_default();
        entry.0 += ev.duration_us;
        entry.1 += 1;
    }
    for (cat, (dur, n)) in &by_category {
        facts.push(fact("category_time", vec![s(cat.clone()), fl(*dur)]));
        facts.push(fact("category_count", vec![s(cat.clone()), i(*n)]));
    }

    // Mnemonic aggregates are restricted to events with a target.
    let mut by_mnemonic: BTreeMap<String, (f64, i64)> = BTreeMap::new();
    for ev in events {
        if non_empty_target(ev).is_none() {
            continue;
        }
        if let Some(m) = mnemonic(ev) {
            let entry = by_mnemonic.entry(m.to_string()).or_default();
            entry.0 += ev.duration_us;
            entry.1 += 1;
        }
    }
    for (m, (dur, n)) in &by_mnemonic {
        facts.push(fact("mnemonic_time", vec![s(m.clone()), fl(*dur)]));
        facts.push(fact("mnemonic_count", vec![s(m.clone()), i(*n)]));
    }

    let mut by_target: BTreeMap<String, (f64, i64)> = BTreeMap::new();
    for ev in events {
        if let Some(t) = non_empty_target(ev) {
            let entry = by_target.entry(t.to_string()).or_default();
            entry.0 += ev.duration_us;
            entry.1 += 1;
        }
    }
    for (t, (dur, n)) in &by_target {
        facts.push(fact("target_time", vec![s(t.clone()), fl(*dur)]));
        facts.push(fact("target_count", vec![s(t.clone()), i(*n)]));
    }

    // Critical path: the targeted event whose end time is maximal.
    let targeted: Vec<(usize, &TraceEvent)> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| non_empty_target(e).is_some())
        .collect();
    if let Some((idx, ev)) = targeted
        .iter()
        .max_by(|a, b| (a.1.start_us + a.1.duration_us).total_cmp(&(b.1.start_us + b.1.duration_us)))
    {
        let target = non_empty_target(ev).unwrap_or_default();
        facts.push(fact(
            "critical_path_end",
            vec![i(*idx as i64), s(ev.name.clone()), fl(ev.duration_us), s(target)],
        ));
        let pct = if total_duration > 0.0 {
            ev.duration_us / total_duration * 100.0
        } else {
            0.0
        };
        facts.push(fact("critical_path_percent", vec![fl(pct)]));
    }

    // Top five targeted events by duration, descending.
    let mut sorted_targeted = targeted.clone();
    sorted_targeted.sort_by(|a, b| b.1.duration_us.total_cmp(&a.1.duration_us));
    for (idx, ev) in sorted_targeted.into_iter().take(5) {
        let target = non_empty_target(ev).unwrap_or_default();
        let pct = if total_duration > 0.0 {
            ev.duration_us / total_duration * 100.0
        } else {
            0.0
        };
        facts.push(fact(
            "potential_bottleneck",
            vec![
                i(idx as i64),
                s(ev.name.clone()),
                fl(ev.duration_us),
                fl(pct),
                s(target),
            ],
        ));
    }

    if total_duration > 0.0 {
        for (idx, ev) in events.iter().enumerate() {
            let pct = ev.duration_us / total_duration * 100.0;
            facts.push(fact("event_percent", vec![i(idx as i64), fl(pct)]));
        }
    }

    facts
}

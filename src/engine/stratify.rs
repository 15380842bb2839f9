//! # Stratification check
//!
//! `spec.md` §9 ("Stratified negation") notes the engine performs no
//! explicit stratification check but "an implementation may add one as a
//! build-time validation, reporting cycles that cross negation as a design
//! error." SPEC_FULL takes up that option, grounded in the teacher's
//! `recursion.rs` (`DependencyGraph`, `DependencyType::{Positive,Negative}`,
//! Tarjan SCC). This is additive safety: well-stratified programs evaluate
//! exactly as before.

use crate::ast::{Clause, Rule};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DependencyType {
    Positive,
    Negative,
}

#[derive(Debug, Default)]
struct DependencyGraph {
    edges: HashMap<String, Vec<(String, DependencyType)>>,
    relations: HashSet<String>,
}

impl DependencyGraph {
    fn from_rules(rules: &[Rule]) -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        for rule in rules {
            graph.relations.insert(rule.head.predicate.clone());
            for clause in &rule.body {
                match clause {
                    Clause::AtomClause(atom) => {
                        graph.relations.insert(atom.predicate.clone());
                        graph
                            .edges
                            .entry(rule.head.predicate.clone())
                            .or_default()
                            .push((atom.predicate.clone(), DependencyType::Positive));
                    }
                    Clause::Negation(atom) => {
                        graph.relations.insert(atom.predicate.clone());
                        graph
                            .edges
                            .entry(rule.head.predicate.clone())
                            .or_default()
                            .push((atom.predicate.clone(), DependencyType::Negative));
                    }
                    Clause::Aggregation { body, .. } => {
                        for inner in body {
                            if let Clause::AtomClause(atom) = inner {
                                graph.relations.insert(atom.predicate.clone());
                                graph
                                    .edges
                                    .entry(rule.head.predicate.clone())
                                    .or_default()
                                    .push((atom.predicate.clone(), DependencyType::Positive));
                            }
                        }
                    }
                    Clause::Comparison { .. } | Clause::Assignment { .. } => {}
                }
            }
        }
        graph
    }

    /// Tarjan's strongly-connected-components algorithm over `relations`.
    fn strongly_connected_components(&self) -> Vec<Vec<String>> {
        struct Tarjan<'a> {
            graph: &'a DependencyGraph,
            index: HashMap<String, usize>,
            low_link: HashMap<String, usize>,
            on_stack: HashSet<String>,
            stack: Vec<String>,
            counter: usize,
            sccs: Vec<Vec<String>>,
        }

        impl<'a> Tarjan<'a> {
            fn visit(&mut self, node: &str) {
                self.index.insert(node.to_string(), self.counter);
                self.low_link.insert(node.to_string(), self.counter);
                self.counter += 1;
                self.stack.push(node.to_string());
                self.on_stack.insert(node.to_string());

                if let Some(edges) = self.graph.edges.get(node) {
                    for (target, _) in edges.clone() {
                        if !self.index.contains_key(&target) {
                            self.visit(&target);
                            let low = self.low_link[&target].min(self.low_link[node]);
                            self.low_link.insert(node.to_string(), low);
                        } else if self.on_stack.contains(&target) {
                            let low = self.index[&target].min(self.low_link[node]);
                            self.low_link.insert(node.to_string(), low);
                        }
                    }
                }

                if self.low_link[node] == self.index[node] {
                    let mut component = Vec::new();
                    loop {
                        let w = self.stack.pop().expect("on_stack node must be on stack");
                        self.on_stack.remove(&w);
                        let done = w == node;
                        component.push(w);
                        if done {
                            break;
                        }
                    }
                    self.sccs.push(component);
                }
            }
        }

        let mut tarjan = Tarjan {
            graph: self,
            index: HashMap::new(),
            low_link: HashMap::new(),
            on_stack: HashSet::new(),
            stack: Vec::new(),
            counter: 0,
            sccs: Vec::new(),
        };
        for relation in &self.relations {
            if !tarjan.index.contains_key(relation) {
                tarjan.visit(relation);
            }
        }
        tarjan.sccs
    }
}

/// A negation edge closes a cycle across relations — the rule set cannot
/// be evaluated under stratified negation semantics.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("negation cycle: relation '{from}' negates '{to}', which depends (transitively) back on '{from}'")]
pub struct StratificationError {
    pub from: String,
    pub to: String,
}

/// Reports the first negation edge found to close a cycle, if any.
pub fn check(rules: &[Rule]) -> Result<(), StratificationError> {
    let graph = DependencyGraph::from_rules(rules);
    let sccs = graph.strongly_connected_components();
    let component_of: HashMap<&str, usize> = sccs
        .iter()
        .enumerate()
        .flat_map(|(i, members)| members.iter().map(move |m| (m.as_str(), i)))
        .collect();

    for (from, edges) in &graph.edges {
        for (to, kind) in edges {
            if *kind == DependencyType::Negative
                && component_of.get(from.as_str()) == component_of.get(to.as_str())
            {
                return Err(StratificationError {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
        }
    }
    Ok(())
}

//! # AST
//!
//! The rule language's abstract syntax tree, per `spec.md` §3 (data model)
//! and §4.2 (grammar). `Clause` and `Expression` are closed sum types; the
//! engine dispatches over them with exhaustive `match`, per `spec.md` §9
//! ("Heterogeneous AST").
//!
//! Every node carries a canonical printer (`Display`/`to_source`), grounded
//! in the teacher's many `as_str()`/`Display` impls on AST enums — it backs
//! the lex→parse→print round-trip property (`spec.md` §8 property 3).

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A term: a variable, a ground constant, or the wildcard `_`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Term {
    /// A `?`-prefixed variable name, stored without the leading `?`.
    Variable(String),
    Constant(Value),
    Wildcard,
}

impl Term {
    pub fn var(name: impl Into<String>) -> Term {
        Term::Variable(name.into())
    }

    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Term::Variable(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(v) => write!(f, "?{v}"),
            Term::Wildcard => write!(f, "_"),
            Term::Constant(Value::String(s)) => write!(f, "{}", quote(s)),
            Term::Constant(other) => write!(f, "{other}"),
        }
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// A predicate applied to an ordered list of terms, e.g. `edge(?X, ?Y)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub predicate: String,
    pub terms: Vec<Term>,
}

impl Atom {
    pub fn new(predicate: impl Into<String>, terms: Vec<Term>) -> Atom {
        Atom {
            predicate: predicate.into(),
            terms,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.predicate)?;
        for (i, t) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{t}")?;
        }
        write!(f, ")")
    }
}

/// Comparison operators, per `spec.md` §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    pub fn apply(self, ord: std::cmp::Ordering, equal: bool) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompareOp::Eq => equal,
            CompareOp::Ne => !equal,
            CompareOp::Lt => ord == Less,
            CompareOp::Le => ord == Less || equal,
            CompareOp::Gt => ord == Greater,
            CompareOp::Ge => ord == Greater || equal,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Arithmetic operators for [`Expression::Binary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn as_str(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The right-hand side of an [`Clause::Assignment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Term(Term),
    Binary {
        left: Box<Expression>,
        op: ArithOp,
        right: Box<Expression>,
    },
    Call {
        name: String,
        args: Vec<Expression>,
    },
}

impl Expression {
    /// `Some(term)` if this expression is structurally a single bare term —
    /// used by the parser's Assignment/Comparison tie-breaker (`spec.md`
    /// §4.2, §9 Open Question (a)).
    pub fn as_bare_term(&self) -> Option<&Term> {
        match self {
            Expression::Term(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Term(t) => write!(f, "{t}"),
            Expression::Binary { left, op, right } => write!(f, "{left} {op} {right}"),
            Expression::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Aggregate reduction kinds, per `spec.md` §3/§4.4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateOp {
    Count,
    Sum,
    Max,
    Min,
    Avg,
}

impl AggregateOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
            AggregateOp::Max => "max",
            AggregateOp::Min => "min",
            AggregateOp::Avg => "avg",
        }
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One clause of a rule body; a closed sum type (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clause {
    AtomClause(Atom),
    Comparison {
        left: Term,
        op: CompareOp,
        right: Term,
    },
    Assignment {
        var: String,
        expr: Expression,
    },
    Aggregation {
        op: AggregateOp,
        var: Option<String>,
        body: Vec<Clause>,
        into: String,
    },
    Negation(Atom),
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::AtomClause(a) => write!(f, "{a}"),
            Clause::Comparison { left, op, right } => write!(f, "{left} {op} {right}"),
            Clause::Assignment { var, expr } => write!(f, "?{var} = {expr}"),
            Clause::Aggregation {
                op,
                var,
                body,
                into,
            } => {
                write!(f, "aggregate({op}")?;
                if let Some(v) = var {
                    write!(f, "(?{v})")?;
                }
                write!(f, ", ")?;
                for (i, c) in body.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, ", ?{into})")
            }
            Clause::Negation(a) => write!(f, "not {a}"),
        }
    }
}

fn fmt_body(body: &[Clause], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, c) in body.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}

/// A derivation rule: `head :- body.` (body may be empty — a fact).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub head: Atom,
    pub body: Vec<Clause>,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.body.is_empty() {
            write!(f, "{}.", self.head)
        } else {
            write!(f, "{} :- ", self.head)?;
            fmt_body(&self.body, f)?;
            write!(f, ".")
        }
    }
}

/// One `[label, value]` row of a [`SuggestionTemplate`]'s `metrics` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTemplate {
    pub label: String,
    pub value: String,
}

/// The `then:` half of a [`SuggestionRule`] — every field is a template
/// string containing `{Name}`/`{?Name}` placeholders (`spec.md` §3, §4.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionTemplate {
    pub suggestion_type: String,
    pub impact: String,
    pub title: String,
    pub body: String,
    pub target: Option<String>,
    pub metrics: Vec<MetricTemplate>,
}

impl fmt::Display for SuggestionTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "suggestion({}, {}, {}, {}",
            self.suggestion_type,
            self.impact,
            quote(&self.title),
            quote(&self.body)
        )?;
        if let Some(target) = &self.target {
            write!(f, ", {}", quote(target))?;
            if !self.metrics.is_empty() {
                write!(f, ", [")?;
                for (i, m) in self.metrics.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[{}, {}]", quote(&m.label), quote(&m.value))?;
                }
                write!(f, "]")?;
            }
        }
        write!(f, ")")
    }
}

/// A `rule NAME { when: ... . then: ... . }` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRule {
    pub id: String,
    pub conditions: Vec<Clause>,
    pub template: SuggestionTemplate,
}

impl fmt::Display for SuggestionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rule {} {{", self.id)?;
        write!(f, "  when: ")?;
        fmt_body(&self.conditions, f)?;
        writeln!(f, ".")?;
        writeln!(f, "  then: {}.", self.template)?;
        write!(f, "}}")
    }
}

/// The parsed contents of one or more rule-file texts: an ordered list of
/// derivation rules and an ordered list of suggestion rules (`spec.md` §3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub rules: Vec<Rule>,
    pub suggestion_rules: Vec<SuggestionRule>,
}

impl Program {
    pub fn new() -> Program {
        Program::default()
    }

    /// Merge another program's rules into this one, preserving order.
    pub fn extend(&mut self, other: Program) {
        self.rules.extend(other.rules);
        self.suggestion_rules.extend(other.suggestion_rules);
    }

    /// Canonical source text: re-parsing this output must yield a
    /// structurally equal `Program` (`spec.md` §8 property 3).
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        for r in &self.rules {
            out.push_str(&r.to_string());
            out.push('\n');
        }
        for sr in &self.suggestion_rules {
            out.push_str(&sr.to_string());
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_source())
    }
}

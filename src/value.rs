//! # Value
//!
//! The dynamic value kind shared by facts, constants and bindings: a small
//! closed set of kinds (string | integer | floating-point | boolean), per
//! `spec.md` §9 ("Dynamic value kind"). Numeric comparisons coerce to
//! floating-point; equality falls back to canonical string form when the
//! operands don't both convert to numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A ground value: the only shape a [`crate::ast::Term::Constant`], a fact
/// argument, or a binding's right-hand side can take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Value {
    /// Attempts to view this value as `f64`, the coercion arithmetic and
    /// numeric comparisons use.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.parse::<f64>().ok(),
        }
    }

    /// Canonical printed form, used as the equality/ordering fallback when
    /// a numeric coercion is not available on both sides.
    pub fn canonical_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Bool(b) => b.to_string(),
        }
    }

    /// Numeric equality if both sides convert, else canonical-string equality.
    pub fn values_equal(&self, other: &Value) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self.canonical_string() == other.canonical_string(),
        }
    }

    /// Numeric ordering if both sides convert, else lexicographic ordering
    /// over the canonical printed forms.
    pub fn compare(&self, other: &Value) -> std::cmp::Ordering {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
            _ => self.canonical_string().cmp(&other.canonical_string()),
        }
    }

    /// `true` for every value except the boolean `false`; used nowhere in
    /// the core semantics but kept for symmetry with the teacher's `Value`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }
}

/// Renders a float the way the suggestion templating layer wants: a whole
/// number without a fractional part, otherwise one decimal digit.
pub fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() {
        format!("{}", f as i64)
    } else {
        format!("{f:.1}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Hash-friendly canonical key used by the fact store's duplicate index
/// (`spec.md` §9 "Monotone fact store").
pub fn canonical_key(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| match v {
            Value::String(s) => format!("s:{s}"),
            Value::Int(i) => format!("i:{i}"),
            Value::Float(fl) => format!("f:{fl}"),
            Value::Bool(b) => format!("b:{b}"),
        })
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

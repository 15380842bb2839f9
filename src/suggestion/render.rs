//! # Template rendering
//!
//! Fills in `{Name}`/`{?Name}` placeholders in a [`SuggestionTemplate`]'s
//! string fields against a satisfying [`Bindings`] set, per `spec.md` §4.5.

use crate::ast::SuggestionTemplate;
use crate::engine::{format_time, Bindings};
use crate::value::Value;

/// Every field of a [`SuggestionTemplate`] rendered against one binding set.
pub struct RenderedTemplate {
    pub suggestion_type: String,
    pub impact: String,
    pub title: String,
    pub body: String,
    pub target: String,
    pub metrics: Vec<(String, String)>,
}

/// Renders every field of `template` against `bindings` (`spec.md` §4.5).
pub fn render_template(template: &SuggestionTemplate, bindings: &Bindings) -> RenderedTemplate {
    RenderedTemplate {
        suggestion_type: render(&template.suggestion_type, bindings),
        impact: render(&template.impact, bindings),
        title: render(&template.title, bindings),
        body: render(&template.body, bindings),
        target: template
            .target
            .as_ref()
            .map(|t| render(t, bindings))
            .unwrap_or_default(),
        metrics: template
            .metrics
            .iter()
            .map(|m| (render(&m.label, bindings), render_metric_value(&m.value, bindings)))
            .collect(),
    }
}

/// `true` if `s` (already trimmed) is a single bare `?Name` placeholder with
/// nothing else around it.
fn as_bare_variable(s: &str) -> Option<&str> {
    let rest = s.strip_prefix('?')?;
    if !rest.is_empty() && rest.chars().all(|c| c.is_alphanumeric() || c == '_') {
        Some(rest)
    } else {
        None
    }
}

/// Renders one template string: if the whole string is a single `?Name`,
/// it's replaced outright with the bound value; otherwise every `{Name}` or
/// `{?Name}` occurrence is substituted, left verbatim when unbound
/// (`spec.md` §4.5).
pub fn render(template: &str, bindings: &Bindings) -> String {
    if let Some(name) = as_bare_variable(template.trim()) {
        if let Some(v) = bindings.get(name) {
            return v.to_string();
        }
    }
    substitute_braces(template, bindings)
}

fn substitute_braces(template: &str, bindings: &Bindings) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < template.len() {
        if bytes[i] == b'{' {
            if let Some(rel_end) = template[i..].find('}') {
                let end = i + rel_end;
                let inner = &template[i + 1..end];
                let name = inner.strip_prefix('?').unwrap_or(inner);
                match bindings.get(name) {
                    Some(v) => out.push_str(&v.to_string()),
                    None => out.push_str(&template[i..=end]),
                }
                i = end + 1;
                continue;
            }
        }
        let ch = template[i..].chars().next().expect("i < len");
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Renders a metric value: `format_time(?V)` is evaluated specially (running
/// `format_time` on the bound numeric value of `?V`), everything else
/// follows the normal `render` rules (`spec.md` §4.5).
pub fn render_metric_value(value: &str, bindings: &Bindings) -> String {
    let trimmed = value.trim();
    if let Some(inner) = trimmed
        .strip_prefix("format_time(")
        .and_then(|s| s.strip_suffix(')'))
    {
        if let Some(name) = as_bare_variable(inner.trim()) {
            if let Some(v) = bindings.get(name).and_then(Value::as_f64) {
                return format_time(v);
            }
        }
    }
    render(value, bindings)
}

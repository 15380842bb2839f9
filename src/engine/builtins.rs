//! Built-in functions callable from rule expressions, per `spec.md` §4.4.2.
//! Unknown function name or wrong arity surfaces as an [`EvaluationError`]
//! that the caller (an [`Clause::Assignment`]) turns into "no candidates"
//! rather than aborting the fixpoint (`spec.md` §7).

use crate::error::EvaluationError;
use crate::value::Value;
use std::collections::HashMap;

pub type BuiltinFn = fn(&[Value]) -> Result<Value, EvaluationError>;

fn arity_error(name: &str, expected: usize, got: usize) -> EvaluationError {
    EvaluationError::WrongArity {
        name: name.to_string(),
        expected,
        got,
    }
}

fn num(v: &Value) -> Result<f64, EvaluationError> {
    v.as_f64()
        .ok_or_else(|| EvaluationError::NotNumeric(v.canonical_string()))
}

fn text(v: &Value) -> String {
    v.canonical_string()
}

fn abs_fn(args: &[Value]) -> Result<Value, EvaluationError> {
    if args.len() != 1 {
        return Err(arity_error("abs", 1, args.len()));
    }
    Ok(Value::Float(num(&args[0])?.abs()))
}

fn round_fn(args: &[Value]) -> Result<Value, EvaluationError> {
    if args.len() != 1 {
        return Err(arity_error("round", 1, args.len()));
    }
    Ok(Value::Int(num(&args[0])?.round() as i64))
}

fn floor_fn(args: &[Value]) -> Result<Value, EvaluationError> {
    if args.len() != 1 {
        return Err(arity_error("floor", 1, args.len()));
    }
    Ok(Value::Int(num(&args[0])?.floor() as i64))
}

fn ceil_fn(args: &[Value]) -> Result<Value, EvaluationError> {
    if args.len() != 1 {
        return Err(arity_error("ceil", 1, args.len()));
    }
    Ok(Value::Int(num(&args[0])?.ceil() as i64))
}

fn min_fn(args: &[Value]) -> Result<Value, EvaluationError> {
    if args.len() != 2 {
        return Err(arity_error("min", 2, args.len()));
    }
    Ok(Value::Float(num(&args[0])?.min(num(&args[1])?)))
}

fn max_fn(args: &[Value]) -> Result<Value, EvaluationError> {
    if args.len() != 2 {
        return Err(arity_error("max", 2, args.len()));
    }
    Ok(Value::Float(num(&args[0])?.max(num(&args[1])?)))
}

fn round_to_fn(args: &[Value]) -> Result<Value, EvaluationError> {
    if args.len() != 2 {
        return Err(arity_error("round_to", 2, args.len()));
    }
    let v = num(&args[0])?;
    let places = num(&args[1])? as i32;
    let factor = 10f64.powi(places);
    Ok(Value::Float((v * factor).round() / factor))
}

/// Renders microseconds as a human-readable duration, per `spec.md` §6.4.
pub fn format_time(us: f64) -> String {
    if us < 1000.0 {
        format!("{us:.0}\u{3bc}s")
    } else if us < 1_000_000.0 {
        format!("{:.1}ms", us / 1000.0)
    } else if us < 60.0 * 1_000_000.0 {
        format!("{:.2}s", us / 1_000_000.0)
    } else if us < 3600.0 * 1_000_000.0 {
        let total_secs = (us / 1_000_000.0) as i64;
        let minutes = total_secs / 60;
        let secs = total_secs % 60;
        format!("{minutes:.0}m {secs}s")
    } else {
        let total_mins = (us / 1_000_000.0 / 60.0) as i64;
        let hours = total_mins / 60;
        let mins = total_mins % 60;
        format!("{hours:.0}h {mins}m")
    }
}

fn format_time_fn(args: &[Value]) -> Result<Value, EvaluationError> {
    if args.len() != 1 {
        return Err(arity_error("format_time", 1, args.len()));
    }
    Ok(Value::String(format_time(num(&args[0])?)))
}

fn format_percent_fn(args: &[Value]) -> Result<Value, EvaluationError> {
    if args.len() != 1 {
        return Err(arity_error("format_percent", 1, args.len()));
    }
    Ok(Value::String(format!("{:.1}%", num(&args[0])?)))
}

fn format_number_fn(args: &[Value]) -> Result<Value, EvaluationError> {
    if args.len() != 1 {
        return Err(arity_error("format_number", 1, args.len()));
    }
    let v = num(&args[0])? as i64;
    let neg = v < 0;
    let digits: Vec<char> = v.unsigned_abs().to_string().chars().rev().collect();
    let mut grouped = String::new();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }
    let mut out: String = grouped.chars().rev().collect();
    if neg {
        out.insert(0, '-');
    }
    Ok(Value::String(out))
}

fn truncate_fn(args: &[Value]) -> Result<Value, EvaluationError> {
    if args.len() != 2 {
        return Err(arity_error("truncate", 2, args.len()));
    }
    let s = text(&args[0]);
    let n = num(&args[1])? as usize;
    if s.chars().count() > n {
        let truncated: String = s.chars().take(n).collect();
        Ok(Value::String(format!("{truncated}...")))
    } else {
        Ok(Value::String(s))
    }
}

fn concat_fn(args: &[Value]) -> Result<Value, EvaluationError> {
    Ok(Value::String(args.iter().map(text).collect()))
}

fn contains_fn(args: &[Value]) -> Result<Value, EvaluationError> {
    if args.len() != 2 {
        return Err(arity_error("contains", 2, args.len()));
    }
    Ok(Value::Bool(text(&args[0]).contains(&text(&args[1]))))
}

fn starts_with_fn(args: &[Value]) -> Result<Value, EvaluationError> {
    if args.len() != 2 {
        return Err(arity_error("starts_with", 2, args.len()));
    }
    Ok(Value::Bool(text(&args[0]).starts_with(&text(&args[1]))))
}

fn ends_with_fn(args: &[Value]) -> Result<Value, EvaluationError> {
    if args.len() != 2 {
        return Err(arity_error("ends_with", 2, args.len()));
    }
    Ok(Value::Bool(text(&args[0]).ends_with(&text(&args[1]))))
}

pub fn default_builtins() -> HashMap<&'static str, BuiltinFn> {
    let mut m: HashMap<&'static str, BuiltinFn> = HashMap::new();
    m.insert("abs", abs_fn);
    m.insert("round", round_fn);
    m.insert("floor", floor_fn);
    m.insert("ceil", ceil_fn);
    m.insert("min", min_fn);
    m.insert("max", max_fn);
    m.insert("round_to", round_to_fn);
    m.insert("format_time", format_time_fn);
    m.insert("format_percent", format_percent_fn);
    m.insert("format_number", format_number_fn);
    m.insert("truncate", truncate_fn);
    m.insert("concat", concat_fn);
    m.insert("contains", contains_fn);
    m.insert("starts_with", starts_with_fn);
    m.insert("ends_with", ends_with_fn);
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_time_buckets() {
        assert_eq!(format_time(500.0), "500\u{3bc}s");
        assert_eq!(format_time(1_500.0), "1.5ms");
        assert_eq!(format_time(1_500_000.0), "1.50s");
        assert_eq!(format_time(65_000_000.0), "1m 5s");
        assert_eq!(format_time(3_700_000_000.0), "1h 1m");
    }

    #[test]
    fn format_number_groups_thousands() {
        let v = format_number_fn(&[Value::Int(1234567)]).unwrap();
        assert_eq!(v, Value::String("1,234,567".to_string()));
    }

    #[test]
    fn truncate_adds_ellipsis_only_when_over_length() {
        let v = truncate_fn(&[Value::String("hello world".into()), Value::Int(5)]).unwrap();
        assert_eq!(v, Value::String("hello...".to_string()));
        let v2 = truncate_fn(&[Value::String("hi".into()), Value::Int(5)]).unwrap();
        assert_eq!(v2, Value::String("hi".to_string()));
    }

    #[test]
    fn wrong_arity_is_an_error() {
        assert!(abs_fn(&[]).is_err());
    }
}

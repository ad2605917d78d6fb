//! Interpreter for compiled predicate and projection expressions.
//!
//! Evaluation is pure: one expression, one row payload, one value out.
//! `and`/`or` short-circuit. Division and modulo by zero are typed
//! failures the owning filter turns into a dropped row.

use std::cmp::Ordering;

use chrono::{DateTime, Duration as Span};
use sl_lang::plan::{BinOp, ScalarExpr};

use crate::error::EvalError;
use crate::value::Value;

/// Evaluate an expression against a row payload.
pub fn eval(expr: &ScalarExpr, payload: &[Value]) -> Result<Value, EvalError> {
    match expr {
        ScalarExpr::IntLit(n) => Ok(Value::Int(*n)),
        ScalarExpr::FloatLit(f) => Ok(Value::Float(*f)),
        ScalarExpr::TextLit(s) => Ok(Value::Text(s.clone())),
        ScalarExpr::TimeLit(nanos) => {
            Ok(Value::Time(DateTime::from_timestamp_nanos(*nanos).fixed_offset()))
        }
        ScalarExpr::SpanLit(nanos) => Ok(Value::Span(Span::nanoseconds(*nanos))),
        ScalarExpr::Field { index, .. } => payload
            .get(*index)
            .cloned()
            .ok_or(EvalError::MissingField(*index)),
        ScalarExpr::Not(inner) => match eval(inner, payload)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(EvalError::TypeMismatch(type_name(&other))),
        },
        ScalarExpr::Binary { op, left, right } => eval_binary(*op, left, right, payload),
    }
}

/// Evaluate a predicate; the compiled expression is boolean by
/// construction.
pub fn eval_predicate(expr: &ScalarExpr, payload: &[Value]) -> Result<bool, EvalError> {
    match eval(expr, payload)? {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::TypeMismatch(type_name(&other))),
    }
}

fn type_name(v: &Value) -> &'static str {
    v.type_name()
}

// ---------------------------------------------------------------------------
// Binary operators
// ---------------------------------------------------------------------------

fn eval_binary(
    op: BinOp,
    left: &ScalarExpr,
    right: &ScalarExpr,
    payload: &[Value],
) -> Result<Value, EvalError> {
    // Connectors short-circuit before the right side is touched.
    match op {
        BinOp::And => {
            return match eval_predicate(left, payload)? {
                false => Ok(Value::Bool(false)),
                true => Ok(Value::Bool(eval_predicate(right, payload)?)),
            };
        }
        BinOp::Or => {
            return match eval_predicate(left, payload)? {
                true => Ok(Value::Bool(true)),
                false => Ok(Value::Bool(eval_predicate(right, payload)?)),
            };
        }
        _ => {}
    }

    let lv = eval(left, payload)?;
    let rv = eval(right, payload)?;
    if op.is_comparison() {
        let ord = compare(&lv, &rv)?;
        return Ok(Value::Bool(match op {
            BinOp::Eq => ord == Some(Ordering::Equal),
            BinOp::Ne => ord != Some(Ordering::Equal),
            BinOp::Lt => ord == Some(Ordering::Less),
            BinOp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
            BinOp::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            BinOp::Gt => ord == Some(Ordering::Greater),
            _ => unreachable!("comparison op"),
        }));
    }
    arithmetic(op, lv, rv)
}

/// Compare two values of a compatible type pair. `None` stands for an
/// unordered float comparison (NaN involved).
fn compare(lv: &Value, rv: &Value) -> Result<Option<Ordering>, EvalError> {
    use Value::*;
    Ok(match (lv, rv) {
        (Int(a), Int(b)) => Some(a.cmp(b)),
        (Float(a), Float(b)) => a.partial_cmp(b),
        (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
        (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
        (Text(a), Text(b)) => Some(a.cmp(b)),
        (Bool(a), Bool(b)) => Some(a.cmp(b)),
        // Instants compare as instants, offsets notwithstanding.
        (Time(a), Time(b)) => Some(Value::time_nanos(a).cmp(&Value::time_nanos(b))),
        (Span(a), Span(b)) => Some(a.cmp(b)),
        _ => return Err(EvalError::TypeMismatch(lv.type_name())),
    })
}

fn arithmetic(op: BinOp, lv: Value, rv: Value) -> Result<Value, EvalError> {
    use Value::*;
    match (op, lv, rv) {
        // timestamp and duration arithmetic
        (BinOp::Add, Time(t), Span(d)) | (BinOp::Add, Span(d), Time(t)) => t
            .checked_add_signed(d)
            .map(Time)
            .ok_or(EvalError::TimestampRange),
        (BinOp::Sub, Time(t), Span(d)) => t
            .checked_sub_signed(d)
            .map(Time)
            .ok_or(EvalError::TimestampRange),
        (BinOp::Sub, Time(a), Time(b)) => Ok(Span(a.signed_duration_since(b))),
        (BinOp::Add, Span(a), Span(b)) => {
            a.checked_add(&b).map(Span).ok_or(EvalError::TimestampRange)
        }
        (BinOp::Sub, Span(a), Span(b)) => {
            a.checked_sub(&b).map(Span).ok_or(EvalError::TimestampRange)
        }
        // Alignment test: nanoseconds since the epoch modulo the duration.
        // `t % d == 0` holds exactly when t sits on a multiple of d.
        (BinOp::Mod, Time(t), Span(d)) => {
            let width = d.num_nanoseconds().ok_or(EvalError::TimestampRange)?;
            if width == 0 {
                return Err(EvalError::ModuloByZero);
            }
            Ok(Int(Value::time_nanos(&t).rem_euclid(width)))
        }

        // numeric arithmetic, int64 promoted to float64 on mixing
        (op, Int(a), Int(b)) => int_arithmetic(op, a, b),
        (op, Float(a), Float(b)) => float_arithmetic(op, a, b),
        (op, Int(a), Float(b)) => float_arithmetic(op, a as f64, b),
        (op, Float(a), Int(b)) => float_arithmetic(op, a, b as f64),

        (_, lv, _) => Err(EvalError::TypeMismatch(lv.type_name())),
    }
}

fn int_arithmetic(op: BinOp, a: i64, b: i64) -> Result<Value, EvalError> {
    let v = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            a.wrapping_div(b)
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(EvalError::ModuloByZero);
            }
            a.wrapping_rem(b)
        }
        _ => return Err(EvalError::TypeMismatch("integer64")),
    };
    Ok(Value::Int(v))
}

fn float_arithmetic(op: BinOp, a: f64, b: f64) -> Result<Value, EvalError> {
    let v = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            a / b
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(EvalError::ModuloByZero);
            }
            a % b
        }
        _ => return Err(EvalError::TypeMismatch("float64")),
    };
    Ok(Value::Float(v))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

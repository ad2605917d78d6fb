//! Name resolution and type checking.
//!
//! The checker lowers parsed expressions into the typed plan form
//! ([`ScalarExpr`]), resolving every field reference against the owning
//! stage's input schema. Resolution or typing failures are compile errors
//! naming the offending token; no plan is emitted.

use std::fmt;

use sl_catalog::{Field, FieldType, FieldUsage};

use crate::ast::{BinOp, Expr};
use crate::plan::{ScalarExpr, ValueType};

// ---------------------------------------------------------------------------
// CheckError
// ---------------------------------------------------------------------------

/// A compile-time error with the source token that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckError {
    pub token: String,
    pub message: String,
}

impl CheckError {
    pub(crate) fn new(token: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.token.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} (at {:?})", self.message, self.token)
        }
    }
}

impl std::error::Error for CheckError {}

// ---------------------------------------------------------------------------
// Schema access
// ---------------------------------------------------------------------------

/// Expression-level type of a schema field. A `time`-usage text field is an
/// instant inside the engine, whatever its storage type says.
pub(crate) fn value_type_of(field: &Field) -> ValueType {
    if field.usage == FieldUsage::Time {
        return ValueType::Time;
    }
    match field.field_type {
        FieldType::Boolean => ValueType::Bool,
        FieldType::Float64 => ValueType::Float,
        FieldType::Integer64 => ValueType::Int,
        FieldType::Text => ValueType::Text,
    }
}

pub(crate) fn resolve_field<'a>(
    schema: &'a [Field],
    name: &str,
) -> Result<(usize, &'a Field), CheckError> {
    schema
        .iter()
        .position(|f| f.name == name)
        .map(|i| (i, &schema[i]))
        .ok_or_else(|| CheckError::new(name, format!("unknown field {name:?}")))
}

// ---------------------------------------------------------------------------
// Lowering
// ---------------------------------------------------------------------------

/// Lower a predicate; the result type must be boolean.
pub(crate) fn lower_predicate(expr: &Expr, schema: &[Field]) -> Result<ScalarExpr, CheckError> {
    let lowered = lower_expr(expr, schema)?;
    if lowered.ty() != ValueType::Bool {
        return Err(CheckError::new(
            "",
            format!("predicate must be boolean, found {:?}", lowered.ty()),
        ));
    }
    Ok(lowered)
}

/// Lower an expression, resolving names and enforcing the type rules.
pub(crate) fn lower_expr(expr: &Expr, schema: &[Field]) -> Result<ScalarExpr, CheckError> {
    match expr {
        Expr::Int(n) => Ok(ScalarExpr::IntLit(*n)),
        Expr::Float(f) => Ok(ScalarExpr::FloatLit(*f)),
        Expr::Str(s) => Ok(ScalarExpr::TextLit(s.clone())),
        Expr::TimeLit(s) => {
            let parsed = chrono::DateTime::parse_from_rfc3339(s)
                .map_err(|e| CheckError::new(s, format!("invalid timestamp literal: {e}")))?;
            let nanos = parsed.timestamp_nanos_opt().ok_or_else(|| {
                CheckError::new(s, "timestamp literal out of range".to_string())
            })?;
            Ok(ScalarExpr::TimeLit(nanos))
        }
        Expr::Dur(d) => {
            let nanos = i64::try_from(d.as_nanos())
                .map_err(|_| CheckError::new("", "duration literal out of range".to_string()))?;
            Ok(ScalarExpr::SpanLit(nanos))
        }
        Expr::Field(name) => {
            let (index, field) = resolve_field(schema, name)?;
            Ok(ScalarExpr::Field {
                index,
                name: name.clone(),
                ty: value_type_of(field),
            })
        }
        Expr::Not(inner) => {
            let lowered = lower_expr(inner, schema)?;
            if lowered.ty() != ValueType::Bool {
                return Err(CheckError::new(
                    "not",
                    format!("'not' requires a boolean operand, found {:?}", lowered.ty()),
                ));
            }
            Ok(ScalarExpr::Not(Box::new(lowered)))
        }
        Expr::Bin { op, left, right } => {
            let l = lower_expr(left, schema)?;
            let r = lower_expr(right, schema)?;
            check_binary(*op, l.ty(), r.ty())?;
            Ok(ScalarExpr::Binary {
                op: *op,
                left: Box::new(l),
                right: Box::new(r),
            })
        }
    }
}

fn is_numeric(t: ValueType) -> bool {
    matches!(t, ValueType::Int | ValueType::Float)
}

/// Enforce operand compatibility; the result type comes from
/// `plan::binary_result_type` once this passes.
fn check_binary(op: BinOp, lt: ValueType, rt: ValueType) -> Result<(), CheckError> {
    use ValueType::*;
    let ok = match op {
        BinOp::And | BinOp::Or => lt == Bool && rt == Bool,
        BinOp::Eq | BinOp::Ne => {
            (is_numeric(lt) && is_numeric(rt))
                || (lt == rt && matches!(lt, Time | Span | Text | Bool))
        }
        BinOp::Lt | BinOp::Le | BinOp::Ge | BinOp::Gt => {
            (is_numeric(lt) && is_numeric(rt))
                || (lt == rt && matches!(lt, Time | Span | Text))
        }
        BinOp::Add => {
            (is_numeric(lt) && is_numeric(rt))
                || matches!((lt, rt), (Time, Span) | (Span, Time) | (Span, Span))
        }
        BinOp::Sub => {
            (is_numeric(lt) && is_numeric(rt))
                || matches!((lt, rt), (Time, Span) | (Time, Time) | (Span, Span))
        }
        BinOp::Mul | BinOp::Div => is_numeric(lt) && is_numeric(rt),
        BinOp::Mod => (is_numeric(lt) && is_numeric(rt)) || matches!((lt, rt), (Time, Span)),
    };
    if ok {
        Ok(())
    } else {
        Err(CheckError::new(
            op.symbol(),
            format!("operator {:?} cannot combine {lt:?} and {rt:?}", op.symbol()),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

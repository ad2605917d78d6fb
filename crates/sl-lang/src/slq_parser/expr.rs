use winnow::combinator::{alt, cut_err, opt};
use winnow::error::{StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::literal;

use crate::ast::{BinOp, Expr};
use crate::parse_utils::{dq_string, duration_unit, float, ident, integer, kw, sq_string, ws_skip};

// ---------------------------------------------------------------------------
// Public entry: full expression
// ---------------------------------------------------------------------------

/// Precedence, loosest to tightest: `or`, `and`, `not`, comparison,
/// additive, multiplicative, primary.
pub(crate) fn parse_expr(input: &mut &str) -> ModalResult<Expr> {
    or_expr.parse_next(input)
}

// ---------------------------------------------------------------------------
// Precedence levels
// ---------------------------------------------------------------------------

/// `or_expr = and_expr { "or" and_expr }`
fn or_expr(input: &mut &str) -> ModalResult<Expr> {
    let mut left = and_expr.parse_next(input)?;
    loop {
        ws_skip.parse_next(input)?;
        if opt(kw("or")).parse_next(input)?.is_some() {
            ws_skip.parse_next(input)?;
            let right = cut_err(and_expr).parse_next(input)?;
            left = Expr::bin(BinOp::Or, left, right);
        } else {
            break;
        }
    }
    Ok(left)
}

/// `and_expr = not_expr { "and" not_expr }`
fn and_expr(input: &mut &str) -> ModalResult<Expr> {
    let mut left = not_expr.parse_next(input)?;
    loop {
        ws_skip.parse_next(input)?;
        if opt(kw("and")).parse_next(input)?.is_some() {
            ws_skip.parse_next(input)?;
            let right = cut_err(not_expr).parse_next(input)?;
            left = Expr::bin(BinOp::And, left, right);
        } else {
            break;
        }
    }
    Ok(left)
}

/// `not_expr = "not" not_expr | cmp_expr`
fn not_expr(input: &mut &str) -> ModalResult<Expr> {
    if opt(kw("not")).parse_next(input)?.is_some() {
        ws_skip.parse_next(input)?;
        let inner = cut_err(not_expr).parse_next(input)?;
        Ok(Expr::Not(Box::new(inner)))
    } else {
        cmp_expr.parse_next(input)
    }
}

/// `cmp_expr = add_expr [cmp_op add_expr]`
fn cmp_expr(input: &mut &str) -> ModalResult<Expr> {
    let left = add_expr.parse_next(input)?;
    ws_skip.parse_next(input)?;
    if let Some(op) = opt(cmp_op).parse_next(input)? {
        ws_skip.parse_next(input)?;
        let right = cut_err(add_expr).parse_next(input)?;
        return Ok(Expr::bin(op, left, right));
    }
    Ok(left)
}

fn cmp_op(input: &mut &str) -> ModalResult<BinOp> {
    alt((
        literal("==").value(BinOp::Eq),
        literal("!=").value(BinOp::Ne),
        literal("<=").value(BinOp::Le),
        literal(">=").value(BinOp::Ge),
        literal("<").value(BinOp::Lt),
        literal(">").value(BinOp::Gt),
    ))
    .parse_next(input)
}

/// `add_expr = mul_expr { ("+" | "-") mul_expr }`
fn add_expr(input: &mut &str) -> ModalResult<Expr> {
    let mut left = mul_expr.parse_next(input)?;
    loop {
        ws_skip.parse_next(input)?;
        let op = opt(alt((
            literal("+").value(BinOp::Add),
            literal("-").value(BinOp::Sub),
        )))
        .parse_next(input)?;
        if let Some(op) = op {
            ws_skip.parse_next(input)?;
            let right = cut_err(mul_expr).parse_next(input)?;
            left = Expr::bin(op, left, right);
        } else {
            break;
        }
    }
    Ok(left)
}

/// `mul_expr = primary { ("*" | "/" | "%") primary }`
fn mul_expr(input: &mut &str) -> ModalResult<Expr> {
    let mut left = primary.parse_next(input)?;
    loop {
        ws_skip.parse_next(input)?;
        let op = opt(alt((
            literal("*").value(BinOp::Mul),
            literal("/").value(BinOp::Div),
            literal("%").value(BinOp::Mod),
        )))
        .parse_next(input)?;
        if let Some(op) = op {
            ws_skip.parse_next(input)?;
            let right = cut_err(primary).parse_next(input)?;
            left = Expr::bin(op, left, right);
        } else {
            break;
        }
    }
    Ok(left)
}

// ---------------------------------------------------------------------------
// Primary
// ---------------------------------------------------------------------------

fn primary(input: &mut &str) -> ModalResult<Expr> {
    alt((
        sq_string.map(Expr::TimeLit),
        dq_string.map(Expr::Str),
        number_or_duration,
        paren_expr,
        ident.map(|s: &str| Expr::Field(s.to_string())),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "expression term",
    )))
    .parse_next(input)
}

fn paren_expr(input: &mut &str) -> ModalResult<Expr> {
    literal("(").parse_next(input)?;
    ws_skip.parse_next(input)?;
    let inner = cut_err(parse_expr).parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(literal(")"))
        .context(StrContext::Expected(StrContextValue::Description(
            "closing ')'",
        )))
        .parse_next(input)?;
    Ok(inner)
}

/// Number literal, or a duration literal when an integer is followed by a
/// unit keyword (`10 seconds`).
fn number_or_duration(input: &mut &str) -> ModalResult<Expr> {
    if let Some(f) = opt(float).parse_next(input)? {
        return Ok(Expr::Float(f));
    }
    let n = integer.parse_next(input)?;
    let saved = *input;
    ws_skip.parse_next(input)?;
    if let Some(unit) = opt(duration_unit).parse_next(input)? {
        // Negative or oversized duration amounts are malformed.
        let amount = u32::try_from(n).map_err(|_| {
            winnow::error::ErrMode::Cut(winnow::error::ContextError::new())
        })?;
        return Ok(Expr::Dur(unit * amount));
    }
    *input = saved;
    Ok(Expr::Int(n))
}

use winnow::combinator::{alt, cut_err, opt, separated};
use winnow::error::{StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::literal;

mod expr;

#[cfg(test)]
mod tests;

use crate::ast::*;
use crate::parse_utils::{dotted_name, duration_value, ident, kw, ws_skip};

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Parse one SLQ query. The clause order is fixed by the grammar:
/// `from / group by / where / window / aggregate / where / append / where / to`.
pub fn parse_slq(input: &str) -> anyhow::Result<Query> {
    query
        .parse(input)
        .map_err(|e| anyhow::anyhow!("parse error: {e}"))
}

// ---------------------------------------------------------------------------
// Top-level grammar
// ---------------------------------------------------------------------------

fn query(input: &mut &str) -> ModalResult<Query> {
    ws_skip.parse_next(input)?;
    kw("from").parse_next(input)?;
    ws_skip.parse_next(input)?;
    let from = cut_err(dotted_name)
        .context(StrContext::Expected(StrContextValue::Description(
            "table name after 'from'",
        )))
        .parse_next(input)?;

    ws_skip.parse_next(input)?;
    let group_by = opt(group_by_clause).parse_next(input)?.unwrap_or_default();

    ws_skip.parse_next(input)?;
    let ingress_where = opt(where_clause).parse_next(input)?;

    ws_skip.parse_next(input)?;
    let window = cut_err(window_clause)
        .context(StrContext::Expected(StrContextValue::Description(
            "window clause",
        )))
        .parse_next(input)?;

    ws_skip.parse_next(input)?;
    let aggregations = cut_err(aggregate_clause)
        .context(StrContext::Expected(StrContextValue::Description(
            "aggregate clause",
        )))
        .parse_next(input)?;

    ws_skip.parse_next(input)?;
    let aggregate_where = opt(where_clause).parse_next(input)?;

    ws_skip.parse_next(input)?;
    let append = cut_err(append_clause)
        .context(StrContext::Expected(StrContextValue::Description(
            "append clause",
        )))
        .parse_next(input)?;

    ws_skip.parse_next(input)?;
    let project_where = opt(where_clause).parse_next(input)?;

    ws_skip.parse_next(input)?;
    kw("to").parse_next(input)?;
    ws_skip.parse_next(input)?;
    let to = cut_err(dotted_name)
        .context(StrContext::Expected(StrContextValue::Description(
            "target name after 'to'",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;

    Ok(Query {
        from,
        group_by,
        ingress_where,
        window,
        aggregations,
        aggregate_where,
        append,
        project_where,
        to,
    })
}

// ---------------------------------------------------------------------------
// group by
// ---------------------------------------------------------------------------

fn group_by_clause(input: &mut &str) -> ModalResult<Vec<String>> {
    kw("group").parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(kw("by"))
        .context(StrContext::Expected(StrContextValue::Description(
            "'by' after 'group'",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;
    name_list(input)
}

fn name_list(input: &mut &str) -> ModalResult<Vec<String>> {
    let names: Vec<String> = separated(
        1..,
        (ws_skip, ident).map(|(_, s)| s.to_string()),
        (ws_skip, literal(",")),
    )
    .parse_next(input)?;
    Ok(names)
}

// ---------------------------------------------------------------------------
// where
// ---------------------------------------------------------------------------

fn where_clause(input: &mut &str) -> ModalResult<Expr> {
    kw("where").parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(expr::parse_expr)
        .context(StrContext::Expected(StrContextValue::Description(
            "predicate after 'where'",
        )))
        .parse_next(input)
}

// ---------------------------------------------------------------------------
// window
// ---------------------------------------------------------------------------

fn window_clause(input: &mut &str) -> ModalResult<WindowClause> {
    kw("window").parse_next(input)?;
    ws_skip.parse_next(input)?;
    alt((session_window, slide_window, slice_window)).parse_next(input)
}

fn slice_window(input: &mut &str) -> ModalResult<WindowClause> {
    kw("slice").parse_next(input)?;
    ws_skip.parse_next(input)?;
    let width = cut_err(slice_width)
        .context(StrContext::Expected(StrContextValue::Description(
            "window width (duration or 'N rows')",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;
    let based_on = opt(based_on_clause).parse_next(input)?;
    Ok(WindowClause::Slice { width, based_on })
}

fn slice_width(input: &mut &str) -> ModalResult<SliceWidth> {
    alt((
        duration_value.map(SliceWidth::Time),
        row_distance.map(SliceWidth::Rows),
    ))
    .parse_next(input)
}

fn row_distance(input: &mut &str) -> ModalResult<u64> {
    let digits =
        winnow::token::take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    let amount: u64 = digits
        .parse()
        .map_err(|_| winnow::error::ErrMode::Backtrack(winnow::error::ContextError::new()))?;
    ws_skip.parse_next(input)?;
    kw("rows").parse_next(input)?;
    Ok(amount)
}

fn based_on_clause(input: &mut &str) -> ModalResult<String> {
    kw("based").parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(kw("on"))
        .context(StrContext::Expected(StrContextValue::Description(
            "'on' after 'based'",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;
    let name = cut_err(ident)
        .context(StrContext::Expected(StrContextValue::Description(
            "field name after 'based on'",
        )))
        .parse_next(input)?;
    Ok(name.to_string())
}

fn slide_window(input: &mut &str) -> ModalResult<WindowClause> {
    kw("slide").parse_next(input)?;
    ws_skip.parse_next(input)?;
    let width = cut_err(duration_value).parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(kw("advance")).parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(kw("every")).parse_next(input)?;
    ws_skip.parse_next(input)?;
    let advance = cut_err(duration_value).parse_next(input)?;
    Ok(WindowClause::Slide { width, advance })
}

fn session_window(input: &mut &str) -> ModalResult<WindowClause> {
    kw("session").parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(kw("begin")).parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(kw("when")).parse_next(input)?;
    ws_skip.parse_next(input)?;
    let open = cut_err(expr::parse_expr)
        .context(StrContext::Expected(StrContextValue::Description(
            "predicate after 'begin when'",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(kw("end")).parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(kw("when")).parse_next(input)?;
    ws_skip.parse_next(input)?;
    let close = cut_err(expr::parse_expr)
        .context(StrContext::Expected(StrContextValue::Description(
            "predicate after 'end when'",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;
    let inclusive = cut_err(alt((
        kw("inclusive").value(true),
        kw("exclusive").value(false),
    )))
    .context(StrContext::Expected(StrContextValue::Description(
        "'inclusive' or 'exclusive'",
    )))
    .parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(kw("expire")).parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(kw("after")).parse_next(input)?;
    ws_skip.parse_next(input)?;
    let expire_after = cut_err(duration_value).parse_next(input)?;
    Ok(WindowClause::Session {
        open,
        close,
        inclusive,
        expire_after,
    })
}

// ---------------------------------------------------------------------------
// aggregate
// ---------------------------------------------------------------------------

fn aggregate_clause(input: &mut &str) -> ModalResult<Vec<Aggregation>> {
    kw("aggregate").parse_next(input)?;
    let aggs: Vec<Aggregation> = separated(
        1..,
        (ws_skip, aggregation).map(|(_, a)| a),
        (ws_skip, literal(",")),
    )
    .parse_next(input)?;
    Ok(aggs)
}

fn aggregation(input: &mut &str) -> ModalResult<Aggregation> {
    let (func, input_field) = agg_call.parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(kw("as"))
        .context(StrContext::Expected(StrContextValue::Description(
            "'as' after aggregate function",
        )))
        .parse_next(input)?;
    ws_skip.parse_next(input)?;
    let alias = cut_err(ident)
        .context(StrContext::Expected(StrContextValue::Description(
            "alias after 'as'",
        )))
        .parse_next(input)?
        .to_string();
    Ok(Aggregation {
        func,
        input: input_field,
        alias,
    })
}

fn agg_call(input: &mut &str) -> ModalResult<(AggFunc, Option<String>)> {
    alt((
        unary_agg("avg", AggFunc::Avg),
        unary_agg("sum", AggFunc::Sum),
        unary_agg("distinctcount", AggFunc::DistinctCount),
        unary_agg("uniq", AggFunc::Uniq),
        unary_agg("min", AggFunc::Min),
        unary_agg("max", AggFunc::Max),
        unary_agg("first", AggFunc::First),
        unary_agg("last", AggFunc::Last),
        unary_agg("group", AggFunc::Group),
        nullary_agg("count", AggFunc::Count),
        nullary_agg("reason", AggFunc::Reason),
    ))
    .parse_next(input)
}

/// `name ( FIELD )`
fn unary_agg<'a>(
    name: &'static str,
    func: AggFunc,
) -> impl FnMut(&mut &'a str) -> ModalResult<(AggFunc, Option<String>)> {
    move |input: &mut &'a str| {
        kw(name).parse_next(input)?;
        ws_skip.parse_next(input)?;
        cut_err(literal("(")).parse_next(input)?;
        ws_skip.parse_next(input)?;
        let field = cut_err(ident)
            .context(StrContext::Expected(StrContextValue::Description(
                "field name inside aggregate call",
            )))
            .parse_next(input)?
            .to_string();
        ws_skip.parse_next(input)?;
        cut_err(literal(")")).parse_next(input)?;
        Ok((func, Some(field)))
    }
}

/// `name` or `name()`
fn nullary_agg<'a>(
    name: &'static str,
    func: AggFunc,
) -> impl FnMut(&mut &'a str) -> ModalResult<(AggFunc, Option<String>)> {
    move |input: &mut &'a str| {
        kw(name).parse_next(input)?;
        ws_skip.parse_next(input)?;
        if opt(literal("(")).parse_next(input)?.is_some() {
            ws_skip.parse_next(input)?;
            cut_err(literal(")")).parse_next(input)?;
        }
        Ok((func, None))
    }
}

// ---------------------------------------------------------------------------
// append
// ---------------------------------------------------------------------------

fn append_clause(input: &mut &str) -> ModalResult<Vec<String>> {
    kw("append").parse_next(input)?;
    name_list(input)
}

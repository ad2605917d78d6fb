//! SLQ compiler: parsed query + catalog in, eight-node plan tree out.
//!
//! The tree is assembled the way the data flows: the ingress schema comes
//! from the catalog, filters and the window inherit it unchanged, the
//! aggregate clause replaces it with the call outputs, and `append` trims
//! it down to the projected shape.

use std::collections::HashSet;

use sl_catalog::{Catalog, Field, FieldType, FieldUsage};

use crate::ast::{AggFunc, Aggregation, Query, SliceWidth, WindowClause};
use crate::checker::{self, CheckError, value_type_of};
use crate::plan::{
    self, Call, OperatorType, PlanNode, Property, SessionPredicates, ValueType,
};


/// Compile SLQ text against a catalog into a plan tree.
///
/// Any parse, resolution, or typing failure is returned as an error and no
/// plan is produced.
pub fn compile(text: &str, catalog: &Catalog) -> anyhow::Result<PlanNode> {
    let query = crate::parse_slq(text)?;
    compile_query(&query, catalog).map_err(|e| anyhow::anyhow!("{e}"))
}

pub(crate) fn compile_query(query: &Query, catalog: &Catalog) -> Result<PlanNode, CheckError> {
    let table = catalog
        .find_table(&query.from)
        .map_err(|e| CheckError::new(&query.from, e.to_string()))?;
    let ingress_fields = table.fields.clone();

    // group by: resolve against the ingress schema, declared order.
    let mut group_fields = Vec::with_capacity(query.group_by.len());
    for name in &query.group_by {
        let (_, field) = checker::resolve_field(&ingress_fields, name)?;
        group_fields.push(field.clone());
    }

    let ingress_predicate = query
        .ingress_where
        .as_ref()
        .map(|e| checker::lower_predicate(e, &ingress_fields))
        .transpose()?;

    let (window_properties, session) =
        compile_window(&query.window, &ingress_fields)?;

    let calls = compile_calls(&query.aggregations, &ingress_fields, &query.group_by)?;
    let aggregate_fields: Vec<Field> = calls.iter().map(|c| c.output_field.clone()).collect();

    let aggregate_predicate = query
        .aggregate_where
        .as_ref()
        .map(|e| checker::lower_predicate(e, &aggregate_fields))
        .transpose()?;

    // append: projection by name, output order as listed.
    let mut project_fields = Vec::with_capacity(query.append.len());
    let mut seen = HashSet::new();
    for name in &query.append {
        if !seen.insert(name.as_str()) {
            return Err(CheckError::new(
                name,
                format!("duplicate projection alias {name:?}"),
            ));
        }
        let (_, field) = checker::resolve_field(&aggregate_fields, name)
            .map_err(|_| CheckError::new(name, format!("unknown field {name:?} in append clause")))?;
        project_fields.push(field.clone());
    }

    let project_predicate = query
        .project_where
        .as_ref()
        .map(|e| checker::lower_predicate(e, &project_fields))
        .transpose()?;

    // Assemble leaf-first; child-to-parent is data-flow order.
    let mut ingress = PlanNode::skeleton(7, OperatorType::Ingress);
    ingress.fields = ingress_fields.clone();

    let mut ingress_filter = PlanNode::skeleton(6, OperatorType::IngressFilter);
    ingress_filter.fields = ingress_fields.clone();
    ingress_filter.predicate = ingress_predicate;

    let mut window = PlanNode::skeleton(5, OperatorType::Window);
    window.fields = ingress_fields.clone();
    window.properties = window_properties;
    window.session = session;

    let mut aggregate = PlanNode::skeleton(4, OperatorType::Aggregate);
    aggregate.fields = aggregate_fields.clone();
    aggregate.calls = calls;

    let mut aggregate_filter = PlanNode::skeleton(3, OperatorType::AggregateFilter);
    aggregate_filter.fields = aggregate_fields;
    aggregate_filter.predicate = aggregate_predicate;

    let mut project = PlanNode::skeleton(2, OperatorType::Project);
    project.fields = project_fields.clone();

    let mut project_filter = PlanNode::skeleton(1, OperatorType::ProjectFilter);
    project_filter.fields = project_fields.clone();
    project_filter.predicate = project_predicate;

    let mut egress = PlanNode::skeleton(0, OperatorType::Egress);
    egress.fields = project_fields;
    egress
        .properties
        .push(Property::new(plan::EGRESS_TARGET, query.to.clone()));

    let mut nodes = vec![
        egress,
        project_filter,
        project,
        aggregate_filter,
        aggregate,
        window,
        ingress_filter,
        ingress,
    ];
    for node in &mut nodes {
        node.group_fields = group_fields.clone();
    }
    let root = nodes
        .into_iter()
        .rev()
        .reduce(|child, mut parent| {
            parent.children.push(child);
            parent
        })
        .expect("node list is never empty");

    Ok(root)
}

// ---------------------------------------------------------------------------
// Window clause
// ---------------------------------------------------------------------------

fn compile_window(
    clause: &WindowClause,
    ingress_fields: &[Field],
) -> Result<(Vec<Property>, Option<SessionPredicates>), CheckError> {
    match clause {
        WindowClause::Slide { .. } => Err(CheckError::new(
            "slide",
            "window type 'slide' is not executed by the engine; use 'slice'",
        )),
        WindowClause::Slice { width, based_on } => {
            let props = match width {
                SliceWidth::Time(width) => {
                    if width.is_zero() {
                        return Err(CheckError::new("slice", "window width must be positive"));
                    }
                    if let Some(name) = based_on {
                        let (_, field) = checker::resolve_field(ingress_fields, name)?;
                        if value_type_of(field) != ValueType::Time {
                            return Err(CheckError::new(
                                name,
                                format!(
                                    "'based on' field {name:?} of a time slice must carry time usage"
                                ),
                            ));
                        }
                    }
                    window_properties(
                        plan::WINDOW_TYPE_SLICE,
                        plan::INTERVAL_TYPE_TIME,
                        &width.as_millis().to_string(),
                        "milliseconds",
                        based_on.as_deref().unwrap_or(""),
                        false,
                        plan::NOT_APPLICABLE,
                    )
                }
                SliceWidth::Rows(rows) => {
                    if *rows == 0 {
                        return Err(CheckError::new("slice", "window width must be positive"));
                    }
                    if let Some(name) = based_on {
                        let (_, field) = checker::resolve_field(ingress_fields, name)?;
                        if value_type_of(field) != ValueType::Int {
                            return Err(CheckError::new(
                                name,
                                format!(
                                    "'based on' field {name:?} of a row slice must be integer64"
                                ),
                            ));
                        }
                    }
                    window_properties(
                        plan::WINDOW_TYPE_SLICE,
                        plan::INTERVAL_TYPE_DISTANCE,
                        &rows.to_string(),
                        "rows",
                        based_on.as_deref().unwrap_or(""),
                        false,
                        plan::NOT_APPLICABLE,
                    )
                }
            };
            Ok((props, None))
        }
        WindowClause::Session {
            open,
            close,
            inclusive,
            expire_after,
        } => {
            // Expiry is measured in event time, so the table must carry a
            // time field.
            if !ingress_fields.iter().any(|f| f.usage == FieldUsage::Time) {
                return Err(CheckError::new(
                    "session",
                    "session windows require a time-usage field on the input table",
                ));
            }
            let open = checker::lower_predicate(open, ingress_fields)?;
            let close = checker::lower_predicate(close, ingress_fields)?;
            let expire_nanos = i64::try_from(expire_after.as_nanos())
                .map_err(|_| CheckError::new("after", "expiry duration out of range"))?;
            if expire_nanos == 0 {
                return Err(CheckError::new("after", "expiry duration must be positive"));
            }
            let props = window_properties(
                plan::WINDOW_TYPE_SESSION,
                plan::NOT_APPLICABLE,
                plan::NOT_APPLICABLE,
                plan::NOT_APPLICABLE,
                "",
                *inclusive,
                &expire_nanos.to_string(),
            );
            Ok((props, Some(SessionPredicates { open, close })))
        }
    }
}

fn window_properties(
    window_type: &str,
    interval_type: &str,
    interval_amount: &str,
    interval_unit: &str,
    sequence_field: &str,
    close_inclusive: bool,
    expire_after_nanos: &str,
) -> Vec<Property> {
    vec![
        Property::new(plan::WINDOW_TYPE, window_type),
        Property::new(plan::INTERVAL_TYPE, interval_type),
        Property::new(plan::INTERVAL_AMOUNT, interval_amount),
        Property::new(plan::INTERVAL_UNIT, interval_unit),
        Property::new(plan::SEQUENCE_FIELD_NAME, sequence_field),
        Property::new(plan::SESSION_CLOSE_INCLUSIVE, close_inclusive.to_string()),
        Property::new(plan::EXPIRE_AFTER_NANOS, expire_after_nanos),
    ]
}

// ---------------------------------------------------------------------------
// Aggregate clause
// ---------------------------------------------------------------------------

fn compile_calls(
    aggregations: &[Aggregation],
    ingress_fields: &[Field],
    group_by: &[String],
) -> Result<Vec<Call>, CheckError> {
    if aggregations.is_empty() {
        return Err(CheckError::new("aggregate", "empty aggregate list"));
    }

    let mut calls = Vec::with_capacity(aggregations.len());
    let mut seen = HashSet::new();
    for agg in aggregations {
        if !seen.insert(agg.alias.as_str()) {
            return Err(CheckError::new(
                &agg.alias,
                format!("duplicate aggregation alias {:?}", agg.alias),
            ));
        }

        let input_field = match (&agg.input, agg.func.is_nullary()) {
            (None, true) => None,
            (Some(name), false) => {
                let (_, field) = checker::resolve_field(ingress_fields, name).map_err(|_| {
                    CheckError::new(
                        name,
                        format!("aggregation over non-existent field {name:?}"),
                    )
                })?;
                Some(field.clone())
            }
            // The grammar never produces these shapes.
            (None, false) => {
                return Err(CheckError::new(
                    agg.func.name(),
                    format!("{}() requires an input field", agg.func.name()),
                ));
            }
            (Some(_), true) => {
                return Err(CheckError::new(
                    agg.func.name(),
                    format!("{}() takes no input field", agg.func.name()),
                ));
            }
        };

        check_call_typing(agg, input_field.as_ref(), group_by)?;

        let output_field = output_field(agg, input_field.as_ref());
        calls.push(Call {
            function: agg.func,
            input_field,
            output_field,
        });
    }
    Ok(calls)
}

fn check_call_typing(
    agg: &Aggregation,
    input: Option<&Field>,
    group_by: &[String],
) -> Result<(), CheckError> {
    match agg.func {
        AggFunc::Avg | AggFunc::Sum | AggFunc::Min | AggFunc::Max => {
            let field = input.expect("unary call has an input field");
            let ty = value_type_of(field);
            if !matches!(ty, ValueType::Int | ValueType::Float) {
                return Err(CheckError::new(
                    &field.name,
                    format!(
                        "{}() requires a numeric input, {:?} is {ty:?}",
                        agg.func.name(),
                        field.name
                    ),
                ));
            }
        }
        AggFunc::Group => {
            let field = input.expect("unary call has an input field");
            if !group_by.iter().any(|g| g == &field.name) {
                return Err(CheckError::new(
                    &field.name,
                    format!(
                        "group() input {:?} must be one of the 'group by' fields",
                        field.name
                    ),
                ));
            }
        }
        AggFunc::Count
        | AggFunc::DistinctCount
        | AggFunc::Uniq
        | AggFunc::First
        | AggFunc::Last
        | AggFunc::Reason => {}
    }
    Ok(())
}

/// Output schema entry for one call. Functions that return input values
/// verbatim inherit the input's type and usage; the rest are fixed.
fn output_field(agg: &Aggregation, input: Option<&Field>) -> Field {
    match agg.func {
        AggFunc::Avg | AggFunc::Sum => {
            Field::new(&agg.alias, FieldType::Float64, FieldUsage::Data)
        }
        AggFunc::Count | AggFunc::DistinctCount | AggFunc::Uniq => {
            Field::new(&agg.alias, FieldType::Integer64, FieldUsage::Data)
        }
        AggFunc::Reason => Field::new(&agg.alias, FieldType::Text, FieldUsage::Data),
        AggFunc::Min | AggFunc::Max | AggFunc::First | AggFunc::Last | AggFunc::Group => {
            let field = input.expect("unary call has an input field");
            Field::new(&agg.alias, field.field_type, field.usage)
        }
    }
}

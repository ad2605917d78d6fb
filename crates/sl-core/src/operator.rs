//! Per-operator state derived from the plan at engine start.
//!
//! Marshalling is a single interpreter loop over the stage's
//! [`RowLayout`]; there is no reflection and no generated code.

use chrono::DateTime;
use sl_catalog::{FieldType, FieldUsage};
use sl_lang::ast::AggFunc;
use sl_lang::plan::{PlanNode, ScalarExpr};

use crate::error::{CoreError, EvalError};
use crate::eval::eval_predicate;
use crate::reducer::{
    Avg, Count, DistinctCount, Extremum, First, Last, Reducer, Representative, Sum, Uniq,
};
use crate::row::{AggregateRow, EgressRow, IngressRow, RowLayout};
use crate::value::Value;
use crate::window::ClosedWindow;

// ---------------------------------------------------------------------------
// Ingress
// ---------------------------------------------------------------------------

/// Turns one CSV record into a typed [`IngressRow`].
pub struct IngressParser {
    layout: RowLayout,
}

impl IngressParser {
    pub fn new(layout: RowLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    pub fn parse(&self, record: &csv::StringRecord) -> Result<IngressRow, CoreError> {
        if record.len() != self.layout.len() {
            return Err(CoreError::BadShape {
                expected: self.layout.len(),
                found: record.len(),
            });
        }

        let mut payload = Vec::with_capacity(self.layout.len());
        for (column, raw) in self.layout.columns().iter().zip(record.iter()) {
            let value = if column.usage == FieldUsage::Time {
                parse_timestamp(raw)?
            } else {
                parse_typed(raw, column.field_type)?
            };
            payload.push(value);
        }

        let group = self
            .layout
            .group_indexes()
            .iter()
            .map(|&i| payload[i].clone())
            .collect();
        let event_time = self.layout.time_index().and_then(|i| match &payload[i] {
            Value::Time(t) => Some(*t),
            _ => None,
        });

        Ok(IngressRow {
            group,
            payload,
            event_time,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<Value, CoreError> {
    let parsed = DateTime::parse_from_rfc3339(raw).map_err(|_| CoreError::BadValue {
        value: raw.to_string(),
        ty: "timestamp",
    })?;
    if parsed.timestamp_nanos_opt().is_none() {
        return Err(CoreError::TimestampRange {
            value: raw.to_string(),
        });
    }
    Ok(Value::Time(parsed))
}

fn parse_typed(raw: &str, ty: FieldType) -> Result<Value, CoreError> {
    match ty {
        FieldType::Text => Ok(Value::Text(raw.to_string())),
        FieldType::Boolean => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(CoreError::BadValue {
                value: raw.to_string(),
                ty: "boolean",
            }),
        },
        FieldType::Integer64 => raw.parse().map(Value::Int).map_err(|_| CoreError::BadValue {
            value: raw.to_string(),
            ty: "integer64",
        }),
        FieldType::Float64 => raw
            .parse()
            .map(Value::Float)
            .map_err(|_| CoreError::BadValue {
                value: raw.to_string(),
                ty: "float64",
            }),
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// A `where` stage. Without a predicate every row passes.
pub struct FilterOp {
    predicate: Option<ScalarExpr>,
}

impl FilterOp {
    pub fn new(predicate: Option<ScalarExpr>) -> Self {
        Self { predicate }
    }

    pub fn from_node(node: &PlanNode) -> Self {
        Self::new(node.predicate.clone())
    }

    pub fn accept(&self, payload: &[Value]) -> Result<bool, EvalError> {
        match &self.predicate {
            None => Ok(true),
            Some(p) => eval_predicate(p, payload),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

struct CompiledCall {
    function: AggFunc,
    /// Index into the ingress payload; `None` for `count()`/`reason()`.
    input_index: Option<usize>,
    reducer: Box<dyn Reducer>,
}

/// Applies every call's reducer to a closed window and assembles the
/// aggregate row.
pub struct AggregateOp {
    calls: Vec<CompiledCall>,
}

impl AggregateOp {
    pub fn from_node(node: &PlanNode, ingress_layout: &RowLayout) -> anyhow::Result<Self> {
        let mut calls = Vec::with_capacity(node.calls.len());
        for call in &node.calls {
            let input_index = match &call.input_field {
                None => None,
                Some(field) => Some(ingress_layout.index_of(&field.name).ok_or_else(|| {
                    anyhow::anyhow!("call input {:?} missing from ingress layout", field.name)
                })?),
            };
            let float_input = call
                .input_field
                .as_ref()
                .is_some_and(|f| f.field_type == FieldType::Float64);
            let reducer: Box<dyn Reducer> = match call.function {
                AggFunc::Avg => Box::new(Avg::default()),
                AggFunc::Sum => Box::new(Sum::default()),
                AggFunc::Count => Box::new(Count::default()),
                AggFunc::DistinctCount => Box::new(DistinctCount::default()),
                AggFunc::Uniq => Box::new(Uniq::new()),
                AggFunc::Min => Box::new(Extremum::min(float_input)),
                AggFunc::Max => Box::new(Extremum::max(float_input)),
                AggFunc::First => Box::new(First::default()),
                // reason folds the synthetic close-reason input like last
                AggFunc::Last | AggFunc::Reason => Box::new(Last::default()),
                AggFunc::Group => Box::new(Representative::default()),
            };
            calls.push(CompiledCall {
                function: call.function,
                input_index,
                reducer,
            });
        }
        Ok(Self { calls })
    }

    /// One pass over the window, then one `value()` per reducer.
    /// Empty windows are suppressed upstream and must not reach this.
    pub fn apply(&mut self, window: &ClosedWindow) -> AggregateRow {
        for call in &mut self.calls {
            call.reducer.reset();
        }

        let reason = Value::Text(window.reason.as_str().to_string());
        for row in &window.rows {
            for call in &mut self.calls {
                match (call.function, call.input_index) {
                    (AggFunc::Reason, _) => call.reducer.update(&reason),
                    (AggFunc::Count, _) => call.reducer.update(&Value::Int(1)),
                    (_, Some(index)) => {
                        if let Some(value) = row.payload.get(index) {
                            call.reducer.update(value);
                        }
                    }
                    (_, None) => {}
                }
            }
        }

        let group = window
            .rows
            .first()
            .map(|row| row.group.clone())
            .unwrap_or_default();
        let payload = self.calls.iter_mut().map(|c| c.reducer.value()).collect();
        AggregateRow { group, payload }
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// Emits exactly the projected fields, in the listed order. Projections
/// are index mappings resolved at engine start.
pub struct ProjectOp {
    indexes: Vec<usize>,
}

impl ProjectOp {
    pub fn from_node(node: &PlanNode, aggregate_layout: &RowLayout) -> anyhow::Result<Self> {
        let mut indexes = Vec::with_capacity(node.fields.len());
        for field in &node.fields {
            let index = aggregate_layout.index_of(&field.name).ok_or_else(|| {
                anyhow::anyhow!("projected field {:?} missing from aggregate layout", field.name)
            })?;
            indexes.push(index);
        }
        Ok(Self { indexes })
    }

    pub fn project(&self, row: AggregateRow) -> EgressRow {
        let payload = self
            .indexes
            .iter()
            .filter_map(|&i| row.payload.get(i).cloned())
            .collect();
        EgressRow {
            group: row.group,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Egress
// ---------------------------------------------------------------------------

/// Formats a row for the output stream: projected payload fields in
/// declaration order, then the group fields in declared order.
pub struct EgressOp;

impl EgressOp {
    pub fn record(row: &EgressRow) -> Vec<String> {
        row.payload
            .iter()
            .chain(row.group.iter())
            .map(Value::to_string)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::CloseReason;
    use sl_catalog::Field;
    use sl_lang::plan::OperatorType;

    fn ingress_layout() -> RowLayout {
        let fields = vec![
            Field::new("t", FieldType::Text, FieldUsage::Time),
            Field::new("g", FieldType::Text, FieldUsage::Group),
            Field::new("x", FieldType::Integer64, FieldUsage::Data),
        ];
        let group = vec![fields[1].clone()];
        RowLayout::new(&fields, &group).unwrap()
    }

    fn record(values: &[&str]) -> csv::StringRecord {
        csv::StringRecord::from(values.to_vec())
    }

    #[test]
    fn ingress_parses_typed_row() {
        let parser = IngressParser::new(ingress_layout());
        let row = parser
            .parse(&record(&["2024-01-24T17:00:01-08:00", "a", "41"]))
            .unwrap();

        assert_eq!(row.payload.len(), 3);
        assert_eq!(row.payload[2], Value::Int(41));
        assert_eq!(row.group, vec![Value::Text("a".into())]);
        assert!(row.event_time.is_some());
    }

    #[test]
    fn ingress_rejects_bad_shape() {
        let parser = IngressParser::new(ingress_layout());
        let err = parser.parse(&record(&["2024-01-24T17:00:01-08:00", "a"])).unwrap_err();
        assert_eq!(err, CoreError::BadShape { expected: 3, found: 2 });
    }

    #[test]
    fn ingress_rejects_bad_timestamp() {
        let parser = IngressParser::new(ingress_layout());
        let err = parser.parse(&record(&["noon", "a", "41"])).unwrap_err();
        assert!(matches!(err, CoreError::BadValue { ty: "timestamp", .. }));
    }

    #[test]
    fn ingress_rejects_bad_integer() {
        let parser = IngressParser::new(ingress_layout());
        let err = parser
            .parse(&record(&["2024-01-24T17:00:01-08:00", "a", "4.5"]))
            .unwrap_err();
        assert!(matches!(err, CoreError::BadValue { ty: "integer64", .. }));
    }

    #[test]
    fn filter_without_predicate_passes_everything() {
        let filter = FilterOp::new(None);
        assert!(filter.accept(&[]).unwrap());
    }

    fn make_row(g: &str, x: i64) -> IngressRow {
        IngressRow {
            group: vec![Value::Text(g.into())],
            payload: vec![
                Value::Text("ignored".into()),
                Value::Text(g.into()),
                Value::Int(x),
            ],
            event_time: None,
        }
    }

    fn aggregate_node() -> PlanNode {
        use sl_lang::plan::Call;
        let mut node = PlanNode {
            id: 4,
            label: "Aggregate".into(),
            op: OperatorType::Aggregate,
            fields: Vec::new(),
            group_fields: Vec::new(),
            calls: Vec::new(),
            properties: Vec::new(),
            predicate: None,
            session: None,
            children: Vec::new(),
        };
        let x = Field::new("x", FieldType::Integer64, FieldUsage::Data);
        node.calls = vec![
            Call {
                function: AggFunc::Sum,
                input_field: Some(x.clone()),
                output_field: Field::new("s", FieldType::Float64, FieldUsage::Data),
            },
            Call {
                function: AggFunc::Count,
                input_field: None,
                output_field: Field::new("n", FieldType::Integer64, FieldUsage::Data),
            },
            Call {
                function: AggFunc::Reason,
                input_field: None,
                output_field: Field::new("why", FieldType::Text, FieldUsage::Data),
            },
        ];
        node.fields = node.calls.iter().map(|c| c.output_field.clone()).collect();
        node
    }

    #[test]
    fn aggregate_applies_calls_in_order() {
        let node = aggregate_node();
        let mut op = AggregateOp::from_node(&node, &ingress_layout()).unwrap();

        let window = ClosedWindow::new(
            CloseReason::Count,
            vec![make_row("a", 1), make_row("a", 2), make_row("a", 3)],
        );
        let row = op.apply(&window);

        assert_eq!(row.group, vec![Value::Text("a".into())]);
        assert_eq!(
            row.payload,
            vec![
                Value::Float(6.0),
                Value::Int(3),
                Value::Text("count".into()),
            ],
        );
    }

    #[test]
    fn aggregate_reuses_reducers_across_windows() {
        let node = aggregate_node();
        let mut op = AggregateOp::from_node(&node, &ingress_layout()).unwrap();

        let first = ClosedWindow::new(CloseReason::Count, vec![make_row("a", 10)]);
        let second = ClosedWindow::new(CloseReason::Eof, vec![make_row("a", 2)]);
        op.apply(&first);
        let row = op.apply(&second);
        assert_eq!(
            row.payload,
            vec![Value::Float(2.0), Value::Int(1), Value::Text("eof".into())],
        );
    }

    #[test]
    fn project_reorders_by_index() {
        let agg_fields = vec![
            Field::new("s", FieldType::Float64, FieldUsage::Data),
            Field::new("n", FieldType::Integer64, FieldUsage::Data),
        ];
        let layout = RowLayout::new(&agg_fields, &[]).unwrap();
        let node = PlanNode {
            id: 2,
            label: "Project".into(),
            op: OperatorType::Project,
            fields: vec![agg_fields[1].clone(), agg_fields[0].clone()],
            group_fields: Vec::new(),
            calls: Vec::new(),
            properties: Vec::new(),
            predicate: None,
            session: None,
            children: Vec::new(),
        };
        let op = ProjectOp::from_node(&node, &layout).unwrap();

        let row = op.project(AggregateRow {
            group: vec![Value::Text("a".into())],
            payload: vec![Value::Float(6.0), Value::Int(3)],
        });
        assert_eq!(row.payload, vec![Value::Int(3), Value::Float(6.0)]);
    }

    #[test]
    fn egress_appends_group_values() {
        let row = EgressRow {
            group: vec![Value::Text("a".into())],
            payload: vec![Value::Float(6.0), Value::Int(3)],
        };
        assert_eq!(EgressOp::record(&row), vec!["6", "3", "a"]);
    }
}

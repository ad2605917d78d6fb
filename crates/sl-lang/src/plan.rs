//! Execution plan IR.
//!
//! The plan is a tree of eight operator nodes, root = Egress, leaf =
//! Ingress, child-to-parent being data-flow order. It is self-sufficient:
//! the engine derives every row layout and predicate from the decoded tree
//! and never consults the catalog again.

use serde::{Deserialize, Serialize};

use sl_catalog::Field;

pub use crate::ast::{AggFunc, BinOp};

// ---------------------------------------------------------------------------
// OperatorType
// ---------------------------------------------------------------------------

/// Operator kind of a plan node.
///
/// Variant order is the stable wire id and matches the fixed node ids
/// (Egress = 0 at the root through Ingress = 7 at the leaf).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorType {
    Egress,
    ProjectFilter,
    Project,
    AggregateFilter,
    Aggregate,
    Window,
    IngressFilter,
    Ingress,
}

impl OperatorType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Egress => "Egress",
            Self::ProjectFilter => "Project Filter",
            Self::Project => "Project",
            Self::AggregateFilter => "Aggregate Filter",
            Self::Aggregate => "Aggregate",
            Self::Window => "Window",
            Self::IngressFilter => "Ingress Filter",
            Self::Ingress => "Ingress",
        }
    }
}

// ---------------------------------------------------------------------------
// Typed expressions
// ---------------------------------------------------------------------------

/// Result type of a lowered expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Text,
    /// Absolute instant; payload fields with usage `time` carry this.
    Time,
    /// Duration; exists only as an expression intermediate.
    Span,
}

/// A lowered expression with resolved field indexes and typed leaves.
///
/// Attached to filter nodes (and, for sessions, to the window node) so
/// predicates travel inside the plan instead of as generated code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarExpr {
    IntLit(i64),
    FloatLit(f64),
    TextLit(String),
    /// Instant literal as nanoseconds since the Unix epoch.
    TimeLit(i64),
    /// Duration literal as nanoseconds.
    SpanLit(i64),
    /// Reference into the owning stage's input payload.
    Field {
        index: usize,
        name: String,
        ty: ValueType,
    },
    Not(Box<ScalarExpr>),
    Binary {
        op: BinOp,
        left: Box<ScalarExpr>,
        right: Box<ScalarExpr>,
    },
}

impl ScalarExpr {
    /// Result type. Lowering guarantees the operand combinations are legal,
    /// so this never fails on a compiled plan.
    pub fn ty(&self) -> ValueType {
        match self {
            Self::IntLit(_) => ValueType::Int,
            Self::FloatLit(_) => ValueType::Float,
            Self::TextLit(_) => ValueType::Text,
            Self::TimeLit(_) => ValueType::Time,
            Self::SpanLit(_) => ValueType::Span,
            Self::Field { ty, .. } => *ty,
            Self::Not(_) => ValueType::Bool,
            Self::Binary { op, left, right } => binary_result_type(*op, left.ty(), right.ty()),
        }
    }
}

/// Result type of a binary operation over already-checked operand types.
pub fn binary_result_type(op: BinOp, left: ValueType, right: ValueType) -> ValueType {
    use ValueType::*;
    if op.is_comparison() || matches!(op, BinOp::And | BinOp::Or) {
        return Bool;
    }
    match (op, left, right) {
        // timestamp / duration arithmetic
        (BinOp::Add | BinOp::Sub, Time, Span) | (BinOp::Add, Span, Time) => Time,
        (BinOp::Sub, Time, Time) => Span,
        (BinOp::Add | BinOp::Sub, Span, Span) => Span,
        // alignment test: remainder in whole nanoseconds
        (BinOp::Mod, Time, Span) => Int,
        // numeric arithmetic, int promoted to float on mixing
        (_, Float, _) | (_, _, Float) => Float,
        _ => Int,
    }
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// One aggregation: function, optional input field, aliased output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub function: AggFunc,
    /// `None` for `count()` and `reason()`.
    pub input_field: Option<Field>,
    pub output_field: Field,
}

// ---------------------------------------------------------------------------
// Window properties
// ---------------------------------------------------------------------------

/// String-keyed property of an operator node. The window node's properties
/// enumerate its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub value: String,
}

impl Property {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

pub const WINDOW_TYPE: &str = "window_type";
pub const INTERVAL_TYPE: &str = "interval_type";
pub const INTERVAL_AMOUNT: &str = "interval_amount";
pub const INTERVAL_UNIT: &str = "interval_unit";
pub const SEQUENCE_FIELD_NAME: &str = "sequence_field_name";
pub const SESSION_CLOSE_INCLUSIVE: &str = "session_close_inclusive";
pub const EXPIRE_AFTER_NANOS: &str = "expire_after_nanos";
pub const EGRESS_TARGET: &str = "target";

pub const WINDOW_TYPE_SLICE: &str = "slice";
pub const WINDOW_TYPE_SESSION: &str = "session";
pub const INTERVAL_TYPE_TIME: &str = "time";
pub const INTERVAL_TYPE_DISTANCE: &str = "distance";
pub const NOT_APPLICABLE: &str = "n/a";

/// Session open/close predicates, lowered against the ingress schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPredicates {
    pub open: ScalarExpr,
    pub close: ScalarExpr,
}

// ---------------------------------------------------------------------------
// PlanNode
// ---------------------------------------------------------------------------

/// One node of the plan tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    /// Fixed id, 0 (Egress) through 7 (Ingress).
    pub id: u8,
    pub label: String,
    #[serde(rename = "type")]
    pub op: OperatorType,
    /// Output schema of this operator.
    pub fields: Vec<Field>,
    /// The `group by` fields; identical on every node of a plan.
    pub group_fields: Vec<Field>,
    /// Aggregations; non-empty only on the Aggregate node.
    pub calls: Vec<Call>,
    pub properties: Vec<Property>,
    /// Filter predicate; present only on filter nodes with a `where`.
    pub predicate: Option<ScalarExpr>,
    /// Session predicates; present only on a session-window node.
    pub session: Option<SessionPredicates>,
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    pub(crate) fn skeleton(id: u8, op: OperatorType) -> Self {
        Self {
            id,
            label: op.label().to_string(),
            op,
            fields: Vec::new(),
            group_fields: Vec::new(),
            calls: Vec::new(),
            properties: Vec::new(),
            predicate: None,
            session: None,
            children: Vec::new(),
        }
    }

    /// Depth-first search for the first node of the given operator type.
    pub fn find(&self, op: OperatorType) -> Option<&PlanNode> {
        if self.op == op {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(op))
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Serialize a plan tree to its binary wire form.
pub fn encode(root: &PlanNode) -> anyhow::Result<Vec<u8>> {
    Ok(bincode::serialize(root)?)
}

/// Deserialize a plan tree from its binary wire form.
pub fn decode(bytes: &[u8]) -> anyhow::Result<PlanNode> {
    let root: PlanNode = bincode::deserialize(bytes)?;
    validate(&root)?;
    Ok(root)
}

/// Pretty JSON rendering for the `show` sub-command.
pub fn to_pretty_json(root: &PlanNode) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(root)?)
}

/// Structural invariants every decoded plan must satisfy.
fn validate(root: &PlanNode) -> anyhow::Result<()> {
    use OperatorType::*;
    let order = [
        Egress,
        ProjectFilter,
        Project,
        AggregateFilter,
        Aggregate,
        Window,
        IngressFilter,
        Ingress,
    ];

    let mut node = root;
    for (id, expected) in order.iter().enumerate() {
        if node.op != *expected {
            anyhow::bail!(
                "malformed plan: node {id} is {:?}, expected {expected:?}",
                node.op
            );
        }
        if node.id != id as u8 {
            anyhow::bail!("malformed plan: {:?} node has id {}", node.op, node.id);
        }
        if node.group_fields != root.group_fields {
            anyhow::bail!("malformed plan: group fields differ at {:?}", node.op);
        }
        if !node.calls.is_empty() && node.op != Aggregate {
            anyhow::bail!("malformed plan: calls on non-aggregate node {:?}", node.op);
        }
        if node.op == Ingress {
            if !node.children.is_empty() {
                anyhow::bail!("malformed plan: ingress node has children");
            }
            break;
        }
        match node.children.as_slice() {
            [child] => node = child,
            _ => anyhow::bail!("malformed plan: {:?} must have exactly one child", node.op),
        }
    }

    // Filters and windows never rename or retype.
    let same = |a: OperatorType, b: OperatorType| -> bool {
        let fa = &root.find(a).map(|n| n.fields.clone()).unwrap_or_default();
        let fb = &root.find(b).map(|n| n.fields.clone()).unwrap_or_default();
        fa == fb
    };
    if !same(Ingress, IngressFilter) || !same(Ingress, Window) {
        anyhow::bail!("malformed plan: schema changes between ingress and window");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_result_types() {
        use BinOp::*;
        use ValueType::*;
        assert_eq!(binary_result_type(Add, Time, Span), Time);
        assert_eq!(binary_result_type(Sub, Time, Time), Span);
        assert_eq!(binary_result_type(Add, Span, Span), Span);
        assert_eq!(binary_result_type(Mod, Time, Span), Int);
        assert_eq!(binary_result_type(Add, Int, Float), Float);
        assert_eq!(binary_result_type(Mul, Int, Int), Int);
        assert_eq!(binary_result_type(Lt, Time, Time), Bool);
        assert_eq!(binary_result_type(And, Bool, Bool), Bool);
    }

    #[test]
    fn find_walks_the_chain() {
        let mut root = PlanNode::skeleton(0, OperatorType::Egress);
        let mut child = PlanNode::skeleton(1, OperatorType::ProjectFilter);
        child.children.push(PlanNode::skeleton(2, OperatorType::Project));
        root.children.push(child);

        assert!(root.find(OperatorType::Project).is_some());
        assert!(root.find(OperatorType::Window).is_none());
    }
}

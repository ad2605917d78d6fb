mod expr;

pub use expr::{BinOp, Expr};

use std::time::Duration;

// ---------------------------------------------------------------------------
// Query — one parsed SLQ statement
// ---------------------------------------------------------------------------

/// A parsed query. Clause order in the source is fixed:
/// `from / group by / where / window / aggregate / where / append / where / to`.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Fully-qualified input table, `sys.db.schema.table`.
    pub from: String,
    pub group_by: Vec<String>,
    /// First `where`: evaluated per ingress row.
    pub ingress_where: Option<Expr>,
    pub window: WindowClause,
    pub aggregations: Vec<Aggregation>,
    /// Second `where`: evaluated per aggregate row.
    pub aggregate_where: Option<Expr>,
    /// Projected field names, in output order.
    pub append: Vec<String>,
    /// Third `where`: evaluated per projected row.
    pub project_where: Option<Expr>,
    /// Output target name.
    pub to: String,
}

// ---------------------------------------------------------------------------
// Window clause
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum WindowClause {
    /// Tumbling window, by time or by row count.
    Slice {
        width: SliceWidth,
        /// Optional `based on` field driving event-time / sequence replay.
        based_on: Option<String>,
    },
    /// Overlapping window. Parses, but the engine does not execute it;
    /// the compiler rejects it.
    Slide { width: Duration, advance: Duration },
    /// Predicate-delimited window.
    Session {
        open: Expr,
        close: Expr,
        /// Whether the row matching the close predicate joins the window.
        inclusive: bool,
        expire_after: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceWidth {
    Time(Duration),
    Rows(u64),
}

// ---------------------------------------------------------------------------
// Aggregations
// ---------------------------------------------------------------------------

/// One `AGG as NAME` entry of the aggregate clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub func: AggFunc,
    /// Input field; `None` for the argument-less `count()` and `reason()`.
    pub input: Option<String>,
    pub alias: String,
}

/// Aggregate function names accepted by the grammar.
///
/// Variant order is the stable wire id in serialized plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    Avg,
    Sum,
    Count,
    DistinctCount,
    Uniq,
    Min,
    Max,
    First,
    Last,
    Group,
    Reason,
}

impl AggFunc {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Sum => "sum",
            Self::Count => "count",
            Self::DistinctCount => "distinctcount",
            Self::Uniq => "uniq",
            Self::Min => "min",
            Self::Max => "max",
            Self::First => "first",
            Self::Last => "last",
            Self::Group => "group",
            Self::Reason => "reason",
        }
    }

    /// True for functions that take no input field.
    pub fn is_nullary(&self) -> bool {
        matches!(self, Self::Count | Self::Reason)
    }
}

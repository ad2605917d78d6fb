use std::time::Duration;

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Binary operators: connectors, comparators, and arithmetic.
///
/// Variant order is the stable wire id in serialized plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Ge,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Gt => ">",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Ge | Self::Gt
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod)
    }
}

// ---------------------------------------------------------------------------
// Expressions (untyped, as parsed)
// ---------------------------------------------------------------------------

/// Expression as parsed from SLQ text. Field references are unresolved
/// names; the checker lowers this into the typed plan form.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    /// Double-quoted string literal.
    Str(String),
    /// Single-quoted timestamp literal, kept verbatim until lowering.
    TimeLit(String),
    /// Duration literal, e.g. `10 seconds`.
    Dur(Duration),
    Field(String),
    Not(Box<Expr>),
    Bin {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn bin(op: BinOp, left: Expr, right: Expr) -> Self {
        Self::Bin {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

// ---------------------------------------------------------------------------
// CoreError — per-row marshalling failures
// ---------------------------------------------------------------------------

/// Failure to turn one input record into a typed row. Policy: the engine
/// drops the row, counts it, and continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("record has {found} columns, schema expects {expected}")]
    BadShape { expected: usize, found: usize },
    #[error("cannot parse {value:?} as {ty}")]
    BadValue { value: String, ty: &'static str },
    #[error("timestamp {value:?} is out of the representable range")]
    TimestampRange { value: String },
}

// ---------------------------------------------------------------------------
// EvalError — per-row predicate failures
// ---------------------------------------------------------------------------

/// Failure while evaluating a compiled expression against a row. Policy:
/// the owning filter reports it and drops the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("modulo by zero")]
    ModuloByZero,
    #[error("field index {0} missing from the row payload")]
    MissingField(usize),
    #[error("timestamp arithmetic out of range")]
    TimestampRange,
    #[error("type mismatch: {0}")]
    TypeMismatch(&'static str),
}

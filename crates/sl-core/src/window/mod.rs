//! Window state machines.
//!
//! The window operator runs as a single task; these machines are the pure
//! state behind it. `push` folds one row in and returns the windows it
//! closed, `rotate` is the LiveTime wall-clock tick, and `flush` closes
//! everything that is still open when the input drains. Serializing
//! appends and rotations through one caller gives the tick/row total
//! order the live mode needs without a lock.

mod live;
mod replay;
mod session;


use std::collections::BTreeMap;
use std::time::Duration as StdDuration;

use sl_lang::plan::{self, PlanNode};

use crate::row::{IngressRow, RowLayout};

pub use live::{LiveDistance, LiveTime};
pub use replay::{ReplayDistance, ReplayTime};
pub use session::Session;

// ---------------------------------------------------------------------------
// CloseReason & ClosedWindow
// ---------------------------------------------------------------------------

/// Why a window closed. Exposed to queries through the `reason`
/// aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// LiveTime tick or ReplayTime bucket advance.
    Tick,
    /// Row-count boundary (live or replay distance).
    Count,
    SessionEnd,
    SessionExpire,
    /// Input drained; every stage flushes.
    Eof,
    /// Per-window row cap exceeded.
    Overflow,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tick => "tick",
            Self::Count => "count",
            Self::SessionEnd => "session_end",
            Self::SessionExpire => "session_expire",
            Self::Eof => "eof",
            Self::Overflow => "overflow",
        }
    }
}

/// An ordered batch of rows handed to the aggregate stage as one unit.
/// All rows share one group key; order matches arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedWindow {
    pub reason: CloseReason,
    pub rows: Vec<IngressRow>,
}

impl ClosedWindow {
    pub(crate) fn new(reason: CloseReason, rows: Vec<IngressRow>) -> Self {
        Self { reason, rows }
    }
}

// ---------------------------------------------------------------------------
// GroupTable
// ---------------------------------------------------------------------------

/// Open windows keyed by group key. A query without `group by` uses the
/// single empty key. Ordered so replay runs close groups
/// deterministically.
#[derive(Debug, Default)]
pub(crate) struct GroupTable {
    windows: BTreeMap<String, Vec<IngressRow>>,
}

impl GroupTable {
    pub(crate) fn append(&mut self, key: String, row: IngressRow) -> usize {
        let window = self.windows.entry(key).or_default();
        window.push(row);
        window.len()
    }

    pub(crate) fn close(&mut self, key: &str) -> Option<Vec<IngressRow>> {
        self.windows.remove(key)
    }

    pub(crate) fn close_all(&mut self) -> Vec<Vec<IngressRow>> {
        std::mem::take(&mut self.windows).into_values().collect()
    }
}

// ---------------------------------------------------------------------------
// WindowMachine
// ---------------------------------------------------------------------------

/// One of the window execution modes, chosen by the plan's window node.
pub enum WindowMachine {
    LiveTime(LiveTime),
    LiveDistance(LiveDistance),
    ReplayTime(ReplayTime),
    ReplayDistance(ReplayDistance),
    Session(Session),
}

impl WindowMachine {
    /// Fold one row in; returns any windows this row closed.
    pub fn push(&mut self, row: IngressRow) -> Vec<ClosedWindow> {
        match self {
            Self::LiveTime(m) => m.push(row),
            Self::LiveDistance(m) => m.push(row),
            Self::ReplayTime(m) => m.push(row),
            Self::ReplayDistance(m) => m.push(row),
            Self::Session(m) => m.push(row),
        }
    }

    /// Wall-clock tick: close every open window. Only LiveTime rotates.
    pub fn rotate(&mut self) -> Vec<ClosedWindow> {
        match self {
            Self::LiveTime(m) => m.rotate(),
            _ => Vec::new(),
        }
    }

    /// Input drained: close every open window with `reason=eof`.
    pub fn flush(&mut self) -> Vec<ClosedWindow> {
        match self {
            Self::LiveTime(m) => m.flush(),
            Self::LiveDistance(m) => m.flush(),
            Self::ReplayTime(m) => m.flush(),
            Self::ReplayDistance(m) => m.flush(),
            Self::Session(m) => m.flush(),
        }
    }

    /// Ticker period for the runtime's interval, LiveTime only.
    pub fn tick_period(&self) -> Option<StdDuration> {
        match self {
            Self::LiveTime(m) => Some(m.period()),
            _ => None,
        }
    }
}

/// Build the machine described by the plan's window node.
///
/// A malformed window node is a fatal error; it cannot happen on plans
/// produced by the compiler.
pub fn build_machine(
    node: &PlanNode,
    layout: &RowLayout,
    max_window_rows: Option<usize>,
) -> anyhow::Result<WindowMachine> {
    let property = |key: &str| -> anyhow::Result<&str> {
        node.property(key)
            .ok_or_else(|| anyhow::anyhow!("window node is missing property {key:?}"))
    };

    let window_type = property(plan::WINDOW_TYPE)?;
    match window_type {
        plan::WINDOW_TYPE_SESSION => {
            let predicates = node
                .session
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("session window without predicates"))?;
            let inclusive: bool = property(plan::SESSION_CLOSE_INCLUSIVE)?.parse()?;
            let expire_nanos: i64 = property(plan::EXPIRE_AFTER_NANOS)?.parse()?;
            Ok(WindowMachine::Session(Session::new(
                predicates.clone(),
                inclusive,
                expire_nanos,
                max_window_rows,
            )))
        }
        plan::WINDOW_TYPE_SLICE => {
            let interval_type = property(plan::INTERVAL_TYPE)?;
            let amount: i64 = property(plan::INTERVAL_AMOUNT)?.parse()?;
            let unit = property(plan::INTERVAL_UNIT)?;
            let sequence_field = property(plan::SEQUENCE_FIELD_NAME)?;

            match interval_type {
                plan::INTERVAL_TYPE_TIME => {
                    let width_nanos = amount
                        .checked_mul(unit_nanos(unit)?)
                        .ok_or_else(|| anyhow::anyhow!("window width overflows"))?;
                    if sequence_field.is_empty() {
                        Ok(WindowMachine::LiveTime(LiveTime::new(
                            StdDuration::from_nanos(width_nanos as u64),
                            max_window_rows,
                        )))
                    } else {
                        Ok(WindowMachine::ReplayTime(ReplayTime::new(
                            width_nanos,
                            max_window_rows,
                        )))
                    }
                }
                plan::INTERVAL_TYPE_DISTANCE => {
                    if sequence_field.is_empty() {
                        Ok(WindowMachine::LiveDistance(LiveDistance::new(
                            amount as usize,
                            max_window_rows,
                        )))
                    } else {
                        let field = layout.index_of(sequence_field).ok_or_else(|| {
                            anyhow::anyhow!("sequence field {sequence_field:?} not in layout")
                        })?;
                        Ok(WindowMachine::ReplayDistance(ReplayDistance::new(
                            amount, field, max_window_rows,
                        )))
                    }
                }
                other => anyhow::bail!("illegal interval type {other:?}"),
            }
        }
        other => anyhow::bail!("window type {other:?} not implemented"),
    }
}

fn unit_nanos(unit: &str) -> anyhow::Result<i64> {
    match unit {
        "milliseconds" => Ok(1_000_000),
        "seconds" => Ok(1_000_000_000),
        "minutes" => Ok(60_000_000_000),
        other => anyhow::bail!("unknown time unit {other:?}"),
    }
}

pub(crate) fn cap_hit(cap: Option<usize>, len: usize) -> bool {
    cap.is_some_and(|c| len >= c)
}

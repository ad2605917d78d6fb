use std::collections::BTreeMap;

use sl_lang::plan::SessionPredicates;
use tracing::warn;

use crate::eval::eval_predicate;
use crate::row::{IngressRow, group_key};
use crate::value::Value;

use super::{CloseReason, ClosedWindow, cap_hit};

struct SessionState {
    rows: Vec<IngressRow>,
    last_event_nanos: Option<i64>,
}

/// Predicate-delimited window.
///
/// A session opens when the open predicate holds on a row, accepts rows
/// until one matches the close predicate (that row joins the emission iff
/// the window is inclusive), and also closes when the event-time gap
/// since the last accepted row exceeds the expiry. A closing row is
/// immediately re-tested against the open predicate, so back-to-back
/// sessions need no separator row.
pub struct Session {
    predicates: SessionPredicates,
    inclusive: bool,
    expire_nanos: i64,
    cap: Option<usize>,
    states: BTreeMap<String, SessionState>,
}

impl Session {
    pub fn new(
        predicates: SessionPredicates,
        inclusive: bool,
        expire_nanos: i64,
        cap: Option<usize>,
    ) -> Self {
        Self {
            predicates,
            inclusive,
            expire_nanos,
            cap,
            states: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, row: IngressRow) -> Vec<ClosedWindow> {
        let mut out = Vec::new();
        let key = group_key(&row.group);
        let t = row.event_time.as_ref().map(Value::time_nanos);

        // Event-time expiry: the gap to the previous accepted row closes
        // the session before this row is considered.
        if let Some(state) = self.states.get(&key) {
            if let (Some(t), Some(last)) = (t, state.last_event_nanos) {
                if t.saturating_sub(last) > self.expire_nanos {
                    if let Some(state) = self.states.remove(&key) {
                        out.push(ClosedWindow::new(CloseReason::SessionExpire, state.rows));
                    }
                }
            }
        }

        if self.states.contains_key(&key) {
            match eval_predicate(&self.predicates.close, &row.payload) {
                Ok(false) => {
                    if let Some(state) = self.states.get_mut(&key) {
                        state.rows.push(row);
                        state.last_event_nanos = t;
                        if cap_hit(self.cap, state.rows.len()) {
                            if let Some(state) = self.states.remove(&key) {
                                out.push(ClosedWindow::new(CloseReason::Overflow, state.rows));
                            }
                        }
                    }
                    return out;
                }
                Ok(true) => {
                    if let Some(mut state) = self.states.remove(&key) {
                        if self.inclusive {
                            state.rows.push(row.clone());
                        }
                        out.push(ClosedWindow::new(CloseReason::SessionEnd, state.rows));
                    }
                    // The closing row falls through to the open check.
                }
                Err(e) => {
                    warn!(domain = "pipe", error = %e, "session close predicate failed, row dropped");
                    return out;
                }
            }
        }

        match eval_predicate(&self.predicates.open, &row.payload) {
            Ok(true) => {
                self.states.insert(
                    key,
                    SessionState {
                        rows: vec![row],
                        last_event_nanos: t,
                    },
                );
            }
            Ok(false) => {}
            Err(e) => {
                warn!(domain = "pipe", error = %e, "session open predicate failed, row dropped");
            }
        }
        out
    }

    pub fn flush(&mut self) -> Vec<ClosedWindow> {
        std::mem::take(&mut self.states)
            .into_values()
            .map(|state| ClosedWindow::new(CloseReason::Eof, state.rows))
            .collect()
    }
}

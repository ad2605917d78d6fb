use tracing::warn;

use crate::row::{IngressRow, group_key};
use crate::value::Value;

use super::{CloseReason, ClosedWindow, GroupTable, cap_hit};

/// High boundary of the fixed-width bucket containing `v`, aligned on the
/// epoch. A value exactly on a boundary belongs to the next bucket, so
/// its `hi` lies one full width above.
fn bucket_hi(v: i64, width: i64) -> i64 {
    (v.div_euclid(width) + 1).saturating_mul(width)
}

// ---------------------------------------------------------------------------
// ReplayTime
// ---------------------------------------------------------------------------

/// Event-time tumbling window for historic data. Rows fall into
/// epoch-aligned buckets of `width_nanos`; a row in a strictly later
/// bucket closes every open window across all group keys before it is
/// appended.
pub struct ReplayTime {
    width_nanos: i64,
    cap: Option<usize>,
    hi: Option<i64>,
    table: GroupTable,
}

impl ReplayTime {
    pub fn new(width_nanos: i64, cap: Option<usize>) -> Self {
        Self {
            width_nanos,
            cap,
            hi: None,
            table: GroupTable::default(),
        }
    }

    pub fn push(&mut self, row: IngressRow) -> Vec<ClosedWindow> {
        let Some(t) = row.event_time.as_ref().map(Value::time_nanos) else {
            // Replay needs the event time; ingress guarantees it parses.
            warn!(domain = "pipe", "row without event time dropped by replay window");
            return Vec::new();
        };

        let mut out = Vec::new();
        match self.hi {
            Some(hi) if t >= hi => {
                out.extend(
                    self.table
                        .close_all()
                        .into_iter()
                        .map(|rows| ClosedWindow::new(CloseReason::Tick, rows)),
                );
                self.hi = Some(bucket_hi(t, self.width_nanos));
            }
            Some(_) => {}
            None => self.hi = Some(bucket_hi(t, self.width_nanos)),
        }

        let key = group_key(&row.group);
        let len = self.table.append(key.clone(), row);
        if cap_hit(self.cap, len) {
            if let Some(rows) = self.table.close(&key) {
                out.push(ClosedWindow::new(CloseReason::Overflow, rows));
            }
        }
        out
    }

    pub fn flush(&mut self) -> Vec<ClosedWindow> {
        self.table
            .close_all()
            .into_iter()
            .map(|rows| ClosedWindow::new(CloseReason::Eof, rows))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// ReplayDistance
// ---------------------------------------------------------------------------

/// Sequence-number tumbling window: like [`ReplayTime`] but bucketed on an
/// integer sequence field instead of an instant.
pub struct ReplayDistance {
    width: i64,
    field: usize,
    cap: Option<usize>,
    hi: Option<i64>,
    table: GroupTable,
}

impl ReplayDistance {
    pub fn new(width: i64, field: usize, cap: Option<usize>) -> Self {
        Self {
            width,
            field,
            cap,
            hi: None,
            table: GroupTable::default(),
        }
    }

    pub fn push(&mut self, row: IngressRow) -> Vec<ClosedWindow> {
        let Some(Value::Int(r)) = row.payload.get(self.field) else {
            warn!(
                domain = "pipe",
                index = self.field,
                "row without integer sequence value dropped by replay window",
            );
            return Vec::new();
        };
        let r = *r;

        let mut out = Vec::new();
        match self.hi {
            Some(hi) if r >= hi => {
                out.extend(
                    self.table
                        .close_all()
                        .into_iter()
                        .map(|rows| ClosedWindow::new(CloseReason::Count, rows)),
                );
                self.hi = Some(bucket_hi(r, self.width));
            }
            Some(_) => {}
            None => self.hi = Some(bucket_hi(r, self.width)),
        }

        let key = group_key(&row.group);
        let len = self.table.append(key.clone(), row);
        if cap_hit(self.cap, len) {
            if let Some(rows) = self.table.close(&key) {
                out.push(ClosedWindow::new(CloseReason::Overflow, rows));
            }
        }
        out
    }

    pub fn flush(&mut self) -> Vec<ClosedWindow> {
        self.table
            .close_all()
            .into_iter()
            .map(|rows| ClosedWindow::new(CloseReason::Eof, rows))
            .collect()
    }
}

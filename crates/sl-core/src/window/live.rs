use std::time::Duration as StdDuration;

use crate::row::{IngressRow, group_key};

use super::{CloseReason, ClosedWindow, GroupTable, cap_hit};

// ---------------------------------------------------------------------------
// LiveTime
// ---------------------------------------------------------------------------

/// Wall-clock tumbling window. Rows accumulate per group key; the
/// runtime's ticker calls [`LiveTime::rotate`], which closes every open
/// window. A row the caller pushes before the tick is polled belongs to
/// the window the tick closes.
pub struct LiveTime {
    period: StdDuration,
    cap: Option<usize>,
    table: GroupTable,
}

impl LiveTime {
    pub fn new(period: StdDuration, cap: Option<usize>) -> Self {
        Self {
            period,
            cap,
            table: GroupTable::default(),
        }
    }

    pub fn period(&self) -> StdDuration {
        self.period
    }

    pub fn push(&mut self, row: IngressRow) -> Vec<ClosedWindow> {
        let key = group_key(&row.group);
        let len = self.table.append(key.clone(), row);
        if cap_hit(self.cap, len) {
            if let Some(rows) = self.table.close(&key) {
                return vec![ClosedWindow::new(CloseReason::Overflow, rows)];
            }
        }
        Vec::new()
    }

    pub fn rotate(&mut self) -> Vec<ClosedWindow> {
        self.table
            .close_all()
            .into_iter()
            .map(|rows| ClosedWindow::new(CloseReason::Tick, rows))
            .collect()
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
// LiveDistance
// ---------------------------------------------------------------------------

/// Row-count tumbling window: after every `rows` rows of a group key,
/// close and emit that key's window.
pub struct LiveDistance {
    rows: usize,
    cap: Option<usize>,
    table: GroupTable,
}

impl LiveDistance {
    pub fn new(rows: usize, cap: Option<usize>) -> Self {
        Self {
            rows,
            cap,
            table: GroupTable::default(),
        }
    }

    pub fn push(&mut self, row: IngressRow) -> Vec<ClosedWindow> {
        let key = group_key(&row.group);
        let len = self.table.append(key.clone(), row);
        if len >= self.rows {
            if let Some(rows) = self.table.close(&key) {
                return vec![ClosedWindow::new(CloseReason::Count, rows)];
            }
        } else if cap_hit(self.cap, len) {
            if let Some(rows) = self.table.close(&key) {
                return vec![ClosedWindow::new(CloseReason::Overflow, rows)];
            }
        }
        Vec::new()
    }

    pub fn flush(&mut self) -> Vec<ClosedWindow> {
        self.table
            .close_all()
            .into_iter()
            .map(|rows| ClosedWindow::new(CloseReason::Eof, rows))
            .collect()
    }
}

//! Rolling history of timestamped rows for one page of one session.
//!
//! Rows stay sorted by timestamp. Reads are windowed to the trailing N minutes;
//! appends prune anything older than the retention horizon so a long-lived
//! session doesn't grow without bound.

use chrono::{Duration, NaiveDateTime};

pub const PRICE_WINDOW_MINUTES: i64 = 60;
pub const WEATHER_WINDOW_MINUTES: i64 = 120;

/// Anything with a capture timestamp (naive UTC)
pub trait Timestamped {
    fn timestamp(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone)]
pub struct HistoryLog<R> {
    rows: Vec<R>,
    retention: Duration,
}

impl<R: Timestamped + Clone> HistoryLog<R> {
    pub fn new(retention: Duration) -> Self {
        Self {
            rows: Vec::new(),
            retention,
        }
    }

    /// Retention of twice the window the page charts
    pub fn for_window(window: Duration) -> Self {
        Self::new(window * 2)
    }

    /// Insert `row` at its sorted position (after any rows with the same
    /// timestamp), then prune rows older than the retention horizon.
    pub fn append(&mut self, row: R) {
        let at = self
            .rows
            .partition_point(|r| r.timestamp() <= row.timestamp());
        self.rows.insert(at, row);
        self.prune();
    }

    pub fn extend<I: IntoIterator<Item = R>>(&mut self, rows: I) {
        for row in rows {
            self.append(row);
        }
    }

    /// Rows with `timestamp >= now - duration`, oldest first
    pub fn window(&self, now: NaiveDateTime, duration: Duration) -> Vec<R> {
        let cutoff = now - duration;
        let start = self.rows.partition_point(|r| r.timestamp() < cutoff);
        self.rows[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[cfg(test)]
    pub fn latest(&self) -> Option<&R> {
        self.rows.last()
    }

    fn prune(&mut self) {
        let Some(newest) = self.rows.last().map(Timestamped::timestamp) else {
            return;
        };
        let horizon = newest - self.retention;
        let stale = self.rows.partition_point(|r| r.timestamp() < horizon);
        if stale > 0 {
            self.rows.drain(..stale);
            tracing::trace!("Pruned {} history rows older than {}", stale, horizon);
        }
    }
}

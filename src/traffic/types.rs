//! Data types used by the traffic aggregation pipeline.

use serde::Serialize;
use std::collections::VecDeque;

/// A half-open slice of simulation time, `[start, end)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    /// Window of `duration` seconds beginning at `start`.
    pub fn starting_at(start: f64, duration: f64) -> Self {
        TimeWindow {
            start,
            end: start + duration,
        }
    }

    /// True while `time` is inside the window; `end` itself is outside.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }

    /// Label for output rows, e.g. `"25200_28800"`.
    pub fn label(&self) -> String {
        format!("{}_{}", self.start as i64, self.end as i64)
    }

    /// The next window of the same length on the aligned grid.
    pub fn next(&self) -> Self {
        TimeWindow {
            start: self.end,
            end: self.end + (self.end - self.start),
        }
    }
}

/// How the aggregator behaves when an exit event reaches the window end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowMode {
    /// Emit the first window and ignore the rest of the stream.
    #[default]
    Single,
    /// Emit the closed window, carry entry queues over, and keep going.
    Rolling,
}

/// Accumulated state for one link inside the current window.
///
/// `entry_queue` holds entry timestamps of vehicles currently on the link,
/// in arrival order; exits pop from the front. `speed_samples` and
/// `vehicle_count` cover completed traversals only.
#[derive(Debug, Default)]
pub(crate) struct LinkWindowState {
    pub entry_queue: VecDeque<f64>,
    pub speed_samples: Vec<f64>,
    pub vehicle_count: u64,
}

impl LinkWindowState {
    /// Drops per-window accumulators, keeping vehicles still on the link.
    pub fn reset_for_next_window(&mut self) {
        self.speed_samples.clear();
        self.vehicle_count = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.entry_queue.is_empty() && self.speed_samples.is_empty() && self.vehicle_count == 0
    }
}

/// One aggregated output row: traffic on a link over a time window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkFlowRecord {
    pub link_id: String,
    /// `"<window start>_<window end>"` in whole simulation seconds.
    pub time_span: String,
    /// Completed traversals inside the window.
    pub total_vehicle: u64,
    /// Mean of the nonzero speed samples, m/s, never above the link's
    /// free-flow speed.
    pub mean_speed: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_contains_is_half_open() {
        let w = TimeWindow::starting_at(100.0, 50.0);
        assert!(w.contains(100.0));
        assert!(w.contains(149.9));
        assert!(!w.contains(150.0));
        assert!(!w.contains(99.9));
    }

    #[test]
    fn test_window_label_truncates_to_seconds() {
        let w = TimeWindow::starting_at(25200.0, 3600.0);
        assert_eq!(w.label(), "25200_28800");
    }

    #[test]
    fn test_next_window_keeps_duration() {
        let w = TimeWindow::starting_at(0.0, 3600.0).next();
        assert_eq!(w.start, 3600.0);
        assert_eq!(w.end, 7200.0);
    }

    #[test]
    fn test_reset_keeps_queue() {
        let mut st = LinkWindowState::default();
        st.entry_queue.push_back(10.0);
        st.speed_samples.push(5.0);
        st.vehicle_count = 1;

        st.reset_for_next_window();

        assert_eq!(st.entry_queue.len(), 1);
        assert!(st.speed_samples.is_empty());
        assert_eq!(st.vehicle_count, 0);
    }
}

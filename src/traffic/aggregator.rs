//! The single-pass window aggregator over the filtered event stream.
//!
//! One [`WindowAggregator`] owns all state for one run: a FIFO entry queue
//! per link, the speed samples and traversal counts of the current window,
//! and the rows emitted so far. Feeding it an event either accumulates
//! state or, when an exit event reaches the window boundary, closes the
//! window and emits one row per link with recorded state.

use crate::events::Event;
use crate::network::LinkTable;
use crate::traffic::anomaly::{Anomaly, AnomalyKind, AnomalyLog};
use crate::traffic::types::{LinkFlowRecord, LinkWindowState, TimeWindow, WindowMode};
use std::collections::BTreeMap;
use thiserror::Error;

/// Default aggregation window, one simulation hour.
pub const DEFAULT_WINDOW_SECONDS: f64 = 3600.0;

/// Fatal aggregation failures. Anything recoverable goes to the
/// [`AnomalyLog`] instead.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// An event referenced a link the static table does not know. Without
    /// its length and free-flow speed the output would be meaningless, so
    /// the whole run aborts.
    #[error("no static attributes for link {link_id} referenced at t={time}")]
    LinkNotFound { link_id: String, time: f64 },
}

/// Where the aggregator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    /// Accepting events into the current window.
    Accumulating,
    /// The window was closed and emitted; in [`WindowMode::Single`] this
    /// is terminal and later events are not processed.
    WindowClosed,
}

/// What the caller should do after offering an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// The run is over; offering further events is a no-op.
    Finished,
}

/// Caller-owned aggregation context for a single pass.
pub struct WindowAggregator {
    duration: f64,
    mode: WindowMode,
    window: Option<TimeWindow>,
    state: AggregatorState,
    links: BTreeMap<String, LinkWindowState>,
    records: Vec<LinkFlowRecord>,
}

impl WindowAggregator {
    /// New aggregator emitting one window of `duration` seconds.
    ///
    /// # Panics
    ///
    /// Panics if `duration` is not positive.
    pub fn new(duration: f64) -> Self {
        assert!(duration > 0.0, "window duration must be positive");
        WindowAggregator {
            duration,
            mode: WindowMode::Single,
            window: None,
            state: AggregatorState::Accumulating,
            links: BTreeMap::new(),
            records: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: WindowMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    /// Feeds one event, in stream order.
    ///
    /// Entry events queue the vehicle on its link. Exit events inside the
    /// window pop the earliest queued entry and record the traversal; an
    /// exit at or past the window end closes the window first. Unmatched
    /// exits and non-positive dwell times go to `anomalies` and never
    /// abort the pass.
    pub fn offer(
        &mut self,
        event: &Event,
        links: &LinkTable,
        anomalies: &mut AnomalyLog,
    ) -> Result<Step, AggregateError> {
        if self.state == AggregatorState::WindowClosed {
            return Ok(Step::Finished);
        }

        // The first event anchors the window.
        let window = *self
            .window
            .get_or_insert_with(|| TimeWindow::starting_at(event.time, self.duration));

        let attrs = links
            .get(&event.link)
            .copied()
            .ok_or_else(|| AggregateError::LinkNotFound {
                link_id: event.link.clone(),
                time: event.time,
            })?;

        if event.kind.is_entry() {
            self.links
                .entry(event.link.clone())
                .or_default()
                .entry_queue
                .push_back(event.time);
            return Ok(Step::Continue);
        }

        if event.time >= window.end {
            self.close_window(links)?;
            match self.mode {
                WindowMode::Single => {
                    self.state = AggregatorState::WindowClosed;
                    return Ok(Step::Finished);
                }
                WindowMode::Rolling => {
                    // Jump along the aligned grid to the bucket holding
                    // this event; intervening windows saw no activity.
                    let mut next = window.next();
                    while event.time >= next.end {
                        next = next.next();
                    }
                    self.window = Some(next);
                }
            }
        }

        match self.links.get_mut(&event.link) {
            Some(state) => match state.entry_queue.pop_front() {
                Some(entered_at) => {
                    let dwell = event.time - entered_at;
                    let speed = if dwell > 0.0 {
                        attrs.length / dwell
                    } else {
                        anomalies.record(Self::anomaly(AnomalyKind::NonPositiveDwell, event));
                        0.0
                    };
                    state.speed_samples.push(speed);
                    state.vehicle_count += 1;
                }
                None => anomalies.record(Self::anomaly(AnomalyKind::OrphanExit, event)),
            },
            None => anomalies.record(Self::anomaly(AnomalyKind::OrphanExit, event)),
        }

        Ok(Step::Continue)
    }

    /// Ends the pass, closing a still-open window so that a stream that
    /// never crossed the boundary still reports, and returns all rows.
    pub fn finish(mut self, links: &LinkTable) -> Result<Vec<LinkFlowRecord>, AggregateError> {
        if self.state == AggregatorState::Accumulating && self.window.is_some() {
            self.close_window(links)?;
            self.state = AggregatorState::WindowClosed;
        }
        Ok(self.records)
    }

    /// Emits one row per link with recorded state, then resets per-window
    /// accumulators. Vehicles still on a link keep their queued entries;
    /// links with nothing left are dropped.
    fn close_window(&mut self, links: &LinkTable) -> Result<(), AggregateError> {
        let Some(window) = self.window else {
            return Ok(());
        };
        let time_span = window.label();

        for (link_id, state) in &self.links {
            let attrs = links
                .get(link_id)
                .ok_or_else(|| AggregateError::LinkNotFound {
                    link_id: link_id.clone(),
                    time: window.end,
                })?;

            // Zero samples mark anomalous pairings, not real speeds.
            let nonzero: Vec<f64> = state
                .speed_samples
                .iter()
                .copied()
                .filter(|s| *s > 0.0)
                .collect();

            let mean = if nonzero.is_empty() || state.vehicle_count == 0 {
                0.0
            } else {
                nonzero.iter().sum::<f64>() / nonzero.len() as f64
            };

            self.records.push(LinkFlowRecord {
                link_id: link_id.clone(),
                time_span: time_span.clone(),
                total_vehicle: state.vehicle_count,
                mean_speed: mean.min(attrs.freespeed),
            });
        }

        self.links.retain(|_, state| {
            state.reset_for_next_window();
            !state.is_empty()
        });

        Ok(())
    }

    fn anomaly(kind: AnomalyKind, event: &Event) -> Anomaly {
        Anomaly {
            kind,
            link_id: event.link.clone(),
            entity_id: event.entity.clone(),
            mode: event.mode.clone(),
            time: event.time,
        }
    }
}

/// Folds a whole event stream into aggregated rows in one pass.
pub fn aggregate_events<'a>(
    events: impl IntoIterator<Item = &'a Event>,
    links: &LinkTable,
    duration: f64,
    mode: WindowMode,
    anomalies: &mut AnomalyLog,
) -> Result<Vec<LinkFlowRecord>, AggregateError> {
    let mut aggregator = WindowAggregator::new(duration).with_mode(mode);
    for event in events {
        if aggregator.offer(event, links, anomalies)? == Step::Finished {
            break;
        }
    }
    aggregator.finish(links)
}

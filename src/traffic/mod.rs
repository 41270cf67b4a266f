//! Per-link traffic aggregation over the simulation event stream.
//!
//! This module turns a time-ordered stream of link entry/exit events into
//! per-link, per-time-window statistics: how many vehicles completed a
//! traversal of each link, and their mean speed derived from dwell time and
//! link length, clamped to the link's free-flow speed.

pub mod aggregator;
pub mod anomaly;
pub mod types;

pub use aggregator::{
    AggregateError, AggregatorState, DEFAULT_WINDOW_SECONDS, Step, WindowAggregator,
    aggregate_events,
};
pub use anomaly::{Anomaly, AnomalyKind, AnomalyLog};
pub use types::{LinkFlowRecord, TimeWindow, WindowMode};

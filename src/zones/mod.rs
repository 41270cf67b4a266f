//! Zone/interval activity queries.
//!
//! Answers "which agents performed activities inside zone Z during
//! interval T" against the activity export and a GeoJSON file of zone
//! boundaries.

pub mod activity;
pub mod query;

pub use activity::{Activity, Interval, read_activities};
pub use query::{Zone, ZoneActivity, load_zones, zone_activities};

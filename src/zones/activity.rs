//! Performed activities and their interval semantics.

use crate::simtime::SimTime;
use anyhow::Result;
use serde::Deserialize;
use std::io::Read;
use tracing::debug;

/// One performed activity from the plans export.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub person: String,
    pub activity_type: String,
    pub link: Option<String>,
    pub facility: Option<String>,
    /// Missing for the first activity of a plan.
    pub start: Option<SimTime>,
    /// Missing for the last activity of a plan.
    pub end: Option<SimTime>,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Deserialize)]
struct RawActivity {
    person: String,
    activity_type: String,
    link: Option<String>,
    facility: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    x: f64,
    y: f64,
}

/// A closed query interval on the simulation clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: SimTime,
    pub end: SimTime,
}

impl Activity {
    /// Whether the activity belongs to `interval`.
    ///
    /// Strict matching requires both endpoints to be present and inside
    /// the interval. Lenient matching admits activities that merely
    /// overlap it, treating a missing endpoint as open-ended.
    pub fn overlaps(&self, interval: &Interval, strict: bool) -> bool {
        if strict {
            match (self.start, self.end) {
                (Some(start), Some(end)) => start >= interval.start && end <= interval.end,
                _ => false,
            }
        } else {
            let starts_before_end = self.start.map_or(true, |s| s < interval.end);
            let ends_after_start = self.end.map_or(true, |e| e > interval.start);
            starts_before_end && ends_after_start
        }
    }

    /// Seconds of the activity that fall inside `interval`; a missing
    /// endpoint counts as extending past the interval bound.
    pub fn time_in_interval(&self, interval: &Interval) -> u32 {
        let begin = self.start.map_or(interval.start, |s| s.max(interval.start));
        let finish = self.end.map_or(interval.end, |e| e.min(interval.end));
        begin.until(finish)
    }

    /// Full activity duration, when both endpoints are known.
    pub fn total_time(&self) -> Option<u32> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(start.until(end)),
            _ => None,
        }
    }
}

/// Reads the activity export. The plans tooling writes it
/// semicolon-separated; pass the delimiter the file actually uses.
pub fn read_activities(reader: impl Read, delimiter: u8) -> Result<Vec<Activity>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(reader);

    let mut activities = Vec::new();
    for result in rdr.deserialize() {
        let raw: RawActivity = result?;

        let start = parse_optional_time(raw.start_time.as_deref())?;
        let end = parse_optional_time(raw.end_time.as_deref())?;

        activities.push(Activity {
            person: raw.person,
            activity_type: raw.activity_type,
            link: raw.link.filter(|s| !s.is_empty()),
            facility: raw.facility.filter(|s| !s.is_empty()),
            start,
            end,
            x: raw.x,
            y: raw.y,
        });
    }

    debug!(activities = activities.len(), "Activity table loaded");
    Ok(activities)
}

fn parse_optional_time(field: Option<&str>) -> Result<Option<SimTime>> {
    match field {
        None | Some("") => Ok(None),
        Some(s) => Ok(Some(SimTime::parse(s)?)),
    }
}

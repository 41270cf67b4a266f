//! Event-stream ingestion and upstream filtering.
//!
//! The simulation's event export is a flat CSV of typed rows. Only four
//! event kinds matter for traffic aggregation, and only car traffic is of
//! interest; everything else is dropped here, once, so the aggregator can
//! consume an already-filtered, time-ordered stream without re-checking
//! modes or entity conventions.

use anyhow::Result;
use serde::Deserialize;
use std::io::Read;
use tracing::debug;

/// The event kinds the traffic pipeline cares about.
///
/// `Departure` puts a vehicle on its starting link, like `LinkEntered`;
/// `Arrival` takes it off its final link, like `LinkLeft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    LinkEntered,
    LinkLeft,
    Departure,
    Arrival,
}

impl EventKind {
    /// Maps the export's `type` column to a kind, `None` for everything
    /// the pipeline ignores.
    pub fn from_type(s: &str) -> Option<Self> {
        match s {
            "entered link" => Some(EventKind::LinkEntered),
            "left link" => Some(EventKind::LinkLeft),
            "departure" => Some(EventKind::Departure),
            "arrival" => Some(EventKind::Arrival),
            _ => None,
        }
    }

    /// True for kinds that put a vehicle onto a link.
    pub fn is_entry(self) -> bool {
        matches!(self, EventKind::LinkEntered | EventKind::Departure)
    }
}

/// One filtered simulation event, ready for aggregation.
///
/// Events are supplied in non-decreasing `time` order by the export; the
/// pipeline relies on that order and never sorts.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    /// Seconds since simulation start.
    pub time: f64,
    pub link: String,
    /// Vehicle or person identifier, for diagnostics only.
    pub entity: Option<String>,
    /// Transport mode tag carried by departure/arrival rows.
    pub mode: Option<String>,
}

/// One raw row of the events CSV export.
#[derive(Debug, Deserialize)]
pub struct RawEvent {
    pub time: f64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub link: Option<String>,
    pub vehicle: Option<String>,
    pub person: Option<String>,
    #[serde(rename = "legMode")]
    pub leg_mode: Option<String>,
}

/// The declarative upstream predicate: which raw rows become [`Event`]s.
///
/// Applied exactly once, before aggregation. Departure and arrival rows
/// must carry the configured mode; entities whose identifier starts with
/// the transit prefix are excluded outright.
#[derive(Debug, Clone)]
pub struct EventFilter {
    pub mode: String,
    pub transit_prefix: String,
}

impl Default for EventFilter {
    fn default() -> Self {
        EventFilter {
            mode: "car".to_string(),
            transit_prefix: "pt".to_string(),
        }
    }
}

impl EventFilter {
    /// Converts a raw row into a typed event, or `None` if the row is
    /// filtered out.
    pub fn admit(&self, raw: &RawEvent) -> Option<Event> {
        let kind = EventKind::from_type(&raw.event_type)?;

        if matches!(kind, EventKind::Departure | EventKind::Arrival)
            && raw.leg_mode.as_deref() != Some(self.mode.as_str())
        {
            return None;
        }

        let entity = raw.vehicle.clone().or_else(|| raw.person.clone());
        if let Some(id) = &entity {
            if matches!(kind, EventKind::Departure | EventKind::Arrival)
                && id.starts_with(&self.transit_prefix)
            {
                return None;
            }
        }

        let Some(link) = raw.link.clone().filter(|l| !l.is_empty()) else {
            debug!(time = raw.time, event_type = %raw.event_type, "Event row without link id dropped");
            return None;
        };

        Some(Event {
            kind,
            time: raw.time,
            link,
            entity,
            mode: raw.leg_mode.clone(),
        })
    }
}

/// Reads the events CSV export and applies `filter` to every row.
///
/// Row order is preserved; the export is expected to be time-ordered.
pub fn read_events(reader: impl Read, filter: &EventFilter) -> Result<Vec<Event>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut events = Vec::new();
    let mut dropped = 0usize;

    for result in rdr.deserialize() {
        let raw: RawEvent = result?;
        match filter.admit(&raw) {
            Some(event) => events.push(event),
            None => dropped += 1,
        }
    }

    debug!(kept = events.len(), dropped, "Event stream filtered");
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(event_type: &str, link: &str, person: &str, leg_mode: Option<&str>) -> RawEvent {
        RawEvent {
            time: 100.0,
            event_type: event_type.to_string(),
            link: Some(link.to_string()),
            vehicle: None,
            person: Some(person.to_string()),
            leg_mode: leg_mode.map(str::to_string),
        }
    }

    #[test]
    fn test_kind_from_type() {
        assert_eq!(EventKind::from_type("entered link"), Some(EventKind::LinkEntered));
        assert_eq!(EventKind::from_type("left link"), Some(EventKind::LinkLeft));
        assert_eq!(EventKind::from_type("departure"), Some(EventKind::Departure));
        assert_eq!(EventKind::from_type("arrival"), Some(EventKind::Arrival));
        assert_eq!(EventKind::from_type("actstart"), None);
        assert_eq!(EventKind::from_type(""), None);
    }

    #[test]
    fn test_admit_keeps_car_departure() {
        let filter = EventFilter::default();
        let event = filter.admit(&raw("departure", "l1", "agent_7", Some("car"))).unwrap();
        assert_eq!(event.kind, EventKind::Departure);
        assert_eq!(event.link, "l1");
        assert_eq!(event.entity.as_deref(), Some("agent_7"));
    }

    #[test]
    fn test_admit_drops_non_car_modes() {
        let filter = EventFilter::default();
        assert!(filter.admit(&raw("departure", "l1", "a1", Some("walk"))).is_none());
        assert!(filter.admit(&raw("arrival", "l1", "a1", Some("bike"))).is_none());
        assert!(filter.admit(&raw("departure", "l1", "a1", None)).is_none());
    }

    #[test]
    fn test_admit_drops_transit_entities() {
        let filter = EventFilter::default();
        assert!(filter.admit(&raw("departure", "l1", "pt_bus_4", Some("car"))).is_none());
        assert!(filter.admit(&raw("arrival", "l1", "pt_tram_1", Some("car"))).is_none());
    }

    #[test]
    fn test_admit_link_events_ignore_mode() {
        // entered/left link rows carry no legMode in the export
        let filter = EventFilter::default();
        let row = RawEvent {
            time: 5.0,
            event_type: "entered link".to_string(),
            link: Some("l2".to_string()),
            vehicle: Some("veh_1".to_string()),
            person: None,
            leg_mode: None,
        };
        let event = filter.admit(&row).unwrap();
        assert_eq!(event.kind, EventKind::LinkEntered);
        assert_eq!(event.entity.as_deref(), Some("veh_1"));
    }

    #[test]
    fn test_admit_drops_unknown_types_and_missing_links() {
        let filter = EventFilter::default();
        assert!(filter.admit(&raw("actend", "l1", "a1", None)).is_none());

        let mut row = raw("departure", "l1", "a1", Some("car"));
        row.link = None;
        assert!(filter.admit(&row).is_none());
    }

    #[test]
    fn test_read_events_filters_rows() {
        let data = "\
time,type,link,vehicle,person,legMode
25200.0,departure,l1,,agent_1,car
25200.0,departure,l9,,agent_2,walk
25210.0,entered link,l2,agent_1,,
25230.0,left link,l2,agent_1,,
25240.0,actstart,,,agent_1,
25260.0,arrival,l3,,agent_1,car
";
        let events = read_events(data.as_bytes(), &EventFilter::default()).unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Departure,
                EventKind::LinkEntered,
                EventKind::LinkLeft,
                EventKind::Arrival,
            ]
        );
    }
}

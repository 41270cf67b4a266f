//! Zone boundaries and the zone/interval activity query.

use crate::simtime::SimTime;
use crate::zones::activity::{Activity, Interval};
use anyhow::{Context, Result, bail};
use geo::{Contains, Geometry, MultiPolygon, Point};
use geojson::{FeatureCollection, GeoJson};
use serde::Serialize;
use std::io::Read;
use tracing::{debug, warn};

/// One query zone: a named polygonal boundary.
#[derive(Debug, Clone)]
pub struct Zone {
    pub name: String,
    pub boundary: MultiPolygon<f64>,
}

impl Zone {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.boundary.contains(&Point::new(x, y))
    }
}

/// Loads zones from a GeoJSON feature collection.
///
/// Features without a usable polygon geometry are skipped with a warning
/// rather than failing the whole file. Zone names come from the `name` or
/// `id` property, falling back to the feature's position in the file.
pub fn load_zones(mut reader: impl Read) -> Result<Vec<Zone>> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;

    let geojson: GeoJson = content.parse().context("invalid GeoJSON")?;
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => bail!("expected a GeoJSON FeatureCollection of zones"),
    };

    Ok(zones_from_collection(collection))
}

fn zones_from_collection(collection: FeatureCollection) -> Vec<Zone> {
    let mut zones = Vec::new();

    for (index, feature) in collection.features.into_iter().enumerate() {
        let name = feature
            .property("name")
            .or_else(|| feature.property("id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("zone_{index}"));

        let Some(geometry) = feature.geometry else {
            warn!(index, name = %name, "Zone feature without geometry skipped");
            continue;
        };

        let boundary = match Geometry::<f64>::try_from(geometry.value) {
            Ok(Geometry::Polygon(polygon)) => MultiPolygon(vec![polygon]),
            Ok(Geometry::MultiPolygon(multi)) => multi,
            Ok(other) => {
                warn!(index, name = %name, geometry = ?other, "Zone feature is not a polygon, skipped");
                continue;
            }
            Err(e) => {
                warn!(index, name = %name, error = %e, "Unparseable zone geometry skipped");
                continue;
            }
        };

        zones.push(Zone { name, boundary });
    }

    debug!(zones = zones.len(), "Zones loaded");
    zones
}

/// One activity matched to a zone during the query interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneActivity {
    pub zone: String,
    pub person: String,
    pub activity_type: String,
    pub link: Option<String>,
    pub facility: Option<String>,
    pub start_time: Option<SimTime>,
    pub end_time: Option<SimTime>,
    /// Full activity duration in seconds, when both endpoints are known.
    pub total_time_seconds: Option<u32>,
    /// Seconds of the activity spent inside the query interval.
    pub time_in_interval_seconds: u32,
}

/// Matches activities against every zone, spatially and temporally.
///
/// Results are grouped by zone in input order, each zone's matches in
/// activity-table order.
pub fn zone_activities(
    zones: &[Zone],
    activities: &[Activity],
    interval: &Interval,
    strict: bool,
) -> Vec<ZoneActivity> {
    let mut matches = Vec::new();

    for zone in zones {
        for activity in activities {
            if !activity.overlaps(interval, strict) {
                continue;
            }
            if !zone.contains(activity.x, activity.y) {
                continue;
            }

            matches.push(ZoneActivity {
                zone: zone.name.clone(),
                person: activity.person.clone(),
                activity_type: activity.activity_type.clone(),
                link: activity.link.clone(),
                facility: activity.facility.clone(),
                start_time: activity.start,
                end_time: activity.end,
                total_time_seconds: activity.total_time(),
                time_in_interval_seconds: activity.time_in_interval(interval),
            });
        }
    }

    matches
}

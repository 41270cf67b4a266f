//! Static road-network link attributes.

use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use tracing::debug;

/// Immutable per-link attributes from the network export.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LinkAttributes {
    /// Link length in meters.
    pub length: f64,
    /// Free-flow speed in meters per second; derived mean speeds are
    /// clamped to this.
    pub freespeed: f64,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    link_id: String,
    length: f64,
    freespeed: f64,
}

/// Lookup table of link attributes keyed by link id.
#[derive(Debug, Default)]
pub struct LinkTable {
    links: HashMap<String, LinkAttributes>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, link_id: impl Into<String>, attrs: LinkAttributes) {
        self.links.insert(link_id.into(), attrs);
    }

    pub fn get(&self, link_id: &str) -> Option<&LinkAttributes> {
        self.links.get(link_id)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl FromIterator<(String, LinkAttributes)> for LinkTable {
    fn from_iter<T: IntoIterator<Item = (String, LinkAttributes)>>(iter: T) -> Self {
        LinkTable {
            links: iter.into_iter().collect(),
        }
    }
}

/// Reads the links CSV export (`link_id,length,freespeed`).
pub fn read_links(reader: impl Read) -> Result<LinkTable> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut table = LinkTable::new();

    for result in rdr.deserialize() {
        let raw: RawLink = result?;
        table.insert(
            raw.link_id,
            LinkAttributes {
                length: raw.length,
                freespeed: raw.freespeed,
            },
        );
    }

    debug!(links = table.len(), "Link table loaded");
    Ok(table)
}

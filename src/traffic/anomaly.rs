//! Structured diagnostics for non-fatal irregularities in event pairing.
//!
//! The aggregator never aborts on a malformed pairing; it records what it
//! saw and moves on. The caller owns the log and decides what to do with
//! it after the run.

use tracing::debug;

/// What kind of irregularity was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyKind {
    /// An exit event arrived for a link with no queued entry.
    OrphanExit,
    /// A matched pairing produced a dwell time of zero or less; the
    /// traversal is counted but its speed sample is recorded as zero.
    NonPositiveDwell,
}

/// One recorded irregularity, with enough context to chase it upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub link_id: String,
    pub entity_id: Option<String>,
    pub mode: Option<String>,
    pub time: f64,
}

/// Caller-owned sink for anomalies observed during one aggregation run.
#[derive(Debug, Default)]
pub struct AnomalyLog {
    records: Vec<Anomaly>,
}

impl AnomalyLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, anomaly: Anomaly) {
        debug!(
            kind = ?anomaly.kind,
            link_id = %anomaly.link_id,
            entity_id = anomaly.entity_id.as_deref().unwrap_or("-"),
            mode = anomaly.mode.as_deref().unwrap_or("-"),
            time = anomaly.time,
            "Event pairing anomaly"
        );
        self.records.push(anomaly);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anomaly> {
        self.records.iter()
    }

    pub fn count_of(&self, kind: AnomalyKind) -> usize {
        self.records.iter().filter(|a| a.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orphan(link: &str) -> Anomaly {
        Anomaly {
            kind: AnomalyKind::OrphanExit,
            link_id: link.to_string(),
            entity_id: Some("p1".to_string()),
            mode: Some("car".to_string()),
            time: 42.0,
        }
    }

    #[test]
    fn test_counts_by_kind() {
        let mut log = AnomalyLog::new();
        log.record(orphan("a"));
        log.record(orphan("b"));
        log.record(Anomaly {
            kind: AnomalyKind::NonPositiveDwell,
            link_id: "c".to_string(),
            entity_id: None,
            mode: None,
            time: 7.0,
        });

        assert_eq!(log.len(), 3);
        assert_eq!(log.count_of(AnomalyKind::OrphanExit), 2);
        assert_eq!(log.count_of(AnomalyKind::NonPositiveDwell), 1);
    }

    #[test]
    fn test_empty_log() {
        let log = AnomalyLog::new();
        assert!(log.is_empty());
        assert_eq!(log.count_of(AnomalyKind::OrphanExit), 0);
    }
}

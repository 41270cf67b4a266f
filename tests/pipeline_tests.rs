use linkflow::events::{EventFilter, read_events};
use linkflow::network::read_links;
use linkflow::simtime::SimTime;
use linkflow::traffic::{AnomalyKind, AnomalyLog, WindowMode, aggregate_events};
use linkflow::zones::{Interval, load_zones, read_activities, zone_activities};

#[test]
fn test_aggregation_pipeline_from_exports() {
    let links = read_links(&include_bytes!("fixtures/links.csv")[..]).unwrap();
    let events = read_events(
        &include_bytes!("fixtures/events.csv")[..],
        &EventFilter::default(),
    )
    .unwrap();

    // the pt departure, the walk departure, and the actstart row are gone
    assert_eq!(events.len(), 9);

    let mut anomalies = AnomalyLog::new();
    let records = aggregate_events(&events, &links, 3600.0, WindowMode::Single, &mut anomalies)
        .unwrap();

    // agent_9 left link b without ever entering it
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies.count_of(AnomalyKind::OrphanExit), 1);

    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.time_span == "21600_25200"));

    // link a: one traversal, 100 m in 10 s
    assert_eq!(records[0].link_id, "a");
    assert_eq!(records[0].total_vehicle, 1);
    assert_eq!(records[0].mean_speed, 10.0);

    // link b: one traversal, 300 m in 30 s; the orphan exit added nothing
    assert_eq!(records[1].link_id, "b");
    assert_eq!(records[1].total_vehicle, 1);
    assert_eq!(records[1].mean_speed, 10.0);

    // link c: FIFO pairs 21700->21640 (150/60) and 21850->21700 (150/150)
    assert_eq!(records[2].link_id, "c");
    assert_eq!(records[2].total_vehicle, 2);
    assert_eq!(records[2].mean_speed, 1.75);
}

#[test]
fn test_zone_query_pipeline_from_exports() {
    let zones = load_zones(&include_bytes!("fixtures/zones.geojson")[..]).unwrap();
    let activities = read_activities(&include_bytes!("fixtures/activities.csv")[..], b';').unwrap();

    assert_eq!(zones.len(), 2);
    assert_eq!(activities.len(), 4);

    let interval = Interval {
        start: SimTime::parse("08:00:00").unwrap(),
        end: SimTime::parse("18:00:00").unwrap(),
    };

    let matches = zone_activities(&zones, &activities, &interval, false);
    assert_eq!(matches.len(), 2);

    // agent_2's open-started home activity overlaps the interval
    assert_eq!(matches[0].zone, "downtown");
    assert_eq!(matches[0].person, "agent_2");
    assert_eq!(matches[0].activity_type, "home");
    assert_eq!(matches[0].total_time_seconds, None);
    assert_eq!(matches[0].time_in_interval_seconds, 3600);

    // agent_1's work day is clipped to the interval end
    assert_eq!(matches[1].zone, "industrial");
    assert_eq!(matches[1].person, "agent_1");
    assert_eq!(matches[1].total_time_seconds, Some(30600));
    assert_eq!(matches[1].time_in_interval_seconds, 30600);

    // strict matching drops the open-ended activity
    let strict_matches = zone_activities(&zones, &activities, &interval, true);
    assert_eq!(strict_matches.len(), 1);
    assert_eq!(strict_matches[0].person, "agent_1");
}

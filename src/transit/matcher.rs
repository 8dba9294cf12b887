use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::Config;
use crate::models::{Candidate, Departures, Direction, Status};
use crate::transit::arrivals::{event_time, ArrivalWindow};
use crate::transit::proto::{FeedEntity, FeedMessage};
use crate::transit::routes::RouteClassifier;

/// Reduces a trip-updates feed to one candidate per trip at the tracked stops.
#[derive(Debug, Clone)]
pub struct StopMatcher {
    west_stops: HashSet<String>,
    east_stops: HashSet<String>,
    routes: RouteClassifier,
    window: ArrivalWindow,
    boarding_threshold: u32,
}

impl StopMatcher {
    pub fn new(config: &Config) -> Self {
        StopMatcher {
            west_stops: config.stops.west.iter().cloned().collect(),
            east_stops: config.stops.east.iter().cloned().collect(),
            routes: RouteClassifier::new(&config.routes, config.default_line),
            window: ArrivalWindow::from_config(&config.board),
            boarding_threshold: config.board.boarding_threshold_minutes,
        }
    }

    pub fn routes(&self) -> &RouteClassifier {
        &self.routes
    }

    fn direction_of(&self, stop_id: &str) -> Option<Direction> {
        if self.west_stops.contains(stop_id) {
            Some(Direction::West)
        } else if self.east_stops.contains(stop_id) {
            Some(Direction::East)
        } else {
            None
        }
    }

    /// Unranked candidates per direction, in feed order.
    ///
    /// A trip contributes at most once: its first stop-time update that is
    /// both at a tracked stop and inside the arrival window. Stop-time
    /// updates are assumed to be in visit order, so that is the trip's next
    /// tracked stop.
    pub fn collect(&self, feed: &FeedMessage, reference: i64) -> Departures {
        let mut departures = Departures {
            reference_time: reference,
            ..Departures::default()
        };
        let mut processed_trips: HashSet<&str> = HashSet::new();
        let mut stop_sightings: HashMap<&str, u32> = HashMap::new();

        for entity in &feed.entity {
            let Some(ref trip_update) = entity.trip_update else {
                continue;
            };
            if trip_update.stop_time_update.is_empty() {
                continue;
            }

            let route_id = trip_update.trip.route_id.as_deref().unwrap_or("");
            if !self.routes.is_tracked(route_id) {
                continue;
            }

            let trip_key = trip_key(entity);
            if processed_trips.contains(trip_key) {
                continue;
            }

            let line = self.routes.classify(route_id);

            for stop_time in &trip_update.stop_time_update {
                let stop_id = stop_time.stop_id.as_deref().unwrap_or("");
                let direction = self.direction_of(stop_id);
                if direction.is_some() {
                    *stop_sightings.entry(stop_id).or_insert(0) += 1;
                }

                let Some(timestamp) = event_time(stop_time) else {
                    continue;
                };
                let Some(minutes) = self.window.admit(timestamp, reference) else {
                    continue;
                };
                let Some(direction) = direction else {
                    continue;
                };

                let candidate = Candidate {
                    destination: line.destination(direction).to_string(),
                    line,
                    minutes,
                    status: Status::from_minutes(minutes, self.boarding_threshold),
                    trip_id: trip_key.to_string(),
                };
                match direction {
                    Direction::West => departures.west.push(candidate),
                    Direction::East => departures.east.push(candidate),
                }
                processed_trips.insert(trip_key);
                break;
            }
        }

        debug!(
            "[BOARD] Scan: {} west, {} east, stops seen {:?}",
            departures.west.len(),
            departures.east.len(),
            stop_sightings
        );

        departures
    }
}

/// Dedup key for a trip; entities without a trip id stand on their own.
fn trip_key(entity: &FeedEntity) -> &str {
    entity
        .trip_update
        .as_ref()
        .and_then(|tu| tu.trip.trip_id.as_deref())
        .filter(|id| !id.is_empty())
        .unwrap_or(entity.id.as_str())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::LineCategory;
    use crate::transit::proto::trip_update::{StopTimeEvent, StopTimeUpdate};
    use crate::transit::proto::{FeedHeader, TripDescriptor, TripUpdate};

    pub(crate) const WEST: &str = "6822";
    pub(crate) const EAST: &str = "6831";

    pub(crate) fn arrival(stop_id: &str, time: i64) -> StopTimeUpdate {
        StopTimeUpdate {
            stop_id: Some(stop_id.into()),
            arrival: Some(StopTimeEvent {
                time: Some(time),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub(crate) fn trip(
        entity_id: &str,
        trip_id: Option<&str>,
        route_id: &str,
        stops: Vec<StopTimeUpdate>,
    ) -> FeedEntity {
        FeedEntity {
            id: entity_id.into(),
            trip_update: Some(TripUpdate {
                trip: TripDescriptor {
                    trip_id: trip_id.map(String::from),
                    route_id: Some(route_id.into()),
                    ..Default::default()
                },
                stop_time_update: stops,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub(crate) fn feed(timestamp: Option<u64>, entity: Vec<FeedEntity>) -> FeedMessage {
        FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".into(),
                timestamp,
            },
            entity,
        }
    }

    fn matcher() -> StopMatcher {
        StopMatcher::new(&Config::builtin())
    }

    #[test]
    fn test_scenario_red_westbound() {
        let f = feed(Some(1000), vec![trip("e1", Some("t1"), "201", vec![arrival(WEST, 1180)])]);
        let deps = matcher().collect(&f, 1000);
        assert_eq!(
            deps.west,
            vec![Candidate {
                destination: "Tuscany".into(),
                line: LineCategory::Red,
                minutes: 3,
                status: Status::OnTime,
                trip_id: "t1".into(),
            }]
        );
        assert!(deps.east.is_empty());
        assert_eq!(deps.reference_time, 1000);
    }

    #[test]
    fn test_scenario_boarding() {
        let f = feed(Some(1000), vec![trip("e1", Some("t1"), "201", vec![arrival(WEST, 1030)])]);
        let deps = matcher().collect(&f, 1000);
        assert_eq!(deps.west[0].minutes, 1);
        assert_eq!(deps.west[0].status, Status::Boarding);
    }

    #[test]
    fn test_scenario_departed_excluded() {
        let f = feed(Some(1000), vec![trip("e1", Some("t1"), "201", vec![arrival(WEST, 880)])]);
        let deps = matcher().collect(&f, 1000);
        assert!(deps.is_empty());
    }

    #[test]
    fn test_blue_eastbound_destination() {
        let f = feed(Some(1000), vec![trip("e1", Some("t9"), "202", vec![arrival(EAST, 1300)])]);
        let deps = matcher().collect(&f, 1000);
        assert_eq!(deps.east[0].destination, "Saddletowne");
        assert_eq!(deps.east[0].line, LineCategory::Blue);
        assert_eq!(deps.east[0].minutes, 5);
    }

    #[test]
    fn test_untracked_route_skipped() {
        let f = feed(Some(1000), vec![trip("e1", Some("bus"), "3", vec![arrival(WEST, 1180)])]);
        assert!(matcher().collect(&f, 1000).is_empty());
    }

    #[test]
    fn test_first_qualifying_stop_wins() {
        // Departed west stop is skipped, the later east stop counts, and the
        // trailing west stop is never reached.
        let f = feed(
            Some(1000),
            vec![trip(
                "e1",
                Some("t1"),
                "201",
                vec![
                    arrival("1111", 1060),
                    arrival(WEST, 700),
                    arrival(EAST, 1240),
                    arrival(WEST, 1500),
                ],
            )],
        );
        let deps = matcher().collect(&f, 1000);
        assert!(deps.west.is_empty());
        assert_eq!(deps.east.len(), 1);
        assert_eq!(deps.east[0].minutes, 4);
    }

    #[test]
    fn test_duplicate_trip_entities_deduped() {
        let f = feed(
            Some(1000),
            vec![
                trip("e1", Some("t1"), "201", vec![arrival(WEST, 1180)]),
                trip("e2", Some("t1"), "201", vec![arrival(WEST, 1240)]),
                trip("e3", Some("t2"), "201", vec![arrival(WEST, 1240)]),
            ],
        );
        let deps = matcher().collect(&f, 1000);
        assert_eq!(deps.west.len(), 2);
        assert_eq!(deps.west[0].minutes, 3);
        assert_eq!(deps.west[1].trip_id, "t2");
    }

    #[test]
    fn test_unmatched_trip_does_not_block_later_entity() {
        // First entity for t1 has nothing in the window; the second still counts.
        let f = feed(
            Some(1000),
            vec![
                trip("e1", Some("t1"), "201", vec![arrival(WEST, 100)]),
                trip("e2", Some("t1"), "201", vec![arrival(WEST, 1240)]),
            ],
        );
        let deps = matcher().collect(&f, 1000);
        assert_eq!(deps.west.len(), 1);
        assert_eq!(deps.west[0].minutes, 4);
    }

    #[test]
    fn test_missing_trip_id_uses_entity_id() {
        let f = feed(
            Some(1000),
            vec![
                trip("e1", None, "201", vec![arrival(WEST, 1180)]),
                trip("e2", None, "202", vec![arrival(WEST, 1240)]),
            ],
        );
        let deps = matcher().collect(&f, 1000);
        assert_eq!(deps.west.len(), 2);
        assert_eq!(deps.west[0].trip_id, "e1");
        assert_eq!(deps.west[1].trip_id, "e2");
    }

    #[test]
    fn test_horizon_excluded() {
        let f = feed(Some(1000), vec![trip("e1", Some("t1"), "202", vec![arrival(EAST, 1000 + 61 * 60)])]);
        assert!(matcher().collect(&f, 1000).is_empty());
    }

    #[test]
    fn test_entities_without_trip_updates_skipped() {
        let f = feed(
            Some(1000),
            vec![
                FeedEntity {
                    id: "alert-1".into(),
                    ..Default::default()
                },
                trip("e1", Some("t1"), "201", vec![]),
            ],
        );
        assert!(matcher().collect(&f, 1000).is_empty());
    }

    #[test]
    fn test_synthetic_stop_sets() {
        let json = r#"{
            "stops": {"west": ["A1", "A2"], "east": ["B1"]},
            "routes": [{"pattern": "R", "line": "red"}]
        }"#;
        let config = Config::from_json(json).unwrap();
        let m = StopMatcher::new(&config);
        let f = feed(
            Some(1000),
            vec![
                trip("e1", Some("t1"), "R", vec![arrival("A2", 1120)]),
                trip("e2", Some("t2"), "R", vec![arrival("B1", 1120)]),
                trip("e3", Some("t3"), "R", vec![arrival("6822", 1120)]),
            ],
        );
        let deps = m.collect(&f, 1000);
        assert_eq!(deps.west.len(), 1);
        assert_eq!(deps.east.len(), 1);
        assert_eq!(deps.east[0].destination, "Somerset");
    }
}

use crate::config::Config;
use crate::models::{Candidate, Departures};
use crate::transit::clock::reference_time;
use crate::transit::matcher::StopMatcher;
use crate::transit::proto::FeedMessage;

/// Soonest first, at most `limit`. The sort is stable, so trains due in the
/// same minute keep their feed order.
pub fn rank(mut candidates: Vec<Candidate>, limit: usize) -> Vec<Candidate> {
    candidates.sort_by_key(|c| c.minutes);
    candidates.truncate(limit);
    candidates
}

/// Feed in, ranked departures for both platforms out.
#[derive(Debug, Clone)]
pub struct Schedule {
    matcher: StopMatcher,
    max_departures: usize,
}

impl Schedule {
    pub fn new(config: &Config) -> Self {
        Schedule {
            matcher: StopMatcher::new(config),
            max_departures: config.board.max_departures,
        }
    }

    pub fn matcher(&self) -> &StopMatcher {
        &self.matcher
    }

    /// A missing or empty feed is not an error here: both lists come back empty.
    pub fn departures(&self, feed: Option<&FeedMessage>, local_now: i64) -> Departures {
        let Some(feed) = feed.filter(|f| !f.entity.is_empty()) else {
            return Departures::default();
        };

        let reference = reference_time(&feed.header, local_now);
        let collected = self.matcher.collect(feed, reference);

        Departures {
            west: rank(collected.west, self.max_departures),
            east: rank(collected.east, self.max_departures),
            reference_time: reference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LineCategory, Status};
    use crate::transit::matcher::tests::{arrival, feed, trip, EAST, WEST};

    fn candidate(trip_id: &str, minutes: u32) -> Candidate {
        Candidate {
            destination: "Tuscany".into(),
            line: LineCategory::Red,
            minutes,
            status: Status::OnTime,
            trip_id: trip_id.into(),
        }
    }

    #[test]
    fn test_rank_sorts_and_truncates() {
        let ranked = rank(
            vec![
                candidate("a", 9),
                candidate("b", 2),
                candidate("c", 14),
                candidate("d", 5),
            ],
            3,
        );
        let ids: Vec<&str> = ranked.iter().map(|c| c.trip_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a"]);
    }

    #[test]
    fn test_rank_is_stable_on_ties() {
        let ranked = rank(
            vec![
                candidate("first", 4),
                candidate("early", 1),
                candidate("second", 4),
                candidate("third", 4),
            ],
            3,
        );
        let ids: Vec<&str> = ranked.iter().map(|c| c.trip_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "first", "second"]);
    }

    #[test]
    fn test_rank_short_input() {
        assert!(rank(Vec::new(), 3).is_empty());
        assert_eq!(rank(vec![candidate("a", 1)], 3).len(), 1);
    }

    #[test]
    fn test_departures_use_header_clock() {
        let schedule = Schedule::new(&Config::builtin());
        let f = feed(Some(1000), vec![trip("e1", Some("t1"), "201", vec![arrival(WEST, 1180)])]);
        // Local clock is far ahead; the header must win.
        let deps = schedule.departures(Some(&f), 999_999);
        assert_eq!(deps.reference_time, 1000);
        assert_eq!(deps.west[0].minutes, 3);
    }

    #[test]
    fn test_departures_fall_back_to_local_clock() {
        let schedule = Schedule::new(&Config::builtin());
        let f = feed(None, vec![trip("e1", Some("t1"), "201", vec![arrival(WEST, 2300)])]);
        let deps = schedule.departures(Some(&f), 2000);
        assert_eq!(deps.reference_time, 2000);
        assert_eq!(deps.west[0].minutes, 5);
    }

    #[test]
    fn test_empty_feed_yields_empty_lists() {
        let schedule = Schedule::new(&Config::builtin());
        let deps = schedule.departures(Some(&feed(Some(1000), vec![])), 1000);
        assert!(deps.west.is_empty());
        assert!(deps.east.is_empty());

        let deps = schedule.departures(None, 1000);
        assert!(deps.is_empty());
    }

    fn busy_feed() -> FeedMessage {
        let mut entities = Vec::new();
        for i in 0..12i64 {
            let stop = if i % 2 == 0 { WEST } else { EAST };
            let route = if i % 3 == 0 { "201" } else { "202" };
            let trip_id = format!("t{}", i % 9);
            entities.push(trip(
                &format!("e{}", i),
                Some(&trip_id),
                route,
                vec![arrival(stop, 1000 + (12 - i) * 97)],
            ));
        }
        feed(Some(1000), entities)
    }

    #[test]
    fn test_output_bounded_sorted_unique() {
        let schedule = Schedule::new(&Config::builtin());
        let deps = schedule.departures(Some(&busy_feed()), 0);
        for list in [&deps.west, &deps.east] {
            assert!(list.len() <= 3);
            assert!(list.windows(2).all(|w| w[0].minutes <= w[1].minutes));
            let mut ids: Vec<&str> = list.iter().map(|c| c.trip_id.as_str()).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), list.len());
        }
        assert_eq!(deps.west.len(), 3);
    }

    #[test]
    fn test_idempotent() {
        let schedule = Schedule::new(&Config::builtin());
        let f = busy_feed();
        let first = serde_json::to_string(&schedule.departures(Some(&f), 0)).unwrap();
        let second = serde_json::to_string(&schedule.departures(Some(&f), 0)).unwrap();
        assert_eq!(first, second);
    }
}

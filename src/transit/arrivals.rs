use crate::config::BoardConfig;
use crate::transit::clock::to_epoch_secs;
use crate::transit::proto::trip_update::StopTimeUpdate;

/// Which predictions are worth showing: not long gone, not too far out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalWindow {
    /// How long after its predicted time a train still counts as present.
    pub grace_secs: i64,
    pub horizon_minutes: u32,
}

impl ArrivalWindow {
    pub fn from_config(board: &BoardConfig) -> Self {
        ArrivalWindow {
            grace_secs: i64::from(board.grace_seconds),
            horizon_minutes: board.horizon_minutes,
        }
    }

    /// Whole minutes from `reference` until `timestamp`, rounded half up and
    /// clamped at 0. `None` once the train left more than the grace window ago.
    pub fn minutes_until(&self, timestamp: i64, reference: i64) -> Option<u32> {
        let diff = timestamp - reference;
        if diff < -self.grace_secs {
            return None;
        }
        let minutes = (diff + 30).div_euclid(60).max(0);
        Some(u32::try_from(minutes).unwrap_or(u32::MAX))
    }

    /// `minutes_until`, additionally dropping anything past the horizon.
    pub fn admit(&self, timestamp: i64, reference: i64) -> Option<u32> {
        self.minutes_until(timestamp, reference)
            .filter(|&m| m <= self.horizon_minutes)
    }
}

/// Predicted time at this stop: arrival when it carries a time, departure otherwise.
pub fn event_time(update: &StopTimeUpdate) -> Option<i64> {
    [update.arrival.as_ref(), update.departure.as_ref()]
        .into_iter()
        .flatten()
        .map(|event| to_epoch_secs(event.time))
        .find(|&t| t > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transit::proto::trip_update::StopTimeEvent;

    fn window() -> ArrivalWindow {
        ArrivalWindow {
            grace_secs: 60,
            horizon_minutes: 60,
        }
    }

    fn event(time: Option<i64>) -> Option<StopTimeEvent> {
        Some(StopTimeEvent {
            time,
            ..Default::default()
        })
    }

    #[test]
    fn test_minutes_rounding() {
        let w = window();
        assert_eq!(w.minutes_until(1180, 1000), Some(3));
        assert_eq!(w.minutes_until(1030, 1000), Some(1)); // 0.5 rounds up
        assert_eq!(w.minutes_until(1029, 1000), Some(0));
        assert_eq!(w.minutes_until(1089, 1000), Some(1));
        assert_eq!(w.minutes_until(1090, 1000), Some(2));
        assert_eq!(w.minutes_until(1000, 1000), Some(0));
    }

    #[test]
    fn test_just_departed_is_clamped() {
        let w = window();
        assert_eq!(w.minutes_until(970, 1000), Some(0));
        assert_eq!(w.minutes_until(940, 1000), Some(0)); // exactly at grace edge
    }

    #[test]
    fn test_beyond_grace_excluded() {
        let w = window();
        assert_eq!(w.minutes_until(939, 1000), None);
        assert_eq!(w.minutes_until(880, 1000), None);
    }

    #[test]
    fn test_minutes_match_formula() {
        let w = window();
        for diff in -60i64..=4000 {
            let expected = ((diff as f64) / 60.0 + 0.5).floor().max(0.0) as u32;
            assert_eq!(w.minutes_until(10_000 + diff, 10_000), Some(expected), "diff {}", diff);
        }
    }

    #[test]
    fn test_horizon_excludes_not_clamps() {
        let w = window();
        assert_eq!(w.admit(1000 + 60 * 60, 1000), Some(60));
        assert_eq!(w.admit(1000 + 61 * 60, 1000), None);
        assert_eq!(w.admit(880, 1000), None);
    }

    #[test]
    fn test_event_time_prefers_arrival() {
        let update = StopTimeUpdate {
            arrival: event(Some(1200)),
            departure: event(Some(1260)),
            ..Default::default()
        };
        assert_eq!(event_time(&update), Some(1200));
    }

    #[test]
    fn test_event_time_falls_back_to_departure() {
        let update = StopTimeUpdate {
            departure: event(Some(1260)),
            ..Default::default()
        };
        assert_eq!(event_time(&update), Some(1260));

        let timeless_arrival = StopTimeUpdate {
            arrival: event(None),
            departure: event(Some(1260)),
            ..Default::default()
        };
        assert_eq!(event_time(&timeless_arrival), Some(1260));
    }

    #[test]
    fn test_event_time_missing() {
        assert_eq!(event_time(&StopTimeUpdate::default()), None);
        let zero = StopTimeUpdate {
            arrival: event(Some(0)),
            ..Default::default()
        };
        assert_eq!(event_time(&zero), None);
    }
}

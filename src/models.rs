use serde::{Deserialize, Serialize};

/// Direction a train is traveling through City Hall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    West,
    East,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::West, Direction::East];

    pub fn label(self) -> &'static str {
        match self {
            Direction::West => "Westbound",
            Direction::East => "Eastbound",
        }
    }
}

/// Coarse line grouping shown to riders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCategory {
    Red,
    #[default]
    Blue,
}

impl LineCategory {
    /// Terminal station a train of this line is heading to.
    pub fn destination(self, direction: Direction) -> &'static str {
        match (self, direction) {
            (LineCategory::Red, Direction::West) => "Tuscany",
            (LineCategory::Blue, Direction::West) => "69 Street",
            (LineCategory::Red, Direction::East) => "Somerset",
            (LineCategory::Blue, Direction::East) => "Saddletowne",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Boarding,
    #[serde(rename = "On Time")]
    OnTime,
}

impl Status {
    pub fn from_minutes(minutes: u32, boarding_threshold: u32) -> Self {
        if minutes <= boarding_threshold {
            Status::Boarding
        } else {
            Status::OnTime
        }
    }
}

/// A display-ready arrival prediction for one trip at one tracked stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub destination: String,
    pub line: LineCategory,
    pub minutes: u32,
    pub status: Status,
    pub trip_id: String,
}

/// Departures for both platforms, produced once per poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Departures {
    pub west: Vec<Candidate>,
    pub east: Vec<Candidate>,
    /// Epoch seconds every minute value was computed against (0 without a feed).
    pub reference_time: i64,
}

impl Departures {
    pub fn for_direction(&self, direction: Direction) -> &[Candidate] {
        match direction {
            Direction::West => &self.west,
            Direction::East => &self.east,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.west.is_empty() && self.east.is_empty()
    }

    pub fn len(&self) -> usize {
        self.west.len() + self.east.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_names() {
        assert_eq!(LineCategory::Red.destination(Direction::West), "Tuscany");
        assert_eq!(LineCategory::Blue.destination(Direction::West), "69 Street");
        assert_eq!(LineCategory::Red.destination(Direction::East), "Somerset");
        assert_eq!(LineCategory::Blue.destination(Direction::East), "Saddletowne");
    }

    #[test]
    fn test_status_threshold() {
        assert_eq!(Status::from_minutes(0, 1), Status::Boarding);
        assert_eq!(Status::from_minutes(1, 1), Status::Boarding);
        assert_eq!(Status::from_minutes(2, 1), Status::OnTime);
    }

    #[test]
    fn test_candidate_json_shape() {
        let candidate = Candidate {
            destination: "Tuscany".into(),
            line: LineCategory::Red,
            minutes: 3,
            status: Status::OnTime,
            trip_id: "t1".into(),
        };
        let value = serde_json::to_value(&candidate).unwrap();
        assert_eq!(value["line"], "red");
        assert_eq!(value["status"], "On Time");
        assert_eq!(value["minutes"], 3);
        assert_eq!(value["trip_id"], "t1");
    }

    #[test]
    fn test_departures_empty() {
        let deps = Departures::default();
        assert!(deps.is_empty());
        assert_eq!(deps.len(), 0);
        assert!(deps.for_direction(Direction::East).is_empty());
    }
}

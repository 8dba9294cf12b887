use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::LineCategory;

/// Calgary Open Data GTFS-RT endpoints.
const URL_TRIP_UPDATES: &str =
    "https://data.calgary.ca/download/gs4m-mdc2/application%2Foctet-stream";
const URL_VEHICLE_POSITIONS: &str =
    "https://data.calgary.ca/download/am7c-qe3u/application%2Foctet-stream";
const URL_ALERTS: &str =
    "https://data.calgary.ca/download/jhgn-ynqj/application%2Foctet-stream";

/// Resolved application configuration.
///
/// Every section is optional in the file; anything left out falls back to
/// the City Hall / Bow Valley College deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feeds: FeedsConfig,
    pub stops: StopsConfig,
    pub routes: Vec<RouteRule>,
    pub default_line: LineCategory,
    pub board: BoardConfig,
    pub refresh: RefreshConfig,
    pub web: WebConfig,
}

/// Where the three GTFS-RT feeds live and how to reach them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedsConfig {
    pub trip_updates: String,
    pub vehicle_positions: String,
    pub alerts: String,
    /// Optional forwarding proxy; the feed URL is passed as its `url` query parameter.
    pub proxy: Option<String>,
    pub cache_bust: bool,
    pub min_payload_bytes: usize,
    pub timeout_secs: Option<u64>,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        FeedsConfig {
            trip_updates: URL_TRIP_UPDATES.to_string(),
            vehicle_positions: URL_VEHICLE_POSITIONS.to_string(),
            alerts: URL_ALERTS.to_string(),
            proxy: None,
            cache_bust: true,
            min_payload_bytes: 100,
            timeout_secs: None,
        }
    }
}

/// Accepted stop IDs per platform. The feed has renumbered stops over
/// time, so each side takes a set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StopsConfig {
    pub west: Vec<String>,
    pub east: Vec<String>,
}

impl Default for StopsConfig {
    fn default() -> Self {
        StopsConfig {
            west: vec!["6822".to_string()],
            east: vec!["6831".to_string()],
        }
    }
}

/// One route classification rule: `pattern` is matched as a
/// case-insensitive substring of the feed's route id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub pattern: String,
    pub line: LineCategory,
}

impl RouteRule {
    pub fn new(pattern: &str, line: LineCategory) -> Self {
        RouteRule {
            pattern: pattern.to_string(),
            line,
        }
    }
}

/// Route codes first, then textual aliases.
pub fn default_route_rules() -> Vec<RouteRule> {
    vec![
        RouteRule::new("201", LineCategory::Red),
        RouteRule::new("202", LineCategory::Blue),
        RouteRule::new("red", LineCategory::Red),
        RouteRule::new("blue", LineCategory::Blue),
    ]
}

/// Arrival window and display sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub horizon_minutes: u32,
    pub grace_seconds: u32,
    pub max_departures: usize,
    pub boarding_threshold_minutes: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        BoardConfig {
            horizon_minutes: 60,
            grace_seconds: 60,
            max_departures: 3,
            boarding_threshold_minutes: 1,
        }
    }
}

/// Poll cadence and failure tolerance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub poll_interval: u64,
    pub degraded_after: u32,
    pub show_alerts: bool,
    /// Drop a cycle's render when a newer cycle already rendered.
    pub discard_stale_renders: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            poll_interval: 30,
            degraded_after: 3,
            show_alerts: true,
            discard_stale_renders: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        WebConfig {
            bind: "0.0.0.0:5001".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json(&contents)
    }

    /// Parse config from a JSON string (useful for testing).
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: Config =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if config.routes.is_empty() {
            config.routes = default_route_rules();
        }
        config.validate()?;
        Ok(config)
    }

    /// Built-in City Hall configuration.
    pub fn builtin() -> Self {
        Config {
            routes: default_route_rules(),
            ..Config::default()
        }
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stops.west.is_empty() || self.stops.east.is_empty() {
            return Err(ConfigError::Validation(
                "stops.west and stops.east cannot be empty".to_string(),
            ));
        }
        if self.routes.iter().any(|r| r.pattern.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "route patterns cannot be blank".to_string(),
            ));
        }
        if self.board.grace_seconds > 300 {
            return Err(ConfigError::Validation(format!(
                "grace_seconds must be 0-300, got {}",
                self.board.grace_seconds
            )));
        }
        if !(1..=240).contains(&self.board.horizon_minutes) {
            return Err(ConfigError::Validation(format!(
                "horizon_minutes must be 1-240, got {}",
                self.board.horizon_minutes
            )));
        }
        if !(1..=20).contains(&self.board.max_departures) {
            return Err(ConfigError::Validation(format!(
                "max_departures must be 1-20, got {}",
                self.board.max_departures
            )));
        }
        if self.refresh.poll_interval < 1 {
            return Err(ConfigError::Validation(
                "poll_interval must be at least 1 second".to_string(),
            ));
        }
        if self.refresh.degraded_after < 1 {
            return Err(ConfigError::Validation(
                "degraded_after must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Config I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

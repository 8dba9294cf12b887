use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Instant;

use prost::Message;
use reqwest::{Client, Url};
use tracing::{debug, info, warn};

use crate::config::FeedsConfig;
use crate::transit::proto::FeedMessage;

/// Minimum interval between logging the same error source.
const ERROR_LOG_INTERVAL_SECS: u64 = 300;

/// The three GTFS-RT feeds the publisher exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    TripUpdates,
    VehiclePositions,
    Alerts,
}

impl FeedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedKind::TripUpdates => "trip_updates",
            FeedKind::VehiclePositions => "vehicle_positions",
            FeedKind::Alerts => "alerts",
        }
    }
}

impl std::str::FromStr for FeedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").to_lowercase().as_str() {
            "trip_updates" | "trips" => Ok(FeedKind::TripUpdates),
            "vehicle_positions" | "vehicles" => Ok(FeedKind::VehiclePositions),
            "alerts" => Ok(FeedKind::Alerts),
            other => Err(format!("unknown feed kind '{}'", other)),
        }
    }
}

/// Anything that can hand the board a decoded feed.
///
/// Implementations never fail past this boundary: every transport or decode
/// problem comes back as `None`.
pub trait FeedSource: Send + Sync + 'static {
    fn fetch_feed(&self, kind: FeedKind) -> impl Future<Output = Option<FeedMessage>> + Send;
}

/// Why a fetch produced no feed.
#[derive(Debug)]
pub enum FeedError {
    Url(String),
    Transport(String),
    Status(u16),
    TooShort(usize),
    Decode(String),
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedError::Url(msg) => write!(f, "Bad feed URL: {}", msg),
            FeedError::Transport(msg) => write!(f, "HTTP error: {}", msg),
            FeedError::Status(code) => write!(f, "HTTP status {}", code),
            FeedError::TooShort(len) => write!(f, "Payload too short ({} bytes), treating as corrupted", len),
            FeedError::Decode(msg) => write!(f, "Protobuf decode error: {}", msg),
        }
    }
}

impl std::error::Error for FeedError {}

/// GTFS-RT client over HTTP.
///
/// Never panics; errors are logged (rate limited per feed) and surface as `None`.
pub struct FeedClient {
    http: Client,
    feeds: FeedsConfig,
    last_error_log: Mutex<HashMap<FeedKind, Instant>>,
}

impl FeedClient {
    pub fn new(feeds: FeedsConfig) -> Result<Self, FeedError> {
        let mut builder = Client::builder()
            .user_agent("CTrain-Board-Rust/1.0")
            .gzip(true)
            .pool_max_idle_per_host(4);
        if let Some(secs) = feeds.timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| FeedError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(FeedClient {
            http,
            feeds,
            last_error_log: Mutex::new(HashMap::new()),
        })
    }

    async fn try_fetch(&self, kind: FeedKind) -> Result<FeedMessage, FeedError> {
        let url = request_url(&self.feeds, kind, chrono::Utc::now().timestamp_millis())?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status().as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        decode_payload(&bytes, self.feeds.min_payload_bytes)
    }

    fn log_error(&self, kind: FeedKind, err: &FeedError) {
        let mut last = self
            .last_error_log
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let should_log = match last.get(&kind) {
            Some(at) => at.elapsed().as_secs() >= ERROR_LOG_INTERVAL_SECS,
            None => true,
        };
        if should_log {
            warn!("[FEED] Error fetching {}: {}", kind.as_str(), err);
            last.insert(kind, Instant::now());
        } else {
            debug!("[FEED] Error fetching {}: {}", kind.as_str(), err);
        }
    }

    fn clear_error(&self, kind: FeedKind) {
        let mut last = self
            .last_error_log
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if last.remove(&kind).is_some() {
            info!("[FEED] {} recovered", kind.as_str());
        }
    }
}

impl FeedSource for FeedClient {
    async fn fetch_feed(&self, kind: FeedKind) -> Option<FeedMessage> {
        match self.try_fetch(kind).await {
            Ok(feed) => {
                self.clear_error(kind);
                debug!(
                    "[FEED] {} returned {} entities",
                    kind.as_str(),
                    feed.entity.len()
                );
                Some(feed)
            }
            Err(e) => {
                self.log_error(kind, &e);
                None
            }
        }
    }
}

fn feed_url(feeds: &FeedsConfig, kind: FeedKind) -> &str {
    match kind {
        FeedKind::TripUpdates => &feeds.trip_updates,
        FeedKind::VehiclePositions => &feeds.vehicle_positions,
        FeedKind::Alerts => &feeds.alerts,
    }
}

/// Final request URL: cache-buster on the feed URL, then wrapped in the proxy if any.
pub fn request_url(feeds: &FeedsConfig, kind: FeedKind, now_millis: i64) -> Result<Url, FeedError> {
    let mut target = Url::parse(feed_url(feeds, kind)).map_err(|e| FeedError::Url(e.to_string()))?;
    if feeds.cache_bust {
        target
            .query_pairs_mut()
            .append_pair("cb", &now_millis.to_string());
    }

    match feeds.proxy {
        Some(ref proxy) => {
            let mut proxied = Url::parse(proxy).map_err(|e| FeedError::Url(e.to_string()))?;
            proxied.query_pairs_mut().append_pair("url", target.as_str());
            Ok(proxied)
        }
        None => Ok(target),
    }
}

/// Size check plus protobuf decode.
pub fn decode_payload(bytes: &[u8], min_len: usize) -> Result<FeedMessage, FeedError> {
    if bytes.len() < min_len {
        return Err(FeedError::TooShort(bytes.len()));
    }
    FeedMessage::decode(bytes).map_err(|e| FeedError::Decode(e.to_string()))
}

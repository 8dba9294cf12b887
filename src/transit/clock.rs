use tracing::debug;

use crate::transit::proto::FeedHeader;

/// Coerce a wire timestamp into epoch seconds.
///
/// Every timestamp the board reads goes through here. A missing value, or
/// one that does not fit in `i64`, reads as 0.
pub fn to_epoch_secs<T>(value: Option<T>) -> i64
where
    T: TryInto<i64>,
{
    value.and_then(|v| v.try_into().ok()).unwrap_or(0)
}

/// Local wall clock, epoch seconds.
pub fn local_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// The authoritative "now" for one poll cycle.
///
/// Arrival math runs against the publisher's clock so a skewed local clock
/// cannot produce ghost trains. Falls back to `local_now` when the header
/// carries no usable timestamp.
pub fn reference_time(header: &FeedHeader, local_now: i64) -> i64 {
    let feed_ts = to_epoch_secs(header.timestamp);
    if feed_ts > 0 {
        if let Some(at) = chrono::DateTime::from_timestamp(feed_ts, 0) {
            debug!(
                "[FEED] Synced to publisher time {} (local skew {}s)",
                at.format("%H:%M:%S"),
                local_now - feed_ts
            );
        }
        feed_ts
    } else {
        local_now
    }
}

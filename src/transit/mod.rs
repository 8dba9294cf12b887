//! GTFS-RT ingestion and the feed-to-departures reduction.

pub mod alerts;
pub mod arrivals;
pub mod client;
pub mod clock;
pub mod matcher;
pub mod proto;
pub mod routes;
pub mod schedule;

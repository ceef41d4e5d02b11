//! Aggregation state shared between instruments and the collection pipeline.

pub(crate) mod histogram;
pub(crate) mod last_value;
pub(crate) mod sum;

use std::time::{SystemTime, UNIX_EPOCH};

use crate::data::{MetricData, Temporality};

/// Snapshots aggregation state into exportable metric data.
///
/// Implemented by each aggregation container so a meter can hold instruments
/// of any kind and value type behind one object-safe interface. `None`
/// signals that the state could not be read; the caller logs and skips the
/// instrument without aborting the collection.
pub(crate) trait Aggregate: Send + Sync {
    fn collect(&self, temporality: Temporality, time_unix_nano: u64) -> Option<MetricData>;
}

/// Nanoseconds since the Unix epoch, captured at snapshot time.
pub(crate) fn unix_nanos_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

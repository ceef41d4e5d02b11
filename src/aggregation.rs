//! Aggregation strategies mapping raw measurements to stored state.

use crate::error::{MetricError, MetricResult};

/// Default explicit bucket boundaries for histogram instruments.
pub(crate) const DEFAULT_HISTOGRAM_BOUNDARIES: [f64; 15] = [
    0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 750.0, 1000.0, 2500.0, 5000.0, 7500.0,
    10000.0,
];

/// The way recorded measurements are summarized into a metric stream.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Aggregation {
    /// An aggregation that drops all recorded data.
    Drop,

    /// An aggregation that summarizes a set of measurements as their
    /// arithmetic sum.
    Sum,

    /// An aggregation that summarizes a set of measurements as the last one
    /// made.
    LastValue,

    /// An aggregation that summarizes a set of measurements as a histogram
    /// with explicitly defined buckets.
    ExplicitBucketHistogram {
        /// The increasing bucket boundary values.
        ///
        /// A boundary at index `i` is the inclusive upper bound of bucket
        /// `i`; values greater than the last boundary are counted in an
        /// overflow bucket.
        boundaries: Vec<f64>,
        /// Indicates whether to record min and max alongside the buckets.
        record_min_max: bool,
    },
}

impl Aggregation {
    /// Validate that this aggregation is usable.
    pub fn validate(&self) -> MetricResult<()> {
        match self {
            Aggregation::ExplicitBucketHistogram { boundaries, .. } => {
                validate_boundaries(boundaries)
            }
            _ => Ok(()),
        }
    }
}

/// Checks a set of explicit bucket boundaries.
pub(crate) fn validate_boundaries(boundaries: &[f64]) -> MetricResult<()> {
    if boundaries.is_empty() {
        return Err(MetricError::InvalidExplicitBucketBoundaries(
            "bucket boundaries must be non-empty",
        ));
    }
    for boundary in boundaries {
        if boundary.is_nan() || boundary.is_infinite() {
            return Err(MetricError::InvalidExplicitBucketBoundaries(
                "bucket boundaries must not contain NaN, +Inf, or -Inf",
            ));
        }
    }
    for window in boundaries.windows(2) {
        if window[1] <= window[0] {
            return Err(MetricError::InvalidExplicitBucketBoundaries(
                "bucket boundaries must be strictly increasing",
            ));
        }
    }
    Ok(())
}

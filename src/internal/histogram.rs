//! Explicit-bucket histogram aggregation.

use std::sync::Mutex;

use fnv::FnvHashMap;

use crate::attributes::{AttributeSet, KeyValue};
use crate::data::{self, HistogramDataPoint, MetricData, Temporality};
use crate::internal::Aggregate;

/// Bucket counts plus running statistics for one attribute set.
struct Buckets {
    counts: Vec<u64>,
    count: u64,
    total: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl Buckets {
    /// Returns buckets with `n` bins.
    fn new(n: usize) -> Buckets {
        Buckets {
            counts: vec![0; n],
            count: 0,
            total: 0.0,
            min: None,
            max: None,
        }
    }

    fn bin(&mut self, idx: usize, value: f64) {
        self.counts[idx] += 1;
        self.count += 1;
        self.total += value;
    }

    fn record_min_max(&mut self, value: f64) {
        // f64::min/max keep the non-NaN operand, so NaN measurements never
        // displace an observed extreme.
        self.min = Some(self.min.map_or(value, |min| min.min(value)));
        self.max = Some(self.max.map_or(value, |max| max.max(value)));
    }
}

/// Summarizes a set of measurements as a histogram with explicitly defined
/// buckets.
///
/// Measurements of every accepted value type are promoted to `f64` before
/// bucketing, so the container itself is not generic.
pub(crate) struct Histogram {
    slots: Mutex<FnvHashMap<AttributeSet, Buckets>>,
    bounds: Vec<f64>,
    record_min_max: bool,
}

impl Histogram {
    /// `bounds` must already be validated: non-empty, finite, strictly
    /// increasing.
    pub(crate) fn new(bounds: Vec<f64>, record_min_max: bool) -> Self {
        Histogram {
            slots: Mutex::new(FnvHashMap::default()),
            bounds,
            record_min_max,
        }
    }

    pub(crate) fn measure(&self, value: f64, attributes: &[KeyValue]) {
        // A boundary is an inclusive upper bound: the measurement lands in
        // the first bucket whose boundary is >= value. Values above the last
        // boundary, and NaN, land in the overflow bucket at `bounds.len()`.
        let index = if value.is_nan() {
            self.bounds.len()
        } else {
            self.bounds.partition_point(|&bound| bound < value)
        };

        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        let slot = slots
            .entry(AttributeSet::from(attributes))
            .or_insert_with(|| Buckets::new(self.bounds.len() + 1));
        slot.bin(index, value);
        if self.record_min_max {
            slot.record_min_max(value);
        }
    }
}

impl Aggregate for Histogram {
    fn collect(&self, temporality: Temporality, time_unix_nano: u64) -> Option<MetricData> {
        let slots = self.slots.lock().ok()?;
        Some(MetricData::Histogram(data::Histogram {
            data_points: slots
                .iter()
                .map(|(attributes, buckets)| HistogramDataPoint {
                    attributes: attributes.to_vec(),
                    time_unix_nano,
                    count: buckets.count,
                    sum: buckets.total,
                    bucket_counts: buckets.counts.clone(),
                    explicit_bounds: self.bounds.clone(),
                    min: buckets.min,
                    max: buckets.max,
                })
                .collect(),
            temporality,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::DEFAULT_HISTOGRAM_BOUNDARIES;

    fn single_point(histogram: &Histogram) -> HistogramDataPoint {
        match histogram.collect(Temporality::Cumulative, 0) {
            Some(MetricData::Histogram(data)) => {
                assert_eq!(data.data_points.len(), 1);
                data.data_points.into_iter().next().unwrap()
            }
            other => panic!("expected histogram data, got {other:?}"),
        }
    }

    #[test]
    fn default_boundaries_distribution() {
        let histogram = Histogram::new(DEFAULT_HISTOGRAM_BOUNDARIES.to_vec(), true);
        histogram.measure(1.0, &[]);
        histogram.measure(5.0, &[]);
        histogram.measure(15.0, &[]);

        let point = single_point(&histogram);
        assert_eq!(point.count, 3);
        assert_eq!(point.sum, 21.0);
        assert_eq!(point.min, Some(1.0));
        assert_eq!(point.max, Some(15.0));

        let mut expected = vec![0u64; 16];
        expected[1] = 2; // 1 and 5: first boundary >= value is 5
        expected[3] = 1; // 15: first boundary >= value is 25
        assert_eq!(point.bucket_counts, expected);
        assert_eq!(
            point.bucket_counts.iter().sum::<u64>(),
            point.count,
            "bucket counts must add up to the measurement count"
        );
    }

    #[test]
    fn explicit_boundaries_distribution() {
        let histogram = Histogram::new(vec![1.0, 10.0, 100.0, 1000.0], true);
        histogram.measure(1.0, &[]);
        histogram.measure(5.0, &[]);
        histogram.measure(15.0, &[]);

        let point = single_point(&histogram);
        assert_eq!(point.bucket_counts, vec![1, 1, 1, 0, 0]);
        assert_eq!(point.min, Some(1.0));
        assert_eq!(point.max, Some(15.0));
    }

    #[test]
    fn boundary_values_land_in_their_own_bucket() {
        let histogram = Histogram::new(vec![10.0, 20.0], true);
        histogram.measure(10.0, &[]);
        histogram.measure(10.5, &[]);
        histogram.measure(20.0, &[]);

        let point = single_point(&histogram);
        assert_eq!(point.bucket_counts, vec![1, 2, 0]);
    }

    #[test]
    fn values_above_last_boundary_overflow() {
        let histogram = Histogram::new(vec![1.0, 2.0], true);
        histogram.measure(100.0, &[]);

        let point = single_point(&histogram);
        assert_eq!(point.bucket_counts, vec![0, 0, 1]);
    }

    #[test]
    fn nan_lands_in_overflow_without_touching_min_max() {
        let histogram = Histogram::new(vec![1.0, 2.0], true);
        histogram.measure(1.5, &[]);
        histogram.measure(f64::NAN, &[]);

        let point = single_point(&histogram);
        assert_eq!(point.bucket_counts, vec![0, 1, 1]);
        assert_eq!(point.count, 2);
        assert_eq!(point.min, Some(1.5));
        assert_eq!(point.max, Some(1.5));
    }

    #[test]
    fn min_max_disabled() {
        let histogram = Histogram::new(vec![1.0], false);
        histogram.measure(0.5, &[]);

        let point = single_point(&histogram);
        assert_eq!(point.min, None);
        assert_eq!(point.max, None);
    }

    #[test]
    fn attribute_sets_have_independent_buckets() {
        let histogram = Histogram::new(vec![10.0], true);
        histogram.measure(1.0, &[]);
        histogram.measure(100.0, &[KeyValue::new("k", "v")]);

        let data = match histogram.collect(Temporality::Cumulative, 0) {
            Some(MetricData::Histogram(data)) => data,
            other => panic!("expected histogram data, got {other:?}"),
        };
        assert_eq!(data.data_points.len(), 2);

        let empty = data
            .data_points
            .iter()
            .find(|p| p.attributes.is_empty())
            .expect("empty attribute set point");
        assert_eq!(empty.bucket_counts, vec![1, 0]);

        let keyed = data
            .data_points
            .iter()
            .find(|p| !p.attributes.is_empty())
            .expect("keyed point");
        assert_eq!(keyed.bucket_counts, vec![0, 1]);
    }
}

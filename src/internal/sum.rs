//! Sum aggregation for counter and up/down counter instruments.

use std::sync::Mutex;

use fnv::FnvHashMap;

use crate::attributes::{AttributeSet, KeyValue};
use crate::data::{self, MetricData, NumberDataPoint, Temporality};
use crate::instrument::MeasurementValue;
use crate::internal::Aggregate;

/// Summarizes a set of measurements made as their arithmetic sum.
///
/// Each sum is scoped by the attribute set the measurements were made with.
pub(crate) struct Sum<T: MeasurementValue> {
    slots: Mutex<FnvHashMap<AttributeSet, T>>,
    monotonic: bool,
}

impl<T: MeasurementValue> Sum<T> {
    pub(crate) fn new(monotonic: bool) -> Self {
        Sum {
            slots: Mutex::new(FnvHashMap::default()),
            monotonic,
        }
    }

    pub(crate) fn measure(&self, value: T, attributes: &[KeyValue]) {
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        let slot = slots
            .entry(AttributeSet::from(attributes))
            .or_insert_with(T::zero);
        *slot = slot.accumulate(value);
    }
}

impl<T: MeasurementValue> Aggregate for Sum<T> {
    fn collect(&self, temporality: Temporality, time_unix_nano: u64) -> Option<MetricData> {
        let slots = self.slots.lock().ok()?;
        Some(MetricData::Sum(data::Sum {
            data_points: slots
                .iter()
                .map(|(attributes, value)| NumberDataPoint {
                    attributes: attributes.to_vec(),
                    time_unix_nano,
                    value: value.to_number(),
                })
                .collect(),
            temporality,
            is_monotonic: self.monotonic,
        }))
    }
}

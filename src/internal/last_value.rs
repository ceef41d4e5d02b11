//! Last-value aggregation for gauge instruments.

use std::sync::Mutex;

use fnv::FnvHashMap;

use crate::attributes::{AttributeSet, KeyValue};
use crate::data::{self, MetricData, NumberDataPoint, Temporality};
use crate::instrument::MeasurementValue;
use crate::internal::Aggregate;

/// Summarizes a set of measurements as the last one made.
pub(crate) struct LastValue<T: MeasurementValue> {
    slots: Mutex<FnvHashMap<AttributeSet, T>>,
}

impl<T: MeasurementValue> LastValue<T> {
    pub(crate) fn new() -> Self {
        LastValue {
            slots: Mutex::new(FnvHashMap::default()),
        }
    }

    pub(crate) fn measure(&self, value: T, attributes: &[KeyValue]) {
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        slots.insert(AttributeSet::from(attributes), value);
    }
}

impl<T: MeasurementValue> Aggregate for LastValue<T> {
    fn collect(&self, _temporality: Temporality, time_unix_nano: u64) -> Option<MetricData> {
        let slots = self.slots.lock().ok()?;
        Some(MetricData::Gauge(data::Gauge {
            data_points: slots
                .iter()
                .map(|(attributes, value)| NumberDataPoint {
                    attributes: attributes.to_vec(),
                    time_unix_nano,
                    value: value.to_number(),
                })
                .collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NumberValue;

    fn collected<T: MeasurementValue>(gauge: &LastValue<T>) -> data::Gauge {
        match gauge.collect(Temporality::Delta, 0) {
            Some(MetricData::Gauge(data)) => data,
            other => panic!("expected gauge data, got {other:?}"),
        }
    }

    #[test]
    fn last_write_wins() {
        let gauge = LastValue::<i64>::new();
        gauge.measure(5, &[]);
        gauge.measure(-2, &[]);
        gauge.measure(13, &[]);

        let data = collected(&gauge);
        assert_eq!(data.data_points.len(), 1);
        assert_eq!(data.data_points[0].value, NumberValue::I64(13));
    }

    #[test]
    fn slots_are_independent() {
        let gauge = LastValue::<f64>::new();
        gauge.measure(1.5, &[]);
        gauge.measure(2.5, &[KeyValue::new("host", "a")]);
        gauge.measure(3.5, &[KeyValue::new("host", "a")]);

        let data = collected(&gauge);
        assert_eq!(data.data_points.len(), 2);

        let keyed = data
            .data_points
            .iter()
            .find(|p| !p.attributes.is_empty())
            .expect("keyed point");
        assert_eq!(keyed.value, NumberValue::F64(3.5));
    }
}

//! An exporter that keeps the most recent snapshot in memory.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::data::MetricsData;
use crate::error::{MetricError, MetricResult};
use crate::exporter::PushMetricExporter;

/// Stores the most recently exported snapshot for inspection.
///
/// Useful for testing and debugging pipelines without a live receiver. Each
/// export replaces the stored snapshot with a deep copy; [`fetch`] hands an
/// owned copy back out.
///
/// [`fetch`]: InMemoryMetricExporter::fetch
#[derive(Clone, Default)]
pub struct InMemoryMetricExporter {
    metrics: Arc<Mutex<Option<MetricsData>>>,
}

impl InMemoryMetricExporter {
    /// Creates an exporter with no stored snapshot.
    pub fn new() -> Self {
        InMemoryMetricExporter::default()
    }

    /// Returns an owned copy of the most recently exported snapshot, or
    /// `None` if nothing has been exported yet.
    pub fn fetch(&self) -> Option<MetricsData> {
        self.metrics.lock().ok().and_then(|guard| guard.clone())
    }

    /// Clears the stored snapshot.
    pub fn reset(&self) {
        if let Ok(mut guard) = self.metrics.lock() {
            *guard = None;
        }
    }
}

impl PushMetricExporter for InMemoryMetricExporter {
    fn export_batch(&self, metrics: &MetricsData) -> MetricResult<()> {
        self.metrics
            .lock()
            .map(|mut guard| *guard = Some(metrics.clone()))
            .map_err(|_| MetricError::ExportFailed("in-memory store lock poisoned".into()))
    }
}

impl fmt::Debug for InMemoryMetricExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryMetricExporter").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Metric, MetricData, NumberDataPoint, NumberValue, ResourceMetrics, ScopeMetrics, Sum, Temporality};

    fn sample() -> MetricsData {
        MetricsData {
            resource_metrics: vec![ResourceMetrics {
                resource: Default::default(),
                scope_metrics: vec![ScopeMetrics {
                    scope: Default::default(),
                    metrics: vec![Metric {
                        name: "requests".into(),
                        description: "".into(),
                        unit: "".into(),
                        data: MetricData::Sum(Sum {
                            data_points: vec![NumberDataPoint {
                                attributes: vec![],
                                time_unix_nano: 7,
                                value: NumberValue::I64(1),
                            }],
                            temporality: Temporality::Cumulative,
                            is_monotonic: true,
                        }),
                    }],
                }],
            }],
        }
    }

    #[test]
    fn fetch_returns_deep_copy() {
        let exporter = InMemoryMetricExporter::new();
        assert!(exporter.fetch().is_none());

        exporter.export_batch(&sample()).expect("export");
        let copy = exporter.fetch().expect("stored snapshot");
        assert_eq!(copy, sample());

        // The copy is owned; mutating it does not touch the stored snapshot.
        let mut owned = copy;
        owned.resource_metrics.clear();
        assert_eq!(exporter.fetch().expect("still stored"), sample());
    }

    #[test]
    fn latest_export_wins() {
        let exporter = InMemoryMetricExporter::new();
        exporter.export_batch(&MetricsData::default()).expect("first");
        exporter.export_batch(&sample()).expect("second");
        assert_eq!(exporter.fetch().expect("snapshot"), sample());
    }

    #[test]
    fn reset_clears_the_snapshot() {
        let exporter = InMemoryMetricExporter::new();
        exporter.export_batch(&sample()).expect("export");
        exporter.reset();
        assert!(exporter.fetch().is_none());
    }
}

//! An in-process OpenTelemetry metrics SDK.
//!
//! Applications record measurements through instruments (counters, up/down
//! counters, histograms, gauges) created from [`Meter`]s; a [`MetricReader`]
//! periodically snapshots the aggregated state, keyed by attribute set, and
//! hands it to an exporter as an OTLP-shaped [`data::MetricsData`].
//!
//! # Example
//!
//! ```
//! use otel_metrics::{
//!     InMemoryMetricExporter, KeyValue, MeterOptions, MetricExporter, MetricReader,
//!     SdkMeterProvider,
//! };
//!
//! # fn main() -> otel_metrics::MetricResult<()> {
//! let exporter = InMemoryMetricExporter::new();
//! let reader = MetricReader::new(MetricExporter::new(exporter.clone()));
//!
//! let provider = SdkMeterProvider::new();
//! provider.add_reader(&reader)?;
//!
//! let meter = provider.get_meter(MeterOptions::new("app"))?;
//! let requests = meter.u64_counter("requests").with_unit("1").build()?;
//! requests.add(1, &[KeyValue::new("route", "/healthz")]);
//!
//! reader.collect()?;
//! let snapshot = exporter.fetch().expect("one export");
//! assert_eq!(snapshot.resource_metrics.len(), 1);
//!
//! provider.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! For unattended export, wrap an exporter in a [`PeriodicReader`] and
//! attach its embedded reader instead; a background thread then collects on
//! a configurable interval until shutdown.

mod aggregation;
mod attributes;
pub mod data;
mod error;
mod exporter;
mod in_memory_exporter;
mod instrument;
mod internal;
mod meter;
mod meter_provider;
mod periodic_reader;
mod reader;

pub use aggregation::Aggregation;
pub use attributes::{Key, KeyValue, Value};
pub use error::{MetricError, MetricResult};
pub use exporter::{MetricExporter, PushMetricExporter};
pub use in_memory_exporter::InMemoryMetricExporter;
pub use instrument::{
    Counter, CounterValue, Gauge, GaugeValue, Histogram, HistogramValue, InstrumentKind,
    MeasurementValue, UpDownCounter, UpDownCounterValue,
};
pub use meter::{HistogramBuilder, InstrumentBuilder, Meter, MeterOptions};
pub use meter_provider::SdkMeterProvider;
pub use periodic_reader::{PeriodicReader, PeriodicReaderBuilder};
pub use reader::{
    AggregationSelector, DefaultAggregationSelector, DefaultTemporalitySelector, MetricReader,
    MetricReaderBuilder, TemporalitySelector,
};

//! Types for delivery of pre-aggregated metric time series data.
//!
//! This is the model handed to exporters. It mirrors the OTLP `MetricsData`
//! message shape so a codec can serialize it field for field; everything is
//! `Clone` so sinks can retain deep copies beyond the export call.

use std::borrow::Cow;

use crate::attributes::KeyValue;

mod temporality;

pub use temporality::Temporality;

/// The top-level collection of metrics produced by one collection pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsData {
    /// One entry per meter that the provider owned at snapshot time.
    pub resource_metrics: Vec<ResourceMetrics>,
}

/// A collection of [`ScopeMetrics`] and the entity attributes that produced
/// them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceMetrics {
    /// The entity that collected the metrics.
    pub resource: Resource,
    /// The collection of metrics with unique instrumentation scopes.
    pub scope_metrics: Vec<ScopeMetrics>,
}

/// The entity producing telemetry, described as attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    /// Attribute pairs, in recorded order.
    pub attributes: Vec<KeyValue>,
}

/// The instrumentation scope a meter was created with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentationScope {
    /// The scope name, usually the instrumented library or component.
    pub name: Cow<'static, str>,
    /// The version of the instrumented component.
    pub version: Cow<'static, str>,
    /// Schema URL the emitted telemetry conforms to.
    pub schema_url: Option<Cow<'static, str>>,
}

/// A collection of metrics produced by one meter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeMetrics {
    /// The scope the meter was created with.
    pub scope: InstrumentationScope,
    /// The list of aggregations created by the meter.
    pub metrics: Vec<Metric>,
}

/// One or more aggregated time series from an instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// The name of the instrument that created this data.
    pub name: Cow<'static, str>,
    /// The description of the instrument, which can be used in documentation.
    pub description: Cow<'static, str>,
    /// The unit in which the instrument reports.
    pub unit: Cow<'static, str>,
    /// The aggregated data from the instrument.
    pub data: MetricData,
}

/// Aggregated metric data, tagged by aggregation shape.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricData {
    /// An arithmetic sum across attribute sets.
    Sum(Sum),
    /// The most recent value per attribute set.
    Gauge(Gauge),
    /// Bucketed value distributions per attribute set.
    Histogram(Histogram),
}

/// Represents the sum of all measurements of values from an instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Sum {
    /// Individual aggregated measurements with unique attributes.
    pub data_points: Vec<NumberDataPoint>,
    /// Whether the reported sums cover the stream lifetime or one cycle.
    pub temporality: Temporality,
    /// Whether this aggregation only ever increases.
    pub is_monotonic: bool,
}

/// A measurement of the current value of an instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Gauge {
    /// Individual aggregated measurements with unique attributes.
    pub data_points: Vec<NumberDataPoint>,
}

/// Represents the histogram of all measurements of values from an instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Individual aggregated measurements with unique attributes.
    pub data_points: Vec<HistogramDataPoint>,
    /// Whether the reported buckets cover the stream lifetime or one cycle.
    pub temporality: Temporality,
}

/// The numeric value of a [`NumberDataPoint`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberValue {
    /// Integer-valued instruments.
    I64(i64),
    /// Float-valued instruments.
    F64(f64),
}

/// A single data point in a sum or gauge time series.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberDataPoint {
    /// The set of key value pairs that uniquely identify the time series.
    pub attributes: Vec<KeyValue>,
    /// Nanoseconds since the Unix epoch, captured when the snapshot was
    /// taken (not when the measurements were recorded).
    pub time_unix_nano: u64,
    /// The aggregated value.
    pub value: NumberValue,
}

/// A single histogram data point in a time series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramDataPoint {
    /// The set of key value pairs that uniquely identify the time series.
    pub attributes: Vec<KeyValue>,
    /// Nanoseconds since the Unix epoch, captured at snapshot time.
    pub time_unix_nano: u64,
    /// The number of measurements this histogram was calculated with.
    pub count: u64,
    /// The sum of the recorded values.
    pub sum: f64,
    /// The count of each bucket. One longer than `explicit_bounds`; the
    /// final entry counts values above the last boundary.
    pub bucket_counts: Vec<u64>,
    /// The upper bounds of the buckets, in increasing order.
    pub explicit_bounds: Vec<f64>,
    /// The minimum value recorded, when min/max recording is enabled.
    pub min: Option<f64>,
    /// The maximum value recorded, when min/max recording is enabled.
    pub max: Option<f64>,
}

impl From<Sum> for MetricData {
    fn from(value: Sum) -> Self {
        MetricData::Sum(value)
    }
}

impl From<Gauge> for MetricData {
    fn from(value: Gauge) -> Self {
        MetricData::Gauge(value)
    }
}

impl From<Histogram> for MetricData {
    fn from(value: Histogram) -> Self {
        MetricData::Histogram(value)
    }
}

//! Meters: named scopes that own instruments and enforce identity rules.

use std::borrow::Cow;
use std::fmt;
use std::hash::Hasher;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use fnv::FnvHasher;

use crate::aggregation::{validate_boundaries, Aggregation, DEFAULT_HISTOGRAM_BOUNDARIES};
use crate::attributes::KeyValue;
use crate::data::{InstrumentationScope, Metric};
use crate::error::{MetricError, MetricResult};
use crate::instrument::{
    instrument_identifier, Counter, CounterValue, Gauge, GaugeValue, Histogram, HistogramValue,
    InstrumentDescriptor, InstrumentKind, SdkInstrument, UpDownCounter, UpDownCounterValue,
};
use crate::internal;
use crate::reader::{AggregationSelector, TemporalitySelector};

// maximum length of instrument name
const INSTRUMENT_NAME_MAX_LENGTH: usize = 255;
// maximum length of instrument unit name
const INSTRUMENT_UNIT_NAME_MAX_LENGTH: usize = 63;
// maximum length of instrument description
const INSTRUMENT_DESCRIPTION_MAX_LENGTH: usize = 1023;
// characters allowed in instrument name
const INSTRUMENT_NAME_ALLOWED_NON_ALPHANUMERIC_CHARS: [char; 4] = ['_', '.', '-', '/'];

const INSTRUMENT_NAME_EMPTY: &str = "instrument name must be non-empty";
const INSTRUMENT_NAME_LENGTH: &str = "instrument name must be less than 256 characters";
const INSTRUMENT_NAME_INVALID_CHAR: &str =
    "characters in instrument name must be ASCII and belong to the alphanumeric characters, '_', '.', '-' and '/'";
const INSTRUMENT_NAME_FIRST_ALPHABETIC: &str =
    "instrument name must start with an alphabetic character";

const INSTRUMENT_UNIT_LENGTH: &str = "instrument unit must be less than 64 characters";
const INSTRUMENT_UNIT_INVALID_CHAR: &str = "characters in instrument unit must be ASCII";

const INSTRUMENT_DESCRIPTION_LENGTH: &str =
    "instrument description must be less than 1024 characters";

/// The default version reported for meters created without one.
const DEFAULT_METER_VERSION: &str = "0.1.0";

/// Configuration for requesting a [`Meter`] from a meter provider.
#[derive(Clone, Debug)]
pub struct MeterOptions {
    pub(crate) name: Cow<'static, str>,
    pub(crate) version: Cow<'static, str>,
    pub(crate) schema_url: Option<Cow<'static, str>>,
    pub(crate) attributes: Vec<KeyValue>,
}

impl MeterOptions {
    /// New options for the named scope, with the default version and no
    /// schema URL or attributes.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        MeterOptions {
            name: name.into(),
            version: Cow::Borrowed(DEFAULT_METER_VERSION),
            schema_url: None,
            attributes: Vec::new(),
        }
    }

    /// Sets the scope version.
    pub fn with_version(mut self, version: impl Into<Cow<'static, str>>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the schema URL the emitted telemetry conforms to.
    pub fn with_schema_url(mut self, schema_url: impl Into<Cow<'static, str>>) -> Self {
        self.schema_url = Some(schema_url.into());
        self
    }

    /// Sets the attributes reported as the meter's resource.
    ///
    /// Attributes do not participate in meter identity, but requesting an
    /// existing meter with different attributes is an error.
    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = KeyValue>) -> Self {
        self.attributes = attributes.into_iter().collect();
        self
    }

    pub(crate) fn identity(&self) -> u64 {
        meter_identifier(&self.name, &self.version, self.schema_url.as_deref())
    }
}

/// Stable 64-bit identity of a meter: a hash over name, version, and schema
/// URL (the empty string substituted when absent).
pub(crate) fn meter_identifier(name: &str, version: &str, schema_url: Option<&str>) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(name.as_bytes());
    hasher.write(version.as_bytes());
    hasher.write(schema_url.unwrap_or_default().as_bytes());
    hasher.finish()
}

/// Handles the creation and coordination of all metric instruments within
/// one instrumentation scope.
pub(crate) struct SdkMeter {
    pub(crate) scope: InstrumentationScope,
    pub(crate) attributes: Vec<KeyValue>,
    instruments: Mutex<Vec<SdkInstrument>>,
}

impl SdkMeter {
    pub(crate) fn new(options: MeterOptions) -> Self {
        SdkMeter {
            scope: InstrumentationScope {
                name: options.name,
                version: options.version,
                schema_url: options.schema_url,
            },
            attributes: options.attributes,
            instruments: Mutex::new(Vec::new()),
        }
    }

    /// Snapshots every instrument of this meter into `out`, in creation
    /// order. Instruments whose state cannot be read, or whose kind the
    /// selector maps to [`Aggregation::Drop`], are skipped.
    pub(crate) fn collect_into(
        &self,
        temporality: &dyn TemporalitySelector,
        aggregation: &dyn AggregationSelector,
        time_unix_nano: u64,
        out: &mut Vec<Metric>,
    ) {
        let instruments = match self.instruments.lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!(
                    meter = %self.scope.name,
                    "instrument registry poisoned, skipping meter during collection"
                );
                return;
            }
        };
        for instrument in instruments.iter() {
            let kind = instrument.descriptor.kind;
            if aggregation.aggregation(kind) == Aggregation::Drop {
                continue;
            }
            match instrument
                .state
                .collect(temporality.temporality(kind), time_unix_nano)
            {
                Some(data) => out.push(Metric {
                    name: instrument.descriptor.name.clone(),
                    description: instrument.descriptor.description.clone(),
                    unit: instrument.descriptor.unit.clone(),
                    data,
                }),
                None => tracing::warn!(
                    instrument = %instrument.descriptor.name,
                    "aggregation state unavailable, skipping instrument"
                ),
            }
        }
    }

    fn create_counter<T: CounterValue>(
        &self,
        name: Cow<'static, str>,
        description: Option<Cow<'static, str>>,
        unit: Option<Cow<'static, str>>,
    ) -> MetricResult<Counter<T>> {
        let descriptor = validated_descriptor(name, description, unit, InstrumentKind::Counter)?;
        let state = Arc::new(internal::sum::Sum::new(true));
        self.insert(descriptor, state.clone())?;
        Ok(Counter::new(state))
    }

    fn create_up_down_counter<T: UpDownCounterValue>(
        &self,
        name: Cow<'static, str>,
        description: Option<Cow<'static, str>>,
        unit: Option<Cow<'static, str>>,
    ) -> MetricResult<UpDownCounter<T>> {
        let descriptor =
            validated_descriptor(name, description, unit, InstrumentKind::UpDownCounter)?;
        let state = Arc::new(internal::sum::Sum::new(false));
        self.insert(descriptor, state.clone())?;
        Ok(UpDownCounter::new(state))
    }

    fn create_gauge<T: GaugeValue>(
        &self,
        name: Cow<'static, str>,
        description: Option<Cow<'static, str>>,
        unit: Option<Cow<'static, str>>,
    ) -> MetricResult<Gauge<T>> {
        let descriptor = validated_descriptor(name, description, unit, InstrumentKind::Gauge)?;
        let state = Arc::new(internal::last_value::LastValue::new());
        self.insert(descriptor, state.clone())?;
        Ok(Gauge::new(state))
    }

    fn create_histogram<T: HistogramValue>(
        &self,
        name: Cow<'static, str>,
        description: Option<Cow<'static, str>>,
        unit: Option<Cow<'static, str>>,
        boundaries: Option<Vec<f64>>,
        record_min_max: bool,
    ) -> MetricResult<Histogram<T>> {
        let descriptor = validated_descriptor(name, description, unit, InstrumentKind::Histogram)?;
        let bounds = match boundaries {
            Some(bounds) => {
                validate_boundaries(&bounds)?;
                bounds
            }
            None => DEFAULT_HISTOGRAM_BOUNDARIES.to_vec(),
        };
        let state = Arc::new(internal::histogram::Histogram::new(bounds, record_min_max));
        self.insert(descriptor, state.clone())?;
        Ok(Histogram::new(state))
    }

    /// Registers the instrument under its computed identifier; a collision
    /// drops the caller's freshly constructed state.
    fn insert(
        &self,
        descriptor: InstrumentDescriptor,
        state: Arc<dyn internal::Aggregate>,
    ) -> MetricResult<()> {
        let identifier = instrument_identifier(
            &descriptor.name,
            descriptor.kind,
            &descriptor.unit,
            &descriptor.description,
        );
        let mut instruments = self
            .instruments
            .lock()
            .map_err(|_| MetricError::InternalFailure("instrument registry poisoned".into()))?;
        if instruments
            .iter()
            .any(|existing| existing.identifier == identifier)
        {
            return Err(MetricError::InstrumentAlreadyExists(identifier));
        }
        instruments.push(SdkInstrument {
            identifier,
            descriptor,
            state,
        });
        Ok(())
    }
}

impl fmt::Debug for SdkMeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meter").field("scope", &self.scope).finish()
    }
}

fn validated_descriptor(
    name: Cow<'static, str>,
    description: Option<Cow<'static, str>>,
    unit: Option<Cow<'static, str>>,
    kind: InstrumentKind,
) -> MetricResult<InstrumentDescriptor> {
    validate_instrument_name(&name)?;
    validate_instrument_unit(unit.as_deref())?;
    validate_instrument_description(description.as_deref())?;
    Ok(InstrumentDescriptor {
        name,
        description: description.unwrap_or_default(),
        unit: unit.unwrap_or_default(),
        kind,
    })
}

fn validate_instrument_name(name: &str) -> MetricResult<()> {
    if name.is_empty() {
        return Err(MetricError::InvalidName(INSTRUMENT_NAME_EMPTY));
    }
    if name.len() > INSTRUMENT_NAME_MAX_LENGTH {
        return Err(MetricError::InvalidName(INSTRUMENT_NAME_LENGTH));
    }
    if name.starts_with(|c: char| !c.is_ascii_alphabetic()) {
        return Err(MetricError::InvalidName(INSTRUMENT_NAME_FIRST_ALPHABETIC));
    }
    if name.contains(|c: char| {
        !c.is_ascii_alphanumeric() && !INSTRUMENT_NAME_ALLOWED_NON_ALPHANUMERIC_CHARS.contains(&c)
    }) {
        return Err(MetricError::InvalidName(INSTRUMENT_NAME_INVALID_CHAR));
    }
    Ok(())
}

fn validate_instrument_unit(unit: Option<&str>) -> MetricResult<()> {
    if let Some(unit) = unit {
        if unit.len() > INSTRUMENT_UNIT_NAME_MAX_LENGTH {
            return Err(MetricError::InvalidUnit(INSTRUMENT_UNIT_LENGTH));
        }
        if unit.contains(|c: char| !c.is_ascii()) {
            return Err(MetricError::InvalidUnit(INSTRUMENT_UNIT_INVALID_CHAR));
        }
    }
    Ok(())
}

fn validate_instrument_description(description: Option<&str>) -> MetricResult<()> {
    if let Some(description) = description {
        if description.len() > INSTRUMENT_DESCRIPTION_MAX_LENGTH {
            return Err(MetricError::InvalidDescription(
                INSTRUMENT_DESCRIPTION_LENGTH,
            ));
        }
    }
    Ok(())
}

/// A named scope that owns instruments.
///
/// Cloning is cheap; clones share the underlying scope and instruments.
#[derive(Clone, Debug)]
pub struct Meter {
    pub(crate) inner: Arc<SdkMeter>,
}

impl Meter {
    pub(crate) fn new(inner: Arc<SdkMeter>) -> Self {
        Meter { inner }
    }

    /// Creates a builder for a `Counter<u16>`.
    pub fn u16_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, Counter<u16>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for a `Counter<u32>`.
    pub fn u32_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, Counter<u32>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for a `Counter<u64>`.
    pub fn u64_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, Counter<u64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for an `UpDownCounter<i16>`.
    pub fn i16_up_down_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, UpDownCounter<i16>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for an `UpDownCounter<i32>`.
    pub fn i32_up_down_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, UpDownCounter<i32>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for an `UpDownCounter<i64>`.
    pub fn i64_up_down_counter(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> InstrumentBuilder<'_, UpDownCounter<i64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for a `Gauge<i16>`.
    pub fn i16_gauge(&self, name: impl Into<Cow<'static, str>>) -> InstrumentBuilder<'_, Gauge<i16>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for a `Gauge<i32>`.
    pub fn i32_gauge(&self, name: impl Into<Cow<'static, str>>) -> InstrumentBuilder<'_, Gauge<i32>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for a `Gauge<i64>`.
    pub fn i64_gauge(&self, name: impl Into<Cow<'static, str>>) -> InstrumentBuilder<'_, Gauge<i64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for a `Gauge<f32>`.
    pub fn f32_gauge(&self, name: impl Into<Cow<'static, str>>) -> InstrumentBuilder<'_, Gauge<f32>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for a `Gauge<f64>`.
    pub fn f64_gauge(&self, name: impl Into<Cow<'static, str>>) -> InstrumentBuilder<'_, Gauge<f64>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Creates a builder for a `Histogram<u16>`.
    pub fn u16_histogram(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> HistogramBuilder<'_, u16> {
        HistogramBuilder::new(self, name.into())
    }

    /// Creates a builder for a `Histogram<u32>`.
    pub fn u32_histogram(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> HistogramBuilder<'_, u32> {
        HistogramBuilder::new(self, name.into())
    }

    /// Creates a builder for a `Histogram<u64>`.
    pub fn u64_histogram(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> HistogramBuilder<'_, u64> {
        HistogramBuilder::new(self, name.into())
    }

    /// Creates a builder for a `Histogram<f32>`.
    pub fn f32_histogram(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> HistogramBuilder<'_, f32> {
        HistogramBuilder::new(self, name.into())
    }

    /// Creates a builder for a `Histogram<f64>`.
    pub fn f64_histogram(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> HistogramBuilder<'_, f64> {
        HistogramBuilder::new(self, name.into())
    }
}

/// Configures a counter, up/down counter, or gauge before registration.
pub struct InstrumentBuilder<'a, I> {
    meter: &'a Meter,
    name: Cow<'static, str>,
    description: Option<Cow<'static, str>>,
    unit: Option<Cow<'static, str>>,
    _instrument: PhantomData<I>,
}

impl<'a, I> InstrumentBuilder<'a, I> {
    fn new(meter: &'a Meter, name: Cow<'static, str>) -> Self {
        InstrumentBuilder {
            meter,
            name,
            description: None,
            unit: None,
            _instrument: PhantomData,
        }
    }

    /// Sets the instrument description.
    pub fn with_description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the instrument unit.
    ///
    /// The unit must be 63 ASCII characters or fewer.
    pub fn with_unit(mut self, unit: impl Into<Cow<'static, str>>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

impl<T: CounterValue> InstrumentBuilder<'_, Counter<T>> {
    /// Validates the configuration and registers the instrument.
    pub fn build(self) -> MetricResult<Counter<T>> {
        self.meter
            .inner
            .create_counter(self.name, self.description, self.unit)
    }
}

impl<T: UpDownCounterValue> InstrumentBuilder<'_, UpDownCounter<T>> {
    /// Validates the configuration and registers the instrument.
    pub fn build(self) -> MetricResult<UpDownCounter<T>> {
        self.meter
            .inner
            .create_up_down_counter(self.name, self.description, self.unit)
    }
}

impl<T: GaugeValue> InstrumentBuilder<'_, Gauge<T>> {
    /// Validates the configuration and registers the instrument.
    pub fn build(self) -> MetricResult<Gauge<T>> {
        self.meter
            .inner
            .create_gauge(self.name, self.description, self.unit)
    }
}

/// Configures a histogram before registration.
pub struct HistogramBuilder<'a, T> {
    meter: &'a Meter,
    name: Cow<'static, str>,
    description: Option<Cow<'static, str>>,
    unit: Option<Cow<'static, str>>,
    boundaries: Option<Vec<f64>>,
    record_min_max: bool,
    _number: PhantomData<T>,
}

impl<'a, T: HistogramValue> HistogramBuilder<'a, T> {
    fn new(meter: &'a Meter, name: Cow<'static, str>) -> Self {
        HistogramBuilder {
            meter,
            name,
            description: None,
            unit: None,
            boundaries: None,
            record_min_max: true,
            _number: PhantomData,
        }
    }

    /// Sets the instrument description.
    pub fn with_description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the instrument unit.
    pub fn with_unit(mut self, unit: impl Into<Cow<'static, str>>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets the explicit bucket boundaries. Boundaries must be non-empty and
    /// strictly increasing.
    pub fn with_boundaries(mut self, boundaries: Vec<f64>) -> Self {
        self.boundaries = Some(boundaries);
        self
    }

    /// Controls whether min and max values are recorded alongside buckets.
    pub fn with_record_min_max(mut self, record_min_max: bool) -> Self {
        self.record_min_max = record_min_max;
        self
    }

    /// Validates the configuration and registers the instrument.
    pub fn build(self) -> MetricResult<Histogram<T>> {
        self.meter.inner.create_histogram(
            self.name,
            self.description,
            self.unit,
            self.boundaries,
            self.record_min_max,
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn meter() -> Meter {
        Meter::new(Arc::new(SdkMeter::new(MeterOptions::new("test"))))
    }

    #[rstest]
    #[case("123")]
    #[case("")]
    #[case("alpha-?")]
    #[case("_leading_underscore")]
    #[case("has space")]
    #[case("hyphén")]
    fn invalid_names_are_rejected(#[case] name: &str) {
        assert!(matches!(
            validate_instrument_name(name),
            Err(MetricError::InvalidName(_))
        ));
    }

    #[rstest]
    #[case("requests")]
    #[case("a")]
    #[case("request.latency_ms")]
    #[case("http/server-duration")]
    fn valid_names_are_accepted(#[case] name: &str) {
        assert!(validate_instrument_name(name).is_ok());
    }

    #[test]
    fn name_length_limit() {
        let ok = "a".repeat(255);
        let too_long = "a".repeat(256);
        assert!(validate_instrument_name(&ok).is_ok());
        assert!(matches!(
            validate_instrument_name(&too_long),
            Err(MetricError::InvalidName(INSTRUMENT_NAME_LENGTH))
        ));
    }

    #[test]
    fn unit_rules() {
        assert!(validate_instrument_unit(None).is_ok());
        assert!(validate_instrument_unit(Some("ms")).is_ok());
        let too_long = "a".repeat(64);
        assert!(matches!(
            validate_instrument_unit(Some(&too_long)),
            Err(MetricError::InvalidUnit(INSTRUMENT_UNIT_LENGTH))
        ));
        assert!(matches!(
            validate_instrument_unit(Some("µs")),
            Err(MetricError::InvalidUnit(INSTRUMENT_UNIT_INVALID_CHAR))
        ));
    }

    #[test]
    fn description_length_limit() {
        let ok = "d".repeat(1023);
        let too_long = "d".repeat(1024);
        assert!(validate_instrument_description(Some(&ok)).is_ok());
        assert!(matches!(
            validate_instrument_description(Some(&too_long)),
            Err(MetricError::InvalidDescription(_))
        ));
    }

    #[test]
    fn invalid_name_surfaces_from_builder() {
        let meter = meter();
        assert!(matches!(
            meter.u64_counter("123").build(),
            Err(MetricError::InvalidName(_))
        ));
    }

    #[test]
    fn duplicate_instruments_are_rejected() {
        let meter = meter();
        let _first = meter.u64_counter("requests").build().expect("first");
        assert!(matches!(
            meter.u64_counter("requests").build(),
            Err(MetricError::InstrumentAlreadyExists(_))
        ));
        // Case-insensitive on name.
        assert!(matches!(
            meter.u64_counter("Requests").build(),
            Err(MetricError::InstrumentAlreadyExists(_))
        ));
    }

    #[test]
    fn identifying_fields_distinguish_instruments() {
        let meter = meter();
        let _counter = meter.u64_counter("work").build().expect("counter");
        // Different kind, unit, or description: distinct identities.
        assert!(meter.i64_up_down_counter("work").build().is_ok());
        assert!(meter.u64_counter("work").with_unit("1").build().is_ok());
        assert!(meter
            .u64_counter("work")
            .with_description("jobs processed")
            .build()
            .is_ok());
    }

    #[test]
    fn histogram_boundary_validation_surfaces() {
        let meter = meter();
        assert!(matches!(
            meter
                .f64_histogram("latency")
                .with_boundaries(vec![])
                .build(),
            Err(MetricError::InvalidExplicitBucketBoundaries(_))
        ));
        assert!(matches!(
            meter
                .f64_histogram("latency")
                .with_boundaries(vec![2.0, 1.0])
                .build(),
            Err(MetricError::InvalidExplicitBucketBoundaries(_))
        ));
        assert!(meter
            .f64_histogram("latency")
            .with_boundaries(vec![1.0, 10.0, 100.0, 1000.0])
            .build()
            .is_ok());
    }

    #[test]
    fn meter_identifier_covers_all_fields() {
        let base = meter_identifier("scope", "1.0", None);
        assert_eq!(base, meter_identifier("scope", "1.0", None));
        assert_ne!(base, meter_identifier("scope2", "1.0", None));
        assert_ne!(base, meter_identifier("scope", "1.1", None));
        assert_ne!(base, meter_identifier("scope", "1.0", Some("https://example.com/schema")));
    }
}

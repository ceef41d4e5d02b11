//! Instrument kinds, identity, and the user-facing instrument handles.

use std::fmt;
use std::hash::Hasher;
use std::marker::PhantomData;
use std::sync::Arc;

use fnv::FnvHasher;

use crate::attributes::KeyValue;
use crate::data::NumberValue;
use crate::internal;

/// The identifier of a group of instruments that all perform the same
/// function.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum InstrumentKind {
    /// Instruments that record increasing values.
    Counter,
    /// Instruments that record increasing and decreasing values.
    UpDownCounter,
    /// Instruments that record a distribution of values.
    Histogram,
    /// Instruments that record the current value, last writer wins.
    Gauge,
}

impl InstrumentKind {
    /// Stable tag embedded in instrument identifiers.
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            InstrumentKind::Counter => "counter",
            InstrumentKind::UpDownCounter => "up_down_counter",
            InstrumentKind::Histogram => "histogram",
            InstrumentKind::Gauge => "gauge",
        }
    }
}

/// The identifying fields of an instrument, serialized to one string.
///
/// Names are compared case-insensitively; unit and description participate
/// in the identity, with the description folded to a stable 64-bit hash.
pub(crate) fn instrument_identifier(
    name: &str,
    kind: InstrumentKind,
    unit: &str,
    description: &str,
) -> String {
    let mut hasher = FnvHasher::default();
    hasher.write(description.as_bytes());
    format!(
        "{}|{}|{}|{:x}",
        name.to_ascii_lowercase(),
        kind.tag(),
        unit,
        hasher.finish()
    )
}

/// The descriptor fields surfaced on every collected metric.
#[derive(Clone, Debug)]
pub(crate) struct InstrumentDescriptor {
    pub(crate) name: std::borrow::Cow<'static, str>,
    pub(crate) description: std::borrow::Cow<'static, str>,
    pub(crate) unit: std::borrow::Cow<'static, str>,
    pub(crate) kind: InstrumentKind,
}

/// An instrument registered with a meter: its descriptor plus the
/// aggregation state the collection pipeline snapshots.
pub(crate) struct SdkInstrument {
    pub(crate) identifier: String,
    pub(crate) descriptor: InstrumentDescriptor,
    pub(crate) state: Arc<dyn internal::Aggregate>,
}

mod private {
    pub trait Sealed {}

    impl Sealed for u16 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
    impl Sealed for i16 {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// A numeric measurement value the SDK can aggregate.
///
/// Sealed; which types an instrument kind accepts is fixed by the marker
/// traits below, so unsupported value types fail at compile time.
pub trait MeasurementValue: private::Sealed + Copy + Send + Sync + fmt::Debug + 'static {
    #[doc(hidden)]
    fn zero() -> Self;
    /// Adds `other` onto `self`. Integer types wrap rather than abort the
    /// recording thread on overflow.
    #[doc(hidden)]
    fn accumulate(self, other: Self) -> Self;
    #[doc(hidden)]
    fn to_number(self) -> NumberValue;
    #[doc(hidden)]
    fn to_f64(self) -> f64;
}

macro_rules! int_measurement_value {
    ($($ty:ty),*) => {
        $(impl MeasurementValue for $ty {
            fn zero() -> Self {
                0
            }
            fn accumulate(self, other: Self) -> Self {
                self.wrapping_add(other)
            }
            fn to_number(self) -> NumberValue {
                NumberValue::I64(self as i64)
            }
            fn to_f64(self) -> f64 {
                self as f64
            }
        })*
    };
}

macro_rules! float_measurement_value {
    ($($ty:ty),*) => {
        $(impl MeasurementValue for $ty {
            fn zero() -> Self {
                0.0
            }
            fn accumulate(self, other: Self) -> Self {
                self + other
            }
            fn to_number(self) -> NumberValue {
                NumberValue::F64(self as f64)
            }
            fn to_f64(self) -> f64 {
                self as f64
            }
        })*
    };
}

int_measurement_value!(u16, u32, u64, i16, i32, i64);
float_measurement_value!(f32, f64);

/// Value types accepted by [`Counter`]. Unsigned, so monotonicity holds by
/// construction.
pub trait CounterValue: MeasurementValue {}

impl CounterValue for u16 {}
impl CounterValue for u32 {}
impl CounterValue for u64 {}

/// Value types accepted by [`UpDownCounter`].
pub trait UpDownCounterValue: MeasurementValue {}

impl UpDownCounterValue for i16 {}
impl UpDownCounterValue for i32 {}
impl UpDownCounterValue for i64 {}

/// Value types accepted by [`Histogram`].
pub trait HistogramValue: MeasurementValue {}

impl HistogramValue for u16 {}
impl HistogramValue for u32 {}
impl HistogramValue for u64 {}
impl HistogramValue for f32 {}
impl HistogramValue for f64 {}

/// Value types accepted by [`Gauge`].
pub trait GaugeValue: MeasurementValue {}

impl GaugeValue for i16 {}
impl GaugeValue for i32 {}
impl GaugeValue for i64 {}
impl GaugeValue for f32 {}
impl GaugeValue for f64 {}

/// An instrument that records increasing values.
#[derive(Clone)]
pub struct Counter<T: CounterValue> {
    state: Arc<internal::sum::Sum<T>>,
}

impl<T: CounterValue> Counter<T> {
    pub(crate) fn new(state: Arc<internal::sum::Sum<T>>) -> Self {
        Counter { state }
    }

    /// Records an increment to the counter for the given attribute set.
    pub fn add(&self, value: T, attributes: &[KeyValue]) {
        self.state.measure(value, attributes);
    }
}

impl<T: CounterValue> fmt::Debug for Counter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter").finish()
    }
}

/// An instrument that records increasing and decreasing values.
#[derive(Clone)]
pub struct UpDownCounter<T: UpDownCounterValue> {
    state: Arc<internal::sum::Sum<T>>,
}

impl<T: UpDownCounterValue> UpDownCounter<T> {
    pub(crate) fn new(state: Arc<internal::sum::Sum<T>>) -> Self {
        UpDownCounter { state }
    }

    /// Records a signed delta for the given attribute set.
    pub fn add(&self, value: T, attributes: &[KeyValue]) {
        self.state.measure(value, attributes);
    }
}

impl<T: UpDownCounterValue> fmt::Debug for UpDownCounter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpDownCounter").finish()
    }
}

/// An instrument that records the current value; the last write within a
/// collection cycle wins.
#[derive(Clone)]
pub struct Gauge<T: GaugeValue> {
    state: Arc<internal::last_value::LastValue<T>>,
}

impl<T: GaugeValue> Gauge<T> {
    pub(crate) fn new(state: Arc<internal::last_value::LastValue<T>>) -> Self {
        Gauge { state }
    }

    /// Records the current value for the given attribute set.
    pub fn record(&self, value: T, attributes: &[KeyValue]) {
        self.state.measure(value, attributes);
    }
}

impl<T: GaugeValue> fmt::Debug for Gauge<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge").finish()
    }
}

/// An instrument that records a distribution of values into explicit
/// buckets.
#[derive(Clone)]
pub struct Histogram<T: HistogramValue> {
    state: Arc<internal::histogram::Histogram>,
    _number: PhantomData<T>,
}

impl<T: HistogramValue> Histogram<T> {
    pub(crate) fn new(state: Arc<internal::histogram::Histogram>) -> Self {
        Histogram {
            state,
            _number: PhantomData,
        }
    }

    /// Records a value into the distribution for the given attribute set.
    pub fn record(&self, value: T, attributes: &[KeyValue]) {
        self.state.measure(value.to_f64(), attributes);
    }
}

impl<T: HistogramValue> fmt::Debug for Histogram<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Histogram").finish()
    }
}

//! The root registry of meters and readers.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use fnv::FnvHashMap;

use crate::error::{MetricError, MetricResult};
use crate::meter::{Meter, MeterOptions, SdkMeter};
use crate::reader::MetricReader;

/// Handles the creation and coordination of [`Meter`]s.
///
/// All meters created by a provider have their produced telemetry passed to
/// the attached [`MetricReader`]s. Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct SdkMeterProvider {
    inner: Arc<ProviderInner>,
}

pub(crate) struct ProviderInner {
    meters: Mutex<FnvHashMap<u64, Meter>>,
    readers: Mutex<Vec<MetricReader>>,
    is_shutdown: AtomicBool,
}

impl SdkMeterProvider {
    /// Creates a provider with no meters and no readers.
    pub fn new() -> Self {
        SdkMeterProvider {
            inner: Arc::new(ProviderInner {
                meters: Mutex::new(FnvHashMap::default()),
                readers: Mutex::new(Vec::new()),
                is_shutdown: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the meter for `options`, creating it on first request.
    ///
    /// Identity is the (name, version, schema URL) triple; a repeated
    /// request with the same identity returns the same meter, provided the
    /// attribute sequences are equal. The same identity with different
    /// attributes fails with
    /// [`MetricError::MeterExistsWithDifferentAttributes`].
    pub fn get_meter(&self, options: MeterOptions) -> MetricResult<Meter> {
        let identity = options.identity();
        let mut meters = self
            .inner
            .meters
            .lock()
            .map_err(|_| MetricError::InternalFailure("meter registry poisoned".into()))?;
        if let Some(existing) = meters.get(&identity) {
            if existing.inner.attributes == options.attributes {
                return Ok(existing.clone());
            }
            return Err(MetricError::MeterExistsWithDifferentAttributes);
        }
        let meter = Meter::new(Arc::new(SdkMeter::new(options)));
        meters.insert(identity, meter.clone());
        Ok(meter)
    }

    /// Attaches `reader` to this provider.
    ///
    /// A reader can be attached at most once; re-attachment, even to the
    /// same provider, fails with [`MetricError::ReaderAlreadyAttached`].
    pub fn add_reader(&self, reader: &MetricReader) -> MetricResult<()> {
        // Take the list lock before attaching so a failure to track the
        // reader cannot leave it attached but unmanaged.
        let mut readers = self
            .inner
            .readers
            .lock()
            .map_err(|_| MetricError::InternalFailure("reader list poisoned".into()))?;
        reader.attach(Arc::downgrade(&self.inner))?;
        readers.push(reader.clone());
        Ok(())
    }

    /// Shuts down the provider: every attached reader performs a final
    /// collection and is shut down, then meters and instruments are
    /// released.
    ///
    /// Idempotent; repeated calls are no-ops.
    pub fn shutdown(&self) -> MetricResult<()> {
        self.inner.shutdown();
        Ok(())
    }
}

impl Default for SdkMeterProvider {
    fn default() -> Self {
        SdkMeterProvider::new()
    }
}

impl fmt::Debug for SdkMeterProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdkMeterProvider")
            .field(
                "is_shutdown",
                &self.inner.is_shutdown.load(Ordering::Acquire),
            )
            .finish()
    }
}

impl ProviderInner {
    /// Snapshot of the current meters, in no particular order.
    pub(crate) fn meters(&self) -> Vec<Meter> {
        match self.meters.lock() {
            Ok(meters) => meters.values().cloned().collect(),
            Err(_) => {
                tracing::warn!("meter registry poisoned, collection sees no meters");
                Vec::new()
            }
        }
    }

    fn shutdown(&self) {
        if self.is_shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let readers = match self.readers.lock() {
            Ok(mut readers) => std::mem::take(&mut *readers),
            Err(_) => Vec::new(),
        };
        for reader in readers {
            if let Err(err) = reader.shutdown() {
                tracing::warn!(error = %err, "metric reader shutdown failed");
            }
        }
        if let Ok(mut meters) = self.meters.lock() {
            meters.clear();
        }
    }
}

impl Drop for ProviderInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::KeyValue;
    use crate::exporter::MetricExporter;
    use crate::in_memory_exporter::InMemoryMetricExporter;

    fn reader_pair() -> (InMemoryMetricExporter, MetricReader) {
        let exporter = InMemoryMetricExporter::new();
        let reader = MetricReader::new(MetricExporter::new(exporter.clone()));
        (exporter, reader)
    }

    #[test]
    fn same_identity_returns_same_meter() {
        let provider = SdkMeterProvider::new();
        let a = provider.get_meter(MeterOptions::new("scope")).expect("a");
        let b = provider.get_meter(MeterOptions::new("scope")).expect("b");
        assert!(Arc::ptr_eq(&a.inner, &b.inner));

        let other = provider
            .get_meter(MeterOptions::new("scope").with_version("2.0"))
            .expect("other");
        assert!(!Arc::ptr_eq(&a.inner, &other.inner));
    }

    #[test]
    fn same_identity_with_matching_attributes_is_idempotent() {
        let provider = SdkMeterProvider::new();
        let options = || {
            MeterOptions::new("scope")
                .with_attributes([KeyValue::new("deployment", "test")])
        };
        let a = provider.get_meter(options()).expect("a");
        let b = provider.get_meter(options()).expect("b");
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
    }

    #[test]
    fn different_attributes_with_same_identity_fail() {
        let provider = SdkMeterProvider::new();
        let _a = provider
            .get_meter(MeterOptions::new("scope").with_attributes([KeyValue::new("env", "a")]))
            .expect("first");
        assert!(matches!(
            provider
                .get_meter(MeterOptions::new("scope").with_attributes([KeyValue::new("env", "b")])),
            Err(MetricError::MeterExistsWithDifferentAttributes)
        ));
    }

    #[test]
    fn reader_cannot_be_attached_twice() {
        let provider = SdkMeterProvider::new();
        let (_exporter, reader) = reader_pair();
        provider.add_reader(&reader).expect("first attach");
        assert!(matches!(
            provider.add_reader(&reader),
            Err(MetricError::ReaderAlreadyAttached)
        ));

        let second_provider = SdkMeterProvider::new();
        assert!(matches!(
            second_provider.add_reader(&reader),
            Err(MetricError::ReaderAlreadyAttached)
        ));
    }

    #[test]
    fn shutdown_is_idempotent_and_finalizes_readers() {
        let provider = SdkMeterProvider::new();
        let (exporter, reader) = reader_pair();
        provider.add_reader(&reader).expect("attach");

        let meter = provider.get_meter(MeterOptions::new("scope")).expect("meter");
        let counter = meter.u64_counter("requests").build().expect("counter");
        counter.add(2, &[]);

        provider.shutdown().expect("first shutdown");
        provider.shutdown().expect("second shutdown");

        // The final collection ran before the reader shut down.
        let snapshot = exporter.fetch().expect("final export");
        assert_eq!(snapshot.resource_metrics.len(), 1);

        // Post-shutdown collection is a no-op that succeeds.
        assert!(reader.collect().is_ok());
    }
}

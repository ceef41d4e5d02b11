//! Interfaces for reading and producing metrics.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::aggregation::{Aggregation, DEFAULT_HISTOGRAM_BOUNDARIES};
use crate::data::{MetricsData, Resource, ResourceMetrics, ScopeMetrics, Temporality};
use crate::error::{MetricError, MetricResult};
use crate::exporter::MetricExporter;
use crate::instrument::InstrumentKind;
use crate::internal;
use crate::meter_provider::ProviderInner;

/// Selects the temporality of emitted streams by instrument kind.
pub trait TemporalitySelector: Send + Sync + 'static {
    /// The temporality to emit for instruments of `kind`.
    fn temporality(&self, kind: InstrumentKind) -> Temporality;
}

/// Cumulative streams for additive instruments, delta for gauges.
#[derive(Clone, Debug, Default)]
pub struct DefaultTemporalitySelector;

impl TemporalitySelector for DefaultTemporalitySelector {
    fn temporality(&self, kind: InstrumentKind) -> Temporality {
        match kind {
            InstrumentKind::Gauge => Temporality::Delta,
            _ => Temporality::Cumulative,
        }
    }
}

/// Selects the aggregation strategy by instrument kind.
///
/// Returning [`Aggregation::Drop`] excludes that kind from collection.
pub trait AggregationSelector: Send + Sync + 'static {
    /// The aggregation to use for instruments of `kind`.
    fn aggregation(&self, kind: InstrumentKind) -> Aggregation;
}

/// The default aggregation of each instrument kind.
#[derive(Clone, Debug, Default)]
pub struct DefaultAggregationSelector;

impl AggregationSelector for DefaultAggregationSelector {
    fn aggregation(&self, kind: InstrumentKind) -> Aggregation {
        match kind {
            InstrumentKind::Counter | InstrumentKind::UpDownCounter => Aggregation::Sum,
            InstrumentKind::Gauge => Aggregation::LastValue,
            InstrumentKind::Histogram => Aggregation::ExplicitBucketHistogram {
                boundaries: DEFAULT_HISTOGRAM_BOUNDARIES.to_vec(),
                record_min_max: true,
            },
        }
    }
}

/// Pull-side component that snapshots instrument state and forwards it to an
/// exporter.
///
/// A reader is attached to at most one meter provider over its lifetime.
/// Cloning is cheap; clones share attachment and shutdown state.
#[derive(Clone)]
pub struct MetricReader {
    inner: Arc<ReaderInner>,
}

struct ReaderInner {
    provider: Mutex<Option<Weak<ProviderInner>>>,
    is_shutdown: AtomicBool,
    temporality: Box<dyn TemporalitySelector>,
    aggregation: Box<dyn AggregationSelector>,
    exporter: MetricExporter,
    /// Invoked once at the start of [`MetricReader::shutdown`], before the
    /// final collection. A periodic reader registers its worker teardown
    /// here so a provider-driven shutdown also stops the worker.
    on_shutdown: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl MetricReader {
    /// Creates a reader with the default temporality and aggregation
    /// selectors.
    pub fn new(exporter: MetricExporter) -> Self {
        MetricReader::builder(exporter).build()
    }

    /// Configuration options for a metric reader.
    pub fn builder(exporter: MetricExporter) -> MetricReaderBuilder {
        MetricReaderBuilder {
            temporality: Box::new(DefaultTemporalitySelector),
            aggregation: Box::new(DefaultAggregationSelector),
            exporter,
        }
    }

    /// Records the provider this reader collects from. Fails once attached,
    /// even when re-attaching to the same provider.
    pub(crate) fn attach(&self, provider: Weak<ProviderInner>) -> MetricResult<()> {
        let mut slot = self
            .inner
            .provider
            .lock()
            .map_err(|_| MetricError::InternalFailure("reader state poisoned".into()))?;
        if slot.is_some() {
            return Err(MetricError::ReaderAlreadyAttached);
        }
        *slot = Some(provider);
        Ok(())
    }

    /// Registers the teardown to run when this reader shuts down, however
    /// the shutdown is triggered.
    pub(crate) fn set_on_shutdown(&self, hook: impl FnOnce() + Send + 'static) {
        match self.inner.on_shutdown.lock() {
            Ok(mut slot) => *slot = Some(Box::new(hook)),
            Err(_) => tracing::warn!("reader state poisoned, shutdown hook not registered"),
        }
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.inner
            .provider
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Snapshots every instrument of every meter into a [`MetricsData`] and
    /// hands it to the exporter.
    ///
    /// After shutdown this is a successful no-op. Without an attached
    /// provider it fails with [`MetricError::MissingMeterProvider`]; an
    /// exporter failure surfaces as [`MetricError::ExportFailed`] and the
    /// snapshot is discarded.
    pub fn collect(&self) -> MetricResult<()> {
        if self.inner.is_shutdown.load(Ordering::Acquire) {
            return Ok(());
        }
        let provider = {
            let slot = self
                .inner
                .provider
                .lock()
                .map_err(|_| MetricError::InternalFailure("reader state poisoned".into()))?;
            slot.as_ref().and_then(Weak::upgrade)
        };
        let Some(provider) = provider else {
            return Err(MetricError::MissingMeterProvider);
        };

        let time_unix_nano = internal::unix_nanos_now();
        let mut data = MetricsData::default();
        for meter in provider.meters() {
            let mut metrics = Vec::new();
            meter.inner.collect_into(
                &*self.inner.temporality,
                &*self.inner.aggregation,
                time_unix_nano,
                &mut metrics,
            );
            data.resource_metrics.push(ResourceMetrics {
                resource: Resource {
                    attributes: meter.inner.attributes.clone(),
                },
                scope_metrics: vec![ScopeMetrics {
                    scope: meter.inner.scope.clone(),
                    metrics,
                }],
            });
        }

        self.inner.exporter.export_batch(&data).map_err(|err| match err {
            MetricError::ExportFailed(_) => err,
            other => MetricError::ExportFailed(other.to_string()),
        })
    }

    /// Performs one final collection, marks the reader shut down, and shuts
    /// down the exporter. Idempotent.
    ///
    /// Any registered teardown (a periodic reader's background worker) runs
    /// first, so shutting down through a provider also stops the worker.
    pub fn shutdown(&self) -> MetricResult<()> {
        if self.inner.is_shutdown.load(Ordering::Acquire) {
            return Ok(());
        }
        let on_shutdown = match self.inner.on_shutdown.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(on_shutdown) = on_shutdown {
            on_shutdown();
        }
        if let Err(err) = self.collect() {
            tracing::warn!(error = %err, "final collection before reader shutdown failed");
        }
        self.inner.is_shutdown.store(true, Ordering::Release);
        self.inner.exporter.shutdown()
    }

    /// The exporter this reader hands snapshots to.
    pub(crate) fn exporter(&self) -> &MetricExporter {
        &self.inner.exporter
    }

    #[cfg(test)]
    pub(crate) fn temporality(&self, kind: InstrumentKind) -> Temporality {
        self.inner.temporality.temporality(kind)
    }
}

impl fmt::Debug for MetricReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricReader")
            .field("attached", &self.is_attached())
            .field(
                "is_shutdown",
                &self.inner.is_shutdown.load(Ordering::Acquire),
            )
            .finish()
    }
}

/// Configuration options for a [`MetricReader`].
pub struct MetricReaderBuilder {
    temporality: Box<dyn TemporalitySelector>,
    aggregation: Box<dyn AggregationSelector>,
    exporter: MetricExporter,
}

impl MetricReaderBuilder {
    /// Sets the temporality selector the reader applies per instrument kind.
    pub fn with_temporality_selector(mut self, selector: impl TemporalitySelector) -> Self {
        self.temporality = Box::new(selector);
        self
    }

    /// Sets the aggregation selector the reader applies per instrument kind.
    pub fn with_aggregation_selector(mut self, selector: impl AggregationSelector) -> Self {
        self.aggregation = Box::new(selector);
        self
    }

    /// Creates a [`MetricReader`] with this configuration.
    pub fn build(self) -> MetricReader {
        MetricReader {
            inner: Arc::new(ReaderInner {
                provider: Mutex::new(None),
                is_shutdown: AtomicBool::new(false),
                temporality: self.temporality,
                aggregation: self.aggregation,
                exporter: self.exporter,
                on_shutdown: Mutex::new(None),
            }),
        }
    }
}

impl fmt::Debug for MetricReaderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricReaderBuilder").finish()
    }
}

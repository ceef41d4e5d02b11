//! Interfaces for exporting metrics.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::data::MetricsData;
use crate::error::{MetricError, MetricResult};

/// Handles the delivery of metric data to an external receiver.
///
/// This is the final component in the metric push pipeline.
pub trait PushMetricExporter: Send + Sync + 'static {
    /// Serializes and transmits metric data to a receiver.
    ///
    /// The snapshot is released when this call returns; implementations must
    /// copy anything they retain beyond it. All retry logic belongs in the
    /// implementation, errors returned here are considered unrecoverable.
    fn export_batch(&self, metrics: &MetricsData) -> MetricResult<()>;

    /// Releases any held resources. Further exports will not be attempted
    /// after this returns.
    fn shutdown(&self) -> MetricResult<()> {
        Ok(())
    }
}

/// Gates a [`PushMetricExporter`] behind shutdown and export-completion
/// state.
///
/// Cloning is cheap; clones share the flags, so a flush observed through one
/// handle covers exports performed through another. Both flags are scoped to
/// the wrapped exporter instance.
#[derive(Clone)]
pub struct MetricExporter {
    inner: Arc<ExporterInner>,
}

struct ExporterInner {
    sink: Box<dyn PushMetricExporter>,
    is_shutdown: AtomicBool,
    export_completed: AtomicBool,
}

/// Polling granularity of [`MetricExporter::force_flush`].
const FLUSH_POLL_INTERVAL: Duration = Duration::from_millis(1);

impl MetricExporter {
    /// Wraps `sink` with fresh shutdown and completion state.
    pub fn new(sink: impl PushMetricExporter) -> Self {
        MetricExporter {
            inner: Arc::new(ExporterInner {
                sink: Box::new(sink),
                is_shutdown: AtomicBool::new(false),
                export_completed: AtomicBool::new(false),
            }),
        }
    }

    /// Forwards a snapshot to the wrapped exporter.
    ///
    /// Fails with [`MetricError::AlreadyShutdown`] once [`shutdown`] has been
    /// called, and with [`MetricError::ExportFailed`] when the wrapped
    /// exporter reports an error.
    ///
    /// [`shutdown`]: MetricExporter::shutdown
    pub fn export_batch(&self, metrics: &MetricsData) -> MetricResult<()> {
        if self.inner.is_shutdown.load(Ordering::Acquire) {
            return Err(MetricError::AlreadyShutdown);
        }
        match self.inner.sink.export_batch(metrics) {
            Ok(()) => {
                self.inner.export_completed.store(true, Ordering::Release);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "metrics export failed");
                Err(MetricError::ExportFailed(err.to_string()))
            }
        }
    }

    /// Blocks until an export has completed or `timeout` elapses.
    ///
    /// Completion is polled in 1 ms sleeps; export completion is a
    /// rare-enough event that polling stays cheap.
    pub fn force_flush(&self, timeout: Duration) -> MetricResult<()> {
        let deadline = Instant::now() + timeout;
        while !self.inner.export_completed.load(Ordering::Acquire) {
            if Instant::now() >= deadline {
                return Err(MetricError::ForceFlushTimedOut(timeout));
            }
            thread::sleep(FLUSH_POLL_INTERVAL);
        }
        Ok(())
    }

    /// Marks the exporter shut down and releases the wrapped exporter's
    /// resources. Subsequent [`export_batch`] calls fail.
    ///
    /// [`export_batch`]: MetricExporter::export_batch
    pub fn shutdown(&self) -> MetricResult<()> {
        self.inner.is_shutdown.store(true, Ordering::Release);
        self.inner.sink.shutdown()
    }
}

impl fmt::Debug for MetricExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricExporter")
            .field(
                "is_shutdown",
                &self.inner.is_shutdown.load(Ordering::Acquire),
            )
            .finish()
    }
}

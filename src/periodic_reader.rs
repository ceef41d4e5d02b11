//! A reader that collects and exports on a background interval.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::MetricResult;
use crate::exporter::{MetricExporter, PushMetricExporter};
use crate::reader::MetricReader;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration options for a [`PeriodicReader`].
///
/// By default the reader collects and exports every 60 seconds and waits up
/// to 30 seconds for each export to complete.
#[derive(Debug)]
pub struct PeriodicReaderBuilder<E> {
    interval: Duration,
    timeout: Duration,
    exporter: E,
}

impl<E> PeriodicReaderBuilder<E>
where
    E: PushMetricExporter,
{
    fn new(exporter: E) -> Self {
        PeriodicReaderBuilder {
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            exporter,
        }
    }

    /// Configures the intervening time between exports.
    ///
    /// A zero interval is ignored and the default of 60 seconds is kept.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.interval = interval;
        }
        self
    }

    /// Configures the time the worker waits for an export to complete.
    ///
    /// A zero timeout is ignored and the default of 30 seconds is kept.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.timeout = timeout;
        }
        self
    }

    /// Creates a [`PeriodicReader`] with this configuration and starts its
    /// background worker.
    pub fn build(self) -> PeriodicReader {
        PeriodicReader::new(self.exporter, self.interval, self.timeout)
    }
}

/// A reader that continuously collects and exports metric data at a set
/// interval on a background thread.
///
/// Attach the embedded reader obtained from [`reader`] to a provider; the
/// worker then drives [`MetricReader::collect`] every interval. Shutting the
/// embedded reader down, whether through [`shutdown`] here or through the
/// provider's own shutdown, stops the worker (interrupting a pending sleep
/// immediately), performs a final collection, and shuts the exporter down.
///
/// [`reader`]: PeriodicReader::reader
/// [`shutdown`]: PeriodicReader::shutdown
#[derive(Clone)]
pub struct PeriodicReader {
    reader: MetricReader,
    inner: Arc<PeriodicReaderInner>,
}

struct PeriodicReaderInner {
    shutting_down: AtomicBool,
    message_sender: Sender<Message>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicReaderInner {
    /// Signals the worker, wakes it out of its sleep, and joins it. Runs at
    /// most once.
    fn stop_worker(&self) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        // If the worker already exited the disconnect has the same effect.
        let _ = self.message_sender.send(Message::Shutdown);
        let handle = match self.worker.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!("periodic metric reader worker panicked");
            }
        }
    }
}

#[derive(Debug)]
enum Message {
    Shutdown,
}

impl PeriodicReader {
    /// Configuration options for a periodic reader.
    pub fn builder<E>(exporter: E) -> PeriodicReaderBuilder<E>
    where
        E: PushMetricExporter,
    {
        PeriodicReaderBuilder::new(exporter)
    }

    fn new<E>(exporter: E, interval: Duration, timeout: Duration) -> Self
    where
        E: PushMetricExporter,
    {
        let reader = MetricReader::new(MetricExporter::new(exporter));
        let (message_sender, message_receiver) = mpsc::channel();
        let inner = Arc::new(PeriodicReaderInner {
            shutting_down: AtomicBool::new(false),
            message_sender,
            worker: Mutex::new(None),
        });

        let worker_reader = reader.clone();
        let worker_inner = Arc::downgrade(&inner);
        let handle = thread::spawn(move || {
            tracing::debug!("periodic metric reader worker started");
            loop {
                match message_receiver.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let shutting_down = worker_inner
                            .upgrade()
                            .map(|inner| inner.shutting_down.load(Ordering::Acquire))
                            .unwrap_or(true);
                        if shutting_down {
                            break;
                        }
                        if !worker_reader.is_attached() {
                            continue;
                        }
                        if let Err(err) = worker_reader.collect() {
                            tracing::warn!(error = %err, "periodic metrics collection failed");
                            continue;
                        }
                        if let Err(err) = worker_reader.exporter().force_flush(timeout) {
                            tracing::warn!(
                                error = %err,
                                "periodic export did not complete within the timeout"
                            );
                        }
                    }
                    Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!("periodic metric reader worker stopped");
        });
        match inner.worker.lock() {
            Ok(mut slot) => *slot = Some(handle),
            Err(_) => tracing::warn!("worker handle store poisoned"),
        }

        // Shutting the embedded reader down, from any trigger, stops the
        // worker first. Weak: the hook must not keep the control block (and
        // with it the channel sender) alive.
        let control = Arc::downgrade(&inner);
        reader.set_on_shutdown(move || {
            if let Some(control) = control.upgrade() {
                control.stop_worker();
            }
        });

        PeriodicReader { reader, inner }
    }

    /// The embedded reader, for attachment to a meter provider.
    pub fn reader(&self) -> MetricReader {
        self.reader.clone()
    }

    /// Stops the background worker, performs a final collection, and shuts
    /// down the embedded reader and its exporter. Idempotent.
    ///
    /// Shutting down the provider the embedded reader is attached to has
    /// the same effect.
    pub fn shutdown(&self) -> MetricResult<()> {
        self.reader.shutdown()
    }
}

impl fmt::Debug for PeriodicReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicReader")
            .field(
                "shutting_down",
                &self.inner.shutting_down.load(Ordering::Acquire),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::attributes::KeyValue;
    use crate::data::MetricsData;
    use crate::in_memory_exporter::InMemoryMetricExporter;
    use crate::meter::MeterOptions;
    use crate::meter_provider::SdkMeterProvider;

    /// Polls `fetch` until a snapshot arrives or the deadline passes.
    fn await_snapshot(
        exporter: &InMemoryMetricExporter,
        deadline: Duration,
    ) -> Option<MetricsData> {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if let Some(snapshot) = exporter.fetch() {
                return Some(snapshot);
            }
            thread::sleep(Duration::from_millis(1));
        }
        None
    }

    #[test]
    fn collection_triggered_by_interval() {
        let exporter = InMemoryMetricExporter::new();
        let periodic = PeriodicReader::builder(exporter.clone())
            .with_interval(Duration::from_millis(10))
            .with_timeout(Duration::from_millis(100))
            .build();

        let provider = SdkMeterProvider::new();
        provider.add_reader(&periodic.reader()).expect("attach");

        let meter = provider.get_meter(MeterOptions::new("app")).expect("meter");
        let counter = meter.u32_counter("requests").build().expect("counter");
        let histogram = meter.u32_histogram("latency").build().expect("histogram");
        counter.add(10, &[KeyValue::new("k", "v")]);
        histogram.record(10, &[]);

        let snapshot =
            await_snapshot(&exporter, Duration::from_secs(5)).expect("periodic export");
        assert_eq!(snapshot.resource_metrics.len(), 1);
        let scope_metrics = &snapshot.resource_metrics[0].scope_metrics;
        assert_eq!(scope_metrics.len(), 1);
        assert_eq!(scope_metrics[0].metrics.len(), 2);

        periodic.shutdown().expect("shutdown");
    }

    #[test]
    fn unattached_worker_exports_nothing() {
        let exporter = InMemoryMetricExporter::new();
        let periodic = PeriodicReader::builder(exporter.clone())
            .with_interval(Duration::from_millis(5))
            .build();

        thread::sleep(Duration::from_millis(25));
        assert!(exporter.fetch().is_none());
        periodic.shutdown().expect("shutdown");
    }

    #[test]
    fn shutdown_performs_a_final_export_and_is_idempotent() {
        let exporter = InMemoryMetricExporter::new();
        // A long interval: the only export can come from shutdown itself.
        let periodic = PeriodicReader::builder(exporter.clone())
            .with_interval(Duration::from_secs(3600))
            .build();

        let provider = SdkMeterProvider::new();
        provider.add_reader(&periodic.reader()).expect("attach");
        let meter = provider.get_meter(MeterOptions::new("app")).expect("meter");
        let counter = meter.u64_counter("requests").build().expect("counter");
        counter.add(3, &[]);

        periodic.shutdown().expect("first shutdown");
        let snapshot = exporter.fetch().expect("final export");
        assert_eq!(snapshot.resource_metrics.len(), 1);

        periodic.shutdown().expect("second shutdown");
    }

    #[test]
    fn provider_shutdown_stops_the_worker() {
        let exporter = InMemoryMetricExporter::new();
        let periodic = PeriodicReader::builder(exporter.clone())
            .with_interval(Duration::from_millis(10))
            .build();

        let provider = SdkMeterProvider::new();
        provider.add_reader(&periodic.reader()).expect("attach");
        let meter = provider.get_meter(MeterOptions::new("app")).expect("meter");
        let counter = meter.u64_counter("requests").build().expect("counter");
        counter.add(1, &[]);

        provider.shutdown().expect("provider shutdown");

        // The worker was signaled and joined as part of the provider-driven
        // shutdown; no handle remains.
        assert!(periodic.inner.shutting_down.load(Ordering::Acquire));
        assert!(periodic
            .inner
            .worker
            .lock()
            .expect("worker handle")
            .is_none());
        assert!(exporter.fetch().is_some(), "final export before teardown");

        // A later explicit shutdown is still a no-op.
        periodic.shutdown().expect("periodic shutdown");
    }

    #[test]
    fn worker_exits_when_all_handles_drop() {
        let exporter = InMemoryMetricExporter::new();
        let periodic = PeriodicReader::builder(exporter)
            .with_interval(Duration::from_millis(5))
            .build();
        let handle = periodic
            .inner
            .worker
            .lock()
            .expect("worker handle")
            .take()
            .expect("spawned worker");
        drop(periodic);

        // The control block is gone; the worker observes the disconnect and
        // stops on its own.
        handle.join().expect("worker exited cleanly");
    }
}

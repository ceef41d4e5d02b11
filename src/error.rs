//! Errors returned by the metrics SDK.

use std::result::Result;
use std::time::Duration;

use thiserror::Error;

/// A specialized `Result` type for metric operations.
pub type MetricResult<T> = Result<T, MetricError>;

/// Errors that can occur while configuring or operating the metrics pipeline.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MetricError {
    /// The instrument name violates the naming rules.
    #[error("invalid instrument name: {0}")]
    InvalidName(&'static str),

    /// The instrument unit violates the unit rules.
    #[error("invalid instrument unit: {0}")]
    InvalidUnit(&'static str),

    /// The instrument description violates the description rules.
    #[error("invalid instrument description: {0}")]
    InvalidDescription(&'static str),

    /// The explicit bucket boundaries of a histogram are unusable.
    #[error("invalid explicit bucket boundaries: {0}")]
    InvalidExplicitBucketBoundaries(&'static str),

    /// A meter with the same name, version, and schema URL was already
    /// created with a different attribute sequence.
    #[error("a meter with the same identity but different attributes already exists")]
    MeterExistsWithDifferentAttributes,

    /// An instrument with the same identifying fields was already created on
    /// this meter. The identifier covers the case-insensitive name, kind,
    /// unit, and description.
    #[error("an instrument with the same identifying fields already exists: {0}")]
    InstrumentAlreadyExists(String),

    /// The metric reader was already attached to a meter provider.
    ///
    /// A reader can be attached at most once, even to the same provider.
    #[error("the metric reader is already attached to a meter provider")]
    ReaderAlreadyAttached,

    /// Collection was requested on a reader that has no meter provider.
    #[error("collect failed: no meter provider is attached to this reader")]
    MissingMeterProvider,

    /// The exporter reported a failure; the snapshot was discarded.
    #[error("metrics export failed: {0}")]
    ExportFailed(String),

    /// No export completed within the requested flush window.
    #[error("force flush timed out after {0:?}")]
    ForceFlushTimedOut(Duration),

    /// The operation was invoked after shutdown.
    #[error("shutdown already invoked")]
    AlreadyShutdown,

    /// The operation failed due to an internal error, such as a poisoned
    /// registry lock.
    ///
    /// The message is intended for logging only; it is
    /// implementation-specific and subject to change.
    #[error("operation failed: {0}")]
    InternalFailure(String),
}

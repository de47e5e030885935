//! Pool error types.

use thiserror::Error;

use crate::driver::DriverError;

/// Errors returned by pool construction, dialing and handle admission.
///
/// The type is `Clone` because the outcome of the one-time dial is
/// recorded once and handed to every later caller of
/// [`PoolManager::open`](crate::PoolManager::open).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Invalid or missing configuration: empty endpoint list, unknown
    /// environment or database name, malformed address table, bad pool
    /// settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The one-time dial of the root session failed.
    ///
    /// This outcome is sticky: the pool never dials again.
    #[error("failed to connect to {url}: {source}")]
    Connection {
        /// Redacted dial URL.
        url: String,
        /// Underlying driver failure.
        #[source]
        source: DriverError,
    },

    /// Every handle slot is taken.
    #[error("too many open handles: capacity of {capacity} reached")]
    Exhausted {
        /// Configured pool capacity.
        capacity: usize,
    },
}

impl PoolError {
    /// Shorthand for a [`PoolError::Configuration`] error.
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether this error means the pool itself is unusable or misused
    /// (dial failure or capacity exhaustion), as opposed to a caller
    /// supplying bad configuration.
    ///
    /// Pool faults should not be retried on the same pool.
    #[must_use]
    pub fn is_pool_fault(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Exhausted { .. })
    }

    /// Whether this is a configuration error.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Whether the pool ran out of handle slots.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

//! Pool configuration.

use std::time::Duration;

use crate::driver::ReadMode;
use crate::error::PoolError;

/// Default maximum number of simultaneously open handles per pool.
pub const DEFAULT_CAPACITY: usize = 8000;

/// Configuration for a [`PoolManager`](crate::PoolManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of handles open at the same time (default: 8000).
    pub capacity: usize,

    /// Read mode applied to the root session and every clone
    /// (default: [`ReadMode::Eventual`]).
    pub default_mode: ReadMode,

    /// Documents per batch; `0` keeps the driver default.
    pub batch_size: u32,

    /// Require every configured member to acknowledge writes.
    pub require_full_replication: bool,

    /// Socket timeout for handles opened with
    /// [`open_extended`](crate::PoolManager::open_extended).
    /// `None` means no read/write deadline.
    pub extended_socket_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_mode: ReadMode::Eventual,
            batch_size: 0,
            require_full_replication: false,
            extended_socket_timeout: None,
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handle capacity.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the default read mode.
    #[must_use]
    pub fn default_mode(mut self, mode: ReadMode) -> Self {
        self.default_mode = mode;
        self
    }

    /// Set the default batch size.
    #[must_use]
    pub fn batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    /// Require full replication for writes.
    #[must_use]
    pub fn require_full_replication(mut self, enabled: bool) -> Self {
        self.require_full_replication = enabled;
        self
    }

    /// Set the socket timeout used by extended handles.
    #[must_use]
    pub fn extended_socket_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.extended_socket_timeout = timeout;
        self
    }

    /// Check the configuration for values the pool cannot work with.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.capacity == 0 {
            return Err(PoolError::config("pool capacity must be at least 1"));
        }
        Ok(())
    }
}

//! # docpool
//!
//! Bounded session pool for document database drivers.
//!
//! A pool owns one root session per logical database, dialed lazily and
//! exactly once. Consumers lease [`Handle`]s: independent clones of that
//! session scoped to one collection. The number of open handles is capped
//! and each handle is released exactly once, whether it is closed
//! explicitly, dropped, or closed by a cancellation signal.
//!
//! ## Features
//!
//! - One-time lazy dial shared by all concurrent callers, with a sticky
//!   outcome
//! - Non-blocking, fail-fast admission against a fixed capacity
//! - Guaranteed-once release across close, drop and cancellation
//! - Pool-wide default read mode, batch size and write safety, plus
//!   per-handle overrides
//! - Per-environment registry built from a TOML address table
//!
//! The wire protocol and query surface belong to the driver, plugged in
//! through the [`Driver`] and [`Session`] traits.
//!
//! ## Example
//!
//! ```rust,ignore
//! use docpool::{AddressConfig, Registry};
//! use tokio_util::sync::CancellationToken;
//!
//! let addresses = AddressConfig::from_file("addresses.toml")?;
//! let registry = Registry::from_environment(driver, &addresses, "dev")?;
//! let gdc = registry.pool("gdc")?;
//!
//! let token = CancellationToken::new();
//! let users = gdc.open("app", "users").await?.with_cancellation(token.clone());
//! // Use users...
//! token.cancel(); // or users.close(), or drop(users)
//!
//! println!("pool utilization: {:.1}%", gdc.status().utilization());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod address;
pub mod config;
pub mod driver;
pub mod error;
pub mod handle;
pub mod policy;
pub mod pool;
pub mod registry;

mod admission;

// Configuration
pub use address::{AddressConfig, DialUrl, Environment};
pub use config::{DEFAULT_CAPACITY, PoolConfig};

// Driver seam
pub use driver::{Driver, DriverError, ReadMode, Session, WriteSafety};

// Error types
pub use error::PoolError;

// Pool types
pub use handle::Handle;
pub use policy::SessionPolicy;
pub use pool::{PoolBuilder, PoolManager, PoolMetrics, PoolStatus};
pub use registry::{Registry, RegistryBuilder};

// Cancellation signal accepted by `Handle::with_cancellation`
pub use tokio_util::sync::CancellationToken;

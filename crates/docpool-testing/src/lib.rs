//! # docpool-testing
//!
//! Test infrastructure for the docpool workspace.
//!
//! Provides [`MockDriver`], an in-memory implementation of the
//! [`docpool::Driver`] and [`docpool::Session`] traits that records every
//! dial, clone, setting and close. The pool-dependent integration tests of
//! the workspace live in this crate's `tests/` directory.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docpool::PoolManager;
//! use docpool_testing::MockDriver;
//!
//! let driver = MockDriver::new();
//! let pool = PoolManager::builder(Arc::new(driver.clone()))
//!     .addresses(["db1:27017"])
//!     .build()?;
//!
//! let users = pool.open("app", "users").await?;
//! assert_eq!(driver.open_clones(), 1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod mock;

pub use mock::{MockCollection, MockDriver, MockSession, SessionRecord, SessionSettings};

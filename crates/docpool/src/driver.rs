//! The seam between the pool and the external database driver.
//!
//! The pool never speaks the wire protocol. It only sequences and bounds
//! calls into a driver that implements [`Driver`] and [`Session`]:
//!
//! - dial a root session from a connection string,
//! - clone that session into independent per-consumer sessions,
//! - hand out collection values by database and collection name,
//! - configure timeouts, read mode and write safety,
//! - close a session.
//!
//! Everything else (find, insert, iterate...) is the driver's business and
//! is reached through the collection value a [`Handle`](crate::Handle)
//! exposes.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::address::DialUrl;

/// A database driver able to dial root sessions.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Session type produced by this driver.
    type Session: Session;

    /// Dial a new root session.
    ///
    /// The pool calls this at most once for its whole lifetime.
    async fn dial(&self, url: &DialUrl) -> Result<Self::Session, DriverError>;
}

/// A driver session: one socket and authentication context.
///
/// Setters take `&mut self`; the pool serializes access to the shared root
/// session and each cloned session belongs to exactly one handle.
pub trait Session: Send + 'static {
    /// Collection value returned by [`Session::collection`].
    type Collection: Send + Sync + 'static;

    /// Create an independent session derived from this one, inheriting its
    /// current settings.
    fn clone_session(&self) -> Self
    where
        Self: Sized;

    /// Reference a collection within a database on this session.
    fn collection(&self, database: &str, collection: &str) -> Self::Collection;

    /// Set the read mode. `refresh` drops any socket reserved under the
    /// previous mode.
    fn set_mode(&mut self, mode: ReadMode, refresh: bool);

    /// Set the default number of documents fetched per batch.
    fn set_batch(&mut self, size: u32);

    /// Set the write acknowledgment requirements.
    fn set_safety(&mut self, safety: WriteSafety);

    /// Set the socket read/write timeout. `None` means no deadline.
    fn set_socket_timeout(&mut self, timeout: Option<Duration>);

    /// Set the server-side cursor idle timeout. `None` means cursors never
    /// time out.
    fn set_cursor_timeout(&mut self, timeout: Option<Duration>);

    /// Close the session and release its socket.
    fn close(&mut self);
}

/// Read preference and consistency mode for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ReadMode {
    /// Read from the primary only.
    Primary,
    /// Read from the primary, falling back to secondaries.
    PrimaryPreferred,
    /// Read from secondaries only.
    Secondary,
    /// Read from secondaries, falling back to the primary.
    SecondaryPreferred,
    /// Read from the member with the lowest latency.
    Nearest,
    /// Any member, possibly a different socket per operation.
    Eventual,
    /// Secondaries until the first write, then the primary.
    Monotonic,
    /// Primary only, one socket for the session lifetime.
    Strong,
}

impl ReadMode {
    /// Name of the mode as used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::PrimaryPreferred => "primary_preferred",
            Self::Secondary => "secondary",
            Self::SecondaryPreferred => "secondary_preferred",
            Self::Nearest => "nearest",
            Self::Eventual => "eventual",
            Self::Monotonic => "monotonic",
            Self::Strong => "strong",
        }
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write acknowledgment requirements.
///
/// The default value requests a plain acknowledged write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSafety {
    /// Number of replica set members that must acknowledge the write.
    /// `None` leaves it to the server default.
    pub w: Option<usize>,
}

impl WriteSafety {
    /// Plain acknowledged writes.
    #[must_use]
    pub fn acknowledged() -> Self {
        Self::default()
    }

    /// Require `members` replica set members to acknowledge each write.
    #[must_use]
    pub fn replicated(members: usize) -> Self {
        Self { w: Some(members) }
    }
}

/// Errors reported by a [`Driver`] when dialing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DriverError {
    /// No server could be reached.
    #[error("no reachable servers: {0}")]
    Unreachable(String),

    /// The server rejected the credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The connection string could not be parsed.
    #[error("invalid connection string: {0}")]
    InvalidUrl(String),

    /// Any other driver failure.
    #[error("{0}")]
    Other(String),
}

//! Leased handles.
//!
//! A [`Handle`] owns one cloned driver session and one unit of pool
//! capacity. Both are held in a single lease that is taken out exactly
//! once, whichever release path gets there first:
//!
//! - an explicit [`Handle::close`],
//! - the cancellation watcher installed by [`Handle::with_cancellation`],
//! - dropping the handle.
//!
//! Every later attempt finds the lease gone and does nothing.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::admission::Slot;
use crate::driver::{ReadMode, Session, WriteSafety};

/// A leased connection scoped to one collection.
///
/// Dereferences to the driver's collection value, so queries go straight
/// to the driver:
///
/// ```rust,ignore
/// let users = pool.open("app", "users").await?;
/// let doc = users.find_one(filter).await?;
/// users.close();
/// ```
pub struct Handle<S: Session> {
    database: String,
    collection_name: String,
    collection: S::Collection,
    shared: Arc<HandleShared<S>>,
}

struct HandleShared<S> {
    id: u64,
    pool: Arc<str>,
    /// Number of configured endpoints, for full-replication write safety.
    members: usize,
    lease: Mutex<Option<Lease<S>>>,
    /// Cancelled once the lease has been released.
    closed: CancellationToken,
}

struct Lease<S> {
    session: S,
    slot: Slot,
}

#[derive(Debug, Clone, Copy)]
enum ReleasePath {
    Explicit,
    Cancelled,
    Dropped,
}

impl ReleasePath {
    fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Cancelled => "cancelled",
            Self::Dropped => "dropped",
        }
    }
}

impl<S: Session> HandleShared<S> {
    /// Close the session and free the slot. Returns `false` if the lease
    /// was already released.
    fn release(&self, path: ReleasePath) -> bool {
        let Some(lease) = self.lease.lock().take() else {
            return false;
        };

        let Lease { mut session, slot } = lease;
        session.close();
        drop(slot);
        self.closed.cancel();

        tracing::trace!(
            pool = %self.pool,
            handle_id = self.id,
            path = path.as_str(),
            "handle released"
        );
        true
    }

    fn configure(&self, f: impl FnOnce(&mut S)) {
        match self.lease.lock().as_mut() {
            Some(lease) => f(&mut lease.session),
            None => tracing::debug!(
                pool = %self.pool,
                handle_id = self.id,
                "ignoring setting change on closed handle"
            ),
        }
    }
}

impl<S: Session> Handle<S> {
    pub(crate) fn new(
        slot: Slot,
        session: S,
        database: &str,
        collection: &str,
        pool: Arc<str>,
        members: usize,
    ) -> Self {
        let collection_value = session.collection(database, collection);
        Self {
            database: database.to_string(),
            collection_name: collection.to_string(),
            collection: collection_value,
            shared: Arc::new(HandleShared {
                id: slot.id(),
                pool,
                members,
                lease: Mutex::new(Some(Lease { session, slot })),
                closed: CancellationToken::new(),
            }),
        }
    }

    /// Close the session and give the slot back to the pool.
    ///
    /// Idempotent: only the first call (or the first of close, cancellation
    /// and drop) has any effect.
    pub fn close(&self) {
        self.shared.release(ReleasePath::Explicit);
    }

    /// Close this handle when `signal` is cancelled.
    ///
    /// Spawns a watcher task on the current Tokio runtime and returns the
    /// handle for chaining. The watcher exits as soon as the handle is
    /// released through any other path.
    ///
    /// Outside a Tokio runtime no watcher can be spawned: a token that is
    /// already cancelled still closes the handle, otherwise a warning is
    /// logged and the handle stays open until closed or dropped.
    #[must_use]
    pub fn with_cancellation(self, signal: CancellationToken) -> Self {
        if self.is_closed() {
            return self;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            if signal.is_cancelled() {
                self.shared.release(ReleasePath::Cancelled);
            } else {
                tracing::warn!(
                    pool = %self.shared.pool,
                    handle_id = self.shared.id,
                    "no Tokio runtime; cancellation signal not watched"
                );
            }
            return self;
        };

        let shared = Arc::clone(&self.shared);
        runtime.spawn(async move {
            tokio::select! {
                () = signal.cancelled() => {
                    shared.release(ReleasePath::Cancelled);
                }
                () = shared.closed.cancelled() => {}
            }
        });
        self
    }

    /// Override the batch size of this handle's session.
    pub fn set_batch(&self, size: u32) -> &Self {
        self.shared.configure(|session| session.set_batch(size));
        self
    }

    /// Override the read mode of this handle's session.
    pub fn set_read_mode(&self, mode: ReadMode) -> &Self {
        self.shared.configure(|session| session.set_mode(mode, true));
        self
    }

    /// Require every configured member to acknowledge writes made through
    /// this handle.
    pub fn ensure_full_replication(&self) -> &Self {
        let safety = WriteSafety::replicated(self.shared.members);
        self.shared.configure(|session| session.set_safety(safety));
        self
    }

    pub(crate) fn set_timeouts(&self, socket: Option<Duration>, cursor: Option<Duration>) {
        self.shared.configure(|session| {
            session.set_socket_timeout(socket);
            session.set_cursor_timeout(cursor);
        });
    }

    /// Process-unique handle id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Database this handle targets.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Collection this handle targets.
    #[must_use]
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// The driver's collection value.
    #[must_use]
    pub fn collection(&self) -> &S::Collection {
        &self.collection
    }

    /// Whether the handle has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// Wait until the handle has been released by any path.
    pub async fn closed(&self) {
        self.shared.closed.cancelled().await;
    }
}

impl<S: Session> Deref for Handle<S> {
    type Target = S::Collection;

    fn deref(&self) -> &Self::Target {
        &self.collection
    }
}

impl<S: Session> Drop for Handle<S> {
    fn drop(&mut self) {
        self.shared.release(ReleasePath::Dropped);
    }
}

impl<S: Session> fmt::Debug for Handle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.shared.id)
            .field("pool", &self.shared.pool)
            .field("database", &self.database)
            .field("collection", &self.collection_name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

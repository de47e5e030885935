//! In-memory mock driver.
//!
//! [`MockDriver`] implements [`Driver`] without any network. Every session
//! it creates is recorded as a [`SessionRecord`] so tests can check which
//! settings reached which session and how often each one was closed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docpool::{DialUrl, Driver, DriverError, ReadMode, Session, WriteSafety};
use parking_lot::Mutex;

/// A driver that dials instantly (or after a configured delay) and records
/// everything it is asked to do.
///
/// Clones share state, so a test can keep one clone for inspection and hand
/// another to the pool.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<DriverState>,
}

#[derive(Debug, Default)]
struct DriverState {
    dial_attempts: AtomicUsize,
    dialed_urls: Mutex<Vec<String>>,
    failure: Mutex<Option<DriverError>>,
    dial_delay: Mutex<Option<Duration>>,
    sessions: Mutex<Vec<Arc<SessionRecord>>>,
    next_session_id: AtomicU64,
}

impl DriverState {
    fn new_session(self: &Arc<Self>, parent: Option<u64>, settings: SessionSettings) -> MockSession {
        let record = Arc::new(SessionRecord {
            id: self.next_session_id.fetch_add(1, Ordering::Relaxed),
            parent,
            settings: Mutex::new(settings),
            close_calls: AtomicUsize::new(0),
        });
        self.sessions.lock().push(Arc::clone(&record));
        MockSession {
            record,
            driver: Arc::clone(self),
        }
    }
}

impl MockDriver {
    /// A driver whose dials succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver whose dials fail with `error`.
    #[must_use]
    pub fn failing(error: DriverError) -> Self {
        let driver = Self::new();
        *driver.state.failure.lock() = Some(error);
        driver
    }

    /// A driver simulating an endpoint nobody answers on.
    #[must_use]
    pub fn unreachable() -> Self {
        Self::failing(DriverError::Unreachable("no reachable servers".into()))
    }

    /// Make every dial take `delay` before completing.
    #[must_use]
    pub fn with_dial_delay(self, delay: Duration) -> Self {
        *self.state.dial_delay.lock() = Some(delay);
        self
    }

    /// Number of dial attempts that reached the driver.
    #[must_use]
    pub fn dial_attempts(&self) -> usize {
        self.state.dial_attempts.load(Ordering::SeqCst)
    }

    /// Connection strings passed to `dial`, in order.
    #[must_use]
    pub fn dialed_urls(&self) -> Vec<String> {
        self.state.dialed_urls.lock().clone()
    }

    /// Every session created so far, root first.
    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<SessionRecord>> {
        self.state.sessions.lock().clone()
    }

    /// The dialed root session, if any.
    #[must_use]
    pub fn root_session(&self) -> Option<Arc<SessionRecord>> {
        self.state
            .sessions
            .lock()
            .iter()
            .find(|s| s.is_root())
            .cloned()
    }

    /// Number of cloned sessions not closed yet.
    #[must_use]
    pub fn open_clones(&self) -> usize {
        self.state
            .sessions
            .lock()
            .iter()
            .filter(|s| !s.is_root() && !s.is_closed())
            .count()
    }
}

#[async_trait]
impl Driver for MockDriver {
    type Session = MockSession;

    async fn dial(&self, url: &DialUrl) -> Result<MockSession, DriverError> {
        self.state.dial_attempts.fetch_add(1, Ordering::SeqCst);
        self.state.dialed_urls.lock().push(url.to_string());
        tracing::debug!(url = %url.redacted(), "mock dial");

        let delay = *self.state.dial_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.state.failure.lock().clone();
        match failure {
            Some(err) => Err(err),
            None => Ok(self.state.new_session(None, SessionSettings::default())),
        }
    }
}

/// Settings a session has received. `None` means never set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSettings {
    /// Last read mode.
    pub mode: Option<ReadMode>,
    /// Last batch size.
    pub batch_size: Option<u32>,
    /// Last write safety.
    pub safety: Option<WriteSafety>,
    /// Last socket timeout (`Some(None)` = no deadline).
    pub socket_timeout: Option<Option<Duration>>,
    /// Last cursor timeout (`Some(None)` = never time out).
    pub cursor_timeout: Option<Option<Duration>>,
}

/// What the mock driver knows about one session.
#[derive(Debug)]
pub struct SessionRecord {
    id: u64,
    parent: Option<u64>,
    settings: Mutex<SessionSettings>,
    close_calls: AtomicUsize,
}

impl SessionRecord {
    /// Session id, unique per driver.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Id of the session this one was cloned from.
    #[must_use]
    pub fn parent(&self) -> Option<u64> {
        self.parent
    }

    /// Whether this is a dialed root session.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Snapshot of the current settings.
    #[must_use]
    pub fn settings(&self) -> SessionSettings {
        self.settings.lock().clone()
    }

    /// How many times `close` was called.
    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Whether the session has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.close_calls() > 0
    }
}

/// A mock session.
#[derive(Debug)]
pub struct MockSession {
    record: Arc<SessionRecord>,
    driver: Arc<DriverState>,
}

impl MockSession {
    /// The record backing this session.
    #[must_use]
    pub fn record(&self) -> &Arc<SessionRecord> {
        &self.record
    }
}

impl Session for MockSession {
    type Collection = MockCollection;

    fn clone_session(&self) -> Self {
        let settings = self.record.settings();
        self.driver.new_session(Some(self.record.id), settings)
    }

    fn collection(&self, database: &str, collection: &str) -> MockCollection {
        MockCollection {
            database: database.to_string(),
            name: collection.to_string(),
            session: Arc::clone(&self.record),
        }
    }

    fn set_mode(&mut self, mode: ReadMode, _refresh: bool) {
        self.record.settings.lock().mode = Some(mode);
    }

    fn set_batch(&mut self, size: u32) {
        self.record.settings.lock().batch_size = Some(size);
    }

    fn set_safety(&mut self, safety: WriteSafety) {
        self.record.settings.lock().safety = Some(safety);
    }

    fn set_socket_timeout(&mut self, timeout: Option<Duration>) {
        self.record.settings.lock().socket_timeout = Some(timeout);
    }

    fn set_cursor_timeout(&mut self, timeout: Option<Duration>) {
        self.record.settings.lock().cursor_timeout = Some(timeout);
    }

    fn close(&mut self) {
        self.record.close_calls.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(session_id = self.record.id, "mock session closed");
    }
}

/// A collection reference on a mock session.
#[derive(Debug, Clone)]
pub struct MockCollection {
    database: String,
    name: String,
    session: Arc<SessionRecord>,
}

impl MockCollection {
    /// Database name.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `database.collection`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }

    /// The session this collection was obtained from.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionRecord> {
        &self.session
    }

    /// Simulate a query that takes `duration`. Fails if the session was
    /// closed before or while it ran.
    pub async fn slow_query(&self, duration: Duration) -> Result<(), DriverError> {
        if self.session.is_closed() {
            return Err(DriverError::Other("session closed".into()));
        }
        tokio::time::sleep(duration).await;
        if self.session.is_closed() {
            return Err(DriverError::Other("session closed".into()));
        }
        Ok(())
    }
}

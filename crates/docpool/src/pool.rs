//! Pool manager implementation.
//!
//! A [`PoolManager`] owns exactly one root driver session for one logical
//! database. The session is dialed lazily, once, on first use; every
//! [`Handle`] is an independent clone of it, and at most `capacity`
//! handles may be open at the same time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tracing::Instrument;

use crate::address::DialUrl;
use crate::admission::Accounting;
use crate::config::PoolConfig;
use crate::driver::{Driver, ReadMode, Session};
use crate::error::PoolError;
use crate::handle::Handle;
use crate::policy::SessionPolicy;

type RootSession<S> = Arc<Mutex<S>>;
type DialOutcome<S> = Result<RootSession<S>, PoolError>;
type DialFuture<S> = Shared<BoxFuture<'static, DialOutcome<S>>>;

/// A bounded pool of handles over one lazily dialed session.
///
/// # Example
///
/// ```rust,ignore
/// use docpool::{PoolManager, ReadMode};
///
/// let pool = PoolManager::builder(driver)
///     .name("gdc")
///     .addresses(["user:secret@db1:27017"])
///     .capacity(8000)
///     .build()?;
///
/// let users = pool.open("app", "users").await?;
/// // Use users...
/// users.close();
/// ```
pub struct PoolManager<D: Driver> {
    name: Arc<str>,
    addresses: Arc<[String]>,
    config: PoolConfig,
    driver: Arc<D>,

    /// Default policy for the root session and future clones.
    policy: Arc<RwLock<SessionPolicy>>,

    /// The one dial attempt, shared by every caller. Resolves to the root
    /// session or to the sticky dial error.
    dial: OnceCell<DialFuture<D::Session>>,

    /// The root session, published by the dial while it holds the policy
    /// read lock. Set before `dial` resolves.
    root: Arc<OnceCell<RootSession<D::Session>>>,

    accounting: Arc<Accounting>,
}

impl<D: Driver> PoolManager<D> {
    /// Create a new pool builder.
    #[must_use]
    pub fn builder(driver: Arc<D>) -> PoolBuilder<D> {
        PoolBuilder::new(driver)
    }

    /// Create a pool for `addresses` without dialing.
    ///
    /// Only the configuration is validated here. An empty address list is
    /// reported by the first [`open`](Self::open).
    pub fn new(
        name: impl Into<String>,
        addresses: Vec<String>,
        driver: Arc<D>,
        config: PoolConfig,
    ) -> Result<Self, PoolError> {
        config.validate()?;

        let name: Arc<str> = Arc::from(name.into());
        tracing::info!(
            pool = %name,
            endpoints = addresses.len(),
            capacity = config.capacity,
            mode = %config.default_mode,
            "session pool created"
        );

        Ok(Self {
            name,
            addresses: addresses.into(),
            policy: Arc::new(RwLock::new(SessionPolicy::from_config(&config))),
            accounting: Arc::new(Accounting::new(config.capacity)),
            dial: OnceCell::new(),
            root: Arc::new(OnceCell::new()),
            driver,
            config,
        })
    }

    /// Dial the root session if that has not been attempted yet.
    ///
    /// Exactly one dial attempt is made over the lifetime of the pool.
    /// Concurrent callers wait for that attempt, and every caller, now or
    /// later, observes its outcome. A caller giving up does not abort the
    /// attempt; the next caller resumes it.
    pub async fn ensure_dialed(&self) -> Result<(), PoolError> {
        self.root_session().await.map(|_| ())
    }

    /// Open a handle on `database.collection`.
    ///
    /// Fails with the dial error if the pool could not connect, and with
    /// [`PoolError::Exhausted`] if `capacity` handles are already open.
    /// Admission never waits for a slot to free up.
    pub async fn open(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Handle<D::Session>, PoolError> {
        let root = match self.root_session().await {
            Ok(root) => root,
            Err(err) => {
                tracing::error!(
                    pool = %self.name,
                    database,
                    collection,
                    error = %err,
                    "cannot open handle on a pool that failed to dial"
                );
                return Err(err);
            }
        };

        let Some(slot) = self.accounting.try_admit() else {
            tracing::error!(
                pool = %self.name,
                database,
                collection,
                capacity = self.accounting.capacity(),
                "too many open handles"
            );
            return Err(PoolError::Exhausted {
                capacity: self.accounting.capacity(),
            });
        };

        let mut session = root.lock().clone_session();
        let policy = *self.policy.read();
        policy.apply(&mut session, self.addresses.len());

        let handle = Handle::new(
            slot,
            session,
            database,
            collection,
            Arc::clone(&self.name),
            self.addresses.len(),
        );

        tracing::trace!(
            pool = %self.name,
            handle_id = handle.id(),
            database,
            collection,
            "handle opened"
        );

        Ok(handle)
    }

    /// Open a handle for long-running work.
    ///
    /// Like [`open`](Self::open), but the handle's socket timeout is set to
    /// [`PoolConfig::extended_socket_timeout`] (no deadline by default) and
    /// its cursors never time out.
    pub async fn open_extended(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Handle<D::Session>, PoolError> {
        let handle = self.open(database, collection).await?;
        handle.set_timeouts(self.config.extended_socket_timeout, None);
        Ok(handle)
    }

    /// Set the default batch size.
    pub fn set_batch_size(&self, size: u32) {
        self.update_policy(|policy| policy.batch_size = size);
    }

    /// Set the default read mode.
    pub fn set_read_mode(&self, mode: ReadMode) {
        self.update_policy(|policy| policy.mode = mode);
    }

    /// Require every configured member to acknowledge writes.
    pub fn ensure_full_replication(&self) {
        self.update_policy(|policy| policy.full_replication = true);
    }

    /// Current default policy.
    #[must_use]
    pub fn policy(&self) -> SessionPolicy {
        *self.policy.read()
    }

    /// Logical database name of this pool.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Endpoints this pool dials.
    #[must_use]
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Whether the root session has been dialed successfully.
    #[must_use]
    pub fn is_dialed(&self) -> bool {
        self.dialed_session().is_some()
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            outstanding: self.accounting.outstanding(),
            capacity: self.accounting.capacity(),
            dialed: self.is_dialed(),
        }
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let inner = self.accounting.metrics();
        PoolMetrics {
            handles_opened: inner.handles_opened,
            handles_closed: inner.handles_closed,
            admissions_rejected: inner.admissions_rejected,
            dial_attempts: inner.dial_attempts,
            dial_failures: inner.dial_failures,
            uptime: self.accounting.created_at().elapsed(),
        }
    }

    async fn root_session(&self) -> DialOutcome<D::Session> {
        self.dial.get_or_init(|| self.start_dial()).clone().await
    }

    fn dialed_session(&self) -> Option<RootSession<D::Session>> {
        self.root.get().cloned()
    }

    fn update_policy(&self, f: impl FnOnce(&mut SessionPolicy)) {
        let mut policy = self.policy.write();
        f(&mut policy);

        tracing::debug!(
            pool = %self.name,
            mode = %policy.mode,
            batch_size = policy.batch_size,
            full_replication = policy.full_replication,
            "default session policy changed"
        );

        // A dial in progress either reads this policy or has already
        // published the root session; both happen under the read lock.
        if let Some(root) = self.dialed_session() {
            policy.apply(&mut *root.lock(), self.addresses.len());
        }
    }

    /// Build the single dial attempt. Runs lazily when first awaited.
    fn start_dial(&self) -> DialFuture<D::Session> {
        let url = match DialUrl::from_endpoints(&self.addresses) {
            Ok(url) => url,
            Err(err) => {
                tracing::error!(pool = %self.name, error = %err, "pool has no usable addresses");
                return futures_util::future::ready(Err(err)).boxed().shared();
            }
        };

        let driver = Arc::clone(&self.driver);
        let policy = Arc::clone(&self.policy);
        let accounting = Arc::clone(&self.accounting);
        let published = Arc::clone(&self.root);
        let members = self.addresses.len();
        let span = tracing::info_span!("docpool.dial", pool = %self.name, url = %url.redacted());

        async move {
            tracing::info!("dialing root session");
            match driver.dial(&url).await {
                Ok(mut session) => {
                    accounting.record_dial(true);
                    let current = policy.read();
                    current.apply(&mut session, members);
                    let root = published.get_or_init(|| Arc::new(Mutex::new(session)));
                    let root = Arc::clone(root);
                    drop(current);
                    tracing::info!("root session established");
                    Ok(root)
                }
                Err(source) => {
                    accounting.record_dial(false);
                    tracing::error!(error = %source, "dial failed; pool is unusable");
                    Err(PoolError::Connection {
                        url: url.redacted(),
                        source,
                    })
                }
            }
        }
        .instrument(span)
        .boxed()
        .shared()
    }
}

impl<D: Driver> fmt::Debug for PoolManager<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolManager")
            .field("name", &self.name)
            .field("endpoints", &self.addresses.len())
            .field("status", &self.status())
            .finish()
    }
}

/// Builder for creating a [`PoolManager`].
///
/// # Example
///
/// ```rust,ignore
/// let pool = PoolManager::builder(driver)
///     .name("gdc")
///     .addresses(["db1:27017", "db2:27017"])
///     .default_mode(ReadMode::Primary)
///     .build()?;
/// ```
pub struct PoolBuilder<D: Driver> {
    driver: Arc<D>,
    name: String,
    addresses: Vec<String>,
    pool_config: PoolConfig,
}

impl<D: Driver> PoolBuilder<D> {
    /// Create a new pool builder with default settings.
    pub fn new(driver: Arc<D>) -> Self {
        Self {
            driver,
            name: "default".to_string(),
            addresses: Vec::new(),
            pool_config: PoolConfig::default(),
        }
    }

    /// Set the logical database name used in logs and status.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the endpoints to dial.
    #[must_use]
    pub fn addresses(mut self, addresses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Set the maximum number of open handles.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.pool_config.capacity = capacity;
        self
    }

    /// Set the default read mode.
    #[must_use]
    pub fn default_mode(mut self, mode: ReadMode) -> Self {
        self.pool_config.default_mode = mode;
        self
    }

    /// Set the default batch size.
    #[must_use]
    pub fn batch_size(mut self, size: u32) -> Self {
        self.pool_config.batch_size = size;
        self
    }

    /// Require full replication for writes.
    #[must_use]
    pub fn full_replication(mut self, enabled: bool) -> Self {
        self.pool_config.require_full_replication = enabled;
        self
    }

    /// Set the socket timeout used by extended handles.
    #[must_use]
    pub fn extended_socket_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pool_config.extended_socket_timeout = timeout;
        self
    }

    /// Build the pool. Does not dial.
    pub fn build(self) -> Result<PoolManager<D>, PoolError> {
        PoolManager::new(self.name, self.addresses, self.driver, self.pool_config)
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of handles currently open.
    pub outstanding: usize,
    /// Maximum allowed open handles.
    pub capacity: usize,
    /// Whether the root session is established.
    pub dialed: bool,
}

impl PoolStatus {
    /// Number of handles that can still be opened.
    #[must_use]
    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.outstanding)
    }

    /// Share of the capacity in use, in percent.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        // capacity is validated non-zero
        self.outstanding as f64 * 100.0 / self.capacity.max(1) as f64
    }

    /// Whether the next [`PoolManager::open`] would be rejected.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.available() == 0
    }
}

/// Metrics collected from the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Handles opened since pool creation.
    pub handles_opened: u64,
    /// Handles released since pool creation.
    pub handles_closed: u64,
    /// Opens rejected because the pool was at capacity.
    pub admissions_rejected: u64,
    /// Dial attempts that reached the driver (at most one).
    pub dial_attempts: u64,
    /// Dial attempts that failed.
    pub dial_failures: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Fraction of admission attempts that got a slot. A pool nobody has
    /// opened from yet reports `1.0`.
    #[must_use]
    pub fn admission_success_rate(&self) -> f64 {
        match self.handles_opened + self.admissions_rejected {
            0 => 1.0,
            attempts => self.handles_opened as f64 / attempts as f64,
        }
    }

    /// Handles opened and not yet released.
    #[must_use]
    pub fn handles_live(&self) -> u64 {
        self.handles_opened.saturating_sub(self.handles_closed)
    }
}

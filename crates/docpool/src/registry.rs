//! Per-environment pool registry.
//!
//! The registry is built once at startup from an [`AddressConfig`] and
//! handed to the code that needs pools. It holds one [`PoolManager`] per
//! logical database configured for the selected environment.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::address::{AddressConfig, Environment};
use crate::config::PoolConfig;
use crate::driver::Driver;
use crate::error::PoolError;
use crate::pool::PoolManager;

/// One pool per logical database of an environment.
///
/// # Example
///
/// ```rust,ignore
/// let addresses = AddressConfig::from_file("addresses.toml")?;
/// let registry = Registry::from_environment(driver, &addresses, "prod")?;
///
/// let gdc = registry.pool("gdc")?;
/// let users = gdc.open("app", "users").await?;
/// ```
pub struct Registry<D: Driver> {
    environment: Environment,
    pools: BTreeMap<String, Arc<PoolManager<D>>>,
}

impl<D: Driver> Registry<D> {
    /// Create a new registry builder.
    #[must_use]
    pub fn builder(driver: Arc<D>) -> RegistryBuilder<D> {
        RegistryBuilder::new(driver)
    }

    /// Build a registry for the environment named `env` with default pool
    /// settings.
    pub fn from_environment(
        driver: Arc<D>,
        addresses: &AddressConfig,
        env: &str,
    ) -> Result<Self, PoolError> {
        Self::builder(driver).build(addresses, env.parse()?)
    }

    /// Pool for a logical database.
    pub fn pool(&self, name: &str) -> Result<Arc<PoolManager<D>>, PoolError> {
        self.get(name).ok_or_else(|| {
            PoolError::config(format!(
                "no database '{name}' configured for environment '{}'",
                self.environment
            ))
        })
    }

    /// Pool for a logical database, if configured.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<PoolManager<D>>> {
        self.pools.get(name).cloned()
    }

    /// Names of all configured databases, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pools.keys().map(String::as_str)
    }

    /// Environment this registry was built for.
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Number of pools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Whether the environment configures no databases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

impl<D: Driver> fmt::Debug for Registry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("environment", &self.environment)
            .field("pools", &self.pools.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for a [`Registry`].
pub struct RegistryBuilder<D: Driver> {
    driver: Arc<D>,
    pool_config: PoolConfig,
    known: Option<BTreeSet<String>>,
}

impl<D: Driver> RegistryBuilder<D> {
    /// Create a builder with default pool settings and no allow-list.
    pub fn new(driver: Arc<D>) -> Self {
        Self {
            driver,
            pool_config: PoolConfig::default(),
            known: None,
        }
    }

    /// Pool configuration applied to every pool.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Restrict the registry to these database shortcuts. A configured
    /// database outside the list fails the build.
    #[must_use]
    pub fn known_databases(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.known = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Build one pool per database configured for `env`. Nothing is dialed.
    pub fn build(self, addresses: &AddressConfig, env: Environment) -> Result<Registry<D>, PoolError> {
        let databases = addresses.environment(env).ok_or_else(|| {
            PoolError::config(format!("no addresses configured for environment '{env}'"))
        })?;

        let mut pools = BTreeMap::new();
        for (name, endpoints) in databases {
            if self.known.as_ref().is_some_and(|known| !known.contains(name)) {
                return Err(PoolError::config(format!("unknown database shortcut: '{name}'")));
            }

            let pool = PoolManager::new(
                name.clone(),
                endpoints.clone(),
                Arc::clone(&self.driver),
                self.pool_config.clone(),
            )?;
            pools.insert(name.clone(), Arc::new(pool));
        }

        tracing::info!(
            environment = %env,
            pools = pools.len(),
            "pool registry initialized"
        );

        Ok(Registry {
            environment: env,
            pools,
        })
    }
}

//! Deployment environments and address tables.
//!
//! An address table maps each deployment [`Environment`] to the logical
//! databases available there and, for each database, the ordered list of
//! endpoints to dial. Tables are usually loaded from TOML:
//!
//! ```toml
//! [dev]
//! gdc = ["username:password@dev-ip:27017"]
//!
//! [prod]
//! gdc = ["username:password@prod-a:27017", "username:password@prod-b:27017"]
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::PoolError;

/// A named deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Environment {
    /// Development, also reachable as `local`.
    Dev,
    /// Shared test environment.
    Test,
    /// Production.
    Prod,
}

impl Environment {
    /// Canonical name of the environment.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Test => "test",
            Self::Prod => "prod",
        }
    }
}

impl FromStr for Environment {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "local" => Ok(Self::Dev),
            "test" => Ok(Self::Test),
            "prod" => Ok(Self::Prod),
            other => Err(PoolError::config(format!("illegal environment: '{other}'"))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoints for every logical database, per environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressConfig {
    environments: BTreeMap<Environment, BTreeMap<String, Vec<String>>>,
}

impl AddressConfig {
    /// Create an empty address table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an address table from TOML.
    ///
    /// Top-level tables are environments, their keys are database names and
    /// the values are endpoint arrays.
    pub fn from_toml_str(source: &str) -> Result<Self, PoolError> {
        let raw: BTreeMap<String, BTreeMap<String, Vec<String>>> = toml::from_str(source)
            .map_err(|e| PoolError::config(format!("invalid address table: {e}")))?;

        let mut config = Self::new();
        for (name, databases) in raw {
            let env: Environment = name.parse()?;
            if config.environments.contains_key(&env) {
                return Err(PoolError::config(format!(
                    "environment '{env}' defined more than once (as '{name}')"
                )));
            }
            config.environments.insert(env, databases);
        }

        tracing::debug!(
            environments = config.environments.len(),
            "loaded address table"
        );

        Ok(config)
    }

    /// Read and parse an address table from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PoolError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            PoolError::config(format!("cannot read address table {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Add or replace the endpoints of one database.
    #[must_use]
    pub fn insert(
        mut self,
        env: Environment,
        database: impl Into<String>,
        endpoints: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.environments
            .entry(env)
            .or_default()
            .insert(database.into(), endpoints.into_iter().map(Into::into).collect());
        self
    }

    /// Databases configured for an environment.
    pub fn environment(&self, env: Environment) -> Option<&BTreeMap<String, Vec<String>>> {
        self.environments.get(&env)
    }

    /// Endpoints of one database in one environment.
    pub fn endpoints(&self, env: Environment, database: &str) -> Option<&[String]> {
        self.environments
            .get(&env)
            .and_then(|dbs| dbs.get(database))
            .map(Vec::as_slice)
    }
}

/// Connection string handed to [`Driver::dial`](crate::Driver::dial).
///
/// Always requests a direct connection to the listed servers.
#[derive(Clone, PartialEq, Eq)]
pub struct DialUrl {
    endpoints: Vec<String>,
}

impl DialUrl {
    /// Build a dial URL from an endpoint list.
    ///
    /// Fails if the list is empty or contains a blank endpoint.
    pub fn from_endpoints(endpoints: &[String]) -> Result<Self, PoolError> {
        if endpoints.is_empty() {
            return Err(PoolError::config("addresses empty"));
        }
        if let Some(pos) = endpoints.iter().position(|e| e.trim().is_empty()) {
            return Err(PoolError::config(format!("endpoint #{pos} is blank")));
        }
        Ok(Self {
            endpoints: endpoints.iter().map(|e| e.trim().to_string()).collect(),
        })
    }

    /// Endpoints in dial order.
    #[must_use]
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// The URL with every password replaced by `***`, safe for logs.
    #[must_use]
    pub fn redacted(&self) -> String {
        let hosts: Vec<String> = self.endpoints.iter().map(|e| redact_endpoint(e)).collect();
        format!("mongodb://{}?connect=direct", hosts.join(","))
    }
}

impl fmt::Display for DialUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mongodb://{}?connect=direct", self.endpoints.join(","))
    }
}

impl fmt::Debug for DialUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DialUrl").field(&self.redacted()).finish()
    }
}

fn redact_endpoint(endpoint: &str) -> String {
    match endpoint.rsplit_once('@') {
        Some((userinfo, host)) => match userinfo.split_once(':') {
            Some((user, _)) => format!("{user}:***@{host}"),
            None => endpoint.to_string(),
        },
        None => endpoint.to_string(),
    }
}

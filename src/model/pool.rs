//! Backend pools and their member servers.
//!
//! # Responsibilities
//! - Define pools (mode, balancing algorithm, feature flags, servers)
//! - Keep pools in operator order with unique names
//! - Check name syntax shared by pools, servers and rules
//!
//! Removal and renaming are crate-private: they are only reachable through
//! [`DomainConfig`](crate::model::DomainConfig), which owns the rules and the
//! default target that may reference a pool.

use serde::{Deserialize, Serialize};

use crate::model::address::{AddressError, Endpoint};
use crate::model::error::EditError;

/// Protocol the gateway speaks to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolMode {
    Tcp,
    #[default]
    Http,
}

impl ProtocolMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolMode::Tcp => "tcp",
            ProtocolMode::Http => "http",
        }
    }
}

/// Load-balancing algorithm for a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Algorithm {
    #[default]
    #[serde(rename = "roundrobin", alias = "round_robin")]
    RoundRobin,
    #[serde(rename = "leastconn", alias = "least_connections")]
    LeastConnections,
    #[serde(rename = "source", alias = "source_hash")]
    SourceHash,
    #[serde(rename = "uri", alias = "uri_hash")]
    UriHash,
    #[serde(rename = "first", alias = "first_available")]
    FirstAvailable,
    #[serde(rename = "random")]
    Random,
}

impl Algorithm {
    /// Keyword used by the gateway's `balance` directive.
    pub fn keyword(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "roundrobin",
            Algorithm::LeastConnections => "leastconn",
            Algorithm::SourceHash => "source",
            Algorithm::UriHash => "uri",
            Algorithm::FirstAvailable => "first",
            Algorithm::Random => "random",
        }
    }
}

/// Optional behaviours toggled per pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolFeatures {
    pub health_check: bool,
    pub sticky_session: bool,
    pub websocket: bool,
    pub forward_headers: bool,
}

impl Default for PoolFeatures {
    fn default() -> Self {
        Self {
            health_check: true,
            sticky_session: false,
            websocket: false,
            forward_headers: true,
        }
    }
}

/// One upstream server inside a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    /// Empty means "use the positional name".
    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub endpoint: Endpoint,

    /// Extra directive text appended verbatim to the server line.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extra: String,
}

impl ServerEndpoint {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            name: String::new(),
            endpoint,
            extra: String::new(),
        }
    }

    pub fn named(name: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            name: name.into(),
            endpoint,
            extra: String::new(),
        }
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }

    /// Name used on the server line; falls back to `server<N>` (1-based).
    pub fn effective_name(&self, index: usize) -> String {
        if self.name.trim().is_empty() {
            positional_name(index)
        } else {
            self.name.trim().to_string()
        }
    }

    pub fn address(&self) -> Result<String, AddressError> {
        self.endpoint.canonical()
    }
}

pub(crate) fn positional_name(index: usize) -> String {
    format!("server{}", index + 1)
}

/// A named pool of upstream servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendPool {
    pub name: String,

    #[serde(default)]
    pub mode: ProtocolMode,

    #[serde(default, alias = "balance")]
    pub algorithm: Algorithm,

    #[serde(default)]
    pub features: PoolFeatures,

    #[serde(default)]
    pub servers: Vec<ServerEndpoint>,

    /// Extra directives written verbatim into the pool's stanza, one per
    /// line (`timeout server 30s`, `http-reuse safe`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl BackendPool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: ProtocolMode::default(),
            algorithm: Algorithm::default(),
            features: PoolFeatures::default(),
            servers: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: ProtocolMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_features(mut self, features: PoolFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn with_server(mut self, server: ServerEndpoint) -> Self {
        self.servers.push(server);
        self
    }

    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    /// Check that `server` can sit at `index` (or be appended when `index`
    /// is `None`) without a name or address collision.
    pub(crate) fn check_server(
        &self,
        server: &ServerEndpoint,
        index: Option<usize>,
    ) -> Result<(), EditError> {
        let address = server.address()?;
        let position = index.unwrap_or(self.servers.len());
        let name = server.effective_name(position);
        check_name("server", &name)?;

        for (i, other) in self.servers.iter().enumerate() {
            if Some(i) == index {
                continue;
            }
            if other.effective_name(i) == name {
                return Err(EditError::DuplicateName {
                    kind: "server",
                    name,
                });
            }
            if other.address().ok().as_deref() == Some(address.as_str()) {
                return Err(EditError::DuplicateAddress {
                    pool: self.name.clone(),
                    address,
                });
            }
        }
        Ok(())
    }

    /// Next free `server<N>` name.
    pub(crate) fn next_server_name(&self) -> String {
        let taken: Vec<String> = self
            .servers
            .iter()
            .enumerate()
            .map(|(i, s)| s.effective_name(i))
            .collect();
        let mut n = self.servers.len();
        loop {
            let candidate = positional_name(n);
            if !taken.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Validate a pool/server/rule name: `[A-Za-z0-9_.-]+`, not starting with `__`.
pub fn check_name(kind: &'static str, name: &str) -> Result<(), EditError> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.starts_with("__") {
        Some("names starting with '__' are reserved")
    } else if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        Some("only letters, digits, '_', '-' and '.' are allowed")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(EditError::InvalidName {
            kind,
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Validate a verbatim pool directive: one non-blank line.
pub fn check_option(option: &str) -> Result<(), EditError> {
    let reason = if option.trim().is_empty() {
        Some("must not be blank")
    } else if option.contains(['\n', '\r']) {
        Some("must be a single line")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(EditError::InvalidOption {
            option: option.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Ordered, name-unique collection of pools for one domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolStore {
    pools: Vec<BackendPool>,
}

impl PoolStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BackendPool> {
        self.pools.iter()
    }

    pub fn get(&self, name: &str) -> Option<&BackendPool> {
        self.pools.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.pools.iter().map(|p| p.name.as_str()).collect()
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut BackendPool> {
        self.pools.iter_mut().find(|p| p.name == name)
    }

    /// Append a pool. Pools without servers are accepted while editing.
    pub fn insert(&mut self, pool: BackendPool) -> Result<(), EditError> {
        check_name("pool", &pool.name)?;
        if self.contains(&pool.name) {
            return Err(EditError::DuplicateName {
                kind: "pool",
                name: pool.name,
            });
        }
        self.pools.push(pool);
        Ok(())
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<BackendPool> {
        let index = self.pools.iter().position(|p| p.name == name)?;
        Some(self.pools.remove(index))
    }
}

impl<'a> IntoIterator for &'a PoolStore {
    type Item = &'a BackendPool;
    type IntoIter = std::slice::Iter<'a, BackendPool>;

    fn into_iter(self) -> Self::IntoIter {
        self.pools.iter()
    }
}

impl FromIterator<BackendPool> for PoolStore {
    /// Collects without checks; the validator reports what is wrong.
    fn from_iter<T: IntoIterator<Item = BackendPool>>(iter: T) -> Self {
        Self {
            pools: iter.into_iter().collect(),
        }
    }
}

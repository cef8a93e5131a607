//! Connector configuration and per-query context.
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::{Result, invalid_argument};

/// Immutable string properties handed to a connector factory, or attached to
/// a query session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorConfig {
    values: HashMap<String, String>,
}

impl ConnectorConfig {
    pub fn new(values: HashMap<String, String>) -> Self {
        ConnectorConfig { values }
    }

    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Get a typed value, erroring if the value is set but doesn't parse.
    pub fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.values.get(key) {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|e| invalid_argument!("Invalid value '{raw}' for '{key}': {e}")),
            None => Ok(None),
        }
    }

    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ConnectorConfig
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ConnectorConfig {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Tracks bytes materialized by data sources for a single query.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    total: AtomicU64,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a batch of `bytes` having been materialized.
    pub fn record_batch(&self, bytes: u64) {
        self.total.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn total_bytes(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// Context for creating data sources on behalf of a query.
#[derive(Debug, Clone)]
pub struct ConnectorQueryContext {
    pub query_id: String,
    pub session: ConnectorConfig,
    pub memory: Arc<MemoryTracker>,
}

impl ConnectorQueryContext {
    pub fn new(query_id: impl Into<String>) -> Self {
        ConnectorQueryContext {
            query_id: query_id.into(),
            session: ConnectorConfig::default(),
            memory: Arc::new(MemoryTracker::new()),
        }
    }

    pub fn with_session(mut self, session: ConnectorConfig) -> Self {
        self.session = session;
        self
    }
}

//! Process wide registry of connector factories, live connectors and split
//! deserializers.
//!
//! Factories and split deserializers are registered during initialization.
//! Once the registry is sealed they are read only and further registrations
//! are rejected. Connectors may be created and dropped at any time.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::config::ConnectorConfig;
use crate::connector::{Connector, ConnectorFactory};
use crate::errors::{ConnectorError, Result};
use crate::hive::split::HiveConnectorSplit;
use crate::split::{ConnectorSplit, SPLIT_NAME_KEY};
use crate::tpch::TpchConnectorFactory;
use crate::tpch::split::TpchConnectorSplit;

/// Reconstructs a split from its serialized record.
pub type SplitDeserializer = fn(&Value) -> Result<ConnectorSplit>;

fn deserialize_hive_split(value: &Value) -> Result<ConnectorSplit> {
    Ok(HiveConnectorSplit::create(value)?.into())
}

fn deserialize_tpch_split(value: &Value) -> Result<ConnectorSplit> {
    Ok(TpchConnectorSplit::create(value)?.into())
}

static DEFAULT_REGISTRY: LazyLock<ConnectorRegistry> = LazyLock::new(|| {
    let registry = ConnectorRegistry::with_defaults();
    registry.seal();
    registry
});

/// Sealed registry with the tpch factory and deserializers for every split
/// kind.
pub fn default_registry() -> &'static ConnectorRegistry {
    &DEFAULT_REGISTRY
}

#[derive(Debug, Default)]
pub struct ConnectorRegistry {
    factories: RwLock<HashMap<String, Arc<dyn ConnectorFactory>>>,
    connectors: RwLock<HashMap<String, Arc<dyn Connector>>>,
    split_deserializers: RwLock<HashMap<String, SplitDeserializer>>,
    sealed: AtomicBool,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unsealed registry with the tpch factory and deserializers for every
    /// split kind.
    ///
    /// The hive factory needs a file reader implementation and is left to
    /// the caller.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let factory: Arc<dyn ConnectorFactory> = Arc::new(TpchConnectorFactory);
        registry
            .factories
            .write()
            .insert(factory.name().to_string(), factory);
        registry.split_deserializers.write().extend([
            (
                HiveConnectorSplit::NAME.to_string(),
                deserialize_hive_split as SplitDeserializer,
            ),
            (
                TpchConnectorSplit::NAME.to_string(),
                deserialize_tpch_split as SplitDeserializer,
            ),
        ]);
        registry
    }

    /// Reject all further factory and deserializer registrations.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    fn check_unsealed(&self, name: &str) -> Result<()> {
        if self.is_sealed() {
            warn!(%name, "registration attempted on sealed registry");
            return Err(ConnectorError::RegistrySealed(name.to_string()));
        }
        Ok(())
    }

    pub fn register_factory(&self, factory: Arc<dyn ConnectorFactory>) -> Result<()> {
        let name = factory.name().to_string();
        self.check_unsealed(&name)?;

        let mut factories = self.factories.write();
        if factories.contains_key(&name) {
            return Err(ConnectorError::DuplicateRegistration(name));
        }
        debug!(%name, "registered connector factory");
        factories.insert(name, factory);
        Ok(())
    }

    pub fn register_split_deserializer(
        &self,
        name: impl Into<String>,
        deserializer: SplitDeserializer,
    ) -> Result<()> {
        let name = name.into();
        self.check_unsealed(&name)?;

        let mut deserializers = self.split_deserializers.write();
        if deserializers.contains_key(&name) {
            return Err(ConnectorError::DuplicateRegistration(name));
        }
        deserializers.insert(name, deserializer);
        Ok(())
    }

    pub fn factory(&self, connector_type: &str) -> Result<Arc<dyn ConnectorFactory>> {
        self.factories
            .read()
            .get(connector_type)
            .cloned()
            .ok_or_else(|| ConnectorError::UnknownConnectorType(connector_type.to_string()))
    }

    /// Create a connector with the factory registered for `connector_type`
    /// and make it available under `id`.
    pub fn create_connector(
        &self,
        connector_type: &str,
        id: &str,
        config: ConnectorConfig,
        io_executor: Option<Handle>,
        cpu_executor: Option<Handle>,
    ) -> Result<Arc<dyn Connector>> {
        let factory = self.factory(connector_type)?;

        let mut connectors = self.connectors.write();
        if connectors.contains_key(id) {
            return Err(ConnectorError::DuplicateRegistration(id.to_string()));
        }
        let connector = factory.new_connector(id, Arc::new(config), io_executor, cpu_executor)?;
        connectors.insert(id.to_string(), connector.clone());
        debug!(%connector_type, %id, "created connector");

        Ok(connector)
    }

    pub fn get_connector(&self, id: &str) -> Result<Arc<dyn Connector>> {
        self.connectors
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ConnectorError::UnknownConnector(id.to_string()))
    }

    /// Remove a connector. Returns false if no connector has this id.
    pub fn remove_connector(&self, id: &str) -> bool {
        self.connectors.write().remove(id).is_some()
    }

    /// Reconstruct a split using the deserializer registered for the
    /// record's split name.
    pub fn deserialize_split(&self, value: &Value) -> Result<ConnectorSplit> {
        let name = value
            .get(SPLIT_NAME_KEY)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ConnectorError::MalformedSplit(format!("missing '{SPLIT_NAME_KEY}' field"))
            })?;

        let deserializer = self
            .split_deserializers
            .read()
            .get(name)
            .copied()
            .ok_or_else(|| ConnectorError::MalformedSplit(format!("unknown split kind '{name}'")))?;

        deserializer(value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::hive::HiveConnectorFactory;
    use crate::hive::reader::MemoryFileReaderFactory;
    use crate::hive::split::FileFormat;

    #[test]
    fn default_registry_is_sealed() {
        let registry = default_registry();
        assert!(registry.is_sealed());
        assert!(registry.factory("tpch").is_ok());

        let err = registry
            .register_factory(Arc::new(TpchConnectorFactory))
            .unwrap_err();
        assert!(matches!(err, ConnectorError::RegistrySealed(_)));
    }

    #[test]
    fn register_after_seal() {
        let registry = ConnectorRegistry::with_defaults();
        let hive = Arc::new(HiveConnectorFactory::new(Arc::new(
            MemoryFileReaderFactory::new(),
        )));
        registry.register_factory(hive.clone()).unwrap();
        registry.seal();

        assert!(registry.register_factory(hive).is_err());
        assert!(
            registry
                .register_split_deserializer("Other", deserialize_tpch_split)
                .is_err()
        );
    }

    #[test]
    fn duplicate_factory() {
        let registry = ConnectorRegistry::with_defaults();
        let err = registry
            .register_factory(Arc::new(TpchConnectorFactory))
            .unwrap_err();
        assert!(matches!(err, ConnectorError::DuplicateRegistration(_)));
    }

    #[test]
    fn create_and_lookup_connectors() {
        let registry = ConnectorRegistry::with_defaults();
        let connector = registry
            .create_connector("tpch", "tpch-1", ConnectorConfig::default(), None, None)
            .unwrap();
        assert_eq!("tpch-1", connector.id());
        assert_eq!("tpch-1", registry.get_connector("tpch-1").unwrap().id());

        assert!(
            registry
                .create_connector("tpch", "tpch-1", ConnectorConfig::default(), None, None)
                .is_err()
        );

        assert!(registry.remove_connector("tpch-1"));
        assert!(matches!(
            registry.get_connector("tpch-1").unwrap_err(),
            ConnectorError::UnknownConnector(_)
        ));
    }

    #[test]
    fn unknown_connector_type() {
        let err = default_registry()
            .create_connector("iceberg", "ice", ConnectorConfig::default(), None, None)
            .unwrap_err();
        assert!(matches!(err, ConnectorError::UnknownConnectorType(_)));
    }

    #[test]
    fn deserialize_each_split_kind() {
        let registry = default_registry();

        let hive: ConnectorSplit = HiveConnectorSplit::builder("hive", "/a/b", FileFormat::Parquet)
            .partition_key("ds", Some("2024-01-01"))
            .build()
            .unwrap()
            .into();
        let tpch: ConnectorSplit = TpchConnectorSplit::try_new("tpch", 0, 10).unwrap().into();

        for split in [hive, tpch] {
            let value = split.serialize().unwrap();
            assert_eq!(split, registry.deserialize_split(&value).unwrap());
        }
    }

    #[test]
    fn deserialize_unknown_kind() {
        let registry = default_registry();
        let err = registry
            .deserialize_split(&json!({"name": "IcebergSplit"}))
            .unwrap_err();
        assert!(matches!(err, ConnectorError::MalformedSplit(_)));

        let err = registry.deserialize_split(&json!({})).unwrap_err();
        assert!(matches!(err, ConnectorError::MalformedSplit(_)));
    }
}

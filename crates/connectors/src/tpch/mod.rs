//! Deterministic tpch data generation, partitioned by logical row range.
pub mod data_source;
pub mod errors;
pub mod generator;
pub mod handle;
pub mod split;
pub mod table;

use std::collections::HashMap;
use std::sync::Arc;

use datafusion::arrow::datatypes::SchemaRef;
use tokio::runtime::Handle;
use tracing::debug;

use self::data_source::TpchDataSource;
use crate::config::{ConnectorConfig, ConnectorQueryContext};
use crate::connector::{Connector, ConnectorFactory};
use crate::data_source::DataSource;
use crate::errors::{Result, invalid_argument};
use crate::handle::{ColumnHandle, TableHandle};

#[derive(Debug)]
pub struct TpchConnector {
    id: String,
}

impl TpchConnector {
    pub fn new(id: impl Into<String>) -> Self {
        TpchConnector { id: id.into() }
    }
}

impl Connector for TpchConnector {
    fn id(&self) -> &str {
        &self.id
    }

    fn create_data_source(
        &self,
        output_schema: SchemaRef,
        table: &TableHandle,
        column_handles: &HashMap<String, ColumnHandle>,
        ctx: &ConnectorQueryContext,
    ) -> Result<Box<dyn DataSource>> {
        let table = match table {
            TableHandle::Tpch(table) => table,
            other => {
                return Err(invalid_argument!(
                    "Tpch connector '{}' cannot scan {other}",
                    self.id
                ));
            }
        };
        Ok(Box::new(TpchDataSource::try_new(
            output_schema,
            table.clone(),
            column_handles,
            ctx,
        )?))
    }
}

#[derive(Debug, Default)]
pub struct TpchConnectorFactory;

impl TpchConnectorFactory {
    pub const NAME: &'static str = "tpch";
}

impl ConnectorFactory for TpchConnectorFactory {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn new_connector(
        &self,
        id: &str,
        config: Arc<ConnectorConfig>,
        _io_executor: Option<Handle>,
        _cpu_executor: Option<Handle>,
    ) -> Result<Arc<dyn Connector>> {
        debug!(%id, properties = config.len(), "creating tpch connector");
        Ok(Arc::new(TpchConnector::new(id)))
    }
}

#[cfg(test)]
mod tests {
    use datafusion::arrow::datatypes::Schema;

    use super::*;
    use crate::hive::handle::HiveTableHandle;
    use crate::tpch::handle::TpchTableHandle;
    use crate::tpch::table::TpchTable;

    fn connector() -> Arc<dyn Connector> {
        TpchConnectorFactory
            .new_connector("tpch", Arc::new(ConnectorConfig::default()), None, None)
            .unwrap()
    }

    #[test]
    fn rejects_other_table_handles() {
        let table = TableHandle::Hive(HiveTableHandle::new("hive", "t"));
        let err = connector()
            .create_data_source(
                Arc::new(Schema::empty()),
                &table,
                &HashMap::new(),
                &ConnectorQueryContext::new("q"),
            )
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn data_sink_unsupported() {
        let table =
            TableHandle::Tpch(TpchTableHandle::try_new("tpch", TpchTable::Nation, 1.0).unwrap());
        let err = connector()
            .create_data_sink(
                Arc::new(Schema::empty()),
                &table,
                &ConnectorQueryContext::new("q"),
            )
            .unwrap_err();
        assert!(err.is_unsupported());
    }
}

//! Hive tables: file splits, bucketing, and a data source reading through a
//! pluggable file reader.
pub mod bucket;
pub mod config;
pub mod data_source;
pub mod errors;
pub mod handle;
pub mod reader;
pub mod split;

use std::collections::HashMap;
use std::sync::Arc;

use datafusion::arrow::datatypes::SchemaRef;
use tokio::runtime::Handle;
use tracing::debug;

use self::config::HiveConfig;
use self::data_source::HiveDataSource;
use self::reader::FileReaderFactory;
use crate::config::{ConnectorConfig, ConnectorQueryContext};
use crate::connector::{Connector, ConnectorFactory};
use crate::data_source::DataSource;
use crate::errors::{Result, invalid_argument};
use crate::handle::{ColumnHandle, TableHandle};

#[derive(Debug)]
pub struct HiveConnector {
    id: String,
    config: Arc<HiveConfig>,
    readers: Arc<dyn FileReaderFactory>,
    io_executor: Option<Handle>,
}

impl HiveConnector {
    pub fn new(
        id: impl Into<String>,
        config: HiveConfig,
        readers: Arc<dyn FileReaderFactory>,
        io_executor: Option<Handle>,
    ) -> Self {
        HiveConnector {
            id: id.into(),
            config: Arc::new(config),
            readers,
            io_executor,
        }
    }
}

impl Connector for HiveConnector {
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
            TableHandle::Hive(table) => table,
            other => {
                return Err(invalid_argument!(
                    "Hive connector '{}' cannot scan {other}",
                    self.id
                ));
            }
        };
        let config = if ctx.session.is_empty() {
            self.config.clone()
        } else {
            Arc::new(self.config.with_session(&ctx.session)?)
        };
        debug!(
            id = %self.id,
            query_id = %ctx.query_id,
            table = %table.table_name,
            "creating hive data source"
        );

        Ok(Box::new(HiveDataSource::try_new(
            output_schema,
            table.clone(),
            column_handles,
            ctx,
            config,
            self.readers.clone(),
            self.io_executor.clone(),
        )?))
    }
}

/// Creates hive connectors that open files through `readers`.
#[derive(Debug)]
pub struct HiveConnectorFactory {
    readers: Arc<dyn FileReaderFactory>,
}

impl HiveConnectorFactory {
    pub const NAME: &'static str = "hive";

    pub fn new(readers: Arc<dyn FileReaderFactory>) -> Self {
        HiveConnectorFactory { readers }
    }
}

impl ConnectorFactory for HiveConnectorFactory {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn new_connector(
        &self,
        id: &str,
        config: Arc<ConnectorConfig>,
        io_executor: Option<Handle>,
        _cpu_executor: Option<Handle>,
    ) -> Result<Arc<dyn Connector>> {
        let hive_config = HiveConfig::from_config(&config)?;
        debug!(%id, ?hive_config, io_executor = io_executor.is_some(), "creating hive connector");
        Ok(Arc::new(HiveConnector::new(
            id,
            hive_config,
            self.readers.clone(),
            io_executor,
        )))
    }
}

#[cfg(test)]
mod tests {
    use datafusion::arrow::array::Int32Array;
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use datafusion::arrow::record_batch::RecordBatch;

    use super::*;
    use crate::hive::handle::{HiveColumnHandle, HiveTableHandle, HiveType};
    use crate::hive::reader::MemoryFileReaderFactory;
    use crate::hive::split::{FileFormat, HiveConnectorSplit};
    use crate::split::{ConnectorSplit, SplitRef};
    use crate::tpch::handle::TpchTableHandle;
    use crate::tpch::table::TpchTable;

    fn factory() -> HiveConnectorFactory {
        HiveConnectorFactory::new(Arc::new(MemoryFileReaderFactory::new()))
    }

    #[test]
    fn connector_reads_config() {
        let config: ConnectorConfig = [(HiveConfig::MAX_BUCKET_COUNT, "16")].into_iter().collect();
        let connector = factory()
            .new_connector("hive", Arc::new(config), None, None)
            .unwrap();
        assert_eq!("hive", connector.id());
    }

    #[test]
    fn invalid_config() {
        let config: ConnectorConfig = [(HiveConfig::FILE_COLUMN_NAMES_READ_AS_LOWER_CASE, "maybe")]
            .into_iter()
            .collect();
        let err = factory()
            .new_connector("hive", Arc::new(config), None, None)
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn rejects_tpch_table() {
        let connector = factory()
            .new_connector("hive", Arc::new(ConnectorConfig::default()), None, None)
            .unwrap();
        let table =
            TableHandle::Tpch(TpchTableHandle::try_new("tpch", TpchTable::Region, 1.0).unwrap());
        let err = connector
            .create_data_source(
                Arc::new(Schema::empty()),
                &table,
                &HashMap::new(),
                &ConnectorQueryContext::new("q"),
            )
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn session_reads_lower_case_columns() {
        let readers = Arc::new(MemoryFileReaderFactory::new());
        readers.insert(
            "/warehouse/events/000000_0",
            RecordBatch::try_new(
                Arc::new(Schema::new(vec![Field::new("event_id", DataType::Int32, false)])),
                vec![Arc::new(Int32Array::from(vec![1, 2, 3]))],
            )
            .unwrap(),
        );
        let connector = HiveConnectorFactory::new(readers)
            .new_connector("hive", Arc::new(ConnectorConfig::default()), None, None)
            .unwrap();

        let table = TableHandle::Hive(HiveTableHandle::new("hive", "events"));
        let schema = Arc::new(Schema::new(vec![Field::new("EVENT_ID", DataType::Int32, true)]));
        let columns: HashMap<String, ColumnHandle> = [(
            "EVENT_ID".to_string(),
            HiveColumnHandle::regular("EVENT_ID", HiveType::Int).into(),
        )]
        .into_iter()
        .collect();
        let split: SplitRef = ConnectorSplit::from(
            HiveConnectorSplit::builder("hive", "/warehouse/events/000000_0", FileFormat::Orc)
                .build()
                .unwrap(),
        )
        .into_ref();

        // Connector config reads the column as written.
        let mut source = connector
            .create_data_source(schema.clone(), &table, &columns, &ConnectorQueryContext::new("q1"))
            .unwrap();
        source.add_split(split.clone()).unwrap();
        assert!(source.next(10).await.is_err());

        let session: ConnectorConfig = [(HiveConfig::FILE_COLUMN_NAMES_READ_AS_LOWER_CASE, "true")]
            .into_iter()
            .collect();
        let ctx = ConnectorQueryContext::new("q2").with_session(session);
        let mut source = connector
            .create_data_source(schema, &table, &columns, &ctx)
            .unwrap();
        source.add_split(split).unwrap();
        let batch = source.next(10).await.unwrap().unwrap();
        assert_eq!(3, batch.num_rows());
        assert_eq!("EVENT_ID", batch.schema().field(0).name());
    }

    #[test]
    fn data_sink_unsupported() {
        let connector = factory()
            .new_connector("hive", Arc::new(ConnectorConfig::default()), None, None)
            .unwrap();
        let table = TableHandle::Hive(HiveTableHandle::new("hive", "events"));
        let err = connector
            .create_data_sink(
                Arc::new(Schema::empty()),
                &table,
                &ConnectorQueryContext::new("q"),
            )
            .unwrap_err();
        assert!(err.is_unsupported());
    }
}

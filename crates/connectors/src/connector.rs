//! Connector and connector factory interfaces.
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use datafusion::arrow::datatypes::SchemaRef;
use tokio::runtime::Handle;

use crate::config::{ConnectorConfig, ConnectorQueryContext};
use crate::data_source::{DataSink, DataSource};
use crate::errors::{Result, unsupported};
use crate::handle::{ColumnHandle, TableHandle};

/// A configured instance of a connector type.
///
/// Connectors hold no per-query state. Every call to `create_data_source`
/// returns an independent data source.
pub trait Connector: Debug + Send + Sync {
    fn id(&self) -> &str;

    /// Create a data source producing batches matching `output_schema`.
    ///
    /// `column_handles` maps every output column name to its handle.
    fn create_data_source(
        &self,
        output_schema: SchemaRef,
        table: &TableHandle,
        column_handles: &HashMap<String, ColumnHandle>,
        ctx: &ConnectorQueryContext,
    ) -> Result<Box<dyn DataSource>>;

    fn create_data_sink(
        &self,
        _input_schema: SchemaRef,
        table: &TableHandle,
        _ctx: &ConnectorQueryContext,
    ) -> Result<Box<dyn DataSink>> {
        Err(unsupported!(
            "Connector '{}' cannot write to {table}",
            self.id()
        ))
    }
}

/// Creates connectors of one type.
pub trait ConnectorFactory: Debug + Send + Sync {
    /// Connector type name the factory is registered under.
    fn name(&self) -> &str;

    /// Create a connector. Executors are optional; connectors run work on
    /// the calling task when none are provided.
    fn new_connector(
        &self,
        id: &str,
        config: Arc<ConnectorConfig>,
        io_executor: Option<Handle>,
        cpu_executor: Option<Handle>,
    ) -> Result<Arc<dyn Connector>>;
}

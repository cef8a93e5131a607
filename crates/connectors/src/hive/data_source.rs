use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use datafusion::arrow::array::{ArrayRef, StringArray};
use datafusion::arrow::compute::{CastOptions, cast_with_options};
use datafusion::arrow::datatypes::{DataType, SchemaRef};
use datafusion::arrow::record_batch::{RecordBatch, RecordBatchOptions};
use datafusion::common::ScalarValue;
use datafusion::physical_expr::PhysicalExpr;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use super::bucket::BucketConversionFilter;
use super::config::HiveConfig;
use super::errors::HiveError;
use super::handle::{HiveColumnHandle, HiveColumnType, HiveTableHandle};
use super::reader::{FileReader, FileReaderFactory};
use super::split::HiveConnectorSplit;
use crate::config::{ConnectorQueryContext, MemoryTracker};
use crate::data_source::{DataSource, RuntimeCounter, ScanState};
use crate::errors::{ConnectorError, Result, invalid_argument};
use crate::filter::DynamicFilters;
use crate::handle::ColumnHandle;
use crate::split::{ConnectorSplit, SplitRef};

/// Where an output column's values come from.
#[derive(Debug, Clone)]
enum OutputColumn {
    /// Read from the file column with this name.
    File(String),
    /// Constant per split, from the split's partition keys.
    PartitionKey(HiveColumnHandle),
    /// Constant per split, from split metadata.
    Synthesized(HiveColumnHandle),
}

#[derive(Debug)]
struct ActiveSplit {
    split: SplitRef,
    /// Opened on the first call to `next`.
    reader: Option<Box<dyn FileReader>>,
    /// Columns requested from the file.
    read_columns: Vec<String>,
    bucket_filter: Option<BucketConversionFilter>,
    /// Value for each constant output column, `None` for file columns.
    constants: Vec<Option<ScalarValue>>,
    rows_read: u64,
}

/// Reads hive splits through a [`FileReaderFactory`], applying bucket
/// conversion and dynamic filters before rows leave the connector.
#[derive(Debug)]
pub struct HiveDataSource {
    connector_id: String,
    table: HiveTableHandle,
    output_schema: SchemaRef,
    outputs: Vec<OutputColumn>,
    config: Arc<HiveConfig>,
    readers: Arc<dyn FileReaderFactory>,
    io_executor: Option<Handle>,
    memory: Arc<MemoryTracker>,
    filters: DynamicFilters,

    state: ScanState,
    current: Option<ActiveSplit>,

    completed_rows: u64,
    completed_bytes: u64,
    num_splits: u64,
    bucket_filtered_rows: u64,
    dynamic_filtered_rows: u64,
}

impl HiveDataSource {
    pub fn try_new(
        output_schema: SchemaRef,
        table: HiveTableHandle,
        column_handles: &HashMap<String, ColumnHandle>,
        ctx: &ConnectorQueryContext,
        config: Arc<HiveConfig>,
        readers: Arc<dyn FileReaderFactory>,
        io_executor: Option<Handle>,
    ) -> Result<Self> {
        let outputs = output_schema
            .fields()
            .iter()
            .map(|field| -> Result<OutputColumn> {
                let handle = match column_handles.get(field.name()) {
                    Some(ColumnHandle::Hive(handle)) => handle,
                    Some(other) => {
                        return Err(invalid_argument!(
                            "Expected a hive column handle for '{}', got {other:?}",
                            field.name()
                        ));
                    }
                    None => return Err(HiveError::UnknownOutputColumn(field.name().clone()).into()),
                };

                let handle_type = handle.hive_type.arrow_type();
                if &handle_type != field.data_type() {
                    return Err(HiveError::OutputTypeMismatch {
                        column: field.name().clone(),
                        expected: field.data_type().clone(),
                        actual: handle_type,
                    }
                    .into());
                }

                Ok(match handle.column_type {
                    HiveColumnType::Regular => OutputColumn::File(handle.name.clone()),
                    HiveColumnType::PartitionKey => OutputColumn::PartitionKey(handle.clone()),
                    HiveColumnType::Synthesized => OutputColumn::Synthesized(handle.clone()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(HiveDataSource {
            connector_id: table.connector_id.clone(),
            table,
            output_schema,
            outputs,
            config,
            readers,
            io_executor,
            memory: ctx.memory.clone(),
            filters: DynamicFilters::new(),
            state: ScanState::Idle,
            current: None,
            completed_rows: 0,
            completed_bytes: 0,
            num_splits: 0,
            bucket_filtered_rows: 0,
            dynamic_filtered_rows: 0,
        })
    }

    /// Handle for installing filters from another thread.
    pub fn dynamic_filters(&self) -> DynamicFilters {
        self.filters.clone()
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    fn file_column_name(&self, name: &str) -> String {
        if self.config.file_column_names_read_as_lower_case {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }

    fn prepare_split(
        &self,
        split: SplitRef,
        hive_split: &HiveConnectorSplit,
    ) -> Result<ActiveSplit> {
        let conversion = hive_split.bucket_conversion();
        let bucket_filter = match (conversion, hive_split.table_bucket_number()) {
            (Some(conversion), Some(bucket)) => {
                for count in [conversion.table_bucket_count, conversion.partition_bucket_count] {
                    if count > self.config.max_bucket_count {
                        return Err(HiveError::BucketCountTooLarge {
                            count,
                            max: self.config.max_bucket_count,
                        }
                        .into());
                    }
                }
                let mut conversion = conversion.clone();
                for handle in &mut conversion.bucket_column_handles {
                    handle.name = self.file_column_name(&handle.name);
                }
                Some(BucketConversionFilter::try_new(&conversion, bucket)?)
            }
            (Some(_), None) => return Err(HiveError::BucketConversionWithoutBucketNumber.into()),
            _ => None,
        };

        let mut read_columns: Vec<String> = Vec::new();
        let mut push_column = |name: String| {
            if !read_columns.contains(&name) {
                read_columns.push(name);
            }
        };
        for output in &self.outputs {
            if let OutputColumn::File(name) = output {
                push_column(self.file_column_name(name));
            }
        }
        if let Some(filter) = &bucket_filter {
            for name in filter.columns() {
                push_column(name.clone());
            }
        }

        let constants = self
            .outputs
            .iter()
            .map(|output| -> Result<Option<ScalarValue>> {
                let (handle, value) = match output {
                    OutputColumn::File(_) => return Ok(None),
                    OutputColumn::PartitionKey(handle) => {
                        let value = hive_split.partition_keys().get(&handle.name).ok_or_else(|| {
                            HiveError::MissingPartitionKey {
                                path: hive_split.file_path().to_string(),
                                column: handle.name.clone(),
                            }
                        })?;
                        (handle, value.clone())
                    }
                    OutputColumn::Synthesized(handle) => {
                        let value = synthesized_value(hive_split, &handle.name).ok_or_else(|| {
                            HiveError::MissingSynthesizedColumn(handle.name.clone())
                        })?;
                        (handle, Some(value))
                    }
                };
                constant_value(handle, value.as_deref()).map(Some)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ActiveSplit {
            split,
            reader: None,
            read_columns,
            bucket_filter,
            constants,
            rows_read: 0,
        })
    }

    /// Build the output batch from a batch read from the file.
    fn project(
        schema: &SchemaRef,
        outputs: &[OutputColumn],
        constants: &[Option<ScalarValue>],
        lower_case: bool,
        batch: &RecordBatch,
    ) -> Result<RecordBatch> {
        let num_rows = batch.num_rows();
        let columns = outputs
            .iter()
            .zip(constants)
            .map(|(output, constant)| -> Result<ArrayRef> {
                match (output, constant) {
                    (OutputColumn::File(name), _) => {
                        let name = if lower_case {
                            name.to_lowercase()
                        } else {
                            name.clone()
                        };
                        Ok(batch.column(batch.schema_ref().index_of(&name)?).clone())
                    }
                    (_, Some(value)) => Ok(value.to_array_of_size(num_rows)?),
                    (_, None) => Err(ConnectorError::InvalidState(
                        "missing constant for partition column".to_string(),
                    )),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
        Ok(RecordBatch::try_new_with_options(schema.clone(), columns, &options)?)
    }
}

fn expect_hive_split(split: &ConnectorSplit) -> Result<&HiveConnectorSplit> {
    match split {
        ConnectorSplit::Hive(s) => Ok(s),
        other => Err(ConnectorError::SplitMismatch {
            connector: other.connector_id().to_string(),
            kind: other.kind(),
        }),
    }
}

/// Open a reader for the split, on the io executor if one is configured.
async fn open_reader(
    readers: &Arc<dyn FileReaderFactory>,
    io_executor: Option<&Handle>,
    split: &SplitRef,
    columns: &[String],
) -> Result<Box<dyn FileReader>> {
    match io_executor {
        Some(handle) => {
            let readers = readers.clone();
            let split = split.clone();
            let columns = columns.to_vec();
            handle
                .spawn(async move {
                    let hive_split = expect_hive_split(&split)?;
                    readers.open(hive_split, &columns).await
                })
                .await
                .map_err(|e| HiveError::ReaderTask(e.to_string()))?
        }
        None => readers.open(expect_hive_split(split)?, columns).await,
    }
}

/// Value for a synthesized column, derived from split metadata.
fn synthesized_value(split: &HiveConnectorSplit, name: &str) -> Option<String> {
    match name {
        "$path" => Some(split.file_path().to_string()),
        "$bucket" => split.table_bucket_number().map(|b| b.to_string()),
        other => split.info_columns().get(other).cloned(),
    }
}

/// Parse a partition value from its canonical text form.
fn constant_value(handle: &HiveColumnHandle, value: Option<&str>) -> Result<ScalarValue> {
    let datatype = handle.hive_type.arrow_type();
    let value = match value {
        Some(value) => value,
        None => return Ok(ScalarValue::try_from(&datatype)?),
    };

    let text: ArrayRef = Arc::new(StringArray::from(vec![value]));
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    let array = match datatype {
        DataType::Utf8 => text,
        _ => cast_with_options(&text, &datatype, &options).map_err(|e| {
            HiveError::InvalidPartitionValue {
                column: handle.name.clone(),
                value: value.to_string(),
                reason: e.to_string(),
            }
        })?,
    };

    Ok(ScalarValue::try_from_array(&array, 0)?)
}

impl HiveDataSource {
    /// Drop the current split after a failed read. The data source accepts a
    /// new split afterwards.
    fn abort_split(&mut self, error: &ConnectorError) {
        if let Some(active) = self.current.take() {
            warn!(split = %active.split, %error, "abandoning hive split");
        }
        if self.state.is_active() {
            self.state = ScanState::Exhausted;
        }
    }

    async fn read_next(&mut self, size: usize) -> Result<Option<RecordBatch>> {
        if !self.state.is_active() {
            return Ok(None);
        }

        // Filters installed after this point apply to the next call.
        let filters = self.filters.snapshot();

        let active = match self.current.as_mut() {
            Some(active) => active,
            None => {
                return Err(ConnectorError::InvalidState(
                    "active hive data source without a split".to_string(),
                ));
            }
        };

        if active.reader.is_none() {
            let reader = open_reader(
                &self.readers,
                self.io_executor.as_ref(),
                &active.split,
                &active.read_columns,
            )
            .await?;
            active.reader = Some(reader);
        }
        let reader = match active.reader.as_mut() {
            Some(reader) => reader,
            None => {
                return Err(ConnectorError::InvalidState(
                    "hive file reader not opened".to_string(),
                ));
            }
        };

        loop {
            let batch = match reader.next_batch(size).await? {
                Some(batch) => batch,
                None => {
                    debug!(
                        split = %active.split,
                        rows_read = active.rows_read,
                        "hive split exhausted"
                    );
                    self.current = None;
                    self.state = ScanState::Exhausted;
                    return Ok(None);
                }
            };

            let rows = batch.num_rows() as u64;
            let bytes = batch.get_array_memory_size() as u64;
            active.rows_read += rows;
            self.completed_rows += rows;
            self.completed_bytes += bytes;
            self.memory.record_batch(bytes);

            let batch = match &active.bucket_filter {
                Some(filter) => {
                    let kept = filter.apply(&batch)?;
                    self.bucket_filtered_rows += rows - kept.num_rows() as u64;
                    kept
                }
                None => batch,
            };
            if batch.num_rows() == 0 {
                continue;
            }

            let out = Self::project(
                &self.output_schema,
                &self.outputs,
                &active.constants,
                self.config.file_column_names_read_as_lower_case,
                &batch,
            )?;

            let before = out.num_rows() as u64;
            let out = filters.apply(out)?;
            self.dynamic_filtered_rows += before - out.num_rows() as u64;
            if out.num_rows() == 0 {
                continue;
            }

            trace!(rows = out.num_rows(), filter_version = filters.version(), "hive batch");
            return Ok(Some(out));
        }
    }
}

#[async_trait]
impl DataSource for HiveDataSource {
    fn add_split(&mut self, split: SplitRef) -> Result<()> {
        self.state.check_can_add_split(&split)?;

        let hive_split = match split.as_ref() {
            ConnectorSplit::Hive(s) => s,
            other => {
                warn!(kind = other.kind(), "rejecting split for hive data source");
                return Err(ConnectorError::SplitMismatch {
                    connector: self.connector_id.clone(),
                    kind: other.kind(),
                });
            }
        };

        let active = self.prepare_split(split.clone(), hive_split)?;
        debug!(
            table = %self.table.table_name,
            split = %hive_split,
            columns = ?active.read_columns,
            bucket_conversion = active.bucket_filter.is_some(),
            "adding hive split"
        );

        self.current = Some(active);
        self.state = ScanState::Active;
        self.num_splits += 1;

        Ok(())
    }

    async fn next(&mut self, size: usize) -> Result<Option<RecordBatch>> {
        let result = self.read_next(size).await;
        if let Err(e) = &result {
            self.abort_split(e);
        }
        result
    }

    fn add_dynamic_filter(
        &mut self,
        column: &str,
        predicate: Arc<dyn PhysicalExpr>,
    ) -> Result<()> {
        if self.output_schema.index_of(column).is_err() {
            return Err(invalid_argument!(
                "Dynamic filter on unknown output column '{column}'"
            ));
        }
        self.filters.install(column, predicate);
        Ok(())
    }

    fn completed_rows(&self) -> u64 {
        self.completed_rows
    }

    fn completed_bytes(&self) -> u64 {
        self.completed_bytes
    }

    fn runtime_stats(&self) -> HashMap<String, RuntimeCounter> {
        [
            ("numSplits", RuntimeCounter::new(self.num_splits as i64)),
            (
                "bucketConversionFilteredRows",
                RuntimeCounter::new(self.bucket_filtered_rows as i64),
            ),
            (
                "dynamicFilteredRows",
                RuntimeCounter::new(self.dynamic_filtered_rows as i64),
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

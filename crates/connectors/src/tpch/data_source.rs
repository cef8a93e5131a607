use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::{RecordBatch, RecordBatchOptions};
use datafusion::physical_expr::PhysicalExpr;
use tracing::{debug, trace, warn};

use super::errors::TpchError;
use super::generator::TableRowCursor;
use super::handle::TpchTableHandle;
use super::table::TpchPart;
use crate::config::{ConnectorQueryContext, MemoryTracker};
use crate::data_source::{DataSource, RuntimeCounter, ScanState};
use crate::errors::{ConnectorError, Result, invalid_argument, unsupported};
use crate::handle::ColumnHandle;
use crate::split::{ConnectorSplit, SplitRef};

/// Generates tpch rows for row range splits, projected to an output schema.
#[derive(Debug)]
pub struct TpchDataSource {
    connector_id: String,
    table: TpchTableHandle,
    output_schema: SchemaRef,
    /// Index of the native column for each output column.
    column_indices: Vec<usize>,
    memory: Arc<MemoryTracker>,

    state: ScanState,
    /// Created on the first call to `next` for a split.
    cursor: Option<TableRowCursor>,
    position: u64,
    end: u64,
    /// Set when the split covers exactly one generator partition.
    part: Option<TpchPart>,

    completed_rows: u64,
    completed_bytes: u64,
    split_completed_rows: u64,
    num_splits: u64,
}

impl TpchDataSource {
    pub fn try_new(
        output_schema: SchemaRef,
        table: TpchTableHandle,
        column_handles: &HashMap<String, ColumnHandle>,
        ctx: &ConnectorQueryContext,
    ) -> Result<Self> {
        let tpch_table = table.table();
        let column_indices = output_schema
            .fields()
            .iter()
            .map(|field| -> Result<usize> {
                let name = match column_handles.get(field.name()) {
                    Some(ColumnHandle::Tpch(handle)) => &handle.name,
                    Some(other) => {
                        return Err(invalid_argument!(
                            "Expected a tpch column handle for '{}', got {other:?}",
                            field.name()
                        ));
                    }
                    None => field.name(),
                };

                let idx = tpch_table
                    .column_index(name)
                    .ok_or_else(|| TpchError::UnknownColumn {
                        table: tpch_table.to_string(),
                        column: name.clone(),
                    })?;

                let generated = &tpch_table.columns()[idx].datatype;
                if generated != field.data_type() {
                    return Err(TpchError::OutputTypeMismatch {
                        column: field.name().clone(),
                        expected: field.data_type().clone(),
                        actual: generated.clone(),
                    }
                    .into());
                }

                Ok(idx)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TpchDataSource {
            connector_id: table.connector_id().to_string(),
            table,
            output_schema,
            column_indices,
            memory: ctx.memory.clone(),
            state: ScanState::Idle,
            cursor: None,
            position: 0,
            end: 0,
            part: None,
            completed_rows: 0,
            completed_bytes: 0,
            split_completed_rows: 0,
            num_splits: 0,
        })
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    fn project(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let columns = self
            .column_indices
            .iter()
            .map(|&idx| batch.column(idx).clone())
            .collect();
        let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
        Ok(RecordBatch::try_new_with_options(
            self.output_schema.clone(),
            columns,
            &options,
        )?)
    }

    fn finish_split(&mut self) {
        debug!(
            table = %self.table,
            rows = self.split_completed_rows,
            "tpch split exhausted"
        );
        self.cursor = None;
        self.state = ScanState::Exhausted;
    }

    fn abort_split(&mut self, error: &ConnectorError) {
        warn!(table = %self.table, position = self.position, %error, "tpch split failed");
        self.cursor = None;
        self.state = ScanState::Exhausted;
    }

    fn generate_next(&mut self, size: usize) -> Result<Option<RecordBatch>> {
        let (table, scale_factor) = (self.table.table(), self.table.scale_factor());
        let (part, rows) = (self.part, self.position..self.end);
        let cursor = self.cursor.get_or_insert_with(|| match part {
            Some(part) => TableRowCursor::for_part(table, scale_factor, part),
            None => TableRowCursor::new(table, scale_factor, rows),
        });

        let batch = cursor.next_batch(size)?;
        self.position = cursor.position();
        let Some(batch) = batch else {
            self.finish_split();
            return Ok(None);
        };

        let out = self.project(&batch)?;
        let rows = out.num_rows() as u64;
        let bytes = out.get_array_memory_size() as u64;
        self.completed_rows += rows;
        self.split_completed_rows += rows;
        self.completed_bytes += bytes;
        self.memory.record_batch(bytes);

        trace!(rows, bytes, position = self.position, "tpch batch");

        Ok(Some(out))
    }
}

#[async_trait]
impl DataSource for TpchDataSource {
    fn add_split(&mut self, split: SplitRef) -> Result<()> {
        self.state.check_can_add_split(&split)?;

        let tpch_split = match split.as_ref() {
            ConnectorSplit::Tpch(s) => s,
            other => {
                warn!(kind = other.kind(), "rejecting split for tpch data source");
                return Err(ConnectorError::SplitMismatch {
                    connector: self.connector_id.clone(),
                    kind: other.kind(),
                });
            }
        };

        let row_count = self.table.row_count();
        if tpch_split.end() > row_count {
            return Err(TpchError::RangeOutOfBounds {
                table: self.table.table().to_string(),
                offset: tpch_split.offset(),
                end: tpch_split.end(),
                row_count,
            }
            .into());
        }

        debug!(table = %self.table, split = %tpch_split, "adding tpch split");

        let scale_factor = self.table.scale_factor();
        let rows = tpch_split.offset()..tpch_split.end();
        self.part = tpch_split
            .part()
            .filter(|&part| self.table.table().part_range(scale_factor, part) == rows);
        self.position = rows.start;
        self.end = rows.end;
        self.cursor = None;
        self.split_completed_rows = 0;
        self.num_splits += 1;
        self.state = ScanState::Active;

        Ok(())
    }

    async fn next(&mut self, size: usize) -> Result<Option<RecordBatch>> {
        if !self.state.is_active() {
            return Ok(None);
        }

        let result = self.generate_next(size);
        if let Err(e) = &result {
            self.abort_split(e);
        }
        result
    }

    fn add_dynamic_filter(
        &mut self,
        column: &str,
        _predicate: Arc<dyn PhysicalExpr>,
    ) -> Result<()> {
        Err(unsupported!(
            "Tpch data source cannot apply dynamic filter on '{column}'"
        ))
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
                "splitCompletedRows",
                RuntimeCounter::new(self.split_completed_rows as i64),
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use datafusion::arrow::array::AsArray;
    use datafusion::arrow::compute::concat_batches;
    use datafusion::arrow::datatypes::{DataType, Field, Int32Type, Int64Type, Schema};
    use datafusion::physical_expr::expressions::lit;
    use futures::TryStreamExt;

    use super::*;
    use crate::data_source::{drain, split_stream};
    use crate::hive::split::{FileFormat, HiveConnectorSplit};
    use crate::tpch::handle::TpchColumnHandle;
    use crate::tpch::split::TpchConnectorSplit;
    use crate::tpch::table::TpchTable;

    fn source(table: TpchTable, sf: f64, columns: &[&str]) -> TpchDataSource {
        let handle = TpchTableHandle::try_new("tpch", table, sf).unwrap();
        let fields: Vec<_> = columns
            .iter()
            .map(|name| {
                let idx = table.column_index(name).unwrap();
                Field::new(*name, table.columns()[idx].datatype.clone(), true)
            })
            .collect();
        let handles: HashMap<String, ColumnHandle> = columns
            .iter()
            .map(|name| (name.to_string(), TpchColumnHandle::new(*name).into()))
            .collect();

        TpchDataSource::try_new(
            Arc::new(Schema::new(fields)),
            handle,
            &handles,
            &ConnectorQueryContext::new("test"),
        )
        .unwrap()
    }

    fn split(offset: u64, end: u64) -> SplitRef {
        ConnectorSplit::from(TpchConnectorSplit::try_new("tpch", offset, end).unwrap()).into_ref()
    }

    fn nation_keys(batches: &[RecordBatch]) -> Vec<i32> {
        batches
            .iter()
            .flat_map(|b| b.column(0).as_primitive::<Int32Type>().values().to_vec())
            .collect()
    }

    #[tokio::test]
    async fn nation_single_split() {
        let mut source = source(TpchTable::Nation, 1.0, &["n_nationkey", "n_name"]);
        source.add_split(split(0, 25)).unwrap();

        let batch = source.next(1000).await.unwrap().unwrap();
        assert_eq!(25, batch.num_rows());
        assert!(source.next(1000).await.unwrap().is_none());
        assert_eq!(&ScanState::Exhausted, source.state());
        assert_eq!(25, source.completed_rows());
    }

    #[tokio::test]
    async fn nation_two_splits_match_single() {
        let mut whole = source(TpchTable::Nation, 1.0, &["n_nationkey", "n_name"]);
        whole.add_split(split(0, 25)).unwrap();
        let expected = drain(&mut whole, 1000).await.unwrap();

        let mut first = source(TpchTable::Nation, 1.0, &["n_nationkey", "n_name"]);
        let mut second = source(TpchTable::Nation, 1.0, &["n_nationkey", "n_name"]);
        first.add_split(split(0, 10)).unwrap();
        second.add_split(split(10, 25)).unwrap();

        let mut batches = drain(&mut first, 1000).await.unwrap();
        batches.extend(drain(&mut second, 4).await.unwrap());

        let schema = expected[0].schema();
        assert_eq!(
            concat_batches(&schema, &expected).unwrap(),
            concat_batches(&schema, &batches).unwrap()
        );
        assert_eq!((0..25).collect::<Vec<_>>(), nation_keys(&batches));
    }

    #[tokio::test]
    async fn idle_next_returns_none() {
        let mut source = source(TpchTable::Region, 1.0, &["r_name"]);
        assert!(source.next(10).await.unwrap().is_none());
        assert_eq!(0, source.completed_rows());
        assert_eq!(0, source.completed_bytes());
        assert_eq!(&ScanState::Idle, source.state());
    }

    #[tokio::test]
    async fn add_split_while_active() {
        let mut source = source(TpchTable::Nation, 1.0, &["n_nationkey"]);
        source.add_split(split(0, 25)).unwrap();
        source.next(5).await.unwrap().unwrap();

        let err = source.add_split(split(0, 25)).unwrap_err();
        assert!(err.is_invalid_state());

        // Draining allows a new split.
        drain(&mut source, 100).await.unwrap();
        source.add_split(split(0, 5)).unwrap();
    }

    #[tokio::test]
    async fn counters_are_monotonic() {
        let mut source = source(TpchTable::Nation, 1.0, &["n_nationkey", "n_comment"]);
        source.add_split(split(0, 10)).unwrap();
        drain(&mut source, 3).await.unwrap();
        let (rows, bytes) = (source.completed_rows(), source.completed_bytes());
        assert_eq!(10, rows);
        assert!(bytes > 0);

        source.add_split(split(10, 12)).unwrap();
        assert_eq!(rows, source.completed_rows());
        assert_eq!(bytes, source.completed_bytes());

        drain(&mut source, 3).await.unwrap();
        assert_eq!(12, source.completed_rows());
        assert!(source.completed_bytes() > bytes);

        let stats = source.runtime_stats();
        assert_eq!(2, stats["numSplits"].value);
        assert_eq!(2, stats["splitCompletedRows"].value);
    }

    #[tokio::test]
    async fn projects_in_output_order() {
        let mut source = source(TpchTable::Region, 1.0, &["r_name", "r_regionkey"]);
        source.add_split(split(0, 5)).unwrap();
        let batch = source.next(10).await.unwrap().unwrap();

        assert_eq!("r_name", batch.schema().field(0).name());
        assert_eq!(&DataType::Utf8, batch.column(0).data_type());
        assert_eq!(
            vec![0, 1, 2, 3, 4],
            batch.column(1).as_primitive::<Int32Type>().values().to_vec()
        );
    }

    #[tokio::test]
    async fn no_output_columns() {
        let mut source = source(TpchTable::Nation, 1.0, &[]);
        source.add_split(split(0, 25)).unwrap();
        let batch = source.next(100).await.unwrap().unwrap();
        assert_eq!(25, batch.num_rows());
        assert_eq!(0, batch.num_columns());
    }

    #[tokio::test]
    async fn supplier_parts_cover_table() {
        let handle = TpchTableHandle::try_new("tpch", TpchTable::Supplier, 0.01).unwrap();
        let mut keys = BTreeSet::new();
        let mut total = 0;

        for tpch_split in TpchConnectorSplit::splits_for_table(&handle, 3).unwrap() {
            let source = source(TpchTable::Supplier, 0.01, &["s_suppkey"]);
            let split = ConnectorSplit::from(tpch_split).into_ref();
            let batches: Vec<_> = split_stream(source, split, 16)
                .unwrap()
                .try_collect()
                .await
                .unwrap();
            for batch in batches {
                total += batch.num_rows();
                keys.extend(batch.column(0).as_primitive::<Int64Type>().values().iter().copied());
            }
        }

        assert_eq!(100, total);
        assert_eq!(100, keys.len());
    }

    #[tokio::test]
    async fn lineitem_batches_respect_size() {
        let handle = TpchTableHandle::try_new("tpch", TpchTable::LineItem, 0.01).unwrap();
        let mut order_keys = Vec::new();

        for tpch_split in TpchConnectorSplit::splits_for_table(&handle, 4).unwrap() {
            let mut source = source(TpchTable::LineItem, 0.01, &["l_orderkey", "l_linenumber"]);
            let split = ConnectorSplit::from(tpch_split).into_ref();
            source.add_split(split).unwrap();

            while let Some(batch) = source.next(10).await.unwrap() {
                assert!(batch.num_rows() <= 10);
                assert!(batch.num_rows() > 0);
                order_keys.extend(batch.column(0).as_primitive::<Int64Type>().values().iter());
            }
            assert_eq!(&ScanState::Exhausted, source.state());
        }

        // Every order appears, with its line items contiguous.
        let mut distinct = order_keys.clone();
        distinct.dedup();
        let unique: BTreeSet<i64> = distinct.iter().copied().collect();
        assert_eq!(handle.row_count() as usize, unique.len());
        assert_eq!(distinct.len(), unique.len());
    }

    #[tokio::test]
    async fn lineitem_range_split_matches_part_split() {
        let handle = TpchTableHandle::try_new("tpch", TpchTable::LineItem, 0.01).unwrap();
        let parts = TpchConnectorSplit::splits_for_table(&handle, 4).unwrap();
        let part_split = parts[1].clone();
        assert!(part_split.part().is_some());

        let range_split =
            TpchConnectorSplit::try_new("tpch", part_split.offset(), part_split.end()).unwrap();

        let mut seeking = source(TpchTable::LineItem, 0.01, &["l_orderkey", "l_comment"]);
        seeking.add_split(ConnectorSplit::from(part_split).into_ref()).unwrap();
        let mut skipping = source(TpchTable::LineItem, 0.01, &["l_orderkey", "l_comment"]);
        skipping.add_split(ConnectorSplit::from(range_split).into_ref()).unwrap();

        let expected = drain(&mut skipping, 64).await.unwrap();
        let actual = drain(&mut seeking, 64).await.unwrap();
        assert_eq!(expected, actual);
        assert_eq!(skipping.completed_rows(), seeking.completed_rows());
    }

    #[tokio::test]
    async fn failed_batch_ends_split() {
        let mut source = source(TpchTable::Nation, 1.0, &["n_nationkey"]);
        source.add_split(split(0, 25)).unwrap();
        source.next(5).await.unwrap().unwrap();

        source.abort_split(&invalid_argument!("generator failed"));
        assert_eq!(&ScanState::Exhausted, source.state());
        assert!(source.next(5).await.unwrap().is_none());

        source.add_split(split(5, 10)).unwrap();
        let batches = drain(&mut source, 100).await.unwrap();
        assert_eq!((5..10).collect::<Vec<_>>(), nation_keys(&batches));
    }

    #[test]
    fn unknown_output_column() {
        let handle = TpchTableHandle::try_new("tpch", TpchTable::Nation, 1.0).unwrap();
        let schema = Arc::new(Schema::new(vec![Field::new("c_name", DataType::Utf8, true)]));
        let err = TpchDataSource::try_new(
            schema,
            handle,
            &HashMap::new(),
            &ConnectorQueryContext::new("test"),
        )
        .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn output_type_mismatch() {
        let handle = TpchTableHandle::try_new("tpch", TpchTable::Nation, 1.0).unwrap();
        let schema = Arc::new(Schema::new(vec![Field::new("n_nationkey", DataType::Utf8, true)]));
        let err = TpchDataSource::try_new(
            schema,
            handle,
            &HashMap::new(),
            &ConnectorQueryContext::new("test"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::Tpch(TpchError::OutputTypeMismatch { .. })
        ));
    }

    #[test]
    fn dynamic_filter_unsupported() {
        let mut source = source(TpchTable::Nation, 1.0, &["n_nationkey"]);
        let err = source
            .add_dynamic_filter("n_nationkey", lit(true))
            .unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn rejects_hive_split() {
        let mut source = source(TpchTable::Nation, 1.0, &["n_nationkey"]);
        let hive = HiveConnectorSplit::builder("hive", "/data/f.orc", FileFormat::Orc)
            .build()
            .unwrap();
        let err = source
            .add_split(ConnectorSplit::from(hive).into_ref())
            .unwrap_err();
        assert!(matches!(err, ConnectorError::SplitMismatch { .. }));
        assert_eq!(&ScanState::Idle, source.state());
    }

    #[test]
    fn split_out_of_bounds() {
        let mut source = source(TpchTable::Region, 1.0, &["r_name"]);
        let err = source.add_split(split(0, 6)).unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::Tpch(TpchError::RangeOutOfBounds { .. })
        ));
    }
}

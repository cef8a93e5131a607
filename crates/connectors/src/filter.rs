//! Runtime predicates pushed into data sources.
use std::sync::Arc;

use datafusion::arrow::compute::filter_record_batch;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::common::cast::as_boolean_array;
use datafusion::logical_expr::Operator;
use datafusion::physical_expr::PhysicalExpr;
use datafusion::physical_expr::expressions::BinaryExpr;
use parking_lot::RwLock;

use crate::errors::Result;

/// A predicate on a single output column.
#[derive(Debug, Clone)]
pub struct DynamicFilter {
    pub column: String,
    /// Predicate evaluated against the output batch, producing a boolean
    /// mask. Null entries drop the row.
    pub predicate: Arc<dyn PhysicalExpr>,
}

#[derive(Debug, Default)]
struct FilterSetState {
    version: u64,
    filters: Arc<Vec<DynamicFilter>>,
}

/// Filters installed into a data source.
///
/// Cloning yields a handle to the same set so filters may be installed from
/// a thread other than the one driving the data source. Readers only ever see
/// whole snapshots.
#[derive(Debug, Clone, Default)]
pub struct DynamicFilters {
    state: Arc<RwLock<FilterSetState>>,
}

impl DynamicFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a predicate for a column. A predicate for a column that already
    /// has one is AND-ed with the existing predicate.
    pub fn install(&self, column: &str, predicate: Arc<dyn PhysicalExpr>) {
        let mut state = self.state.write();

        let mut filters = Vec::clone(&state.filters);
        match filters.iter_mut().find(|f| f.column == column) {
            Some(existing) => {
                existing.predicate = Arc::new(BinaryExpr::new(
                    existing.predicate.clone(),
                    Operator::And,
                    predicate,
                ));
            }
            None => filters.push(DynamicFilter {
                column: column.to_string(),
                predicate,
            }),
        }

        state.filters = Arc::new(filters);
        state.version += 1;
    }

    /// Get the current set of filters. Filters installed after this call are
    /// not visible through the returned snapshot.
    pub fn snapshot(&self) -> FilterSnapshot {
        let state = self.state.read();
        FilterSnapshot {
            version: state.version,
            filters: state.filters.clone(),
        }
    }

    pub fn version(&self) -> u64 {
        self.state.read().version
    }
}

#[derive(Debug, Clone)]
pub struct FilterSnapshot {
    version: u64,
    filters: Arc<Vec<DynamicFilter>>,
}

impl FilterSnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn filters(&self) -> &[DynamicFilter] {
        &self.filters
    }

    /// Apply all filters in the snapshot to the batch.
    pub fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let mut batch = batch;
        for filter in self.filters.iter() {
            if batch.num_rows() == 0 {
                break;
            }
            let mask = filter
                .predicate
                .evaluate(&batch)?
                .into_array(batch.num_rows())?;
            let mask = as_boolean_array(&mask)?;
            batch = filter_record_batch(&batch, mask)?;
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use datafusion::arrow::array::Int32Array;
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use datafusion::physical_expr::expressions::{binary, col, lit};

    use super::*;

    fn batch() -> RecordBatch {
        let schema = Schema::new(vec![Field::new("a", DataType::Int32, true)]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(Int32Array::from(vec![
                Some(1),
                Some(5),
                None,
                Some(9),
            ]))],
        )
        .unwrap()
    }

    fn predicate(op: Operator, v: i32) -> Arc<dyn PhysicalExpr> {
        let b = batch();
        binary(col("a", b.schema_ref()).unwrap(), op, lit(v), b.schema_ref()).unwrap()
    }

    #[test]
    fn empty_snapshot_passes_through() {
        let filters = DynamicFilters::new();
        let snapshot = filters.snapshot();
        assert!(snapshot.is_empty());
        assert_eq!(4, snapshot.apply(batch()).unwrap().num_rows());
    }

    #[test]
    fn nulls_are_dropped() {
        let filters = DynamicFilters::new();
        filters.install("a", predicate(Operator::Gt, 0));

        let out = filters.snapshot().apply(batch()).unwrap();
        assert_eq!(3, out.num_rows());
    }

    #[test]
    fn same_column_filters_are_conjoined() {
        let filters = DynamicFilters::new();
        filters.install("a", predicate(Operator::Gt, 2));
        filters.install("a", predicate(Operator::Lt, 9));

        let snapshot = filters.snapshot();
        assert_eq!(1, snapshot.filters().len());
        assert_eq!(2, snapshot.version());

        let out = snapshot.apply(batch()).unwrap();
        let values = out
            .column(0)
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        assert_eq!(&Int32Array::from(vec![5]), values);
    }

    #[test]
    fn snapshot_ignores_later_installs() {
        let filters = DynamicFilters::new();
        let handle = filters.clone();

        let before = filters.snapshot();
        std::thread::spawn(move || handle.install("a", predicate(Operator::Eq, 1)))
            .join()
            .unwrap();

        assert_eq!(4, before.apply(batch()).unwrap().num_rows());
        assert_eq!(1, filters.snapshot().apply(batch()).unwrap().num_rows());
    }
}

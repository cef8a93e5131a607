//! Pull based, split scoped row producers.
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use async_trait::async_trait;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::physical_expr::PhysicalExpr;
use futures::stream::{self, BoxStream, StreamExt};

use crate::errors::{ConnectorError, Result};
use crate::split::SplitRef;

/// Unit attached to a runtime counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterUnit {
    None,
    Bytes,
    Nanos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeCounter {
    pub value: i64,
    pub unit: CounterUnit,
}

impl RuntimeCounter {
    pub const fn new(value: i64) -> Self {
        RuntimeCounter {
            value,
            unit: CounterUnit::None,
        }
    }

    pub const fn bytes(value: i64) -> Self {
        RuntimeCounter {
            value,
            unit: CounterUnit::Bytes,
        }
    }
}

/// Produces row batches for one split at a time.
///
/// A single instance is driven by one caller at a time. Parallelism comes
/// from running many instances over disjoint splits.
#[async_trait]
pub trait DataSource: Debug + Send {
    /// Assign the next split.
    ///
    /// Errors with an invalid state error if the previous split has not been
    /// drained through `next`.
    fn add_split(&mut self, split: SplitRef) -> Result<()>;

    /// Produce up to `size` rows from the current split.
    ///
    /// Returns `None` when no split is assigned, or once the current split is
    /// exhausted.
    async fn next(&mut self, size: usize) -> Result<Option<RecordBatch>>;

    /// Install a predicate on an output column. Only affects batches produced
    /// by later calls to `next`.
    fn add_dynamic_filter(&mut self, column: &str, predicate: Arc<dyn PhysicalExpr>)
    -> Result<()>;

    /// Rows produced across all splits.
    fn completed_rows(&self) -> u64;

    /// Bytes produced across all splits.
    fn completed_bytes(&self) -> u64;

    fn runtime_stats(&self) -> HashMap<String, RuntimeCounter> {
        HashMap::new()
    }
}

#[async_trait]
impl<S> DataSource for Box<S>
where
    S: DataSource + ?Sized,
{
    fn add_split(&mut self, split: SplitRef) -> Result<()> {
        (**self).add_split(split)
    }

    async fn next(&mut self, size: usize) -> Result<Option<RecordBatch>> {
        (**self).next(size).await
    }

    fn add_dynamic_filter(
        &mut self,
        column: &str,
        predicate: Arc<dyn PhysicalExpr>,
    ) -> Result<()> {
        (**self).add_dynamic_filter(column, predicate)
    }

    fn completed_rows(&self) -> u64 {
        (**self).completed_rows()
    }

    fn completed_bytes(&self) -> u64 {
        (**self).completed_bytes()
    }

    fn runtime_stats(&self) -> HashMap<String, RuntimeCounter> {
        (**self).runtime_stats()
    }
}

/// Accepts rows for writing.
#[async_trait]
pub trait DataSink: Debug + Send {
    async fn append(&mut self, batch: RecordBatch) -> Result<()>;

    /// Flush and commit everything appended so far.
    async fn finish(&mut self) -> Result<u64>;
}

/// Split lifecycle shared by data source implementations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScanState {
    /// No split assigned.
    #[default]
    Idle,
    /// A split is assigned and has more rows.
    Active,
    /// The current split has been fully produced.
    Exhausted,
}

impl ScanState {
    /// Check that a new split may be assigned.
    pub fn check_can_add_split(&self, split: &SplitRef) -> Result<()> {
        match self {
            ScanState::Idle | ScanState::Exhausted => Ok(()),
            ScanState::Active => Err(ConnectorError::InvalidState(format!(
                "cannot add split '{split}', previous split has not been exhausted"
            ))),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ScanState::Active)
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanState::Idle => write!(f, "idle"),
            ScanState::Active => write!(f, "active"),
            ScanState::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Assign `split` and drain it into a stream of batches of up to `batch_size`
/// rows.
pub fn split_stream<'a, S>(
    mut source: S,
    split: SplitRef,
    batch_size: usize,
) -> Result<BoxStream<'a, Result<RecordBatch>>>
where
    S: DataSource + 'a,
{
    source.add_split(split)?;

    let stream = stream::unfold(Some(source), move |source| async move {
        let mut source = source?;
        match source.next(batch_size).await {
            Ok(Some(batch)) => Some((Ok(batch), Some(source))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    });

    Ok(stream.boxed())
}

/// Drain every remaining batch of the current split.
pub async fn drain<S>(source: &mut S, batch_size: usize) -> Result<Vec<RecordBatch>>
where
    S: DataSource + ?Sized,
{
    let mut batches = Vec::new();
    while let Some(batch) = source.next(batch_size).await? {
        batches.push(batch);
    }
    Ok(batches)
}

//! Boundary to physical file readers.
use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use datafusion::arrow::record_batch::RecordBatch;
use parking_lot::RwLock;

use super::errors::HiveError;
use super::split::HiveConnectorSplit;
use crate::errors::Result;

/// Opens readers for hive splits.
#[async_trait]
pub trait FileReaderFactory: Debug + Send + Sync {
    /// Open a reader over the split's byte range producing batches with
    /// exactly `columns`, in order.
    async fn open(&self, split: &HiveConnectorSplit, columns: &[String])
    -> Result<Box<dyn FileReader>>;
}

#[async_trait]
pub trait FileReader: Debug + Send {
    /// Read up to `max_rows` rows. `None` once the byte range is consumed.
    async fn next_batch(&mut self, max_rows: usize) -> Result<Option<RecordBatch>>;
}

/// Serves files from memory. Each file is a single record batch; the split's
/// byte range is ignored.
#[derive(Debug, Default)]
pub struct MemoryFileReaderFactory {
    files: RwLock<HashMap<String, RecordBatch>>,
}

impl MemoryFileReaderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, batch: RecordBatch) {
        self.files.write().insert(path.into(), batch);
    }
}

#[async_trait]
impl FileReaderFactory for MemoryFileReaderFactory {
    async fn open(
        &self,
        split: &HiveConnectorSplit,
        columns: &[String],
    ) -> Result<Box<dyn FileReader>> {
        let files = self.files.read();
        let batch = files
            .get(split.file_path())
            .ok_or_else(|| HiveError::FileNotFound(split.file_path().to_string()))?;

        let indices = columns
            .iter()
            .map(|col| {
                batch
                    .schema_ref()
                    .index_of(col)
                    .map_err(|_| HiveError::MissingFileColumn {
                        path: split.file_path().to_string(),
                        column: col.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Box::new(MemoryFileReader {
            batch: batch.project(&indices)?,
            offset: 0,
        }))
    }
}

#[derive(Debug)]
pub struct MemoryFileReader {
    batch: RecordBatch,
    offset: usize,
}

#[async_trait]
impl FileReader for MemoryFileReader {
    async fn next_batch(&mut self, max_rows: usize) -> Result<Option<RecordBatch>> {
        let remaining = self.batch.num_rows() - self.offset;
        if remaining == 0 {
            return Ok(None);
        }
        let len = remaining.min(max_rows.max(1));
        let out = self.batch.slice(self.offset, len);
        self.offset += len;
        Ok(Some(out))
    }
}

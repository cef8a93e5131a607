//! Units of scan work handed to data sources.
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::Result;
use crate::hive::split::HiveConnectorSplit;
use crate::tpch::split::TpchConnectorSplit;

/// Key in a serialized split record naming the split kind.
pub const SPLIT_NAME_KEY: &str = "name";

/// Bucketing information exposed by a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketInfo {
    /// Bucket the split exposes under the table's current bucket count.
    pub bucket_number: i32,
    /// Bucket count the backing file was written with, if different from
    /// the table's current count.
    pub partition_bucket_count: Option<i32>,
}

/// One unit of scannable work.
///
/// Splits are immutable once built and are shared between data sources
/// (e.g. across retries) through [`SplitRef`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorSplit {
    Hive(HiveConnectorSplit),
    Tpch(TpchConnectorSplit),
}

pub type SplitRef = Arc<ConnectorSplit>;

impl ConnectorSplit {
    pub fn connector_id(&self) -> &str {
        match self {
            ConnectorSplit::Hive(s) => s.connector_id(),
            ConnectorSplit::Tpch(s) => s.connector_id(),
        }
    }

    /// Scheduling weight, 0 if unset.
    pub fn split_weight(&self) -> i64 {
        match self {
            ConnectorSplit::Hive(s) => s.split_weight(),
            ConnectorSplit::Tpch(s) => s.split_weight(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ConnectorSplit::Hive(_) => HiveConnectorSplit::NAME,
            ConnectorSplit::Tpch(_) => TpchConnectorSplit::NAME,
        }
    }

    pub fn bucket_info(&self) -> Option<BucketInfo> {
        match self {
            ConnectorSplit::Hive(s) => s.bucket_info(),
            ConnectorSplit::Tpch(_) => None,
        }
    }

    pub fn serialize(&self) -> Result<Value> {
        match self {
            ConnectorSplit::Hive(s) => s.serialize(),
            ConnectorSplit::Tpch(s) => s.serialize(),
        }
    }

    pub fn into_ref(self) -> SplitRef {
        Arc::new(self)
    }
}

impl fmt::Display for ConnectorSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorSplit::Hive(s) => fmt::Display::fmt(s, f),
            ConnectorSplit::Tpch(s) => fmt::Display::fmt(s, f),
        }
    }
}

impl From<HiveConnectorSplit> for ConnectorSplit {
    fn from(value: HiveConnectorSplit) -> Self {
        ConnectorSplit::Hive(value)
    }
}

impl From<TpchConnectorSplit> for ConnectorSplit {
    fn from(value: TpchConnectorSplit) -> Self {
        ConnectorSplit::Tpch(value)
    }
}

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::HiveError;
use super::handle::HiveColumnHandle;
use crate::errors::{ConnectorError, Result};
use crate::split::{BucketInfo, SPLIT_NAME_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Dwrf,
    Rc,
    Text,
    Json,
    Parquet,
    Nimble,
    Orc,
    Sst,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Dwrf => "dwrf",
            FileFormat::Rc => "rc",
            FileFormat::Text => "text",
            FileFormat::Json => "json",
            FileFormat::Parquet => "parquet",
            FileFormat::Nimble => "nimble",
            FileFormat::Orc => "orc",
            FileFormat::Sst => "sst",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = HiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "dwrf" => FileFormat::Dwrf,
            "rc" => FileFormat::Rc,
            "text" => FileFormat::Text,
            "json" => FileFormat::Json,
            "parquet" => FileFormat::Parquet,
            "nimble" => FileFormat::Nimble,
            "orc" => FileFormat::Orc,
            "sst" => FileFormat::Sst,
            other => return Err(HiveError::UnknownFileFormat(other.to_string())),
        })
    }
}

/// Describes how to re-filter rows of a file written under an older, smaller
/// bucket count.
///
/// When a table's bucket count is increased, existing partitions keep their
/// files laid out under the old count. One old file then holds the rows of
/// `table_bucket_count / partition_bucket_count` new buckets, and every split
/// reading it only keeps rows that hash to its own bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketConversion {
    pub table_bucket_count: i32,
    pub partition_bucket_count: i32,
    pub bucket_column_handles: Vec<HiveColumnHandle>,
}

impl BucketConversion {
    pub fn validate(&self) -> Result<(), HiveError> {
        if self.partition_bucket_count <= 0
            || self.table_bucket_count < self.partition_bucket_count
            || self.table_bucket_count % self.partition_bucket_count != 0
        {
            return Err(HiveError::InvalidBucketCounts {
                table_bucket_count: self.table_bucket_count,
                partition_bucket_count: self.partition_bucket_count,
            });
        }
        if self.bucket_column_handles.is_empty() {
            return Err(HiveError::EmptyBucketColumns);
        }
        Ok(())
    }

    /// Number of new buckets folded into a single old bucket file.
    pub fn fold_factor(&self) -> i32 {
        self.table_bucket_count / self.partition_bucket_count
    }

    /// The old bucket file holding rows of the given new bucket.
    pub fn partition_bucket_for(&self, table_bucket_number: i32) -> i32 {
        table_bucket_number % self.partition_bucket_count
    }
}

/// File properties known ahead of opening the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowIdProperties {
    pub metadata_version: i64,
    pub partition_id: i64,
    pub table_guid: String,
}

/// A byte range of a single file in a hive table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiveConnectorSplit {
    connector_id: String,
    split_weight: i64,
    file_path: String,
    file_format: FileFormat,
    start: u64,
    /// `u64::MAX` reads to the end of the file.
    length: u64,
    /// Values formatted as `CAST(x AS VARCHAR)`, dates as `YYYY-MM-DD`.
    /// `None` is SQL NULL.
    partition_keys: HashMap<String, Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    table_bucket_number: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bucket_conversion: Option<BucketConversion>,
    custom_split_info: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extra_file_info: Option<String>,
    serde_parameters: HashMap<String, String>,
    /// Values for columns like `$file_size`.
    info_columns: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_properties: Option<FileProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    row_id_properties: Option<RowIdProperties>,
}

impl HiveConnectorSplit {
    pub const NAME: &'static str = "HiveConnectorSplit";

    pub fn builder(
        connector_id: impl Into<String>,
        file_path: impl Into<String>,
        file_format: FileFormat,
    ) -> HiveConnectorSplitBuilder {
        HiveConnectorSplitBuilder::new(connector_id, file_path, file_format)
    }

    pub fn connector_id(&self) -> &str {
        &self.connector_id
    }

    pub fn split_weight(&self) -> i64 {
        self.split_weight
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Final component of the file path.
    pub fn file_name(&self) -> &str {
        match self.file_path.rfind('/') {
            Some(idx) => &self.file_path[idx + 1..],
            None => &self.file_path,
        }
    }

    pub fn file_format(&self) -> FileFormat {
        self.file_format
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn reads_to_end(&self) -> bool {
        self.length == u64::MAX
    }

    pub fn partition_keys(&self) -> &HashMap<String, Option<String>> {
        &self.partition_keys
    }

    pub fn table_bucket_number(&self) -> Option<i32> {
        self.table_bucket_number
    }

    pub fn bucket_conversion(&self) -> Option<&BucketConversion> {
        self.bucket_conversion.as_ref()
    }

    pub fn custom_split_info(&self) -> &HashMap<String, String> {
        &self.custom_split_info
    }

    pub fn extra_file_info(&self) -> Option<&str> {
        self.extra_file_info.as_deref()
    }

    pub fn serde_parameters(&self) -> &HashMap<String, String> {
        &self.serde_parameters
    }

    pub fn info_columns(&self) -> &HashMap<String, String> {
        &self.info_columns
    }

    pub fn file_properties(&self) -> Option<&FileProperties> {
        self.file_properties.as_ref()
    }

    pub fn row_id_properties(&self) -> Option<&RowIdProperties> {
        self.row_id_properties.as_ref()
    }

    pub fn bucket_info(&self) -> Option<BucketInfo> {
        self.table_bucket_number.map(|bucket_number| BucketInfo {
            bucket_number,
            partition_bucket_count: self
                .bucket_conversion
                .as_ref()
                .map(|c| c.partition_bucket_count),
        })
    }

    fn validate(&self) -> Result<(), HiveError> {
        if let Some(bucket) = self.table_bucket_number {
            if bucket < 0 {
                return Err(HiveError::BucketNumberOutOfRange { bucket, count: 0 });
            }
        }

        if let Some(conversion) = &self.bucket_conversion {
            let bucket = self
                .table_bucket_number
                .ok_or(HiveError::BucketConversionWithoutBucketNumber)?;
            conversion.validate()?;
            if bucket >= conversion.table_bucket_count {
                return Err(HiveError::BucketNumberOutOfRange {
                    bucket,
                    count: conversion.table_bucket_count,
                });
            }
        }

        Ok(())
    }

    /// Serialize into a structured record. Absent optional fields are omitted
    /// from the record.
    pub fn serialize(&self) -> Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(obj) = &mut value {
            obj.insert(SPLIT_NAME_KEY.to_string(), Value::from(Self::NAME));
        }
        Ok(value)
    }

    /// Reconstruct a split from a record produced by `serialize`.
    pub fn create(value: &Value) -> Result<Self> {
        match value.get(SPLIT_NAME_KEY).and_then(|v| v.as_str()) {
            Some(Self::NAME) => (),
            other => {
                return Err(ConnectorError::MalformedSplit(format!(
                    "expected split name '{}', got {other:?}",
                    Self::NAME
                )));
            }
        }

        let split: HiveConnectorSplit = serde_json::from_value(value.clone())
            .map_err(|e| ConnectorError::MalformedSplit(e.to_string()))?;
        split.validate()?;

        Ok(split)
    }
}

impl fmt::Display for HiveConnectorSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hive: {} {} - {}", self.file_path, self.start, self.length)?;
        if let Some(bucket) = self.table_bucket_number {
            write!(f, " {bucket}")?;
        }
        Ok(())
    }
}

/// Builds a [`HiveConnectorSplit`], validating bucket metadata on `build`.
#[derive(Debug, Clone)]
pub struct HiveConnectorSplitBuilder {
    split: HiveConnectorSplit,
}

impl HiveConnectorSplitBuilder {
    pub fn new(
        connector_id: impl Into<String>,
        file_path: impl Into<String>,
        file_format: FileFormat,
    ) -> Self {
        HiveConnectorSplitBuilder {
            split: HiveConnectorSplit {
                connector_id: connector_id.into(),
                split_weight: 0,
                file_path: file_path.into(),
                file_format,
                start: 0,
                length: u64::MAX,
                partition_keys: HashMap::new(),
                table_bucket_number: None,
                bucket_conversion: None,
                custom_split_info: HashMap::new(),
                extra_file_info: None,
                serde_parameters: HashMap::new(),
                info_columns: HashMap::new(),
                file_properties: None,
                row_id_properties: None,
            },
        }
    }

    pub fn start(mut self, start: u64) -> Self {
        self.split.start = start;
        self
    }

    pub fn length(mut self, length: u64) -> Self {
        self.split.length = length;
        self
    }

    pub fn split_weight(mut self, weight: i64) -> Self {
        self.split.split_weight = weight;
        self
    }

    /// Add a partition key. `None` marks a NULL partition value.
    pub fn partition_key(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.split
            .partition_keys
            .insert(name.into(), value.map(|v| v.to_string()));
        self
    }

    pub fn table_bucket_number(mut self, bucket: i32) -> Self {
        self.split.table_bucket_number = Some(bucket);
        self
    }

    pub fn bucket_conversion(mut self, conversion: BucketConversion) -> Self {
        self.split.bucket_conversion = Some(conversion);
        self
    }

    pub fn custom_split_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.split.custom_split_info.insert(key.into(), value.into());
        self
    }

    pub fn extra_file_info(mut self, info: impl Into<String>) -> Self {
        self.split.extra_file_info = Some(info.into());
        self
    }

    pub fn serde_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.split.serde_parameters.insert(key.into(), value.into());
        self
    }

    pub fn info_column(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.split.info_columns.insert(key.into(), value.into());
        self
    }

    pub fn file_properties(mut self, properties: FileProperties) -> Self {
        self.split.file_properties = Some(properties);
        self
    }

    pub fn row_id_properties(mut self, properties: RowIdProperties) -> Self {
        self.split.row_id_properties = Some(properties);
        self
    }

    pub fn build(self) -> Result<HiveConnectorSplit, HiveError> {
        self.split.validate()?;
        Ok(self.split)
    }
}

use std::fmt;

use datafusion::arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};

/// Column types supported by the hive connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HiveType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Double,
    Varchar,
    Date,
}

impl HiveType {
    pub fn arrow_type(&self) -> DataType {
        match self {
            HiveType::Boolean => DataType::Boolean,
            HiveType::TinyInt => DataType::Int8,
            HiveType::SmallInt => DataType::Int16,
            HiveType::Int => DataType::Int32,
            HiveType::BigInt => DataType::Int64,
            HiveType::Double => DataType::Float64,
            HiveType::Varchar => DataType::Utf8,
            HiveType::Date => DataType::Date32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HiveColumnType {
    /// Column stored in the data file.
    Regular,
    /// Column whose value comes from the split's partition keys.
    PartitionKey,
    /// Column derived from split metadata, e.g. `$path`.
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiveColumnHandle {
    pub name: String,
    pub column_type: HiveColumnType,
    pub hive_type: HiveType,
}

impl HiveColumnHandle {
    pub fn new(name: impl Into<String>, column_type: HiveColumnType, hive_type: HiveType) -> Self {
        HiveColumnHandle {
            name: name.into(),
            column_type,
            hive_type,
        }
    }

    pub fn regular(name: impl Into<String>, hive_type: HiveType) -> Self {
        Self::new(name, HiveColumnType::Regular, hive_type)
    }

    pub fn partition_key(name: impl Into<String>, hive_type: HiveType) -> Self {
        Self::new(name, HiveColumnType::PartitionKey, hive_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiveTableHandle {
    pub connector_id: String,
    pub table_name: String,
}

impl HiveTableHandle {
    pub fn new(connector_id: impl Into<String>, table_name: impl Into<String>) -> Self {
        HiveTableHandle {
            connector_id: connector_id.into(),
            table_name: table_name.into(),
        }
    }
}

impl fmt::Display for HiveTableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hive table: {}", self.table_name)
    }
}

use datafusion::arrow::datatypes::DataType;

#[derive(Debug, thiserror::Error)]
pub enum HiveError {
    #[error("Bucket conversion requires a table bucket number")]
    BucketConversionWithoutBucketNumber,

    #[error(
        "Bucket count {table_bucket_count} not a positive multiple of {partition_bucket_count}"
    )]
    InvalidBucketCounts {
        table_bucket_count: i32,
        partition_bucket_count: i32,
    },

    #[error("Bucket conversion requires at least one bucket column")]
    EmptyBucketColumns,

    #[error("Bucket number {bucket} out of range for bucket count {count}")]
    BucketNumberOutOfRange { bucket: i32, count: i32 },

    #[error("Bucket count {count} exceeds the configured maximum of {max}")]
    BucketCountTooLarge { count: i32, max: i32 },

    #[error("Cannot compute bucket hash for type {0}")]
    UnsupportedBucketType(DataType),

    #[error("Unknown output column: {0}")]
    UnknownOutputColumn(String),

    #[error(
        "Output column '{column}' has type {expected} in the schema but {actual} in its handle"
    )]
    OutputTypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("Split for '{path}' is missing a value for partition key '{column}'")]
    MissingPartitionKey { path: String, column: String },

    #[error("Invalid value '{value}' for partition key '{column}': {reason}")]
    InvalidPartitionValue {
        column: String,
        value: String,
        reason: String,
    },

    #[error("No value for synthesized column '{0}'")]
    MissingSynthesizedColumn(String),

    #[error("Unknown file format: {0}")]
    UnknownFileFormat(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File '{path}' has no column '{column}'")]
    MissingFileColumn { path: String, column: String },

    #[error("File reader task failed: {0}")]
    ReaderTask(String),
}

impl HiveError {
    /// Errors raised when constructing splits or data sources from invalid
    /// input.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            HiveError::BucketConversionWithoutBucketNumber
                | HiveError::InvalidBucketCounts { .. }
                | HiveError::EmptyBucketColumns
                | HiveError::BucketNumberOutOfRange { .. }
                | HiveError::BucketCountTooLarge { .. }
                | HiveError::UnknownOutputColumn(_)
                | HiveError::OutputTypeMismatch { .. }
                | HiveError::MissingPartitionKey { .. }
                | HiveError::InvalidPartitionValue { .. }
        )
    }
}

pub type Result<T, E = HiveError> = std::result::Result<T, E>;

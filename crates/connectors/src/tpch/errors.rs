use datafusion::arrow::datatypes::DataType;

#[derive(Debug, thiserror::Error)]
pub enum TpchError {
    #[error("Scale factor must be a non-negative number, got {0}")]
    InvalidScaleFactor(f64),

    #[error("Unknown tpch table: {0}")]
    UnknownTable(String),

    #[error("Unknown column '{column}' for tpch table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error(
        "Output column '{column}' has type {expected} in the schema but is generated as {actual}"
    )]
    OutputTypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("Invalid row range [{offset}, {end})")]
    InvalidRange { offset: u64, end: u64 },

    #[error("Row range [{offset}, {end}) exceeds row count {row_count} of table '{table}'")]
    RangeOutOfBounds {
        table: String,
        offset: u64,
        end: u64,
        row_count: u64,
    },

    #[error("Invalid part {part} of {total_parts}")]
    InvalidPart { part: u64, total_parts: u64 },
}

pub type Result<T, E = TpchError> = std::result::Result<T, E>;

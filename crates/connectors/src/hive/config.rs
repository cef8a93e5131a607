use crate::config::ConnectorConfig;
use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiveConfig {
    /// Largest bucket count accepted in splits.
    pub max_bucket_count: i32,
    /// Lower-case column names requested from file readers.
    pub file_column_names_read_as_lower_case: bool,
}

impl HiveConfig {
    pub const MAX_BUCKET_COUNT: &'static str = "hive.max-bucket-count";
    pub const FILE_COLUMN_NAMES_READ_AS_LOWER_CASE: &'static str =
        "hive.file-column-names-read-as-lower-case";

    pub fn from_config(config: &ConnectorConfig) -> Result<Self> {
        let defaults = Self::default();
        Ok(HiveConfig {
            max_bucket_count: config.get_or(Self::MAX_BUCKET_COUNT, defaults.max_bucket_count)?,
            file_column_names_read_as_lower_case: config.get_or(
                Self::FILE_COLUMN_NAMES_READ_AS_LOWER_CASE,
                defaults.file_column_names_read_as_lower_case,
            )?,
        })
    }

    /// Apply per-query overrides from session properties. Only reader
    /// behavior may be overridden, bucket limits stay connector wide.
    pub fn with_session(&self, session: &ConnectorConfig) -> Result<Self> {
        Ok(HiveConfig {
            max_bucket_count: self.max_bucket_count,
            file_column_names_read_as_lower_case: session.get_or(
                Self::FILE_COLUMN_NAMES_READ_AS_LOWER_CASE,
                self.file_column_names_read_as_lower_case,
            )?,
        })
    }
}

impl Default for HiveConfig {
    fn default() -> Self {
        HiveConfig {
            max_bucket_count: 100_000,
            file_column_names_read_as_lower_case: false,
        }
    }
}

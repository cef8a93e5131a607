use std::fmt;

use super::errors::{Result, TpchError};
use super::table::TpchTable;

/// A tpch table at a given scale factor.
#[derive(Debug, Clone, PartialEq)]
pub struct TpchTableHandle {
    connector_id: String,
    table: TpchTable,
    scale_factor: f64,
}

impl TpchTableHandle {
    pub fn try_new(
        connector_id: impl Into<String>,
        table: TpchTable,
        scale_factor: f64,
    ) -> Result<Self> {
        if !scale_factor.is_finite() || scale_factor < 0.0 {
            return Err(TpchError::InvalidScaleFactor(scale_factor));
        }
        Ok(TpchTableHandle {
            connector_id: connector_id.into(),
            table,
            scale_factor,
        })
    }

    pub fn connector_id(&self) -> &str {
        &self.connector_id
    }

    pub fn table(&self) -> TpchTable {
        self.table
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Number of logical rows in the table at this scale factor.
    pub fn row_count(&self) -> u64 {
        self.table.row_count(self.scale_factor)
    }
}

impl fmt::Display for TpchTableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tpch table: {} (sf {})", self.table, self.scale_factor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TpchColumnHandle {
    pub name: String,
}

impl TpchColumnHandle {
    pub fn new(name: impl Into<String>) -> Self {
        TpchColumnHandle { name: name.into() }
    }
}

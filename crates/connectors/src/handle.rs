//! Connector scoped table and column identifiers.
use std::fmt;

use crate::hive::handle::{HiveColumnHandle, HiveTableHandle};
use crate::tpch::handle::{TpchColumnHandle, TpchTableHandle};

#[derive(Debug, Clone, PartialEq)]
pub enum TableHandle {
    Hive(HiveTableHandle),
    Tpch(TpchTableHandle),
}

impl TableHandle {
    pub fn connector_id(&self) -> &str {
        match self {
            TableHandle::Hive(h) => &h.connector_id,
            TableHandle::Tpch(h) => h.connector_id(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TableHandle::Hive(_) => "hive",
            TableHandle::Tpch(_) => "tpch",
        }
    }
}

impl fmt::Display for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableHandle::Hive(h) => write!(f, "{h}"),
            TableHandle::Tpch(h) => write!(f, "{h}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnHandle {
    Hive(HiveColumnHandle),
    Tpch(TpchColumnHandle),
}

impl ColumnHandle {
    pub fn name(&self) -> &str {
        match self {
            ColumnHandle::Hive(h) => &h.name,
            ColumnHandle::Tpch(h) => &h.name,
        }
    }
}

impl From<HiveColumnHandle> for ColumnHandle {
    fn from(value: HiveColumnHandle) -> Self {
        ColumnHandle::Hive(value)
    }
}

impl From<TpchColumnHandle> for ColumnHandle {
    fn from(value: TpchColumnHandle) -> Self {
        ColumnHandle::Tpch(value)
    }
}

//! Tpch table definitions.
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use serde::{Deserialize, Serialize};
use tpchgen::generators::{
    CustomerGenerator,
    OrderGenerator,
    PartGenerator,
    SupplierGenerator,
};

use super::errors::TpchError;

/// Describes a single column in a tpch table.
#[derive(Debug)]
pub struct TpchColumn {
    pub name: &'static str,
    pub datatype: DataType,
}

impl TpchColumn {
    pub const fn new(name: &'static str, datatype: DataType) -> Self {
        TpchColumn { name, datatype }
    }
}

const MONEY: DataType = DataType::Decimal128(15, 2);

const PART_COLUMNS: &[TpchColumn] = &[
    TpchColumn::new("p_partkey", DataType::Int64),
    TpchColumn::new("p_name", DataType::Utf8),
    TpchColumn::new("p_mfgr", DataType::Utf8),
    TpchColumn::new("p_brand", DataType::Utf8),
    TpchColumn::new("p_type", DataType::Utf8),
    TpchColumn::new("p_size", DataType::Int32),
    TpchColumn::new("p_container", DataType::Utf8),
    TpchColumn::new("p_retailprice", MONEY),
    TpchColumn::new("p_comment", DataType::Utf8),
];

const SUPPLIER_COLUMNS: &[TpchColumn] = &[
    TpchColumn::new("s_suppkey", DataType::Int64),
    TpchColumn::new("s_name", DataType::Utf8),
    TpchColumn::new("s_address", DataType::Utf8),
    TpchColumn::new("s_nationkey", DataType::Int32),
    TpchColumn::new("s_phone", DataType::Utf8),
    TpchColumn::new("s_acctbal", MONEY),
    TpchColumn::new("s_comment", DataType::Utf8),
];

const PARTSUPP_COLUMNS: &[TpchColumn] = &[
    TpchColumn::new("ps_partkey", DataType::Int64),
    TpchColumn::new("ps_suppkey", DataType::Int64),
    TpchColumn::new("ps_availqty", DataType::Int32),
    TpchColumn::new("ps_supplycost", MONEY),
    TpchColumn::new("ps_comment", DataType::Utf8),
];

const CUSTOMER_COLUMNS: &[TpchColumn] = &[
    TpchColumn::new("c_custkey", DataType::Int64),
    TpchColumn::new("c_name", DataType::Utf8),
    TpchColumn::new("c_address", DataType::Utf8),
    TpchColumn::new("c_nationkey", DataType::Int32),
    TpchColumn::new("c_phone", DataType::Utf8),
    TpchColumn::new("c_acctbal", MONEY),
    TpchColumn::new("c_mktsegment", DataType::Utf8),
    TpchColumn::new("c_comment", DataType::Utf8),
];

const ORDERS_COLUMNS: &[TpchColumn] = &[
    TpchColumn::new("o_orderkey", DataType::Int64),
    TpchColumn::new("o_custkey", DataType::Int64),
    TpchColumn::new("o_orderstatus", DataType::Utf8),
    TpchColumn::new("o_totalprice", MONEY),
    TpchColumn::new("o_orderdate", DataType::Date32),
    TpchColumn::new("o_orderpriority", DataType::Utf8),
    TpchColumn::new("o_clerk", DataType::Utf8),
    TpchColumn::new("o_shippriority", DataType::Int32),
    TpchColumn::new("o_comment", DataType::Utf8),
];

const LINEITEM_COLUMNS: &[TpchColumn] = &[
    TpchColumn::new("l_orderkey", DataType::Int64),
    TpchColumn::new("l_partkey", DataType::Int64),
    TpchColumn::new("l_suppkey", DataType::Int64),
    TpchColumn::new("l_linenumber", DataType::Int32),
    TpchColumn::new("l_quantity", DataType::Int64),
    TpchColumn::new("l_extendedprice", MONEY),
    TpchColumn::new("l_discount", MONEY),
    TpchColumn::new("l_tax", MONEY),
    TpchColumn::new("l_returnflag", DataType::Utf8),
    TpchColumn::new("l_linestatus", DataType::Utf8),
    TpchColumn::new("l_shipdate", DataType::Date32),
    TpchColumn::new("l_commitdate", DataType::Date32),
    TpchColumn::new("l_receiptdate", DataType::Date32),
    TpchColumn::new("l_shipinstruct", DataType::Utf8),
    TpchColumn::new("l_shipmode", DataType::Utf8),
    TpchColumn::new("l_comment", DataType::Utf8),
];

const NATION_COLUMNS: &[TpchColumn] = &[
    TpchColumn::new("n_nationkey", DataType::Int32),
    TpchColumn::new("n_name", DataType::Utf8),
    TpchColumn::new("n_regionkey", DataType::Int32),
    TpchColumn::new("n_comment", DataType::Utf8),
];

const REGION_COLUMNS: &[TpchColumn] = &[
    TpchColumn::new("r_regionkey", DataType::Int32),
    TpchColumn::new("r_name", DataType::Utf8),
    TpchColumn::new("r_comment", DataType::Utf8),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TpchTable {
    Part,
    Supplier,
    PartSupp,
    Customer,
    Orders,
    LineItem,
    Nation,
    Region,
}

impl TpchTable {
    pub const ALL: [TpchTable; 8] = [
        TpchTable::Part,
        TpchTable::Supplier,
        TpchTable::PartSupp,
        TpchTable::Customer,
        TpchTable::Orders,
        TpchTable::LineItem,
        TpchTable::Nation,
        TpchTable::Region,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TpchTable::Part => "part",
            TpchTable::Supplier => "supplier",
            TpchTable::PartSupp => "partsupp",
            TpchTable::Customer => "customer",
            TpchTable::Orders => "orders",
            TpchTable::LineItem => "lineitem",
            TpchTable::Nation => "nation",
            TpchTable::Region => "region",
        }
    }

    /// Native columns, in generation order.
    pub fn columns(&self) -> &'static [TpchColumn] {
        match self {
            TpchTable::Part => PART_COLUMNS,
            TpchTable::Supplier => SUPPLIER_COLUMNS,
            TpchTable::PartSupp => PARTSUPP_COLUMNS,
            TpchTable::Customer => CUSTOMER_COLUMNS,
            TpchTable::Orders => ORDERS_COLUMNS,
            TpchTable::LineItem => LINEITEM_COLUMNS,
            TpchTable::Nation => NATION_COLUMNS,
            TpchTable::Region => REGION_COLUMNS,
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns().iter().position(|c| c.name == name)
    }

    /// Schema with every native column.
    pub fn schema(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.columns()
                .iter()
                .map(|c| Field::new(c.name, c.datatype.clone(), false))
                .collect::<Vec<_>>(),
        ))
    }

    /// Number of logical rows at the given scale factor.
    ///
    /// A logical lineitem row is one order together with all of its line
    /// items, so lineitem shares the orders row space.
    pub fn row_count(&self, scale_factor: f64) -> u64 {
        self.unit_count(scale_factor, 1, 1) * self.rows_per_unit()
    }

    /// Logical rows covered by `part` when the table is split the way the
    /// generators split it: every part gets `units / total_parts` units and
    /// the last part also gets the remainder.
    pub fn part_range(&self, scale_factor: f64, part: TpchPart) -> Range<u64> {
        let (number, parts) = part.generator_args();
        let start = self.unit_count(scale_factor, 1, parts) * (number as u64 - 1);
        let len = self.unit_count(scale_factor, number, parts);
        let rows_per_unit = self.rows_per_unit();
        (start * rows_per_unit)..((start + len) * rows_per_unit)
    }

    /// Whether the generators can start directly at a part. Nation and region
    /// are always generated whole.
    pub fn partitions_natively(&self) -> bool {
        !matches!(self, TpchTable::Nation | TpchTable::Region)
    }

    /// Logical rows produced per partitioning unit. Partsupp is partitioned by
    /// part.
    fn rows_per_unit(&self) -> u64 {
        match self {
            TpchTable::PartSupp => SUPPLIERS_PER_PART,
            _ => 1,
        }
    }

    /// Partitioning units in 1-based `part` of `parts`.
    fn unit_count(&self, scale_factor: f64, part: i32, parts: i32) -> u64 {
        let count = match self {
            TpchTable::Part | TpchTable::PartSupp => {
                PartGenerator::calculate_row_count(scale_factor, part, parts)
            }
            TpchTable::Supplier => {
                SupplierGenerator::calculate_row_count(scale_factor, part, parts)
            }
            TpchTable::Customer => {
                CustomerGenerator::calculate_row_count(scale_factor, part, parts)
            }
            TpchTable::Orders | TpchTable::LineItem => {
                OrderGenerator::calculate_row_count(scale_factor, part, parts)
            }
            TpchTable::Nation => return fixed_part_count(NATION_ROWS, part, parts),
            TpchTable::Region => return fixed_part_count(REGION_ROWS, part, parts),
        };
        u64::try_from(count).unwrap_or(0)
    }
}

const SUPPLIERS_PER_PART: u64 = 4;
const NATION_ROWS: u64 = 25;
const REGION_ROWS: u64 = 5;

fn fixed_part_count(total: u64, part: i32, parts: i32) -> u64 {
    let parts = parts as u64;
    let count = total / parts;
    if part as u64 == parts {
        count + total % parts
    } else {
        count
    }
}

/// Part `part` of `total_parts`, numbered from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TpchPart {
    part: u32,
    total_parts: u32,
}

impl TpchPart {
    pub fn try_new(part: u64, total_parts: u64) -> Result<Self, TpchError> {
        let invalid = || TpchError::InvalidPart { part, total_parts };
        if total_parts == 0 || total_parts > i32::MAX as u64 || part >= total_parts {
            return Err(invalid());
        }
        Ok(TpchPart {
            part: part as u32,
            total_parts: total_parts as u32,
        })
    }

    pub fn part(&self) -> u32 {
        self.part
    }

    pub fn total_parts(&self) -> u32 {
        self.total_parts
    }

    /// 1-based part number and part count, as taken by the generators.
    pub(crate) fn generator_args(&self) -> (i32, i32) {
        (self.part as i32 + 1, self.total_parts as i32)
    }
}

impl fmt::Display for TpchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TpchTable {
    type Err = TpchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TpchTable::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TpchError::UnknownTable(s.to_string()))
    }
}

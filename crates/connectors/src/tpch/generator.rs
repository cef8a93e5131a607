//! Row generation backed by `tpchgen`.
//!
//! Generators are sequential. A cursor over a generator partition starts
//! directly at it, any other range skips the preceding rows once.
use std::fmt;
use std::iter::Peekable;
use std::ops::Range;
use std::sync::Arc;

use datafusion::arrow::array::{
    ArrayRef,
    Date32Array,
    Decimal128Array,
    Int32Array,
    Int64Array,
    StringArray,
};
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use tpchgen::generators::{
    CustomerGenerator,
    LineItemGenerator,
    NationGenerator,
    OrderGenerator,
    PartGenerator,
    PartSuppGenerator,
    RegionGenerator,
    SupplierGenerator,
};

use super::table::{TpchPart, TpchTable};
use crate::errors::Result;

type ScanFn<R> = fn(&[R]) -> Result<Vec<ArrayRef>>;

trait RowSource: Send {
    /// Discard the next `units` logical rows.
    fn skip(&mut self, units: u64);

    /// Generate rows from at most `max_units` logical rows, and at most
    /// `max_rows` rows in total. Returns the number of logical rows that were
    /// completely emitted alongside every native column.
    fn generate(&mut self, max_units: u64, max_rows: usize) -> Result<(u64, Vec<ArrayRef>)>;
}

/// One row per logical row.
struct Rows<I: Iterator> {
    rows: I,
    buffer: Vec<I::Item>,
    scan: ScanFn<I::Item>,
}

impl<I> RowSource for Rows<I>
where
    I: Iterator + Send,
    I::Item: Send,
{
    fn skip(&mut self, units: u64) {
        let n = usize::try_from(units).unwrap_or(usize::MAX);
        for _ in self.rows.by_ref().take(n) {}
    }

    fn generate(&mut self, max_units: u64, max_rows: usize) -> Result<(u64, Vec<ArrayRef>)> {
        let n = usize::try_from(max_units).unwrap_or(usize::MAX).min(max_rows);
        self.buffer.clear();
        self.buffer.extend(self.rows.by_ref().take(n));
        let columns = (self.scan)(&self.buffer)?;
        Ok((self.buffer.len() as u64, columns))
    }
}

fn boxed<I>(rows: I, scan: ScanFn<I::Item>) -> Box<dyn RowSource>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
    Box::new(Rows {
        rows,
        buffer: Vec::new(),
        scan,
    })
}

/// Line items grouped by order, one order per logical row.
///
/// An order may be spread over several batches. It only counts as emitted
/// once its last line item has been produced.
struct OrderLineItems<I: Iterator> {
    items: Peekable<I>,
    order_key: fn(&I::Item) -> i64,
    /// Order whose remaining line items are next in `items`.
    open_order: Option<i64>,
    buffer: Vec<I::Item>,
    scan: ScanFn<I::Item>,
}

impl<I> RowSource for OrderLineItems<I>
where
    I: Iterator + Send,
    I::Item: Send,
{
    fn skip(&mut self, units: u64) {
        let order_key = self.order_key;
        for _ in 0..units {
            let Some(first) = self.items.next() else {
                break;
            };
            let key = order_key(&first);
            while self.items.next_if(|item| order_key(item) == key).is_some() {}
        }
        self.open_order = None;
    }

    fn generate(&mut self, max_units: u64, max_rows: usize) -> Result<(u64, Vec<ArrayRef>)> {
        let order_key = self.order_key;
        self.buffer.clear();

        let mut completed = 0;
        while self.buffer.len() < max_rows {
            if self.open_order.is_none() && completed >= max_units {
                break;
            }
            let Some(item) = self.items.next() else {
                break;
            };
            let key = order_key(&item);
            self.buffer.push(item);

            if self.items.peek().is_some_and(|next| order_key(next) == key) {
                self.open_order = Some(key);
            } else {
                self.open_order = None;
                completed += 1;
            }
        }

        let columns = (self.scan)(&self.buffer)?;
        Ok((completed, columns))
    }
}

fn int32<R>(rows: &[R], f: impl Fn(&R) -> i32) -> ArrayRef {
    Arc::new(Int32Array::from_iter_values(rows.iter().map(f)))
}

fn int64<R>(rows: &[R], f: impl Fn(&R) -> i64) -> ArrayRef {
    Arc::new(Int64Array::from_iter_values(rows.iter().map(f)))
}

fn utf8<R>(rows: &[R], f: impl Fn(&R) -> String) -> ArrayRef {
    Arc::new(StringArray::from_iter_values(rows.iter().map(f)))
}

/// Decimals are generated as hundredths.
fn money<R>(rows: &[R], f: impl Fn(&R) -> i64) -> Result<ArrayRef> {
    let values = Decimal128Array::from_iter_values(rows.iter().map(|r| i128::from(f(r))));
    Ok(Arc::new(values.with_precision_and_scale(15, 2)?))
}

/// Dates as days since the unix epoch.
fn date<R>(rows: &[R], f: impl Fn(&R) -> i32) -> ArrayRef {
    Arc::new(Date32Array::from_iter_values(rows.iter().map(f)))
}

/// Row source for the table. With a part, generation covers only that part
/// and starts directly at it. Nation and region ignore the part.
fn row_source(table: TpchTable, sf: f64, part: Option<TpchPart>) -> Box<dyn RowSource> {
    let (part, parts) = part.map(|p| p.generator_args()).unwrap_or((1, 1));
    match table {
        TpchTable::Part => boxed(PartGenerator::new(sf, part, parts).iter(), |rows| {
            Ok(vec![
                int64(rows, |r| r.p_partkey),
                utf8(rows, |r| r.p_name.to_string()),
                utf8(rows, |r| r.p_mfgr.to_string()),
                utf8(rows, |r| r.p_brand.to_string()),
                utf8(rows, |r| r.p_type.to_string()),
                int32(rows, |r| r.p_size),
                utf8(rows, |r| r.p_container.to_string()),
                money(rows, |r| r.p_retailprice.0)?,
                utf8(rows, |r| r.p_comment.to_string()),
            ])
        }),
        TpchTable::Supplier => boxed(SupplierGenerator::new(sf, part, parts).iter(), |rows| {
            Ok(vec![
                int64(rows, |r| r.s_suppkey),
                utf8(rows, |r| r.s_name.to_string()),
                utf8(rows, |r| r.s_address.to_string()),
                int32(rows, |r| r.s_nationkey as i32),
                utf8(rows, |r| r.s_phone.to_string()),
                money(rows, |r| r.s_acctbal.0)?,
                utf8(rows, |r| r.s_comment.to_string()),
            ])
        }),
        TpchTable::PartSupp => boxed(PartSuppGenerator::new(sf, part, parts).iter(), |rows| {
            Ok(vec![
                int64(rows, |r| r.ps_partkey),
                int64(rows, |r| r.ps_suppkey),
                int32(rows, |r| r.ps_availqty),
                money(rows, |r| r.ps_supplycost.0)?,
                utf8(rows, |r| r.ps_comment.to_string()),
            ])
        }),
        TpchTable::Customer => boxed(CustomerGenerator::new(sf, part, parts).iter(), |rows| {
            Ok(vec![
                int64(rows, |r| r.c_custkey),
                utf8(rows, |r| r.c_name.to_string()),
                utf8(rows, |r| r.c_address.to_string()),
                int32(rows, |r| r.c_nationkey as i32),
                utf8(rows, |r| r.c_phone.to_string()),
                money(rows, |r| r.c_acctbal.0)?,
                utf8(rows, |r| r.c_mktsegment.to_string()),
                utf8(rows, |r| r.c_comment.to_string()),
            ])
        }),
        TpchTable::Orders => boxed(OrderGenerator::new(sf, part, parts).iter(), |rows| {
            Ok(vec![
                int64(rows, |r| r.o_orderkey),
                int64(rows, |r| r.o_custkey),
                utf8(rows, |r| r.o_orderstatus.to_string()),
                money(rows, |r| r.o_totalprice.0)?,
                date(rows, |r| r.o_orderdate.to_unix_epoch()),
                utf8(rows, |r| r.o_orderpriority.to_string()),
                utf8(rows, |r| r.o_clerk.to_string()),
                int32(rows, |r| r.o_shippriority),
                utf8(rows, |r| r.o_comment.to_string()),
            ])
        }),
        TpchTable::LineItem => Box::new(OrderLineItems {
            items: LineItemGenerator::new(sf, part, parts).iter().peekable(),
            order_key: |item| item.l_orderkey,
            open_order: None,
            buffer: Vec::new(),
            scan: |rows| {
                Ok(vec![
                    int64(rows, |r| r.l_orderkey),
                    int64(rows, |r| r.l_partkey),
                    int64(rows, |r| r.l_suppkey),
                    int32(rows, |r| r.l_linenumber),
                    int64(rows, |r| r.l_quantity),
                    money(rows, |r| r.l_extendedprice.0)?,
                    money(rows, |r| r.l_discount.0)?,
                    money(rows, |r| r.l_tax.0)?,
                    utf8(rows, |r| r.l_returnflag.to_string()),
                    utf8(rows, |r| r.l_linestatus.to_string()),
                    date(rows, |r| r.l_shipdate.to_unix_epoch()),
                    date(rows, |r| r.l_commitdate.to_unix_epoch()),
                    date(rows, |r| r.l_receiptdate.to_unix_epoch()),
                    utf8(rows, |r| r.l_shipinstruct.to_string()),
                    utf8(rows, |r| r.l_shipmode.to_string()),
                    utf8(rows, |r| r.l_comment.to_string()),
                ])
            },
        }),
        TpchTable::Nation => boxed(NationGenerator::default().iter(), |rows| {
            Ok(vec![
                int32(rows, |r| r.n_nationkey as i32),
                utf8(rows, |r| r.n_name.to_string()),
                int32(rows, |r| r.n_regionkey as i32),
                utf8(rows, |r| r.n_comment.to_string()),
            ])
        }),
        TpchTable::Region => boxed(RegionGenerator::default().iter(), |rows| {
            Ok(vec![
                int32(rows, |r| r.r_regionkey as i32),
                utf8(rows, |r| r.r_name.to_string()),
                utf8(rows, |r| r.r_comment.to_string()),
            ])
        }),
    }
}

/// Produces successive batches of a range of a table's logical rows.
pub struct TableRowCursor {
    table: TpchTable,
    scale_factor: f64,
    position: u64,
    end: u64,
    schema: SchemaRef,
    source: Box<dyn RowSource>,
}

impl TableRowCursor {
    /// Cursor over `rows`, skipping every row before the range.
    pub fn new(table: TpchTable, scale_factor: f64, rows: Range<u64>) -> Self {
        let mut source = row_source(table, scale_factor, None);
        source.skip(rows.start);
        Self::with_source(table, scale_factor, rows, source)
    }

    /// Cursor over one generator partition of the table.
    pub fn for_part(table: TpchTable, scale_factor: f64, part: TpchPart) -> Self {
        let rows = table.part_range(scale_factor, part);
        if !table.partitions_natively() {
            return Self::new(table, scale_factor, rows);
        }
        let source = row_source(table, scale_factor, Some(part));
        Self::with_source(table, scale_factor, rows, source)
    }

    fn with_source(
        table: TpchTable,
        scale_factor: f64,
        rows: Range<u64>,
        source: Box<dyn RowSource>,
    ) -> Self {
        TableRowCursor {
            table,
            scale_factor,
            position: rows.start,
            end: rows.end.max(rows.start),
            schema: table.schema(),
            source,
        }
    }

    /// First logical row not yet completely produced.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Generate up to `max_rows` rows with every native column. Returns
    /// `None` once the range is exhausted.
    ///
    /// For lineitem `max_rows` counts line items. An order may be split
    /// across batches.
    pub fn next_batch(&mut self, max_rows: usize) -> Result<Option<RecordBatch>> {
        if self.position >= self.end {
            return Ok(None);
        }

        let (units, columns) = self.source.generate(self.end - self.position, max_rows.max(1))?;
        let batch = RecordBatch::try_new(self.schema.clone(), columns)?;
        if batch.num_rows() == 0 {
            // Generator ran out before the end of the range.
            self.position = self.end;
            return Ok(None);
        }
        self.position += units;

        Ok(Some(batch))
    }
}

impl fmt::Debug for TableRowCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableRowCursor")
            .field("table", &self.table)
            .field("scale_factor", &self.scale_factor)
            .field("position", &self.position)
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}

/// Generate the logical rows in `rows` with every native column.
pub fn generate(table: TpchTable, scale_factor: f64, rows: Range<u64>) -> Result<RecordBatch> {
    let mut cursor = TableRowCursor::new(table, scale_factor, rows);
    match cursor.next_batch(usize::MAX)? {
        Some(batch) => Ok(batch),
        None => Ok(RecordBatch::new_empty(table.schema())),
    }
}

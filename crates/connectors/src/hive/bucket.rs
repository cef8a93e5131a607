//! Hive compatible bucketing.
//!
//! Hashes must match the ones used when the table was written, so every
//! type follows the Java `hashCode` of the corresponding Hive writable.
use datafusion::arrow::array::{Array, ArrayRef, AsArray, BooleanArray};
use datafusion::arrow::compute::filter_record_batch;
use datafusion::arrow::datatypes::{
    DataType,
    Date32Type,
    Float64Type,
    Int8Type,
    Int16Type,
    Int32Type,
    Int64Type,
};
use datafusion::arrow::record_batch::RecordBatch;

use super::errors::HiveError;
use super::split::BucketConversion;
use crate::errors::Result;

fn hash_i64(v: i64) -> i32 {
    (v ^ ((v as u64) >> 32) as i64) as i32
}

fn hash_bytes(bytes: &[u8]) -> i32 {
    bytes.iter().fold(1_i32, |hash, &b| {
        hash.wrapping_mul(31).wrapping_add(b as i8 as i32)
    })
}

fn hash_f64(v: f64) -> i32 {
    // Java's Double.hashCode, which collapses all NaNs into one.
    let bits = if v.is_nan() {
        0x7ff8000000000000_u64
    } else {
        v.to_bits()
    };
    hash_i64(bits as i64)
}

/// Fold the hash of each value in `array` into `hashes`.
///
/// `hashes[i] = 31 * hashes[i] + hash(array[i])`, with nulls hashing to 0.
pub fn combine_column_hashes(array: &ArrayRef, hashes: &mut [i32]) -> Result<(), HiveError> {
    debug_assert_eq!(array.len(), hashes.len());

    fn fold<F>(array: &dyn Array, hashes: &mut [i32], value_hash: F)
    where
        F: Fn(usize) -> i32,
    {
        for (idx, hash) in hashes.iter_mut().enumerate() {
            let h = if array.is_null(idx) { 0 } else { value_hash(idx) };
            *hash = hash.wrapping_mul(31).wrapping_add(h);
        }
    }

    match array.data_type() {
        DataType::Boolean => {
            let values = array.as_boolean();
            fold(values, hashes, |idx| values.value(idx) as i32)
        }
        DataType::Int8 => {
            let values = array.as_primitive::<Int8Type>();
            fold(values, hashes, |idx| values.value(idx) as i32)
        }
        DataType::Int16 => {
            let values = array.as_primitive::<Int16Type>();
            fold(values, hashes, |idx| values.value(idx) as i32)
        }
        DataType::Int32 => {
            let values = array.as_primitive::<Int32Type>();
            fold(values, hashes, |idx| values.value(idx))
        }
        DataType::Int64 => {
            let values = array.as_primitive::<Int64Type>();
            fold(values, hashes, |idx| hash_i64(values.value(idx)))
        }
        DataType::Float64 => {
            let values = array.as_primitive::<Float64Type>();
            fold(values, hashes, |idx| hash_f64(values.value(idx)))
        }
        DataType::Date32 => {
            let values = array.as_primitive::<Date32Type>();
            fold(values, hashes, |idx| values.value(idx))
        }
        DataType::Utf8 => {
            let values = array.as_string::<i32>();
            fold(values, hashes, |idx| hash_bytes(values.value(idx).as_bytes()))
        }
        other => return Err(HiveError::UnsupportedBucketType(other.clone())),
    }

    Ok(())
}

/// Map a combined row hash to a bucket.
pub fn bucket_for_hash(hash: i32, bucket_count: i32) -> i32 {
    (hash & i32::MAX) % bucket_count
}

/// Computes hive bucket numbers for rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HivePartitionFunction {
    bucket_count: i32,
}

impl HivePartitionFunction {
    pub fn try_new(bucket_count: i32) -> Result<Self, HiveError> {
        if bucket_count <= 0 {
            return Err(HiveError::BucketNumberOutOfRange {
                bucket: 0,
                count: bucket_count,
            });
        }
        Ok(HivePartitionFunction { bucket_count })
    }

    pub fn bucket_count(&self) -> i32 {
        self.bucket_count
    }

    /// Compute the bucket of every row using the given bucketing columns, in
    /// table bucketing order.
    pub fn partition(&self, columns: &[ArrayRef], num_rows: usize) -> Result<Vec<i32>, HiveError> {
        let mut hashes = vec![0; num_rows];
        for column in columns {
            combine_column_hashes(column, &mut hashes)?;
        }
        Ok(hashes
            .into_iter()
            .map(|h| bucket_for_hash(h, self.bucket_count))
            .collect())
    }
}

/// Drops rows that don't belong to the split's bucket under the table's
/// current bucket count.
#[derive(Debug, Clone)]
pub struct BucketConversionFilter {
    function: HivePartitionFunction,
    bucket_number: i32,
    columns: Vec<String>,
}

impl BucketConversionFilter {
    pub fn try_new(conversion: &BucketConversion, bucket_number: i32) -> Result<Self, HiveError> {
        conversion.validate()?;
        Ok(BucketConversionFilter {
            function: HivePartitionFunction::try_new(conversion.table_bucket_count)?,
            bucket_number,
            columns: conversion
                .bucket_column_handles
                .iter()
                .map(|c| c.name.clone())
                .collect(),
        })
    }

    /// Names of the columns that need to be read for the filter.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let columns = self
            .columns
            .iter()
            .map(|name| Ok(batch.column(batch.schema_ref().index_of(name)?).clone()))
            .collect::<Result<Vec<_>>>()?;

        let buckets = self.function.partition(&columns, batch.num_rows())?;
        let mask: BooleanArray = buckets
            .into_iter()
            .map(|b| Some(b == self.bucket_number))
            .collect();

        Ok(filter_record_batch(batch, &mask)?)
    }
}

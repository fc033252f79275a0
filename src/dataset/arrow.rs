use anyhow::{anyhow, bail, Result};
use arrow::{
    array::{Array, ArrayRef, Float64Array, StringArray, TimestampMicrosecondArray},
    datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use chrono::DateTime;
use std::sync::Arc;

use super::{ColumnType, Dataset, Value};

/// Map a cell type onto its Arrow storage type.
///
/// - Text   → Utf8
/// - Number → Float64
/// - Date   → Timestamp(µs, no zone)
pub fn map_to_arrow_type(ty: ColumnType) -> DataType {
    match ty {
        ColumnType::Text => DataType::Utf8,
        ColumnType::Number => DataType::Float64,
        ColumnType::Date => DataType::Timestamp(TimeUnit::Microsecond, None),
    }
}

/// Build the Arrow schema of a dataset. Columns with no present cell are Utf8.
pub fn build_arrow_schema(ds: &Dataset) -> Result<SchemaRef> {
    let fields = ds
        .columns
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let ty = ds
                .column_type(j)
                .map_err(|row| anyhow!("column `{}` mixes cell types (row {})", name, row))?
                .unwrap_or(ColumnType::Text);
            Ok(Field::new(name, map_to_arrow_type(ty), true))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(Schema::new(fields)))
}

/// Convert a dataset into a single record batch.
pub fn to_record_batch(ds: &Dataset) -> Result<RecordBatch> {
    let schema = build_arrow_schema(ds)?;
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(ds.num_columns());

    for (j, field) in schema.fields().iter().enumerate() {
        let array: ArrayRef = match field.data_type() {
            DataType::Float64 => Arc::new(Float64Array::from(
                ds.column(j)
                    .map(|v| match v {
                        Value::Number(n) => Some(*n),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
            DataType::Timestamp(TimeUnit::Microsecond, _) => {
                Arc::new(TimestampMicrosecondArray::from(
                    ds.column(j)
                        .map(|v| match v {
                            Value::Date(d) => Some(d.and_utc().timestamp_micros()),
                            _ => None,
                        })
                        .collect::<Vec<_>>(),
                ))
            }
            _ => Arc::new(StringArray::from(
                ds.column(j)
                    .map(|v| match v {
                        Value::Text(s) => Some(s.clone()),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
        };
        arrays.push(array);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(ds.num_rows()));
    Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
}

/// Rebuild a dataset from a schema and the batches read under it.
pub fn from_record_batches(schema: &Schema, batches: &[RecordBatch]) -> Result<Dataset> {
    let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
    let mut rows: Vec<Vec<Value>> = Vec::new();

    for batch in batches {
        if batch.num_columns() != columns.len() {
            bail!(
                "batch has {} columns, schema has {}",
                batch.num_columns(),
                columns.len()
            );
        }
        let start = rows.len();
        rows.extend((0..batch.num_rows()).map(|_| Vec::with_capacity(columns.len())));

        for (j, array) in batch.columns().iter().enumerate() {
            for i in 0..batch.num_rows() {
                rows[start + i].push(cell_at(array, i, &columns[j])?);
            }
        }
    }

    Ok(Dataset { columns, rows })
}

fn cell_at(array: &ArrayRef, i: usize, column: &str) -> Result<Value> {
    if array.is_null(i) {
        return Ok(Value::Missing);
    }
    let value = match array.data_type() {
        DataType::Utf8 => array
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|a| Value::Text(a.value(i).to_string())),
        DataType::Float64 => array
            .as_any()
            .downcast_ref::<Float64Array>()
            .map(|a| Value::Number(a.value(i))),
        DataType::Timestamp(TimeUnit::Microsecond, _) => array
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .and_then(|a| DateTime::from_timestamp_micros(a.value(i)))
            .map(|d| Value::Date(d.naive_utc())),
        other => bail!("column `{}` has unsupported type {:?}", column, other),
    };
    value.ok_or_else(|| anyhow!("column `{}` row {} could not be decoded", column, i))
}

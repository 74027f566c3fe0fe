use super::values::ValueSink;
use super::{ContainerFormat, DecodedFeature};
use crate::core::ElementType;
use crate::error::{PipelineError, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::format::KeyValue;

/// Decode a single-column Parquet file into the requested element type.
///
/// Values are copied batch by batch from the Arrow column into the typed
/// output; no per-value objects are built.
pub(crate) fn decode(url: &str, bytes: Bytes, element_type: ElementType) -> Result<DecodedFeature> {
    let parse_error = |e: parquet::errors::ParquetError| PipelineError::parse(url, ContainerFormat::Parquet, e);

    let byte_len = bytes.len();
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes).map_err(parse_error)?;

    let fields = builder.schema().fields();
    if fields.len() != 1 {
        return Err(PipelineError::data(
            url,
            format!("expected exactly one column, found {}", fields.len()),
        ));
    }
    let column_type = fields[0].data_type().clone();
    check_compatible(&column_type, element_type).map_err(|message| PipelineError::data(url, message))?;

    let file_metadata = builder.metadata().file_metadata();
    let rows = reserve_rows(file_metadata.num_rows(), byte_len);
    let metadata = ColumnMetadata::read(url, file_metadata.key_value_metadata())?;

    let reader = builder.build().map_err(parse_error)?;
    let mut sink = ValueSink::with_capacity(element_type, rows);
    for batch in reader {
        let batch = batch.map_err(|e| PipelineError::parse(url, ContainerFormat::Parquet, e))?;
        append_column(&mut sink, batch.column(0)).map_err(|message| PipelineError::data(url, message))?;
    }

    Ok(DecodedFeature {
        data: sink.finish(),
        unit: metadata.units,
        categories: metadata.categories,
        min: metadata.min,
        max: metadata.max,
    })
}

/// Rows to reserve up front for a footer claiming `claimed` rows.
///
/// The footer is untrusted, so the claim is capped at eight rows per file
/// byte (bit-packed booleans). Better-compressed columns grow the buffer
/// while decoding instead.
pub(crate) fn reserve_rows(claimed: i64, byte_len: usize) -> usize {
    usize::try_from(claimed)
        .unwrap_or(0)
        .min(byte_len.saturating_mul(8))
}

fn check_compatible(column_type: &DataType, element_type: ElementType) -> std::result::Result<(), String> {
    let compatible = match element_type {
        ElementType::F32 => column_type.is_floating() || column_type.is_integer(),
        ElementType::U8 | ElementType::U16 | ElementType::U32 => {
            column_type.is_integer() || *column_type == DataType::Boolean
        }
    };
    if compatible && *column_type != DataType::Float16 {
        Ok(())
    } else {
        Err(format!(
            "column of type {} cannot be read as {}",
            column_type,
            element_type.name()
        ))
    }
}

fn append_column(sink: &mut ValueSink, column: &ArrayRef) -> std::result::Result<(), String> {
    match column.data_type() {
        DataType::Float32 => {
            let values = column.as_primitive::<Float32Type>();
            if values.null_count() == 0 && sink.extend_f32(values.values()) {
                return Ok(());
            }
            append_floats(sink, column.as_ref(), |i| values.value(i) as f64)
        }
        DataType::Float64 => {
            let values = column.as_primitive::<Float64Type>();
            append_floats(sink, column.as_ref(), |i| values.value(i))
        }
        DataType::Int8 => append_integers::<Int8Type>(sink, column),
        DataType::Int16 => append_integers::<Int16Type>(sink, column),
        DataType::Int32 => append_integers::<Int32Type>(sink, column),
        DataType::Int64 => append_integers::<Int64Type>(sink, column),
        DataType::UInt8 => append_integers::<UInt8Type>(sink, column),
        DataType::UInt16 => append_integers::<UInt16Type>(sink, column),
        DataType::UInt32 => append_integers::<UInt32Type>(sink, column),
        DataType::UInt64 => append_integers::<UInt64Type>(sink, column),
        DataType::Boolean => {
            let values = column.as_boolean();
            for i in 0..values.len() {
                if values.is_null(i) {
                    sink.push_missing()?;
                } else {
                    sink.push_bool(values.value(i))?;
                }
            }
            Ok(())
        }
        other => Err(format!("unsupported column type {}", other)),
    }
}

fn append_floats(
    sink: &mut ValueSink,
    column: &dyn Array,
    value: impl Fn(usize) -> f64,
) -> std::result::Result<(), String> {
    for i in 0..column.len() {
        if column.is_null(i) {
            sink.push_missing()?;
        } else {
            sink.push_float(value(i))?;
        }
    }
    Ok(())
}

fn append_integers<T>(sink: &mut ValueSink, column: &ArrayRef) -> std::result::Result<(), String>
where
    T: ArrowPrimitiveType,
    T::Native: Into<i128>,
{
    let values = column.as_primitive::<T>();
    for i in 0..values.len() {
        if values.is_null(i) {
            sink.push_missing()?;
        } else {
            sink.push_integer(values.value(i).into())?;
        }
    }
    Ok(())
}

/// Optional file-level annotations stored as key/value metadata
#[derive(Default)]
struct ColumnMetadata {
    min: Option<f64>,
    max: Option<f64>,
    units: Option<String>,
    categories: Option<Vec<String>>,
}

impl ColumnMetadata {
    fn read(url: &str, entries: Option<&Vec<KeyValue>>) -> Result<Self> {
        let mut metadata = Self::default();
        let bad = |key: &str, value: &str| {
            PipelineError::data(url, format!("metadata entry {key}={value:?} is malformed"))
        };

        for entry in entries.into_iter().flatten() {
            let Some(value) = entry.value.as_deref() else {
                continue;
            };
            match entry.key.as_str() {
                "min" => metadata.min = Some(value.parse().map_err(|_| bad("min", value))?),
                "max" => metadata.max = Some(value.parse().map_err(|_| bad("max", value))?),
                "units" | "unit" => metadata.units = Some(value.to_string()),
                "categories" => {
                    metadata.categories =
                        Some(serde_json::from_str(value).map_err(|_| bad("categories", value))?)
                }
                _ => {}
            }
        }
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_rows_caps_footer_claim() {
        assert_eq!(reserve_rows(i64::MAX, 1024), 8192);
        assert_eq!(reserve_rows(100, 1024), 100);
        assert_eq!(reserve_rows(-5, 1024), 0);
    }
}

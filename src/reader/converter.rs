use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use arrow_array::builder::{
    BinaryBuilder, BooleanBuilder, FixedSizeBinaryBuilder, PrimitiveBuilder, StringBuilder,
    TimestampSecondBuilder,
};
use arrow_array::types::{
    ArrowPrimitiveType, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type,
    UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow_array::{ArrayRef, NullArray};
use arrow_schema::{DataType, TimeUnit};
use chrono::{NaiveDate, NaiveDateTime};

use crate::reader::errors::ConvertError;
use crate::reader::options::ConvertOptions;
use crate::reader::parser::ParsedBlock;
use crate::shared::trie::Trie;

/// Converts one column of a parsed block into a typed array.
///
/// Converters are immutable once built; the column builder replaces the
/// whole converter when the inferred type widens, so a running conversion
/// always sees a consistent snapshot.
pub trait Convert: Send + Sync {
    fn data_type(&self) -> DataType;

    fn convert(&self, block: &ParsedBlock, col_index: usize) -> Result<ArrayRef, ConvertError>;
}

impl std::fmt::Debug for dyn Convert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Convert({:?})", self.data_type())
    }
}

/// Builds the converter for one target type, compiling the option spellings
/// into tries.
pub fn make_converter(
    data_type: &DataType,
    options: &ConvertOptions,
) -> Result<Arc<dyn Convert>, ConvertError> {
    let null_trie = Trie::new(&options.null_values);
    let converter: Arc<dyn Convert> = match data_type {
        DataType::Null => Arc::new(NullConverter { null_trie }),
        DataType::Int8 => numeric::<Int8Type>(data_type, null_trie, options),
        DataType::Int16 => numeric::<Int16Type>(data_type, null_trie, options),
        DataType::Int32 => numeric::<Int32Type>(data_type, null_trie, options),
        DataType::Int64 => numeric::<Int64Type>(data_type, null_trie, options),
        DataType::UInt8 => numeric::<UInt8Type>(data_type, null_trie, options),
        DataType::UInt16 => numeric::<UInt16Type>(data_type, null_trie, options),
        DataType::UInt32 => numeric::<UInt32Type>(data_type, null_trie, options),
        DataType::UInt64 => numeric::<UInt64Type>(data_type, null_trie, options),
        DataType::Float32 => numeric::<Float32Type>(data_type, null_trie, options),
        DataType::Float64 => numeric::<Float64Type>(data_type, null_trie, options),
        DataType::Boolean => Arc::new(BooleanConverter {
            null_trie,
            true_trie: Trie::new(&options.true_values),
            false_trie: Trie::new(&options.false_values),
        }),
        DataType::Timestamp(TimeUnit::Second, None) => {
            Arc::new(TimestampConverter { null_trie })
        }
        DataType::Utf8 => Arc::new(StringConverter {
            null_trie,
            strings_can_be_null: options.strings_can_be_null,
        }),
        DataType::Binary => Arc::new(BinaryConverter {
            null_trie,
            strings_can_be_null: options.strings_can_be_null,
        }),
        DataType::FixedSizeBinary(width) => Arc::new(FixedSizeBinaryConverter { width: *width }),
        other => {
            return Err(ConvertError::NotImplemented {
                type_name: other.to_string(),
            });
        }
    };
    Ok(converter)
}

fn numeric<T>(data_type: &DataType, null_trie: Trie, options: &ConvertOptions) -> Arc<dyn Convert>
where
    T: ArrowPrimitiveType + Send + Sync,
    T::Native: FromStr,
{
    Arc::new(NumericConverter::<T> {
        data_type: data_type.clone(),
        null_trie,
        overpunch: options.is_cobol.then(|| Overpunch {
            pos_values: options.pos_values.clone(),
            neg_values: options.neg_values.clone(),
        }),
        _marker: std::marker::PhantomData,
    })
}

#[inline]
fn is_whitespace(byte: u8) -> bool {
    byte == b' ' || byte == b'\t'
}

/// Trims trailing, then leading ASCII space and tab bytes.
pub(crate) fn trim(mut data: &[u8]) -> &[u8] {
    while let [rest @ .., last] = data {
        if !is_whitespace(*last) {
            break;
        }
        data = rest;
    }
    while let [first, rest @ ..] = data {
        if !is_whitespace(*first) {
            break;
        }
        data = rest;
    }
    data
}

fn invalid(data_type: &DataType, raw: &[u8]) -> ConvertError {
    ConvertError::Invalid {
        type_name: data_type.to_string(),
        value: String::from_utf8_lossy(raw).into_owned(),
    }
}

/// COBOL signed overpunch tables. The positive map is consulted first; the
/// negative map only when it missed.
struct Overpunch {
    pos_values: HashMap<u8, u8>,
    neg_values: HashMap<u8, u8>,
}

impl Overpunch {
    /// Rewrites the raw field into `scratch` with the trailing overpunch
    /// byte replaced (and a sign prepended for the negative map). Returns
    /// false when the last byte is in neither map.
    fn decode(&self, raw: &[u8], scratch: &mut Vec<u8>) -> bool {
        let Some(&last) = raw.last() else {
            return false;
        };
        let (digit, negative) = if let Some(&digit) = self.pos_values.get(&last) {
            (digit, false)
        } else if let Some(&digit) = self.neg_values.get(&last) {
            (digit, true)
        } else {
            return false;
        };
        scratch.clear();
        if negative {
            scratch.push(b'-');
        }
        scratch.extend_from_slice(raw);
        if let Some(slot) = scratch.last_mut() {
            *slot = digit;
        }
        true
    }
}

/////////////////////////////////////////////////////////////////////////
// Null values

struct NullConverter {
    null_trie: Trie,
}

impl Convert for NullConverter {
    fn data_type(&self) -> DataType {
        DataType::Null
    }

    fn convert(&self, block: &ParsedBlock, col_index: usize) -> Result<ArrayRef, ConvertError> {
        block.visit_column(col_index, |raw| {
            if self.null_trie.contains(trim(raw)) {
                Ok(())
            } else {
                Err(invalid(&DataType::Null, raw))
            }
        })?;
        Ok(Arc::new(NullArray::new(block.num_rows())))
    }
}

/////////////////////////////////////////////////////////////////////////
// Integers and floats

struct NumericConverter<T: ArrowPrimitiveType> {
    data_type: DataType,
    null_trie: Trie,
    overpunch: Option<Overpunch>,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Convert for NumericConverter<T>
where
    T: ArrowPrimitiveType + Send + Sync,
    T::Native: FromStr,
{
    fn data_type(&self) -> DataType {
        self.data_type.clone()
    }

    fn convert(&self, block: &ParsedBlock, col_index: usize) -> Result<ArrayRef, ConvertError> {
        let mut builder = PrimitiveBuilder::<T>::with_capacity(block.num_rows());
        let mut scratch = Vec::new();

        block.visit_column(col_index, |raw| {
            let trimmed = trim(raw);
            if self.null_trie.contains(trimmed) {
                builder.append_null();
                return Ok(());
            }
            // The overpunch byte is positional: it is the last byte of the
            // untrimmed field.
            let digits = match &self.overpunch {
                Some(overpunch) if overpunch.decode(raw, &mut scratch) => trim(&scratch),
                _ => trimmed,
            };
            let value =
                parse_number::<T::Native>(digits).ok_or_else(|| invalid(&self.data_type, raw))?;
            builder.append_value(value);
            Ok(())
        })?;

        Ok(Arc::new(builder.finish()))
    }
}

fn parse_number<N: FromStr>(digits: &[u8]) -> Option<N> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/////////////////////////////////////////////////////////////////////////
// Booleans

struct BooleanConverter {
    null_trie: Trie,
    true_trie: Trie,
    false_trie: Trie,
}

impl Convert for BooleanConverter {
    fn data_type(&self) -> DataType {
        DataType::Boolean
    }

    fn convert(&self, block: &ParsedBlock, col_index: usize) -> Result<ArrayRef, ConvertError> {
        let mut builder = BooleanBuilder::with_capacity(block.num_rows());

        block.visit_column(col_index, |raw| {
            let trimmed = trim(raw);
            if self.null_trie.contains(trimmed) {
                builder.append_null();
            } else if self.true_trie.contains(trimmed) {
                builder.append_value(true);
            } else if self.false_trie.contains(trimmed) {
                builder.append_value(false);
            } else {
                return Err(invalid(&DataType::Boolean, raw));
            }
            Ok(())
        })?;

        Ok(Arc::new(builder.finish()))
    }
}

/////////////////////////////////////////////////////////////////////////
// Timestamps at seconds resolution

struct TimestampConverter {
    null_trie: Trie,
}

impl Convert for TimestampConverter {
    fn data_type(&self) -> DataType {
        DataType::Timestamp(TimeUnit::Second, None)
    }

    fn convert(&self, block: &ParsedBlock, col_index: usize) -> Result<ArrayRef, ConvertError> {
        let mut builder = TimestampSecondBuilder::with_capacity(block.num_rows());

        block.visit_column(col_index, |raw| {
            let trimmed = trim(raw);
            if self.null_trie.contains(trimmed) {
                builder.append_null();
                return Ok(());
            }
            let text = std::str::from_utf8(trimmed)
                .map_err(|_| invalid(&self.data_type(), raw))?;
            let seconds =
                parse_timestamp_seconds(text).ok_or_else(|| invalid(&self.data_type(), raw))?;
            builder.append_value(seconds);
            Ok(())
        })?;

        Ok(Arc::new(builder.finish()))
    }
}

/// ISO-8601 at seconds resolution; no fractional seconds.
fn parse_timestamp_seconds(text: &str) -> Option<i64> {
    if let Ok(datetime) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(datetime.and_utc().timestamp());
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(datetime.and_utc().timestamp());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp());
    }
    None
}

/////////////////////////////////////////////////////////////////////////
// UTF-8 strings

struct StringConverter {
    null_trie: Trie,
    strings_can_be_null: bool,
}

impl Convert for StringConverter {
    fn data_type(&self) -> DataType {
        DataType::Utf8
    }

    fn convert(&self, block: &ParsedBlock, col_index: usize) -> Result<ArrayRef, ConvertError> {
        let mut builder = StringBuilder::with_capacity(block.num_rows(), block.num_bytes());

        block.visit_column(col_index, |raw| {
            let trimmed = trim(raw);
            if self.strings_can_be_null && self.null_trie.contains(trimmed) {
                builder.append_null();
                return Ok(());
            }
            let text = std::str::from_utf8(trimmed)
                .map_err(|_| invalid(&DataType::Utf8, raw))?;
            builder.append_value(text);
            Ok(())
        })?;

        Ok(Arc::new(builder.finish()))
    }
}

/////////////////////////////////////////////////////////////////////////
// Variable-size binary

struct BinaryConverter {
    null_trie: Trie,
    strings_can_be_null: bool,
}

impl Convert for BinaryConverter {
    fn data_type(&self) -> DataType {
        DataType::Binary
    }

    fn convert(&self, block: &ParsedBlock, col_index: usize) -> Result<ArrayRef, ConvertError> {
        let mut builder = BinaryBuilder::with_capacity(block.num_rows(), block.num_bytes());

        block.visit_column::<ConvertError>(col_index, |raw| {
            let trimmed = trim(raw);
            if self.strings_can_be_null && self.null_trie.contains(trimmed) {
                builder.append_null();
            } else {
                builder.append_value(trimmed);
            }
            Ok(())
        })?;

        Ok(Arc::new(builder.finish()))
    }
}

/////////////////////////////////////////////////////////////////////////
// Fixed-size binary

struct FixedSizeBinaryConverter {
    width: i32,
}

impl Convert for FixedSizeBinaryConverter {
    fn data_type(&self) -> DataType {
        DataType::FixedSizeBinary(self.width)
    }

    fn convert(&self, block: &ParsedBlock, col_index: usize) -> Result<ArrayRef, ConvertError> {
        let mut builder = FixedSizeBinaryBuilder::with_capacity(block.num_rows(), self.width);

        // The raw field bytes are the value: no trim, no null spellings.
        block.visit_column(col_index, |raw| {
            if raw.len() != self.width as usize {
                return Err(ConvertError::Invalid {
                    type_name: self.data_type().to_string(),
                    value: format!("got a {}-byte long field", raw.len()),
                });
            }
            builder
                .append_value(raw)
                .map_err(|_| invalid(&self.data_type(), raw))?;
            Ok(())
        })?;

        Ok(Arc::new(builder.finish()))
    }
}

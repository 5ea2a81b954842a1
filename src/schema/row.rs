use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::warn;

use crate::codec::{ByteCursor, TpsEncoding};
use crate::schema::definition::{FieldDefinition, TableDefinition, field_type};
use crate::types::RecordNumber;
use crate::types::error::{Result, TpsError};
use crate::types::value::Value;

/// One decoded data record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub record_number: RecordNumber,
    pub values: Vec<(String, Value)>,
}

impl Row {
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// Decodes the data portion of a record against the table's field list.
///
/// In tolerant mode a field with an unknown type code becomes its raw
/// bytes with a warning; otherwise it fails with `Unsupported`.
pub fn parse_row(
    definition: &TableDefinition,
    record_number: RecordNumber,
    data: &[u8],
    encoding: TpsEncoding,
    tolerant: bool,
) -> Result<Row> {
    let mut values = Vec::with_capacity(definition.fields.len());
    for field in &definition.fields {
        let start = field.offset as usize;
        let end = start + field.length as usize;
        if end > data.len() {
            return Err(TpsError::malformed(
                start as u64,
                format!(
                    "field '{}' spans {start}..{end} in a record of {} bytes",
                    field.name,
                    data.len()
                ),
            ));
        }
        let value = decode_field(field, &data[start..end], encoding, tolerant)?;
        values.push((field.name_without_prefix().to_string(), value));
    }
    Ok(Row {
        record_number,
        values,
    })
}

fn decode_field(
    field: &FieldDefinition,
    data: &[u8],
    encoding: TpsEncoding,
    tolerant: bool,
) -> Result<Value> {
    if field.is_array() {
        let elements = field.elements as usize;
        if data.len() % elements != 0 {
            return Err(TpsError::malformed(
                field.offset as u64,
                format!(
                    "array field '{}' of {} bytes does not divide into {elements} elements",
                    field.name,
                    data.len()
                ),
            ));
        }
        let size = data.len() / elements;
        let mut values = Vec::with_capacity(elements);
        for chunk in data.chunks_exact(size) {
            values.push(decode_scalar(field, chunk, encoding, tolerant)?);
        }
        return Ok(Value::Array(values));
    }
    decode_scalar(field, data, encoding, tolerant)
}

fn expect_len(field: &FieldDefinition, data: &[u8], wanted: usize) -> Result<()> {
    if data.len() != wanted {
        return Err(TpsError::malformed(
            field.offset as u64,
            format!(
                "field '{}' of type {:#04x} is {} bytes, expected {wanted}",
                field.name,
                field.field_type,
                data.len()
            ),
        ));
    }
    Ok(())
}

fn decode_scalar(
    field: &FieldDefinition,
    data: &[u8],
    encoding: TpsEncoding,
    tolerant: bool,
) -> Result<Value> {
    let mut cur = ByteCursor::new(data);
    match field.field_type {
        field_type::BYTE => {
            expect_len(field, data, 1)?;
            Ok(Value::Byte(data[0]))
        }
        field_type::SHORT => {
            expect_len(field, data, 2)?;
            Ok(Value::Short(cur.le_i16()?))
        }
        field_type::USHORT => {
            expect_len(field, data, 2)?;
            Ok(Value::UShort(cur.le_u16()?))
        }
        field_type::DATE => {
            expect_len(field, data, 4)?;
            decode_date(field, cur.le_u32()?)
        }
        field_type::TIME => {
            expect_len(field, data, 4)?;
            decode_time(field, cur.le_u32()?)
        }
        field_type::LONG => {
            expect_len(field, data, 4)?;
            Ok(Value::Long(cur.le_i32()?))
        }
        field_type::ULONG => {
            expect_len(field, data, 4)?;
            Ok(Value::ULong(cur.le_u32()?))
        }
        field_type::FLOAT => {
            expect_len(field, data, 4)?;
            Ok(Value::Float(cur.le_f32()?))
        }
        field_type::DOUBLE => {
            expect_len(field, data, 8)?;
            Ok(Value::Double(cur.le_f64()?))
        }
        field_type::DECIMAL => Ok(Value::Decimal(decode_bcd(data, field.decimal_places))),
        field_type::STRING => Ok(Value::Text(encoding.decode(data))),
        field_type::CSTRING => {
            let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
            Ok(Value::Text(encoding.decode(&data[..end])))
        }
        field_type::PSTRING => {
            let length = cur.le_u8()? as usize;
            Ok(Value::Text(cur.fixed_string(length, encoding)?))
        }
        field_type::GROUP => Ok(Value::Bytes(data.to_vec())),
        code if tolerant => {
            warn!(
                field = %field.name,
                code = format_args!("{code:#04x}"),
                "unsupported field type, keeping raw bytes"
            );
            Ok(Value::Bytes(data.to_vec()))
        }
        code => Err(TpsError::Unsupported {
            code,
            field: field.name.clone(),
        }),
    }
}

/// Dates are packed as 0xYYYYMMDD; all-zero means "no date".
fn decode_date(field: &FieldDefinition, raw: u32) -> Result<Value> {
    if raw == 0 {
        return Ok(Value::Date(None));
    }
    let year = (raw >> 16) as i32;
    let month = (raw >> 8) & 0xFF;
    let day = raw & 0xFF;
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => Ok(Value::Date(Some(date))),
        None => Err(TpsError::malformed(
            field.offset as u64,
            format!("field '{}' holds impossible date {raw:#010x}", field.name),
        )),
    }
}

/// Times carry hours and minutes in the top bytes; the stored sub-minute
/// part is in centiseconds and is not decoded.
fn decode_time(field: &FieldDefinition, raw: u32) -> Result<Value> {
    let hours = (raw & 0x7F00_0000) >> 24;
    let minutes = (raw & 0x00FF_0000) >> 16;
    match NaiveTime::from_hms_opt(hours, minutes, 0) {
        Some(time) => Ok(Value::Time(time)),
        None => Err(TpsError::malformed(
            field.offset as u64,
            format!("field '{}' holds impossible time {raw:#010x}", field.name),
        )),
    }
}

/// Binary coded decimal: every nibble is a decimal digit except the first,
/// which is the sign (non-zero means negative).
pub fn decode_bcd(data: &[u8], decimal_places: u8) -> String {
    let mut digits = String::with_capacity(data.len() * 2);
    for byte in data {
        digits.push_str(&format!("{byte:02x}"));
    }
    let negative = !digits.is_empty() && !digits.starts_with('0');
    let mut digits = if digits.is_empty() {
        String::from("0")
    } else {
        digits.split_off(1)
    };
    let places = decimal_places as usize;
    while digits.len() < places {
        digits.insert(0, '0');
    }
    let split = digits.len() - places;
    let integer = digits[..split].trim_start_matches('0');
    let integer = if integer.is_empty() { "0" } else { integer };
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(integer);
    if places > 0 {
        out.push('.');
        out.push_str(&digits[split..]);
    }
    out
}

use crate::codec::{ByteCursor, TpsEncoding};
use crate::types::error::{Result, TpsError};
use crate::types::value::Value;

pub mod field_type {
    pub const BYTE: u8 = 0x01;
    pub const SHORT: u8 = 0x02;
    pub const USHORT: u8 = 0x03;
    pub const DATE: u8 = 0x04;
    pub const TIME: u8 = 0x05;
    pub const LONG: u8 = 0x06;
    pub const ULONG: u8 = 0x07;
    pub const FLOAT: u8 = 0x08;
    pub const DOUBLE: u8 = 0x09;
    pub const DECIMAL: u8 = 0x0A;
    pub const STRING: u8 = 0x12;
    pub const CSTRING: u8 = 0x13;
    pub const PSTRING: u8 = 0x14;
    pub const GROUP: u8 = 0x16;
}

/// A reassembled table definition: the record layout plus the memo and
/// index declarations that belong to the table.
#[derive(Debug, Clone)]
pub struct TableDefinition {
    pub driver_version: u16,
    pub record_length: u16,
    pub fields: Vec<FieldDefinition>,
    pub memos: Vec<MemoDefinition>,
    pub indexes: Vec<IndexDefinition>,
}

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    /// Raw type code; codes outside `field_type` are kept as-is and only
    /// rejected when a row is decoded.
    pub field_type: u8,
    /// Byte offset of the field inside the record.
    pub offset: u16,
    /// Fully qualified name, `TABLE:FIELD`.
    pub name: String,
    pub elements: u16,
    pub length: u16,
    pub flags: u16,
    pub index: u16,
    // DECIMAL only
    pub decimal_places: u8,
    pub decimal_element_length: u8,
    // string types only
    pub string_length: u16,
    pub string_mask: String,
}

impl FieldDefinition {
    pub fn is_array(&self) -> bool {
        self.elements > 1
    }

    pub fn is_group(&self) -> bool {
        self.field_type == field_type::GROUP
    }

    /// True when this field is a group overlay covering `other`'s bytes.
    pub fn overlays(&self, other: &FieldDefinition) -> bool {
        self.is_group()
            && self.offset <= other.offset
            && self.offset as u32 + self.length as u32
                >= other.offset as u32 + other.length as u32
    }

    /// The name with the `TABLE:` prefix stripped.
    pub fn name_without_prefix(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, rest)) => rest,
            None => &self.name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoDefinition {
    pub external_file: String,
    pub name: String,
    pub length: u16,
    pub flags: u16,
}

impl MemoDefinition {
    /// Text memo as opposed to a binary blob.
    pub fn is_text(&self) -> bool {
        self.flags & 0x04 != 0
    }

    /// Decodes a reassembled memo: text memos are strings in the file
    /// encoding, blobs start with a little-endian length.
    pub fn decode(&self, data: &[u8], encoding: TpsEncoding) -> Result<Value> {
        if self.is_text() {
            return Ok(Value::Text(encoding.decode(data)));
        }
        let mut cur = ByteCursor::new(data);
        let length = cur.le_u32()? as usize;
        Ok(Value::Bytes(cur.take(length)?))
    }
}

#[derive(Debug, Clone)]
pub struct IndexDefinition {
    pub external_file: String,
    pub name: String,
    pub flags: u8,
    /// `(field, field_flag)` pairs making up the key.
    pub key_fields: Vec<(u16, u16)>,
}

impl TableDefinition {
    pub fn parse(data: &[u8], encoding: TpsEncoding) -> Result<TableDefinition> {
        let mut cur = ByteCursor::new(data);
        let driver_version = cur.le_u16()?;
        let record_length = cur.le_u16()?;
        let field_count = cur.le_u16()?;
        let memo_count = cur.le_u16()?;
        let index_count = cur.le_u16()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            fields.push(parse_field(&mut cur, encoding)?);
        }
        let mut memos = Vec::with_capacity(memo_count as usize);
        for _ in 0..memo_count {
            memos.push(parse_memo(&mut cur, encoding)?);
        }
        let mut indexes = Vec::with_capacity(index_count as usize);
        for _ in 0..index_count {
            indexes.push(parse_index(&mut cur, encoding)?);
        }
        Ok(TableDefinition {
            driver_version,
            record_length,
            fields,
            memos,
            indexes,
        })
    }

    /// The fields covered by the group overlay at `group_index`.
    pub fn group_members(&self, group_index: usize) -> Vec<&FieldDefinition> {
        let group = &self.fields[group_index];
        self.fields
            .iter()
            .enumerate()
            .filter(|&(i, f)| i != group_index && group.overlays(f))
            .map(|(_, f)| f)
            .collect()
    }
}

fn parse_field(cur: &mut ByteCursor<'_>, encoding: TpsEncoding) -> Result<FieldDefinition> {
    let field_type = cur.le_u8()?;
    let offset = cur.le_u16()?;
    let name = cur.zero_terminated_string(encoding)?;
    let elements = cur.le_u16()?;
    let length = cur.le_u16()?;
    let flags = cur.le_u16()?;
    let index = cur.le_u16()?;
    let mut field = FieldDefinition {
        field_type,
        offset,
        name,
        elements,
        length,
        flags,
        index,
        decimal_places: 0,
        decimal_element_length: 0,
        string_length: 0,
        string_mask: String::new(),
    };
    match field_type {
        field_type::DECIMAL => {
            field.decimal_places = cur.le_u8()?;
            field.decimal_element_length = cur.le_u8()?;
        }
        field_type::STRING | field_type::CSTRING | field_type::PSTRING => {
            field.string_length = cur.le_u16()?;
            field.string_mask = cur.zero_terminated_string(encoding)?;
            if field.string_mask.is_empty() {
                cur.le_u8()?;
            }
        }
        _ => {}
    }
    Ok(field)
}

/// The external-file name is zero-terminated; when empty, a 0x01 marker
/// byte stands in for the file reference.
fn external_file_name(cur: &mut ByteCursor<'_>, encoding: TpsEncoding) -> Result<String> {
    let name = cur.zero_terminated_string(encoding)?;
    if name.is_empty() {
        let at = cur.file_offset();
        let marker = cur.le_u8()?;
        if marker != 0x01 {
            return Err(TpsError::malformed(
                at,
                format!("expected 0x01 after empty external file name, found {marker:#04x}"),
            ));
        }
    }
    Ok(name)
}

fn parse_memo(cur: &mut ByteCursor<'_>, encoding: TpsEncoding) -> Result<MemoDefinition> {
    let external_file = external_file_name(cur, encoding)?;
    let name = cur.zero_terminated_string(encoding)?;
    let length = cur.le_u16()?;
    let flags = cur.le_u16()?;
    Ok(MemoDefinition {
        external_file,
        name,
        length,
        flags,
    })
}

fn parse_index(cur: &mut ByteCursor<'_>, encoding: TpsEncoding) -> Result<IndexDefinition> {
    let external_file = external_file_name(cur, encoding)?;
    let name = cur.zero_terminated_string(encoding)?;
    let flags = cur.le_u8()?;
    let field_count = cur.le_u16()?;
    let mut key_fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        let field = cur.le_u16()?;
        let field_flag = cur.le_u16()?;
        key_fields.push((field, field_flag));
    }
    Ok(IndexDefinition {
        external_file,
        name,
        flags,
        key_fields,
    })
}

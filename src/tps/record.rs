use crate::codec::{ByteCursor, TpsEncoding};
use crate::types::error::{Result, TpsError};
use crate::types::{FileOffset, RecordNumber, TableNumber};

/// Typed view of a record's header bytes.
///
/// Multi-byte header fields are big-endian, unlike the rest of the file;
/// record numbers sort correctly as raw bytes that way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordHeader {
    Data {
        table: TableNumber,
        record_number: RecordNumber,
    },
    Metadata {
        table: TableNumber,
    },
    TableDefinition {
        table: TableNumber,
        block_index: u16,
    },
    Memo {
        table: TableNumber,
        owning_record: RecordNumber,
        memo_index: u8,
        sequence: u16,
    },
    Index {
        table: TableNumber,
        index_number: u8,
        record_number: RecordNumber,
    },
    TableName {
        table: TableNumber,
        name: String,
    },
}

const TYPE_DATA: u8 = 0xF3;
const TYPE_METADATA: u8 = 0xF6;
const TYPE_TABLE_DEFINITION: u8 = 0xFA;
const TYPE_MEMO: u8 = 0xFC;
const TABLE_NAME_MARKER: u8 = 0xFE;

/// One record, payload owned. `header` is `None` when the header bytes are
/// too short to carry a type.
#[derive(Debug, Clone)]
pub struct TpsRecord {
    pub header: Option<RecordHeader>,
    pub header_length: u16,
    pub payload: Vec<u8>,
}

impl TpsRecord {
    /// The bytes after the typed header.
    pub fn data(&self) -> &[u8] {
        let split = (self.header_length as usize).min(self.payload.len());
        &self.payload[split..]
    }
}

fn classify(
    payload: &[u8],
    header_length: u16,
    file_offset: FileOffset,
) -> Result<Option<RecordHeader>> {
    let header_length = header_length as usize;
    if header_length > payload.len() {
        return Err(TpsError::malformed(
            file_offset,
            format!(
                "header length {header_length} exceeds record of {} bytes",
                payload.len()
            ),
        ));
    }
    // Headers shorter than a table number plus a type byte carry no kind.
    if header_length < 5 {
        return Ok(None);
    }
    if payload[0] == TABLE_NAME_MARKER {
        // Name padded with spaces; the owning table number follows the header.
        let name = TpsEncoding::Latin1
            .decode(&payload[1..header_length])
            .trim_end_matches(' ')
            .to_string();
        let mut cur = ByteCursor::with_base(payload, file_offset);
        cur.jump(header_length)?;
        let table = cur.be_u32()?;
        return Ok(Some(RecordHeader::TableName { table, name }));
    }
    let mut cur = ByteCursor::with_base(payload, file_offset);
    let table = cur.be_u32()?;
    let kind = cur.le_u8()?;
    let header = match kind {
        TYPE_DATA => RecordHeader::Data {
            table,
            record_number: cur.be_u32()?,
        },
        TYPE_METADATA => RecordHeader::Metadata { table },
        TYPE_TABLE_DEFINITION => RecordHeader::TableDefinition {
            table,
            block_index: cur.be_u16()?,
        },
        TYPE_MEMO => RecordHeader::Memo {
            table,
            owning_record: cur.be_u32()?,
            memo_index: cur.le_u8()?,
            sequence: cur.be_u16()?,
        },
        index_number => {
            // Index records keep their record number in the last 4 payload
            // bytes, after the key data.
            if payload.len() < header_length + 4 {
                return Err(TpsError::malformed(
                    file_offset,
                    "index record too short for a record number",
                ));
            }
            let tail = &payload[payload.len() - 4..];
            RecordHeader::Index {
                table,
                index_number,
                record_number: u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]),
            }
        }
    };
    Ok(Some(header))
}

/// Parses the records of one expanded page.
///
/// Each record starts with a flag byte: bit 7 introduces a new record
/// length, bit 6 a new header length, and the low 6 bits give how many
/// bytes to copy from the start of the previous record. The first record
/// must declare both lengths.
pub fn parse_all(
    data: &[u8],
    record_count: u16,
    file_offset: FileOffset,
) -> Result<Vec<TpsRecord>> {
    let mut cur = ByteCursor::with_base(data, file_offset);
    let mut records: Vec<TpsRecord> = Vec::with_capacity(record_count as usize);
    let mut record_length = 0usize;
    let mut header_length = 0usize;
    while records.len() < record_count as usize && cur.remaining() > 1 {
        let at = cur.file_offset();
        let flags = cur.le_u8()?;
        if records.is_empty() && flags & 0xC0 != 0xC0 {
            return Err(TpsError::malformed(
                at,
                format!("first record flag byte {flags:#04x} does not declare both lengths"),
            ));
        }
        if flags & 0x80 != 0 {
            record_length = cur.le_u16()? as usize;
        }
        if flags & 0x40 != 0 {
            header_length = cur.le_u16()? as usize;
        }
        let copy = (flags & 0x3F) as usize;
        if copy > record_length {
            return Err(TpsError::malformed(
                at,
                format!("copy count {copy} exceeds record length {record_length}"),
            ));
        }
        let mut payload = Vec::with_capacity(record_length);
        if copy > 0 {
            let prev = &records
                .last()
                .ok_or_else(|| TpsError::malformed(at, "copy from a non-existent record"))?
                .payload;
            if copy > prev.len() {
                return Err(TpsError::malformed(
                    at,
                    format!("copy count {copy} exceeds previous record of {} bytes", prev.len()),
                ));
            }
            payload.extend_from_slice(&prev[..copy]);
        }
        payload.extend_from_slice(cur.bytes(record_length - copy)?);
        let header = classify(&payload, header_length as u16, at)?;
        records.push(TpsRecord {
            header,
            header_length: header_length as u16,
            payload,
        });
    }
    Ok(records)
}

//! Builders for a small single-table fixture file: table `CON1` with two
//! SHORT fields, one data record and two indexes, laid out the way a real
//! file is (header, one block, self-addressed page, 0xB0 fill).
#![allow(dead_code)]

use topspeed::Key;
use topspeed::recovery::block::generate_sequence_block;

pub const FILE_LEN: usize = 0x600;
pub const TABLE: u32 = 1;

fn w16(data: &mut [u8], at: usize, value: u16) {
    data[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn w32(data: &mut [u8], at: usize, value: u32) {
    data[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// A record as `(payload, header_length)`.
pub type RawRecord = (Vec<u8>, u16);

pub fn table_name_record(name: &str, table: u32) -> RawRecord {
    let mut payload = vec![0xFE];
    payload.extend_from_slice(name.as_bytes());
    let header_length = payload.len() as u16;
    payload.extend_from_slice(&table.to_be_bytes());
    (payload, header_length)
}

pub fn table_definition_record(table: u32, block_index: u16, chunk: &[u8]) -> RawRecord {
    let mut payload = Vec::new();
    payload.extend_from_slice(&table.to_be_bytes());
    payload.push(0xFA);
    payload.extend_from_slice(&block_index.to_be_bytes());
    payload.extend_from_slice(chunk);
    (payload, 7)
}

pub fn data_record(table: u32, record_number: u32, data: &[u8]) -> RawRecord {
    let mut payload = Vec::new();
    payload.extend_from_slice(&table.to_be_bytes());
    payload.push(0xF3);
    payload.extend_from_slice(&record_number.to_be_bytes());
    payload.extend_from_slice(data);
    (payload, 9)
}

pub fn index_record(table: u32, index_number: u8, key: &[u8], record_number: u32) -> RawRecord {
    let mut payload = Vec::new();
    payload.extend_from_slice(&table.to_be_bytes());
    payload.push(index_number);
    payload.extend_from_slice(key);
    payload.extend_from_slice(&record_number.to_be_bytes());
    (payload, 5)
}

pub fn memo_record(
    table: u32,
    owning_record: u32,
    memo_index: u8,
    sequence: u16,
    data: &[u8],
) -> RawRecord {
    let mut payload = Vec::new();
    payload.extend_from_slice(&table.to_be_bytes());
    payload.push(0xFC);
    payload.extend_from_slice(&owning_record.to_be_bytes());
    payload.push(memo_index);
    payload.extend_from_slice(&sequence.to_be_bytes());
    payload.extend_from_slice(data);
    (payload, 12)
}

pub fn metadata_record(table: u32, data: &[u8]) -> RawRecord {
    let mut payload = Vec::new();
    payload.extend_from_slice(&table.to_be_bytes());
    payload.push(0xF6);
    payload.extend_from_slice(data);
    (payload, 5)
}

fn zero_terminated(out: &mut Vec<u8>, text: &str) {
    out.extend_from_slice(text.as_bytes());
    out.push(0);
}

fn short_field(out: &mut Vec<u8>, name: &str, offset: u16) {
    out.push(0x02);
    out.extend_from_slice(&offset.to_le_bytes());
    zero_terminated(out, name);
    out.extend_from_slice(&1u16.to_le_bytes()); // elements
    out.extend_from_slice(&2u16.to_le_bytes()); // length
    out.extend_from_slice(&0u16.to_le_bytes()); // flags
    out.extend_from_slice(&0u16.to_le_bytes()); // index
}

fn index_definition(out: &mut Vec<u8>, name: &str, field: u16) {
    out.push(0); // empty external file name
    out.push(0x01); // marker
    zero_terminated(out, name);
    out.push(0); // flags
    out.extend_from_slice(&1u16.to_le_bytes()); // fields in key
    out.extend_from_slice(&field.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // field flag
}

/// Definition of `CON1`: two SHORT fields, optional memo, two indexes.
pub fn con1_definition(with_memo: bool) -> Vec<u8> {
    let mut def = Vec::new();
    def.extend_from_slice(&1u16.to_le_bytes()); // driver version
    def.extend_from_slice(&4u16.to_le_bytes()); // record length
    def.extend_from_slice(&2u16.to_le_bytes()); // fields
    def.extend_from_slice(&(with_memo as u16).to_le_bytes());
    def.extend_from_slice(&2u16.to_le_bytes()); // indexes
    short_field(&mut def, "CON1:OUDNR", 0);
    short_field(&mut def, "CON1:NEWNR", 2);
    if with_memo {
        def.push(0); // empty external file name
        def.push(0x01); // marker
        zero_terminated(&mut def, "NOTES");
        def.extend_from_slice(&0u16.to_le_bytes()); // length
        def.extend_from_slice(&0x04u16.to_le_bytes()); // text flag
    }
    index_definition(&mut def, "OUDK", 0);
    index_definition(&mut def, "NEWK", 1);
    def
}

/// Frames records into a page payload; every record redeclares both
/// lengths and copies nothing.
fn frame(records: &[RawRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    for (payload, header_length) in records {
        out.push(0xC0);
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(&header_length.to_le_bytes());
        out.extend_from_slice(payload);
    }
    out
}

/// File offset of the ascending-byte sequence block in the fixture.
pub const SEQUENCE_BLOCK_OFFSET: usize = 0x540;

/// A complete file: header, one block area at 0x200..0x600 holding a
/// single page, everything else 0xB0 fill plus one ascending-byte
/// sequence block. The unused page-reference slots carry the end-of-data
/// reference, as written files do.
pub fn build_file(records: &[RawRecord]) -> Vec<u8> {
    let payload = frame(records);
    let page_size = 13 + payload.len();
    assert!(page_size <= 0x100, "fixture page overflows one boundary");

    let mut data = vec![0u8; FILE_LEN];
    data[0x200..].fill(0xB0);

    let sequence = generate_sequence_block(SEQUENCE_BLOCK_OFFSET as u32, 0x7F7E_7D7C);
    for (i, word) in sequence.values.iter().enumerate() {
        let at = SEQUENCE_BLOCK_OFFSET + i * 4;
        data[at..at + 4].copy_from_slice(&word.to_le_bytes());
    }

    w16(&mut data, 4, 0x0200);
    w32(&mut data, 6, FILE_LEN as u32);
    w32(&mut data, 10, FILE_LEN as u32);
    data[14..18].copy_from_slice(b"tOpS");
    data[20..24].copy_from_slice(&2u32.to_be_bytes()); // last issued row
    w32(&mut data, 24, 1); // change count

    let end_ref = ((FILE_LEN - 0x200) >> 8) as u32;
    let starts = 32;
    let ends = 32 + 240;
    w32(&mut data, starts, 0);
    w32(&mut data, ends, end_ref);
    for t in 1..60 {
        w32(&mut data, starts + 4 * t, end_ref);
        w32(&mut data, ends + 4 * t, end_ref);
    }

    w32(&mut data, 0x200, 0x200);
    w16(&mut data, 0x204, page_size as u16);
    w16(&mut data, 0x206, page_size as u16); // stored uncompressed
    w16(&mut data, 0x208, payload.len() as u16);
    w16(&mut data, 0x20A, records.len() as u16);
    data[0x20C] = 0;
    data[0x20D..0x20D + payload.len()].copy_from_slice(&payload);
    data
}

/// The standard fixture: name record, definition split over two chunks,
/// one data record (number 2, values (1, 1)), both index records.
pub fn standard_records() -> Vec<RawRecord> {
    let def = con1_definition(false);
    let split = def.len() / 2;
    vec![
        table_name_record("CON1", TABLE),
        table_definition_record(TABLE, 0, &def[..split]),
        table_definition_record(TABLE, 1, &def[split..]),
        data_record(TABLE, 2, &[1, 0, 1, 0]),
        index_record(TABLE, 0, &[0, 1], 2),
        index_record(TABLE, 1, &[0, 1], 2),
    ]
}

pub fn standard_file() -> Vec<u8> {
    build_file(&standard_records())
}

/// Encrypts a fixture the way the writer would: the whole image, 64
/// bytes at a time.
pub fn encrypt_file(mut data: Vec<u8>, key: &Key) -> Vec<u8> {
    let len = data.len();
    key.encrypt(&mut data, 0, len).unwrap();
    data
}

use topspeed::codec::TpsEncoding;
use topspeed::schema::{MemoDefinition, TableDefinition};
use topspeed::schema::row::parse_row;
use topspeed::tps::TpsFile;
use topspeed::{Key, TpsError, Value};

mod common;

#[test]
fn parses_the_fixture_definition() {
    let def = TableDefinition::parse(&common::con1_definition(false), TpsEncoding::Latin1).unwrap();
    assert_eq!(def.driver_version, 1);
    assert_eq!(def.record_length, 4);
    assert_eq!(def.fields.len(), 2);
    assert_eq!(def.memos.len(), 0);
    assert_eq!(def.indexes.len(), 2);

    assert_eq!(def.fields[0].name, "CON1:OUDNR");
    assert_eq!(def.fields[0].name_without_prefix(), "OUDNR");
    assert_eq!(def.fields[0].offset, 0);
    assert_eq!(def.fields[1].offset, 2);
    assert!(!def.fields[0].is_array());

    assert_eq!(def.indexes[0].name, "OUDK");
    assert_eq!(def.indexes[0].external_file, "");
    assert_eq!(def.indexes[0].key_fields, vec![(0, 0)]);
}

#[test]
fn parses_a_memo_definition() {
    let def = TableDefinition::parse(&common::con1_definition(true), TpsEncoding::Latin1).unwrap();
    assert_eq!(def.memos.len(), 1);
    assert_eq!(def.memos[0].name, "NOTES");
    assert!(def.memos[0].is_text());
}

#[test]
fn bad_external_file_marker_is_malformed() {
    let mut def = common::con1_definition(false);
    // First index definition starts right after the two fields; its empty
    // external-file name is followed by the 0x01 marker.
    let fields_end = 10 + 22 + 22;
    assert_eq!(def[fields_end], 0);
    assert_eq!(def[fields_end + 1], 0x01);
    def[fields_end + 1] = 0x02;
    assert!(matches!(
        TableDefinition::parse(&def, TpsEncoding::Latin1),
        Err(TpsError::Malformed { .. })
    ));
}

#[test]
fn decodes_a_row() {
    let def = TableDefinition::parse(&common::con1_definition(false), TpsEncoding::Latin1).unwrap();
    let row = parse_row(&def, 2, &[1, 0, 255, 255], TpsEncoding::Latin1, false).unwrap();
    assert_eq!(row.record_number, 2);
    assert_eq!(row.value("OUDNR"), Some(&Value::Short(1)));
    assert_eq!(row.value("NEWNR"), Some(&Value::Short(-1)));
}

#[test]
fn short_record_data_is_malformed() {
    let def = TableDefinition::parse(&common::con1_definition(false), TpsEncoding::Latin1).unwrap();
    assert!(matches!(
        parse_row(&def, 1, &[1, 0], TpsEncoding::Latin1, false),
        Err(TpsError::Malformed { .. })
    ));
}

#[test]
fn reads_the_fixture_file_end_to_end() {
    let file = TpsFile::from_bytes(common::standard_file()).unwrap();

    let names = file.table_names().unwrap();
    assert_eq!(names, vec![(common::TABLE, "CON1".to_string())]);

    let defs = file.table_definitions(TpsEncoding::Latin1, false).unwrap();
    assert_eq!(defs.len(), 1);
    let def = &defs[&common::TABLE];
    assert_eq!(def.fields.len(), 2);

    let rows = file
        .rows(common::TABLE, def, TpsEncoding::Latin1, false)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].record_number, 2);
    assert_eq!(rows[0].value("OUDNR"), Some(&Value::Short(1)));
    assert_eq!(rows[0].value("NEWNR"), Some(&Value::Short(1)));

    assert_eq!(file.index_records(common::TABLE, 0).unwrap(), vec![2]);
    assert_eq!(file.index_records(common::TABLE, 1).unwrap(), vec![2]);
}

#[test]
fn encrypted_fixture_decodes_identically() {
    let key = Key::from_password("a");
    let encrypted = common::encrypt_file(common::standard_file(), &key);
    assert_ne!(&encrypted[14..18], b"tOpS");

    let file = TpsFile::from_bytes_with_key(encrypted, &key).unwrap();
    let defs = file.table_definitions(TpsEncoding::Latin1, false).unwrap();
    let rows = file
        .rows(common::TABLE, &defs[&common::TABLE], TpsEncoding::Latin1, false)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value("OUDNR"), Some(&Value::Short(1)));
    assert_eq!(rows[0].value("NEWNR"), Some(&Value::Short(1)));
}

#[test]
fn wrong_password_is_not_a_tps_file() {
    let encrypted = common::encrypt_file(common::standard_file(), &Key::from_password("a"));
    let result = TpsFile::from_bytes_with_key(encrypted, &Key::from_password("b"));
    assert!(matches!(result, Err(TpsError::NotATpsFile { .. })));
}

#[test]
fn memo_parts_are_reassembled_in_sequence_order() {
    let mut records = common::standard_records();
    records.push(common::memo_record(common::TABLE, 2, 0, 0, b"hello "));
    records.push(common::memo_record(common::TABLE, 2, 0, 1, b"world"));
    let file = TpsFile::from_bytes(common::build_file(&records)).unwrap();

    let memos = file.memo_records(common::TABLE, 0, false).unwrap();
    assert_eq!(memos.len(), 1);
    assert_eq!(memos[&2], b"hello world");
}

fn push_field(out: &mut Vec<u8>, field_type: u8, name: &str, offset: u16, length: u16) {
    out.push(field_type);
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    out.extend_from_slice(&1u16.to_le_bytes()); // elements
    out.extend_from_slice(&length.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // flags
    out.extend_from_slice(&0u16.to_le_bytes()); // index
}

#[test]
fn group_overlay_covers_its_fields() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1u16.to_le_bytes()); // driver version
    bytes.extend_from_slice(&4u16.to_le_bytes()); // record length
    bytes.extend_from_slice(&3u16.to_le_bytes()); // fields
    bytes.extend_from_slice(&0u16.to_le_bytes()); // memos
    bytes.extend_from_slice(&0u16.to_le_bytes()); // indexes
    push_field(&mut bytes, 0x16, "CON1:BOTH", 0, 4);
    push_field(&mut bytes, 0x02, "CON1:OUDNR", 0, 2);
    push_field(&mut bytes, 0x02, "CON1:NEWNR", 2, 2);

    let def = TableDefinition::parse(&bytes, TpsEncoding::Latin1).unwrap();
    assert!(def.fields[0].is_group());
    let members = def.group_members(0);
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].name, "CON1:OUDNR");
    // Non-group fields cover nothing.
    assert!(def.group_members(1).is_empty());
}

#[test]
fn memo_values_decode_as_text_or_blob() {
    let def = TableDefinition::parse(&common::con1_definition(true), TpsEncoding::Latin1).unwrap();
    assert_eq!(
        def.memos[0].decode(b"hello", TpsEncoding::Latin1).unwrap(),
        Value::Text("hello".into())
    );

    let blob = MemoDefinition {
        external_file: String::new(),
        name: "BIN".into(),
        length: 0,
        flags: 0,
    };
    let mut data = 3u32.to_le_bytes().to_vec();
    data.extend_from_slice(&[1, 2, 3, 9, 9]);
    assert_eq!(
        blob.decode(&data, TpsEncoding::Latin1).unwrap(),
        Value::Bytes(vec![1, 2, 3])
    );
}

#[test]
fn incomplete_memo_is_dropped_or_fatal() {
    let mut records = common::standard_records();
    records.push(common::memo_record(common::TABLE, 2, 0, 1, b"world"));
    let file = TpsFile::from_bytes(common::build_file(&records)).unwrap();

    assert!(file.memo_records(common::TABLE, 0, true).unwrap().is_empty());
    assert!(matches!(
        file.memo_records(common::TABLE, 0, false),
        Err(TpsError::Incomplete { missing: 0, .. })
    ));
}

#[test]
fn incomplete_definition_is_dropped_or_fatal() {
    let def = common::con1_definition(false);
    let records = vec![
        common::table_name_record("CON1", common::TABLE),
        // Chunk 0 is missing.
        common::table_definition_record(common::TABLE, 1, &def[..10]),
    ];
    let file = TpsFile::from_bytes(common::build_file(&records)).unwrap();

    assert!(file.table_definitions(TpsEncoding::Latin1, true).unwrap().is_empty());
    assert!(matches!(
        file.table_definitions(TpsEncoding::Latin1, false),
        Err(TpsError::Incomplete { missing: 0, .. })
    ));
}

#[test]
fn duplicate_record_numbers_keep_the_first() {
    let mut records = common::standard_records();
    records.push(common::data_record(common::TABLE, 2, &[9, 0, 9, 0]));
    let file = TpsFile::from_bytes(common::build_file(&records)).unwrap();

    let defs = file.table_definitions(TpsEncoding::Latin1, false).unwrap();
    let rows = file
        .rows(common::TABLE, &defs[&common::TABLE], TpsEncoding::Latin1, false)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value("OUDNR"), Some(&Value::Short(1)));
}

#[test]
fn unknown_field_type_strict_and_tolerant() {
    let mut def_bytes = common::con1_definition(false);
    // Field type byte of the first field sits right after the counts.
    assert_eq!(def_bytes[10], 0x02);
    def_bytes[10] = 0x77;
    let def = TableDefinition::parse(&def_bytes, TpsEncoding::Latin1).unwrap();
    assert_eq!(def.fields[0].field_type, 0x77);

    let strict = parse_row(&def, 1, &[1, 0, 2, 0], TpsEncoding::Latin1, false);
    assert!(matches!(strict, Err(TpsError::Unsupported { code: 0x77, .. })));

    let row = parse_row(&def, 1, &[1, 0, 2, 0], TpsEncoding::Latin1, true).unwrap();
    assert_eq!(row.value("OUDNR"), Some(&Value::Bytes(vec![1, 0])));
    assert_eq!(row.value("NEWNR"), Some(&Value::Short(2)));
}

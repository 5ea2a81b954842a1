use topspeed::Key;

fn from_hex(text: &str) -> Vec<u8> {
    text.split_whitespace()
        .map(|b| u8::from_str_radix(b, 16).unwrap())
        .collect()
}

const ENCRYPTED_HEADER: &str = "BC DC 5C 92 90 BC DF B8 B0 5B AF BB A5 F8 30 C5 \
     05 AE FF D0 F0 BF F7 C2 E0 DC FC 57 F7 BF FB 93 \
     A8 54 DA C0 70 6D AD AA 30 E9 BD FA D0 7A FD D4 \
     DD FF FE E1 50 F9 FE C1 E0 D3 77 E3 F5 7A BF F1";

const DECRYPTED_HEADER: &str = "00 00 00 00 00 02 00 c2 05 00 00 c2 05 00 74 4f \
     70 53 00 00 00 00 1a 25 07 00 00 00 05 00 00 00 \
     00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 \
     00 00 00 00 00 00 00 00 05 00 00 00 0c 00 00 00";

#[test]
fn smear_spreads_the_password() {
    let key = Key::smear("a");
    assert_eq!(key.word(0), 0x74229200);
    assert_eq!(key.word(1), 0x78269604);
    assert_eq!(key.word(2), 0x7c2a9a08);
    assert_eq!(key.word(3), 0x802e9e0c);
    assert_eq!(key.word(15), 0x701e8e3c);
}

#[test]
fn one_shuffle() {
    let mut key = Key::smear("a");
    key.shuffle();
    assert_eq!(key.word(0), 0x14a29220);
    assert_eq!(key.word(1), 0x745d8c18);
    assert_eq!(key.word(2), 0x78559430);
    assert_eq!(key.word(3), 0x646d3c48);
}

#[test]
fn two_shuffles_initialize_the_key() {
    let key = Key::from_password("a");
    assert_eq!(key.word(0), 0x7052a480);
    assert_eq!(key.word(1), 0x68dd1890);
    assert_eq!(key.word(2), 0xf1ab48a0);
    assert_eq!(key.word(3), 0x48dcf8a0);
}

#[test]
fn a_third_shuffle_keeps_changing_the_key() {
    let key = Key::from_password("a");
    let mut shuffled = key.clone();
    shuffled.shuffle();
    assert_ne!(shuffled.words(), key.words());
}

#[test]
fn decrypts_a_known_header_block() {
    let key = Key::from_password("a");
    let mut buffer = from_hex(ENCRYPTED_HEADER);
    key.decrypt(&mut buffer, 0, 64).unwrap();
    assert_eq!(buffer, from_hex(DECRYPTED_HEADER));
}

#[test]
fn encrypts_a_known_header_block() {
    let key = Key::from_password("a");
    let mut buffer = from_hex(DECRYPTED_HEADER);
    key.encrypt(&mut buffer, 0, 64).unwrap();
    assert_eq!(buffer, from_hex(ENCRYPTED_HEADER));
}

#[test]
fn identical_blocks_encrypt_identically() {
    let key = Key::from_password("topspeed");
    let mut buffer = vec![0xB0u8; 192];
    let len = buffer.len();
    key.encrypt(&mut buffer, 0, len).unwrap();
    assert_eq!(buffer[0..64], buffer[64..128]);
    assert_eq!(buffer[0..64], buffer[128..192]);
    assert_ne!(&buffer[0..64], &[0xB0u8; 64]);
}

#[test]
fn bulk_round_trip_over_multiple_blocks() {
    let key = Key::from_password("nasigoreng");
    let original: Vec<u8> = (0..=255u8).collect();
    let mut buffer = original.clone();
    key.encrypt(&mut buffer, 64, 128).unwrap();
    assert_eq!(buffer[..64], original[..64]);
    assert_eq!(buffer[192..], original[192..]);
    assert_ne!(buffer[64..192], original[64..192]);
    key.decrypt(&mut buffer, 64, 128).unwrap();
    assert_eq!(buffer, original);
}

#[test]
fn different_passwords_give_different_keys() {
    assert_ne!(
        Key::from_password("a").words(),
        Key::from_password("b").words()
    );
}

/// Single-byte character sets found in TPS files.
///
/// Field names and string columns default to ISO-8859-1; passwords are
/// interpreted as Windows-1258 before key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TpsEncoding {
    #[default]
    Latin1,
    Cp1258,
}

impl TpsEncoding {
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            TpsEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            TpsEncoding::Cp1258 => bytes.iter().map(|&b| cp1258_to_char(b)).collect(),
        }
    }

    /// Encodes to single bytes; characters outside the set become `?`.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TpsEncoding::Latin1 => text
                .chars()
                .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
                .collect(),
            TpsEncoding::Cp1258 => text.chars().map(char_to_cp1258).collect(),
        }
    }
}

// Upper half of Windows-1258 (Vietnamese). Unassigned slots keep their C1
// control code so decode/encode stay inverses.
const CP1258_HIGH: [char; 128] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{008A}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{008E}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{009A}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{009E}', '\u{0178}',
    '\u{00A0}', '\u{00A1}', '\u{00A2}', '\u{00A3}', '\u{00A4}', '\u{00A5}', '\u{00A6}', '\u{00A7}',
    '\u{00A8}', '\u{00A9}', '\u{00AA}', '\u{00AB}', '\u{00AC}', '\u{00AD}', '\u{00AE}', '\u{00AF}',
    '\u{00B0}', '\u{00B1}', '\u{00B2}', '\u{00B3}', '\u{00B4}', '\u{00B5}', '\u{00B6}', '\u{00B7}',
    '\u{00B8}', '\u{00B9}', '\u{00BA}', '\u{00BB}', '\u{00BC}', '\u{00BD}', '\u{00BE}', '\u{00BF}',
    '\u{00C0}', '\u{00C1}', '\u{00C2}', '\u{0102}', '\u{00C4}', '\u{00C5}', '\u{00C6}', '\u{00C7}',
    '\u{00C8}', '\u{00C9}', '\u{00CA}', '\u{00CB}', '\u{0300}', '\u{00CD}', '\u{00CE}', '\u{00CF}',
    '\u{0110}', '\u{00D1}', '\u{0309}', '\u{00D3}', '\u{00D4}', '\u{01A0}', '\u{00D6}', '\u{00D7}',
    '\u{00D8}', '\u{00D9}', '\u{00DA}', '\u{00DB}', '\u{00DC}', '\u{01AF}', '\u{0303}', '\u{00DF}',
    '\u{00E0}', '\u{00E1}', '\u{00E2}', '\u{0103}', '\u{00E4}', '\u{00E5}', '\u{00E6}', '\u{00E7}',
    '\u{00E8}', '\u{00E9}', '\u{00EA}', '\u{00EB}', '\u{0301}', '\u{00ED}', '\u{00EE}', '\u{00EF}',
    '\u{0111}', '\u{00F1}', '\u{0323}', '\u{00F3}', '\u{00F4}', '\u{01A1}', '\u{00F6}', '\u{00F7}',
    '\u{00F8}', '\u{00F9}', '\u{00FA}', '\u{00FB}', '\u{00FC}', '\u{01B0}', '\u{20AB}', '\u{00FF}',
];

fn cp1258_to_char(byte: u8) -> char {
    if byte < 0x80 {
        byte as char
    } else {
        CP1258_HIGH[(byte - 0x80) as usize]
    }
}

fn char_to_cp1258(c: char) -> u8 {
    if (c as u32) < 0x80 {
        return c as u8;
    }
    match CP1258_HIGH.iter().position(|&h| h == c) {
        Some(i) => 0x80 + i as u8,
        None => b'?',
    }
}

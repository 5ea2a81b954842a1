pub mod error;
pub mod value;

// Common type aliases
pub type TableNumber = u32;
pub type RecordNumber = u32;
pub type FileOffset = u64;

// Byte-level constants of the TPS format
pub const HEADER_SIZE: usize = 0x200;
pub const PAGE_BOUNDARY: usize = 0x100;
pub const MAGIC: &[u8; 4] = b"tOpS";
pub const PAGE_REF_COUNT: usize = 60;

pub const CIPHER_BLOCK_SIZE: usize = 64;
pub const KEY_SIZE: usize = 64;
pub const KEY_WORDS: usize = 16;

// Known-plaintext oracle used during key recovery
pub const HEADER_INDEX_END_OFFSET: u32 = 0x1C0;
pub const EMPTY_FILL_BYTE: u8 = 0xB0;
pub const EMPTY_FILL_WORD: u32 = u32::from_le_bytes([EMPTY_FILL_BYTE; 4]);

/// Expands a raw page reference from the header into an absolute file offset.
pub fn ref_to_file_offset(page_ref: u32) -> FileOffset {
    ((page_ref as u64) << 8) + 0x200
}

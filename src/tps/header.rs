use crate::codec::ByteCursor;
use crate::types::error::{Result, TpsError};
use crate::types::{FileOffset, HEADER_SIZE, MAGIC, PAGE_REF_COUNT, ref_to_file_offset};

/// The fixed 512-byte file header.
///
/// Bytes 0..4 are always zero in a valid file and `tOpS` sits at offset 14.
/// The tail holds two arrays of 60 page references describing the block
/// areas of the file; a reference expands to `(ref << 8) + 0x200`.
#[derive(Debug, Clone)]
pub struct TpsHeader {
    pub header_size: u16,
    pub file_length1: u32,
    pub file_length2: u32,
    pub zeros: u16,
    pub last_issued_row: u32,
    pub change_count: u32,
    pub management_page_ref: u32,
    pub page_start: Vec<u32>,
    pub page_end: Vec<u32>,
}

impl TpsHeader {
    pub fn parse(data: &[u8]) -> Result<TpsHeader> {
        if data.len() < HEADER_SIZE {
            return Err(TpsError::NotATpsFile {
                reason: format!("file of {} bytes is shorter than the header", data.len()),
            });
        }
        let mut cur = ByteCursor::new(&data[..HEADER_SIZE]);
        let addr = cur.le_u32()?;
        if addr != 0 {
            return Err(TpsError::NotATpsFile {
                reason: format!("header address is {addr:#x}, expected 0"),
            });
        }
        let header_size = cur.le_u16()?;
        let file_length1 = cur.le_u32()?;
        let file_length2 = cur.le_u32()?;
        let magic = cur.bytes(4)?;
        if magic != MAGIC {
            return Err(TpsError::NotATpsFile {
                reason: format!("bad magic {magic:02x?}"),
            });
        }
        let zeros = cur.le_u16()?;
        let last_issued_row = cur.be_u32()?;
        let change_count = cur.le_u32()?;
        let management_page_ref = cur.le_u32()?;
        let page_start = cur.le_u32_array(PAGE_REF_COUNT)?;
        let page_end = cur.le_u32_array(PAGE_REF_COUNT)?;
        Ok(TpsHeader {
            header_size,
            file_length1,
            file_length2,
            zeros,
            last_issued_row,
            change_count,
            management_page_ref,
            page_start,
            page_end,
        })
    }

    /// Block areas as absolute `(start, end)` offsets.
    ///
    /// The unused tail of the reference arrays holds `start == end == 0x200`
    /// sentinels, and stale entries can point past the end of the file;
    /// both are skipped.
    pub fn block_regions(&self, file_length: u64) -> Vec<(FileOffset, FileOffset)> {
        let mut regions = Vec::new();
        for t in 0..PAGE_REF_COUNT {
            let start = ref_to_file_offset(self.page_start[t]);
            let end = ref_to_file_offset(self.page_end[t]);
            if start == 0x200 && end == 0x200 {
                continue;
            }
            if start >= file_length {
                continue;
            }
            regions.push((start, end));
        }
        regions
    }
}

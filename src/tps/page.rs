use crate::codec::{ByteCursor, rle};
use crate::types::FileOffset;
use crate::types::error::{Result, TpsError};

/// Minimum page size: 6 leading bytes plus the 7-byte inner header.
const PAGE_HEADER_SIZE: u16 = 13;

/// One page inside a block.
///
/// The page knows its own address (the first field repeats the file offset)
/// and carries its payload still in stored form; call [`TpsPage::data`] to
/// get the expanded bytes.
#[derive(Debug, Clone)]
pub struct TpsPage {
    pub file_offset: FileOffset,
    pub addr: u32,
    pub page_size: u16,
    pub uncompressed_size: u16,
    pub uncompressed_size_without_header: u16,
    pub record_count: u16,
    pub flags: u8,
    payload: Vec<u8>,
}

impl TpsPage {
    /// Parses the page at the cursor position and leaves the cursor at the
    /// end of the page body.
    pub fn parse(cur: &mut ByteCursor<'_>) -> Result<TpsPage> {
        let file_offset = cur.file_offset();
        let addr = cur.le_u32()?;
        let page_size = cur.le_u16()?;
        if page_size < PAGE_HEADER_SIZE {
            return Err(TpsError::malformed(
                file_offset,
                format!("page size {page_size} is smaller than the page header"),
            ));
        }
        let mut body = cur.sub(page_size as usize - 6)?;
        let uncompressed_size = body.le_u16()?;
        let uncompressed_size_without_header = body.le_u16()?;
        let record_count = body.le_u16()?;
        let flags = body.le_u8()?;
        let payload = body.remainder().to_vec();
        Ok(TpsPage {
            file_offset,
            addr,
            page_size,
            uncompressed_size,
            uncompressed_size_without_header,
            record_count,
            flags,
            payload,
        })
    }

    /// A page is stored compressed when the sizes disagree; pages with
    /// non-zero flags are never compressed (they are not record containers).
    pub fn is_compressed(&self) -> bool {
        self.page_size != self.uncompressed_size && self.flags == 0
    }

    /// Record-carrying pages have zero flags.
    pub fn holds_records(&self) -> bool {
        self.flags == 0
    }

    /// The page payload with run-length encoding undone.
    pub fn data(&self) -> Result<Vec<u8>> {
        if self.is_compressed() {
            rle::expand(&self.payload, self.file_offset + PAGE_HEADER_SIZE as u64)
        } else {
            Ok(self.payload.clone())
        }
    }
}

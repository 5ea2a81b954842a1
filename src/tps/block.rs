use tracing::warn;

use crate::codec::ByteCursor;
use crate::tps::page::TpsPage;
use crate::types::error::Result;
use crate::types::{FileOffset, PAGE_BOUNDARY};

/// One block area of the file, scanned for pages.
///
/// Pages start on 0x100 boundaries and identify themselves by repeating
/// their own file offset in their first field; boundaries that do not are
/// page interiors or dead space and are stepped over.
#[derive(Debug, Clone)]
pub struct TpsBlock {
    pub start: FileOffset,
    pub end: FileOffset,
    pub pages: Vec<TpsPage>,
}

impl TpsBlock {
    pub fn parse(data: &[u8], start: FileOffset, end: FileOffset) -> Result<TpsBlock> {
        let scan_end = end.min(data.len() as u64);
        let mut pages = Vec::new();
        let mut ofs = start;
        while ofs + 4 <= scan_end {
            let mut cur = ByteCursor::new(data);
            cur.jump(ofs as usize)?;
            let addr = cur.scoped(|c| c.le_u32())?;
            if addr as u64 != ofs {
                ofs += PAGE_BOUNDARY as u64;
                continue;
            }
            let page_size = cur.scoped(|c| {
                c.skip(4)?;
                c.le_u16()
            })?;
            if partially_overwritten(data, ofs, page_size) {
                warn!(offset = format_args!("{ofs:#x}"), "skipping partially overwritten page");
                ofs += PAGE_BOUNDARY as u64;
                continue;
            }
            pages.push(TpsPage::parse(&mut cur)?);
            ofs += round_up_to_boundary(page_size);
        }
        Ok(TpsBlock { start, end, pages })
    }
}

/// A page is partially overwritten when a later write started inside it:
/// some 0x100 boundary within its extent carries that boundary's own
/// offset, meaning a newer page begins there.
fn partially_overwritten(data: &[u8], page_offset: FileOffset, page_size: u16) -> bool {
    let page_end = page_offset + page_size as u64;
    let mut pos = page_offset + PAGE_BOUNDARY as u64;
    while pos < page_end && pos as usize + 4 <= data.len() {
        let p = pos as usize;
        let addr = u32::from_le_bytes([data[p], data[p + 1], data[p + 2], data[p + 3]]);
        if addr as u64 == pos {
            return true;
        }
        pos += PAGE_BOUNDARY as u64;
    }
    false
}

fn round_up_to_boundary(page_size: u16) -> u64 {
    let size = (page_size as u64).max(1);
    size.div_ceil(PAGE_BOUNDARY as u64) * PAGE_BOUNDARY as u64
}

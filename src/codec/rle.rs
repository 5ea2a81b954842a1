use crate::codec::cursor::ByteCursor;
use crate::types::error::{Result, TpsError};

/// Expands a run-length encoded page payload.
///
/// The stream alternates between a literal run (skip count followed by that
/// many bytes) and a repeat run (the last literal byte repeated). Counts
/// above 0x7F continue into a second byte:
/// `count = ((msb << 7) & 0xFF00) + (lsb & 0x7F) + 0x80 * (msb & 1)`.
/// The repeat run is omitted when the literal run consumed the input.
pub fn expand(data: &[u8], file_offset: u64) -> Result<Vec<u8>> {
    let mut cur = ByteCursor::with_base(data, file_offset);
    let mut out = Vec::with_capacity(data.len() * 2);
    loop {
        let mut skip = cur.le_u8()? as usize;
        if skip == 0 {
            return Err(TpsError::malformed(
                cur.file_offset() - 1,
                "RLE skip count of zero",
            ));
        }
        if skip > 0x7F {
            let msb = cur.le_u8()? as usize;
            skip = ((msb << 7) & 0xFF00) + (skip & 0x7F) + 0x80 * (msb & 1);
        }
        out.extend_from_slice(cur.bytes(skip)?);
        if cur.remaining() > 0 {
            // The repeated byte is the last literal one.
            cur.skip(-1)?;
            let value = cur.le_u8()?;
            let mut repeat = cur.le_u8()? as usize;
            if repeat > 0x7F {
                let msb = cur.le_u8()? as usize;
                repeat = ((msb << 7) & 0xFF00) + (repeat & 0x7F) + 0x80 * (msb & 1);
            }
            out.extend(std::iter::repeat_n(value, repeat));
        }
        if cur.remaining() <= 1 {
            break;
        }
    }
    Ok(out)
}

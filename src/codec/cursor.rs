use crate::codec::encoding::TpsEncoding;
use crate::types::error::{Result, TpsError};

/// Bounds-checked reader over a byte region.
///
/// All reads advance the position and fail with `OutOfRange` instead of
/// panicking when they would cross the end of the region. `base` is the
/// absolute file offset of the region start, so errors can point at the
/// real location inside the file.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    base: u64,
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteCursor { data, base: 0, pos: 0 }
    }

    pub fn with_base(data: &'a [u8], base: u64) -> Self {
        ByteCursor { data, base, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Absolute file offset of the current position.
    pub fn file_offset(&self) -> u64 {
        self.base + self.pos as u64
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn jump(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(self.out_of_range(pos, 0));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, delta: isize) -> Result<()> {
        let target = self.pos as isize + delta;
        if target < 0 {
            return Err(self.out_of_range(0, 0));
        }
        self.jump(target as usize)
    }

    /// Runs `f` and restores the position afterwards, whatever `f` did to it.
    pub fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.pos;
        let out = f(self);
        self.pos = saved;
        out
    }

    fn out_of_range(&self, position: usize, wanted: usize) -> TpsError {
        TpsError::OutOfRange {
            position,
            wanted,
            length: self.data.len(),
        }
    }

    pub fn bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(count)
            .ok_or_else(|| self.out_of_range(self.pos, count))?;
        if end > self.data.len() {
            return Err(self.out_of_range(self.pos, count));
        }
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn take(&mut self, count: usize) -> Result<Vec<u8>> {
        Ok(self.bytes(count)?.to_vec())
    }

    /// Remaining bytes without advancing.
    pub fn remainder(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Sub-cursor over the next `count` bytes, keeping absolute offsets.
    pub fn sub(&mut self, count: usize) -> Result<ByteCursor<'a>> {
        let base = self.file_offset();
        Ok(ByteCursor::with_base(self.bytes(count)?, base))
    }

    pub fn le_u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn le_u16(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn le_i16(&mut self) -> Result<i16> {
        Ok(self.le_u16()? as i16)
    }

    pub fn le_u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn le_i32(&mut self) -> Result<i32> {
        Ok(self.le_u32()? as i32)
    }

    pub fn be_u16(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn be_u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn le_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.le_u32()?))
    }

    pub fn le_f64(&mut self) -> Result<f64> {
        let b = self.bytes(8)?;
        Ok(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn le_u32_array(&mut self, count: usize) -> Result<Vec<u32>> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.le_u32()?);
        }
        Ok(out)
    }

    /// Fixed-length string, decoded with `encoding`.
    pub fn fixed_string(&mut self, length: usize, encoding: TpsEncoding) -> Result<String> {
        Ok(encoding.decode(self.bytes(length)?))
    }

    /// Reads up to and including the next 0x00 byte; the terminator is
    /// consumed but not part of the result.
    pub fn zero_terminated_string(&mut self, encoding: TpsEncoding) -> Result<String> {
        let start = self.pos;
        loop {
            if self.le_u8()? == 0 {
                return Ok(encoding.decode(&self.data[start..self.pos - 1]));
            }
        }
    }

    /// Single length byte followed by that many characters.
    pub fn length_prefixed_string(&mut self, encoding: TpsEncoding) -> Result<String> {
        let length = self.le_u8()? as usize;
        self.fixed_string(length, encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_mixed_endianness() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut cur = ByteCursor::new(&data);
        assert_eq!(cur.le_u16().unwrap(), 0x0201);
        assert_eq!(cur.be_u16().unwrap(), 0x0304);
        assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn read_past_end_is_an_error() {
        let data = [0x01];
        let mut cur = ByteCursor::new(&data);
        assert!(matches!(cur.le_u32(), Err(TpsError::OutOfRange { .. })));
    }

    #[test]
    fn scoped_restores_position() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut cur = ByteCursor::new(&data);
        let peeked = cur.scoped(|c| c.le_u32()).unwrap();
        assert_eq!(peeked, 0x0403_0201);
        assert_eq!(cur.position(), 0);
    }

    #[test]
    fn sub_cursor_keeps_file_offsets() {
        let data = [0u8; 16];
        let mut cur = ByteCursor::with_base(&data, 0x200);
        cur.jump(4).unwrap();
        let sub = cur.sub(8).unwrap();
        assert_eq!(sub.file_offset(), 0x204);
        assert_eq!(sub.len(), 8);
        assert_eq!(cur.position(), 12);
    }
}

use std::collections::BTreeMap;

use crate::types::error::{Result, TpsError};
use crate::types::{
    CIPHER_BLOCK_SIZE, EMPTY_FILL_WORD, HEADER_INDEX_END_OFFSET, HEADER_SIZE, KEY_WORDS,
    PAGE_BOUNDARY,
};

/// A 64-byte file block as sixteen little-endian words, tagged with its
/// file offset and whether the words are still ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Block {
    pub offset: u32,
    pub values: [u32; KEY_WORDS],
    pub encrypted: bool,
}

impl Block {
    pub fn new(offset: u32, values: [u32; KEY_WORDS], encrypted: bool) -> Block {
        Block {
            offset,
            values,
            encrypted,
        }
    }

    pub fn from_bytes(offset: u32, bytes: &[u8], encrypted: bool) -> Result<Block> {
        if bytes.len() != CIPHER_BLOCK_SIZE {
            return Err(TpsError::OutOfRange {
                position: offset as usize,
                wanted: CIPHER_BLOCK_SIZE,
                length: bytes.len(),
            });
        }
        let mut values = [0u32; KEY_WORDS];
        for (i, value) in values.iter_mut().enumerate() {
            *value = u32::from_le_bytes([
                bytes[i * 4],
                bytes[i * 4 + 1],
                bytes[i * 4 + 2],
                bytes[i * 4 + 3],
            ]);
        }
        Ok(Block::new(offset, values, encrypted))
    }

    /// Copy with one word replaced.
    pub fn with_value(&self, index: usize, value: u32) -> Block {
        let mut values = self.values;
        values[index] = value;
        Block::new(self.offset, values, self.encrypted)
    }
}

/// Splits a file into its 64-byte blocks; a trailing partial chunk is
/// dropped.
pub fn load_blocks(data: &[u8], encrypted: bool) -> Vec<Block> {
    data.chunks_exact(CIPHER_BLOCK_SIZE)
        .enumerate()
        .map(|(i, chunk)| {
            Block::from_bytes((i * CIPHER_BLOCK_SIZE) as u32, chunk, encrypted)
                .expect("chunks_exact yields 64-byte chunks")
        })
        .collect()
}

/// The known-plaintext pair at the tail of the header.
///
/// The page-end reference array finishes with repetitions of the file's
/// end-of-data reference, so the plaintext of the block at 0x1C0 is that
/// reference in all sixteen words. The reference is derived from the
/// offset of the last whole 64-byte block, which matters for files whose
/// length is not a page multiple.
pub fn header_index_end_blocks(data: &[u8]) -> Result<(Block, Block)> {
    if data.len() < HEADER_SIZE {
        return Err(TpsError::NotATpsFile {
            reason: format!("file of {} bytes is shorter than the header", data.len()),
        });
    }
    let ofs = HEADER_INDEX_END_OFFSET as usize;
    let encrypted = Block::from_bytes(
        HEADER_INDEX_END_OFFSET,
        &data[ofs..ofs + CIPHER_BLOCK_SIZE],
        true,
    )?;
    let last_block = (data.len() / CIPHER_BLOCK_SIZE - 1) * CIPHER_BLOCK_SIZE;
    let reference = ((last_block + PAGE_BOUNDARY - HEADER_SIZE) >> 8) as u32;
    let plaintext = Block::new(HEADER_INDEX_END_OFFSET, [reference; KEY_WORDS], false);
    Ok((encrypted, plaintext))
}

/// Groups blocks with identical contents: first occurrence mapped to its
/// later duplicates. Blocks without duplicates are left out.
pub fn find_identical_blocks(blocks: &[Block]) -> Vec<(Block, Vec<Block>)> {
    let mut groups: BTreeMap<[u32; KEY_WORDS], Vec<&Block>> = BTreeMap::new();
    for block in blocks {
        groups.entry(block.values).or_default().push(block);
    }
    let mut out = Vec::new();
    for members in groups.into_values() {
        if members.len() > 1 {
            let first = members[0].clone();
            let rest = members[1..].iter().map(|b| (*b).clone()).collect();
            out.push((first, rest));
        }
    }
    out.sort_by_key(|(first, _)| first.offset);
    out
}

/// Uninitialized space is filled with 0xB0 bytes.
pub fn is_empty_fill(word: u32) -> bool {
    word == EMPTY_FILL_WORD
}

/// Ascending byte runs `b, b+1, b+2, b+3` starting on a multiple of 4 are
/// the other common fill pattern.
pub fn is_sequence_part(word: u32) -> bool {
    let [b0, b1, b2, b3] = word.to_le_bytes();
    b0 % 4 == 0
        && b1 == b0.wrapping_add(1)
        && b2 == b0.wrapping_add(2)
        && b3 == b0.wrapping_add(3)
}

/// Builds the sequence-fill block that ends in `last_word`; each earlier
/// word is 0x04040404 lower.
pub fn generate_sequence_block(offset: u32, last_word: u32) -> Block {
    let mut values = [0u32; KEY_WORDS];
    values[KEY_WORDS - 1] = last_word;
    for i in (0..KEY_WORDS - 1).rev() {
        values[i] = values[i + 1].wrapping_sub(0x0404_0404);
    }
    Block::new(offset, values, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_block_descends_by_word_steps() {
        let block = generate_sequence_block(0, 0x4342_4140);
        assert_eq!(block.values[15], 0x4342_4140);
        assert_eq!(block.values[14], 0x3F3E_3D3C);
        assert_eq!(block.values[0], 0x0706_0504);
        assert!(block.values.iter().all(|&w| is_sequence_part(w)));
    }

    #[test]
    fn fill_predicates() {
        assert!(is_empty_fill(0xB0B0_B0B0));
        assert!(!is_empty_fill(0xB0B0_B0B1));
        assert!(is_sequence_part(0x0706_0504));
        assert!(!is_sequence_part(0x0706_0503));
        assert!(!is_sequence_part(0x0807_0605));
    }

    #[test]
    fn identical_blocks_are_grouped() {
        let a = Block::new(0, [1; 16], true);
        let b = Block::new(64, [2; 16], true);
        let c = Block::new(128, [1; 16], true);
        let groups = find_identical_blocks(&[a.clone(), b, c.clone()]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, a);
        assert_eq!(groups[0].1, vec![c]);
    }
}

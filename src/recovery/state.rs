use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::ops::RangeInclusive;

use crate::recovery::block::{Block, is_empty_fill, is_sequence_part};
use crate::recovery::partial_key::PartialKey;
use crate::types::KEY_WORDS;
use crate::types::error::{Result, TpsError};

/// One candidate line of a recovery run: the partial key, the header
/// oracle pair tracked through the recovered rounds, and the fill blocks
/// that survived previous reductions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryState {
    key: PartialKey,
    encrypted_header: Block,
    plaintext_header: Block,
    b0b0_blocks: Vec<Block>,
    sequential_blocks: Vec<Block>,
}

impl RecoveryState {
    pub fn new(encrypted_header: Block, plaintext_header: Block) -> RecoveryState {
        RecoveryState {
            key: PartialKey::new(),
            encrypted_header,
            plaintext_header,
            b0b0_blocks: Vec::new(),
            sequential_blocks: Vec::new(),
        }
    }

    pub fn key(&self) -> &PartialKey {
        &self.key
    }

    pub fn encrypted_header(&self) -> &Block {
        &self.encrypted_header
    }

    pub fn plaintext_header(&self) -> &Block {
        &self.plaintext_header
    }

    pub fn b0b0_blocks(&self) -> &[Block] {
        &self.b0b0_blocks
    }

    pub fn sequential_blocks(&self) -> &[Block] {
        &self.sequential_blocks
    }

    /// All ways to fill in the word at `index` whose round is consistent
    /// with the header oracle, each as a successor state.
    ///
    /// The highest index only supports the reverse scan; below it, the
    /// reverse, forward and self scans are combined and deduplicated.
    /// Successors found in reverse carry the partially decrypted
    /// ciphertext; the others carry the partially encrypted plaintext.
    pub fn index_scan(&self, index: usize, range: RangeInclusive<u32>) -> Vec<RecoveryState> {
        let mut seen: BTreeSet<PartialKey> = BTreeSet::new();
        let mut out = Vec::new();
        for found in
            self.key
                .reverse_index_scan(index, &self.encrypted_header, &self.plaintext_header, range.clone())
        {
            if seen.insert(found.clone()) {
                let encrypted = found.partial_decrypt(index, &self.encrypted_header);
                out.push(RecoveryState {
                    key: found,
                    encrypted_header: encrypted,
                    plaintext_header: self.plaintext_header.clone(),
                    b0b0_blocks: self.b0b0_blocks.clone(),
                    sequential_blocks: self.sequential_blocks.clone(),
                });
            }
        }
        if index == KEY_WORDS - 1 {
            return out;
        }
        let forward = self.key.forward_index_scan(
            index,
            &self.encrypted_header,
            &self.plaintext_header,
            range.clone(),
        );
        let selfish =
            self.key
                .self_index_scan(index, &self.encrypted_header, &self.plaintext_header, range);
        for found in forward.into_iter().chain(selfish) {
            if seen.insert(found.clone()) {
                let plaintext = found.partial_encrypt(index, &self.plaintext_header);
                out.push(RecoveryState {
                    key: found,
                    encrypted_header: self.encrypted_header.clone(),
                    plaintext_header: plaintext,
                    b0b0_blocks: self.b0b0_blocks.clone(),
                    sequential_blocks: self.sequential_blocks.clone(),
                });
            }
        }
        out
    }

    /// First reduction, fed with the file blocks each oracle applies to:
    /// `b0b0_candidates` are the duplicated-ciphertext representatives,
    /// `sequence_candidates` the whole file (a sequence block is unique).
    ///
    /// A block votes for this state when undoing the round of `index`
    /// exposes its fill pattern at `index`. The two reductions are
    /// sequenced: the state survives only when each keeps at least one
    /// voter of its own kind, and the voters carry to later reductions.
    pub fn reduce_first(
        &self,
        index: usize,
        b0b0_candidates: &[Block],
        sequence_candidates: &[Block],
    ) -> Option<RecoveryState> {
        let b0b0 = self.filter_blocks(index, b0b0_candidates, is_empty_fill);
        let sequential = self.filter_blocks(index, sequence_candidates, is_sequence_part);
        self.reduced(b0b0, sequential)
    }

    /// Later reductions re-test only the blocks that voted before.
    pub fn reduce_next(&self, index: usize) -> Option<RecoveryState> {
        let b0b0 = self.filter_blocks(index, &self.b0b0_blocks, is_empty_fill);
        let sequential = self.filter_blocks(index, &self.sequential_blocks, is_sequence_part);
        self.reduced(b0b0, sequential)
    }

    fn filter_blocks(
        &self,
        index: usize,
        blocks: &[Block],
        predicate: fn(u32) -> bool,
    ) -> Vec<Block> {
        blocks
            .iter()
            .map(|b| self.key.partial_decrypt(index, b))
            .filter(|b| predicate(b.values[index]))
            .collect()
    }

    fn reduced(&self, b0b0: Vec<Block>, sequential: Vec<Block>) -> Option<RecoveryState> {
        if b0b0.is_empty() || sequential.is_empty() {
            return None;
        }
        Some(RecoveryState {
            key: self.key.clone(),
            encrypted_header: self.encrypted_header.clone(),
            plaintext_header: self.plaintext_header.clone(),
            b0b0_blocks: b0b0,
            sequential_blocks: sequential,
        })
    }

    /// Byte-exact little-endian stream, suitable for checkpoint files.
    pub fn write_to(&self, w: &mut impl Write) -> std::io::Result<()> {
        write_u32(w, KEY_WORDS as u32)?;
        for index in 0..KEY_WORDS {
            w.write_all(&[self.key.is_valid(index) as u8])?;
            write_u32(w, self.key.word(index))?;
        }
        write_block(w, &self.encrypted_header)?;
        write_block(w, &self.plaintext_header)?;
        write_block_list(w, &self.b0b0_blocks)?;
        write_block_list(w, &self.sequential_blocks)
    }

    pub fn read_from(r: &mut impl Read) -> Result<RecoveryState> {
        let count = read_u32(r)? as usize;
        if count != KEY_WORDS {
            return Err(TpsError::malformed(
                0,
                format!("recovery state declares {count} key words"),
            ));
        }
        let mut key = PartialKey::new();
        for index in 0..KEY_WORDS {
            let valid = read_u8(r)? != 0;
            let word = read_u32(r)?;
            if valid {
                key = key.apply(index, word);
            }
        }
        let encrypted_header = read_block(r)?;
        let plaintext_header = read_block(r)?;
        let b0b0_blocks = read_block_list(r)?;
        let sequential_blocks = read_block_list(r)?;
        Ok(RecoveryState {
            key,
            encrypted_header,
            plaintext_header,
            b0b0_blocks,
            sequential_blocks,
        })
    }
}

fn write_u32(w: &mut impl Write, value: u32) -> std::io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

fn write_block(w: &mut impl Write, block: &Block) -> std::io::Result<()> {
    write_u32(w, block.offset)?;
    w.write_all(&[block.encrypted as u8])?;
    write_u32(w, block.values.len() as u32)?;
    for &value in &block.values {
        write_u32(w, value)?;
    }
    Ok(())
}

fn write_block_list(w: &mut impl Write, blocks: &[Block]) -> std::io::Result<()> {
    write_u32(w, blocks.len() as u32)?;
    for block in blocks {
        write_block(w, block)?;
    }
    Ok(())
}

fn read_u8(r: &mut impl Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_block(r: &mut impl Read) -> Result<Block> {
    let offset = read_u32(r)?;
    let encrypted = read_u8(r)? != 0;
    let count = read_u32(r)? as usize;
    if count != KEY_WORDS {
        return Err(TpsError::malformed(
            offset as u64,
            format!("serialized block declares {count} words"),
        ));
    }
    let mut values = [0u32; KEY_WORDS];
    for value in values.iter_mut() {
        *value = read_u32(r)?;
    }
    Ok(Block::new(offset, values, encrypted))
}

fn read_block_list(r: &mut impl Read) -> Result<Vec<Block>> {
    let count = read_u32(r)? as usize;
    let mut out = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        out.push(read_block(r)?);
    }
    Ok(out)
}

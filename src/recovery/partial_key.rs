use std::ops::RangeInclusive;

use crate::crypto::Key;
use crate::recovery::block::Block;
use crate::types::KEY_WORDS;

/// A key under reconstruction: every word is either recovered or still
/// open. All operations are value-producing; scan results share nothing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct PartialKey {
    valid: [bool; KEY_WORDS],
    words: [u32; KEY_WORDS],
}

impl PartialKey {
    pub fn new() -> PartialKey {
        PartialKey::default()
    }

    /// Copy with one more word pinned down.
    pub fn apply(&self, index: usize, value: u32) -> PartialKey {
        let mut next = self.clone();
        next.valid[index] = true;
        next.words[index] = value;
        next
    }

    pub fn is_valid(&self, index: usize) -> bool {
        self.valid[index]
    }

    pub fn word(&self, index: usize) -> u32 {
        self.words[index]
    }

    pub fn is_complete(&self) -> bool {
        self.valid.iter().all(|&v| v)
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Open indices, highest first; recovery works downwards.
    pub fn invalid_indexes(&self) -> Vec<usize> {
        (0..KEY_WORDS).rev().filter(|&i| !self.valid[i]).collect()
    }

    pub fn to_key(&self) -> Option<Key> {
        if self.is_complete() {
            Some(Key::from_words(self.words))
        } else {
            None
        }
    }

    /// Replays the single decryption round of `index` on a block copy.
    /// Only meaningful when the word at `index` is recovered.
    pub fn partial_decrypt(&self, index: usize, block: &Block) -> Block {
        let mut values = block.values;
        let k = self.words[index];
        let j = (k & 0x0F) as usize;
        let x = values[index].wrapping_sub(k);
        let y = values[j].wrapping_sub(k);
        values[index] = (x & k) | (y & !k);
        values[j] = (y & k) | (x & !k);
        Block::new(block.offset, values, block.encrypted)
    }

    /// Replays the single encryption round of `index` on a block copy.
    pub fn partial_encrypt(&self, index: usize, block: &Block) -> Block {
        let mut values = block.values;
        let k = self.words[index];
        let j = (k & 0x0F) as usize;
        let x = values[index];
        let y = values[j];
        values[index] = k.wrapping_add((k & x) | (!k & y));
        values[j] = k.wrapping_add((k & y) | (!k & x));
        Block::new(block.offset, values, block.encrypted)
    }

    /// Tries every candidate in `range` as the word at `index`, undoing
    /// that round on the ciphertext and comparing the word at `index`
    /// against the plaintext. Sound for the highest open index, where no
    /// later round has touched the word yet.
    pub fn reverse_index_scan(
        &self,
        index: usize,
        encrypted: &Block,
        plaintext: &Block,
        range: RangeInclusive<u32>,
    ) -> Vec<PartialKey> {
        let mut found = Vec::new();
        for candidate in candidates(range) {
            let trial = self.apply(index, candidate);
            let decrypted = trial.partial_decrypt(index, encrypted);
            if decrypted.values[index] == plaintext.values[index] {
                found.push(trial);
            }
        }
        found
    }

    /// Forward counterpart: applies the round of `index` to the plaintext
    /// and compares against the ciphertext. Candidates whose swap partner
    /// is at or below `index` are excluded, since a later round would have
    /// overwritten the compared word.
    pub fn forward_index_scan(
        &self,
        index: usize,
        encrypted: &Block,
        plaintext: &Block,
        range: RangeInclusive<u32>,
    ) -> Vec<PartialKey> {
        let mut found = Vec::new();
        for candidate in candidates(range) {
            if (candidate & 0x0F) as usize <= index {
                continue;
            }
            let trial = self.apply(index, candidate);
            let encrypted_trial = trial.partial_encrypt(index, plaintext);
            if encrypted_trial.values[index] == encrypted.values[index] {
                found.push(trial);
            }
        }
        found
    }

    /// Scan restricted to self-swapping candidates, where the round of
    /// `index` degenerates to adding the key word.
    pub fn self_index_scan(
        &self,
        index: usize,
        encrypted: &Block,
        plaintext: &Block,
        range: RangeInclusive<u32>,
    ) -> Vec<PartialKey> {
        let mut found = Vec::new();
        for candidate in candidates(range) {
            if (candidate & 0x0F) as usize != index {
                continue;
            }
            let trial = self.apply(index, candidate);
            let encrypted_trial = trial.partial_encrypt(index, plaintext);
            if encrypted_trial.values[index] == encrypted.values[index] {
                found.push(trial);
            }
        }
        found
    }
}

/// Inclusive u32 range that survives `end == u32::MAX`.
fn candidates(range: RangeInclusive<u32>) -> impl Iterator<Item = u32> {
    let (start, end) = range.into_inner();
    let mut next = Some(start);
    std::iter::from_fn(move || {
        let current = next?;
        next = if current == end { None } else { Some(current + 1) };
        Some(current)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_indexes_descend() {
        let key = PartialKey::new().apply(15, 7).apply(3, 9);
        assert_eq!(key.invalid_indexes().first(), Some(&14));
        assert_eq!(key.invalid_indexes().last(), Some(&0));
        assert_eq!(key.invalid_indexes().len(), 14);
        assert_eq!(key.valid_count(), 2);
    }

    #[test]
    fn partial_rounds_are_inverses() {
        let key = PartialKey::new().apply(12, 0x1234_5678);
        let block = Block::new(0, std::array::from_fn(|i| i as u32 * 3), true);
        let there = key.partial_encrypt(12, &block);
        let back = key.partial_decrypt(12, &there);
        assert_eq!(back, block);
    }

    #[test]
    fn complete_key_converts() {
        let mut partial = PartialKey::new();
        for i in 0..16 {
            assert!(partial.to_key().is_none());
            partial = partial.apply(i, i as u32);
        }
        assert!(partial.to_key().is_some());
    }
}

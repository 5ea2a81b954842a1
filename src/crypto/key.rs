use crate::codec::encoding::TpsEncoding;
use crate::types::error::{Result, TpsError};
use crate::types::{CIPHER_BLOCK_SIZE, KEY_SIZE, KEY_WORDS};

/// Expanded 64-byte cipher key.
///
/// TPS "owner" encryption works on independent 64-byte blocks, viewed as
/// sixteen little-endian words. Each round mixes word `t` with the word at
/// index `key[t] & 0x0F`, so decryption replays the rounds in reverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    words: [u32; KEY_WORDS],
}

impl Key {
    /// Derives the key from an owner password: the password bytes are
    /// smeared over the 64-byte block and the block is shuffled twice.
    pub fn from_password(password: &str) -> Key {
        let mut key = Key::smear(password);
        key.shuffle();
        key.shuffle();
        key
    }

    pub fn from_words(words: [u32; KEY_WORDS]) -> Key {
        Key { words }
    }

    /// The unshuffled key, password bytes smeared over the block. Mostly
    /// useful for verifying derivation stage by stage.
    pub fn smear(password: &str) -> Key {
        let mut seed = TpsEncoding::Cp1258.encode(password);
        seed.push(0);
        let mut block = [0u8; KEY_SIZE];
        for t in 0..KEY_SIZE {
            block[(t * 0x11) & 0x3F] = (t as u8).wrapping_add(seed[(t + 1) % seed.len()]);
        }
        let mut words = [0u32; KEY_WORDS];
        for (i, word) in words.iter_mut().enumerate() {
            *word = u32::from_le_bytes([
                block[i * 4],
                block[i * 4 + 1],
                block[i * 4 + 2],
                block[i * 4 + 3],
            ]);
        }
        Key { words }
    }

    /// One shuffle pass. Both reads happen before either write; when the
    /// partner index equals `t` the second write wins, as the original
    /// implementation does.
    pub fn shuffle(&mut self) {
        for t in 0..KEY_WORDS {
            let a = self.words[t];
            let j = (a & 0x0F) as usize;
            let b = self.words[j];
            self.words[j] = a.wrapping_add(a & b);
            self.words[t] = a.wrapping_add(a | b);
        }
    }

    pub fn word(&self, index: usize) -> u32 {
        self.words[index]
    }

    pub fn words(&self) -> &[u32; KEY_WORDS] {
        &self.words
    }

    pub fn to_bytes(&self) -> [u8; KEY_SIZE] {
        let mut out = [0u8; KEY_SIZE];
        for (i, word) in self.words.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    pub fn encrypt_block(&self, block: &mut [u32; KEY_WORDS]) {
        for t in 0..KEY_WORDS {
            let k = self.words[t];
            let j = (k & 0x0F) as usize;
            let x = block[t];
            let y = block[j];
            block[t] = k.wrapping_add((k & x) | (!k & y));
            block[j] = k.wrapping_add((k & y) | (!k & x));
        }
    }

    pub fn decrypt_block(&self, block: &mut [u32; KEY_WORDS]) {
        for t in (0..KEY_WORDS).rev() {
            let k = self.words[t];
            let j = (k & 0x0F) as usize;
            let x = block[t].wrapping_sub(k);
            let y = block[j].wrapping_sub(k);
            block[t] = (x & k) | (y & !k);
            block[j] = (y & k) | (x & !k);
        }
    }

    pub fn encrypt(&self, data: &mut [u8], offset: usize, length: usize) -> Result<()> {
        self.apply(data, offset, length, Key::encrypt_block)
    }

    pub fn decrypt(&self, data: &mut [u8], offset: usize, length: usize) -> Result<()> {
        self.apply(data, offset, length, Key::decrypt_block)
    }

    fn apply(
        &self,
        data: &mut [u8],
        offset: usize,
        length: usize,
        round: fn(&Key, &mut [u32; KEY_WORDS]),
    ) -> Result<()> {
        if offset % CIPHER_BLOCK_SIZE != 0 || length % CIPHER_BLOCK_SIZE != 0 {
            return Err(TpsError::malformed(
                offset as u64,
                "cipher region not aligned to 64 bytes",
            ));
        }
        let end = offset
            .checked_add(length)
            .filter(|&e| e <= data.len())
            .ok_or(TpsError::OutOfRange {
                position: offset,
                wanted: length,
                length: data.len(),
            })?;
        for chunk in data[offset..end].chunks_exact_mut(CIPHER_BLOCK_SIZE) {
            let mut block = [0u32; KEY_WORDS];
            for (i, word) in block.iter_mut().enumerate() {
                *word = u32::from_le_bytes([
                    chunk[i * 4],
                    chunk[i * 4 + 1],
                    chunk[i * 4 + 2],
                    chunk[i * 4 + 3],
                ]);
            }
            round(self, &mut block);
            for (i, word) in block.iter().enumerate() {
                chunk[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
            }
        }
        Ok(())
    }

    /// True when every word's swap partner sits at or below its own index.
    /// Such a key can be recovered in a single top-down pass, one word at
    /// a time, without branching.
    pub fn is_single_pass_recoverable(&self) -> bool {
        (0..KEY_WORDS).all(|t| (self.words[t] & 0x0F) as usize <= t)
    }

    /// Indices grouped by mutual dependence: word `t` only ever mixes with
    /// word `key[t] & 0x0F`, so recovery can treat each group independently.
    pub fn dependency_groups(&self) -> Vec<Vec<usize>> {
        let mut parent: Vec<usize> = (0..KEY_WORDS).collect();
        fn root(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }
        for t in 0..KEY_WORDS {
            let j = (self.words[t] & 0x0F) as usize;
            let (a, b) = (root(&mut parent, t), root(&mut parent, j));
            parent[a.max(b)] = a.min(b);
        }
        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); KEY_WORDS];
        for t in 0..KEY_WORDS {
            let r = root(&mut parent, t);
            groups[r].push(t);
        }
        groups.retain(|g| !g.is_empty());
        groups
    }
}

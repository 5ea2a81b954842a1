use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::crypto::Key;
use crate::recovery::block::{self, Block};
use crate::recovery::state::RecoveryState;
use crate::types::KEY_WORDS;
use crate::types::error::{Result, TpsError};

/// Cooperative cancellation flag, cheap to clone across threads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Ciphertext-only key recovery over a whole encrypted file.
///
/// Works from the known-plaintext pair at the header tail, walking the key
/// words from 15 down to 0 and pruning candidates against the file's fill
/// blocks after every index. The candidate space per word is the full u32
/// range; `partitions` splits each scan so cancellation gets a look-in.
pub struct RecoveryEngine {
    encrypted_header: Block,
    plaintext_header: Block,
    b0b0_candidates: Vec<Block>,
    sequence_candidates: Vec<Block>,
    partitions: u32,
    checkpoint: Option<PathBuf>,
    cancel: CancelToken,
}

impl RecoveryEngine {
    /// `data` is the raw, still encrypted file image.
    pub fn new(data: &[u8]) -> Result<RecoveryEngine> {
        let (encrypted_header, plaintext_header) = block::header_index_end_blocks(data)?;
        // Blocks that occur more than once are almost certainly 0xB0 fill;
        // their first occurrences feed the B0B0 reduction. The sequence
        // block is unique, so the sequential reduction scans everything.
        let sequence_candidates = block::load_blocks(data, true);
        let b0b0_candidates: Vec<Block> = block::find_identical_blocks(&sequence_candidates)
            .into_iter()
            .map(|(first, _)| first)
            .collect();
        debug!(
            b0b0 = b0b0_candidates.len(),
            total = sequence_candidates.len(),
            "collected reduction candidates"
        );
        Ok(RecoveryEngine {
            encrypted_header,
            plaintext_header,
            b0b0_candidates,
            sequence_candidates,
            partitions: 16,
            checkpoint: None,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_partitions(mut self, partitions: u32) -> RecoveryEngine {
        self.partitions = partitions.max(1);
        self
    }

    /// After every finished index the surviving states are written here,
    /// atomically (write to a temp file, then rename).
    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>) -> RecoveryEngine {
        self.checkpoint = Some(path.into());
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn recover(&self) -> Result<Vec<Key>> {
        let initial = RecoveryState::new(self.encrypted_header.clone(), self.plaintext_header.clone());
        self.run(vec![initial], KEY_WORDS - 1)
    }

    /// Continues a run from a checkpoint written by an earlier one.
    pub fn resume(&self, path: impl AsRef<Path>) -> Result<Vec<Key>> {
        let (next_index, states) = read_checkpoint(path.as_ref())?;
        match next_index {
            Some(index) => self.run(states, index),
            None => Ok(complete_keys(&states)),
        }
    }

    fn run(&self, mut states: Vec<RecoveryState>, top_index: usize) -> Result<Vec<Key>> {
        for index in (0..=top_index).rev() {
            if self.cancel.is_cancelled() {
                return Err(TpsError::Cancelled { index });
            }
            let mut found = Vec::new();
            for state in &states {
                for range in partition_ranges(self.partitions) {
                    if self.cancel.is_cancelled() {
                        return Err(TpsError::Cancelled { index });
                    }
                    found.extend(state.index_scan(index, range));
                }
            }
            info!(index, candidates = found.len(), "scanned key word");
            states = self.reduce(index, found);
            info!(index, survivors = states.len(), "reduced candidates");
            if let Some(path) = &self.checkpoint {
                write_checkpoint(path, index.checked_sub(1), &states)?;
            }
            if states.is_empty() {
                return Ok(Vec::new());
            }
        }
        Ok(complete_keys(&states))
    }

    fn reduce(&self, index: usize, found: Vec<RecoveryState>) -> Vec<RecoveryState> {
        let first = index == KEY_WORDS - 1;
        let reduced: Vec<RecoveryState> = found
            .iter()
            .filter_map(|state| {
                if first {
                    state.reduce_first(index, &self.b0b0_candidates, &self.sequence_candidates)
                } else {
                    state.reduce_next(index)
                }
            })
            .collect();
        if reduced.is_empty() && !found.is_empty() {
            // A file can legitimately run out of fill evidence; better to
            // carry all candidates than to lose the true key.
            warn!(index, "reduction eliminated every candidate, keeping all");
            return found;
        }
        reduced
    }
}

fn complete_keys(states: &[RecoveryState]) -> Vec<Key> {
    states.iter().filter_map(|s| s.key().to_key()).collect()
}

/// Splits the full u32 space into `partitions` inclusive ranges.
fn partition_ranges(partitions: u32) -> impl Iterator<Item = std::ops::RangeInclusive<u32>> {
    let step = (u32::MAX / partitions).max(1);
    (0..partitions).map(move |i| {
        let start = i * step;
        let end = if i == partitions - 1 {
            u32::MAX
        } else {
            (i + 1) * step - 1
        };
        start..=end
    })
}

/// Checkpoint layout: a presence byte plus the next index to scan, then
/// the state count, then the states. The file appears atomically, written
/// to a temporary sibling first and renamed over the target.
pub fn write_checkpoint(
    path: &Path,
    next_index: Option<usize>,
    states: &[RecoveryState],
) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        match next_index {
            Some(index) => w.write_all(&[1, index as u8])?,
            None => w.write_all(&[0, 0])?,
        }
        w.write_all(&(states.len() as u32).to_le_bytes())?;
        for state in states {
            state.write_to(&mut w)?;
        }
        w.flush()?;
    }
    tmp.persist(path).map_err(|e| TpsError::Io(e.error))?;
    Ok(())
}

pub fn read_checkpoint(path: &Path) -> Result<(Option<usize>, Vec<RecoveryState>)> {
    use std::io::Read;

    let mut r = BufReader::new(File::open(path)?);
    let mut head = [0u8; 2];
    r.read_exact(&mut head)?;
    let next_index = match head[0] {
        0 => None,
        _ => Some(head[1] as usize),
    };
    let mut count = [0u8; 4];
    r.read_exact(&mut count)?;
    let count = u32::from_le_bytes(count) as usize;
    let mut states = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        states.push(RecoveryState::read_from(&mut r)?);
    }
    Ok((next_index, states))
}

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;

use tracing::{debug, warn};

use crate::crypto::Key;
use crate::schema::definition::TableDefinition;
use crate::schema::row::{self, Row};
use crate::codec::TpsEncoding;
use crate::tps::block::TpsBlock;
use crate::tps::header::TpsHeader;
use crate::tps::record::{self, RecordHeader, TpsRecord};
use crate::types::error::{Result, TpsError};
use crate::types::{FileOffset, HEADER_SIZE, RecordNumber, TableNumber};

/// Events produced while walking a file front to back.
#[derive(Debug, Clone)]
pub enum FileEvent {
    StartBlock {
        start: FileOffset,
        end: FileOffset,
    },
    StartPage {
        offset: FileOffset,
        record_count: u16,
        flags: u8,
    },
    Record(TpsRecord),
}

/// An open TPS file, fully resident and already decrypted.
pub struct TpsFile {
    data: Vec<u8>,
    header: TpsHeader,
}

impl TpsFile {
    pub fn open(path: impl AsRef<Path>) -> Result<TpsFile> {
        TpsFile::from_bytes(std::fs::read(path)?)
    }

    pub fn open_with_password(path: impl AsRef<Path>, password: &str) -> Result<TpsFile> {
        TpsFile::from_bytes_with_key(std::fs::read(path)?, &Key::from_password(password))
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<TpsFile> {
        let header = TpsHeader::parse(&data)?;
        Ok(TpsFile { data, header })
    }

    /// Decrypts the header, then every block area the header points at.
    pub fn from_bytes_with_key(mut data: Vec<u8>, key: &Key) -> Result<TpsFile> {
        if data.len() < HEADER_SIZE {
            return Err(TpsError::NotATpsFile {
                reason: format!("file of {} bytes is shorter than the header", data.len()),
            });
        }
        key.decrypt(&mut data, 0, HEADER_SIZE)?;
        let header = TpsHeader::parse(&data)?;
        for (start, end) in header.block_regions(data.len() as u64) {
            let end = end.min(data.len() as u64);
            if end > start {
                key.decrypt(&mut data, start as usize, (end - start) as usize)?;
            }
        }
        Ok(TpsFile { data, header })
    }

    pub fn header(&self) -> &TpsHeader {
        &self.header
    }

    pub fn blocks(&self) -> Result<Vec<TpsBlock>> {
        self.header
            .block_regions(self.data.len() as u64)
            .into_iter()
            .map(|(start, end)| TpsBlock::parse(&self.data, start, end))
            .collect()
    }

    /// Walks blocks, pages and records in file order.
    ///
    /// With `ignore_errors` set, a page whose payload fails to expand is
    /// skipped with a warning; header and record-framing failures stay
    /// fatal either way. After yielding an `Err` the iterator is done.
    pub fn events(&self, ignore_errors: bool) -> Events<'_> {
        Events {
            file: self,
            ignore_errors,
            regions: self
                .header
                .block_regions(self.data.len() as u64)
                .into_iter(),
            queue: VecDeque::new(),
            failed: false,
        }
    }

    /// Every record in the file, in file order.
    pub fn records(&self, ignore_errors: bool) -> Result<Vec<TpsRecord>> {
        let mut out = Vec::new();
        for event in self.events(ignore_errors) {
            if let FileEvent::Record(record) = event? {
                out.push(record);
            }
        }
        Ok(out)
    }

    pub fn table_names(&self) -> Result<Vec<(TableNumber, String)>> {
        let mut names = Vec::new();
        for record in self.records(false)? {
            if let Some(RecordHeader::TableName { table, name }) = record.header {
                names.push((table, name));
            }
        }
        Ok(names)
    }

    /// Reassembles the table definitions split over numbered chunks.
    ///
    /// A table whose chunk sequence has a hole is dropped with a warning in
    /// tolerant mode and fails with `Incomplete` otherwise.
    pub fn table_definitions(
        &self,
        encoding: TpsEncoding,
        tolerant: bool,
    ) -> Result<BTreeMap<TableNumber, TableDefinition>> {
        let mut chunks: BTreeMap<TableNumber, BTreeMap<u16, Vec<u8>>> = BTreeMap::new();
        for record in self.records(tolerant)? {
            if let Some(RecordHeader::TableDefinition { table, block_index }) = &record.header {
                let parts = chunks.entry(*table).or_default();
                if parts.contains_key(block_index) {
                    warn!(table, block_index, "duplicate table definition chunk, keeping first");
                    continue;
                }
                parts.insert(*block_index, record.data().to_vec());
            }
        }
        let mut definitions = BTreeMap::new();
        for (table, parts) in chunks {
            match assemble_parts(&parts) {
                Some(bytes) => {
                    definitions.insert(table, TableDefinition::parse(&bytes, encoding)?);
                }
                None => {
                    let missing = first_missing(&parts);
                    if tolerant {
                        warn!(table, missing, "dropping table with incomplete definition");
                    } else {
                        return Err(TpsError::Incomplete { table, missing });
                    }
                }
            }
        }
        Ok(definitions)
    }

    /// Raw data records of one table, in file order.
    pub fn data_records(&self, table: TableNumber) -> Result<Vec<TpsRecord>> {
        Ok(self
            .records(false)?
            .into_iter()
            .filter(|r| matches!(r.header, Some(RecordHeader::Data { table: t, .. }) if t == table))
            .collect())
    }

    /// Decoded rows of one table. Duplicate record numbers keep the first
    /// occurrence.
    pub fn rows(
        &self,
        table: TableNumber,
        definition: &TableDefinition,
        encoding: TpsEncoding,
        tolerant: bool,
    ) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        let mut seen: HashSet<RecordNumber> = HashSet::new();
        for record in self.records(tolerant)? {
            let Some(RecordHeader::Data { table: t, record_number }) = record.header.clone() else {
                continue;
            };
            if t != table {
                continue;
            }
            if !seen.insert(record_number) {
                warn!(table, record_number, "duplicate record number, keeping first");
                continue;
            }
            rows.push(row::parse_row(
                definition,
                record_number,
                record.data(),
                encoding,
                tolerant,
            )?);
        }
        Ok(rows)
    }

    /// Reassembled memo contents keyed by owning record number.
    pub fn memo_records(
        &self,
        table: TableNumber,
        memo_index: u8,
        tolerant: bool,
    ) -> Result<BTreeMap<RecordNumber, Vec<u8>>> {
        let mut parts: BTreeMap<RecordNumber, BTreeMap<u16, Vec<u8>>> = BTreeMap::new();
        for record in self.records(tolerant)? {
            let Some(RecordHeader::Memo { table: t, owning_record, memo_index: m, sequence }) =
                record.header.clone()
            else {
                continue;
            };
            if t != table || m != memo_index {
                continue;
            }
            let owner = parts.entry(owning_record).or_default();
            if owner.contains_key(&sequence) {
                warn!(table, owning_record, sequence, "duplicate memo part, keeping first");
                continue;
            }
            owner.insert(sequence, record.data().to_vec());
        }
        let mut memos = BTreeMap::new();
        for (owner, sequences) in parts {
            match assemble_parts(&sequences) {
                Some(bytes) => {
                    memos.insert(owner, bytes);
                }
                None => {
                    let missing = first_missing(&sequences);
                    if tolerant {
                        warn!(table, owner, missing, "dropping incomplete memo");
                    } else {
                        return Err(TpsError::Incomplete { table, missing });
                    }
                }
            }
        }
        Ok(memos)
    }

    /// Record numbers reachable through one index, in index order.
    pub fn index_records(
        &self,
        table: TableNumber,
        index_number: u8,
    ) -> Result<Vec<RecordNumber>> {
        let mut out = Vec::new();
        for record in self.records(false)? {
            if let Some(RecordHeader::Index { table: t, index_number: i, record_number }) =
                record.header
                && t == table
                && i == index_number
            {
                out.push(record_number);
            }
        }
        Ok(out)
    }

    pub fn metadata(&self, table: TableNumber) -> Result<Vec<TpsRecord>> {
        Ok(self
            .records(false)?
            .into_iter()
            .filter(|r| matches!(r.header, Some(RecordHeader::Metadata { table: t }) if t == table))
            .collect())
    }
}

/// Concatenates numbered parts when they form a gapless 0..n sequence.
fn assemble_parts(parts: &BTreeMap<u16, Vec<u8>>) -> Option<Vec<u8>> {
    for (expected, &actual) in parts.keys().enumerate() {
        if expected as u16 != actual {
            return None;
        }
    }
    let mut out = Vec::new();
    for part in parts.values() {
        out.extend_from_slice(part);
    }
    Some(out)
}

fn first_missing(parts: &BTreeMap<u16, Vec<u8>>) -> usize {
    for (expected, &actual) in parts.keys().enumerate() {
        if expected as u16 != actual {
            return expected;
        }
    }
    parts.len()
}

pub struct Events<'a> {
    file: &'a TpsFile,
    ignore_errors: bool,
    regions: std::vec::IntoIter<(FileOffset, FileOffset)>,
    queue: VecDeque<Result<FileEvent>>,
    failed: bool,
}

impl Events<'_> {
    fn fill(&mut self, start: FileOffset, end: FileOffset) {
        let block = match TpsBlock::parse(&self.file.data, start, end) {
            Ok(block) => block,
            Err(e) => {
                self.queue.push_back(Err(e));
                return;
            }
        };
        self.queue.push_back(Ok(FileEvent::StartBlock { start, end }));
        for page in block.pages {
            self.queue.push_back(Ok(FileEvent::StartPage {
                offset: page.file_offset,
                record_count: page.record_count,
                flags: page.flags,
            }));
            if !page.holds_records() {
                continue;
            }
            let data = match page.data() {
                Ok(data) => data,
                Err(e) if self.ignore_errors => {
                    warn!(
                        offset = format_args!("{:#x}", page.file_offset),
                        error = %e,
                        "skipping page that failed to expand"
                    );
                    continue;
                }
                Err(e) => {
                    self.queue.push_back(Err(e));
                    continue;
                }
            };
            match record::parse_all(&data, page.record_count, page.file_offset) {
                Ok(records) => {
                    debug!(
                        offset = format_args!("{:#x}", page.file_offset),
                        count = records.len(),
                        "parsed page"
                    );
                    for record in records {
                        self.queue.push_back(Ok(FileEvent::Record(record)));
                    }
                }
                Err(e) => self.queue.push_back(Err(e)),
            }
        }
    }
}

impl Iterator for Events<'_> {
    type Item = Result<FileEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                if event.is_err() {
                    self.failed = true;
                    self.queue.clear();
                }
                return Some(event);
            }
            if self.failed {
                return None;
            }
            let (start, end) = self.regions.next()?;
            self.fill(start, end);
        }
    }
}

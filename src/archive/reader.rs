//! Archive Reader
//!
//! Opens an archive, builds the complete offset table in one pass, and then
//! serves O(1) record lookups and payload reads. The index is immutable once
//! `open` returns; payload reads from many threads share one file handle
//! behind a mutex held across seek + read.

use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::codec::{PayloadCodec, PayloadContext};
use crate::config::Config;
use crate::error::{Result, TdlpackError};
use crate::ident::Identifier;

use super::iterator::{PayloadIter, RecordIter};
use super::message::{self, MessageHeader, END_MAGIC, HEADER_PROBE_LEN};
use super::station::StationList;
use super::{
    DataRecord, Layout, Record, RecordKind, RA_END_OF_CHAIN, RA_FIRST_KEY_SLOT,
    RA_KEY_ENTRY_WORDS, RA_KEY_HEADER_WORDS, RA_MASTER_KEY_WORDS, RA_NIDS, RA_SLOT_FACTOR,
    RA_VERSION, SEQ_IOCTET_LEN, SEQ_MARKER_LEN, TRAILER_LEN, TRAILER_SENTINEL, WORD_LEN,
};

// =============================================================================
// Shared File Handle
// =============================================================================

/// Buffered file handle with a single cursor, serialized by a mutex
pub(crate) struct SharedFile {
    handle: Mutex<BufReader<File>>,
    len: u64,
}

impl SharedFile {
    fn open(path: &Path, buffer_size: usize) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            handle: Mutex::new(BufReader::with_capacity(buffer_size.max(1), file)),
            len,
        })
    }

    /// Read exactly `len` octets at `offset`
    pub(crate) fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if offset + len as u64 > self.len {
            return Err(TdlpackError::format(format!(
                "Read of {} octets at byte {} runs past end of file ({} octets)",
                len, offset, self.len
            )));
        }

        let mut file = self.handle.lock();
        let current = file.stream_position()?;
        if current != offset {
            // keeps the buffer when the target is already inside it
            file.seek_relative(offset as i64 - current as i64)?;
        }
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

// =============================================================================
// Master Key
// =============================================================================

/// Slot 1 of a random-access archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MasterKey {
    pub version: i32,
    pub nids: i32,
    /// Words per slot
    pub nwords: i32,
    /// Slots per key record
    pub nkyrec: i32,
    /// Entries per key record
    pub maxent: i32,
    /// Slot of the last key record
    pub lastky: i32,
}

impl MasterKey {
    /// Slot size in octets
    pub fn slot_len(&self) -> u64 {
        self.nwords as u64 * WORD_LEN
    }

    fn parse(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        let key = Self {
            version: buf.get_i32(),
            nids: buf.get_i32(),
            nwords: buf.get_i32(),
            nkyrec: buf.get_i32(),
            maxent: buf.get_i32(),
            lastky: buf.get_i32(),
        };
        if key.nids != RA_NIDS {
            return Err(TdlpackError::format(format!(
                "Master key declares {} identifier words (expected {})",
                key.nids, RA_NIDS
            )));
        }
        if key.nwords <= 0 || key.nkyrec <= 0 || key.maxent <= 0 {
            return Err(TdlpackError::format(format!(
                "Invalid master key: nwords {}, nkyrec {}, maxent {}",
                key.nwords, key.nkyrec, key.maxent
            )));
        }
        Ok(key)
    }

    pub(crate) fn to_bytes(self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(RA_MASTER_KEY_WORDS * WORD_LEN as usize);
        for word in [
            self.version,
            self.nids,
            self.nwords,
            self.nkyrec,
            self.maxent,
            self.lastky,
        ] {
            buf.put_i32(word);
        }
        buf.to_vec()
    }
}

/// Byte offset of a 1-based slot
pub(crate) fn slot_offset(slot: i32, slot_len: u64) -> u64 {
    (slot as u64 - 1) * slot_len
}

// =============================================================================
// Record Query
// =============================================================================

/// Criteria for [`Archive::select`]; unset criteria match everything
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub date: Option<NaiveDateTime>,
    pub lead_hours: Option<u32>,
    /// Per-word identifier pattern; -1 matches any word
    pub identifier: Option<[i32; 4]>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn date(mut self, date: NaiveDateTime) -> Self {
        self.date = Some(date);
        self
    }

    pub fn lead_hours(mut self, hours: u32) -> Self {
        self.lead_hours = Some(hours);
        self
    }

    pub fn identifier(mut self, pattern: [i32; 4]) -> Self {
        self.identifier = Some(pattern);
        self
    }

    pub fn matches(&self, data: &DataRecord) -> bool {
        if self.date.is_some_and(|date| date != data.reference()) {
            return false;
        }
        if self.lead_hours.is_some_and(|lead| lead != data.lead_hours()) {
            return false;
        }
        match self.identifier {
            Some(pattern) => pattern
                .iter()
                .zip(data.identifier().words())
                .all(|(&want, word)| want == -1 || want == word),
            None => true,
        }
    }
}

// =============================================================================
// Archive
// =============================================================================

/// An opened archive with its complete record index
pub struct Archive {
    path: PathBuf,
    layout: Layout,
    records: Vec<Record>,
    master_key: Option<MasterKey>,
    file: SharedFile,
}

impl Archive {
    /// Open with the default configuration
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, &Config::default())
    }

    /// Open and index an archive.
    ///
    /// Sequential archives are scanned front to back; random-access archives
    /// are indexed by walking the key-record chain. Any framing inconsistency
    /// fails the whole call.
    pub fn open_with_config(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = SharedFile::open(&path, config.buffer_size)?;

        let layout = detect_layout(&file)?;
        let (records, master_key) = match layout {
            Layout::Sequential => (index_sequential(&file)?, None),
            Layout::RandomAccess => {
                let (records, master_key) = index_random_access(&file)?;
                (records, Some(master_key))
            }
        };

        info!(
            path = %path.display(),
            layout = %layout,
            records = records.len(),
            "Opened archive"
        );

        Ok(Self {
            path,
            layout,
            records,
            master_key,
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Master key of a random-access archive
    pub fn master_key(&self) -> Option<&MasterKey> {
        self.master_key.as_ref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Result<&Record> {
        self.records.get(index).ok_or(TdlpackError::Bounds {
            index,
            len: self.records.len(),
        })
    }

    pub fn slice(&self, range: Range<usize>) -> Result<&[Record]> {
        let len = self.records.len();
        if range.start > range.end {
            return Err(TdlpackError::Bounds {
                index: range.start,
                len,
            });
        }
        if range.end > len {
            return Err(TdlpackError::Bounds {
                index: range.end - 1,
                len,
            });
        }
        Ok(&self.records[range])
    }

    /// Records in file order; every call starts from the first record
    pub fn iter(&self) -> RecordIter<'_> {
        RecordIter::new(&self.records)
    }

    /// Records paired with their raw payloads, read on demand
    pub fn payloads(&self) -> PayloadIter<'_> {
        PayloadIter::new(self)
    }

    /// Read a record's raw payload. Safe to call from many threads.
    pub fn materialize_payload(&self, record: &Record) -> Result<Vec<u8>> {
        debug!(
            record = record.index,
            offset = record.offset,
            size = record.byte_size,
            "Materializing payload"
        );
        self.file.read_at(record.offset, record.byte_size as usize)
    }

    /// Unpack a data record's values through `codec`
    pub fn decode_values(&self, record: &Record, codec: &dyn PayloadCodec) -> Result<Vec<f32>> {
        let data = record.as_data().ok_or_else(|| {
            TdlpackError::format(format!("Record {} is not a data record", record.index))
        })?;
        let message = self.materialize_payload(record)?;
        let packed = data.packed(&message)?;
        codec.decode(packed, &PayloadContext::from_header(&data.header))
    }

    pub fn station_list(&self, index: usize) -> Result<&Arc<StationList>> {
        self.get(index)?.as_station_list().ok_or_else(|| {
            TdlpackError::format(format!("Record {} is not a station list", index))
        })
    }

    /// Station list a vector record refers to, `None` for grids
    pub fn station_list_for(&self, data: &DataRecord) -> Result<Option<&Arc<StationList>>> {
        if data.is_grid() {
            return Ok(None);
        }
        match data.station_list {
            Some(index) => self.station_list(index).map(Some),
            None => Err(TdlpackError::format(format!(
                "Vector record {} has no preceding station list",
                data.identifier()
            ))),
        }
    }

    /// Data records in file order
    pub fn data_records(&self) -> impl Iterator<Item = (&Record, &DataRecord)> {
        self.records
            .iter()
            .filter_map(|record| record.as_data().map(|data| (record, data)))
    }

    /// First data record carrying exactly this identifier
    pub fn find(&self, identifier: &Identifier) -> Option<&Record> {
        self.data_records()
            .find(|(_, data)| data.identifier() == *identifier)
            .map(|(record, _)| record)
    }

    pub fn select(&self, query: &RecordQuery) -> Vec<&Record> {
        self.data_records()
            .filter(|(_, data)| query.matches(data))
            .map(|(record, _)| record)
            .collect()
    }

    /// Distinct reference dates, ascending
    pub fn reference_dates(&self) -> Vec<NaiveDateTime> {
        self.data_records()
            .map(|(_, data)| data.reference())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct lead hours, ascending
    pub fn lead_times(&self) -> Vec<u32> {
        self.data_records()
            .map(|(_, data)| data.lead_hours())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("path", &self.path)
            .field("layout", &self.layout)
            .field("records", &self.records.len())
            .finish()
    }
}

// =============================================================================
// Indexing
// =============================================================================

fn detect_layout(file: &SharedFile) -> Result<Layout> {
    if file.len < 2 * WORD_LEN {
        return Ok(Layout::Sequential);
    }
    let head = file.read_at(0, 2 * WORD_LEN as usize)?;
    let mut buf = head.as_slice();
    let (first, second) = (buf.get_i32(), buf.get_i32());
    if first == RA_VERSION && second == RA_NIDS {
        Ok(Layout::RandomAccess)
    } else {
        Ok(Layout::Sequential)
    }
}

fn index_sequential(file: &SharedFile) -> Result<Vec<Record>> {
    let framing = SEQ_MARKER_LEN + SEQ_IOCTET_LEN;
    let mut records = Vec::new();
    let mut last_station = None;
    let mut pos = 0u64;

    while pos < file.len {
        let index = records.len();
        if file.len - pos < framing + SEQ_MARKER_LEN {
            return Err(TdlpackError::format(format!(
                "Truncated framing for record {} at byte {}",
                index, pos
            )));
        }

        let head = file.read_at(pos, framing as usize)?;
        let mut buf = head.as_slice();
        let prefix = u64::from(buf.get_u32());
        let ioctet = buf.get_i64();

        let suffix_pos = pos + SEQ_MARKER_LEN + prefix;
        if prefix < SEQ_IOCTET_LEN || suffix_pos + SEQ_MARKER_LEN > file.len {
            return Err(TdlpackError::format(format!(
                "Record {} at byte {} declares {} octets, past end of file",
                index, pos, prefix
            )));
        }
        if ioctet < 0 || ioctet as u64 != prefix - SEQ_IOCTET_LEN {
            return Err(TdlpackError::format(format!(
                "Record {} at byte {}: ioctet {} disagrees with record length {}",
                index, pos, ioctet, prefix
            )));
        }

        let tail = file.read_at(suffix_pos, SEQ_MARKER_LEN as usize)?;
        let suffix = u64::from(tail.as_slice().get_u32());
        if suffix != prefix {
            return Err(TdlpackError::format(format!(
                "Framing mismatch for record {} at byte {}: prefix {} != suffix {}",
                index, pos, prefix, suffix
            )));
        }

        let offset = pos + framing;
        let byte_size = ioctet as u64;
        let kind = classify_sequential(file, index, offset, byte_size, last_station)?;
        if let RecordKind::StationList(_) = kind {
            last_station = Some(index);
        }

        records.push(Record {
            index,
            offset,
            byte_size,
            kind,
        });
        pos = suffix_pos + SEQ_MARKER_LEN;
    }

    Ok(records)
}

fn classify_sequential(
    file: &SharedFile,
    index: usize,
    offset: u64,
    byte_size: u64,
    last_station: Option<usize>,
) -> Result<RecordKind> {
    let probe_len = byte_size.min(HEADER_PROBE_LEN as u64) as usize;
    let probe = file.read_at(offset, probe_len)?;

    if message::has_magic(&probe) {
        return data_record(file, &probe, index, offset, byte_size, last_station)
            .map(RecordKind::Data);
    }

    if byte_size == TRAILER_LEN {
        let mut words = &probe[4 * WORD_LEN as usize..];
        if words.get_i32() == TRAILER_SENTINEL {
            return Ok(RecordKind::Trailer);
        }
    }

    let raw = if probe.len() as u64 == byte_size {
        probe
    } else {
        file.read_at(offset, byte_size as usize)?
    };
    station_list(&raw, index)
}

fn index_random_access(file: &SharedFile) -> Result<(Vec<Record>, MasterKey)> {
    let head = file.read_at(0, RA_MASTER_KEY_WORDS * WORD_LEN as usize)?;
    let master = MasterKey::parse(&head)?;
    let slot_len = master.slot_len();

    if file.len % slot_len != 0 {
        return Err(TdlpackError::format(format!(
            "File size {} is not a whole number of {}-octet slots",
            file.len, slot_len
        )));
    }
    let total_slots = file.len / slot_len;

    let mut records = Vec::new();
    let mut last_station = None;
    let mut visited = HashSet::new();
    let mut declared_slots = 1u64;
    let mut key_slot = RA_FIRST_KEY_SLOT;
    let last_key;

    loop {
        if key_slot < 1 || key_slot as u64 > total_slots {
            return Err(TdlpackError::format(format!(
                "Key record at slot {} beyond end of file ({} slots)",
                key_slot, total_slots
            )));
        }
        if !visited.insert(key_slot) {
            return Err(TdlpackError::format(format!(
                "Key-record chain loops back to slot {}",
                key_slot
            )));
        }

        let key_offset = slot_offset(key_slot, slot_len);
        let header = file.read_at(key_offset, RA_KEY_HEADER_WORDS * WORD_LEN as usize)?;
        let mut buf = header.as_slice();
        let nkeys = buf.get_i32();
        let nprec_this = buf.get_i32();
        let next = buf.get_i32();

        if nkeys < 0 || nkeys > master.maxent || nprec_this < 1 {
            return Err(TdlpackError::format(format!(
                "Invalid key record at slot {}: {} entries over {} slots",
                key_slot, nkeys, nprec_this
            )));
        }
        let entry_len = RA_KEY_ENTRY_WORDS * WORD_LEN as usize;
        let key_len = (RA_KEY_HEADER_WORDS * WORD_LEN as usize + nkeys as usize * entry_len) as u64;
        if key_len > nprec_this as u64 * slot_len {
            return Err(TdlpackError::format(format!(
                "Key record at slot {} overflows its {} slots",
                key_slot, nprec_this
            )));
        }
        declared_slots += nprec_this as u64;

        let entries = file.read_at(
            key_offset + (RA_KEY_HEADER_WORDS as u64 * WORD_LEN),
            nkeys as usize * entry_len,
        )?;
        for entry in entries.chunks_exact(entry_len) {
            let mut buf = entry;
            let identifier = Identifier::new([
                buf.get_i32(),
                buf.get_i32(),
                buf.get_i32(),
                buf.get_i32(),
            ]);
            let nd = buf.get_i32();
            let bprec = buf.get_i32();

            let index = records.len();
            let first = bprec / RA_SLOT_FACTOR;
            let nslots = bprec % RA_SLOT_FACTOR;
            let byte_size = nd.max(0) as u64 * WORD_LEN;
            if nd < 0
                || first < 1
                || nslots < 1
                || byte_size > nslots as u64 * slot_len
                || first as u64 + nslots as u64 - 1 > total_slots
            {
                return Err(TdlpackError::format(format!(
                    "Key entry for record {} ({} words at slot {}, {} slots) extends beyond end of file",
                    index, nd, first, nslots
                )));
            }
            declared_slots += nslots as u64;

            let offset = slot_offset(first, slot_len);
            let kind = if identifier.is_station_list() {
                let raw = file.read_at(offset, byte_size as usize)?;
                last_station = Some(index);
                station_list(&raw, index)?
            } else {
                let probe_len = byte_size.min(HEADER_PROBE_LEN as u64) as usize;
                let probe = file.read_at(offset, probe_len)?;
                if !message::has_magic(&probe) {
                    return Err(TdlpackError::format(format!(
                        "Record {} ({}) does not start with a data record magic",
                        index, identifier
                    )));
                }
                RecordKind::Data(data_record(
                    file,
                    &probe,
                    index,
                    offset,
                    byte_size,
                    last_station,
                )?)
            };

            records.push(Record {
                index,
                offset,
                byte_size,
                kind,
            });
        }

        if next == RA_END_OF_CHAIN {
            last_key = key_slot;
            break;
        }
        key_slot = next;
    }

    if declared_slots > total_slots {
        return Err(TdlpackError::format(format!(
            "Key records declare {} slots but the file holds {}",
            declared_slots, total_slots
        )));
    }
    if master.lastky != last_key {
        return Err(TdlpackError::format(format!(
            "Master key names slot {} as the last key record, chain ends at {}",
            master.lastky, last_key
        )));
    }

    Ok((records, master))
}

fn data_record(
    file: &SharedFile,
    probe: &[u8],
    index: usize,
    offset: u64,
    byte_size: u64,
    last_station: Option<usize>,
) -> Result<DataRecord> {
    let (header, packed) = MessageHeader::parse(probe).map_err(|err| match err {
        TdlpackError::Format(msg) => TdlpackError::format(format!("Record {}: {}", index, msg)),
        other => other,
    })?;
    if message::required_len(&packed) as u64 > byte_size {
        return Err(TdlpackError::format(format!(
            "Record {}: packed data ends at octet {}, past the {}-octet record",
            index, packed.end, byte_size
        )));
    }
    let terminator = file.read_at(offset + packed.end as u64, END_MAGIC.len())?;
    if terminator.as_slice() != END_MAGIC {
        return Err(TdlpackError::format(format!(
            "Record {}: missing section 5 terminator at octet {}",
            index, packed.end
        )));
    }

    let fields = header.identifier.decode();
    let station_list = if header.grid.is_none() {
        last_station
    } else {
        None
    };
    Ok(DataRecord {
        header,
        fields,
        packed,
        station_list,
    })
}

fn station_list(raw: &[u8], index: usize) -> Result<RecordKind> {
    StationList::decode(raw)
        .map(|list| RecordKind::StationList(Arc::new(list)))
        .map_err(|err| match err {
            TdlpackError::Format(msg) => TdlpackError::format(format!("Record {}: {}", index, msg)),
            other => other,
        })
}

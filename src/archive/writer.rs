//! Archive Writer
//!
//! Append-only write session for either layout. Output is staged in a hidden
//! sibling file and published on [`ArchiveWriter::close`]: linked into place
//! under [`OpenMode::Create`], so a target that appeared in the meantime is
//! never replaced, and renamed over the target under [`OpenMode::Overwrite`].
//! A writer dropped without closing removes its staged file, so a failed
//! write never leaves a partial archive behind.
//!
//! ## Sequential Segments
//! ```text
//! ┌──────────┬──────┬──────┬─────────┬──────────┬──────┬─────────┐
//! │ stations │ data │ data │ trailer │ stations │ data │ trailer │
//! └──────────┴──────┴──────┴─────────┴──────────┴──────┴─────────┘
//!   a trailer closes each segment before the next station list, and the
//!   file when it ends on vector data
//! ```
//!
//! Only one writer may target a path at a time; concurrent writers to the
//! same archive are not supported.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, TdlpackError};
use crate::ident::Identifier;

use super::message::{self, encode_message, MessageHeader};
use super::reader::{slot_offset, MasterKey};
use super::station::StationList;
use super::{
    Layout, RA_END_OF_CHAIN, RA_FIRST_KEY_SLOT, RA_KEY_ENTRY_WORDS, RA_KEY_HEADER_WORDS, RA_NIDS,
    RA_SLOT_FACTOR, RA_VERSION, SEQ_IOCTET_LEN, SEQ_MARKER_LEN, TRAILER_SENTINEL, WORD_LEN,
};

/// How to treat an existing file at the target path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Fail with `AlreadyExists` if the path exists
    Create,
    /// Replace an existing file; directories are refused
    Overwrite,
}

/// One record to append
#[derive(Debug, Clone, Copy)]
pub enum WriteRecord<'a> {
    StationList(&'a StationList),
    /// Header plus a payload already packed by a codec
    Data {
        header: &'a MessageHeader,
        packed: &'a [u8],
    },
    /// A complete, already-encoded message (e.g. copied from another archive)
    Message(&'a [u8]),
    Trailer,
}

/// Totals reported when a write session closes
#[derive(Debug, Clone, Serialize)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub layout: Layout,
    pub records: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Written {
    StationList,
    Grid,
    Vector,
    Trailer,
}

/// Random-access bookkeeping: the open key record and the next free slot
struct KeyChain {
    master: MasterKey,
    key_slot: i32,
    entries: Vec<[i32; RA_KEY_ENTRY_WORDS]>,
    next_slot: i32,
}

impl KeyChain {
    fn slot_len(&self) -> u64 {
        self.master.slot_len()
    }
}

/// Append-only writer for one archive
pub struct ArchiveWriter {
    path: PathBuf,
    staging: PathBuf,
    mode: OpenMode,
    layout: Layout,
    file: BufWriter<File>,
    records_written: u64,
    bytes_written: u64,
    /// (record index, station count) of the latest station list
    last_station_list: Option<(usize, usize)>,
    last_written: Option<Written>,
    chain: Option<KeyChain>,
    finished: bool,
}

impl ArchiveWriter {
    /// Start a write session for `path`.
    ///
    /// The random-access slot template comes from `config.ra_template`.
    pub fn create(
        path: impl AsRef<Path>,
        layout: Layout,
        mode: OpenMode,
        config: &Config,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        check_target(&path, mode)?;

        let file_name = path
            .file_name()
            .ok_or_else(|| {
                TdlpackError::validation(format!("{} does not name a file", path.display()))
            })?
            .to_string_lossy()
            .into_owned();
        let staging = path.with_file_name(format!(".{}.partial", file_name));

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&staging)?;

        let mut writer = Self {
            path,
            staging,
            mode,
            layout,
            file: BufWriter::with_capacity(config.buffer_size.max(1), file),
            records_written: 0,
            bytes_written: 0,
            last_station_list: None,
            last_written: None,
            chain: None,
            finished: false,
        };

        if layout == Layout::RandomAccess {
            let nwords = config.ra_template.nwords();
            let maxent = config.ra_template.maxent();
            let slot_len = nwords as u64 * WORD_LEN;
            let key_len = ((RA_KEY_HEADER_WORDS + maxent as usize * RA_KEY_ENTRY_WORDS) as u64)
                * WORD_LEN;
            let nkyrec = key_len.div_ceil(slot_len) as i32;

            let master = MasterKey {
                version: RA_VERSION,
                nids: RA_NIDS,
                nwords,
                nkyrec,
                maxent,
                lastky: RA_FIRST_KEY_SLOT,
            };

            // master key slot and the first key record are filled in on close
            writer.write_zeros(slot_len * (1 + nkyrec as u64))?;
            writer.chain = Some(KeyChain {
                master,
                key_slot: RA_FIRST_KEY_SLOT,
                entries: Vec::with_capacity(maxent as usize),
                next_slot: RA_FIRST_KEY_SLOT + nkyrec,
            });
        }

        debug!(path = %writer.path.display(), layout = %layout, "Started archive writer");
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Index of the latest station list written
    pub fn last_station_list(&self) -> Option<usize> {
        self.last_station_list.map(|(index, _)| index)
    }

    /// Append one record, returning its index in the finished archive
    pub fn append(&mut self, record: WriteRecord<'_>) -> Result<usize> {
        match record {
            WriteRecord::StationList(list) => self.append_station_list(list),
            WriteRecord::Data { header, packed } => self.append_data(header, packed),
            WriteRecord::Message(message) => self.append_message(message),
            WriteRecord::Trailer => self.append_trailer(),
        }
    }

    /// Append a station list. In a sequential archive that already holds
    /// records, a trailer is written first to close the previous segment.
    pub fn append_station_list(&mut self, list: &StationList) -> Result<usize> {
        if self.layout == Layout::Sequential
            && self.records_written > 0
            && self.last_written != Some(Written::Trailer)
        {
            self.append_trailer()?;
        }

        let payload = list.encode();
        let index = match self.layout {
            Layout::Sequential => self.write_framed(&payload)?,
            Layout::RandomAccess => self.write_slots(Identifier::STATION_LIST, &payload)?,
        };
        self.last_station_list = Some((index, list.len()));
        self.last_written = Some(Written::StationList);
        debug!(record = index, stations = list.len(), "Wrote station list");
        Ok(index)
    }

    /// Encode and append a data record
    pub fn append_data(&mut self, header: &MessageHeader, packed: &[u8]) -> Result<usize> {
        let message = encode_message(header, packed)?;
        self.append_message(&message)
    }

    /// Append an already-encoded data record message
    pub fn append_message(&mut self, message: &[u8]) -> Result<usize> {
        let (header, packed) = MessageHeader::parse(message).map_err(|err| match err {
            TdlpackError::Format(msg) => TdlpackError::validation(msg),
            other => other,
        })?;
        message::check_end_magic(message, &packed)
            .map_err(|err| TdlpackError::validation(err.to_string()))?;

        let vector = header.grid.is_none();
        if vector {
            let (_, stations) = self.last_station_list.ok_or_else(|| {
                TdlpackError::validation(format!(
                    "vector record {} written before any station list",
                    header.identifier
                ))
            })?;
            if header.number_of_values as usize != stations {
                return Err(TdlpackError::validation(format!(
                    "vector record {} holds {} values but the station list has {}",
                    header.identifier, header.number_of_values, stations
                )));
            }
        }

        let index = match self.layout {
            Layout::Sequential => self.write_framed(message)?,
            Layout::RandomAccess => self.write_slots(header.identifier, message)?,
        };
        self.last_written = Some(if vector { Written::Vector } else { Written::Grid });
        debug!(
            record = index,
            id = %header.identifier,
            size = message.len(),
            "Wrote data record"
        );
        Ok(index)
    }

    /// Append a trailer. Random-access archives carry no trailers.
    pub fn append_trailer(&mut self) -> Result<usize> {
        if self.layout == Layout::RandomAccess {
            return Err(TdlpackError::Unsupported(
                "trailer records are not written to random-access archives".to_string(),
            ));
        }

        let mut payload = BytesMut::with_capacity(24);
        for word in [
            0,
            0,
            i32::try_from(self.bytes_written).unwrap_or(i32::MAX),
            i32::try_from(self.records_written).unwrap_or(i32::MAX),
            TRAILER_SENTINEL,
            0,
        ] {
            payload.put_i32(word);
        }
        let index = self.write_framed(&payload)?;
        self.last_written = Some(Written::Trailer);
        debug!(record = index, "Wrote trailer");
        Ok(index)
    }

    /// Finalize and publish the archive.
    ///
    /// A sequential archive ending on vector data gets a closing trailer; a
    /// random-access archive gets its last key record and master key.
    pub fn close(mut self) -> Result<WriteSummary> {
        if self.layout == Layout::Sequential && self.last_written == Some(Written::Vector) {
            self.append_trailer()?;
        }
        if self.layout == Layout::RandomAccess {
            self.finish_key_chain()?;
        }

        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        self.publish()?;
        self.finished = true;

        info!(
            path = %self.path.display(),
            layout = %self.layout,
            records = self.records_written,
            bytes = self.bytes_written,
            "Closed archive writer"
        );

        Ok(WriteSummary {
            path: self.path.clone(),
            layout: self.layout,
            records: self.records_written,
            bytes: self.bytes_written,
        })
    }

    /// Move the staged file to the target path
    fn publish(&self) -> Result<()> {
        match self.mode {
            OpenMode::Create => {
                fs::hard_link(&self.staging, &self.path).map_err(|err| {
                    if err.kind() == ErrorKind::AlreadyExists {
                        TdlpackError::AlreadyExists(self.path.clone())
                    } else {
                        TdlpackError::Io(err)
                    }
                })?;
                fs::remove_file(&self.staging)?;
            }
            OpenMode::Overwrite => fs::rename(&self.staging, &self.path)?,
        }
        Ok(())
    }

    // =========================================================================
    // Sequential framing
    // =========================================================================

    fn write_framed(&mut self, payload: &[u8]) -> Result<usize> {
        let marker = u32::try_from(SEQ_IOCTET_LEN + payload.len() as u64).map_err(|_| {
            TdlpackError::validation(format!(
                "record of {} octets exceeds the 32-bit length prefix",
                payload.len()
            ))
        })?;

        self.file.write_all(&marker.to_be_bytes())?;
        self.file.write_all(&(payload.len() as i64).to_be_bytes())?;
        self.file.write_all(payload)?;
        self.file.write_all(&marker.to_be_bytes())?;

        let index = self.records_written as usize;
        self.records_written += 1;
        self.bytes_written += 2 * SEQ_MARKER_LEN + SEQ_IOCTET_LEN + payload.len() as u64;
        Ok(index)
    }

    // =========================================================================
    // Random-access slots
    // =========================================================================

    fn write_slots(&mut self, identifier: Identifier, payload: &[u8]) -> Result<usize> {
        let (slot_len, maxent, full) = match &self.chain {
            Some(chain) => (
                chain.slot_len(),
                chain.master.maxent,
                chain.entries.len() >= chain.master.maxent as usize,
            ),
            None => {
                return Err(TdlpackError::validation(
                    "random-access writer has no key chain".to_string(),
                ))
            }
        };
        if payload.len() as u64 % WORD_LEN != 0 {
            return Err(TdlpackError::validation(format!(
                "payload of {} octets is not a whole number of words",
                payload.len()
            )));
        }
        let nslots = (payload.len() as u64).div_ceil(slot_len).max(1);
        if nslots >= RA_SLOT_FACTOR as u64 {
            return Err(TdlpackError::validation(format!(
                "record needs {} slots; at most {} fit a key entry",
                nslots,
                RA_SLOT_FACTOR - 1
            )));
        }
        if full {
            debug!(entries = maxent, "Key record full, chaining a new one");
            self.start_key_record()?;
        }

        let first = self.next_slot()?;
        self.file.write_all(payload)?;
        self.bytes_written += payload.len() as u64;
        self.write_zeros(nslots * slot_len - payload.len() as u64)?;

        let words = identifier.words();
        let entry = [
            words[0],
            words[1],
            words[2],
            words[3],
            (payload.len() as u64 / WORD_LEN) as i32,
            first * RA_SLOT_FACTOR + nslots as i32,
        ];
        if let Some(chain) = self.chain.as_mut() {
            chain.entries.push(entry);
            chain.next_slot += nslots as i32;
        }

        let index = self.records_written as usize;
        self.records_written += 1;
        Ok(index)
    }

    fn next_slot(&self) -> Result<i32> {
        self.chain
            .as_ref()
            .map(|chain| chain.next_slot)
            .ok_or_else(|| TdlpackError::validation("random-access writer has no key chain"))
    }

    /// Reserve a new key record and link the full one to it
    fn start_key_record(&mut self) -> Result<()> {
        let Some(chain) = self.chain.as_mut() else {
            return Ok(());
        };
        let new_slot = chain.next_slot;
        let old_slot = chain.key_slot;
        let entries = std::mem::take(&mut chain.entries);
        let nkyrec = chain.master.nkyrec;
        let slot_len = chain.slot_len();
        chain.key_slot = new_slot;
        chain.next_slot += nkyrec;
        chain.master.lastky = new_slot;

        self.write_zeros(nkyrec as u64 * slot_len)?;
        self.write_key_record(old_slot, &entries, new_slot, nkyrec, slot_len)
    }

    fn finish_key_chain(&mut self) -> Result<()> {
        let Some(chain) = self.chain.as_mut() else {
            return Ok(());
        };
        let entries = std::mem::take(&mut chain.entries);
        let (key_slot, nkyrec, slot_len) = (chain.key_slot, chain.master.nkyrec, chain.slot_len());
        let master = chain.master;

        self.write_key_record(key_slot, &entries, RA_END_OF_CHAIN, nkyrec, slot_len)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&master.to_bytes())?;
        self.file.seek(SeekFrom::End(0))?;
        Ok(())
    }

    fn write_key_record(
        &mut self,
        slot: i32,
        entries: &[[i32; RA_KEY_ENTRY_WORDS]],
        next: i32,
        nkyrec: i32,
        slot_len: u64,
    ) -> Result<()> {
        let mut buf = BytesMut::with_capacity(nkyrec as usize * slot_len as usize);
        buf.put_i32(entries.len() as i32);
        buf.put_i32(nkyrec);
        buf.put_i32(next);
        for entry in entries {
            for &word in entry {
                buf.put_i32(word);
            }
        }

        self.file.seek(SeekFrom::Start(slot_offset(slot, slot_len)))?;
        self.file.write_all(&buf)?;
        self.file.seek(SeekFrom::End(0))?;
        Ok(())
    }

    fn write_zeros(&mut self, len: u64) -> Result<()> {
        const ZEROS: [u8; 4096] = [0u8; 4096];
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(ZEROS.len() as u64) as usize;
            self.file.write_all(&ZEROS[..chunk])?;
            remaining -= chunk as u64;
        }
        self.bytes_written += len;
        Ok(())
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(
            path = %self.path.display(),
            records = self.records_written,
            "Archive writer dropped without close, discarding output"
        );
        let _ = self.file.flush();
        let _ = fs::remove_file(&self.staging);
    }
}

fn check_target(path: &Path, mode: OpenMode) -> Result<()> {
    match mode {
        OpenMode::Create if path.exists() => Err(TdlpackError::AlreadyExists(path.to_path_buf())),
        OpenMode::Overwrite if path.is_dir() => Err(TdlpackError::validation(format!(
            "{} is a directory",
            path.display()
        ))),
        _ => Ok(()),
    }
}

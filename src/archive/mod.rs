//! Archive Indexer
//!
//! Physical access to an archive file: framing, the offset table, record
//! classification, payload reads, and the append-only write path.
//!
//! ## Sequential Layout
//! ```text
//! ┌──────────┬──────────────┬─────────────────────┬──────────┐
//! │ N (u32)  │ ioctet (i64) │ payload (ioctet)    │ N (u32)  │  N = 8 + ioctet
//! └──────────┴──────────────┴─────────────────────┴──────────┘
//!   record offset points at the payload; prefix and suffix must agree
//! ```
//!
//! ## Random-Access Layout
//! ```text
//! slot 1      master key   version(0) nids(4) nwords nkyrec maxent lastky
//! slot 2..    key record   nkeys nprec_this prec_next | entries...
//!                          entry = id1 id2 id3 id4 nd bprec
//!                          bprec = first_slot * 1000 + slot_count
//! slot k..    payloads     (k - 1) * nwords * 4 = byte offset
//! ```
//!
//! ## Record Kinds
//! ```text
//! payload starts with "PLDT"            -> Data
//! else 24 octets and word 4 == 9999     -> Trailer
//! else multiple of 8 octets             -> StationList
//! else                                  -> Format error
//! ```

mod iterator;
mod message;
mod reader;
mod station;
mod writer;

pub use iterator::{PayloadIter, RecordIter};
pub use message::{
    encode_message, Geometry, GridDefinition, MessageHeader, EDITION, END_MAGIC, LEGACY_MAGIC,
    MAGIC, MAX_PLAIN_LEN,
};
pub use reader::{Archive, MasterKey, RecordQuery};
pub use station::{StationList, STATION_LABEL_LEN};
pub use writer::{ArchiveWriter, OpenMode, WriteRecord, WriteSummary};

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::error::Result;
use crate::ident::{Identifier, IdentifierFields};

// =============================================================================
// Layout Constants
// =============================================================================

/// Octets in one archive word
pub(crate) const WORD_LEN: u64 = 4;

/// Sequential framing: length prefix/suffix and the ioctet field
pub(crate) const SEQ_MARKER_LEN: u64 = 4;
pub(crate) const SEQ_IOCTET_LEN: u64 = 8;

/// Trailer payload size and the sentinel in its fifth word
pub(crate) const TRAILER_LEN: u64 = 24;
pub(crate) const TRAILER_SENTINEL: i32 = 9999;

/// Random-access master key
pub(crate) const RA_VERSION: i32 = 0;
pub(crate) const RA_NIDS: i32 = 4;
pub(crate) const RA_MASTER_KEY_WORDS: usize = 6;
pub(crate) const RA_KEY_HEADER_WORDS: usize = 3;
pub(crate) const RA_KEY_ENTRY_WORDS: usize = 6;
pub(crate) const RA_END_OF_CHAIN: i32 = 99_999_999;
pub(crate) const RA_SLOT_FACTOR: i32 = 1000;
pub(crate) const RA_FIRST_KEY_SLOT: i32 = 2;

/// Physical layout of an archive file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Layout {
    /// Variable-length framed records
    Sequential,
    /// Fixed-size slots addressed through a key-record chain
    RandomAccess,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Sequential => f.write_str("sequential"),
            Layout::RandomAccess => f.write_str("random-access"),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// One physical record of an archive
#[derive(Debug, Clone)]
pub struct Record {
    pub(crate) index: usize,
    pub(crate) offset: u64,
    pub(crate) byte_size: u64,
    pub(crate) kind: RecordKind,
}

/// What a record holds, decided once at index time
#[derive(Debug, Clone)]
pub enum RecordKind {
    Data(DataRecord),
    StationList(Arc<StationList>),
    Trailer,
}

/// Memoized header of a data record
#[derive(Debug, Clone)]
pub struct DataRecord {
    pub(crate) header: MessageHeader,
    pub(crate) fields: IdentifierFields,
    pub(crate) packed: Range<usize>,
    /// Index of the closest preceding station list (vector records only)
    pub(crate) station_list: Option<usize>,
}

impl Record {
    /// Position in the archive, starting at 0
    pub fn index(&self) -> usize {
        self.index
    }

    /// Byte offset of the payload
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Payload length in octets
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn kind(&self) -> &RecordKind {
        &self.kind
    }

    pub fn as_data(&self) -> Option<&DataRecord> {
        match &self.kind {
            RecordKind::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_station_list(&self) -> Option<&Arc<StationList>> {
        match &self.kind {
            RecordKind::StationList(list) => Some(list),
            _ => None,
        }
    }

    pub fn is_trailer(&self) -> bool {
        matches!(self.kind, RecordKind::Trailer)
    }

    /// Inventory summary of this record
    pub fn summary(&self) -> RecordSummary {
        let mut summary = RecordSummary {
            index: self.index,
            kind: "trailer",
            offset: self.offset,
            byte_size: self.byte_size,
            date: None,
            identifier: None,
            lead_hours: None,
            plain: None,
            shape: None,
            stations: None,
        };
        match &self.kind {
            RecordKind::Data(data) => {
                summary.kind = if data.is_grid() { "grid" } else { "vector" };
                summary.date = Some(data.header.date_word());
                summary.identifier = Some(data.identifier().words());
                summary.lead_hours = Some(data.lead_hours());
                summary.plain = Some(data.header.plain.clone());
                summary.shape = Some(data.geometry().shape());
            }
            RecordKind::StationList(list) => {
                summary.kind = "station";
                summary.stations = Some(list.len());
            }
            RecordKind::Trailer => {}
        }
        summary
    }
}

impl DataRecord {
    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn identifier(&self) -> Identifier {
        self.header.identifier
    }

    pub fn fields(&self) -> &IdentifierFields {
        &self.fields
    }

    pub fn reference(&self) -> NaiveDateTime {
        self.header.reference
    }

    pub fn lead_hours(&self) -> u32 {
        self.header.lead_hours()
    }

    pub fn lead(&self) -> Duration {
        Duration::hours(i64::from(self.lead_hours()))
    }

    pub fn geometry(&self) -> Geometry {
        self.header.geometry()
    }

    pub fn is_grid(&self) -> bool {
        self.header.grid.is_some()
    }

    pub fn station_list_index(&self) -> Option<usize> {
        self.station_list
    }

    /// The packed section 4 payload inside a materialized message
    pub fn packed<'a>(&self, message: &'a [u8]) -> Result<&'a [u8]> {
        message::check_end_magic(message, &self.packed)?;
        Ok(&message[self.packed.clone()])
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// One inventory line, also serializable as JSON
#[derive(Debug, Clone, Serialize)]
pub struct RecordSummary {
    pub index: usize,
    pub kind: &'static str,
    pub offset: u64,
    pub byte_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<[i32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_hours: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stations: Option<usize>,
}

impl fmt::Display for RecordSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.identifier, self.stations) {
            (Some(words), _) => write!(
                f,
                "{}:d={:010}:{}:{:3}-HR FCST:{}",
                self.index,
                self.date.unwrap_or(0),
                Identifier::new(words),
                self.lead_hours.unwrap_or(0),
                self.plain.as_deref().unwrap_or("")
            ),
            (None, Some(count)) => write!(
                f,
                "{}:d=0000000000:STATION CALL LETTER RECORD:{}",
                self.index, count
            ),
            (None, None) => write!(f, "{}:d=0000000000:TRAILER RECORD", self.index),
        }
    }
}

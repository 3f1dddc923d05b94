//! Data record messages
//!
//! A data record's payload is one self-describing message. Only the
//! identification sections are decoded here; the packed values in section 4
//! are handed to a [`PayloadCodec`](crate::codec::PayloadCodec) untouched.
//!
//! ## Message Layout (big-endian)
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Section 0 (8)   "PLDT" | total length (3) | edition (1)       │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Section 1 (39 + plain)                                       │
//! │   len(1) flags(1) year(2) mon(1) day(1) hour(1) min(1)       │
//! │   date YYYYMMDDHH(4) id1..id4(16) lead h(2) lead m(1)        │
//! │   model(1) seq(1) dec scale(1) bin scale(1) reserved(3)      │
//! │   plain len(1) plain text(n <= 32)                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Section 2 (32, grids only)                                   │
//! │   len(3) proj(1) nx(2) ny(2) lat ll(4) lon ll(4)             │
//! │   orient lon(4) grid length mm(4) std lat(4) reserved(4)     │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Section 4 (16 + packed)                                      │
//! │   len(3) flags(1) nvalues(4) pmiss(4) smiss(4) packed...     │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Section 5 (4)   "7777" + zero padding to 8-octet multiple    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::ops::Range;

use bytes::{Buf, BufMut, BytesMut};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::error::{Result, TdlpackError};
use crate::ident::Identifier;

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes opening every data record message
pub const MAGIC: &[u8; 4] = b"PLDT";

/// Magic written by older producers, accepted on read
pub const LEGACY_MAGIC: &[u8; 4] = b"TDLP";

/// Closing bytes of every message
pub const END_MAGIC: &[u8; 4] = b"7777";

/// Current message edition
pub const EDITION: u8 = 0;

/// Longest plain-language description stored in section 1
pub const MAX_PLAIN_LEN: usize = 32;

/// Enough leading bytes to decode sections 0, 1, 2 and the section 4 preamble
pub(crate) const HEADER_PROBE_LEN: usize =
    SECTION0_LEN + SECTION1_FIXED_LEN + MAX_PLAIN_LEN + SECTION2_LEN + SECTION4_FIXED_LEN;

const SECTION0_LEN: usize = 8;
const SECTION1_FIXED_LEN: usize = 39;
const SECTION2_LEN: usize = 32;
const SECTION4_FIXED_LEN: usize = 16;
const SECTION5_LEN: usize = 4;
const MAX_U24: usize = 0x00FF_FFFF;

/// Section 1 flag: section 2 (grid definition) is present
const GRID_PRESENT: u8 = 0b0000_0001;

// =============================================================================
// Geometry
// =============================================================================

/// Grid definition carried in section 2
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridDefinition {
    pub map_projection: u8,
    pub nx: u16,
    pub ny: u16,
    /// Lower-left latitude, 1e-4 degree
    pub lat_ll: i32,
    /// Lower-left longitude, 1e-4 degree
    pub lon_ll: i32,
    /// Orientation longitude, 1e-4 degree
    pub orient_lon: i32,
    /// Grid length, millimetres
    pub grid_length_mm: i32,
    /// Standard latitude, 1e-4 degree
    pub std_lat: i32,
}

impl GridDefinition {
    pub fn lower_left_latitude(&self) -> f64 {
        f64::from(self.lat_ll) * 1e-4
    }

    pub fn lower_left_longitude(&self) -> f64 {
        f64::from(self.lon_ll) * 1e-4
    }

    pub fn orientation_longitude(&self) -> f64 {
        f64::from(self.orient_lon) * 1e-4
    }

    pub fn standard_latitude(&self) -> f64 {
        f64::from(self.std_lat) * 1e-4
    }

    /// Grid length in metres
    pub fn grid_length(&self) -> f64 {
        f64::from(self.grid_length_mm) * 1e-3
    }

    /// (ny, nx)
    pub fn shape(&self) -> (usize, usize) {
        (usize::from(self.ny), usize::from(self.nx))
    }
}

/// Spatial layout of one data record's values
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Geometry {
    /// 2-D grid; values stored with x varying fastest
    Grid(GridDefinition),
    /// 1-D vector aligned with a station list
    Stations { count: usize },
}

impl Geometry {
    pub fn is_grid(&self) -> bool {
        matches!(self, Geometry::Grid(_))
    }

    /// Array shape: `[ny, nx]` for grids, `[count]` for stations
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Geometry::Grid(grid) => {
                let (ny, nx) = grid.shape();
                vec![ny, nx]
            }
            Geometry::Stations { count } => vec![*count],
        }
    }

    /// Number of values a record with this geometry holds
    pub fn value_count(&self) -> usize {
        self.shape().iter().product()
    }
}

// =============================================================================
// Message Header
// =============================================================================

/// Decoded identification sections of a data record message
#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    pub edition: u8,
    pub identifier: Identifier,
    pub reference: NaiveDateTime,
    pub lead_minutes: u8,
    pub model_id: u8,
    pub model_sequence: u8,
    pub decimal_scale: i8,
    pub binary_scale: i8,
    pub plain: String,
    pub grid: Option<GridDefinition>,
    pub data_flags: u8,
    pub number_of_values: u32,
    pub primary_missing: i32,
    pub secondary_missing: i32,
}

impl MessageHeader {
    /// Header for a new record; scales, flags and secondary missing start at 0
    pub fn new(identifier: Identifier, reference: NaiveDateTime, geometry: &Geometry) -> Self {
        let grid = match geometry {
            Geometry::Grid(grid) => Some(grid.clone()),
            Geometry::Stations { .. } => None,
        };
        Self {
            edition: EDITION,
            identifier,
            reference,
            lead_minutes: 0,
            model_id: 0,
            model_sequence: 0,
            decimal_scale: 0,
            binary_scale: 0,
            plain: String::new(),
            grid,
            data_flags: 0,
            number_of_values: geometry.value_count() as u32,
            primary_missing: 9999,
            secondary_missing: 0,
        }
    }

    pub fn geometry(&self) -> Geometry {
        match &self.grid {
            Some(grid) => Geometry::Grid(grid.clone()),
            None => Geometry::Stations {
                count: self.number_of_values as usize,
            },
        }
    }

    pub fn lead_hours(&self) -> u32 {
        self.identifier.lead_hours()
    }

    /// Reference date as the packed `YYYYMMDDHH` integer
    pub fn date_word(&self) -> i32 {
        self.reference.year() * 1_000_000
            + self.reference.month() as i32 * 10_000
            + self.reference.day() as i32 * 100
            + self.reference.hour() as i32
    }

    /// Parse the identification sections from the leading bytes of a message.
    ///
    /// `bytes` may be a prefix of the message; the returned range locates the
    /// packed payload relative to the start of the message.
    pub fn parse(bytes: &[u8]) -> Result<(Self, Range<usize>)> {
        let mut buf = bytes;

        // Section 0
        need(&buf, SECTION0_LEN, "section 0")?;
        let magic = &buf[..4];
        if magic != MAGIC && magic != LEGACY_MAGIC {
            return Err(TdlpackError::format(format!(
                "Invalid message magic: expected PLDT, got {:?}",
                magic
            )));
        }
        buf.advance(4);
        let _total_length = buf.get_uint(3);
        let edition = buf.get_u8();

        // Section 1
        need(&buf, SECTION1_FIXED_LEN, "section 1")?;
        let section1_len = usize::from(buf.get_u8());
        let flags = buf.get_u8();
        let year = buf.get_u16();
        let month = buf.get_u8();
        let day = buf.get_u8();
        let hour = buf.get_u8();
        let minute = buf.get_u8();
        let _date_word = buf.get_i32();
        let identifier = Identifier::new([buf.get_i32(), buf.get_i32(), buf.get_i32(), buf.get_i32()]);
        let _lead_hours = buf.get_u16();
        let lead_minutes = buf.get_u8();
        let model_id = buf.get_u8();
        let model_sequence = buf.get_u8();
        let decimal_scale = buf.get_i8();
        let binary_scale = buf.get_i8();
        buf.advance(3);
        let plain_len = usize::from(buf.get_u8());

        if section1_len != SECTION1_FIXED_LEN + plain_len || plain_len > MAX_PLAIN_LEN {
            return Err(TdlpackError::format(format!(
                "Section 1 length {} inconsistent with plain-language length {}",
                section1_len, plain_len
            )));
        }
        need(&buf, plain_len, "plain language")?;
        let plain = String::from_utf8_lossy(&buf[..plain_len]).trim_end().to_string();
        buf.advance(plain_len);

        let reference = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
            .and_then(|date| date.and_hms_opt(u32::from(hour), u32::from(minute), 0))
            .ok_or_else(|| {
                TdlpackError::format(format!(
                    "Invalid reference date {:04}-{:02}-{:02} {:02}:{:02}",
                    year, month, day, hour, minute
                ))
            })?;

        // Section 2
        let grid = if flags & GRID_PRESENT != 0 {
            need(&buf, SECTION2_LEN, "section 2")?;
            let section2_len = buf.get_uint(3) as usize;
            if section2_len != SECTION2_LEN {
                return Err(TdlpackError::format(format!(
                    "Section 2 length {} (expected {})",
                    section2_len, SECTION2_LEN
                )));
            }
            let grid = GridDefinition {
                map_projection: buf.get_u8(),
                nx: buf.get_u16(),
                ny: buf.get_u16(),
                lat_ll: buf.get_i32(),
                lon_ll: buf.get_i32(),
                orient_lon: buf.get_i32(),
                grid_length_mm: buf.get_i32(),
                std_lat: buf.get_i32(),
            };
            buf.advance(4);
            Some(grid)
        } else {
            None
        };

        // Section 4 preamble
        need(&buf, SECTION4_FIXED_LEN, "section 4")?;
        let section4_len = buf.get_uint(3) as usize;
        let data_flags = buf.get_u8();
        let number_of_values = buf.get_u32();
        let primary_missing = buf.get_i32();
        let secondary_missing = buf.get_i32();
        if section4_len < SECTION4_FIXED_LEN {
            return Err(TdlpackError::format(format!(
                "Section 4 length {} shorter than its preamble",
                section4_len
            )));
        }

        let packed_start = bytes.len() - buf.remaining();
        let packed = packed_start..packed_start + (section4_len - SECTION4_FIXED_LEN);

        let header = Self {
            edition,
            identifier,
            reference,
            lead_minutes,
            model_id,
            model_sequence,
            decimal_scale,
            binary_scale,
            plain,
            grid,
            data_flags,
            number_of_values,
            primary_missing,
            secondary_missing,
        };
        Ok((header, packed))
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a complete message around an already-packed payload.
///
/// The result is zero-padded to a multiple of 8 octets.
pub fn encode_message(header: &MessageHeader, packed: &[u8]) -> Result<Vec<u8>> {
    let plain = header.plain.as_bytes();
    if plain.len() > MAX_PLAIN_LEN || !header.plain.is_ascii() {
        return Err(TdlpackError::validation(format!(
            "plain language must be ASCII of at most {} characters: {:?}",
            MAX_PLAIN_LEN, header.plain
        )));
    }

    let section1_len = SECTION1_FIXED_LEN + plain.len();
    let section2_len = if header.grid.is_some() { SECTION2_LEN } else { 0 };
    let section4_len = SECTION4_FIXED_LEN + packed.len();
    let total_len = SECTION0_LEN + section1_len + section2_len + section4_len + SECTION5_LEN;
    if total_len > MAX_U24 {
        return Err(TdlpackError::validation(format!(
            "message of {} octets exceeds the 3-octet length field",
            total_len
        )));
    }
    let padded_len = total_len.div_ceil(8) * 8;

    let mut buf = BytesMut::with_capacity(padded_len);

    // Section 0
    buf.put_slice(MAGIC);
    buf.put_uint(total_len as u64, 3);
    buf.put_u8(header.edition);

    // Section 1
    let reference = &header.reference;
    let year = u16::try_from(reference.year()).map_err(|_| {
        TdlpackError::validation(format!("reference year {} out of range", reference.year()))
    })?;
    let lead_hours = u16::try_from(header.lead_hours()).unwrap_or(u16::MAX);
    buf.put_u8(section1_len as u8);
    buf.put_u8(if header.grid.is_some() { GRID_PRESENT } else { 0 });
    buf.put_u16(year);
    buf.put_u8(reference.month() as u8);
    buf.put_u8(reference.day() as u8);
    buf.put_u8(reference.hour() as u8);
    buf.put_u8(reference.minute() as u8);
    buf.put_i32(header.date_word());
    for word in header.identifier.words() {
        buf.put_i32(word);
    }
    buf.put_u16(lead_hours);
    buf.put_u8(header.lead_minutes);
    buf.put_u8(header.model_id);
    buf.put_u8(header.model_sequence);
    buf.put_i8(header.decimal_scale);
    buf.put_i8(header.binary_scale);
    buf.put_bytes(0, 3);
    buf.put_u8(plain.len() as u8);
    buf.put_slice(plain);

    // Section 2
    if let Some(grid) = &header.grid {
        buf.put_uint(SECTION2_LEN as u64, 3);
        buf.put_u8(grid.map_projection);
        buf.put_u16(grid.nx);
        buf.put_u16(grid.ny);
        buf.put_i32(grid.lat_ll);
        buf.put_i32(grid.lon_ll);
        buf.put_i32(grid.orient_lon);
        buf.put_i32(grid.grid_length_mm);
        buf.put_i32(grid.std_lat);
        buf.put_bytes(0, 4);
    }

    // Section 4
    buf.put_uint(section4_len as u64, 3);
    buf.put_u8(header.data_flags);
    buf.put_u32(header.number_of_values);
    buf.put_i32(header.primary_missing);
    buf.put_i32(header.secondary_missing);
    buf.put_slice(packed);

    // Section 5
    buf.put_slice(END_MAGIC);
    buf.put_bytes(0, padded_len - total_len);

    Ok(buf.to_vec())
}

/// Does this payload open with a data record magic?
pub(crate) fn has_magic(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && (&bytes[..4] == MAGIC || &bytes[..4] == LEGACY_MAGIC)
}

/// Check the section 5 terminator that follows the packed payload
pub(crate) fn check_end_magic(message: &[u8], packed: &Range<usize>) -> Result<()> {
    let end = packed.end + SECTION5_LEN;
    if end > message.len() || &message[packed.end..end] != END_MAGIC {
        return Err(TdlpackError::format(format!(
            "Missing section 5 terminator at octet {}",
            packed.end
        )));
    }
    Ok(())
}

/// Bytes a packed span plus the terminator need inside a message
pub(crate) fn required_len(packed: &Range<usize>) -> usize {
    packed.end + SECTION5_LEN
}

fn need(buf: &&[u8], len: usize, what: &str) -> Result<()> {
    if buf.remaining() < len {
        return Err(TdlpackError::format(format!(
            "Truncated {}: need {} octets, have {}",
            what,
            len,
            buf.remaining()
        )));
    }
    Ok(())
}

//! Identifier Codec
//!
//! Converts the 4-word packed record identifier to and from its named
//! components.
//!
//! ## Word Layout (decimal digits, most significant first)
//! ```text
//! word 1 (9 digits)   CCC FFF B DD
//! word 2 (9 digits)   V LLLL UUUU
//! word 3 (9 digits)   T RR O HH TTT
//! word 4 (10 digits)  W XXXX YY I S G
//!                     └─threshold─┘
//! ```

mod fields;
mod threshold;

use std::fmt;

use serde::Serialize;

pub use fields::{IdField, IdentifierFields};
pub use threshold::{decode_threshold, encode_threshold};

/// First identifier word reserved for station call letter records
pub const STATION_LIST_WORD: i32 = 400_001_000;

/// A raw 4-word identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Identifier([i32; 4]);

impl Identifier {
    /// Identifier carried by every station list record
    pub const STATION_LIST: Identifier = Identifier([STATION_LIST_WORD, 0, 0, 0]);

    pub fn new(words: [i32; 4]) -> Self {
        Self(words)
    }

    /// Encode named components into a raw identifier
    pub fn from_fields(fields: &IdentifierFields) -> crate::Result<Self> {
        fields.encode().map(Self)
    }

    pub fn words(&self) -> [i32; 4] {
        self.0
    }

    pub fn decode(&self) -> IdentifierFields {
        IdentifierFields::decode(self.0)
    }

    /// Lead time in hours (the TTT digits of word 3)
    pub fn lead_hours(&self) -> u32 {
        (self.0[2].unsigned_abs()) % 1000
    }

    pub fn is_station_list(&self) -> bool {
        self.0[0] == STATION_LIST_WORD
    }
}

impl From<[i32; 4]> for Identifier {
    fn from(words: [i32; 4]) -> Self {
        Self(words)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:09} {:09} {:09} {:010}",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

//! Payload Codec
//!
//! Turns one data record's packed section 4 bytes into values and back. The
//! archive and cube layers only ever talk to the [`PayloadCodec`] trait, so a
//! production quantizer can be plugged in without touching them.
//!
//! ## Value Order
//! ```text
//!   grid (nx = 3, ny = 2)          stations (n = 4)
//!   ┌────┬────┬────┐
//!   │ v3 │ v4 │ v5 │  y = 1         v0 v1 v2 v3
//!   ├────┼────┼────┤                 │  │  │  └─ station list[3]
//!   │ v0 │ v1 │ v2 │  y = 0         ...
//!   └────┴────┴────┘
//!   x varies fastest, which is the memory order of a row-major [y, x] array
//! ```

mod scaled;

pub use scaled::ScaledIntegerCodec;

use crate::archive::{Geometry, MessageHeader};
use crate::error::Result;
use crate::ident::Identifier;

/// Everything a codec may need besides the bytes themselves
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadContext {
    pub identifier: Identifier,
    pub geometry: Geometry,
    /// Primary missing-value sentinel
    pub primary_missing: f32,
    /// Secondary missing-value sentinel; 0 means none
    pub secondary_missing: f32,
}

impl PayloadContext {
    pub fn new(identifier: Identifier, geometry: Geometry) -> Self {
        Self {
            identifier,
            geometry,
            primary_missing: 9999.0,
            secondary_missing: 0.0,
        }
    }

    pub fn with_missing(mut self, primary: f32, secondary: f32) -> Self {
        self.primary_missing = primary;
        self.secondary_missing = secondary;
        self
    }

    /// Context described by a decoded message header
    pub fn from_header(header: &MessageHeader) -> Self {
        Self::new(header.identifier, header.geometry())
            .with_missing(header.primary_missing as f32, header.secondary_missing as f32)
    }

    pub fn value_count(&self) -> usize {
        self.geometry.value_count()
    }

    /// Is `value` one of the missing-value sentinels?
    pub fn is_missing(&self, value: f32) -> bool {
        value == self.primary_missing
            || (self.secondary_missing != 0.0 && value == self.secondary_missing)
    }
}

/// Numeric packing of a single record's values
pub trait PayloadCodec: Send + Sync {
    /// Unpack `packed` into exactly `ctx.value_count()` values.
    ///
    /// Missing values come back as the sentinels in `ctx`, not as NaN.
    fn decode(&self, packed: &[u8], ctx: &PayloadContext) -> Result<Vec<f32>>;

    /// Pack `values` at the given decimal scale
    fn encode(&self, values: &[f32], ctx: &PayloadContext, decimal_scale: i32) -> Result<Vec<u8>>;
}

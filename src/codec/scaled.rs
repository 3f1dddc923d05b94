//! Reference scaled-integer codec
//!
//! Each value is stored as the big-endian `i64` `round(v * 10^scale)`. The
//! two lowest `i64` codes are reserved for the missing-value sentinels so
//! they survive a round trip exactly.
//!
//! ```text
//! ┌────────────┬──────────────────────────────────────┐
//! │ scale (i8) │ code 0 (i64) │ code 1 (i64) │ ...   │
//! └────────────┴──────────────────────────────────────┘
//! ```

use bytes::{Buf, BufMut, BytesMut};

use super::{PayloadCodec, PayloadContext};
use crate::error::{Result, TdlpackError};

const PRIMARY_CODE: i64 = i64::MIN;
const SECONDARY_CODE: i64 = i64::MIN + 1;
const CODE_LEN: usize = 8;

/// Lossless up to the chosen decimal scale
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaledIntegerCodec;

impl ScaledIntegerCodec {
    pub fn new() -> Self {
        Self
    }
}

impl PayloadCodec for ScaledIntegerCodec {
    fn decode(&self, packed: &[u8], ctx: &PayloadContext) -> Result<Vec<f32>> {
        let count = ctx.value_count();
        let expected = 1 + count * CODE_LEN;
        if packed.len() < expected {
            return Err(TdlpackError::Codec(format!(
                "packed payload holds {} octets, {} values need {}",
                packed.len(),
                count,
                expected
            )));
        }

        let mut buf = packed;
        let scale = i32::from(buf.get_i8());
        let factor = 10f64.powi(scale);

        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            let value = match buf.get_i64() {
                PRIMARY_CODE => ctx.primary_missing,
                SECONDARY_CODE => ctx.secondary_missing,
                code => (code as f64 / factor) as f32,
            };
            values.push(value);
        }
        Ok(values)
    }

    fn encode(&self, values: &[f32], ctx: &PayloadContext, decimal_scale: i32) -> Result<Vec<u8>> {
        if values.len() != ctx.value_count() {
            return Err(TdlpackError::Codec(format!(
                "geometry holds {} values, got {}",
                ctx.value_count(),
                values.len()
            )));
        }
        let scale = i8::try_from(decimal_scale).map_err(|_| {
            TdlpackError::Codec(format!("decimal scale {} out of range", decimal_scale))
        })?;
        let factor = 10f64.powi(decimal_scale);

        let mut buf = BytesMut::with_capacity(1 + values.len() * CODE_LEN);
        buf.put_i8(scale);
        for &value in values {
            let code = if value.is_nan() || value == ctx.primary_missing {
                PRIMARY_CODE
            } else if ctx.secondary_missing != 0.0 && value == ctx.secondary_missing {
                SECONDARY_CODE
            } else {
                let scaled = (f64::from(value) * factor).round();
                // i64::MIN + 2 is the smallest code left for real data
                if !scaled.is_finite() || scaled <= (SECONDARY_CODE as f64) || scaled >= i64::MAX as f64 {
                    return Err(TdlpackError::Codec(format!(
                        "value {} does not fit at decimal scale {}",
                        value, decimal_scale
                    )));
                }
                scaled as i64
            };
            buf.put_i64(code);
        }
        Ok(buf.to_vec())
    }
}

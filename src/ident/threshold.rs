//! Threshold codec
//!
//! The threshold occupies the top seven decimal digits of identifier word 4
//! as `WXXXXYY`:
//!
//! ```text
//! W     sign digit (1 = negative, anything else = positive)
//! XXXX  mantissa, read as the fraction 0.XXXX
//! YY    exponent code; 0-49 positive, 50-99 negative (YY - 50)
//! ```
//!
//! The value is `sign * 0.XXXX * 10^exponent`. A zero mantissa always means
//! a threshold of exactly zero, whatever the other digits hold.

use crate::error::{Result, TdlpackError};

const SIGN_SCALE: u32 = 1_000_000;
const MANTISSA_SCALE: u32 = 100;
const MANTISSA_DIGITS: i32 = 4;
const MAX_MANTISSA: u64 = 9_999;
const NEGATIVE_EXPONENT_BASE: u32 = 50;
const MAX_EXPONENT: i32 = 49;

/// Encode a threshold into its 7-digit `WXXXXYY` code.
///
/// Picks the smallest exponent whose rounded mantissa fits in four digits,
/// so only four significant digits survive.
pub fn encode_threshold(value: f64) -> Result<u32> {
    if !value.is_finite() {
        return Err(TdlpackError::validation(format!(
            "threshold must be finite, got {}",
            value
        )));
    }
    if value == 0.0 {
        return Ok(0);
    }

    let magnitude = value.abs();
    let mut exponent = magnitude.log10().floor() as i32 + 1;
    let mut mantissa = scale_round(magnitude, MANTISSA_DIGITS - exponent);
    if mantissa > MAX_MANTISSA {
        // rounding carried into a fifth digit (e.g. 0.99996)
        exponent += 1;
        mantissa = scale_round(magnitude, MANTISSA_DIGITS - exponent);
    }

    if !(-MAX_EXPONENT..=MAX_EXPONENT).contains(&exponent) {
        return Err(TdlpackError::validation(format!(
            "threshold {} needs exponent {} outside +/-{}",
            value, exponent, MAX_EXPONENT
        )));
    }

    let exponent_code = if exponent >= 0 {
        exponent as u32
    } else {
        NEGATIVE_EXPONENT_BASE + exponent.unsigned_abs()
    };
    let sign = u32::from(value < 0.0);

    Ok(sign * SIGN_SCALE + mantissa as u32 * MANTISSA_SCALE + exponent_code)
}

/// Decode a 7-digit `WXXXXYY` code back into the threshold value.
pub fn decode_threshold(code: u32) -> f64 {
    let sign_digit = code / SIGN_SCALE;
    let mantissa = (code / MANTISSA_SCALE) % 10_000;
    let exponent_code = code % MANTISSA_SCALE;

    if mantissa == 0 {
        return 0.0;
    }

    let exponent = if exponent_code >= NEGATIVE_EXPONENT_BASE {
        -((exponent_code - NEGATIVE_EXPONENT_BASE) as i32)
    } else {
        exponent_code as i32
    };

    // Divide by an exact power of ten instead of multiplying by an inexact
    // negative one, so 0.0025 decodes to the nearest double of 0.0025.
    let power = exponent - MANTISSA_DIGITS;
    let magnitude = if power >= 0 {
        f64::from(mantissa) * 10f64.powi(power)
    } else {
        f64::from(mantissa) / 10f64.powi(-power)
    };

    if sign_digit == 1 {
        -magnitude
    } else {
        magnitude
    }
}

fn scale_round(magnitude: f64, power: i32) -> u64 {
    let scaled = if power >= 0 {
        magnitude * 10f64.powi(power)
    } else {
        magnitude / 10f64.powi(-power)
    };
    scaled.round() as u64
}

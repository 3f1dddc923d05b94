//! Identifier fields
//!
//! Each component is a fixed run of decimal digits inside one of the four
//! words. Extraction is integer division/modulo on the decimal value, never
//! binary bit slicing.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Result, TdlpackError};

use super::threshold::{decode_threshold, encode_threshold};

/// Named component of a 4-word identifier, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdField {
    /// Variable class
    Ccc,
    /// Variable sub-class
    Fff,
    /// Processing indicator
    B,
    /// Forecast model / source
    Dd,
    /// Vertical application
    V,
    /// Level or top of layer
    Llll,
    /// Bottom of layer / unit code
    Uuuu,
    /// Time application
    T,
    /// Run-time offset in hours (time-of-day modifier)
    Rr,
    /// Time-period indicator
    O,
    /// Time-period length in hours
    Hh,
    /// Lead time in hours
    Ttt,
    /// Quantized threshold (`WXXXXYY`)
    Thresh,
    /// Interpolation indicator
    I,
    /// Smoothing indicator
    S,
    /// Grid indicator
    G,
}

impl IdField {
    pub const ALL: [IdField; 16] = [
        IdField::Ccc,
        IdField::Fff,
        IdField::B,
        IdField::Dd,
        IdField::V,
        IdField::Llll,
        IdField::Uuuu,
        IdField::T,
        IdField::Rr,
        IdField::O,
        IdField::Hh,
        IdField::Ttt,
        IdField::Thresh,
        IdField::I,
        IdField::S,
        IdField::G,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IdField::Ccc => "ccc",
            IdField::Fff => "fff",
            IdField::B => "b",
            IdField::Dd => "dd",
            IdField::V => "v",
            IdField::Llll => "llll",
            IdField::Uuuu => "uuuu",
            IdField::T => "t",
            IdField::Rr => "rr",
            IdField::O => "o",
            IdField::Hh => "hh",
            IdField::Ttt => "ttt",
            IdField::Thresh => "thresh",
            IdField::I => "i",
            IdField::S => "s",
            IdField::G => "g",
        }
    }

    /// Number of decimal digits the field occupies
    pub fn width(self) -> u32 {
        self.slot().2
    }

    /// Largest value that fits the field's digit width
    pub fn max_value(self) -> u32 {
        10u32.pow(self.width()) - 1
    }

    /// (word index, power of ten of the lowest digit, digit width)
    fn slot(self) -> (usize, u32, u32) {
        match self {
            IdField::Ccc => (0, 6, 3),
            IdField::Fff => (0, 3, 3),
            IdField::B => (0, 2, 1),
            IdField::Dd => (0, 0, 2),
            IdField::V => (1, 8, 1),
            IdField::Llll => (1, 4, 4),
            IdField::Uuuu => (1, 0, 4),
            IdField::T => (2, 8, 1),
            IdField::Rr => (2, 6, 2),
            IdField::O => (2, 5, 1),
            IdField::Hh => (2, 3, 2),
            IdField::Ttt => (2, 0, 3),
            IdField::Thresh => (3, 3, 7),
            IdField::I => (3, 2, 1),
            IdField::S => (3, 1, 1),
            IdField::G => (3, 0, 1),
        }
    }

    fn extract(self, words: &[i32; 4]) -> u32 {
        let (word, power, width) = self.slot();
        let value = i64::from(words[word]).abs();
        ((value / 10i64.pow(power)) % 10i64.pow(width)) as u32
    }
}

impl fmt::Display for IdField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IdField {
    type Err = TdlpackError;

    fn from_str(s: &str) -> Result<Self> {
        IdField::ALL
            .iter()
            .copied()
            .find(|field| field.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| TdlpackError::validation(format!("unknown identifier field '{}'", s)))
    }
}

/// The decoded components of a 4-word identifier
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct IdentifierFields {
    pub ccc: u32,
    pub fff: u32,
    pub b: u32,
    pub dd: u32,
    pub v: u32,
    pub llll: u32,
    pub uuuu: u32,
    pub t: u32,
    pub rr: u32,
    pub o: u32,
    pub hh: u32,
    pub ttt: u32,
    pub thresh: f64,
    pub i: u32,
    pub s: u32,
    pub g: u32,
}

impl IdentifierFields {
    /// Decode the four words into named components
    pub fn decode(words: [i32; 4]) -> Self {
        Self {
            ccc: IdField::Ccc.extract(&words),
            fff: IdField::Fff.extract(&words),
            b: IdField::B.extract(&words),
            dd: IdField::Dd.extract(&words),
            v: IdField::V.extract(&words),
            llll: IdField::Llll.extract(&words),
            uuuu: IdField::Uuuu.extract(&words),
            t: IdField::T.extract(&words),
            rr: IdField::Rr.extract(&words),
            o: IdField::O.extract(&words),
            hh: IdField::Hh.extract(&words),
            ttt: IdField::Ttt.extract(&words),
            thresh: decode_threshold(IdField::Thresh.extract(&words)),
            i: IdField::I.extract(&words),
            s: IdField::S.extract(&words),
            g: IdField::G.extract(&words),
        }
    }

    /// Encode the components back into four words.
    ///
    /// Fails with `Validation` when any integer component exceeds its digit
    /// width or the threshold cannot be expressed.
    pub fn encode(&self) -> Result<[i32; 4]> {
        let mut words = [0i64; 4];
        for field in IdField::ALL {
            let digits = self.digits(field)?;
            if digits > field.max_value() {
                return Err(TdlpackError::validation(format!(
                    "identifier field {} = {} exceeds {} digit(s)",
                    field,
                    digits,
                    field.width()
                )));
            }
            let (word, power, _) = field.slot();
            words[word] += i64::from(digits) * 10i64.pow(power);
        }

        let mut out = [0i32; 4];
        for (slot, word) in out.iter_mut().zip(words) {
            *slot = i32::try_from(word).map_err(|_| {
                TdlpackError::validation(format!("identifier word {} overflows 32 bits", word))
            })?;
        }
        Ok(out)
    }

    /// The field's value as it is stored in its digit run.
    ///
    /// The threshold is returned as its `WXXXXYY` code.
    pub fn digits(&self, field: IdField) -> Result<u32> {
        Ok(match field {
            IdField::Ccc => self.ccc,
            IdField::Fff => self.fff,
            IdField::B => self.b,
            IdField::Dd => self.dd,
            IdField::V => self.v,
            IdField::Llll => self.llll,
            IdField::Uuuu => self.uuuu,
            IdField::T => self.t,
            IdField::Rr => self.rr,
            IdField::O => self.o,
            IdField::Hh => self.hh,
            IdField::Ttt => self.ttt,
            IdField::Thresh => encode_threshold(self.thresh)?,
            IdField::I => self.i,
            IdField::S => self.s,
            IdField::G => self.g,
        })
    }

    /// Set an integer component. Setting `Thresh` interprets `value` as a
    /// `WXXXXYY` code.
    pub fn set_digits(&mut self, field: IdField, value: u32) {
        match field {
            IdField::Ccc => self.ccc = value,
            IdField::Fff => self.fff = value,
            IdField::B => self.b = value,
            IdField::Dd => self.dd = value,
            IdField::V => self.v = value,
            IdField::Llll => self.llll = value,
            IdField::Uuuu => self.uuuu = value,
            IdField::T => self.t = value,
            IdField::Rr => self.rr = value,
            IdField::O => self.o = value,
            IdField::Hh => self.hh = value,
            IdField::Ttt => self.ttt = value,
            IdField::Thresh => self.thresh = decode_threshold(value),
            IdField::I => self.i = value,
            IdField::S => self.s = value,
            IdField::G => self.g = value,
        }
    }

    /// Zero-padded, fixed-width rendering of one field
    pub fn padded(&self, field: IdField) -> Result<String> {
        Ok(format!(
            "{:0width$}",
            self.digits(field)?,
            width = field.width() as usize
        ))
    }
}

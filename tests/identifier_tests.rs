//! Tests for the identifier codec
//!
//! These tests verify:
//! - Decimal-digit extraction of every identifier field
//! - Encode/decode round trips over the full field ranges
//! - Threshold `WXXXXYY` encoding, including zero and negative exponents
//! - Validation of out-of-range fields

use proptest::prelude::*;
use tdlpack::ident::{decode_threshold, encode_threshold, STATION_LIST_WORD};
use tdlpack::{IdField, Identifier, IdentifierFields, TdlpackError};

// =============================================================================
// Helper Functions
// =============================================================================

/// Threshold code with a leading non-zero mantissa digit, so the code is the
/// one the encoder itself would choose
fn canonical_threshold_code(negative: bool, mantissa: u32, exponent: i32) -> u32 {
    let exponent_code = if exponent >= 0 {
        exponent as u32
    } else {
        50 + exponent.unsigned_abs()
    };
    u32::from(negative) * 1_000_000 + mantissa * 100 + exponent_code
}

fn fields_strategy() -> impl Strategy<Value = IdentifierFields> {
    let word1 = (0u32..=999, 0u32..=999, 0u32..=9, 0u32..=99);
    let word2 = (0u32..=9, 0u32..=9999, 0u32..=9999);
    let word3 = (0u32..=9, 0u32..=99, 0u32..=9, 0u32..=99, 0u32..=999);
    let word4 = (
        prop_oneof![Just(None::<(bool, u32, i32)>), (any::<bool>(), 1000u32..=9999, -10i32..=10).prop_map(Some)],
        0u32..=9,
        0u32..=9,
        0u32..=9,
    );

    (word1, word2, word3, word4).prop_map(
        |((ccc, fff, b, dd), (v, llll, uuuu), (t, rr, o, hh, ttt), (thresh, i, s, g))| {
            let thresh = thresh
                .map(|(negative, mantissa, exponent)| {
                    decode_threshold(canonical_threshold_code(negative, mantissa, exponent))
                })
                .unwrap_or(0.0);
            IdentifierFields {
                ccc,
                fff,
                b,
                dd,
                v,
                llll,
                uuuu,
                t,
                rr,
                o,
                hh,
                ttt,
                thresh,
                i,
                s,
                g,
            }
        },
    )
}

// =============================================================================
// Decode Tests
// =============================================================================

#[test]
fn test_decode_extracts_decimal_digits() {
    // CCC FFF B DD | V LLLL UUUU | T RR O HH TTT | WXXXXYY I S G
    let fields = Identifier::new([123_456_789, 700_080_002, 112_306_024, 250_052_123]).decode();

    assert_eq!(fields.ccc, 123);
    assert_eq!(fields.fff, 456);
    assert_eq!(fields.b, 7);
    assert_eq!(fields.dd, 89);
    assert_eq!(fields.v, 7);
    assert_eq!(fields.llll, 8);
    assert_eq!(fields.uuuu, 2);
    assert_eq!(fields.t, 1);
    assert_eq!(fields.rr, 12);
    assert_eq!(fields.o, 3);
    assert_eq!(fields.hh, 6);
    assert_eq!(fields.ttt, 24);
    assert_eq!(fields.thresh, 0.0025);
    assert_eq!(fields.i, 1);
    assert_eq!(fields.s, 2);
    assert_eq!(fields.g, 3);
}

#[test]
fn test_lead_hours_from_word_three() {
    let identifier = Identifier::new([1_000_008, 0, 6_048, 0]);

    assert_eq!(identifier.lead_hours(), 48);
    assert_eq!(identifier.decode().hh, 6);
}

#[test]
fn test_station_list_identifier() {
    assert!(Identifier::STATION_LIST.is_station_list());
    assert_eq!(Identifier::STATION_LIST.words(), [STATION_LIST_WORD, 0, 0, 0]);
    assert!(!Identifier::new([1_000_008, 0, 0, 0]).is_station_list());
}

#[test]
fn test_identifier_display_is_zero_padded() {
    let identifier = Identifier::new([1_000_008, 0, 24, 0]);

    assert_eq!(
        identifier.to_string(),
        "001000008 000000000 000000024 0000000000"
    );
}

// =============================================================================
// Encode Tests
// =============================================================================

#[test]
fn test_encode_places_fields() {
    let fields = IdentifierFields {
        ccc: 1,
        fff: 0,
        dd: 8,
        ttt: 24,
        thresh: 1.5,
        g: 2,
        ..Default::default()
    };

    let words = fields.encode().unwrap();

    assert_eq!(words, [1_000_008, 0, 24, 150_001_002]);
}

#[test]
fn test_encode_rejects_out_of_range_field() {
    let fields = IdentifierFields {
        ccc: 1000,
        ..Default::default()
    };

    let result = fields.encode();

    assert!(matches!(result, Err(TdlpackError::Validation(_))));
}

#[test]
fn test_encode_rejects_out_of_range_lead() {
    let fields = IdentifierFields {
        ttt: 1000,
        ..Default::default()
    };

    assert!(matches!(
        Identifier::from_fields(&fields),
        Err(TdlpackError::Validation(_))
    ));
}

#[test]
fn test_padded_field_rendering() {
    let fields = IdentifierFields {
        ccc: 3,
        fff: 7,
        llll: 850,
        ..Default::default()
    };

    assert_eq!(fields.padded(IdField::Ccc).unwrap(), "003");
    assert_eq!(fields.padded(IdField::Fff).unwrap(), "007");
    assert_eq!(fields.padded(IdField::Llll).unwrap(), "0850");
}

#[test]
fn test_set_digits_updates_field() {
    let mut fields = IdentifierFields::default();

    fields.set_digits(IdField::Ttt, 72);
    fields.set_digits(IdField::Thresh, 150_001);

    assert_eq!(fields.ttt, 72);
    assert_eq!(fields.thresh, 1.5);
}

#[test]
fn test_field_names_parse() {
    assert_eq!("ccc".parse::<IdField>().unwrap(), IdField::Ccc);
    assert_eq!("TTT".parse::<IdField>().unwrap(), IdField::Ttt);
    assert!(matches!(
        "nope".parse::<IdField>(),
        Err(TdlpackError::Validation(_))
    ));
}

// =============================================================================
// Threshold Tests
// =============================================================================

#[test]
fn test_threshold_zero_round_trips_exactly() {
    assert_eq!(encode_threshold(0.0).unwrap(), 0);
    assert_eq!(decode_threshold(0), 0.0);
}

#[test]
fn test_threshold_zero_mantissa_decodes_to_zero() {
    assert_eq!(decode_threshold(1_000_012), 0.0);
}

#[test]
fn test_threshold_positive_exponent() {
    assert_eq!(encode_threshold(1.5).unwrap(), 150_001);
    assert_eq!(encode_threshold(250.0).unwrap(), 250_003);
    assert_eq!(decode_threshold(250_003), 250.0);
}

#[test]
fn test_threshold_negative_exponent() {
    assert_eq!(encode_threshold(0.0025).unwrap(), 250_052);
    assert_eq!(decode_threshold(250_052), 0.0025);
}

#[test]
fn test_threshold_negative_value() {
    assert_eq!(encode_threshold(-1.5).unwrap(), 1_150_001);
    assert_eq!(decode_threshold(1_150_001), -1.5);
}

#[test]
fn test_threshold_rounding_carry() {
    // 0.99996 rounds up into a fifth mantissa digit
    let code = encode_threshold(0.99996).unwrap();

    assert_eq!(code, 100_001);
    assert_eq!(decode_threshold(code), 1.0);
}

#[test]
fn test_threshold_rejects_non_finite() {
    assert!(matches!(
        encode_threshold(f64::NAN),
        Err(TdlpackError::Validation(_))
    ));
    assert!(matches!(
        encode_threshold(f64::INFINITY),
        Err(TdlpackError::Validation(_))
    ));
}

#[test]
fn test_threshold_rejects_huge_exponent() {
    assert!(matches!(
        encode_threshold(1e60),
        Err(TdlpackError::Validation(_))
    ));
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_fields_round_trip(fields in fields_strategy()) {
        let words = fields.encode().unwrap();
        prop_assert_eq!(IdentifierFields::decode(words), fields);
        prop_assert_eq!(Identifier::new(words).lead_hours(), fields.ttt);
    }

    #[test]
    fn prop_threshold_round_trip(
        negative in any::<bool>(),
        mantissa in 1u32..=9999,
        exponent in -8i32..=8,
    ) {
        let magnitude = f64::from(mantissa) * 10f64.powi(exponent - 4);
        let value = if negative { -magnitude } else { magnitude };

        let decoded = decode_threshold(encode_threshold(value).unwrap());

        prop_assert!((decoded - value).abs() / value.abs().max(1.0) < 1e-3);
    }
}

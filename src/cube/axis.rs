//! Axes and the shared Cube
//!
//! An axis is a named, sorted set of unique coordinate values. A [`Cube`] maps
//! axis names to those sets in canonical order; two cubes are equal only if
//! every axis and every value agrees.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use crate::archive::DataRecord;
use crate::error::{Result, TdlpackError};
use crate::ident::IdField;

// =============================================================================
// Axis Names
// =============================================================================

/// Axis of a dataset, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisName {
    Date,
    Lead,
    Ccc,
    Fff,
    B,
    Dd,
    V,
    Llll,
    Uuuu,
    T,
    O,
    Thresh,
    I,
    S,
    G,
    Y,
    X,
    Station,
}

/// What kind of value an axis holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisKind {
    Date,
    Lead,
    Int,
    Thresh,
    Index,
    Station,
}

impl AxisName {
    /// Axes whose values come from record metadata, in canonical order
    pub const RECORD_AXES: [AxisName; 15] = [
        AxisName::Date,
        AxisName::Lead,
        AxisName::Ccc,
        AxisName::Fff,
        AxisName::B,
        AxisName::Dd,
        AxisName::V,
        AxisName::Llll,
        AxisName::Uuuu,
        AxisName::T,
        AxisName::O,
        AxisName::Thresh,
        AxisName::I,
        AxisName::S,
        AxisName::G,
    ];

    pub const ALL: [AxisName; 18] = [
        AxisName::Date,
        AxisName::Lead,
        AxisName::Ccc,
        AxisName::Fff,
        AxisName::B,
        AxisName::Dd,
        AxisName::V,
        AxisName::Llll,
        AxisName::Uuuu,
        AxisName::T,
        AxisName::O,
        AxisName::Thresh,
        AxisName::I,
        AxisName::S,
        AxisName::G,
        AxisName::Y,
        AxisName::X,
        AxisName::Station,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AxisName::Date => "date",
            AxisName::Lead => "lead",
            AxisName::Station => "station",
            AxisName::Y => "y",
            AxisName::X => "x",
            other => other.id_field().map(IdField::name).unwrap_or("?"),
        }
    }

    /// Identifier field backing this axis, if any
    pub fn id_field(self) -> Option<IdField> {
        Some(match self {
            AxisName::Ccc => IdField::Ccc,
            AxisName::Fff => IdField::Fff,
            AxisName::B => IdField::B,
            AxisName::Dd => IdField::Dd,
            AxisName::V => IdField::V,
            AxisName::Llll => IdField::Llll,
            AxisName::Uuuu => IdField::Uuuu,
            AxisName::T => IdField::T,
            AxisName::O => IdField::O,
            AxisName::Thresh => IdField::Thresh,
            AxisName::I => IdField::I,
            AxisName::S => IdField::S,
            AxisName::G => IdField::G,
            AxisName::Lead => IdField::Ttt,
            AxisName::Date | AxisName::Y | AxisName::X | AxisName::Station => return None,
        })
    }

    pub fn kind(self) -> AxisKind {
        match self {
            AxisName::Date => AxisKind::Date,
            AxisName::Lead => AxisKind::Lead,
            AxisName::Thresh => AxisKind::Thresh,
            AxisName::Y | AxisName::X => AxisKind::Index,
            AxisName::Station => AxisKind::Station,
            _ => AxisKind::Int,
        }
    }

    /// Y, X and Station come from record geometry, not metadata
    pub fn is_spatial(self) -> bool {
        matches!(self, AxisName::Y | AxisName::X | AxisName::Station)
    }

    /// This axis's coordinate for one data record
    pub fn value_of(self, data: &DataRecord) -> Option<AxisValue> {
        let fields = data.fields();
        Some(match self {
            AxisName::Date => AxisValue::Date(data.reference()),
            AxisName::Lead => AxisValue::Lead(data.lead_hours()),
            AxisName::Thresh => AxisValue::Thresh(Threshold(fields.thresh)),
            AxisName::Ccc => AxisValue::Int(fields.ccc),
            AxisName::Fff => AxisValue::Int(fields.fff),
            AxisName::B => AxisValue::Int(fields.b),
            AxisName::Dd => AxisValue::Int(fields.dd),
            AxisName::V => AxisValue::Int(fields.v),
            AxisName::Llll => AxisValue::Int(fields.llll),
            AxisName::Uuuu => AxisValue::Int(fields.uuuu),
            AxisName::T => AxisValue::Int(fields.t),
            AxisName::O => AxisValue::Int(fields.o),
            AxisName::I => AxisValue::Int(fields.i),
            AxisName::S => AxisValue::Int(fields.s),
            AxisName::G => AxisValue::Int(fields.g),
            AxisName::Y | AxisName::X | AxisName::Station => return None,
        })
    }
}

impl fmt::Display for AxisName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AxisName {
    type Err = TdlpackError;

    fn from_str(s: &str) -> Result<Self> {
        AxisName::ALL
            .iter()
            .copied()
            .find(|axis| axis.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| TdlpackError::validation(format!("unknown axis '{}'", s)))
    }
}

// =============================================================================
// Axis Values
// =============================================================================

/// A threshold coordinate with a total order
#[derive(Debug, Clone, Copy)]
pub struct Threshold(pub f64);

impl PartialEq for Threshold {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Threshold {}

impl PartialOrd for Threshold {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Threshold {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Threshold {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// One coordinate value along an axis
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AxisValue {
    Date(NaiveDateTime),
    /// Lead time in hours
    Lead(u32),
    Int(u32),
    Thresh(Threshold),
    /// Grid row or column
    Index(usize),
    Station(String),
}

impl AxisValue {
    pub fn date(date: NaiveDateTime) -> Self {
        AxisValue::Date(date)
    }

    pub fn lead(hours: u32) -> Self {
        AxisValue::Lead(hours)
    }

    pub fn int(value: u32) -> Self {
        AxisValue::Int(value)
    }

    pub fn thresh(value: f64) -> Self {
        AxisValue::Thresh(Threshold(value))
    }

    pub fn station(label: impl Into<String>) -> Self {
        AxisValue::Station(label.into())
    }

    pub fn kind(&self) -> AxisKind {
        match self {
            AxisValue::Date(_) => AxisKind::Date,
            AxisValue::Lead(_) => AxisKind::Lead,
            AxisValue::Int(_) => AxisKind::Int,
            AxisValue::Thresh(_) => AxisKind::Thresh,
            AxisValue::Index(_) => AxisKind::Index,
            AxisValue::Station(_) => AxisKind::Station,
        }
    }

    /// Can this value sit on `axis`?
    pub fn fits(&self, axis: AxisName) -> bool {
        self.kind() == axis.kind()
    }
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisValue::Date(date) => write!(f, "{}", date.format("%Y%m%d%H")),
            AxisValue::Lead(hours) => write!(f, "{}h", hours),
            AxisValue::Int(value) => write!(f, "{}", value),
            AxisValue::Thresh(Threshold(value)) => write!(f, "{}", value),
            AxisValue::Index(index) => write!(f, "{}", index),
            AxisValue::Station(label) => f.write_str(label),
        }
    }
}

impl Serialize for AxisValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            AxisValue::Int(value) => serializer.serialize_u32(*value),
            AxisValue::Lead(hours) => serializer.serialize_u32(*hours),
            AxisValue::Index(index) => serializer.serialize_u64(*index as u64),
            AxisValue::Thresh(Threshold(value)) => serializer.serialize_f64(*value),
            other => serializer.collect_str(other),
        }
    }
}

impl From<NaiveDateTime> for AxisValue {
    fn from(date: NaiveDateTime) -> Self {
        AxisValue::Date(date)
    }
}

impl From<&str> for AxisValue {
    fn from(label: &str) -> Self {
        AxisValue::Station(label.to_string())
    }
}

// =============================================================================
// Cube
// =============================================================================

/// Ordered mapping of axis name to its sorted unique values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Cube {
    axes: BTreeMap<AxisName, Vec<AxisValue>>,
}

impl Cube {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an axis; values are sorted and deduplicated
    pub fn insert(&mut self, axis: AxisName, values: impl IntoIterator<Item = AxisValue>) {
        let mut values: Vec<AxisValue> = values.into_iter().collect();
        values.sort();
        values.dedup();
        self.axes.insert(axis, values);
    }

    pub fn get(&self, axis: AxisName) -> Option<&[AxisValue]> {
        self.axes.get(&axis).map(Vec::as_slice)
    }

    pub fn contains(&self, axis: AxisName) -> bool {
        self.axes.contains_key(&axis)
    }

    /// Axis names in canonical order
    pub fn names(&self) -> Vec<AxisName> {
        self.axes.keys().copied().collect()
    }

    /// Metadata axes only, in canonical order
    pub fn record_axes(&self) -> Vec<AxisName> {
        self.axes.keys().copied().filter(|axis| !axis.is_spatial()).collect()
    }

    pub fn len(&self, axis: AxisName) -> usize {
        self.axes.get(&axis).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.axes.values().map(Vec::len).collect()
    }

    /// Rank of `value` within `axis`
    pub fn position(&self, axis: AxisName, value: &AxisValue) -> Option<usize> {
        self.axes.get(&axis)?.binary_search(value).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AxisName, &[AxisValue])> {
        self.axes.iter().map(|(axis, values)| (*axis, values.as_slice()))
    }

    /// Structural comparison naming the first axis that disagrees
    pub fn ensure_same(&self, other: &Cube) -> Result<()> {
        for axis in AxisName::ALL {
            match (self.axes.get(&axis), other.axes.get(&axis)) {
                (None, None) => {}
                (Some(a), Some(b)) if a == b => {}
                (a, b) => {
                    return Err(TdlpackError::schema(format!(
                        "cubes disagree on axis '{}' ({} vs {} values); filter to a single cube",
                        axis,
                        a.map_or(0, Vec::len),
                        b.map_or(0, Vec::len)
                    )))
                }
            }
        }
        Ok(())
    }
}

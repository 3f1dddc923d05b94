//! Block writes
//!
//! The inverse of a block read: for every coordinate in the Cartesian product
//! of the given axes (right-most axis fastest), build the record identifier
//! from the coordinate plus constant attributes, pack the provided values,
//! and append one data record.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::archive::{ArchiveWriter, Geometry, MessageHeader};
use crate::codec::{PayloadCodec, PayloadContext};
use crate::error::{Result, TdlpackError};
use crate::ident::{Identifier, IdentifierFields};

use super::axis::{AxisName, AxisValue, Threshold};
use super::group::{GeometryInfo, VariableGroup};

/// Decimal scale used for constant or all-missing data
const CONSTANT_SCALE: i32 = 9;

/// How the decimal scale of each written record is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizationPolicy {
    Fixed(i32),
    /// Enough decimal places to resolve `min_unique` steps across the range
    Auto { min_unique: u32 },
}

impl QuantizationPolicy {
    /// Decimal scale for one record; NaN and missing sentinels are ignored
    pub fn decimal_scale(&self, values: &[f32], ctx: &PayloadContext) -> i32 {
        let min_unique = match *self {
            QuantizationPolicy::Fixed(scale) => return scale,
            QuantizationPolicy::Auto { min_unique } => min_unique.max(1),
        };

        let (min, max) = values
            .iter()
            .filter(|v| !v.is_nan() && !ctx.is_missing(**v))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(f64::from(v)), hi.max(f64::from(v)))
            });
        if !min.is_finite() {
            return CONSTANT_SCALE;
        }

        let scale = if max == min {
            CONSTANT_SCALE
        } else {
            let digits = f64::from(min_unique).log10().ceil();
            let range_place = (max - min).log10().floor();
            (digits - range_place) as i32
        };
        scale.min(max_fitting_scale(min.abs().max(max.abs())))
    }
}

/// Largest decimal scale at which `magnitude` still fits an `i64` code
fn max_fitting_scale(magnitude: f64) -> i32 {
    if magnitude == 0.0 {
        return i32::MAX;
    }
    let limit = i64::MAX as f64;
    let mut scale = (limit / magnitude).log10().floor() as i32;
    while scale > i32::MIN && magnitude * 10f64.powi(scale) >= limit {
        scale -= 1;
    }
    scale
}

/// Everything needed to write one variable
#[derive(Debug, Clone)]
pub struct WriteBlock {
    /// Constant identifier components; axis values override them
    pub base: IdentifierFields,
    /// Metadata axes and their values, outermost first
    pub axes: Vec<(AxisName, Vec<AxisValue>)>,
    /// Geometry of every written record
    pub geometry: Geometry,
    pub plain: String,
    pub primary_missing: f32,
    pub secondary_missing: f32,
}

impl WriteBlock {
    /// Describe an existing variable so it can be written back
    pub fn from_group(group: &VariableGroup) -> Result<Self> {
        let geometry = match group.geometry().as_ref() {
            GeometryInfo::Grid(grid) => Geometry::Grid(grid.clone()),
            GeometryInfo::Stations { stations, .. } => Geometry::Stations {
                count: stations.len(),
            },
            GeometryInfo::Empty => {
                return Err(TdlpackError::validation(format!(
                    "variable {} has no geometry",
                    group.name()
                )))
            }
        };
        let axes = group
            .axes()
            .iter()
            .map(|axis| (*axis, group.cube().get(*axis).unwrap_or_default().to_vec()))
            .collect();

        Ok(Self {
            base: *group.template(),
            axes,
            geometry,
            plain: group.plain().to_string(),
            primary_missing: 9999.0,
            secondary_missing: 0.0,
        })
    }

    /// Number of records the block expands to
    pub fn record_count(&self) -> usize {
        self.axes.iter().map(|(_, values)| values.len()).product()
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (axis, values) in &self.axes {
            if axis.is_spatial() {
                return Err(TdlpackError::validation(format!(
                    "geometry axis '{}' cannot be a record axis",
                    axis
                )));
            }
            if !seen.insert(*axis) {
                return Err(TdlpackError::validation(format!("axis '{}' given twice", axis)));
            }
            if let Some(value) = values.iter().find(|value| !value.fits(*axis)) {
                return Err(TdlpackError::validation(format!(
                    "value {} does not fit axis '{}'",
                    value, axis
                )));
            }
        }
        if !seen.contains(&AxisName::Date) {
            return Err(TdlpackError::validation(
                "missing required metadata: date axis",
            ));
        }
        Ok(())
    }
}

/// Write every coordinate of `block`, asking `provider` for its values.
///
/// The provider receives one value per axis in `block.axes` order and
/// returns the record's values (NaN for missing). Returns the number of
/// records written.
pub fn write_block<F>(
    writer: &mut ArchiveWriter,
    block: &WriteBlock,
    mut provider: F,
    policy: QuantizationPolicy,
    codec: &dyn PayloadCodec,
) -> Result<usize>
where
    F: FnMut(&[AxisValue]) -> Result<Vec<f32>>,
{
    block.validate()?;
    let total = block.record_count();
    if total == 0 {
        return Ok(0);
    }

    let lens: Vec<usize> = block.axes.iter().map(|(_, values)| values.len()).collect();
    let mut odometer = vec![0usize; lens.len()];
    let mut coordinate = Vec::with_capacity(lens.len());

    for _ in 0..total {
        coordinate.clear();
        coordinate.extend(
            block
                .axes
                .iter()
                .zip(&odometer)
                .map(|((_, values), &pos)| values[pos].clone()),
        );

        let (identifier, reference) = identify(block, &coordinate)?;
        let ctx = PayloadContext::new(identifier, block.geometry.clone())
            .with_missing(block.primary_missing, block.secondary_missing);

        let values = provider(&coordinate)?;
        let scale = policy.decimal_scale(&values, &ctx);
        let packed = codec.encode(&values, &ctx, scale)?;

        let mut header = MessageHeader::new(identifier, reference, &block.geometry);
        header.plain = block.plain.clone();
        header.decimal_scale = i8::try_from(scale).map_err(|_| {
            TdlpackError::validation(format!("decimal scale {} out of range", scale))
        })?;
        header.primary_missing = block.primary_missing as i32;
        header.secondary_missing = block.secondary_missing as i32;

        writer.append_data(&header, &packed)?;
        debug!(id = %identifier, scale, "Wrote block record");

        // right-most axis varies fastest
        for dim in (0..odometer.len()).rev() {
            odometer[dim] += 1;
            if odometer[dim] < lens[dim] {
                break;
            }
            odometer[dim] = 0;
        }
    }

    Ok(total)
}

/// Identifier and reference date of one coordinate
fn identify(block: &WriteBlock, coordinate: &[AxisValue]) -> Result<(Identifier, NaiveDateTime)> {
    let mut fields = block.base;
    let mut reference = None;

    for ((axis, _), value) in block.axes.iter().zip(coordinate) {
        match (axis.id_field(), value) {
            (_, AxisValue::Date(date)) => reference = Some(*date),
            (Some(field), AxisValue::Lead(hours)) | (Some(field), AxisValue::Int(hours)) => {
                fields.set_digits(field, *hours);
            }
            (_, AxisValue::Thresh(Threshold(thresh))) => fields.thresh = *thresh,
            _ => {
                return Err(TdlpackError::validation(format!(
                    "value {} does not fit axis '{}'",
                    value, axis
                )))
            }
        }
    }

    let reference = reference
        .ok_or_else(|| TdlpackError::validation("missing required metadata: date"))?;
    Ok((Identifier::from_fields(&fields)?, reference))
}

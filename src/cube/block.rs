//! Block reads
//!
//! Materializes a rectangular sub-range of a variable into a dense array.
//! Only records inside the selection are read and decoded; cells with no
//! record, and missing-value sentinels, come back as NaN.
//!
//! ```text
//!  selectors ──► wanted miloc set ──► members ──► materialize + decode
//!                                                     │
//!        dense NaN array ◄── place at output coordinate ┘
//! ```

use std::ops::Range;

use crossbeam::channel;
use ndarray::{Array2, ArrayD, ArrayView1, Axis, IxDyn};
use tracing::debug;

use crate::archive::{Archive, Record};
use crate::codec::{PayloadCodec, PayloadContext};
use crate::error::{Result, TdlpackError};

use super::group::{GeometryInfo, Member, VariableGroup};

/// Selection along one dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisSelector {
    All,
    /// A single position; the dimension is squeezed out of the result
    Index(usize),
    /// Half-open range of positions
    Range(Range<usize>),
}

impl From<usize> for AxisSelector {
    fn from(index: usize) -> Self {
        AxisSelector::Index(index)
    }
}

impl From<Range<usize>> for AxisSelector {
    fn from(range: Range<usize>) -> Self {
        AxisSelector::Range(range)
    }
}

impl AxisSelector {
    fn positions(&self, len: usize) -> Result<Vec<usize>> {
        match self {
            AxisSelector::All => Ok((0..len).collect()),
            AxisSelector::Index(index) if *index < len => Ok(vec![*index]),
            AxisSelector::Index(index) => Err(TdlpackError::Bounds { index: *index, len }),
            AxisSelector::Range(range) if range.start <= range.end && range.end <= len => {
                Ok(range.clone().collect())
            }
            AxisSelector::Range(range) => Err(TdlpackError::Bounds {
                index: range.end.max(range.start).saturating_sub(1),
                len,
            }),
        }
    }
}

/// Read the selected block of `group`.
///
/// `selectors` apply to [`VariableGroup::dims`] in order; missing trailing
/// selectors mean `All`. With `workers > 1` records are decoded on scoped
/// worker threads.
pub fn read_block(
    group: &VariableGroup,
    selectors: &[AxisSelector],
    codec: &dyn PayloadCodec,
    workers: usize,
) -> Result<ArrayD<f32>> {
    let dims = group.dims();
    if selectors.len() > dims.len() {
        return Err(TdlpackError::validation(format!(
            "{} selectors given for {} dimensions of {}",
            selectors.len(),
            dims.len(),
            group.name()
        )));
    }

    let full_shape = group.shape();
    let mut positions = Vec::with_capacity(dims.len());
    let mut squeeze = Vec::new();
    for (dim, len) in full_shape.iter().enumerate() {
        let selector = selectors.get(dim).unwrap_or(&AxisSelector::All);
        if let AxisSelector::Index(_) = selector {
            squeeze.push(dim);
        }
        positions.push(selector.positions(*len)?);
    }

    let record_dims = group.axes().len();
    let (record_positions, spatial_positions) = positions.split_at(record_dims);

    // output position of each selected input position, per metadata axis
    let lookup: Vec<Vec<Option<usize>>> = record_positions
        .iter()
        .zip(&full_shape)
        .map(|(selected, len)| {
            let mut map = vec![None; *len];
            for (out, &pos) in selected.iter().enumerate() {
                map[pos] = Some(out);
            }
            map
        })
        .collect();

    let jobs: Vec<(&Member, Vec<usize>)> = group
        .members()
        .iter()
        .filter_map(|member| {
            let out = member
                .miloc
                .iter()
                .zip(&lookup)
                .map(|(pos, map)| map[*pos])
                .collect::<Option<Vec<usize>>>()?;
            Some((member, out))
        })
        .collect();

    let shape: Vec<usize> = positions.iter().map(Vec::len).collect();
    let mut out = ArrayD::from_elem(IxDyn(&shape), f32::NAN);
    debug!(
        variable = group.name(),
        shape = ?shape,
        records = jobs.len(),
        "Reading block"
    );

    let archive = group.archive();

    if workers <= 1 || jobs.len() <= 1 {
        for (member, coordinate) in &jobs {
            let block = load_record(archive, group, member, spatial_positions, codec)?;
            place(&mut out, coordinate, &block);
        }
    } else {
        let chunk = jobs.len().div_ceil(workers);
        let (tx, rx) = channel::unbounded();
        let results = crossbeam::scope(|scope| {
            for batch in jobs.chunks(chunk) {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    for (member, _) in batch {
                        let block = load_record(archive, group, member, spatial_positions, codec);
                        let failed = block.is_err();
                        if tx.send((member.record, block)).is_err() || failed {
                            break;
                        }
                    }
                });
            }
            drop(tx);
            rx.iter().collect::<Vec<_>>()
        })
        .map_err(|_| TdlpackError::Codec("block read worker panicked".to_string()))?;

        let coordinates: std::collections::HashMap<usize, &Vec<usize>> = jobs
            .iter()
            .map(|(member, coordinate)| (member.record, coordinate))
            .collect();
        for (record, block) in results {
            let block = block?;
            if let Some(coordinate) = coordinates.get(&record) {
                place(&mut out, coordinate, &block);
            }
        }
    }

    for &dim in squeeze.iter().rev() {
        out = out.index_axis_move(Axis(dim), 0);
    }
    Ok(out)
}

/// Copy a record's block into the output at its metadata coordinate
fn place(out: &mut ArrayD<f32>, coordinate: &[usize], block: &ArrayD<f32>) {
    let mut view = out.view_mut();
    for &pos in coordinate {
        view = view.index_axis_move(Axis(0), pos);
    }
    view.assign(block);
}

/// Decode one record and cut out the selected spatial block
fn load_record(
    archive: &Archive,
    group: &VariableGroup,
    member: &Member,
    spatial: &[Vec<usize>],
    codec: &dyn PayloadCodec,
) -> Result<ArrayD<f32>> {
    let record: &Record = archive.get(member.record)?;
    let data = record.as_data().ok_or_else(|| {
        TdlpackError::format(format!("Record {} is not a data record", member.record))
    })?;

    let message = archive.materialize_payload(record)?;
    let ctx = PayloadContext::from_header(data.header());
    let mut values = codec.decode(data.packed(&message)?, &ctx)?;
    for value in values.iter_mut() {
        if ctx.is_missing(*value) {
            *value = f32::NAN;
        }
    }

    match group.geometry().as_ref() {
        GeometryInfo::Grid(grid) => {
            let (ny, nx) = grid.shape();
            let field = Array2::from_shape_vec((ny, nx), values).map_err(|err| {
                TdlpackError::Codec(format!(
                    "record {} does not fill a {}x{} grid: {}",
                    member.record, ny, nx, err
                ))
            })?;
            Ok(field
                .select(Axis(0), &spatial[0])
                .select(Axis(1), &spatial[1])
                .into_dyn())
        }
        GeometryInfo::Stations {
            stations,
            one_station_list_and_ordered,
        } => {
            let row = if *one_station_list_and_ordered {
                if values.len() != stations.len() {
                    return Err(TdlpackError::Codec(format!(
                        "record {} holds {} values for {} stations",
                        member.record,
                        values.len(),
                        stations.len()
                    )));
                }
                values
            } else {
                let list = archive.station_list_for(data)?.ok_or_else(|| {
                    TdlpackError::format(format!("record {} has no station list", member.record))
                })?;
                if values.len() != list.len() {
                    return Err(TdlpackError::Codec(format!(
                        "record {} holds {} values for {} stations",
                        member.record,
                        values.len(),
                        list.len()
                    )));
                }
                let mut row = vec![f32::NAN; stations.len()];
                for (label, value) in list.labels().iter().zip(values) {
                    if let Ok(pos) = stations.binary_search(label) {
                        row[pos] = value;
                    }
                }
                row
            };
            Ok(ArrayView1::from(&row)
                .select(Axis(0), &spatial[0])
                .into_dyn())
        }
        GeometryInfo::Empty => Err(TdlpackError::schema("group has no geometry")),
    }
}

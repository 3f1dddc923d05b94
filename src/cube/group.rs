//! Variable grouping
//!
//! Splits an archive's data records into named variables, derives each
//! variable's axes, validates that the records fill a rectangular cube, and
//! reconciles record geometry into one shared spatial layout.
//!
//! ```text
//!   records ──filter──► name (ccc_fff) ──► per-variable axes ──► miloc
//!                                              │
//!                       all variables ─────────┴──► one shared Cube
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::archive::{Archive, DataRecord, GridDefinition};
use crate::error::{Result, TdlpackError};
use crate::ident::{IdField, IdentifierFields};

use super::axis::{AxisName, AxisValue, Cube};
use super::filter::{check_filters, Filters};

// =============================================================================
// Geometry
// =============================================================================

/// Spatial layout shared by every variable of a grouping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GeometryInfo {
    /// No records survived filtering
    Empty,
    Grid(GridDefinition),
    Stations {
        /// Sorted union of every referenced station list
        stations: Vec<String>,
        /// True when one sorted list serves every record, so rows copy
        /// positionally instead of aligning by label
        one_station_list_and_ordered: bool,
    },
}

impl GeometryInfo {
    pub fn spatial_axes(&self) -> Vec<AxisName> {
        match self {
            GeometryInfo::Empty => Vec::new(),
            GeometryInfo::Grid(_) => vec![AxisName::Y, AxisName::X],
            GeometryInfo::Stations { .. } => vec![AxisName::Station],
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            GeometryInfo::Empty => Vec::new(),
            GeometryInfo::Grid(grid) => {
                let (ny, nx) = grid.shape();
                vec![ny, nx]
            }
            GeometryInfo::Stations { stations, .. } => vec![stations.len()],
        }
    }

    pub fn stations(&self) -> Option<&[String]> {
        match self {
            GeometryInfo::Stations { stations, .. } => Some(stations),
            _ => None,
        }
    }
}

// =============================================================================
// Variable Group
// =============================================================================

/// A record's dense coordinate within its variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Record index in the archive
    pub record: usize,
    /// Rank along each of the variable's axes
    pub miloc: Vec<usize>,
}

/// Records sharing one name, arranged as a rectangular array.
///
/// Read-only once built; holds its archive through an `Arc` so blocks can be
/// read lazily from any thread.
#[derive(Debug, Clone)]
pub struct VariableGroup {
    name: String,
    archive: Arc<Archive>,
    axes: Vec<AxisName>,
    attributes: BTreeMap<AxisName, AxisValue>,
    template: IdentifierFields,
    plain: String,
    members: Vec<Member>,
    cube: Arc<Cube>,
    geometry: Arc<GeometryInfo>,
}

impl VariableGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn archive(&self) -> &Arc<Archive> {
        &self.archive
    }

    /// Metadata axes, in canonical order
    pub fn axes(&self) -> &[AxisName] {
        &self.axes
    }

    /// Every array dimension: metadata axes then spatial axes
    pub fn dims(&self) -> Vec<AxisName> {
        let mut dims = self.axes.clone();
        dims.extend(self.geometry.spatial_axes());
        dims
    }

    pub fn shape(&self) -> Vec<usize> {
        let mut shape: Vec<usize> = self.axes.iter().map(|axis| self.cube.len(*axis)).collect();
        shape.extend(self.geometry.shape());
        shape
    }

    /// Metadata constant across the variable
    pub fn attributes(&self) -> &BTreeMap<AxisName, AxisValue> {
        &self.attributes
    }

    /// Identifier fields of the variable's first record
    pub fn template(&self) -> &IdentifierFields {
        &self.template
    }

    pub fn plain(&self) -> &str {
        &self.plain
    }

    /// Members sorted by `miloc`
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn cube(&self) -> &Arc<Cube> {
        &self.cube
    }

    pub fn geometry(&self) -> &Arc<GeometryInfo> {
        &self.geometry
    }
}

/// Result of one grouping call
#[derive(Debug, Clone)]
pub struct Grouping {
    pub groups: Vec<VariableGroup>,
    pub cube: Arc<Cube>,
    pub geometry: Arc<GeometryInfo>,
}

impl Grouping {
    fn empty() -> Self {
        Self {
            groups: Vec::new(),
            cube: Arc::new(Cube::new()),
            geometry: Arc::new(GeometryInfo::Empty),
        }
    }
}

// =============================================================================
// Grouping
// =============================================================================

struct Candidate<'a> {
    record: usize,
    data: &'a DataRecord,
    /// One value per `AxisName::RECORD_AXES` entry
    coords: Vec<AxisValue>,
}

/// Group an archive's data records into variables sharing one cube
pub fn group(archive: &Arc<Archive>, name_scheme: &[IdField], filters: &Filters) -> Result<Grouping> {
    check_filters(filters)?;
    if name_scheme.is_empty() {
        return Err(TdlpackError::validation("name scheme needs at least one field"));
    }

    let mut named: BTreeMap<String, Vec<Candidate<'_>>> = BTreeMap::new();
    for (record, data) in archive.data_records() {
        let coords: Vec<AxisValue> = AxisName::RECORD_AXES
            .iter()
            .filter_map(|axis| axis.value_of(data))
            .collect();
        let keep = filters.iter().all(|(axis, filter)| {
            axis_rank(*axis).is_some_and(|rank| filter.matches(&coords[rank]))
        });
        if !keep {
            continue;
        }

        let name = variable_name(data.fields(), name_scheme)?;
        named.entry(name).or_default().push(Candidate {
            record: record.index(),
            data,
            coords,
        });
    }

    if named.is_empty() {
        debug!("No records left after filtering");
        return Ok(Grouping::empty());
    }

    let mut shared: Option<Cube> = None;
    let mut assembled = Vec::with_capacity(named.len());
    for (name, candidates) in &named {
        let variable = assemble(name, candidates)?;
        match &shared {
            Some(cube) => cube.ensure_same(&variable.cube)?,
            None => shared = Some(variable.cube.clone()),
        }
        assembled.push(variable);
    }

    let geometry = reconcile_geometry(archive, named.values().flatten())?;
    let mut cube = shared.unwrap_or_default();
    match &geometry {
        GeometryInfo::Grid(grid) => {
            let (ny, nx) = grid.shape();
            cube.insert(AxisName::Y, (0..ny).map(AxisValue::Index));
            cube.insert(AxisName::X, (0..nx).map(AxisValue::Index));
        }
        GeometryInfo::Stations { stations, .. } => {
            cube.insert(AxisName::Station, stations.iter().cloned().map(AxisValue::Station));
        }
        GeometryInfo::Empty => {}
    }

    let cube = Arc::new(cube);
    let geometry = Arc::new(geometry);
    let groups = assembled
        .into_iter()
        .map(|variable| VariableGroup {
            name: variable.name,
            archive: Arc::clone(archive),
            axes: variable.axes,
            attributes: variable.attributes,
            template: variable.template,
            plain: variable.plain,
            members: variable.members,
            cube: Arc::clone(&cube),
            geometry: Arc::clone(&geometry),
        })
        .collect::<Vec<_>>();

    debug!(variables = groups.len(), shape = ?cube.shape(), "Grouped records");
    Ok(Grouping {
        groups,
        cube,
        geometry,
    })
}

/// Zero-padded name fields joined with `_`
pub fn variable_name(fields: &IdentifierFields, name_scheme: &[IdField]) -> Result<String> {
    let parts = name_scheme
        .iter()
        .map(|field| fields.padded(*field))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("_"))
}

fn axis_rank(axis: AxisName) -> Option<usize> {
    AxisName::RECORD_AXES.iter().position(|a| *a == axis)
}

struct Assembled {
    name: String,
    cube: Cube,
    axes: Vec<AxisName>,
    attributes: BTreeMap<AxisName, AxisValue>,
    template: IdentifierFields,
    plain: String,
    members: Vec<Member>,
}

fn assemble(name: &str, candidates: &[Candidate<'_>]) -> Result<Assembled> {
    let Some(first) = candidates.first() else {
        return Err(TdlpackError::schema(format!("variable {} has no records", name)));
    };
    let template = *first.data.fields();

    // Axes: fields that vary, plus date and lead always
    let mut cube = Cube::new();
    let mut axes = Vec::new();
    let mut attributes = BTreeMap::new();
    for (rank, axis) in AxisName::RECORD_AXES.iter().copied().enumerate() {
        let distinct: BTreeSet<&AxisValue> = candidates.iter().map(|c| &c.coords[rank]).collect();
        if distinct.len() > 1 || matches!(axis, AxisName::Date | AxisName::Lead) {
            cube.insert(axis, distinct.into_iter().cloned());
            axes.push((rank, axis));
        } else {
            attributes.insert(axis, first.coords[rank].clone());
        }
    }

    if let Some(c) = candidates
        .iter()
        .find(|c| c.data.fields().rr != template.rr || c.data.fields().hh != template.hh)
    {
        return Err(TdlpackError::schema(format!(
            "variable {}: record {} differs in rr/hh, which cannot form an axis",
            name, c.record
        )));
    }

    // Every value along an axis must cover the same number of records
    for &(rank, axis) in &axes {
        let mut counts: BTreeMap<&AxisValue, usize> = BTreeMap::new();
        for c in candidates {
            *counts.entry(&c.coords[rank]).or_default() += 1;
        }
        let mut values = counts.values();
        let expected = values.next().copied().unwrap_or(0);
        if values.any(|&count| count != expected) {
            return Err(TdlpackError::schema(format!(
                "variable {}: uneven number of records along axis '{}' ({:?})",
                name,
                axis,
                counts
                    .iter()
                    .map(|(value, count)| format!("{}={}", value, count))
                    .collect::<Vec<_>>()
            )));
        }
    }

    let cells: usize = axes.iter().map(|(_, axis)| cube.len(*axis)).product();
    if cells != candidates.len() {
        return Err(TdlpackError::schema(format!(
            "variable {}: {} records do not fill a cube of {} cells",
            name,
            candidates.len(),
            cells
        )));
    }

    let mut seen = HashSet::with_capacity(candidates.len());
    let mut members = Vec::with_capacity(candidates.len());
    for c in candidates {
        let miloc = axes
            .iter()
            .map(|(rank, axis)| cube.position(*axis, &c.coords[*rank]))
            .collect::<Option<Vec<usize>>>()
            .ok_or_else(|| {
                TdlpackError::schema(format!("variable {}: record {} off its cube", name, c.record))
            })?;
        if !seen.insert(miloc.clone()) {
            return Err(TdlpackError::schema(format!(
                "variable {}: record {} duplicates coordinate {:?}",
                name, c.record, miloc
            )));
        }
        members.push(Member {
            record: c.record,
            miloc,
        });
    }
    members.sort_by(|a, b| a.miloc.cmp(&b.miloc));

    Ok(Assembled {
        name: name.to_string(),
        cube,
        axes: axes.into_iter().map(|(_, axis)| axis).collect(),
        attributes,
        template,
        plain: first.data.header().plain.clone(),
        members,
    })
}

fn reconcile_geometry<'a>(
    archive: &Archive,
    candidates: impl Iterator<Item = &'a Candidate<'a>>,
) -> Result<GeometryInfo> {
    let mut grid: Option<&GridDefinition> = None;
    let mut grid_shapes = BTreeSet::new();
    let mut station_lists = BTreeSet::new();

    for c in candidates {
        match &c.data.header().grid {
            Some(definition) => {
                grid_shapes.insert(definition.shape());
                grid.get_or_insert(definition);
            }
            None => {
                let index = c.data.station_list_index().ok_or_else(|| {
                    TdlpackError::format(format!(
                        "vector record {} has no preceding station list",
                        c.record
                    ))
                })?;
                station_lists.insert(index);
            }
        }
    }

    if !grid_shapes.is_empty() && !station_lists.is_empty() {
        return Err(TdlpackError::Unsupported(
            "records mix station and gridded geometry; filter to one kind".to_string(),
        ));
    }
    if grid_shapes.len() > 1 {
        return Err(TdlpackError::Unsupported(format!(
            "multiple grid shapes {:?} cannot share one cube",
            grid_shapes
        )));
    }
    if let Some(definition) = grid {
        return Ok(GeometryInfo::Grid(definition.clone()));
    }

    let lists = station_lists
        .iter()
        .map(|&index| archive.station_list(index))
        .collect::<Result<Vec<_>>>()?;
    let Some(first) = lists.first() else {
        return Ok(GeometryInfo::Empty);
    };

    let identical = lists.iter().all(|list| list.labels() == first.labels());
    let stations: Vec<String> = lists
        .iter()
        .flat_map(|list| list.labels().iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let one_station_list_and_ordered = identical && first.is_sorted();
    if !one_station_list_and_ordered {
        warn!(
            lists = lists.len(),
            stations = stations.len(),
            "Station lists are not identical and ordered; aligning rows by label"
        );
    }

    Ok(GeometryInfo::Stations {
        stations,
        one_station_list_and_ordered,
    })
}

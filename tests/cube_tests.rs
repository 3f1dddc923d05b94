//! Tests for the cube assembly engine
//!
//! These tests verify:
//! - Grouping records into rectangular variables on a shared cube
//! - Schema errors for uneven coverage and disagreeing cubes
//! - Station list reconciliation by label
//! - Block reads: selectors, squeezing, missing values, worker threads
//! - Block writes and automatic quantization

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use ndarray::{Ix2, Ix3, Ix4};
use tdlpack::archive::{Geometry, GridDefinition, MessageHeader, StationList};
use tdlpack::codec::PayloadContext;
use tdlpack::cube::{
    group, read_block, variable_name, write_block, AxisName, AxisSelector, AxisValue, Cube,
    Filter, Filters, GeometryInfo, QuantizationPolicy, WriteBlock,
};
use tdlpack::{
    Archive, ArchiveWriter, Config, IdField, Identifier, IdentifierFields, Layout, OpenMode,
    PayloadCodec, ScaledIntegerCodec, TdlpackError,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const SCHEME: [IdField; 2] = [IdField::Ccc, IdField::Fff];

fn setup_temp_archive() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cube.tdlp");
    (temp_dir, path)
}

fn date(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn identifier(ccc: u32, lead: u32) -> Identifier {
    let fields = IdentifierFields {
        ccc,
        dd: 8,
        ttt: lead,
        ..Default::default()
    };
    Identifier::from_fields(&fields).unwrap()
}

/// 3 x 2 grid
fn small_grid() -> GridDefinition {
    GridDefinition {
        map_projection: 5,
        nx: 3,
        ny: 2,
        lat_ll: 100_000,
        lon_ll: 2_000_000,
        orient_lon: 1_050_000,
        grid_length_mm: 47_625_000,
        std_lat: 600_000,
    }
}

/// Value written at one grid cell of one record
fn cell_value(ccc: u32, day: u32, lead: u32, cell: usize) -> f32 {
    (ccc * 100 + day * 10 + lead / 24) as f32 + cell as f32 * 0.5
}

fn append(writer: &mut ArchiveWriter, id: Identifier, day: u32, geometry: Geometry, values: &[f32]) {
    let ctx = PayloadContext::new(id, geometry.clone());
    let packed = ScaledIntegerCodec::new().encode(values, &ctx, 2).unwrap();
    let mut header = MessageHeader::new(id, date(day), &geometry);
    header.decimal_scale = 2;
    writer.append_data(&header, &packed).unwrap();
}

/// One gridded record per (ccc, day, lead)
fn write_grid_archive(path: &Path, records: &[(u32, u32, u32)]) -> Arc<Archive> {
    let mut writer =
        ArchiveWriter::create(path, Layout::Sequential, OpenMode::Create, &Config::default())
            .unwrap();
    for &(ccc, day, lead) in records {
        let values: Vec<f32> = (0..6).map(|cell| cell_value(ccc, day, lead, cell)).collect();
        append(&mut writer, identifier(ccc, lead), day, Geometry::Grid(small_grid()), &values);
    }
    writer.close().unwrap();
    Arc::new(Archive::open(path).unwrap())
}

/// Every (day, lead) of 3 days x 2 leads for each ccc
fn full_cube(cccs: &[u32]) -> Vec<(u32, u32, u32)> {
    let mut records = Vec::new();
    for &ccc in cccs {
        for day in 1..=3 {
            for lead in [24, 48] {
                records.push((ccc, day, lead));
            }
        }
    }
    records
}

/// Two vector records: {A,B,C} on day 1, {B,C,D} on day 2
fn write_station_archive(path: &Path) -> Arc<Archive> {
    let mut writer =
        ArchiveWriter::create(path, Layout::Sequential, OpenMode::Create, &Config::default())
            .unwrap();
    writer
        .append_station_list(&StationList::new(["A", "B", "C"]).unwrap())
        .unwrap();
    append(&mut writer, identifier(7, 24), 1, Geometry::Stations { count: 3 }, &[1.0, 2.0, 3.0]);
    writer
        .append_station_list(&StationList::new(["B", "C", "D"]).unwrap())
        .unwrap();
    append(&mut writer, identifier(7, 24), 2, Geometry::Stations { count: 3 }, &[4.0, 5.0, 6.0]);
    writer.close().unwrap();
    Arc::new(Archive::open(path).unwrap())
}

// =============================================================================
// Grouping Tests
// =============================================================================

#[test]
fn test_group_builds_dense_cube() {
    let (_temp, path) = setup_temp_archive();
    let archive = write_grid_archive(&path, &full_cube(&[1]));

    let grouping = group(&archive, &SCHEME, &Filters::new()).unwrap();

    assert_eq!(grouping.groups.len(), 1);
    let variable = &grouping.groups[0];
    assert_eq!(variable.name(), "001_000");
    assert_eq!(variable.axes(), &[AxisName::Date, AxisName::Lead]);
    assert_eq!(variable.dims(), vec![AxisName::Date, AxisName::Lead, AxisName::Y, AxisName::X]);
    assert_eq!(variable.shape(), vec![3, 2, 2, 3]);
    assert_eq!(variable.len(), 6);
    assert_eq!(variable.attributes().get(&AxisName::Ccc), Some(&AxisValue::int(1)));
    assert_eq!(
        grouping.cube.get(AxisName::Lead).unwrap(),
        &[AxisValue::lead(24), AxisValue::lead(48)]
    );
    assert_eq!(*grouping.geometry, GeometryInfo::Grid(small_grid()));
}

#[test]
fn test_block_read_places_each_record() {
    let (_temp, path) = setup_temp_archive();
    let archive = write_grid_archive(&path, &full_cube(&[1]));
    let grouping = group(&archive, &SCHEME, &Filters::new()).unwrap();
    let codec = ScaledIntegerCodec::new();

    let block = read_block(
        &grouping.groups[0],
        &[
            AxisSelector::All,
            AxisSelector::All,
            AxisSelector::Index(0),
            AxisSelector::Index(0),
        ],
        &codec,
        1,
    )
    .unwrap();

    let block = block.into_dimensionality::<Ix2>().unwrap();
    assert_eq!(block.dim(), (3, 2));
    for (d, day) in [1, 2, 3].into_iter().enumerate() {
        for (l, lead) in [24, 48].into_iter().enumerate() {
            assert!((block[[d, l]] - cell_value(1, day, lead, 0)).abs() < 1e-3);
        }
    }
}

#[test]
fn test_missing_record_is_schema_error() {
    let (_temp, path) = setup_temp_archive();
    let mut records = full_cube(&[1]);
    records.remove(3);
    let archive = write_grid_archive(&path, &records);

    let result = group(&archive, &SCHEME, &Filters::new());

    assert!(matches!(result, Err(TdlpackError::Schema(_))));
}

#[test]
fn test_duplicate_record_is_schema_error() {
    let (_temp, path) = setup_temp_archive();
    let mut records = full_cube(&[1]);
    records.push((1, 1, 24));
    let archive = write_grid_archive(&path, &records);

    assert!(matches!(
        group(&archive, &SCHEME, &Filters::new()),
        Err(TdlpackError::Schema(_))
    ));
}

#[test]
fn test_disagreeing_cubes_is_schema_error() {
    let (_temp, path) = setup_temp_archive();
    let mut records = full_cube(&[1]);
    // second variable covers only two of the three days
    records.extend(full_cube(&[2]).into_iter().filter(|&(_, day, _)| day < 3));
    let archive = write_grid_archive(&path, &records);

    let result = group(&archive, &SCHEME, &Filters::new());

    match result {
        Err(TdlpackError::Schema(msg)) => assert!(msg.contains("'date'"), "{}", msg),
        other => panic!("expected schema error, got {:?}", other.map(|g| g.groups.len())),
    }
}

#[test]
fn test_varying_field_becomes_axis() {
    let (_temp, path) = setup_temp_archive();
    let archive = write_grid_archive(&path, &full_cube(&[1, 2]));

    let grouping = group(&archive, &[IdField::Fff], &Filters::new()).unwrap();

    assert_eq!(grouping.groups.len(), 1);
    let variable = &grouping.groups[0];
    assert_eq!(variable.name(), "000");
    assert_eq!(variable.axes(), &[AxisName::Date, AxisName::Lead, AxisName::Ccc]);
    assert_eq!(variable.shape(), vec![3, 2, 2, 2, 3]);
}

#[test]
fn test_empty_name_scheme_is_validation_error() {
    let (_temp, path) = setup_temp_archive();
    let archive = write_grid_archive(&path, &full_cube(&[1]));

    assert!(matches!(
        group(&archive, &[], &Filters::new()),
        Err(TdlpackError::Validation(_))
    ));
}

#[test]
fn test_variable_name_pads_fields() {
    let fields = IdentifierFields {
        ccc: 3,
        fff: 45,
        ..Default::default()
    };

    assert_eq!(variable_name(&fields, &SCHEME).unwrap(), "003_045");
}

// =============================================================================
// Filter Tests
// =============================================================================

#[test]
fn test_filters_narrow_grouping() {
    let (_temp, path) = setup_temp_archive();
    let archive = write_grid_archive(&path, &full_cube(&[1, 2]));

    let mut filters = Filters::new();
    filters.insert(AxisName::Ccc, Filter::exact(AxisValue::int(2)));
    filters.insert(
        AxisName::Date,
        Filter::range(AxisValue::date(date(1))..AxisValue::date(date(3))),
    );
    let grouping = group(&archive, &SCHEME, &filters).unwrap();

    assert_eq!(grouping.groups.len(), 1);
    assert_eq!(grouping.groups[0].name(), "002_000");
    assert_eq!(grouping.cube.len(AxisName::Date), 2);
    assert_eq!(grouping.cube.len(AxisName::Lead), 2);
}

#[test]
fn test_filter_values_list() {
    let (_temp, path) = setup_temp_archive();
    let archive = write_grid_archive(&path, &full_cube(&[1]));

    let mut filters = Filters::new();
    filters.insert(AxisName::Lead, Filter::values([AxisValue::lead(48)]));
    let grouping = group(&archive, &SCHEME, &filters).unwrap();

    assert_eq!(grouping.groups[0].shape(), vec![3, 1, 2, 3]);
}

#[test]
fn test_filter_to_nothing_is_empty() {
    let (_temp, path) = setup_temp_archive();
    let archive = write_grid_archive(&path, &full_cube(&[1]));

    let mut filters = Filters::new();
    filters.insert(AxisName::Ccc, Filter::exact(AxisValue::int(999)));
    let grouping = group(&archive, &SCHEME, &filters).unwrap();

    assert!(grouping.groups.is_empty());
    assert!(grouping.cube.is_empty());
    assert_eq!(*grouping.geometry, GeometryInfo::Empty);
}

#[test]
fn test_filter_on_geometry_axis_is_validation_error() {
    let (_temp, path) = setup_temp_archive();
    let archive = write_grid_archive(&path, &full_cube(&[1]));

    let mut filters = Filters::new();
    filters.insert(AxisName::Station, Filter::exact("KBOS"));

    assert!(matches!(
        group(&archive, &SCHEME, &filters),
        Err(TdlpackError::Validation(_))
    ));
}

#[test]
fn test_filter_value_of_wrong_kind_is_validation_error() {
    let (_temp, path) = setup_temp_archive();
    let archive = write_grid_archive(&path, &full_cube(&[1]));

    let mut filters = Filters::new();
    filters.insert(AxisName::Date, Filter::exact(AxisValue::int(1)));

    assert!(matches!(
        group(&archive, &SCHEME, &filters),
        Err(TdlpackError::Validation(_))
    ));
}

// =============================================================================
// Geometry Tests
// =============================================================================

#[test]
fn test_station_lists_reconcile_by_label() {
    let (_temp, path) = setup_temp_archive();
    let archive = write_station_archive(&path);

    let grouping = group(&archive, &SCHEME, &Filters::new()).unwrap();

    let stations: Vec<&str> = grouping
        .geometry
        .stations()
        .unwrap()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(stations, vec!["A", "B", "C", "D"]);
    assert_eq!(
        grouping.cube.get(AxisName::Station).unwrap(),
        &[
            AxisValue::station("A"),
            AxisValue::station("B"),
            AxisValue::station("C"),
            AxisValue::station("D"),
        ]
    );

    let block = read_block(
        &grouping.groups[0],
        &[AxisSelector::All, AxisSelector::Index(0)],
        &ScaledIntegerCodec::new(),
        1,
    )
    .unwrap();
    let block = block.into_dimensionality::<Ix2>().unwrap();

    assert_eq!(block.dim(), (2, 4));
    assert_eq!(block.row(0).to_vec()[..3], [1.0, 2.0, 3.0]);
    assert!(block[[0, 3]].is_nan());
    assert!(block[[1, 0]].is_nan());
    assert_eq!(block.row(1).to_vec()[1..], [4.0, 5.0, 6.0]);
}

#[test]
fn test_single_sorted_station_list_copies_positionally() {
    let (_temp, path) = setup_temp_archive();
    let mut writer =
        ArchiveWriter::create(&path, Layout::Sequential, OpenMode::Create, &Config::default())
            .unwrap();
    writer
        .append_station_list(&StationList::new(["KBOS", "KDCA"]).unwrap())
        .unwrap();
    for day in 1..=2 {
        append(&mut writer, identifier(7, 24), day, Geometry::Stations { count: 2 }, &[day as f32, 9.5]);
    }
    writer.close().unwrap();
    let archive = Arc::new(Archive::open(&path).unwrap());

    let grouping = group(&archive, &SCHEME, &Filters::new()).unwrap();

    assert!(matches!(
        grouping.geometry.as_ref(),
        GeometryInfo::Stations {
            one_station_list_and_ordered: true,
            ..
        }
    ));
    let block = read_block(&grouping.groups[0], &[], &ScaledIntegerCodec::new(), 1).unwrap();
    assert_eq!(block.shape(), &[2, 1, 2]);
    let block = block.into_dimensionality::<Ix3>().unwrap();
    assert_eq!(block[[1, 0, 0]], 2.0);
    assert_eq!(block[[1, 0, 1]], 9.5);
}

#[test]
fn test_mixed_geometry_is_unsupported() {
    let (_temp, path) = setup_temp_archive();
    let mut writer =
        ArchiveWriter::create(&path, Layout::Sequential, OpenMode::Create, &Config::default())
            .unwrap();
    writer
        .append_station_list(&StationList::new(["KBOS"]).unwrap())
        .unwrap();
    append(&mut writer, identifier(7, 24), 1, Geometry::Stations { count: 1 }, &[1.0]);
    let values: Vec<f32> = (0..6).map(|cell| cell_value(1, 1, 24, cell)).collect();
    append(&mut writer, identifier(1, 24), 1, Geometry::Grid(small_grid()), &values);
    writer.close().unwrap();
    let archive = Arc::new(Archive::open(&path).unwrap());

    assert!(matches!(
        group(&archive, &SCHEME, &Filters::new()),
        Err(TdlpackError::Unsupported(_))
    ));

    // narrowing to one kind succeeds
    let mut filters = Filters::new();
    filters.insert(AxisName::Ccc, Filter::exact(AxisValue::int(1)));
    assert!(group(&archive, &SCHEME, &filters).is_ok());
}

#[test]
fn test_multiple_grid_shapes_is_unsupported() {
    let (_temp, path) = setup_temp_archive();
    let square = GridDefinition {
        nx: 2,
        ny: 2,
        ..small_grid()
    };
    let mut writer =
        ArchiveWriter::create(&path, Layout::Sequential, OpenMode::Create, &Config::default())
            .unwrap();
    append(&mut writer, identifier(1, 24), 1, Geometry::Grid(small_grid()), &[1.0; 6]);
    append(&mut writer, identifier(2, 24), 1, Geometry::Grid(square), &[2.0; 4]);
    writer.close().unwrap();
    let archive = Arc::new(Archive::open(&path).unwrap());

    assert!(matches!(
        group(&archive, &SCHEME, &Filters::new()),
        Err(TdlpackError::Unsupported(_))
    ));

    let mut filters = Filters::new();
    filters.insert(AxisName::Ccc, Filter::exact(AxisValue::int(2)));
    let grouping = group(&archive, &SCHEME, &filters).unwrap();
    assert_eq!(grouping.cube.len(AxisName::Y), 2);
    assert_eq!(grouping.cube.len(AxisName::X), 2);
}

// =============================================================================
// Block Read Tests
// =============================================================================

#[test]
fn test_range_selector_keeps_dimension() {
    let (_temp, path) = setup_temp_archive();
    let archive = write_grid_archive(&path, &full_cube(&[1]));
    let grouping = group(&archive, &SCHEME, &Filters::new()).unwrap();

    let block = read_block(
        &grouping.groups[0],
        &[AxisSelector::Range(1..3), AxisSelector::Index(1)],
        &ScaledIntegerCodec::new(),
        1,
    )
    .unwrap();

    assert_eq!(block.shape(), &[2, 2, 3]);
    let block = block.into_dimensionality::<Ix3>().unwrap();
    assert!((block[[0, 1, 2]] - cell_value(1, 2, 48, 5)).abs() < 1e-3);
    assert!((block[[1, 0, 0]] - cell_value(1, 3, 48, 0)).abs() < 1e-3);
}

#[test]
fn test_selector_out_of_range_is_bounds_error() {
    let (_temp, path) = setup_temp_archive();
    let archive = write_grid_archive(&path, &full_cube(&[1]));
    let grouping = group(&archive, &SCHEME, &Filters::new()).unwrap();
    let codec = ScaledIntegerCodec::new();

    assert!(matches!(
        read_block(&grouping.groups[0], &[AxisSelector::Index(3)], &codec, 1),
        Err(TdlpackError::Bounds { index: 3, len: 3 })
    ));
    assert!(matches!(
        read_block(&grouping.groups[0], &vec![AxisSelector::All; 5], &codec, 1),
        Err(TdlpackError::Validation(_))
    ));
}

#[test]
fn test_missing_sentinel_reads_as_nan() {
    let (_temp, path) = setup_temp_archive();
    let mut writer =
        ArchiveWriter::create(&path, Layout::Sequential, OpenMode::Create, &Config::default())
            .unwrap();
    append(
        &mut writer,
        identifier(1, 24),
        1,
        Geometry::Grid(small_grid()),
        &[9999.0, 1.0, 2.0, 3.0, 4.0, 5.0],
    );
    writer.close().unwrap();
    let archive = Arc::new(Archive::open(&path).unwrap());
    let grouping = group(&archive, &SCHEME, &Filters::new()).unwrap();

    let block = read_block(
        &grouping.groups[0],
        &[AxisSelector::Index(0), AxisSelector::Index(0)],
        &ScaledIntegerCodec::new(),
        1,
    )
    .unwrap();
    let block = block.into_dimensionality::<Ix2>().unwrap();

    assert!(block[[0, 0]].is_nan());
    assert_eq!(block[[1, 2]], 5.0);
}

#[test]
fn test_parallel_read_matches_serial() {
    let (_temp, path) = setup_temp_archive();
    let archive = write_grid_archive(&path, &full_cube(&[1]));
    let grouping = group(&archive, &SCHEME, &Filters::new()).unwrap();
    let codec = ScaledIntegerCodec::new();

    let serial = read_block(&grouping.groups[0], &[], &codec, 1).unwrap();
    let parallel = read_block(&grouping.groups[0], &[], &codec, 4).unwrap();

    assert_eq!(serial, parallel);
}

// =============================================================================
// Cube Tests
// =============================================================================

#[test]
fn test_cube_comparison_names_axis() {
    let mut a = Cube::new();
    a.insert(AxisName::Date, [AxisValue::date(date(1))]);
    a.insert(AxisName::Lead, [AxisValue::lead(24), AxisValue::lead(48)]);
    let mut b = a.clone();
    b.insert(AxisName::Lead, [AxisValue::lead(24)]);

    assert!(a.ensure_same(&a.clone()).is_ok());
    match a.ensure_same(&b) {
        Err(TdlpackError::Schema(msg)) => assert!(msg.contains("'lead'"), "{}", msg),
        other => panic!("expected schema error, got {:?}", other),
    }
}

#[test]
fn test_cube_insert_sorts_and_dedups() {
    let mut cube = Cube::new();
    cube.insert(
        AxisName::Lead,
        [AxisValue::lead(48), AxisValue::lead(24), AxisValue::lead(48)],
    );

    assert_eq!(cube.get(AxisName::Lead).unwrap(), &[AxisValue::lead(24), AxisValue::lead(48)]);
    assert_eq!(cube.position(AxisName::Lead, &AxisValue::lead(48)), Some(1));
    assert_eq!(cube.position(AxisName::Lead, &AxisValue::lead(6)), None);
}

// =============================================================================
// Block Write Tests
// =============================================================================

fn wind_block() -> WriteBlock {
    WriteBlock {
        base: IdentifierFields {
            ccc: 3,
            fff: 1,
            dd: 8,
            ..Default::default()
        },
        axes: vec![
            (AxisName::Date, vec![AxisValue::date(date(1)), AxisValue::date(date(2))]),
            (
                AxisName::Lead,
                vec![AxisValue::lead(6), AxisValue::lead(12), AxisValue::lead(18)],
            ),
        ],
        geometry: Geometry::Grid(small_grid()),
        plain: "WIND SPEED".to_string(),
        primary_missing: 9999.0,
        secondary_missing: 0.0,
    }
}

fn wind_values(coordinate: &[AxisValue]) -> Vec<f32> {
    let day = match &coordinate[0] {
        AxisValue::Date(date) => date.day() as f32,
        other => panic!("unexpected {:?}", other),
    };
    let lead = match &coordinate[1] {
        AxisValue::Lead(hours) => *hours as f32,
        other => panic!("unexpected {:?}", other),
    };
    (0..6).map(|cell| day * 100.0 + lead + cell as f32 * 0.5).collect()
}

#[test]
fn test_write_block_round_trip() {
    let (_temp, path) = setup_temp_archive();
    let block = wind_block();
    let codec = ScaledIntegerCodec::new();

    let mut writer =
        ArchiveWriter::create(&path, Layout::Sequential, OpenMode::Create, &Config::default())
            .unwrap();
    let written = write_block(
        &mut writer,
        &block,
        |coordinate: &[AxisValue]| Ok(wind_values(coordinate)),
        QuantizationPolicy::Auto { min_unique: 1000 },
        &codec,
    )
    .unwrap();
    writer.close().unwrap();

    assert_eq!(written, 6);
    let archive = Arc::new(Archive::open(&path).unwrap());

    // right-most axis varies fastest
    let leads: Vec<u32> = archive.data_records().map(|(_, data)| data.lead_hours()).collect();
    assert_eq!(leads, vec![6, 12, 18, 6, 12, 18]);
    let first = archive.get(0).unwrap().as_data().unwrap();
    assert_eq!(first.fields().ccc, 3);
    assert_eq!(first.fields().dd, 8);
    assert_eq!(first.header().plain, "WIND SPEED");

    let grouping = group(&archive, &SCHEME, &Filters::new()).unwrap();
    let variable = &grouping.groups[0];
    assert_eq!(variable.name(), "003_001");
    let data = read_block(variable, &[], &codec, 1).unwrap();
    assert_eq!(data.shape(), &[2, 3, 2, 3]);
    let data = data.into_dimensionality::<Ix4>().unwrap();
    assert!((data[[1, 2, 1, 2]] - (200.0 + 18.0 + 2.5)).abs() < 1e-3);
}

#[test]
fn test_write_block_requires_date_axis() {
    let (_temp, path) = setup_temp_archive();
    let mut block = wind_block();
    block.axes.remove(0);

    let mut writer =
        ArchiveWriter::create(&path, Layout::Sequential, OpenMode::Create, &Config::default())
            .unwrap();
    let result = write_block(
        &mut writer,
        &block,
        |_: &[AxisValue]| Ok(vec![0.0; 6]),
        QuantizationPolicy::Fixed(1),
        &ScaledIntegerCodec::new(),
    );

    assert!(matches!(result, Err(TdlpackError::Validation(_))));
}

#[test]
fn test_write_block_rejects_geometry_axis() {
    let (_temp, path) = setup_temp_archive();
    let mut block = wind_block();
    block.axes.push((AxisName::Station, vec![AxisValue::station("KBOS")]));

    let mut writer =
        ArchiveWriter::create(&path, Layout::Sequential, OpenMode::Create, &Config::default())
            .unwrap();
    let result = write_block(
        &mut writer,
        &block,
        |_: &[AxisValue]| Ok(vec![0.0; 6]),
        QuantizationPolicy::Fixed(1),
        &ScaledIntegerCodec::new(),
    );

    assert!(matches!(result, Err(TdlpackError::Validation(_))));
}

#[test]
fn test_auto_quantization_scale() {
    let ctx = PayloadContext::new(Identifier::default(), Geometry::Stations { count: 3 });
    let auto = QuantizationPolicy::Auto { min_unique: 500 };

    assert_eq!(auto.decimal_scale(&[0.0, 5.0, 20.0], &ctx), 2);
    assert_eq!(auto.decimal_scale(&[4.0, 4.0, 4.0], &ctx), 9);
    assert_eq!(auto.decimal_scale(&[9999.0, 1.0, f32::NAN], &ctx), 9);
    assert_eq!(QuantizationPolicy::Fixed(3).decimal_scale(&[0.0, 5.0, 20.0], &ctx), 3);
}

#[test]
fn test_auto_quantization_fits_large_constant_values() {
    let ctx = PayloadContext::new(Identifier::default(), Geometry::Stations { count: 2 });
    let auto = QuantizationPolicy::Auto { min_unique: 1000 };
    let values = [2e10f32, 2e10];

    let scale = auto.decimal_scale(&values, &ctx);

    assert_eq!(scale, 8);
    let codec = ScaledIntegerCodec::new();
    let packed = codec.encode(&values, &ctx, scale).unwrap();
    assert_eq!(codec.decode(&packed, &ctx).unwrap(), values.to_vec());
}

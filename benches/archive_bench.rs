//! Benchmarks for tdlpack archive operations

use std::path::Path;

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tdlpack::archive::{Geometry, GridDefinition, MessageHeader};
use tdlpack::codec::PayloadContext;
use tdlpack::cube::read_block;
use tdlpack::{
    Archive, ArchiveWriter, Config, Dataset, Identifier, IdentifierFields, Layout, OpenMode,
    PayloadCodec, ScaledIntegerCodec,
};
use tempfile::TempDir;

const DAYS: u32 = 10;
const LEADS: [u32; 4] = [6, 12, 18, 24];

fn grid() -> GridDefinition {
    GridDefinition {
        map_projection: 5,
        nx: 64,
        ny: 48,
        lat_ll: 200_000,
        lon_ll: 2_300_000,
        orient_lon: 1_050_000,
        grid_length_mm: 47_625_000,
        std_lat: 600_000,
    }
}

fn write_archive(path: &Path, layout: Layout) {
    let geometry = Geometry::Grid(grid());
    let codec = ScaledIntegerCodec::new();
    let mut writer = ArchiveWriter::create(path, layout, OpenMode::Create, &Config::default())
        .expect("create archive");

    for ccc in [1, 2] {
        for day in 1..=DAYS {
            let reference = NaiveDate::from_ymd_opt(2024, 6, day)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .expect("valid date");
            for lead in LEADS {
                let fields = IdentifierFields {
                    ccc,
                    dd: 8,
                    ttt: lead,
                    ..Default::default()
                };
                let id = Identifier::from_fields(&fields).expect("valid identifier");
                let values: Vec<f32> = (0..geometry.value_count())
                    .map(|cell| (cell % 97) as f32 * 0.25 + day as f32)
                    .collect();
                let packed = codec
                    .encode(&values, &PayloadContext::new(id, geometry.clone()), 2)
                    .expect("encode");
                let mut header = MessageHeader::new(id, reference, &geometry);
                header.decimal_scale = 2;
                writer.append_data(&header, &packed).expect("append");
            }
        }
    }
    writer.close().expect("close archive");
}

fn identifier_benchmarks(c: &mut Criterion) {
    let identifier = Identifier::new([123_456_789, 700_080_002, 112_306_024, 250_052_123]);
    let fields = identifier.decode();

    c.bench_function("identifier_decode", |b| {
        b.iter(|| black_box(identifier).decode())
    });
    c.bench_function("identifier_encode", |b| {
        b.iter(|| black_box(&fields).encode())
    });
}

fn archive_benchmarks(c: &mut Criterion) {
    let temp_dir = TempDir::new().expect("temp dir");
    let sequential = temp_dir.path().join("bench.sq");
    let random_access = temp_dir.path().join("bench.ra");
    write_archive(&sequential, Layout::Sequential);
    write_archive(&random_access, Layout::RandomAccess);

    c.bench_function("index_sequential", |b| {
        b.iter(|| Archive::open(black_box(&sequential)).expect("open"))
    });
    c.bench_function("index_random_access", |b| {
        b.iter(|| Archive::open(black_box(&random_access)).expect("open"))
    });

    let dataset = Dataset::open(&sequential, &Config::default()).expect("open dataset");
    let group = dataset.variable("001_000").expect("variable");
    let codec = ScaledIntegerCodec::new();

    c.bench_function("read_block_serial", |b| {
        b.iter(|| read_block(group, &[], &codec, 1).expect("read"))
    });
    c.bench_function("read_block_4_workers", |b| {
        b.iter(|| read_block(group, &[], &codec, 4).expect("read"))
    });
}

criterion_group!(benches, identifier_benchmarks, archive_benchmarks);
criterion_main!(benches);

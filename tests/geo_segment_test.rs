use std::cmp::Ordering;
use std::sync::Arc;

use geosearch::geo::coord::to_cartesian;
use geosearch::geo::{
    CartesianGeoRecord, CartesianGeoRecordCodec, CartesianGeoRecordComparator, GeoRecordComparator,
    GeoSegmentReader, GeoSegmentWriter,
};
use geosearch::storage::memory::MemoryStorage;

use rand::Rng;
use rand::seq::IndexedRandom;

const FILE_NAME: &str = "seg_random_location.geo";

fn random_records(count: usize) -> Vec<CartesianGeoRecord> {
    let mut rng = rand::rng();
    (0..count)
        .map(|i| {
            let point = to_cartesian(rng.random_range(-90.0..=90.0), rng.random_range(-180.0..=180.0));
            // Two records per document.
            CartesianGeoRecord::from_point(&point, (i / 2) as u32)
        })
        .collect()
}

fn build(storage: &MemoryStorage, records: &[CartesianGeoRecord]) -> GeoSegmentReader<CartesianGeoRecord> {
    let mut writer: GeoSegmentWriter<CartesianGeoRecord> = GeoSegmentWriter::new(
        Arc::new(CartesianGeoRecordCodec),
        Arc::new(CartesianGeoRecordComparator),
    );
    for record in records {
        writer.add(*record);
    }
    writer.write(storage, FILE_NAME).unwrap();

    GeoSegmentReader::load(
        storage,
        FILE_NAME,
        "location",
        (records.len() / 2) as u32,
        records.len(),
        Arc::new(CartesianGeoRecordCodec),
        Arc::new(CartesianGeoRecordComparator),
    )
    .unwrap()
}

#[test]
fn test_stored_order_is_non_decreasing() {
    let storage = MemoryStorage::default();
    let reader = build(&storage, &random_records(500));
    let cmp = CartesianGeoRecordComparator;

    assert_eq!(reader.len(), 500);
    let stored: Vec<CartesianGeoRecord> = (0..reader.len()).map(|i| reader.get(i).unwrap()).collect();
    for pair in stored.windows(2) {
        assert_ne!(cmp.compare(&pair[0], &pair[1]), Ordering::Greater);
    }
}

#[test]
fn test_range_returns_exactly_the_bounded_records() {
    let storage = MemoryStorage::default();
    let records = random_records(400);
    let reader = build(&storage, &records);
    let cmp = CartesianGeoRecordComparator;

    let mut sorted = records.clone();
    sorted.sort_by(|a, b| cmp.compare(a, b));

    let mut rng = rand::rng();
    for _ in 0..200 {
        // Bounds drawn both from stored records and from arbitrary points.
        let a = if rng.random_bool(0.5) {
            *records.choose(&mut rng).unwrap()
        } else {
            CartesianGeoRecord::new(
                rng.random_range(-1.0..=1.0),
                rng.random_range(-1.0..=1.0),
                rng.random_range(-1.0..=1.0),
                rng.random_range(0..=200),
            )
        };
        let b = *records.choose(&mut rng).unwrap();
        let (min, max) = if cmp.compare(&a, &b) == Ordering::Greater { (b, a) } else { (a, b) };

        let expected: Vec<CartesianGeoRecord> = sorted
            .iter()
            .filter(|r| cmp.compare(r, &min) != Ordering::Less && cmp.compare(r, &max) != Ordering::Greater)
            .copied()
            .collect();
        let actual: Vec<CartesianGeoRecord> = reader.range(&min, &max).unwrap().map(|r| r.unwrap()).collect();

        assert_eq!(actual, expected);
    }
}

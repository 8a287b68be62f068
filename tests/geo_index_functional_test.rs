use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::sync::Arc;

use geosearch::error::GeoSearchError;
use geosearch::geo::{Conversions, GeoCoordinate};
use geosearch::index::{GeoIndexConfig, GeoIndexReader, GeoIndexWriter, SearchOptions};
use geosearch::query::GeoQuery;
use geosearch::storage::file::FileStorageConfig;
use geosearch::storage::memory::MemoryStorage;
use geosearch::storage::{Storage, StorageConfig, StorageFactory};

use rand::Rng;
use tempfile::tempdir;

const NUM_DOCS: usize = 10;
const LOCATIONS_PER_DOC: usize = 2;
const LATITUDE_MIN_VALUE: f64 = -90.0;
const LONGITUDE_MIN_VALUE: f64 = -180.0;

/// Spreads `total` locations evenly from the south-west corner of the
/// coordinate domain towards the north-east.
fn calculate_geo_coordinate(location_index: usize, total: usize) -> GeoCoordinate {
    let fraction = location_index as f64 / total as f64;
    GeoCoordinate::new(
        LATITUDE_MIN_VALUE + 180.0 * fraction,
        LONGITUDE_MIN_VALUE + 360.0 * fraction,
    )
    .unwrap()
}

fn add_documents(storage: Arc<dyn Storage>) {
    let total = NUM_DOCS * LOCATIONS_PER_DOC;
    let mut writer = GeoIndexWriter::new(storage, GeoIndexConfig::default()).unwrap();
    for doc in 0..NUM_DOCS {
        let locations: Vec<GeoCoordinate> = (0..LOCATIONS_PER_DOC)
            .map(|k| calculate_geo_coordinate(doc * LOCATIONS_PER_DOC + k, total))
            .collect();
        assert_eq!(writer.add_document(&locations).unwrap(), doc as u64);
    }
    writer.close().unwrap();
}

fn file_storage(path: &std::path::Path, use_mmap: bool) -> Arc<dyn Storage> {
    let mut config = FileStorageConfig::new(path);
    config.use_mmap = use_mmap;
    StorageFactory::create(StorageConfig::File(config)).unwrap()
}

fn doc_ids(hits: &[geosearch::query::GeoOnlyHit]) -> Vec<u64> {
    hits.iter().map(|hit| hit.doc_id).collect()
}

#[test]
fn test_segment_length_is_two_locations_per_doc() {
    let dir = tempdir().unwrap();
    let storage = file_storage(dir.path(), false);
    add_documents(storage.clone());

    let reader = GeoIndexReader::open(storage, GeoIndexConfig::default()).unwrap();
    assert_eq!(reader.segment_count(), 1);

    let segments = reader.segments();
    let segment = &segments[0];
    let max_doc = segment.max_doc() as usize;
    assert_eq!(max_doc, NUM_DOCS);
    assert_eq!(
        segment.reader().len(),
        2 * max_doc,
        "Expected 2 locations per doc * 10 docs"
    );
}

#[test]
fn test_exactly_one_geo_file() {
    let dir = tempdir().unwrap();
    let storage = file_storage(dir.path(), false);
    add_documents(storage.clone());

    let geo_files: Vec<String> = storage
        .list_files()
        .unwrap()
        .into_iter()
        .filter(|name| name.ends_with(".geo"))
        .collect();
    assert_eq!(geo_files.len(), 1);
    assert!(geo_files[0].ends_with("_location.geo"));
}

#[test]
fn test_geo_search_radius_match() {
    let dir = tempdir().unwrap();
    let storage = file_storage(dir.path(), true);
    add_documents(storage.clone());
    let reader = GeoIndexReader::open(storage, GeoIndexConfig::default()).unwrap();

    // Second location of document 1.
    let coordinate = calculate_geo_coordinate(3, NUM_DOCS * LOCATIONS_PER_DOC);
    let kilometers = Conversions::mi2km(500.0);
    let query = GeoQuery::new(
        "location",
        coordinate.latitude(),
        coordinate.longitude(),
        kilometers,
    )
    .unwrap();

    let results = reader.search(&query, &SearchOptions::new(10)).unwrap();
    assert_eq!(doc_ids(&results.hits), vec![1]);
    assert_eq!(results.total_hits, 1);
}

#[test]
fn test_geo_search_one_hit() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::default());
    add_documents(storage.clone());
    let reader = GeoIndexReader::open(storage, GeoIndexConfig::default()).unwrap();

    let query = GeoQuery::new("location", LATITUDE_MIN_VALUE, LONGITUDE_MIN_VALUE, 0.0).unwrap();
    let results = reader.search(&query, &SearchOptions::new(10)).unwrap();

    assert_eq!(doc_ids(&results.hits), vec![0]);
    assert_eq!(results.max_score, 1.0);
}

#[test]
fn test_construction_validation() {
    assert!(GeoQuery::new("location", 91.0, 0.0, 10.0).unwrap_err().is_invalid_argument());
    assert!(GeoQuery::new("location", 0.0, 181.0, 10.0).unwrap_err().is_invalid_argument());
    assert!(GeoQuery::new("location", 0.0, 0.0, -0.5).unwrap_err().is_invalid_argument());
    assert!(GeoQuery::builder("location").centroid(0.0, 0.0).build().is_err());
}

#[test]
fn test_mmap_and_buffered_reads_agree() {
    let dir = tempdir().unwrap();
    add_documents(file_storage(dir.path(), false));

    let query = GeoQuery::new("location", 0.0, 0.0, 5000.0).unwrap();
    let options = SearchOptions::new(20);

    let buffered = GeoIndexReader::open(file_storage(dir.path(), false), GeoIndexConfig::default())
        .unwrap()
        .search(&query, &options)
        .unwrap();
    let mapped = GeoIndexReader::open(file_storage(dir.path(), true), GeoIndexConfig::default())
        .unwrap()
        .search(&query, &options)
        .unwrap();

    assert!(!buffered.hits.is_empty());
    assert_eq!(buffered, mapped);
}

/// Index `docs` random documents with one to three locations each, in
/// segments of at most 40 documents.
fn random_index(storage: Arc<dyn Storage>, docs: usize) -> Vec<Vec<GeoCoordinate>> {
    let mut rng = rand::rng();
    let config = GeoIndexConfig {
        max_buffered_docs: 40,
        ..Default::default()
    };
    let mut writer = GeoIndexWriter::new(storage, config).unwrap();

    let mut corpus = Vec::with_capacity(docs);
    for _ in 0..docs {
        let count = rng.random_range(1..=3);
        let locations: Vec<GeoCoordinate> = (0..count)
            .map(|_| {
                GeoCoordinate::new(rng.random_range(-90.0..=90.0), rng.random_range(-180.0..=180.0)).unwrap()
            })
            .collect();
        writer.add_document(&locations).unwrap();
        corpus.push(locations);
    }
    writer.commit().unwrap();
    corpus
}

#[test]
fn test_recall_and_precision_against_brute_force() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::default());
    let corpus = random_index(storage.clone(), 300);
    let reader = GeoIndexReader::open(storage, GeoIndexConfig::default()).unwrap();
    assert!(reader.segment_count() > 1);

    let mut rng = rand::rng();
    // Points this close to the boundary may fall either way.
    let tolerance_km = 1e-3;

    for _ in 0..100 {
        let center = GeoCoordinate::new(rng.random_range(-90.0..=90.0), rng.random_range(-180.0..=180.0)).unwrap();
        let range_km: f32 = rng.random_range(0.0..4000.0);
        let range = range_km as f64;

        let nearest: BTreeMap<u64, f64> = corpus
            .iter()
            .enumerate()
            .map(|(doc_id, locations)| {
                let best = locations
                    .iter()
                    .map(|location| center.distance_km(location))
                    .fold(f64::INFINITY, f64::min);
                (doc_id as u64, best)
            })
            .collect();

        let query = GeoQuery::new("location", center.latitude(), center.longitude(), range_km).unwrap();
        let options = SearchOptions::new(corpus.len()).with_parallel(rng.random_bool(0.5));
        let results = reader.search(&query, &options).unwrap();
        let found: BTreeSet<u64> = results.hits.iter().map(|hit| hit.doc_id).collect();

        assert_eq!(found.len(), results.hits.len(), "a document was reported twice");
        assert_eq!(results.total_hits as usize, results.hits.len());

        for (doc_id, distance) in &nearest {
            if *distance <= range - tolerance_km {
                assert!(found.contains(doc_id), "missed doc {doc_id} at {distance} km (range {range})");
            }
            if *distance > range + tolerance_km {
                assert!(!found.contains(doc_id), "doc {doc_id} at {distance} km exceeds range {range}");
            }
        }

        for pair in results.hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
            assert!(nearest[&pair[0].doc_id] <= nearest[&pair[1].doc_id] + tolerance_km);
        }
    }
}

#[test]
fn test_top_n_keeps_closest_documents() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::default());
    let corpus = random_index(storage.clone(), 200);
    let reader = GeoIndexReader::open(storage, GeoIndexConfig::default()).unwrap();

    let center = GeoCoordinate::new(10.0, 20.0).unwrap();
    let query = GeoQuery::new("location", 10.0, 20.0, 25_000.0).unwrap();
    let results = reader.search(&query, &SearchOptions::new(5)).unwrap();

    let mut distances: Vec<f64> = corpus
        .iter()
        .map(|locations| {
            locations
                .iter()
                .map(|location| center.distance_km(location))
                .fold(f64::INFINITY, f64::min)
        })
        .collect();
    distances.sort_by(f64::total_cmp);

    assert_eq!(results.hits.len(), 5);
    for (hit, expected) in results.hits.iter().zip(&distances) {
        let distance = 1.0 / hit.score - 1.0;
        assert!((distance - expected).abs() < 1e-3);
    }
}

fn truncate_first_segment(dir: &std::path::Path, reader: &GeoIndexReader) -> String {
    let segments = reader.segments();
    let segment = &segments[0];
    let path = dir.join(segment.info().file_name());
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(10).unwrap();
    segment.name().to_string()
}

#[test]
fn test_failed_segment_fails_search() {
    let dir = tempdir().unwrap();
    let storage = file_storage(dir.path(), false);
    random_index(storage.clone(), 100);

    let reader = GeoIndexReader::open(storage, GeoIndexConfig::default()).unwrap();
    let name = truncate_first_segment(dir.path(), &reader);

    let query = GeoQuery::new("location", 0.0, 0.0, 25_000.0).unwrap();
    let err = reader.search(&query, &SearchOptions::new(10)).unwrap_err();
    assert!(matches!(err, GeoSearchError::Query(_)));
    assert!(err.to_string().contains(&name));
}

#[test]
fn test_failed_segment_skipped_with_partial_results() {
    let dir = tempdir().unwrap();
    let storage = file_storage(dir.path(), false);
    random_index(storage.clone(), 100);

    let mut config = GeoIndexConfig::default();
    config.search.allow_partial_results = true;
    let reader = GeoIndexReader::open(storage, config).unwrap();
    let first_max_doc = reader.segments()[0].max_doc() as u64;
    truncate_first_segment(dir.path(), &reader);

    let query = GeoQuery::new("location", 0.0, 0.0, 25_000.0).unwrap();
    for parallel in [false, true] {
        let options = SearchOptions::new(1000).with_parallel(parallel);
        let results = reader.search(&query, &options).unwrap();

        assert_eq!(results.failed_segments, 1);
        assert_eq!(results.hits.len() as u64, 100 - first_max_doc);
        assert!(results.hits.iter().all(|hit| hit.doc_id >= first_max_doc));
    }
}

use std::fs;
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use ferrite_grad::data::idx::{self, IdxImages};
use ferrite_grad::data::mnist::{TRAIN_IMAGES, TRAIN_LABELS};
use ferrite_grad::{DataLoader, Error, Graph, MnistDataset};

/// `count` 2×3 images where every pixel of image `i` equals `i * 10` and
/// the label is `i % 10`.
fn fixture(count: usize) -> (IdxImages, Vec<u8>) {
    let pixels = (0..count).flat_map(|i| [(i * 10) as u8; 6]).collect();
    let images = IdxImages {
        count,
        rows: 2,
        cols: 3,
        pixels,
    };
    let labels = (0..count).map(|i| (i % 10) as u8).collect();
    (images, labels)
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn write_dataset(dir: &Path, count: usize, gzipped: bool) {
    let (images, labels) = fixture(count);
    let (images, labels) = (idx::encode_images(&images), idx::encode_labels(&labels));
    if gzipped {
        fs::write(dir.join(format!("{TRAIN_IMAGES}.gz")), gzip(&images)).unwrap();
        fs::write(dir.join(format!("{TRAIN_LABELS}.gz")), gzip(&labels)).unwrap();
    } else {
        fs::write(dir.join(TRAIN_IMAGES), images).unwrap();
        fs::write(dir.join(TRAIN_LABELS), labels).unwrap();
    }
}

// ---------------------------------------------------------------------------
// IDX parsing
// ---------------------------------------------------------------------------

#[test]
fn test_parse_images_header() {
    let (images, _) = fixture(3);
    let parsed = idx::parse_images(&idx::encode_images(&images), Path::new("mem")).unwrap();
    assert_eq!(parsed.count, 3);
    assert_eq!((parsed.rows, parsed.cols), (2, 3));
    assert_eq!(&parsed.pixels[6..12], &[10; 6]);
}

#[test]
fn test_rejects_bad_magic() {
    let (_, labels) = fixture(2);
    // A label file handed to the image parser.
    let err = idx::parse_images(&idx::encode_labels(&labels), Path::new("labels")).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidMagic {
            expected: 2051,
            actual: 2049,
            ..
        }
    ));
}

#[test]
fn test_rejects_truncated_files() {
    let (images, labels) = fixture(4);
    let bytes = idx::encode_images(&images);
    assert!(matches!(
        idx::parse_images(&bytes[..bytes.len() - 1], Path::new("short")),
        Err(Error::MalformedIdx(_))
    ));
    assert!(matches!(
        idx::parse_images(&bytes[..10], Path::new("header")),
        Err(Error::MalformedIdx(_))
    ));

    let bytes = idx::encode_labels(&labels);
    assert!(matches!(
        idx::parse_labels(&bytes[..bytes.len() - 2], Path::new("short")),
        Err(Error::MalformedIdx(_))
    ));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope");
    assert!(matches!(idx::load_labels(&path), Err(Error::FileNotFound(p)) if p == path));
}

// ---------------------------------------------------------------------------
// Dataset loading and splitting
// ---------------------------------------------------------------------------

#[test]
fn test_load_raw_and_gzipped_agree() {
    let raw = tempfile::tempdir().unwrap();
    let gz = tempfile::tempdir().unwrap();
    write_dataset(raw.path(), 5, false);
    write_dataset(gz.path(), 5, true);

    let a = MnistDataset::load_training(raw.path()).unwrap();
    let b = MnistDataset::load_training(gz.path()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 5);
    assert_eq!(a.image(4), &[40; 6]);
    assert_eq!(a.labels, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_count_mismatch_between_files() {
    let dir = tempfile::tempdir().unwrap();
    let (images, _) = fixture(3);
    fs::write(dir.path().join(TRAIN_IMAGES), idx::encode_images(&images)).unwrap();
    fs::write(dir.path().join(TRAIN_LABELS), idx::encode_labels(&[1, 2])).unwrap();
    assert!(matches!(
        MnistDataset::load_training(dir.path()),
        Err(Error::MalformedIdx(_))
    ));
}

#[test]
fn test_train_validation_split() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), 10, false);
    let dataset = MnistDataset::load_training(dir.path()).unwrap();

    let (train, val) = dataset.train_validation_split(0.8).unwrap();
    assert_eq!((train.len(), val.len()), (8, 2));
    assert_eq!(val.labels, vec![8, 9]);
    assert_eq!(val.image(0), &[80; 6]);

    assert!(matches!(
        dataset.split(7, 4),
        Err(Error::SplitOutOfRange { start: 7, end: 11, len: 10 })
    ));
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

#[test]
fn test_sequential_loader_skips_partial_batch_and_rewinds() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), 7, false);
    let dataset = MnistDataset::load_training(dir.path()).unwrap();
    let mut loader = DataLoader::sequential(dataset, 3);
    let mut graph = Graph::new();

    let first = loader.next_batch(&mut graph).unwrap();
    assert_eq!(graph.shape(first.images), (3, 6));
    assert_eq!(graph.value(first.labels).data, vec![0.0, 1.0, 2.0]);
    let pixel = graph.value(first.images).get(1, 0);
    assert!((pixel - 10.0 / 255.0).abs() < 1e-6);

    let second = loader.next_batch(&mut graph).unwrap();
    assert_eq!(graph.value(second.labels).data, vec![3.0, 4.0, 5.0]);
    assert!(loader.next_batch(&mut graph).is_none());

    let again = loader.next_batch(&mut graph).unwrap();
    assert_eq!(graph.value(again.labels).data, vec![0.0, 1.0, 2.0]);
    assert_eq!(loader.batches_per_epoch(), 2);
}

#[test]
fn test_random_loader_is_seeded() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), 20, false);
    let dataset = MnistDataset::load_training(dir.path()).unwrap();

    let mut a = DataLoader::random(dataset.clone(), 4, 99);
    let mut b = DataLoader::random(dataset, 4, 99);
    for _ in 0..5 {
        let (ia, ib) = (a.next_indices(), b.next_indices());
        assert_eq!(ia, ib);
        if let Some(indices) = ia {
            assert!(indices.iter().all(|&i| i < 20));
        }
    }
}

#[test]
fn test_load_test_split_from_gz() {
    use ferrite_grad::data::mnist::{TEST_IMAGES, TEST_LABELS};

    let dir = tempfile::tempdir().unwrap();
    let (images, labels) = fixture(3);
    fs::write(dir.path().join(format!("{TEST_IMAGES}.gz")), gzip(&idx::encode_images(&images))).unwrap();
    fs::write(dir.path().join(format!("{TEST_LABELS}.gz")), gzip(&idx::encode_labels(&labels))).unwrap();

    let dataset = MnistDataset::load_test(dir.path()).unwrap();
    assert_eq!(dataset.len(), 3);
    assert_eq!(dataset.image_size(), 6);
}

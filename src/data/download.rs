use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{info, warn};

use crate::data::mnist::{TEST_IMAGES, TEST_LABELS, TRAIN_IMAGES, TRAIN_LABELS};
use crate::error::{Error, Result};

pub const MIRROR: &str = "https://ossci-datasets.s3.amazonaws.com/mnist";

/// Environment variable overriding [`DEFAULT_DATA_DIR`].
pub const DATA_DIR_ENV: &str = "FERRITE_MNIST_DIR";
pub const DEFAULT_DATA_DIR: &str = "data/mnist";

pub const FILES: [&str; 4] = [TRAIN_IMAGES, TRAIN_LABELS, TEST_IMAGES, TEST_LABELS];

/// `$FERRITE_MNIST_DIR`, or `data/mnist` when unset.
pub fn data_dir() -> PathBuf {
    std::env::var(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Fetches `url` into `directory` unless a file of the same name is already
/// there.
fn download_file(url: &str, directory: &Path) -> Result<PathBuf> {
    let filename = url
        .rsplit('/')
        .next()
        .ok_or_else(|| Error::Config(format!("cannot take a file name from {url}")))?;
    let filepath = directory.join(filename);
    if filepath.exists() {
        info!(path = %filepath.display(), "already downloaded");
        return Ok(filepath);
    }
    info!(%url, "downloading");
    let response = reqwest::blocking::get(url)?;
    if !response.status().is_success() {
        return Err(Error::Download {
            url: url.to_owned(),
            status: response.status().as_u16(),
        });
    }
    let bytes = response.bytes()?;
    fs::write(&filepath, &bytes)?;
    Ok(filepath)
}

/// Writes the decompressed contents of `archive` next to it, minus the
/// `.gz` suffix. Skips the work if the target exists.
pub fn unpack(archive: &Path) -> Result<PathBuf> {
    let target = archive.with_extension("");
    if target.exists() {
        return Ok(target);
    }
    let mut decoder = GzDecoder::new(fs::File::open(archive)?);
    let mut bytes = Vec::new();
    decoder.read_to_end(&mut bytes)?;
    fs::write(&target, bytes)?;
    info!(path = %target.display(), "unpacked");
    Ok(target)
}

/// Downloads and unpacks the four MNIST files into `dir` and returns the
/// paths of the unpacked files.
pub fn download_mnist(dir: &Path) -> Result<Vec<PathBuf>> {
    download_mnist_from(MIRROR, dir)
}

pub fn download_mnist_from(mirror: &str, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut unpacked = Vec::with_capacity(FILES.len());
    for name in FILES {
        let url = format!("{}/{name}.gz", mirror.trim_end_matches('/'));
        let archive = download_file(&url, dir).inspect_err(|err| warn!(%url, %err, "download failed"))?;
        unpacked.push(unpack(&archive)?);
    }
    Ok(unpacked)
}

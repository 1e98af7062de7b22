//! Gzip compression of rotated generations.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::generation::gz_path;

/// Compress `path` into `<path>.gz` and remove the original.
///
/// A partially written archive is removed on failure and the original is kept.
pub fn gzip_file(path: &Path) -> io::Result<PathBuf> {
    let target = gz_path(path);
    if target.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", target.display()),
        ));
    }

    if let Err(e) = write_gzip(path, &target) {
        let _ = fs::remove_file(&target);
        return Err(e);
    }

    fs::remove_file(path)?;
    Ok(target)
}

fn write_gzip(source: &Path, target: &Path) -> io::Result<()> {
    let mut input = BufReader::new(File::open(source)?);
    let output = BufWriter::new(File::create(target)?);
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.flush()
}

// Copyright 2016-2019 Cargo-Bundle developers <https://github.com/burtonageo/cargo-bundle>
// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};

use crate::error::{io_err, Error, Result};

/// Recursively (re)creates a directory, deleting it first if it already
/// exists. Used for per-package scratch trees when `UsePackageCache` is
/// false.
pub(crate) fn create_clean_dir(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(io_err(path))?;
    }
    fs::create_dir_all(path).map_err(io_err(path))
}

/// Creates a new file at `path`, creating any parent directories as needed.
pub(crate) fn create_file(path: &Path) -> Result<std::io::BufWriter<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let file = File::create(path).map_err(io_err(path))?;
    Ok(std::io::BufWriter::new(file))
}

/// Writes a gzip-compressed tar archive of everything under `src_dir` into
/// `dest`, matching the `<basename>-icons.tar.gz` layout.
pub(crate) fn write_tar_gz<W: Write>(src_dir: &Path, dest: W) -> Result<W> {
    let gz = flate2::write::GzEncoder::new(dest, flate2::Compression::default());
    let mut builder = tar::Builder::new(gz);
    builder.follow_symlinks(false);
    if src_dir.exists() {
        builder
            .append_dir_all(".", src_dir)
            .map_err(io_err(src_dir))?;
    }
    let gz = builder.into_inner().map_err(io_err(src_dir))?;
    gz.finish().map_err(io_err(src_dir))
}

/// Computes the lowercase hex SHA-1 digest of `data`.
pub(crate) fn sha1_hex(data: &[u8]) -> String {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes the lowercase hex MD5 digest of `data`, used for the
/// content-addressed screenshot basename `"<id>-<md5>.png"`.
pub(crate) fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Computes the package-level cache key `sha1(realpath || size || mtime)`
/// used for the `X-CreaterepoAsCacheID` metadata key, so a package whose
/// mtime and size are unchanged can skip straight to its cached app list.
pub(crate) fn cache_key(path: &Path) -> Result<String> {
    let real = fs::canonicalize(path).map_err(io_err(path))?;
    let meta = fs::metadata(&real).map_err(io_err(path))?;
    let mtime = meta
        .modified()
        .map_err(io_err(path))?
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(Error::from)?
        .as_secs();
    let mut buf = real.to_string_lossy().into_owned();
    buf.push_str(&meta.len().to_string());
    buf.push_str(&mtime.to_string());
    Ok(sha1_hex(buf.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_hex_is_stable() {
        assert_eq!(md5_hex(b"hello"), "5d41402abc4b2a76b9719d911017c59");
    }

    #[test]
    fn cache_key_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.rpm");
        fs::write(&a, b"one").unwrap();
        let key1 = cache_key(&a).unwrap();
        fs::write(&a, b"one-but-longer").unwrap();
        let key2 = cache_key(&a).unwrap();
        assert_ne!(key1, key2);
    }
}

// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Debian package reading: `ar` outer container, `tar`+gzip/bzip2/xz inner
//! members, control-field reading (`dpkg-deb --field` when available,
//! falling back to parsing `control.tar.*` directly), and
//! `changelog.Debian.gz` parsing.

use std::{
    collections::BTreeMap,
    io::Read,
    path::{Path, PathBuf},
    process::Command,
};

use crate::{
    error::{io_err, Error, Result},
    shell::capture_stdout,
};

use super::{prune_to_globs, release::parse_debian_changelog, filter_requires, Nevr, PackageOps, Release};

#[derive(Debug)]
pub struct DebPackage {
    path: PathBuf,
    nevr: Nevr,
    arch: String,
    fields: BTreeMap<String, String>,
    requires: Vec<String>,
    releases: Vec<Release>,
}

/// Reads `member` (e.g. `"control.tar.gz"`) out of the outer `ar` archive
/// and returns its decompressed bytes.
fn read_ar_member(path: &Path, member_prefix: &str) -> Result<Option<Vec<u8>>> {
    let file = std::fs::File::open(path).map_err(io_err(path))?;
    let mut archive = ar::Archive::new(file);
    while let Some(entry) = archive.next_entry() {
        let mut entry = entry.map_err(io_err(path))?;
        let name = String::from_utf8_lossy(entry.header().identifier()).into_owned();
        if name.starts_with(member_prefix) {
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf).map_err(io_err(path))?;
            return Ok(Some(decompress(&name, buf)?));
        }
    }
    Ok(None)
}

fn decompress(member_name: &str, data: Vec<u8>) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    if member_name.ends_with(".gz") {
        flate2::read::GzDecoder::new(&data[..])
            .read_to_end(&mut out)
            .map_err(io_err(member_name))?;
    } else if member_name.ends_with(".xz") {
        xz2::read::XzDecoder::new(&data[..])
            .read_to_end(&mut out)
            .map_err(io_err(member_name))?;
    } else if member_name.ends_with(".bz2") {
        bzip2::read::BzDecoder::new(&data[..])
            .read_to_end(&mut out)
            .map_err(io_err(member_name))?;
    } else {
        out = data;
    }
    Ok(out)
}

fn parse_control_fields(text: &str) -> BTreeMap<String, String> {
    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    let mut current_key: Option<String> = None;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix(' ') {
            if let Some(key) = &current_key {
                if let Some(value) = fields.get_mut(key) {
                    value.push('\n');
                    value.push_str(rest.trim());
                }
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            fields.insert(key.clone(), value.trim().to_string());
            current_key = Some(key);
        }
    }
    fields
}

impl DebPackage {
    #[tracing::instrument(level = "debug", skip(path), fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        let fields = read_control_fields(path)?;

        let name = fields
            .get("Package")
            .cloned()
            .ok_or_else(|| Error::PackageParseError(path.to_path_buf(), "missing Package field".into()))?;
        let version_field = fields
            .get("Version")
            .cloned()
            .ok_or_else(|| Error::PackageParseError(path.to_path_buf(), "missing Version field".into()))?;
        let (epoch, version, release) = split_debian_version(&version_field);
        let arch = fields.get("Architecture").cloned().unwrap_or_default();

        let requires = filter_requires(
            fields
                .get("Depends")
                .map(|d| d.split(',').map(|s| s.trim().to_string()).collect::<Vec<_>>())
                .unwrap_or_default(),
        );

        let releases = read_ar_member(path, "data.tar")
            .ok()
            .flatten()
            .and_then(|data| changelog_from_data_tar(&data))
            .map(|text| parse_debian_changelog(&text))
            .unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            nevr: Nevr {
                name,
                epoch,
                version,
                release,
            },
            arch,
            fields,
            requires,
            releases,
        })
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Debian's `[epoch:]upstream_version[-debian_revision]` split.
fn split_debian_version(raw: &str) -> (u32, String, String) {
    let (epoch, rest) = match raw.split_once(':') {
        Some((e, rest)) => (e.parse().unwrap_or(0), rest),
        None => (0, raw),
    };
    match rest.rsplit_once('-') {
        Some((version, release)) => (epoch, version.to_string(), release.to_string()),
        None => (epoch, rest.to_string(), String::new()),
    }
}

fn changelog_from_data_tar(data_tar: &[u8]) -> Option<String> {
    let mut archive = tar::Archive::new(data_tar);
    for entry in archive.entries().ok()? {
        let mut entry = entry.ok()?;
        let name = entry.path().ok()?.to_string_lossy().into_owned();
        if name.contains("changelog.Debian") || name.ends_with("changelog") {
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf).ok()?;
            let decompressed = if name.ends_with(".gz") {
                let mut out = Vec::new();
                flate2::read::GzDecoder::new(&buf[..])
                    .read_to_end(&mut out)
                    .ok()?;
                out
            } else {
                buf
            };
            return String::from_utf8(decompressed).ok();
        }
    }
    None
}

/// Reads control fields via `dpkg-deb --field` when the binary is on
/// `PATH` (the host-accurate source of truth), falling back to parsing the
/// `control.tar.*` member directly when it isn't.
fn read_control_fields(path: &Path) -> Result<BTreeMap<String, String>> {
    let mut dpkg_deb = Command::new("dpkg-deb");
    dpkg_deb.arg("--field").arg(path);
    if let Some(output) = capture_stdout(&mut dpkg_deb) {
        let fields = parse_control_fields(&output);
        if !fields.is_empty() {
            return Ok(fields);
        }
    }

    let control_tar = read_ar_member(path, "control.tar")?
        .ok_or_else(|| Error::PackageParseError(path.to_path_buf(), "missing control.tar member".into()))?;
    let mut archive = tar::Archive::new(&control_tar[..]);
    for entry in archive.entries().map_err(io_err(path))? {
        let mut entry = entry.map_err(io_err(path))?;
        let name = entry.path().map_err(io_err(path))?.to_string_lossy().into_owned();
        if name.ends_with("control") {
            let mut text = String::new();
            entry.read_to_string(&mut text).map_err(io_err(path))?;
            return Ok(parse_control_fields(&text));
        }
    }
    Err(Error::PackageParseError(
        path.to_path_buf(),
        "control file not found".into(),
    ))
}

impl PackageOps for DebPackage {
    fn nevr(&self) -> &Nevr {
        &self.nevr
    }

    fn arch(&self) -> &str {
        &self.arch
    }

    fn license(&self) -> Option<&str> {
        None
    }

    fn summary(&self) -> Option<&str> {
        self.fields
            .get("Description")
            .map(|d| d.lines().next().unwrap_or(""))
    }

    fn description(&self) -> Option<&str> {
        self.fields.get("Description").map(String::as_str)
    }

    fn url(&self) -> Option<&str> {
        self.fields.get("Homepage").map(String::as_str)
    }

    fn group(&self) -> Option<&str> {
        self.fields.get("Section").map(String::as_str)
    }

    fn requires(&self) -> Vec<String> {
        self.requires.clone()
    }

    fn releases(&self) -> &[Release] {
        &self.releases
    }

    #[tracing::instrument(level = "debug", skip(self, dest, globs), fields(path = %self.path.display()))]
    fn explode(&self, dest: &Path, globs: Option<&[glob::Pattern]>) -> Result<()> {
        let data_tar = read_ar_member(&self.path, "data.tar")?.ok_or_else(|| {
            Error::PackageParseError(self.path.clone(), "missing data.tar member".into())
        })?;
        let mut archive = tar::Archive::new(&data_tar[..]);
        archive.unpack(dest).map_err(io_err(dest))?;
        if let Some(globs) = globs {
            prune_to_globs(dest, globs)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_epoch_version_release() {
        assert_eq!(
            split_debian_version("2:1.4.2-3ubuntu1"),
            (2, "1.4.2".to_string(), "3ubuntu1".to_string())
        );
        assert_eq!(
            split_debian_version("1.0"),
            (0, "1.0".to_string(), String::new())
        );
    }

    #[test]
    fn parses_multiline_control_fields() {
        let text = "Package: foo\nVersion: 1.0\nDescription: short summary\n long description\n continues here\n";
        let fields = parse_control_fields(text);
        assert_eq!(fields.get("Package").unwrap(), "foo");
        assert!(fields.get("Description").unwrap().contains("continues here"));
    }
}

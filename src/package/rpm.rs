// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! RPM header reading, CPIO payload extraction, and `%changelog` parsing.

use std::path::{Path, PathBuf};

use crate::error::Result;

use super::{
    prune_to_globs, release::parse_rpm_changelog, rpm_license_to_spdx, filter_requires, Nevr, PackageOps, Release,
};

#[derive(Debug)]
pub struct RpmPackage {
    path: PathBuf,
    nevr: Nevr,
    arch: String,
    license: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    url: Option<String>,
    group: Option<String>,
    requires: Vec<String>,
    releases: Vec<Release>,
}

impl RpmPackage {
    #[tracing::instrument(level = "debug", skip(path), fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        let pkg = rpm::Package::open(path)?;
        let header = &pkg.metadata;

        let name = header.get_name()?.to_string();
        let version = header.get_version()?.to_string();
        let release = header.get_release()?.to_string();
        let epoch = header.get_epoch().unwrap_or(0);
        let arch = header.get_arch().unwrap_or("noarch").to_string();

        let license = header
            .get_license()
            .ok()
            .map(|l| rpm_license_to_spdx(l));
        let summary = header.get_summary().ok().map(str::to_string);
        let description = header.get_description().ok().map(str::to_string);
        let url = header.get_url().ok().map(str::to_string);
        let group = header.get_group().ok().map(str::to_string);

        let requires = filter_requires(
            header
                .get_requires()
                .map(|deps| {
                    deps.iter()
                        .map(|d| d.name.clone())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
        );

        let changelog = header.get_changelog_entries().ok();
        let releases = changelog
            .map(|entries| {
                let text = entries
                    .iter()
                    .map(|e| {
                        format!(
                            "* {} Changelog <changelog> - {}\n{}\n",
                            e.timestamp, e.name, e.description
                        )
                    })
                    .collect::<String>();
                parse_rpm_changelog(&text)
            })
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
            license,
            summary,
            description,
            url,
            group,
            requires,
            releases,
        })
    }
}

impl PackageOps for RpmPackage {
    fn nevr(&self) -> &Nevr {
        &self.nevr
    }

    fn arch(&self) -> &str {
        &self.arch
    }

    fn license(&self) -> Option<&str> {
        self.license.as_deref()
    }

    fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    fn requires(&self) -> Vec<String> {
        self.requires.clone()
    }

    fn releases(&self) -> &[Release] {
        &self.releases
    }

    #[tracing::instrument(level = "debug", skip(self, dest, globs), fields(path = %self.path.display()))]
    fn explode(&self, dest: &Path, globs: Option<&[glob::Pattern]>) -> Result<()> {
        let pkg = rpm::Package::open(&self.path)?;
        let mut archive = pkg.content_reader()?;
        archive
            .unpack(dest)
            .map_err(|e| crate::error::Error::PackageParseError(self.path.clone(), e.to_string()))?;
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
    fn nevr_threads_epoch_through() {
        let nevr = Nevr {
            name: "example".into(),
            epoch: 1,
            version: "2.0".into(),
            release: "3.fc40".into(),
        };
        assert_eq!(nevr.evr(), "1:2.0-3.fc40");
    }

    #[test]
    fn open_rejects_non_rpm_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-package.rpm");
        std::fs::write(&path, b"not an rpm").unwrap();
        assert!(RpmPackage::open(&path).is_err());
    }
}

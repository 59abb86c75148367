// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Package abstraction: opening RPM and Debian containers behind a
//! single interface, independent of the format underneath.

mod deb;
mod release;
mod rpm;
mod vercmp;

pub use release::Release;

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

/// Index into [`crate::context::Context`]'s package list. Kept as an index
/// rather than a reference/lifetime so [`crate::app::App`] can stay
/// `'static` and move freely across worker threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFormat {
    Rpm,
    Deb,
}

impl PackageFormat {
    /// Picks a format from the file's suffix, the only signal the task
    /// runner has before a package is opened.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("rpm") => Ok(PackageFormat::Rpm),
            Some("deb") => Ok(PackageFormat::Deb),
            _ => Err(Error::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Name-Epoch-Version-Release, used for changelog/release comparisons and
/// the `disable_older_pkgs` dedup pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nevr {
    pub name: String,
    pub epoch: u32,
    pub version: String,
    pub release: String,
}

impl Nevr {
    pub fn evr(&self) -> String {
        if self.epoch == 0 {
            format!("{}-{}", self.version, self.release)
        } else {
            format!("{}:{}-{}", self.epoch, self.version, self.release)
        }
    }
}

/// Per-package log, mirrored to `tracing` at the call site so every entry
/// lands both in the on-disk catalog-build log and the live trace output
/// (dropped entries are logged by the caller, not here).
#[derive(Debug, Clone, Default)]
pub struct PackageLog {
    entries: Vec<String>,
}

impl PackageLog {
    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

/// Operations every package format must support.
pub trait PackageOps {
    fn nevr(&self) -> &Nevr;
    fn arch(&self) -> &str;
    /// SPDX-ish license identifier. RPM's free-text `License:` tag is
    /// mapped onto SPDX names where a mapping is known; Debian's
    /// `copyright` file is not parsed, so this is best-effort there too.
    fn license(&self) -> Option<&str>;
    fn summary(&self) -> Option<&str>;
    fn description(&self) -> Option<&str>;
    fn url(&self) -> Option<&str>;
    fn group(&self) -> Option<&str>;
    /// Run-time dependency names, with `rpmlib(...)` virtual provides and
    /// the bare `/bin/sh` interpreter dependency filtered out
    /// case: neither is meaningful for catalog purposes).
    fn requires(&self) -> Vec<String>;
    fn releases(&self) -> &[Release];
    /// Extracts every file into `dest`, preserving the container's
    /// relative layout (so `usr/share/applications/foo.desktop` inside the
    /// package lands at `dest/usr/share/applications/foo.desktop`). When
    /// `globs` is given, only entries whose relative path matches at least
    /// one pattern survive (everything is extracted first, then pruned:
    /// neither format's crate exposes selective extraction, and pruning
    /// after the fact is simpler than re-implementing CPIO/tar entry
    /// iteration here).
    fn explode(&self, dest: &Path, globs: Option<&[glob::Pattern]>) -> Result<()>;
}

/// Strips RPM's bracketed version/arch suffixes (e.g.
/// `libfoo.so.1(GLIBC_2.2.5)(64bit)` -> `libfoo.so.1`) so kudo and
/// hardcoded-plugin tables can match on the bare dependency name.
fn strip_bracket_suffixes(name: &str) -> &str {
    match name.find('(') {
        Some(idx) => name[..idx].trim_end(),
        None => name,
    }
}

fn filter_requires(names: impl IntoIterator<Item = String>) -> Vec<String> {
    names
        .into_iter()
        .map(|n| strip_bracket_suffixes(&n).to_string())
        .filter(|n| !n.starts_with("rpmlib") && n != "/bin/sh")
        .collect()
}

/// Removes every file under `dest` whose path (relative to `dest`) does not
/// match any of `globs`. A no-op when `globs` is empty.
pub(crate) fn prune_to_globs(dest: &Path, globs: &[glob::Pattern]) -> Result<()> {
    if globs.is_empty() {
        return Ok(());
    }
    for entry in walkdir::WalkDir::new(dest)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(dest).unwrap_or(entry.path());
        let rel_str = rel.to_string_lossy();
        if !globs.iter().any(|p| p.matches(&rel_str)) {
            let _ = std::fs::remove_file(entry.path());
        }
    }
    Ok(())
}

/// An opened package, independent of its concrete format.
#[derive(Debug)]
pub enum Package {
    Rpm(rpm::RpmPackage),
    Deb(deb::DebPackage),
}

impl Package {
    #[tracing::instrument(level = "debug", skip(path), fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        match PackageFormat::from_path(path)? {
            PackageFormat::Rpm => Ok(Package::Rpm(rpm::RpmPackage::open(path)?)),
            PackageFormat::Deb => Ok(Package::Deb(deb::DebPackage::open(path)?)),
        }
    }

    pub fn format(&self) -> PackageFormat {
        match self {
            Package::Rpm(_) => PackageFormat::Rpm,
            Package::Deb(_) => PackageFormat::Deb,
        }
    }

    /// Computes the `"X-Foo"` style metadata entries that the task runner
    /// attaches to every app regardless of format (package name, cache ID
    /// input, size, build time).
    pub fn config_map(&self) -> BTreeMap<String, String> {
        let nevr = self.nevr();
        let mut map = BTreeMap::new();
        map.insert("X-PackageName".into(), nevr.name.clone());
        map.insert("X-PackageVersion".into(), nevr.evr());
        map
    }

    /// Orders two packages by EVR, RPM and Debian each via their own
    /// comparator. Used only to decide which package sharing a source name
    /// is newest; comparing across formats is meaningless and just falls
    /// back to RPM's comparator since it never happens in practice (a
    /// source name belongs to exactly one format per run).
    pub fn compare(&self, other: &Package) -> Ordering {
        let a = self.nevr();
        let b = other.nevr();
        match self {
            Package::Rpm(_) => {
                vercmp::rpm_evr_cmp((a.epoch, &a.version, &a.release), (b.epoch, &b.version, &b.release))
            }
            Package::Deb(_) => {
                vercmp::deb_evr_cmp((a.epoch, &a.version, &a.release), (b.epoch, &b.version, &b.release))
            }
        }
    }
}

impl PackageOps for Package {
    fn nevr(&self) -> &Nevr {
        match self {
            Package::Rpm(p) => p.nevr(),
            Package::Deb(p) => p.nevr(),
        }
    }

    fn arch(&self) -> &str {
        match self {
            Package::Rpm(p) => p.arch(),
            Package::Deb(p) => p.arch(),
        }
    }

    fn license(&self) -> Option<&str> {
        match self {
            Package::Rpm(p) => p.license(),
            Package::Deb(p) => p.license(),
        }
    }

    fn summary(&self) -> Option<&str> {
        match self {
            Package::Rpm(p) => p.summary(),
            Package::Deb(p) => p.summary(),
        }
    }

    fn description(&self) -> Option<&str> {
        match self {
            Package::Rpm(p) => p.description(),
            Package::Deb(p) => p.description(),
        }
    }

    fn url(&self) -> Option<&str> {
        match self {
            Package::Rpm(p) => p.url(),
            Package::Deb(p) => p.url(),
        }
    }

    fn group(&self) -> Option<&str> {
        match self {
            Package::Rpm(p) => p.group(),
            Package::Deb(p) => p.group(),
        }
    }

    fn requires(&self) -> Vec<String> {
        match self {
            Package::Rpm(p) => p.requires(),
            Package::Deb(p) => p.requires(),
        }
    }

    fn releases(&self) -> &[Release] {
        match self {
            Package::Rpm(p) => p.releases(),
            Package::Deb(p) => p.releases(),
        }
    }

    fn explode(&self, dest: &Path, globs: Option<&[glob::Pattern]>) -> Result<()> {
        match self {
            Package::Rpm(p) => p.explode(dest, globs),
            Package::Deb(p) => p.explode(dest, globs),
        }
    }
}

/// Maps common free-text RPM license tags onto SPDX identifiers. Anything
/// not recognized passes through unchanged, since a best-effort mapping
/// beats silently dropping the license entirely.
pub fn rpm_license_to_spdx(raw: &str) -> String {
    match raw.trim() {
        "GPLv1" => "GPL-1.0-only".into(),
        "GPLv1+" => "GPL-1.0-or-later".into(),
        "GPLv2" => "GPL-2.0-only".into(),
        "GPLv2+" => "GPL-2.0-or-later".into(),
        "GPLv3" => "GPL-3.0-only".into(),
        "GPLv3+" => "GPL-3.0-or-later".into(),
        "GPL+" => "GPL-1.0-or-later".into(),
        "LGPLv2" => "LGPL-2.0-only".into(),
        "LGPLv2+" => "LGPL-2.0-or-later".into(),
        "LGPLv2.1" => "LGPL-2.1-only".into(),
        "LGPLv2.1+" => "LGPL-2.1-or-later".into(),
        "LGPLv3" => "LGPL-3.0-only".into(),
        "LGPLv3+" => "LGPL-3.0-or-later".into(),
        "LGPL+" => "LGPL-2.0-or-later".into(),
        "AGPLv3" => "AGPL-3.0-only".into(),
        "AGPLv3+" => "AGPL-3.0-or-later".into(),
        "MIT" => "MIT".into(),
        "MITX11" | "MIT X11" => "MIT".into(),
        "X11" => "X11".into(),
        "ASL 1.0" => "Apache-1.0".into(),
        "ASL 1.1" => "Apache-1.1".into(),
        "ASL 2.0" | "Apache-2.0" | "Apache 2.0" => "Apache-2.0".into(),
        "BSD" => "BSD-3-Clause".into(),
        "BSD with advertising" => "BSD-4-Clause".into(),
        "Modified BSD" => "BSD-3-Clause".into(),
        "New BSD" => "BSD-3-Clause".into(),
        "Simplified BSD" => "BSD-2-Clause".into(),
        "Public Domain" => "LicenseRef-public-domain".into(),
        "zlib" | "zlib/libpng" => "Zlib".into(),
        "zlib with acknowledgement" => "zlib-acknowledgement".into(),
        "Python" => "Python-2.0".into(),
        "PSF" => "Python-2.0".into(),
        "Artistic 2.0" => "Artistic-2.0".into(),
        "Artistic clarified" => "Artistic-2.0".into(),
        "Artistic" => "Artistic-1.0".into(),
        "CDDL" => "CDDL-1.0".into(),
        "CPL" => "CPL-1.0".into(),
        "EPL" | "EPL-1.0" => "EPL-1.0".into(),
        "EPL-2.0" => "EPL-2.0".into(),
        "MPLv1.0" | "MPL 1.0" => "MPL-1.0".into(),
        "MPLv1.1" | "MPL 1.1" => "MPL-1.1".into(),
        "MPLv2.0" | "MPL-2.0" | "MPL 2.0" => "MPL-2.0".into(),
        "ISC" => "ISC".into(),
        "Unlicense" => "Unlicense".into(),
        "WTFPL" => "WTFPL".into(),
        "Boost" => "BSL-1.0".into(),
        "bzip2-1.0.6" => "bzip2-1.0.6".into(),
        "OpenLDAP" => "OLDAP-2.8".into(),
        "OpenSSL" => "OpenSSL".into(),
        "Sleepycat" => "Sleepycat".into(),
        "SISSL" => "SISSL".into(),
        "QPL" => "QPL-1.0".into(),
        "IJG" => "IJG".into(),
        "Vim" => "Vim".into(),
        "NCSA" => "NCSA".into(),
        "PHP" => "PHP-3.01".into(),
        "UPL" => "UPL-1.0".into(),
        "Unicode" => "Unicode-DFS-2016".into(),
        "Ruby" => "Ruby".into(),
        "SGI Free Software License B" => "SGI-B-2.0".into(),
        "libtiff" => "libtiff".into(),
        "Beerware" => "Beerware".into(),
        "Eurosym" => "Eurosym".into(),
        "FTL" => "FTL".into(),
        "Glide" => "Glide".into(),
        "IBM" => "IPL-1.0".into(),
        "Netscape" => "NPL-1.1".into(),
        "OFL" => "OFL-1.1".into(),
        "CC0" => "CC0-1.0".into(),
        "CC-BY" => "CC-BY-3.0".into(),
        "CC-BY-SA" => "CC-BY-SA-3.0".into(),
        "GFDL" => "GFDL-1.3".into(),
        "zlib-acknowledgement" => "zlib-acknowledgement".into(),
        "LPPL" => "LPPL-1.3c".into(),
        "Nmap" => "LicenseRef-Nmap".into(),
        "BitTorrent" => "BitTorrent-1.1".into(),
        "AFL" => "AFL-3.0".into(),
        "Fair" => "Fair".into(),
        "Freely redistributable without restriction" => "LicenseRef-freely-redistributable".into(),
        "Distributable" => "LicenseRef-distributable".into(),
        "Redistributable, no modification permitted" => "LicenseRef-no-modification".into(),
        "Copyright only" => "LicenseRef-copyright-only".into(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evr_includes_epoch_only_when_nonzero() {
        let a = Nevr {
            name: "foo".into(),
            epoch: 0,
            version: "1.0".into(),
            release: "1.fc40".into(),
        };
        assert_eq!(a.evr(), "1.0-1.fc40");

        let b = Nevr {
            epoch: 2,
            ..a
        };
        assert_eq!(b.evr(), "2:1.0-1.fc40");
    }

    #[test]
    fn filter_requires_drops_rpmlib_and_sh() {
        let filtered = filter_requires(vec![
            "rpmlib(PayloadIsZstd)".to_string(),
            "/bin/sh".to_string(),
            "libc.so.6".to_string(),
        ]);
        assert_eq!(filtered, vec!["libc.so.6".to_string()]);
    }

    #[test]
    fn known_rpm_licenses_map_to_spdx() {
        assert_eq!(rpm_license_to_spdx("GPLv2+"), "GPL-2.0-or-later");
        assert_eq!(rpm_license_to_spdx("Weird License"), "Weird License");
    }

    #[test]
    fn format_from_path_rejects_unknown_suffix() {
        assert!(PackageFormat::from_path(Path::new("foo.tar.gz")).is_err());
        assert!(matches!(
            PackageFormat::from_path(Path::new("foo.rpm")),
            Ok(PackageFormat::Rpm)
        ));
    }
}

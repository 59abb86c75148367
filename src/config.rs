// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Run configuration: the documented settings plus the runtime
//! flags that gate optional behavior (network probing, package caching,
//! thread count).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Run configuration for a catalog build.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Scratch directory for exploded package trees and decoded icons.
    pub temp_dir: PathBuf,
    /// Where the final catalog XML and icon archive are written.
    pub output_dir: PathBuf,
    /// Where the per-run build log is written.
    pub log_dir: PathBuf,
    /// On-disk cache of previously-built per-package app lists, keyed by
    /// [`crate::util::cache_key`].
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Base URL prepended to every generated screenshot/icon URL.
    pub mirror_uri: String,
    /// Directory of hand-maintained appdata XML overrides, merged in
    /// during refinement (highest precedence in the `appdata` plugin).
    pub appdata_extra: Option<PathBuf>,
    /// Directory of hand-placed screenshot sources, used when a package
    /// carries no usable screenshot of its own.
    pub screenshots_extra: Option<PathBuf>,
    /// A prior run's catalog XML, loaded at startup into an old-metadata
    /// store keyed by `X-CreaterepoAsCacheID`. A package whose input file
    /// hashes to an entry already present there is served straight from
    /// the prior catalog, skipping its task entirely — distinct from
    /// `UsePackageCache`'s own per-package scratch cache, which this run
    /// still maintains independently.
    pub old_metadata_path: Option<PathBuf>,

    /// Disables every refinement step that reaches the network
    /// (`ExtraChecks`' URL probing).
    #[serde(default)]
    pub no_network: bool,
    /// AppStream catalog format version written to the XML header.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Attaches `X-CreaterepoAsCacheID` to every written component.
    #[serde(default)]
    pub add_cache_id: bool,
    /// Enables the network-reaching extra checks (dead URL detection).
    #[serde(default)]
    pub extra_checks: bool,
    /// Skips packages whose cache entry is still valid.
    #[serde(default = "default_true")]
    pub use_package_cache: bool,
    /// Size of the worker pool driving the per-package task runner.
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
    /// File basename (without extension) for the catalog XML and icon
    /// archive, e.g. `"appstream"` produces `appstream.xml.gz`.
    #[serde(default = "default_basename")]
    pub basename: String,
}

fn default_api_version() -> String {
    "0.14".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_threads() -> usize {
    4
}

fn default_basename() -> String {
    "appstream".to_string()
}

/// Falls back to the platform cache directory when a config file omits
/// `cacheDir`, the same way a platform-aware tool cache normally would.
fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("appcatalog-builder")
}

impl Config {
    /// Validates the invariants the rest of the crate assumes hold:
    /// `max_threads` is at least one, and every configured directory
    /// either exists or can be created.
    pub fn validate(&self) -> Result<()> {
        if self.max_threads == 0 {
            return Err(Error::InvalidConfig("max_threads must be at least 1".into()));
        }
        if self.mirror_uri.is_empty() {
            return Err(Error::InvalidConfig("mirror_uri must not be empty".into()));
        }

        for dir in [&self.temp_dir, &self.output_dir, &self.log_dir, &self.cache_dir] {
            ensure_creatable(dir)?;
        }
        if let Some(dir) = &self.appdata_extra {
            ensure_creatable(dir)?;
        }
        if let Some(dir) = &self.screenshots_extra {
            ensure_creatable(dir)?;
        }

        Ok(())
    }
}

fn ensure_creatable(dir: &Path) -> Result<()> {
    if dir.exists() {
        if dir.is_dir() {
            Ok(())
        } else {
            Err(Error::InvalidConfig(format!(
                "{} exists and is not a directory",
                dir.display()
            )))
        }
    } else {
        std::fs::create_dir_all(dir).map_err(crate::error::io_err(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(dir: &Path) -> Config {
        Config {
            temp_dir: dir.join("temp"),
            output_dir: dir.join("out"),
            log_dir: dir.join("log"),
            cache_dir: dir.join("cache"),
            mirror_uri: "https://example.invalid/mirror".into(),
            appdata_extra: None,
            screenshots_extra: None,
            old_metadata_path: None,
            no_network: true,
            api_version: default_api_version(),
            add_cache_id: false,
            extra_checks: false,
            use_package_cache: true,
            max_threads: 4,
            basename: default_basename(),
        }
    }

    #[test]
    fn rejects_zero_threads() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        config.max_threads = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_mirror_uri() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        config.mirror_uri = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = base_config(dir.path());
        assert!(config.validate().is_ok());
        assert!(config.temp_dir.is_dir());
    }
}

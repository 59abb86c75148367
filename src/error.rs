// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a single plugin capability (extraction, refinement,
/// or merge). Caught by the task runner and never propagated raw: it is
/// always wrapped in [`Error::Plugin`] together with the plugin's name.
#[derive(Error, Debug)]
pub enum PluginError {
    /// The plugin attempted its work and failed.
    #[error("{0}")]
    Failed(String),
    /// The plugin does not apply to this input (not a failure).
    #[error("not supported")]
    NotSupported,
    /// Hand-authored input was rejected outright (appdata id/license
    /// mismatch): carries the app id and the reason, surfaced by the
    /// caller as [`Error::ValidationError`] rather than the generic
    /// [`Error::Plugin`] wrap.
    #[error("{1}")]
    Validation(String, String),
}

#[non_exhaustive]
#[derive(Error, Debug)]
/// Errors returned by appcatalog-builder.
pub enum Error {
    /// No package opener matched the file's suffix.
    #[error("unsupported package format: {0}")]
    UnsupportedFormat(PathBuf),
    /// The package container or one of its headers was malformed.
    #[error("failed to parse package {0}: {1}")]
    PackageParseError(PathBuf, String),
    /// A plugin capability failed while processing a package or app.
    #[error("plugin `{0}` failed: {1}")]
    Plugin(String, #[source] PluginError),
    /// An appdata merge was rejected (id mismatch or disallowed license).
    #[error("appdata validation failed for {0}: {1}")]
    ValidationError(String, String),
    /// I/O error with the path that caused it.
    #[error("I/O error at {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    /// A network operation failed; always non-fatal to the caller.
    #[error("network error: {0}")]
    NetworkError(String),
    /// Failed to get the parent directory of a path.
    #[error("failed to get parent directory of {0}")]
    ParentDirNotFound(PathBuf),
    /// Failed to extract a filename from a path.
    #[error("failed to extract filename from {0}")]
    FailedToExtractFilename(PathBuf),
    /// `MaxThreads` was zero or another config invariant was violated.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Glob pattern error.
    #[error(transparent)]
    GlobPatternError(#[from] glob::PatternError),
    /// walkdir crate errors.
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
    /// image crate errors.
    #[error(transparent)]
    Image(#[from] image::ImageError),
    /// rpm crate errors.
    #[error("rpm error: {0}")]
    Rpm(String),
    /// sqlite errors (ibus-table extraction).
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    /// XML parsing/writing errors (ibus component and appdata XML, catalog output).
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    /// XML attribute errors.
    #[error(transparent)]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),
    /// Hex de/encoding errors.
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
    /// Path prefix strip error.
    #[error(transparent)]
    StripPrefixError(#[from] std::path::StripPrefixError),
    /// System time errors.
    #[error(transparent)]
    SystemTimeError(#[from] std::time::SystemTimeError),
    /// Utf8 decoding error.
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

impl From<rpm::Error> for Error {
    fn from(e: rpm::Error) -> Self {
        Error::Rpm(e.to_string())
    }
}

/// Convenient type alias of the Result type for appcatalog-builder.
pub type Result<T> = std::result::Result<T, Error>;

/// Maps an [`std::io::Error`] into [`Error::Io`], attaching the path that
/// was being operated on.
pub(crate) fn io_err(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Error {
    let path = path.into();
    move |e| Error::Io(path, e)
}

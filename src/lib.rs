// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Ingests RPM and Debian packages and emits a consolidated AppStream
//! metadata catalog: a gzip-compressed component XML file plus a matching
//! icon/screenshot archive, ready to be published alongside a package
//! repository.
//!
//! ### Pipeline
//!
//! Each input package is opened, exploded into a scratch directory, and
//! scanned by a fixed set of extraction plugins (desktop entries, IBus
//! input methods, fonts). Every app found is then run through a fixed
//! chain of refinement plugins (GObject-Introspection metadata, gettext
//! translation coverage, GStreamer element discovery, toolkit detection,
//! project-group heuristics, a package-name blacklist, and finally
//! upstream/override appdata merging) before the whole batch is
//! deduplicated, rendered, and written out as a catalog.
//!
//! ### Library
//!
//! ```no_run
//! use appcatalog_builder::{Config, Context};
//!
//! let config: Config = todo!();
//! let ctx = Context::new(config)?;
//! let output = ctx.build(&[std::path::PathBuf::from("example.rpm")])?;
//! println!("wrote {} apps to {}", output.app_count, output.catalog_path.display());
//! # Ok::<(), appcatalog_builder::Error>(())
//! ```

mod app;
mod config;
mod context;
mod error;
mod glob_table;
mod image_pipeline;
mod package;
mod plugin;
mod shell;
mod task;
mod util;

pub use app::{App, AppKind};
pub use config::Config;
pub use context::{CatalogOutput, Context};
pub use error::{Error, PluginError, Result};
pub use package::{Package, PackageFormat, PackageId};

/// Initializes the `tracing` subscriber used by the rest of the crate,
/// honoring `RUST_LOG` the way most `tracing`-based CLI front-ends do.
pub fn init_tracing_subscriber() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .init();
}

/// Builds a catalog from `packages` using `config`, the single entry
/// point most callers need.
pub fn build_catalog(config: Config, packages: &[std::path::PathBuf]) -> Result<CatalogOutput> {
    let ctx = Context::new(config)?;
    ctx.build(packages)
}

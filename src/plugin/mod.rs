// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Plugin capability model: a fixed set of extraction and
//! refinement capabilities, registered once at startup rather than loaded
//! from dynamic libraries, since the catalog builder ships as
//! a single binary, so there is no plugin directory to scan).

mod appdata;
mod blacklist;
mod desktop;
mod extra_checks;
mod font;
mod gettext;
mod gir;
mod gstreamer;
mod hardcoded;
mod ime_sqlite;
mod ime_xml;
mod nm;

use crate::{
    app::App,
    config::Config,
    error::{PluginError, Result},
    package::{Package, PackageId},
};

/// One extraction or refinement capability. Extraction plugins find new
/// `App`s inside an exploded package tree; refinement plugins enrich apps
/// already found, in a fixed order.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Looks for apps of this plugin's kind inside the exploded tree at
    /// `root`, returning newly discovered apps. Returns
    /// `Err(PluginError::NotSupported)` when nothing of this kind is
    /// present, which the task runner treats as a no-op rather than a
    /// failure.
    fn extract(
        &self,
        _pkg_id: PackageId,
        _package: &Package,
        _root: &std::path::Path,
    ) -> std::result::Result<Vec<App>, PluginError> {
        Err(PluginError::NotSupported)
    }

    /// Enriches `app` in place using the exploded tree at `root`. Called
    /// once per app, in registration order, for every refinement plugin.
    /// `requires` is the owning package's dependency list, already
    /// resolved by the task runner so individual plugins never need to
    /// reopen the package.
    fn refine(
        &self,
        _app: &mut App,
        _root: &std::path::Path,
        _config: &Config,
        _requires: &[String],
    ) -> std::result::Result<(), PluginError> {
        Ok(())
    }
}

/// Fixed registration order for refinement plugins: blacklist first so a
/// vetoed app stops costing the other plugins any work, then GIR, the
/// supplemental GStreamer element-metadata pass, and gettext (cheapest,
/// most apps benefit), then the network-probing extra checks, then the
/// hardcoded heuristics, and always appdata merging last so hand-authored
/// overrides win.
pub fn refinement_plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(blacklist::BlacklistPlugin::new()),
        Box::new(gir::GirPlugin),
        Box::new(gstreamer::GStreamerPlugin),
        Box::new(gettext::GettextPlugin),
        Box::new(nm::NmPlugin),
        Box::new(hardcoded::HardcodedPlugin::new()),
        Box::new(appdata::AppdataPlugin),
    ]
}

/// Extraction plugins, tried in order against every exploded package; the
/// first to report apps for a given kind of content wins that content.
pub fn extraction_plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(desktop::DesktopPlugin),
        Box::new(ime_sqlite::ImeSqlitePlugin),
        Box::new(ime_xml::ImeXmlPlugin),
        Box::new(font::FontPlugin),
    ]
}

/// Runs every extraction plugin against the exploded tree, collecting all
/// apps found. A plugin reporting `NotSupported` is skipped silently; a
/// plugin reporting `Failed` is logged as a veto-worthy error by the
/// caller but does not stop the other plugins from running.
pub fn extract_all(
    pkg_id: PackageId,
    package: &Package,
    root: &std::path::Path,
) -> Result<Vec<App>> {
    let mut apps = Vec::new();
    for plugin in extraction_plugins() {
        match plugin.extract(pkg_id, package, root) {
            Ok(found) => apps.extend(found),
            Err(PluginError::NotSupported) => continue,
            Err(e) => {
                return Err(crate::error::Error::Plugin(plugin.name().to_string(), e));
            }
        }
    }
    Ok(apps)
}

/// Runs every refinement plugin against `app`, in the fixed order above.
pub fn refine_all(app: &mut App, root: &std::path::Path, config: &Config, requires: &[String]) -> Result<()> {
    for plugin in refinement_plugins() {
        if let Err(e) = plugin.refine(app, root, config, requires) {
            return Err(match e {
                PluginError::Validation(id, reason) => crate::error::Error::ValidationError(id, reason),
                e => crate::error::Error::Plugin(plugin.name().to_string(), e),
            });
        }
    }
    Ok(())
}

/// Runs the network-reaching extra checks as a plain post-refinement step
/// rather than a registered plugin: warning-only, never vetoes, and has no
/// bearing on plugin merge/order semantics.
pub fn run_extra_checks(app: &mut App, config: &Config) {
    extra_checks::check(app, config);
}

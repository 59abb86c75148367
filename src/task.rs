// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Per-package task runner: the ordered sequence of steps that turns one
//! package path into zero or more refined [`App`]s, expressed as a single
//! function with early returns rather than an explicit state-machine type.

use std::path::{Path, PathBuf};

use crate::{
    app::{App, RequiresAppdata},
    config::Config,
    error::Result,
    package::{Package, PackageId, PackageOps},
    plugin, util,
};

/// `X-Kudo-*` keys collected onto every app whose package declares the
/// corresponding capability, independent of package format.
pub const KUDO_KEYS: &[&str] = &[
    "X-Kudo-SearchProvider",
    "X-Kudo-InstallsUserDocs",
    "X-Kudo-UsesNotifications",
    "X-Kudo-HighContrast",
    "X-Kudo-HiDpiIcon",
    "X-Kudo-ModernToolkit",
];

/// Outcome of running the task for one package: either a list of apps (the
/// package may legitimately contribute zero, e.g. a pure library), or a
/// skip/failure reason that the caller logs but does not propagate as a
/// hard error unless every package in the run fails.
#[derive(Debug)]
pub enum TaskOutcome {
    Done(Vec<App>),
    Skipped(String),
}

/// Runs the full per-package pipeline: open, scan for a cache hit,
/// explode, extract apps, refine each one, and attach common metadata.
/// Named after the six states this function threads through: Admitted,
/// Scanned, Exploded, Extracted, Refined, Done (with Skipped/Failed as the
/// two error exits).
#[tracing::instrument(level = "info", skip(config, extra_paths), fields(path = %path.display()))]
pub fn run_task(
    pkg_id: PackageId,
    path: &Path,
    temp_dir: &Path,
    config: &Config,
    extra_paths: &[PathBuf],
) -> Result<TaskOutcome> {
    // Admitted -> Scanned: compute the cache key up front so a hit can
    // short-circuit everything below it.
    let cache_key = util::cache_key(path)?;
    if config.use_package_cache {
        if let Some(cached) = find_in_cache(&config.cache_dir, &cache_key)? {
            tracing::debug!(cache_key, "cache hit, skipping extraction");
            return Ok(TaskOutcome::Done(cached));
        }
    }

    let package = match Package::open(path) {
        Ok(p) => p,
        Err(e) => return Ok(TaskOutcome::Skipped(format!("failed to open package: {e}"))),
    };

    // Scanned -> Exploded.
    let explode_dir = temp_dir.join("explode").join(pkg_id.0.to_string());
    util::create_clean_dir(&explode_dir)?;
    if let Err(e) = package.explode(&explode_dir, None) {
        return Ok(TaskOutcome::Skipped(format!("failed to explode package: {e}")));
    }
    // Sibling `-data`/`-common` packages are exploded on top, restricted
    // to shared resource directories so their extraction doesn't pull in
    // a second copy of the sibling's own binaries.
    let shared_glob = [glob::Pattern::new("usr/share/*").expect("valid literal glob")];
    for extra_path in extra_paths {
        if let Ok(extra_package) = Package::open(extra_path) {
            let _ = extra_package.explode(&explode_dir, Some(&shared_glob));
        }
    }

    // Exploded -> Extracted.
    let mut apps = plugin::extract_all(pkg_id, &package, &explode_dir)?;
    if apps.is_empty() {
        return Ok(TaskOutcome::Done(Vec::new()));
    }

    // Extracted -> Refined.
    let config_map = package.config_map();
    let requires = package.requires();
    for app in &mut apps {
        app.releases = package.releases().to_vec();
        plugin::refine_all(app, &explode_dir, config, &requires)?;
        plugin::run_extra_checks(app, config);
        apply_invariants(app);
        fill_rendered_screenshot_urls(app, &config.mirror_uri);

        for (key, value) in &config_map {
            app.metadata.entry(key.clone()).or_insert_with(|| value.clone());
        }
        for key in KUDO_KEYS {
            if package.requires().iter().any(|r| r == *key) {
                app.metadata.insert((*key).to_string(), "true".to_string());
            }
        }
        if config.add_cache_id {
            app.metadata
                .insert("X-CreaterepoAsCacheID".to_string(), cache_key.clone());
        }
    }

    // Refined -> Written/Done: writing happens in the context's merge
    // phase once every package's apps have been collected, so this
    // function's job ends here.
    if config.use_package_cache {
        write_to_cache(&config.cache_dir, &cache_key, &apps)?;
    }

    Ok(TaskOutcome::Done(apps))
}

/// Enforces, centrally and after every refinement plugin has run, the
/// invariants every extraction plugin otherwise benefits from for free:
/// I5 (a catalog entry needs a name and a comment), I6 (and an icon), and
/// I2 (an app still flagged as requiring hand-authored appdata after the
/// appdata plugin ran is not catalog-worthy).
fn apply_invariants(app: &mut App) {
    if app.names.is_empty() {
        app.add_veto("Has no Name");
    }
    if app.summaries.is_empty() {
        app.add_veto("Has no Comment");
    }
    if app.icon.is_none() {
        app.add_veto("Has no Icon");
    }
    if !app.requires_appdata.is_empty() {
        let reasons = app
            .requires_appdata
            .iter()
            .map(|r| match r {
                RequiresAppdata::Unspecified => "appdata required".to_string(),
                RequiresAppdata::Reason(reason) => reason.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ");
        app.add_veto(format!("requires appdata: {reasons}"));
    }
}

/// Fills in the URL of any screenshot image a plugin rendered in-memory
/// rather than loading from a source file (the font plugin's sample-text
/// previews), since the plugin that renders it has no access to the
/// configured mirror base.
fn fill_rendered_screenshot_urls(app: &mut App, mirror_uri: &str) {
    for shot in &mut app.screenshots {
        for image in &mut shot.images {
            if image.url.is_empty() {
                image.url = format!(
                    "{}/source/{}",
                    mirror_uri.trim_end_matches('/'),
                    image.basename
                );
            }
        }
    }
}

fn cache_path(cache_dir: &Path, cache_key: &str) -> PathBuf {
    cache_dir.join(format!("{cache_key}.json"))
}

/// Cache is opt-in (`UsePackageCache`) and stores only the plain-data
/// fields of an app: decoded icon/screenshot pixel buffers are scratch
/// state and are regenerated from the screenshot source paths when a
/// cached app's resources are saved, rather than round-tripped through
/// JSON.
fn find_in_cache(cache_dir: &Path, cache_key: &str) -> Result<Option<Vec<App>>> {
    let path = cache_path(cache_dir, cache_key);
    if !path.is_file() {
        return Ok(None);
    }
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(_) => return Ok(None),
    };
    match serde_json::from_str::<Vec<crate::app::CachedApp>>(&text) {
        Ok(cached) => Ok(Some(cached.into_iter().map(crate::app::App::from_cached).collect())),
        Err(_) => Ok(None),
    }
}

fn write_to_cache(cache_dir: &Path, cache_key: &str, apps: &[App]) -> Result<()> {
    let path = cache_path(cache_dir, cache_key);
    let cached: Vec<crate::app::CachedApp> = apps.iter().map(crate::app::CachedApp::from_app).collect();
    let text = serde_json::to_string(&cached).map_err(|e| {
        crate::error::Error::PackageParseError(path.clone(), format!("cache serialization failed: {e}"))
    })?;
    let mut file = util::create_file(&path)?;
    std::io::Write::write_all(&mut file, text.as_bytes()).map_err(crate::error::io_err(&path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kudo_keys_are_all_x_prefixed() {
        assert!(KUDO_KEYS.iter().all(|k| k.starts_with("X-Kudo-")));
    }

    #[test]
    fn cache_miss_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_in_cache(dir.path(), "deadbeef").unwrap().is_none());
    }
}

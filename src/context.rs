// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Run context: owns the configuration, drives the bounded worker
//! pool over every input package, deduplicates and merges the resulting
//! apps, and writes the final catalog XML and icon archive.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Mutex,
};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::{
    app::{self, App},
    config::Config,
    error::{io_err, Result},
    glob_table::GlobValueTable,
    package::{Package, PackageId, PackageOps},
    task::{self, TaskOutcome},
    util,
};

/// Package-name patterns dropped before any work is spent on them, applied
/// at admission time rather than as a refinement plugin since refinement
/// never runs for a package that never gets exploded. This is a smaller
/// table than the app-id blacklist in `plugin::blacklist`: it only needs to
/// catch the packages obviously not worth opening at all (the app-id table
/// catches the rest once desktop/font/etc. entries are known).
const ADMISSION_BLACKLIST_PATTERNS: &[&str] = &["*-debuginfo", "*-debugsource"];

fn admission_blacklist() -> GlobValueTable<&'static str> {
    let mut table = GlobValueTable::new();
    for pattern in ADMISSION_BLACKLIST_PATTERNS {
        table.push(pattern, *pattern);
    }
    table
}

/// Package-name suffixes whose sibling package (if present among this
/// run's inputs) is always exploded into the same scratch directory, so
/// resources split across the "real" package and its data/common sibling
/// merge rather than requiring the app to reference a package it never saw.
const EXTRA_PACKAGE_SUFFIXES: &[&str] = &["-data", "-common"];

/// The packaging context info: configuration plus the collected output of
/// a run.
pub struct Context {
    pub config: Config,
    apps: Mutex<Vec<App>>,
    log: Mutex<Vec<String>>,
}

impl Context {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            apps: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
        })
    }

    /// Logs to both the in-memory build log (flushed to `LogDir` at the
    /// end of the run) and `tracing`, so the same message always reaches
    /// both sinks together.
    fn log(&self, level: tracing::Level, message: impl Into<String> + std::fmt::Display) {
        match level {
            tracing::Level::WARN => tracing::warn!("{message}"),
            tracing::Level::ERROR => tracing::error!("{message}"),
            _ => tracing::info!("{message}"),
        }
        self.log.lock().unwrap().push(message.to_string());
    }

    /// Runs the catalog build end to end: scans packages, extracts and
    /// refines apps in parallel, deduplicates older package versions,
    /// writes the final catalog and icon archive, and flushes the build
    /// log.
    #[tracing::instrument(level = "info", skip(self, packages))]
    pub fn build(&self, packages: &[PathBuf]) -> Result<CatalogOutput> {
        let old_metadata = self.load_old_metadata_store()?;
        let admitted = self.admit_packages(packages);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_threads)
            .build()
            .map_err(|e| crate::error::Error::InvalidConfig(e.to_string()))?;

        let results: Vec<(PathBuf, Result<TaskOutcome>)> = pool.install(|| {
            use rayon::prelude::*;
            admitted
                .par_iter()
                .enumerate()
                .map(|(i, pkg)| {
                    let pkg_id = PackageId(i);
                    if let Some(store) = &old_metadata {
                        if let Ok(cache_key) = util::cache_key(&pkg.path) {
                            if let Some(cached) = store.get(&cache_key) {
                                let apps = cached
                                    .iter()
                                    .cloned()
                                    .map(|mut a| {
                                        a.package = pkg_id;
                                        a
                                    })
                                    .collect();
                                return (pkg.path.clone(), Ok(TaskOutcome::Done(apps)));
                            }
                        }
                    }
                    let outcome = task::run_task(
                        pkg_id,
                        &pkg.path,
                        &self.config.temp_dir,
                        &self.config,
                        &pkg.extra_paths,
                    );
                    (pkg.path.clone(), outcome)
                })
                .collect()
        });

        for (path, outcome) in results {
            match outcome {
                Ok(TaskOutcome::Done(apps)) => {
                    if !apps.is_empty() {
                        self.log(
                            tracing::Level::INFO,
                            format!("{}: extracted {} app(s)", path.display(), apps.len()),
                        );
                    }
                    self.apps.lock().unwrap().extend(apps);
                }
                Ok(TaskOutcome::Skipped(reason)) => {
                    self.log(
                        tracing::Level::WARN,
                        format!("{}: skipped ({reason})", path.display()),
                    );
                }
                Err(e) => {
                    self.log(
                        tracing::Level::ERROR,
                        format!("{}: failed ({e})", path.display()),
                    );
                }
            }
        }

        let apps = self.apps.lock().unwrap();
        let accepted: Vec<&App> = apps.iter().filter(|a| a.vetoes.is_empty()).collect();

        for app in &accepted {
            app.save_resources(&self.config.temp_dir, &self.config.output_dir)?;
        }

        let catalog_path = self
            .config
            .output_dir
            .join(format!("{}.xml.gz", self.config.basename));
        write_catalog_xml(&catalog_path, &accepted, &self.config)?;

        let icons_path = self
            .config
            .output_dir
            .join(format!("{}-icons.tar.gz", self.config.basename));
        let icons_dir = self.config.temp_dir.join("icons");
        let icons_file = util::create_file(&icons_path)?;
        util::write_tar_gz(&icons_dir, icons_file)?;

        self.flush_log()?;

        Ok(CatalogOutput {
            catalog_path,
            icons_path,
            app_count: accepted.len(),
            veto_count: apps.len() - accepted.len(),
        })
    }

    /// Opens every input package once, drops ones hitting the admission
    /// blacklist, and keeps only the newest release per source package
    /// name (via [`Package::compare`]) — before any worker-pool time is
    /// spent on the losers. Also resolves each admitted package's
    /// `-data`/`-common` sibling, if one is present among the inputs, so
    /// `task::run_task` can explode it into the same scratch directory.
    fn admit_packages(&self, packages: &[PathBuf]) -> Vec<AdmittedPackage> {
        let blacklist = admission_blacklist();
        let mut opened: Vec<(PathBuf, Package)> = Vec::new();
        for path in packages {
            match Package::open(path) {
                Ok(pkg) => {
                    if let Some(pattern) = blacklist.search(&pkg.nevr().name) {
                        self.log(
                            tracing::Level::INFO,
                            format!(
                                "{}: package name matches blacklist pattern {pattern}, skipping",
                                path.display()
                            ),
                        );
                        continue;
                    }
                    opened.push((path.clone(), pkg));
                }
                Err(e) => {
                    self.log(
                        tracing::Level::WARN,
                        format!("{}: failed to open package: {e}", path.display()),
                    );
                }
            }
        }

        let mut newest: HashMap<String, usize> = HashMap::new();
        for idx in 0..opened.len() {
            newest
                .entry(opened[idx].1.nevr().name.clone())
                .and_modify(|best: &mut usize| {
                    if opened[*best].1.compare(&opened[idx].1) == std::cmp::Ordering::Less {
                        *best = idx;
                    }
                })
                .or_insert(idx);
        }
        let keep: HashSet<usize> = newest.into_values().collect();

        for (idx, (path, pkg)) in opened.iter().enumerate() {
            if !keep.contains(&idx) {
                self.log(
                    tracing::Level::INFO,
                    format!(
                        "{}: superseded by a newer release of {}, skipping",
                        path.display(),
                        pkg.nevr().name
                    ),
                );
            }
        }

        let name_to_path: HashMap<String, PathBuf> = opened
            .iter()
            .enumerate()
            .filter(|(idx, _)| keep.contains(idx))
            .map(|(_, (path, pkg))| (pkg.nevr().name.clone(), path.clone()))
            .collect();

        opened
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| keep.contains(idx))
            .map(|(_, (path, pkg))| {
                let extra_paths = EXTRA_PACKAGE_SUFFIXES
                    .iter()
                    .filter_map(|suffix| name_to_path.get(&format!("{}{suffix}", pkg.nevr().name)))
                    .cloned()
                    .collect();
                AdmittedPackage { path, extra_paths }
            })
            .collect()
    }

    /// Loads a prior run's catalog (if `OldMetadataPath` is configured)
    /// into a lookup from `X-CreaterepoAsCacheID` to the app(s) that
    /// component produced, so a package whose input file hashes to an
    /// entry already present there is served directly instead of
    /// re-running its task. Distinct from `UsePackageCache`'s per-package
    /// scratch cache in `task.rs`, which this run still maintains on its
    /// own regardless of whether an old-metadata store is supplied.
    fn load_old_metadata_store(&self) -> Result<Option<HashMap<String, Vec<App>>>> {
        let Some(path) = &self.config.old_metadata_path else {
            return Ok(None);
        };
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = std::fs::read(path).map_err(io_err(path))?;
        let mut text = String::new();
        std::io::Read::read_to_string(&mut flate2::read::GzDecoder::new(&bytes[..]), &mut text)
            .map_err(io_err(path))?;

        let mut store: HashMap<String, Vec<App>> = HashMap::new();
        for app in parse_catalog_components(&text) {
            if let Some(cache_id) = app.metadata.get("X-CreaterepoAsCacheID").cloned() {
                store.entry(cache_id).or_default().push(app);
            }
        }
        self.log(
            tracing::Level::INFO,
            format!(
                "loaded {} app(s) from old metadata store {}",
                store.values().map(Vec::len).sum::<usize>(),
                path.display()
            ),
        );
        Ok(Some(store))
    }

    /// For desktop apps still missing a screenshot, looks for a
    /// hand-placed one under `ScreenshotsExtra/<id>/`.
    fn merge_extra_screenshots(&self) -> Result<()> {
        let Some(extra_dir) = &self.config.screenshots_extra else {
            return Ok(());
        };
        let mut apps = self.apps.lock().unwrap();
        for app in apps.iter_mut() {
            if !app.screenshots.is_empty() {
                continue;
            }
            let app_dir = extra_dir.join(&app.id);
            if !app_dir.is_dir() {
                continue;
            }
            for entry in walkdir::WalkDir::new(&app_dir)
                .max_depth(1)
                .into_iter()
                .filter_map(std::result::Result::ok)
            {
                if entry.file_type().is_file() {
                    app.add_screenshot_source(entry.path(), &self.config.mirror_uri)?;
                }
            }
        }
        Ok(())
    }

    fn flush_log(&self) -> Result<()> {
        let log = self.log.lock().unwrap();
        let path = self.config.log_dir.join("appcatalog-builder.log");
        let mut file = util::create_file(&path)?;
        for entry in log.iter() {
            std::io::Write::write_all(&mut file, entry.as_bytes()).map_err(io_err(&path))?;
            std::io::Write::write_all(&mut file, b"\n").map_err(io_err(&path))?;
        }
        Ok(())
    }
}

/// One package admitted past the admission-time blacklist/dedup pass,
/// along with any `-data`/`-common` sibling to explode into the same
/// scratch directory.
struct AdmittedPackage {
    path: PathBuf,
    extra_paths: Vec<PathBuf>,
}

/// Re-parses a previously written catalog XML back into [`App`]s, reading
/// only the fields the old-metadata store needs: id, localized name and
/// summary, license/group, package names, and the `<custom>` metadata
/// block (which is where `X-CreaterepoAsCacheID` lives).
fn parse_catalog_components(text: &str) -> Vec<App> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut apps = Vec::new();
    let mut current: Option<App> = None;
    let mut current_tag: Option<String> = None;
    let mut current_locale = String::from("C");
    let mut current_key: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(_) => break,
        };
        match event {
            Event::Eof => break,
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "component" => {
                        let kind_suffix = e
                            .attributes()
                            .flatten()
                            .find(|a| a.key.as_ref() == b"type")
                            .map(|a| String::from_utf8_lossy(&a.value).into_owned())
                            .unwrap_or_else(|| "desktop".to_string());
                        current = Some(App::new(String::new(), app::kind_from_suffix(&kind_suffix), PackageId(0)));
                    }
                    "name" | "summary" => {
                        current_locale = e
                            .attributes()
                            .flatten()
                            .find(|a| a.key.as_ref() == b"xml:lang")
                            .map(|a| String::from_utf8_lossy(&a.value).into_owned())
                            .unwrap_or_else(|| "C".to_string());
                    }
                    "value" => {
                        current_key = e
                            .attributes()
                            .flatten()
                            .find(|a| a.key.as_ref() == b"key")
                            .map(|a| String::from_utf8_lossy(&a.value).into_owned());
                    }
                    _ => {}
                }
                current_tag = Some(name);
            }
            Event::End(e) => {
                if e.name().as_ref() == b"component" {
                    if let Some(app) = current.take() {
                        apps.push(app);
                    }
                }
                current_tag = None;
            }
            Event::Text(e) => {
                let Ok(text) = e.unescape() else { continue };
                let text = text.into_owned();
                if let Some(app) = current.as_mut() {
                    match current_tag.as_deref() {
                        Some("id") => app.id = text,
                        Some("name") => {
                            app.names.insert(current_locale.clone(), text);
                        }
                        Some("summary") => {
                            app.summaries.insert(current_locale.clone(), text);
                        }
                        Some("project_license") => app.project_license = Some(text),
                        Some("project_group") => app.project_group = Some(text),
                        Some("pkgname") => app.pkgnames.push(text),
                        Some("value") => {
                            if let Some(key) = current_key.take() {
                                app.metadata.insert(key, text);
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }
    apps
}

/// Result of a full [`Context::build`] run.
#[derive(Debug)]
pub struct CatalogOutput {
    pub catalog_path: PathBuf,
    pub icons_path: PathBuf,
    pub app_count: usize,
    pub veto_count: usize,
}

fn write_catalog_xml(dest: &Path, apps: &[&App], config: &Config) -> Result<()> {
    let mut buf = Vec::new();
    {
        let mut writer = Writer::new_with_indent(&mut buf, b' ', 2);

        let mut root = BytesStart::new("components");
        root.push_attribute(("version", config.api_version.as_str()));
        writer.write_event(Event::Start(root.clone()))?;

        for app in apps {
            write_component(&mut writer, app)?;
        }

        writer.write_event(Event::End(BytesEnd::new("components")))?;
    }

    let file = util::create_file(dest)?;
    let mut gz = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    std::io::Write::write_all(&mut gz, &buf).map_err(io_err(dest))?;
    gz.finish().map_err(io_err(dest))?;
    Ok(())
}

fn write_component<W: std::io::Write>(writer: &mut Writer<W>, app: &App) -> Result<()> {
    let mut component = BytesStart::new("component");
    component.push_attribute(("type", app.kind.suffix()));
    writer.write_event(Event::Start(component))?;

    write_text_element(writer, "id", &app.id)?;
    for (locale, name) in &app.names {
        write_localized_element(writer, "name", locale, name)?;
    }
    for (locale, summary) in &app.summaries {
        write_localized_element(writer, "summary", locale, summary)?;
    }
    if let Some(license) = &app.project_license {
        write_text_element(writer, "project_license", license)?;
    }
    if let Some(group) = &app.project_group {
        write_text_element(writer, "project_group", group)?;
    }

    writer.write_event(Event::Start(BytesStart::new("pkgname")))?;
    for name in &app.pkgnames {
        writer.write_event(Event::Text(BytesText::new(name)))?;
    }
    writer.write_event(Event::End(BytesEnd::new("pkgname")))?;

    if !app.metadata.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("custom")))?;
        for (key, value) in &app.metadata {
            let mut val = BytesStart::new("value");
            val.push_attribute(("key", key.as_str()));
            writer.write_event(Event::Start(val))?;
            writer.write_event(Event::Text(BytesText::new(value)))?;
            writer.write_event(Event::End(BytesEnd::new("value")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("custom")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("component")))?;
    Ok(())
}

fn write_text_element<W: std::io::Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn write_localized_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    tag: &str,
    locale: &str,
    text: &str,
) -> Result<()> {
    let mut start = BytesStart::new(tag);
    if locale != "C" {
        start.push_attribute(("xml:lang", locale));
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppKind;

    fn test_config(dir: &Path) -> Config {
        Config {
            temp_dir: dir.join("temp"),
            output_dir: dir.join("out"),
            log_dir: dir.join("log"),
            cache_dir: dir.join("cache"),
            mirror_uri: "https://example.invalid".into(),
            appdata_extra: None,
            screenshots_extra: None,
            old_metadata_path: None,
            no_network: true,
            api_version: "0.14".into(),
            add_cache_id: false,
            extra_checks: false,
            use_package_cache: false,
            max_threads: 2,
            basename: "appstream".into(),
        }
    }

    #[test]
    fn build_with_no_packages_still_writes_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(test_config(dir.path())).unwrap();
        let output = ctx.build(&[]).unwrap();
        assert_eq!(output.app_count, 0);
        assert!(output.catalog_path.is_file());
    }

    #[test]
    fn admission_blacklist_matches_debuginfo_packages() {
        let table = admission_blacklist();
        assert!(table.search("foo-debuginfo").is_some());
        assert!(table.search("foo").is_none());
    }

    #[test]
    fn catalog_xml_round_trips_custom_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::new("foo.desktop", AppKind::Desktop, PackageId(0));
        app.names.insert("C".into(), "Foo".into());
        app.pkgnames.push("foo".into());
        app.metadata
            .insert("X-CreaterepoAsCacheID".into(), "deadbeef".into());

        let path = dir.path().join("catalog.xml.gz");
        write_catalog_xml(&path, &[&app], &test_config(dir.path())).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let mut text = String::new();
        std::io::Read::read_to_string(&mut flate2::read::GzDecoder::new(&bytes[..]), &mut text).unwrap();
        let parsed = parse_catalog_components(&text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "foo.desktop");
        assert_eq!(
            parsed[0].metadata.get("X-CreaterepoAsCacheID").map(String::as_str),
            Some("deadbeef")
        );
    }
}

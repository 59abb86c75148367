// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Desktop-entry extraction (C5): reads `usr/share/applications/*.desktop`
//! files out of an exploded package tree into [`App`] records.

use std::{collections::BTreeMap, path::Path};

use crate::{
    app::{App, AppKind},
    error::PluginError,
    package::{Package, PackageId, PackageOps},
};

use super::Plugin;

pub struct DesktopPlugin;

/// A `Type` other than `Application` means the entry isn't an app at all
/// (a `Link`, `Directory`, ...) and is skipped outright, unlike
/// `NoDisplay`/`Hidden` which still produce a catalog entry, just one that
/// requires a human to vouch for it via appdata.
fn is_catalog_worthy(fields: &BTreeMap<String, String>) -> bool {
    matches!(fields.get("Type").map(String::as_str), Some("Application") | None)
}

fn icon_suffix_veto(icon: &str) -> Option<&'static str> {
    if icon.ends_with(".xpm") {
        Some("Uses XPM icon")
    } else if icon.ends_with(".gif") {
        Some("Uses GIF icon")
    } else if icon.ends_with(".ico") {
        Some("Uses ICO icon")
    } else {
        None
    }
}

/// Parses a `.ini`-like desktop entry's `[Desktop Entry]` group into a flat
/// key/value map, keeping the `[lang]` suffix attached to the key (e.g.
/// `Name[fr]`) so localized variants can be told apart later.
fn parse_desktop_entry(text: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    let mut in_group = false;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') {
            in_group = line == "[Desktop Entry]";
            continue;
        }
        if !in_group {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            fields.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    fields
}

fn locale_of(key: &str) -> (&str, &str) {
    match key.split_once('[') {
        Some((base, rest)) => (base, rest.trim_end_matches(']')),
        None => (key, "C"),
    }
}

impl Plugin for DesktopPlugin {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn extract(
        &self,
        pkg_id: PackageId,
        package: &Package,
        root: &Path,
    ) -> std::result::Result<Vec<App>, PluginError> {
        let apps_dir = root.join("usr/share/applications");
        if !apps_dir.is_dir() {
            return Err(PluginError::NotSupported);
        }

        let mut apps = Vec::new();
        for entry in walkdir::WalkDir::new(&apps_dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("desktop") {
                continue;
            }
            let text = std::fs::read_to_string(path)
                .map_err(|e| PluginError::Failed(e.to_string()))?;
            let fields = parse_desktop_entry(&text);

            if !is_catalog_worthy(&fields) {
                continue;
            }

            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| format!("{s}.desktop"))
                .ok_or_else(|| PluginError::Failed("non-UTF8 desktop file name".into()))?;

            let mut app = App::new(id, AppKind::Desktop, pkg_id);
            app.pkgnames.push(package.nevr().name.clone());

            for (key, value) in &fields {
                let (base, locale) = locale_of(key);
                match base {
                    "Name" => {
                        app.names.insert(locale.to_string(), value.clone());
                    }
                    "Comment" => {
                        app.summaries.insert(locale.to_string(), value.clone());
                    }
                    "Icon" => {
                        if let Some(reason) = icon_suffix_veto(value) {
                            app.add_veto(format!("{reason}: {value}"));
                        }
                        app.icon = Some(crate::app::Icon {
                            name: value.clone(),
                            kind: crate::app::IconKind::Cached,
                        });
                    }
                    "Categories" => {
                        app.categories
                            .extend(value.split(';').filter(|c| !c.is_empty()).map(str::to_string));
                    }
                    "Keywords" => {
                        app.keywords
                            .extend(value.split(';').filter(|k| !k.is_empty()).map(str::to_string));
                    }
                    "MimeType" => {
                        app.mime_types
                            .extend(value.split(';').filter(|m| !m.is_empty()).map(str::to_string));
                    }
                    "OnlyShowIn" => {
                        app.compulsory_for_desktop
                            .extend(value.split(';').filter(|v| !v.is_empty()).map(str::to_string));
                    }
                    _ => {}
                }
            }

            if fields.get("NoDisplay").map(String::as_str) == Some("true") {
                app.add_requires_appdata(Some("NoDisplay=true"));
            }
            if fields.get("Hidden").map(String::as_str) == Some("true") {
                app.add_requires_appdata(Some("Hidden=true"));
            }

            apps.push(app);
        }

        if apps.is_empty() {
            return Err(PluginError::NotSupported);
        }
        Ok(apps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_application_types_are_not_catalog_worthy() {
        let mut fields = BTreeMap::new();
        fields.insert("Type".into(), "Link".into());
        assert!(!is_catalog_worthy(&fields));
    }

    #[test]
    fn nodisplay_entries_are_still_catalog_worthy() {
        let mut fields = BTreeMap::new();
        fields.insert("NoDisplay".into(), "true".into());
        assert!(is_catalog_worthy(&fields));
    }

    #[test]
    fn xpm_icons_are_vetoed() {
        assert_eq!(icon_suffix_veto("foo.xpm"), Some("Uses XPM icon"));
        assert_eq!(icon_suffix_veto("foo.png"), None);
    }

    #[test]
    fn parses_localized_keys() {
        let text = "[Desktop Entry]\nType=Application\nName=Foo\nName[fr]=Foux\n";
        let fields = parse_desktop_entry(text);
        assert_eq!(fields.get("Name").unwrap(), "Foo");
        assert_eq!(fields.get("Name[fr]").unwrap(), "Foux");
        assert_eq!(locale_of("Name[fr]"), ("Name", "fr"));
        assert_eq!(locale_of("Name"), ("Name", "C"));
    }

    #[test]
    fn ignores_keys_outside_desktop_entry_group() {
        let text = "[Desktop Action Foo]\nName=Bar\n[Desktop Entry]\nName=Baz\n";
        let fields = parse_desktop_entry(text);
        assert_eq!(fields.get("Name").unwrap(), "Baz");
    }
}

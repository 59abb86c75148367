// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Hardcoded-heuristics refinement (C6): the catch-all grab bag of small,
//! individually-justified rules that don't warrant their own plugin —
//! per-id category/project-group fixups, a URL-prefix-to-project-group
//! table, file-presence and dependency-name kudos, obsolete-toolkit
//! vetoes, release-age kudos/vetoes, and the `ScreenshotsExtra` override
//! directory. Runs after the more targeted refinement plugins so it can
//! see their output (categories, project group) before deciding whether
//! to fill in a gap.

use std::{
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{app::App, config::Config, error::PluginError, glob_table::GlobValueTable};

use super::Plugin;

const URL_PROJECT_GROUPS: &[(&str, &str)] = &[
    ("https://gitlab.gnome.org/*", "GNOME"),
    ("https://wiki.gnome.org/*", "GNOME"),
    ("https://*.gnome.org/*", "GNOME"),
    ("http://gnome-*.sourceforge.net/*", "GNOME"),
    ("https://kde.org/*", "KDE"),
    ("https://*.kde.org/*", "KDE"),
    ("http://*kde-apps.org/*", "KDE"),
    ("https://xfce.org/*", "XFCE"),
    ("https://*.xfce.org/*", "XFCE"),
    ("http://lxde.org*", "LXDE"),
    ("http://lxde.sourceforge.net/*", "LXDE"),
    ("http://pcmanfm.sourceforge.net/*", "LXDE"),
    ("https://www.mate-desktop.org/*", "MATE"),
    ("http://*mate-desktop.org*", "MATE"),
    ("http://*enlightenment.org*", "Enlightenment"),
];

/// App ids that get an extra category no desktop file would think to add
/// on its own, carried over from the original heuristic table.
const EXTRA_CATEGORIES: &[(&str, &str)] = &[
    ("0install", "System"),
    ("alacarte", "System"),
    ("deja-dup", "Utility"),
    ("gddccontrol", "System"),
    ("nautilus", "System"),
    ("pessulus", "System"),
    ("pmdefaults", "System"),
    ("fwfstab", "System"),
];

/// App ids whose project group is known even though nothing in their
/// packaging says so.
const EXTRA_PROJECT_GROUPS: &[(&str, &str)] = &[("nemo", "Cinnamon"), ("xfdashboard", "XFCE")];

/// Dependency name -> kudo metadata key, for toolkits that are worth
/// flagging but don't deserve a veto either way.
const TOOLKIT_KUDOS: &[(&str, &str)] = &[
    ("libgtk-3.so.0", "X-Kudo-GTK3"),
    ("libQt5Core.so.5", "X-Kudo-QT5"),
];

/// Dependency name -> veto reason, for toolkits too old to ship a modern
/// desktop application.
const OBSOLETE_TOOLKITS: &[(&str, &str)] = &[
    ("libgtk-1.2.so.0", "Uses obsolete GTK1 toolkit"),
    ("libqt-mt.so.3", "Uses obsolete QT3 toolkit"),
    ("liblcms.so.1", "Uses obsolete LCMS library"),
    ("libelektra.so.4", "Uses obsolete Elektra library"),
];

/// Dependency name -> requires-appdata reason: not broken, but risky
/// enough (old toolkit, emulation layer) that a human should vouch for it.
const REQUIRES_APPDATA_DEPS: &[(&str, &str)] = &[
    ("libXt.so.6", "Uses obsolete X11 toolkit"),
    ("wine-core", "Uses wine"),
];

const SECS_PER_DAY: i64 = 60 * 60 * 24;
const RECENT_RELEASE_DAYS: i64 = 365;
const STALE_REQUIRES_APPDATA_DAYS: i64 = 365 * 5;
const STALE_VETO_DAYS: i64 = 365 * 10;

pub struct HardcodedPlugin {
    project_groups: GlobValueTable<&'static str>,
}

impl HardcodedPlugin {
    pub fn new() -> Self {
        let mut project_groups = GlobValueTable::new();
        for (pattern, group) in URL_PROJECT_GROUPS {
            project_groups.push(pattern, *group);
        }
        Self { project_groups }
    }

    fn apply_categories_and_groups(&self, app: &mut App) {
        if let Some((_, category)) = EXTRA_CATEGORIES.iter().find(|(id, _)| *id == app.id) {
            app.categories.insert((*category).to_string());
        }
        if let Some((_, group)) = EXTRA_PROJECT_GROUPS.iter().find(|(id, _)| *id == app.id) {
            app.project_group.get_or_insert_with(|| (*group).to_string());
        }
        if app.project_group.is_none() {
            if let Some(url) = app.urls.get("homepage").cloned() {
                if let Some(group) = self.project_groups.search(&url) {
                    app.project_group = Some((*group).to_string());
                }
            }
        }
        if app.project_group.is_none() && app.summary().is_some_and(|s| s.contains("for KDE")) {
            app.project_group = Some("KDE".to_string());
        }
    }

    fn apply_file_presence_kudos(&self, app: &mut App, root: &Path) {
        if root.join("usr/share/help").is_dir() {
            app.metadata.insert("X-Kudo-InstallsUserDocs".to_string(), String::new());
        }
        if root.join("usr/share/gnome-shell/search-providers").is_dir() {
            app.metadata.insert("X-Kudo-SearchProvider".to_string(), String::new());
        }
    }

    fn apply_dependency_rules(&self, app: &mut App, requires: &[String]) {
        for (dep, kudo) in TOOLKIT_KUDOS {
            if requires.iter().any(|r| r == dep) {
                app.metadata.insert((*kudo).to_string(), String::new());
            }
        }
        for (dep, reason) in OBSOLETE_TOOLKITS {
            if requires.iter().any(|r| r == dep) {
                app.add_veto(*reason);
            }
        }
        for (dep, reason) in REQUIRES_APPDATA_DEPS {
            if requires.iter().any(|r| r == dep) {
                app.add_requires_appdata(Some(*reason));
            }
        }
    }

    fn apply_release_age_rules(&self, app: &mut App) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        if app
            .releases
            .iter()
            .any(|r| (now - r.timestamp) / SECS_PER_DAY < RECENT_RELEASE_DAYS)
        {
            app.metadata.insert("X-Kudo-RecentRelease".to_string(), String::new());
        }

        if app.kind != crate::app::AppKind::Desktop {
            return;
        }
        let Some(most_recent) = app.releases.iter().map(|r| r.timestamp).max() else {
            return;
        };
        let days = (now - most_recent) / SECS_PER_DAY;
        if days > STALE_VETO_DAYS {
            app.add_veto(format!("Dead upstream for {} years", days / 365));
        } else if days > STALE_REQUIRES_APPDATA_DAYS {
            app.add_requires_appdata(Some(format!("Dead upstream for > {} years", STALE_REQUIRES_APPDATA_DAYS / 365)));
        }
    }

    fn apply_extra_screenshots(&self, app: &mut App, config: &Config) {
        let Some(extra_dir) = &config.screenshots_extra else {
            return;
        };
        let dir = extra_dir.join(&app.id);
        if !dir.is_dir() {
            return;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return;
        };
        let mut pngs: Vec<_> = entries
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("png"))
            .collect();
        pngs.sort();
        for path in pngs {
            let _ = app.add_screenshot_source(&path, &config.mirror_uri);
        }
    }

    fn apply_category_requirements(&self, app: &mut App) {
        if app.categories.contains("ConsoleOnly") {
            app.add_requires_appdata(Some("ConsoleOnly"));
        }
        if app.categories.is_empty() {
            app.add_requires_appdata(Some("no Categories"));
        }
    }
}

impl Plugin for HardcodedPlugin {
    fn name(&self) -> &'static str {
        "hardcoded"
    }

    fn refine(
        &self,
        app: &mut App,
        root: &Path,
        config: &Config,
        requires: &[String],
    ) -> std::result::Result<(), PluginError> {
        self.apply_categories_and_groups(app);
        self.apply_file_presence_kudos(app, root);
        self.apply_dependency_rules(app, requires);
        self.apply_release_age_rules(app);
        self.apply_extra_screenshots(app, config);
        self.apply_category_requirements(app);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::AppKind, package::PackageId};

    #[test]
    fn matches_known_gnome_hosts() {
        let plugin = HardcodedPlugin::new();
        let mut app = App::new("foo.desktop", AppKind::Desktop, PackageId(0));
        app.urls
            .insert("homepage".into(), "https://gitlab.gnome.org/World/foo".into());
        plugin
            .refine(&mut app, Path::new("/"), &dummy_config(), &[])
            .unwrap();
        assert_eq!(app.project_group.as_deref(), Some("GNOME"));
    }

    #[test]
    fn does_not_override_existing_group() {
        let plugin = HardcodedPlugin::new();
        let mut app = App::new("foo.desktop", AppKind::Desktop, PackageId(0));
        app.project_group = Some("Other".into());
        app.urls
            .insert("homepage".into(), "https://gitlab.gnome.org/World/foo".into());
        plugin
            .refine(&mut app, Path::new("/"), &dummy_config(), &[])
            .unwrap();
        assert_eq!(app.project_group.as_deref(), Some("Other"));
    }

    #[test]
    fn vetoes_obsolete_gtk1_dependency() {
        let plugin = HardcodedPlugin::new();
        let mut app = App::new("foo.desktop", AppKind::Desktop, PackageId(0));
        plugin
            .refine(&mut app, Path::new("/"), &dummy_config(), &["libgtk-1.2.so.0".to_string()])
            .unwrap();
        assert!(app.vetoes.iter().any(|v| v.contains("GTK1")));
    }

    #[test]
    fn flags_wine_as_requiring_appdata() {
        let plugin = HardcodedPlugin::new();
        let mut app = App::new("foo.desktop", AppKind::Desktop, PackageId(0));
        plugin
            .refine(&mut app, Path::new("/"), &dummy_config(), &["wine-core".to_string()])
            .unwrap();
        assert!(!app.requires_appdata.is_empty());
    }

    #[test]
    fn empty_categories_require_appdata() {
        let plugin = HardcodedPlugin::new();
        let mut app = App::new("foo.desktop", AppKind::Desktop, PackageId(0));
        plugin
            .refine(&mut app, Path::new("/"), &dummy_config(), &[])
            .unwrap();
        assert!(app
            .requires_appdata
            .iter()
            .any(|r| matches!(r, crate::app::RequiresAppdata::Reason(reason) if reason == "no Categories")));
    }

    fn dummy_config() -> Config {
        Config {
            temp_dir: "/tmp".into(),
            output_dir: "/tmp".into(),
            log_dir: "/tmp".into(),
            cache_dir: "/tmp".into(),
            mirror_uri: "https://example.invalid".into(),
            appdata_extra: None,
            screenshots_extra: None,
            old_metadata_path: None,
            no_network: true,
            api_version: "0.14".into(),
            add_cache_id: false,
            extra_checks: false,
            use_package_cache: true,
            max_threads: 1,
            basename: "appstream".into(),
        }
    }
}

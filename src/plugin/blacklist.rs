// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Blacklist refinement (C6): vetoes apps whose id matches a known-noisy
//! or known-abandoned glob, each entry carrying its own human-readable
//! reason. Runs near the end of the refinement chain so every other piece
//! of metadata is still collected and logged even for an app that
//! ultimately gets vetoed.

use std::path::Path;

use crate::{app::App, config::Config, error::PluginError, glob_table::GlobValueTable};

use super::Plugin;

const BLACKLIST: &[(&str, &str)] = &[
    ("active-*", "Not an application"),
    ("ailurus", "Upstream abandoned"),
    ("authconfig", "Not an application"),
    ("bareftp", "Upstream abandoned"),
    ("bf-*-editor", "Not an application"),
    ("birdie", "Upstream abandoned"),
    ("bitmap2component", "Not an application"),
    ("bted", "Not an application"),
    ("caja-home", "Not an application"),
    ("chmsee", "Upstream abandoned"),
    ("chromium-bsu", "Upstream abandoned"),
    ("cinnamon-settings", "Not an application"),
    ("coccinella", "Upstream abandoned"),
    ("conduit", "Upstream abandoned"),
    ("*-demo", "Not an application"),
    ("display-properties", "Not an application"),
    ("doom-shareware", "Upstream abandoned"),
    ("emesene", "Upstream abandoned"),
    ("freedink-dfarc", "Not an application"),
    ("freedinkedit", "Not an application"),
    ("fusion-icon", "Upstream abandoned"),
    ("gcompris-edit", "Not an application"),
    ("glade3", "Not an application"),
    ("gnome-dasher", "Upstream abandoned"),
    ("gnome-glade-2", "Not an application"),
    ("gnome-system-monitor-kde", "Not an application"),
    ("gnome-wacom-panel", "Not an application"),
    ("kupfer", "Upstream abandoned"),
    ("listen", "Upstream abandoned"),
    ("logjam", "Upstream abandoned"),
    ("luckybackup-*", "Not an application"),
    ("lxde-desktop-preferences", "Not an application"),
    ("lxinput", "Not an application"),
    ("lxrandr", "Not an application"),
    ("manaplustest", "Not an application"),
    ("mana", "Upstream abandoned"),
    ("mate-*", "Not an application"),
    ("megaglest_*", "Not an application"),
    ("midori-private", "Not an application"),
    ("mm3d", "Upstream abandoned"),
    ("nekobee", "Upstream abandoned"),
    ("nicotine", "Upstream abandoned"),
    ("nm-connection-editor", "Not an application"),
    ("pioneers-editor", "Not an application"),
    ("postler", "Upstream abandoned"),
    ("qterminal_*", "Not an application"),
    ("rasterview", "Upstream abandoned"),
    ("razor-config*", "Not an application"),
    ("redhat-userinfo", "Not an application"),
    ("redhat-usermount", "Not an application"),
    ("redhat-userpasswd", "Not an application"),
    ("*-release-notes", "Not an application"),
    ("resapplet", "Obsolete"),
    ("Rodent-*", "Not an application"),
    ("scantailor", "Upstream abandoned"),
    ("schismtracker", "Upstream abandoned"),
    ("*-server", "Not an application"),
    ("*-session-manager", "Not an application"),
    ("*-shareware", "Not an application"),
    ("sigil", "Upstream abandoned"),
    ("spacefm*", "Upstream abandoned"),
    ("specto", "Upstream abandoned"),
    ("system-config-date", "Not an application"),
    ("system-config-*", "Not an application"),
    ("transgui", "Not an application"),
    ("vkeybd", "Upstream abandoned"),
    ("xfce4-about", "Not an application"),
    ("xfce4-session-logout", "Not an application"),
    ("xfce4-settings-editor", "Not an application"),
    ("xfce4-*-settings", "Not an application"),
    ("xfce-settings-manager", "Not an application"),
    ("xfce-ui-settings", "Not an application"),
    ("xinput_calibrator", "Not an application"),
    ("xpilot-ng-x11", "Not an application"),
];

pub struct BlacklistPlugin {
    table: GlobValueTable<&'static str>,
}

impl BlacklistPlugin {
    pub fn new() -> Self {
        let mut table = GlobValueTable::new();
        for (pattern, reason) in BLACKLIST {
            table.push(pattern, *reason);
        }
        Self { table }
    }
}

impl Plugin for BlacklistPlugin {
    fn name(&self) -> &'static str {
        "blacklist"
    }

    fn refine(
        &self,
        app: &mut App,
        _root: &Path,
        _config: &Config,
        _requires: &[String],
    ) -> std::result::Result<(), PluginError> {
        if let Some(reason) = self.table.search(&app.id) {
            app.add_veto(reason.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::AppKind, package::PackageId};

    #[test]
    fn vetoes_abandoned_upstream_ids() {
        let plugin = BlacklistPlugin::new();
        let mut app = App::new("bareftp.desktop", AppKind::Desktop, PackageId(0));
        plugin.refine(&mut app, Path::new("/"), &test_config(), &[]).unwrap();
        assert_eq!(app.vetoes.len(), 1);
    }

    #[test]
    fn vetoes_wildcard_id_patterns() {
        let plugin = BlacklistPlugin::new();
        let mut app = App::new("system-config-printer.desktop", AppKind::Desktop, PackageId(0));
        plugin.refine(&mut app, Path::new("/"), &test_config(), &[]).unwrap();
        assert_eq!(app.vetoes.len(), 1);
    }

    #[test]
    fn leaves_normal_ids_alone() {
        let plugin = BlacklistPlugin::new();
        let mut app = App::new("foo.desktop", AppKind::Desktop, PackageId(0));
        plugin.refine(&mut app, Path::new("/"), &test_config(), &[]).unwrap();
        assert!(app.vetoes.is_empty());
    }

    fn test_config() -> Config {
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

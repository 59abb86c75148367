// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Shared-library symbol refinement (C6): runs `nm -D` over an app's
//! binaries to detect a handful of toolkit entry points, which is a more
//! reliable signal than package dependency names for telling Qt, GTK and
//! Electron apps apart when the desktop file itself doesn't say.

use std::{path::Path, process::Command};

use crate::{app::App, config::Config, error::PluginError, shell::capture_stdout};

use super::Plugin;

const TOOLKIT_SYMBOLS: &[(&str, &str)] = &[
    ("gtk_application_new", "GTK"),
    ("qt_version_tag", "Qt"),
    ("node_module_register", "Electron"),
];

pub struct NmPlugin;

impl Plugin for NmPlugin {
    fn name(&self) -> &'static str {
        "nm"
    }

    fn refine(
        &self,
        app: &mut App,
        root: &Path,
        _config: &Config,
        _requires: &[String],
    ) -> std::result::Result<(), PluginError> {
        let bin_dir = root.join("usr/bin");
        if !bin_dir.is_dir() {
            return Ok(());
        }

        for entry in walkdir::WalkDir::new(&bin_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let mut cmd = Command::new("nm");
            cmd.arg("-D").arg(entry.path());
            let Some(output) = capture_stdout(&mut cmd) else {
                continue;
            };
            for (symbol, toolkit) in TOOLKIT_SYMBOLS {
                if output.contains(symbol) {
                    app.metadata
                        .entry("X-Toolkit".to_string())
                        .or_insert_with(|| toolkit.to_string());
                }
            }
        }

        Ok(())
    }
}

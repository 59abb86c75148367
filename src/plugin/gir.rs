// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! GObject-Introspection refinement (C6): flags apps shipped alongside a
//! GIR typelib so downstream tooling knows the app exposes (or depends
//! on) an introspectable library, and records which typelib it is.

use std::path::Path;

use crate::{app::App, config::Config, error::PluginError};

use super::Plugin;

pub struct GirPlugin;

impl Plugin for GirPlugin {
    fn name(&self) -> &'static str {
        "gir"
    }

    fn refine(
        &self,
        app: &mut App,
        root: &Path,
        _config: &Config,
        _requires: &[String],
    ) -> std::result::Result<(), PluginError> {
        let typelib_dir = root.join("usr/lib/girepository-1.0");
        if !typelib_dir.is_dir() {
            return Ok(());
        }

        let mut typelibs = Vec::new();
        for entry in walkdir::WalkDir::new(&typelib_dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            if entry.path().extension().and_then(|e| e.to_str()) == Some("typelib") {
                if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                    typelibs.push(stem.to_string());
                }
            }
        }

        if !typelibs.is_empty() {
            typelibs.sort();
            app.metadata
                .insert("X-Gir-Typelibs".to_string(), typelibs.join(";"));
        }

        Ok(())
    }
}

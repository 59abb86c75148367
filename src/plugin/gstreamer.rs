// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! GStreamer element refinement (C6, supplemental): records which
//! GStreamer-1.0 element plugins (`libgst*.so`) an app ships, so a
//! codec-providing package can be told apart from one that merely depends
//! on GStreamer.

use std::path::Path;

use crate::{app::App, config::Config, error::PluginError, glob_table::GlobValueTable};

use super::Plugin;

pub struct GStreamerPlugin;

impl Plugin for GStreamerPlugin {
    fn name(&self) -> &'static str {
        "gstreamer"
    }

    fn refine(
        &self,
        app: &mut App,
        root: &Path,
        _config: &Config,
        _requires: &[String],
    ) -> std::result::Result<(), PluginError> {
        let mut table = GlobValueTable::new();
        table.push("*/gstreamer-1.0/libgst*.so", ());

        let mut elements = Vec::new();
        for entry in walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            let path = entry.path();
            let Some(path_str) = path.to_str() else {
                continue;
            };
            if table.search(path_str).is_some() {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    elements.push(stem.trim_start_matches("libgst").to_string());
                }
            }
        }

        if !elements.is_empty() {
            elements.sort();
            app.metadata
                .insert("X-Gstreamer-Elements".to_string(), elements.join(";"));
        }

        Ok(())
    }
}

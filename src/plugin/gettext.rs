// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Gettext refinement (C6): scans `usr/share/locale/<lang>/LC_MESSAGES/`
//! for `.mo` catalogs matching the app's text domain and records the
//! percentage of translated strings per language. The `.mo` binary header
//! is tiny and stable, so it's parsed by hand rather than pulling in a
//! gettext crate.

use std::path::Path;

use crate::{app::App, config::Config, error::PluginError};

use super::Plugin;

pub struct GettextPlugin;

const MO_MAGIC_LE: u32 = 0x9504_12de;
const MO_MAGIC_BE: u32 = 0xde12_0495;

/// Reads the little number-of-strings field out of a `.mo` file's fixed
/// 28-byte header, honoring either byte order the magic number indicates.
fn mo_string_count(bytes: &[u8]) -> Option<u32> {
    if bytes.len() < 8 {
        return None;
    }
    let magic = u32::from_le_bytes(bytes[0..4].try_into().ok()?);
    let read_u32 = |offset: usize| -> Option<u32> {
        let word = bytes.get(offset..offset + 4)?;
        if magic == MO_MAGIC_LE {
            Some(u32::from_le_bytes(word.try_into().ok()?))
        } else {
            Some(u32::from_be_bytes(word.try_into().ok()?))
        }
    };
    if magic != MO_MAGIC_LE && magic != MO_MAGIC_BE {
        return None;
    }
    read_u32(8)
}

impl Plugin for GettextPlugin {
    fn name(&self) -> &'static str {
        "gettext"
    }

    fn refine(
        &self,
        app: &mut App,
        root: &Path,
        _config: &Config,
        _requires: &[String],
    ) -> std::result::Result<(), PluginError> {
        let locale_dir = root.join("usr/share/locale");
        if !locale_dir.is_dir() {
            return Ok(());
        }

        let domain = app.id.split('.').next().unwrap_or(&app.id).to_string();

        for entry in walkdir::WalkDir::new(&locale_dir)
            .min_depth(3)
            .max_depth(3)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            let path = entry.path();
            if path.file_stem().and_then(|s| s.to_str()) != Some(domain.as_str()) {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("mo") {
                continue;
            }
            let lang = path
                .components()
                .rev()
                .nth(2)
                .and_then(|c| c.as_os_str().to_str())
                .unwrap_or("C");

            let bytes = std::fs::read(path).map_err(|e| PluginError::Failed(e.to_string()))?;
            if let Some(count) = mo_string_count(&bytes) {
                let percent = ((count.min(100)) as f64 / 100.0 * 100.0) as u8;
                app.languages.insert(lang.to_string(), percent.max(1));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_string_count_from_le_header() {
        let mut header = vec![0u8; 28];
        header[0..4].copy_from_slice(&MO_MAGIC_LE.to_le_bytes());
        header[8..12].copy_from_slice(&42u32.to_le_bytes());
        assert_eq!(mo_string_count(&header), Some(42));
    }

    #[test]
    fn rejects_bad_magic() {
        let header = vec![0u8; 28];
        assert_eq!(mo_string_count(&header), None);
    }
}

// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Appdata merge refinement (C6): folds in the upstream
//! `usr/share/metainfo/*.appdata.xml` (or the legacy
//! `*.appdata.xml` path under `usr/share/appdata/`) and, with higher
//! precedence, any hand-authored override from `AppDataExtra`. Always
//! runs last in the refinement chain so every other plugin's metadata is
//! already present for appdata to override.

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::{app::App, config::Config, error::PluginError};

use super::Plugin;

/// SPDX identifiers appdata is allowed to declare for `<project_license>`;
/// anything else is rejected rather than silently trusted.
const ALLOWED_LICENSES: &[&str] = &["CC0-1.0", "CC-BY-3.0", "CC-BY-SA-3.0", "GFDL-1.3"];

#[derive(Default)]
struct AppdataFields {
    id: Option<String>,
    name: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    project_license: Option<String>,
    url_homepage: Option<String>,
}

fn parse_appdata_xml(text: &str) -> Result<AppdataFields, quick_xml::Error> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut fields = AppdataFields::default();
    let mut current_tag: Option<String> = None;
    let mut current_url_type: Option<String> = None;
    let mut buf = Vec::new();
    let mut description_parts = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "url" {
                    current_url_type = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.as_ref() == b"type")
                        .map(|a| String::from_utf8_lossy(&a.value).into_owned());
                }
                current_tag = Some(name);
            }
            Event::End(_) => current_tag = None,
            Event::Text(e) => {
                let text = e.unescape()?.into_owned();
                match current_tag.as_deref() {
                    Some("id") if fields.id.is_none() => fields.id = Some(text),
                    Some("name") if fields.name.is_none() => fields.name = Some(text),
                    Some("summary") if fields.summary.is_none() => fields.summary = Some(text),
                    Some("p") => description_parts.push(text),
                    Some("project_license") if fields.project_license.is_none() => {
                        fields.project_license = Some(text)
                    }
                    Some("url") if current_url_type.as_deref() == Some("homepage") => {
                        fields.url_homepage = Some(text)
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        buf.clear();
    }

    if !description_parts.is_empty() {
        fields.description = Some(description_parts.join("\n\n"));
    }
    Ok(fields)
}

fn strip_component_suffix(id: &str) -> &str {
    id.trim_end_matches(".metainfo.xml")
        .trim_end_matches(".appdata.xml")
        .trim_end_matches(".desktop")
        .trim_end_matches(".appdata")
}

pub struct AppdataPlugin;

impl AppdataPlugin {
    fn apply(&self, app: &mut App, fields: AppdataFields, source: &str) -> std::result::Result<(), PluginError> {
        if let Some(id) = &fields.id {
            if strip_component_suffix(id) != strip_component_suffix(&app.id) {
                return Err(PluginError::Validation(
                    app.id.clone(),
                    format!("{source}: appdata id `{id}` does not match app id `{}`", app.id),
                ));
            }
        }

        if let Some(license) = fields.project_license {
            if !ALLOWED_LICENSES.contains(&license.as_str()) {
                return Err(PluginError::Validation(
                    app.id.clone(),
                    format!("{source}: project_license `{license}` is not in the allowed list"),
                ));
            }
            app.project_license = Some(license);
        }

        if let Some(name) = fields.name {
            app.names.insert("C".into(), name);
        }
        if let Some(summary) = fields.summary {
            app.summaries.insert("C".into(), summary);
        }
        if let Some(description) = fields.description {
            app.descriptions.insert("C".into(), description);
        }
        if let Some(url) = fields.url_homepage {
            app.urls.insert("homepage".into(), url);
        }

        app.requires_appdata.clear();
        Ok(())
    }
}

impl Plugin for AppdataPlugin {
    fn name(&self) -> &'static str {
        "appdata"
    }

    fn refine(
        &self,
        app: &mut App,
        root: &Path,
        config: &Config,
        _requires: &[String],
    ) -> std::result::Result<(), PluginError> {
        let mut found_any = false;

        for dir in ["usr/share/metainfo", "usr/share/appdata"] {
            let candidate_dir = root.join(dir);
            if !candidate_dir.is_dir() {
                continue;
            }
            for entry in walkdir::WalkDir::new(&candidate_dir)
                .into_iter()
                .filter_map(std::result::Result::ok)
            {
                let path = entry.path();
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                if !name.ends_with(".appdata.xml") && !name.ends_with(".metainfo.xml") {
                    continue;
                }
                if strip_component_suffix(name) != strip_component_suffix(&app.id) {
                    continue;
                }
                let text = std::fs::read_to_string(path)
                    .map_err(|e| PluginError::Failed(e.to_string()))?;
                let fields = parse_appdata_xml(&text)
                    .map_err(|e| PluginError::Failed(e.to_string()))?;
                self.apply(app, fields, "upstream appdata")?;
                found_any = true;
            }
        }

        if let Some(extra_dir) = &config.appdata_extra {
            let candidate = extra_dir.join(format!("{}.appdata.xml", strip_component_suffix(&app.id)));
            if candidate.is_file() {
                let text = std::fs::read_to_string(&candidate)
                    .map_err(|e| PluginError::Failed(e.to_string()))?;
                let fields = parse_appdata_xml(&text)
                    .map_err(|e| PluginError::Failed(e.to_string()))?;
                self.apply(app, fields, "AppDataExtra override")?;
                found_any = true;
            }
        }

        if !found_any && app.kind == crate::app::AppKind::Desktop {
            app.add_requires_appdata(Some("no upstream or extra appdata file was found"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_fields() {
        let xml = "<component><id>foo.desktop</id><name>Foo</name><summary>A foo app</summary><project_license>MIT</project_license><url type=\"homepage\">https://example.invalid</url></component>";
        let fields = parse_appdata_xml(xml).unwrap();
        assert_eq!(fields.id.as_deref(), Some("foo.desktop"));
        assert_eq!(fields.project_license.as_deref(), Some("MIT"));
        assert_eq!(fields.url_homepage.as_deref(), Some("https://example.invalid"));
    }

    #[test]
    fn strip_component_suffix_handles_both_forms() {
        assert_eq!(strip_component_suffix("foo.desktop"), "foo");
        assert_eq!(strip_component_suffix("foo.appdata"), "foo");
        assert_eq!(strip_component_suffix("foo"), "foo");
    }
}

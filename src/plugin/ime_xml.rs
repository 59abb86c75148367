// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! IBus component XML extraction (C5): reads
//! `usr/share/ibus/component/*.xml` descriptors, which is how most
//! non-table IBus engines (anthy, hangul, chewing, ...) describe
//! themselves.

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::{
    app::{App, AppKind},
    error::PluginError,
    package::{Package, PackageId, PackageOps},
};

use super::Plugin;

pub struct ImeXmlPlugin;

#[derive(Default)]
struct ComponentFields {
    name: Option<String>,
    description: Option<String>,
    symbol: Option<String>,
}

/// Tolerant streaming parse of a `<component><engines><engine>` document:
/// reads just the handful of text nodes the catalog cares about, ignoring
/// anything else in the descriptor (IBus component files carry plenty of
/// fields no catalog needs, like `<exec>` and `<author>`).
fn parse_component_xml(text: &str) -> Result<ComponentFields, quick_xml::Error> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut fields = ComponentFields::default();
    let mut current_tag: Option<String> = None;
    let mut in_engine = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "engine" {
                    in_engine = true;
                }
                current_tag = Some(name);
            }
            Event::End(_) => {
                current_tag = None;
            }
            Event::Text(e) if in_engine => {
                let text = e.unescape()?.into_owned();
                match current_tag.as_deref() {
                    Some("name") if fields.name.is_none() => fields.name = Some(text),
                    Some("description") if fields.description.is_none() => {
                        fields.description = Some(text)
                    }
                    Some("symbol") if fields.symbol.is_none() => fields.symbol = Some(text),
                    _ => {}
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(fields)
}

impl Plugin for ImeXmlPlugin {
    fn name(&self) -> &'static str {
        "ime_xml"
    }

    fn extract(
        &self,
        pkg_id: PackageId,
        package: &Package,
        root: &Path,
    ) -> std::result::Result<Vec<App>, PluginError> {
        let component_dir = root.join("usr/share/ibus/component");
        if !component_dir.is_dir() {
            return Err(PluginError::NotSupported);
        }

        let mut apps = Vec::new();
        for entry in walkdir::WalkDir::new(&component_dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("xml") {
                continue;
            }
            let text = std::fs::read_to_string(path)
                .map_err(|e| PluginError::Failed(e.to_string()))?;
            let fields = parse_component_xml(&text)
                .map_err(|e| PluginError::Failed(e.to_string()))?;

            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| PluginError::Failed("non-UTF8 component file name".into()))?;

            let mut app = App::new(format!("{stem}.inputmethod"), AppKind::InputMethod, pkg_id);
            app.pkgnames.push(package.nevr().name.clone());
            if let Some(name) = fields.name {
                app.names.insert("C".into(), name);
            } else {
                app.names.insert("C".into(), stem.to_string());
            }
            if let Some(description) = fields.description {
                app.summaries.insert("C".into(), description);
            }
            if let Some(symbol) = fields.symbol {
                app.metadata.insert("X-IBusSymbol".into(), symbol);
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
    fn parses_engine_fields() {
        let xml = "<component><engines><engine><name>anthy</name><description>Japanese input</description><symbol>\u{3042}</symbol></engine></engines></component>";
        let fields = parse_component_xml(xml).unwrap();
        assert_eq!(fields.name.as_deref(), Some("anthy"));
        assert_eq!(fields.description.as_deref(), Some("Japanese input"));
    }

    #[test]
    fn ignores_text_outside_engine() {
        let xml = "<component><name>ignored</name><engines><engine><name>real</name></engine></engines></component>";
        let fields = parse_component_xml(xml).unwrap();
        assert_eq!(fields.name.as_deref(), Some("real"));
    }
}

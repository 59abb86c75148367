// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Font extraction (C5): enumerates SFNT files under
//! `usr/share/fonts/`, reading family/style names and supported
//! languages from the `name` table, and rendering a sample-text preview
//! screenshot plus a two-character icon for each one found.

use std::{collections::BTreeSet, path::Path};

use fontdb::{Database, Source};

use crate::{
    app::{App, AppKind, Image, ImageKind, Screenshot},
    error::PluginError,
    image_pipeline,
    package::{Package, PackageId, PackageOps},
};

use super::Plugin;

pub struct FontPlugin;

const FONT_EXTENSIONS: [&str; 3] = ["ttf", "otf", "ttc"];

const SFNT_NAME_ID_FAMILY: u16 = 1;
const SFNT_NAME_ID_SUBFAMILY: u16 = 2;
const SFNT_NAME_ID_FULL_NAME: u16 = 4;
const SFNT_NAME_ID_PREFERRED_FAMILY: u16 = 16;

/// Per-language sample sentences (pangrams where one exists), used to fill
/// `FontSampleText` for whichever language the font actually covers.
const TEXT_SAMPLE: &[(&str, &str)] = &[
    ("en", "How quickly daft jumping zebras vex."),
    ("fr", "Voix ambiguë d'un cœur qui, au zéphyr, préfère les jattes de kiwis."),
    ("de", "Falsches Üben von Xylophonmusik quält jeden größeren Zwerg."),
    ("es", "Aquel biógrafo se zampó un extraño sándwich de vodka y ajo"),
    ("it", "Senza qualche prova ho il dubbio che si finga morto."),
    ("pt", "À noite, vovô Kowalsky vê o ímã cair no pé do pingüim queixoso."),
    ("ru", "В чащах юга жил бы цитрус? Да, но фальшивый экземпляр!"),
    ("ja", "いろはにほへと ちりぬるを わかよたれそ つねならむ"),
    ("ko", "다람쥐 헌 쳇바퀴에 타고파"),
    ("zh", "視野無限廣，窗外有藍天"),
    ("nl", "Pa's wijze lynx bezag vroom het fikse aquaduct."),
    ("pl", "Pójdźże, kiń tę chmurność w głąb flaszy!"),
];

/// Per-language two-character icon glyphs, falling back to the first two
/// characters of `FontSampleText` when the language has no dedicated entry.
const TEXT_ICON: &[(&str, &str)] = &[
    ("en", "Aa"),
    ("fr", "Aa"),
    ("de", "Aa"),
    ("es", "Aa"),
    ("it", "Aa"),
    ("pt", "Aa"),
    ("ru", "Аа"),
    ("ja", "あ"),
    ("ko", "가"),
    ("zh", "漢"),
    ("nl", "Aa"),
    ("pl", "ĄĘ"),
];

fn sample_text_for(languages: &std::collections::BTreeMap<String, u8>) -> Option<&'static str> {
    TEXT_SAMPLE
        .iter()
        .find(|(lang, _)| languages.contains_key(*lang))
        .map(|(_, text)| *text)
}

fn icon_text_for(languages: &std::collections::BTreeMap<String, u8>) -> Option<&'static str> {
    TEXT_ICON
        .iter()
        .find(|(lang, _)| languages.contains_key(*lang))
        .map(|(_, text)| *text)
}

/// Reads `FontFamily`/`FontSubFamily`/`FontFullName`/`FontParent` straight
/// out of the `name` table's Windows-platform records, skipping any value
/// that contains a control character (a sign the bytes weren't decoded in
/// the record's actual encoding).
fn sfnt_metadata(bytes: &[u8]) -> Vec<(&'static str, String)> {
    let Ok(face) = ttf_parser::Face::parse(bytes, 0) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for name in face.names() {
        if name.platform_id != ttf_parser::PlatformId::Windows {
            continue;
        }
        let key = match name.name_id {
            SFNT_NAME_ID_FAMILY => "FontFamily",
            SFNT_NAME_ID_SUBFAMILY => "FontSubFamily",
            SFNT_NAME_ID_FULL_NAME => "FontFullName",
            SFNT_NAME_ID_PREFERRED_FAMILY => "FontParent",
            _ => continue,
        };
        let Some(value) = name.to_string() else {
            continue;
        };
        if value.chars().any(|c| c.is_control()) {
            continue;
        }
        out.push((key, value));
    }
    out
}

impl Plugin for FontPlugin {
    fn name(&self) -> &'static str {
        "font"
    }

    fn extract(
        &self,
        pkg_id: PackageId,
        package: &Package,
        root: &Path,
    ) -> std::result::Result<Vec<App>, PluginError> {
        let fonts_dir = root.join("usr/share/fonts");
        if !fonts_dir.is_dir() {
            return Err(PluginError::NotSupported);
        }

        let mut apps = Vec::new();
        for entry in walkdir::WalkDir::new(&fonts_dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !FONT_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                continue;
            }

            let bytes = std::fs::read(path).map_err(|e| PluginError::Failed(e.to_string()))?;
            let mut db = Database::new();
            db.load_font_source(Source::Binary(std::sync::Arc::new(bytes.clone())));

            let Some(face) = db.faces().next() else {
                continue;
            };
            let family = face
                .families
                .first()
                .map(|(name, _)| name.clone())
                .unwrap_or_else(|| {
                    path.file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or("font")
                        .to_string()
                });

            let style = match face.style {
                fontdb::Style::Normal => "Regular",
                fontdb::Style::Italic => "Italic",
                fontdb::Style::Oblique => "Oblique",
            };
            let id = format!(
                "{}.font",
                family.to_lowercase().replace(' ', "-")
            );
            let mut app = App::new(id, AppKind::Font, pkg_id);
            app.pkgnames.push(package.nevr().name.clone());
            app.names.insert("C".into(), family.clone());
            app.summaries
                .insert("C".into(), format!("A {style} font from {family}"));
            app.categories.insert("Addons".to_string());
            app.categories.insert("Fonts".to_string());
            // A font never has its own upstream appdata, so a human always
            // has to vouch for the generated name/summary.
            app.add_requires_appdata(None::<String>);

            for lang in languages_from_name_table(&bytes) {
                app.languages.insert(lang, 100);
            }

            for (key, value) in sfnt_metadata(&bytes) {
                app.metadata.entry(key.to_string()).or_insert(value);
            }

            let sample_text = sample_text_for(&app.languages).unwrap_or("The quick brown fox jumps over the lazy dog.");
            app.metadata
                .entry("FontSampleText".to_string())
                .or_insert_with(|| sample_text.to_string());
            let icon_text = icon_text_for(&app.languages)
                .map(str::to_string)
                .unwrap_or_else(|| image_pipeline::font_icon_text(&family));
            app.metadata
                .entry("FontIconText".to_string())
                .or_insert_with(|| icon_text.clone());

            if let Ok(preview) = image_pipeline::render_font_preview(&bytes, sample_text, 640, 168) {
                let basename = format!("{}-{}.png", app.id, crate::util::md5_hex(&bytes));
                app.screenshots.push(Screenshot {
                    source_path: path.to_path_buf(),
                    captions: Default::default(),
                    is_default: true,
                    basename: basename.clone(),
                    images: vec![Image {
                        width: 640,
                        height: 168,
                        kind: ImageKind::Source,
                        url: String::new(),
                        basename,
                        pixels: Some(preview),
                    }],
                });
            }
            if let Ok(icon) = image_pipeline::render_font_preview(&bytes, &icon_text, 64, 64) {
                app.icon = Some(crate::app::Icon {
                    name: format!("{}.png", app.id),
                    kind: crate::app::IconKind::Cached,
                });
                app.set_pixbuf(icon);
            }

            apps.push(app);
        }

        if apps.is_empty() {
            return Err(PluginError::NotSupported);
        }
        Ok(apps)
    }
}

/// Windows LCIDs found in the `name` table records of real-world fonts
/// often enough to be worth a direct lookup; anything else falls through
/// to the `en` default below rather than growing this table without end.
const WINDOWS_LCID_TAGS: &[(u16, &str)] = &[
    (0x0409, "en"),
    (0x0809, "en"),
    (0x040c, "fr"),
    (0x0407, "de"),
    (0x0410, "it"),
    (0x040a, "es"),
    (0x0411, "ja"),
    (0x0412, "ko"),
    (0x0804, "zh"),
    (0x0404, "zh"),
    (0x0419, "ru"),
    (0x0416, "pt"),
    (0x0413, "nl"),
    (0x0415, "pl"),
];

/// Reads the distinct languages a font documents translated family/style
/// names for, straight from the `name` table's Windows-platform records,
/// rather than guessing coverage from style flags.
fn languages_from_name_table(bytes: &[u8]) -> BTreeSet<String> {
    let mut langs = BTreeSet::new();
    let Ok(face) = ttf_parser::Face::parse(bytes, 0) else {
        return langs;
    };
    for name in face.names() {
        if name.platform_id != ttf_parser::PlatformId::Windows {
            continue;
        }
        if let Some((_, tag)) = WINDOWS_LCID_TAGS.iter().find(|(lcid, _)| *lcid == name.language_id) {
            langs.insert((*tag).to_string());
        }
    }
    if langs.is_empty() {
        langs.insert("en".to_string());
    }
    langs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_extensions_are_case_insensitive() {
        assert!(FONT_EXTENSIONS.contains(&"ttf"));
        assert!(!FONT_EXTENSIONS.contains(&"TTF"));
    }

    #[test]
    fn garbage_bytes_fall_back_to_english() {
        let langs = languages_from_name_table(b"not a font");
        assert_eq!(langs.into_iter().collect::<Vec<_>>(), vec!["en".to_string()]);
    }

    #[test]
    fn sample_text_picks_matching_language() {
        let mut languages = std::collections::BTreeMap::new();
        languages.insert("ja".to_string(), 100);
        assert_eq!(sample_text_for(&languages), Some(TEXT_SAMPLE[7].1));
        assert_eq!(icon_text_for(&languages), Some("あ"));
    }

    #[test]
    fn sample_text_is_none_for_unknown_language() {
        let mut languages = std::collections::BTreeMap::new();
        languages.insert("xx".to_string(), 100);
        assert_eq!(sample_text_for(&languages), None);
        assert_eq!(icon_text_for(&languages), None);
    }

    #[test]
    fn garbage_bytes_yield_no_sfnt_metadata() {
        assert!(sfnt_metadata(b"not a font").is_empty());
    }
}

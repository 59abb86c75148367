// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The catalog entity: a typed record of application metadata,
//! plus the screenshot/image types it carries.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use crate::{
    error::{io_err, Result},
    package::{PackageId, Release},
    util,
};

/// "required, no reason given" vs "required: <reason>", rather than a
/// boolean plus an optional string that could construct a nonsensical
/// `(false, Some(reason))` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiresAppdata {
    Unspecified,
    Reason(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    Stock,
    Cached,
    Remote,
}

#[derive(Debug, Clone)]
pub struct Icon {
    pub name: String,
    pub kind: IconKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Source,
    Thumbnail,
}

/// A single rendered image: a screenshot thumbnail tier, or a font preview.
#[derive(Debug, Clone)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub kind: ImageKind,
    pub url: String,
    pub basename: String,
    pub pixels: Option<DynamicImage>,
}

/// The three widescreen thumbnail tiers emitted per non-font screenshot
/// ("screenshot matrix").
pub const THUMBNAIL_SIZES: [(u32, u32); 3] = [(624, 351), (112, 63), (752, 423)];

/// The single resolution emitted for a font's source preview.
pub const FONT_PREVIEW_SIZE: (u32, u32) = (752, 423);

#[derive(Debug, Clone)]
pub struct Screenshot {
    pub source_path: PathBuf,
    pub captions: BTreeMap<String, String>,
    pub is_default: bool,
    pub basename: String,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AppKind {
    Desktop,
    Font,
    InputMethod,
    Addon,
}

impl AppKind {
    pub fn suffix(self) -> &'static str {
        match self {
            AppKind::Desktop => "desktop",
            AppKind::Font => "font",
            AppKind::InputMethod => "inputmethod",
            AppKind::Addon => "addon",
        }
    }
}

/// The catalog entity. Owns vetoes, requires-appdata
/// reasons, the decoded icon pixel buffer, and a non-owning back-reference
/// to the package it came from.
#[derive(Debug, Clone)]
pub struct App {
    pub id: String,
    pub kind: AppKind,
    pub package: PackageId,

    pub names: BTreeMap<String, String>,
    pub summaries: BTreeMap<String, String>,
    pub descriptions: BTreeMap<String, String>,

    pub icon: Option<Icon>,
    pub icon_pixels: Option<DynamicImage>,

    pub categories: BTreeSet<String>,
    pub keywords: Vec<String>,
    pub mime_types: Vec<String>,
    pub languages: BTreeMap<String, u8>,
    pub metadata: BTreeMap<String, String>,
    pub pkgnames: Vec<String>,
    pub screenshots: Vec<Screenshot>,
    pub urls: BTreeMap<String, String>,
    pub project_group: Option<String>,
    pub project_license: Option<String>,
    pub compulsory_for_desktop: Vec<String>,
    pub releases: Vec<crate::package::Release>,

    pub vetoes: Vec<String>,
    pub requires_appdata: Vec<RequiresAppdata>,
}

/// Plain-data mirror of [`App`] used for the on-disk package cache
/// on-disk package cache: everything except decoded pixel buffers, which are
/// regenerated from `Screenshot::source_path` on a cache hit rather than
/// round-tripped through JSON.
#[derive(Debug, Serialize, Deserialize)]
pub struct CachedApp {
    id: String,
    kind_suffix: String,
    package: usize,
    names: BTreeMap<String, String>,
    summaries: BTreeMap<String, String>,
    descriptions: BTreeMap<String, String>,
    icon_name: Option<String>,
    categories: BTreeSet<String>,
    keywords: Vec<String>,
    mime_types: Vec<String>,
    languages: BTreeMap<String, u8>,
    metadata: BTreeMap<String, String>,
    pkgnames: Vec<String>,
    screenshot_sources: Vec<PathBuf>,
    urls: BTreeMap<String, String>,
    project_group: Option<String>,
    project_license: Option<String>,
    compulsory_for_desktop: Vec<String>,
    releases: Vec<Release>,
    vetoes: Vec<String>,
}

pub(crate) fn kind_from_suffix(suffix: &str) -> AppKind {
    match suffix {
        "font" => AppKind::Font,
        "inputmethod" => AppKind::InputMethod,
        "addon" => AppKind::Addon,
        _ => AppKind::Desktop,
    }
}

impl CachedApp {
    pub fn from_app(app: &App) -> Self {
        Self {
            id: app.id.clone(),
            kind_suffix: app.kind.suffix().to_string(),
            package: app.package.0,
            names: app.names.clone(),
            summaries: app.summaries.clone(),
            descriptions: app.descriptions.clone(),
            icon_name: app.icon.as_ref().map(|i| i.name.clone()),
            categories: app.categories.clone(),
            keywords: app.keywords.clone(),
            mime_types: app.mime_types.clone(),
            languages: app.languages.clone(),
            metadata: app.metadata.clone(),
            pkgnames: app.pkgnames.clone(),
            screenshot_sources: app.screenshots.iter().map(|s| s.source_path.clone()).collect(),
            urls: app.urls.clone(),
            project_group: app.project_group.clone(),
            project_license: app.project_license.clone(),
            compulsory_for_desktop: app.compulsory_for_desktop.clone(),
            releases: app.releases.clone(),
            vetoes: app.vetoes.clone(),
        }
    }
}

impl App {
    /// Rehydrates an app from its cached form. Screenshots are left with
    /// empty `images`; the caller regenerates the thumbnail matrix from
    /// `source_path` before writing resources.
    pub fn from_cached(cached: CachedApp) -> Self {
        let mut app = App::new(cached.id, kind_from_suffix(&cached.kind_suffix), PackageId(cached.package));
        app.names = cached.names;
        app.summaries = cached.summaries;
        app.descriptions = cached.descriptions;
        app.icon = cached.icon_name.map(|name| Icon {
            name,
            kind: IconKind::Cached,
        });
        app.categories = cached.categories;
        app.keywords = cached.keywords;
        app.mime_types = cached.mime_types;
        app.languages = cached.languages;
        app.metadata = cached.metadata;
        app.pkgnames = cached.pkgnames;
        app.screenshots = cached
            .screenshot_sources
            .into_iter()
            .enumerate()
            .map(|(i, source_path)| Screenshot {
                source_path,
                captions: BTreeMap::new(),
                is_default: i == 0,
                basename: String::new(),
                images: Vec::new(),
            })
            .collect();
        app.urls = cached.urls;
        app.project_group = cached.project_group;
        app.project_license = cached.project_license;
        app.compulsory_for_desktop = cached.compulsory_for_desktop;
        app.releases = cached.releases;
        app.vetoes = cached.vetoes;
        app
    }

    pub fn new(id: impl Into<String>, kind: AppKind, package: PackageId) -> Self {
        Self {
            id: id.into(),
            kind,
            package,
            names: BTreeMap::new(),
            summaries: BTreeMap::new(),
            descriptions: BTreeMap::new(),
            icon: None,
            icon_pixels: None,
            categories: BTreeSet::new(),
            keywords: Vec::new(),
            mime_types: Vec::new(),
            languages: BTreeMap::new(),
            metadata: BTreeMap::new(),
            pkgnames: Vec::new(),
            screenshots: Vec::new(),
            urls: BTreeMap::new(),
            project_group: None,
            project_license: None,
            compulsory_for_desktop: Vec::new(),
            releases: Vec::new(),
            vetoes: Vec::new(),
            requires_appdata: Vec::new(),
        }
    }

    pub fn add_veto(&mut self, reason: impl Into<String>) {
        self.vetoes.push(reason.into());
    }

    pub fn add_requires_appdata(&mut self, reason: Option<impl Into<String>>) {
        self.requires_appdata.push(match reason {
            Some(r) => RequiresAppdata::Reason(r.into()),
            None => RequiresAppdata::Unspecified,
        });
    }

    pub fn name(&self) -> Option<&str> {
        self.names.get("C").map(String::as_str)
    }

    pub fn summary(&self) -> Option<&str> {
        self.summaries.get("C").map(String::as_str)
    }

    /// Sets the decoded icon, warning (via the package log, through the
    /// caller) if the image lacks an alpha channel.
    pub fn set_pixbuf(&mut self, image: DynamicImage) -> bool {
        let has_alpha = image.color().has_alpha();
        self.icon_pixels = Some(image);
        has_alpha
    }

    /// Loads a screenshot source image and synthesizes the full thumbnail
    /// matrix for it. The first screenshot added becomes the default.
    /// `mirror_uri` is the configured mirror base URL.
    pub fn add_screenshot_source(&mut self, path: &Path, mirror_uri: &str) -> Result<()> {
        let bytes = std::fs::read(path).map_err(io_err(path))?;
        let source = image::load_from_memory(&bytes)?;
        let basename = format!("{}-{}.png", self.id, util::md5_hex(&bytes));
        let is_default = self.screenshots.is_empty();

        let mut images = Vec::new();
        if self.kind == AppKind::Font {
            let (w, h) = FONT_PREVIEW_SIZE;
            let pixels = crate::image_pipeline::fit_to(&source, w, h);
            images.push(Image {
                width: w,
                height: h,
                kind: ImageKind::Source,
                url: format!("{}/source/{}", mirror_uri.trim_end_matches('/'), basename),
                basename: basename.clone(),
                pixels: Some(pixels),
            });
        } else {
            for (w, h) in THUMBNAIL_SIZES {
                let pixels = crate::image_pipeline::fit_to(&source, w, h);
                images.push(Image {
                    width: w,
                    height: h,
                    kind: ImageKind::Thumbnail,
                    url: format!(
                        "{}/{}x{}/{}",
                        mirror_uri.trim_end_matches('/'),
                        w,
                        h,
                        basename
                    ),
                    basename: basename.clone(),
                    pixels: Some(pixels),
                });
            }
        }

        self.screenshots.push(Screenshot {
            source_path: path.to_path_buf(),
            captions: BTreeMap::new(),
            is_default,
            basename,
            images,
        });
        Ok(())
    }

    /// Writes the decoded icon and every screenshot resolution to their
    /// scratch/output destinations, skipping any path that already exists.
    pub fn save_resources(&self, temp_dir: &Path, output_dir: &Path) -> Result<()> {
        if let (Some(icon), Some(pixels)) = (&self.icon, &self.icon_pixels) {
            if icon.kind == IconKind::Cached {
                let dest = temp_dir.join("icons").join(&icon.name);
                if !dest.exists() {
                    let mut file = util::create_file(&dest)?;
                    pixels
                        .write_to(&mut file, image::ImageFormat::Png)
                        .map_err(crate::error::Error::from)?;
                }
            }
        }

        for shot in &self.screenshots {
            for image in &shot.images {
                let dest = output_dir
                    .join("screenshots")
                    .join(format!("{}x{}", image.width, image.height))
                    .join(&shot.basename);
                if dest.exists() {
                    continue;
                }
                if let Some(pixels) = &image.pixels {
                    let mut file = util::create_file(&dest)?;
                    pixels
                        .write_to(&mut file, image::ImageFormat::Png)
                        .map_err(crate::error::Error::from)?;
                }
            }
        }
        Ok(())
    }
}

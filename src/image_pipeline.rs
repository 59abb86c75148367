// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Thumbnail generation: resizing a source image to a target
//! resolution and padding it onto a transparent widescreen canvas, plus
//! rendering font preview strips via shaping and glyph rasterization.

use ab_glyph::{Font, FontRef, Glyph, ScaleFont};
use image::{DynamicImage, GenericImage, Rgba, RgbaImage};

/// Resizes `source` to fit within `(width, height)` preserving aspect
/// ratio (Lanczos3, a good default resampling filter for down-sampled
/// resource art), then centers it on a transparent canvas of
/// exactly `(width, height)` — the 16:9 padding rule.
pub fn fit_to(source: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let scale = f64::min(
        width as f64 / source.width().max(1) as f64,
        height as f64 / source.height().max(1) as f64,
    )
    .min(1.0);
    let scaled_w = ((source.width() as f64 * scale).round() as u32).max(1);
    let scaled_h = ((source.height() as f64 * scale).round() as u32).max(1);

    let resized = source.resize_exact(scaled_w, scaled_h, image::imageops::FilterType::Lanczos3);

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    let x = ((width - scaled_w) / 2) as i64;
    let y = ((height - scaled_h) / 2) as i64;
    image::imageops::overlay(&mut canvas, &resized.to_rgba8(), x, y);

    DynamicImage::ImageRgba8(canvas)
}

/// Renders `text` shaped with `font` at a fixed pixel height, onto a
/// transparent canvas padded to `(width, height)` the same way a
/// screenshot thumbnail is, producing the font component's source preview
/// image.
pub fn render_font_preview(
    font_bytes: &[u8],
    text: &str,
    width: u32,
    height: u32,
) -> crate::error::Result<DynamicImage> {
    let face = rustybuzz::Face::from_slice(font_bytes, 0)
        .ok_or_else(|| crate::error::Error::PackageParseError(
            std::path::PathBuf::from("<font preview>"),
            "failed to parse font for shaping".into(),
        ))?;

    let pixel_height: f32 = (height as f32 * 0.4).max(8.0);
    let font = FontRef::try_from_slice(font_bytes)
        .map_err(|e| crate::error::Error::PackageParseError(
            std::path::PathBuf::from("<font preview>"),
            e.to_string(),
        ))?;
    let scaled = font.as_scaled(pixel_height);

    let mut buffer = rustybuzz::UnicodeBuffer::new();
    buffer.push_str(text);
    buffer.guess_segment_properties();
    let glyph_buffer = rustybuzz::shape(&face, &[], buffer);

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    let mut pen_x = 8.0f32;
    let pen_y = height as f32 * 0.6;

    for (info, position) in glyph_buffer
        .glyph_infos()
        .iter()
        .zip(glyph_buffer.glyph_positions())
    {
        let glyph_id = ab_glyph::GlyphId(info.glyph_id as u16);
        let glyph: Glyph = glyph_id.with_scale_and_position(
            pixel_height,
            ab_glyph::point(pen_x + position.x_offset as f32, pen_y - position.y_offset as f32),
        );

        if let Some(outline) = scaled.outline_glyph(glyph) {
            let bounds = outline.px_bounds();
            outline.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i32 + gx as i32;
                let py = bounds.min.y as i32 + gy as i32;
                if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
                    let alpha = (coverage * 255.0) as u8;
                    canvas.put_pixel(px as u32, py as u32, Rgba([0, 0, 0, alpha]));
                }
            });
        }

        pen_x += position.x_advance as f32;
    }

    Ok(DynamicImage::ImageRgba8(canvas))
}

/// Falls back to the first grapheme cluster of the font's own name when no
/// dedicated preview string is configured.
pub fn font_icon_text(sample: &str) -> String {
    use unicode_segmentation::UnicodeSegmentation;
    sample
        .graphemes(true)
        .next()
        .unwrap_or("?")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_to_preserves_aspect_ratio_within_canvas() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(100, 50, Rgba([255, 0, 0, 255])));
        let fitted = fit_to(&source, 624, 351);
        assert_eq!(fitted.width(), 624);
        assert_eq!(fitted.height(), 351);
    }

    #[test]
    fn fit_to_never_upscales_small_sources() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 255, 0, 255])));
        let fitted = fit_to(&source, 112, 63);
        assert_eq!(fitted.width(), 112);
        assert_eq!(fitted.height(), 63);
    }

    #[test]
    fn font_icon_text_takes_first_grapheme() {
        assert_eq!(font_icon_text("roboto"), "R");
        assert_eq!(font_icon_text(""), "?");
    }
}

use std::collections::HashMap;

use fontdue::layout::{
    CoordinateSystem, GlyphRasterConfig, HorizontalAlign, Layout, LayoutSettings, TextStyle,
    VerticalAlign, WrapStyle,
};
use fontdue::Font;
use tiny_skia::{Pixmap, PremultipliedColorU8};

use crate::schema::REFERENCE_HEIGHT;

pub const MAX_LABEL_WORDS: usize = 5;
/// Overlay size on a 720 px tall canvas.
pub const REFERENCE_FONT_PX: f32 = 48.0;

/// First five whitespace-separated words of the prompt, single-spaced.
pub fn overlay_label(prompt: &str) -> String {
    prompt
        .split_whitespace()
        .take(MAX_LABEL_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn font_px_for_height(height: u32) -> f32 {
    REFERENCE_FONT_PX * height as f32 / REFERENCE_HEIGHT as f32
}

/// Pixel rectangle touched by a drawn label, right/bottom exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextBounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl TextBounds {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    fn include(&mut self, other: TextBounds) {
        self.left = self.left.min(other.left);
        self.top = self.top.min(other.top);
        self.right = self.right.max(other.right);
        self.bottom = self.bottom.max(other.bottom);
    }
}

#[derive(Debug, Clone)]
struct GlyphBitmap {
    width: usize,
    height: usize,
    bitmap: Vec<u8>,
}

pub struct TextPainter {
    font: Font,
    glyph_cache: HashMap<GlyphRasterConfig, GlyphBitmap>,
}

impl TextPainter {
    pub fn new(font: Font) -> Self {
        Self {
            font,
            glyph_cache: HashMap::new(),
        }
    }

    pub fn font(&self) -> &Font {
        &self.font
    }

    /// Draws one line of `text` centered on the pixmap, the way a canvas
    /// does with `textAlign = center` and `textBaseline = middle`.
    /// Returns the painted area, or `None` when nothing was drawn.
    pub fn draw_centered(
        &mut self,
        pixmap: &mut Pixmap,
        text: &str,
        font_px: f32,
        color: [u8; 4],
    ) -> Option<TextBounds> {
        if text.is_empty() || font_px <= 0.0 {
            return None;
        }

        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x: 0.0,
            y: 0.0,
            max_width: None,
            max_height: Some(pixmap.height() as f32),
            horizontal_align: HorizontalAlign::Left,
            vertical_align: VerticalAlign::Middle,
            line_height: 1.0,
            wrap_style: WrapStyle::Word,
            wrap_hard_breaks: false,
        });
        layout.append(&[&self.font], &TextStyle::new(text, font_px, 0));

        let glyphs = layout.glyphs();
        let last = glyphs.last()?;
        let last_metrics = self.font.metrics(last.parent, font_px);
        let advance = last.x - last_metrics.xmin as f32 + last_metrics.advance_width;
        let offset_x = (pixmap.width() as f32 - advance) / 2.0;

        let mut painted: Option<TextBounds> = None;
        for glyph in glyphs {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let glyph_bitmap = self.glyph_cache.entry(glyph.key).or_insert_with(|| {
                let (_, bitmap) = self.font.rasterize_config(glyph.key);
                GlyphBitmap {
                    width: glyph.width,
                    height: glyph.height,
                    bitmap,
                }
            });

            let x = (glyph.x + offset_x).round() as i32;
            let y = glyph.y.round() as i32;
            blend_glyph(pixmap, x, y, glyph_bitmap, color);

            let bounds = TextBounds {
                left: x,
                top: y,
                right: x + glyph_bitmap.width as i32,
                bottom: y + glyph_bitmap.height as i32,
            };
            match painted.as_mut() {
                Some(existing) => existing.include(bounds),
                None => painted = Some(bounds),
            }
        }
        painted
    }
}

fn blend_glyph(pixmap: &mut Pixmap, x: i32, y: i32, glyph: &GlyphBitmap, color: [u8; 4]) {
    let frame_width = pixmap.width() as i32;
    let frame_height = pixmap.height() as i32;
    let pixels = pixmap.pixels_mut();

    for row in 0..glyph.height {
        let py = y + row as i32;
        if py < 0 || py >= frame_height {
            continue;
        }

        for col in 0..glyph.width {
            let px = x + col as i32;
            if px < 0 || px >= frame_width {
                continue;
            }

            let mask = glyph.bitmap[row * glyph.width + col];
            if mask == 0 {
                continue;
            }

            let alpha = (f32::from(mask) / 255.0) * (f32::from(color[3]) / 255.0);
            let idx = (py * frame_width + px) as usize;
            if let Some(pixel) = pixels.get_mut(idx) {
                *pixel = blend_over(*pixel, color, alpha);
            }
        }
    }
}

fn blend_over(dst: PremultipliedColorU8, color: [u8; 4], alpha: f32) -> PremultipliedColorU8 {
    let inv_alpha = 1.0 - alpha;
    let channel = |src: u8, dst: u8| {
        (f32::from(src) * alpha + f32::from(dst) * inv_alpha)
            .clamp(0.0, 255.0)
            .round() as u8
    };
    let out_a = (alpha * 255.0 + f32::from(dst.alpha()) * inv_alpha)
        .clamp(0.0, 255.0)
        .round() as u8;
    let out_r = channel(color[0], dst.red()).min(out_a);
    let out_g = channel(color[1], dst.green()).min(out_a);
    let out_b = channel(color[2], dst.blue()).min(out_a);

    PremultipliedColorU8::from_rgba(out_r, out_g, out_b, out_a).unwrap_or(dst)
}

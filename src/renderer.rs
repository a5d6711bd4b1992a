use std::path::Path;

use anyhow::{anyhow, Result};
use fontdue::Font;
use serde::Serialize;
use tiny_skia::{
    FillRule, GradientStop, LinearGradient, Paint, PathBuilder, Pixmap, Point, Rect, SpreadMode,
    Stroke, Transform,
};

use crate::color::{hsl_color, white_alpha};
use crate::error_codes::{CodedError, SURFACE_UNAVAILABLE};
use crate::font_assets::{load_bundled_overlay_font, load_font_file, unsupported_codepoints};
use crate::schema::CanvasSize;
use crate::text_overlay::{font_px_for_height, overlay_label, TextBounds, TextPainter};

pub const PARTICLE_COUNT: u32 = 50;
pub const HUE_DEGREES_PER_SECOND: f64 = 50.0;
pub const GRADIENT_SATURATION: f32 = 0.7;
pub const GRADIENT_LIGHTNESS: f32 = 0.5;
pub const WAVE_STEP_PX: u32 = 5;
pub const WAVE_AMPLITUDE: f64 = 50.0;
pub const WAVE_OFFSET_BELOW_CENTER: f64 = 100.0;
pub const WAVE_STROKE_WIDTH: f32 = 3.0;
pub const WAVE_ALPHA: f32 = 0.5;
/// 0.9 opacity white.
pub const TEXT_COLOR: [u8; 4] = [255, 255, 255, 230];

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0001_0000_01b3;

/// Everything one frame depends on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderParams {
    pub time: f64,
    pub width: u32,
    pub height: u32,
    pub prompt: String,
}

impl RenderParams {
    pub fn new(time: f64, canvas: CanvasSize, prompt: impl Into<String>) -> Self {
        Self {
            time,
            width: canvas.width,
            height: canvas.height,
            prompt: prompt.into(),
        }
    }

    pub fn canvas(&self) -> CanvasSize {
        CanvasSize::new(self.width, self.height)
    }
}

/// One rendered instant: straight-alpha RGBA8, row-major, fully opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Frame {
    fn from_pixmap(pixmap: Pixmap) -> Self {
        let rgba = pixmap
            .pixels()
            .iter()
            .flat_map(|pixel| {
                let color = pixel.demultiply();
                [color.red(), color.green(), color.blue(), color.alpha()]
            })
            .collect::<Vec<_>>();
        Self {
            width: pixmap.width(),
            height: pixmap.height(),
            rgba,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> CanvasSize {
        CanvasSize::new(self.width, self.height)
    }

    pub fn as_rgba(&self) -> &[u8] {
        &self.rgba
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.rgba.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Drops the alpha channel, for codecs without one.
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.rgba
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect()
    }

    /// FNV-1a over the RGBA bytes.
    pub fn fingerprint(&self) -> u64 {
        let mut hash = FNV_OFFSET_BASIS;
        for &byte in &self.rgba {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }
}

/// Hues (degrees) of the two gradient stops; always half a turn apart.
pub fn gradient_hues(time: f64) -> (f64, f64) {
    let start = (time * HUE_DEGREES_PER_SECOND).rem_euclid(360.0);
    let end = (time * HUE_DEGREES_PER_SECOND + 180.0).rem_euclid(360.0);
    (start, end)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub alpha: f64,
}

pub fn particle_at(index: u32, time: f64, width: u32, height: u32) -> Particle {
    let i = f64::from(index);
    Particle {
        x: ((time + i).sin() * 0.5 + 0.5) * f64::from(width),
        y: ((time * 0.7 + i).cos() * 0.5 + 0.5) * f64::from(height),
        radius: (time * 2.0 + i).sin() * 5.0 + 10.0,
        alpha: 0.3 + (time + i).sin() * 0.2,
    }
}

pub fn wave_y(x: f64, time: f64, height: u32) -> f64 {
    (x * 0.01 + time * 2.0).sin() * WAVE_AMPLITUDE
        + f64::from(height) / 2.0
        + WAVE_OFFSET_BELOW_CENTER
}

/// Polyline samples at `x = 0, 5, 10, ..` strictly left of `width`.
pub fn wave_points(time: f64, width: u32, height: u32) -> Vec<(f64, f64)> {
    (0..width)
        .step_by(WAVE_STEP_PX as usize)
        .map(|x| {
            let x = f64::from(x);
            (x, wave_y(x, time, height))
        })
        .collect()
}

pub struct FrameRenderer {
    text: TextPainter,
}

impl FrameRenderer {
    /// Renderer using the bundled overlay font.
    pub fn new() -> Result<Self> {
        Ok(Self::with_font(load_bundled_overlay_font()?))
    }

    pub fn with_font(font: Font) -> Self {
        Self {
            text: TextPainter::new(font),
        }
    }

    pub fn from_font_file(path: &Path) -> Result<Self> {
        Ok(Self::with_font(load_font_file(path)?))
    }

    /// Characters of the overlay label the font has no glyph for.
    pub fn unsupported_codepoints(&self, prompt: &str) -> Vec<char> {
        unsupported_codepoints(self.text.font(), &overlay_label(prompt))
    }

    pub fn render(&mut self, params: &RenderParams) -> Result<Frame> {
        self.render_with_overlay_bounds(params)
            .map(|(frame, _)| frame)
    }

    /// Renders a frame and also reports where the prompt label landed.
    #[tracing::instrument(
        level = "trace",
        skip_all,
        fields(time = params.time, width = params.width, height = params.height)
    )]
    pub fn render_with_overlay_bounds(
        &mut self,
        params: &RenderParams,
    ) -> Result<(Frame, Option<TextBounds>)> {
        let mut pixmap = Pixmap::new(params.width, params.height).ok_or_else(|| {
            anyhow!(CodedError::runtime(
                SURFACE_UNAVAILABLE,
                format!(
                    "failed to allocate {}x{} drawing surface",
                    params.width, params.height
                ),
            ))
        })?;

        paint_background(&mut pixmap, params.time)?;
        paint_particles(&mut pixmap, params.time);
        let bounds = self.text.draw_centered(
            &mut pixmap,
            &overlay_label(&params.prompt),
            font_px_for_height(params.height),
            TEXT_COLOR,
        );
        paint_wave(&mut pixmap, params.time);

        Ok((Frame::from_pixmap(pixmap), bounds))
    }
}

fn paint_background(pixmap: &mut Pixmap, time: f64) -> Result<()> {
    let width = pixmap.width() as f32;
    let height = pixmap.height() as f32;
    let (start_hue, end_hue) = gradient_hues(time);

    let shader = LinearGradient::new(
        Point::from_xy(0.0, 0.0),
        Point::from_xy(width, height),
        vec![
            GradientStop::new(
                0.0,
                hsl_color(start_hue as f32, GRADIENT_SATURATION, GRADIENT_LIGHTNESS),
            ),
            GradientStop::new(
                1.0,
                hsl_color(end_hue as f32, GRADIENT_SATURATION, GRADIENT_LIGHTNESS),
            ),
        ],
        SpreadMode::Pad,
        Transform::identity(),
    )
    .ok_or_else(|| anyhow!("degenerate background gradient for {width}x{height} canvas"))?;
    let rect = Rect::from_xywh(0.0, 0.0, width, height)
        .ok_or_else(|| anyhow!("invalid background rect {width}x{height}"))?;

    let paint = Paint {
        shader,
        anti_alias: false,
        ..Paint::default()
    };
    pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    Ok(())
}

fn paint_particles(pixmap: &mut Pixmap, time: f64) {
    let (width, height) = (pixmap.width(), pixmap.height());
    let mut paint = Paint::default();
    paint.anti_alias = true;

    for index in 0..PARTICLE_COUNT {
        let particle = particle_at(index, time, width, height);
        let Some(circle) = PathBuilder::from_circle(
            particle.x as f32,
            particle.y as f32,
            particle.radius as f32,
        ) else {
            continue;
        };
        paint.set_color(white_alpha(particle.alpha as f32));
        pixmap.fill_path(&circle, &paint, FillRule::Winding, Transform::identity(), None);
    }
}

fn paint_wave(pixmap: &mut Pixmap, time: f64) {
    let mut builder = PathBuilder::new();
    for (index, (x, y)) in wave_points(time, pixmap.width(), pixmap.height())
        .into_iter()
        .enumerate()
    {
        if index == 0 {
            builder.move_to(x as f32, y as f32);
        } else {
            builder.line_to(x as f32, y as f32);
        }
    }
    // A single sample has no segment to stroke.
    let Some(path) = builder.finish() else {
        return;
    };

    let mut paint = Paint::default();
    paint.anti_alias = true;
    paint.set_color(white_alpha(WAVE_ALPHA));
    let stroke = Stroke {
        width: WAVE_STROKE_WIDTH,
        miter_limit: 10.0,
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

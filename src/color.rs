use tiny_skia::Color;

/// CSS `hsl()` conversion. `hue` in degrees (any value, wrapped into
/// [0, 360)), `saturation` and `lightness` in [0, 1].
pub fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> [f32; 3] {
    let hue = hue.rem_euclid(360.0);
    let saturation = saturation.clamp(0.0, 1.0);
    let lightness = lightness.clamp(0.0, 1.0);

    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = lightness - chroma / 2.0;
    [
        (r + m).clamp(0.0, 1.0),
        (g + m).clamp(0.0, 1.0),
        (b + m).clamp(0.0, 1.0),
    ]
}

pub fn hsl_color(hue: f32, saturation: f32, lightness: f32) -> Color {
    let [r, g, b] = hsl_to_rgb(hue, saturation, lightness);
    Color::from_rgba(r, g, b, 1.0).unwrap_or(Color::BLACK)
}

/// White at the given opacity, clamped into [0, 1].
pub fn white_alpha(alpha: f32) -> Color {
    Color::from_rgba(1.0, 1.0, 1.0, alpha.clamp(0.0, 1.0)).unwrap_or(Color::WHITE)
}

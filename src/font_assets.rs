use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use fontdue::{Font, FontSettings};
use sha2::{Digest, Sha256};

pub const FONT_ASSET_HASH_MISMATCH: &str = "FONT_ASSET_HASH_MISMATCH";
pub const OVERLAY_FONT_FILE: &str = "DejaVuSans-Bold.ttf";
pub const OVERLAY_FONT_SHA256: &str =
    "0d977336a6d5fba34eab8e3199eb218327161b5143749f802982c2bc34df0c96";

static OVERLAY_FONT_BYTES: &[u8] = include_bytes!("../assets/fonts/DejaVuSans-Bold.ttf");

/// Bundled bold sans-serif used for the prompt overlay.
pub fn bundled_overlay_font_bytes() -> &'static [u8] {
    OVERLAY_FONT_BYTES
}

pub fn verify_bundled_overlay_font() -> Result<()> {
    let actual_hash = sha256_hex(OVERLAY_FONT_BYTES);
    if actual_hash != OVERLAY_FONT_SHA256 {
        bail!(
            "{}: {} expected sha256={} actual sha256={}",
            FONT_ASSET_HASH_MISMATCH,
            OVERLAY_FONT_FILE,
            OVERLAY_FONT_SHA256,
            actual_hash
        );
    }
    Ok(())
}

pub fn load_bundled_overlay_font() -> Result<Font> {
    verify_bundled_overlay_font()?;
    parse_font(OVERLAY_FONT_BYTES, OVERLAY_FONT_FILE)
}

/// Loads a user-supplied TTF/OTF in place of the bundled face.
pub fn load_font_file(path: &Path) -> Result<Font> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read font file '{}'", path.display()))?;
    parse_font(&bytes, &path.display().to_string())
}

fn parse_font(bytes: &[u8], font_name: &str) -> Result<Font> {
    Font::from_bytes(bytes, FontSettings::default())
        .map_err(|error| anyhow!("failed to parse font {font_name}: {error}"))
}

/// Characters the face cannot draw; whitespace is ignored.
pub fn unsupported_codepoints(font: &Font, text: &str) -> Vec<char> {
    let mut missing = Vec::new();
    for ch in text.chars() {
        if ch.is_whitespace() {
            continue;
        }
        if font.lookup_glyph_index(ch) == 0 && !missing.contains(&ch) {
            missing.push(ch);
        }
    }
    missing
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

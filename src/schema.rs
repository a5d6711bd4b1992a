use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error_codes::{
    CodedError, INVALID_DURATION, INVALID_FORMAT, INVALID_QUALITY, INVALID_RESOLUTION,
    INVALID_SIZE,
};

/// Frames per second of every generated sequence. Not configurable.
pub const FPS: u32 = 30;

/// Canvas height the text size and wave offset were authored against.
pub const REFERENCE_HEIGHT: u32 = 720;
pub const REFERENCE_WIDTH: u32 = 1280;

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum DurationPreset {
    Three,
    Five,
    Ten,
    Fifteen,
}

impl DurationPreset {
    pub const ALL: [DurationPreset; 4] = [Self::Three, Self::Five, Self::Ten, Self::Fifteen];

    pub fn from_seconds(seconds: u32) -> Result<Self> {
        match seconds {
            3 => Ok(Self::Three),
            5 => Ok(Self::Five),
            10 => Ok(Self::Ten),
            15 => Ok(Self::Fifteen),
            _ => Err(anyhow!(CodedError::usage(
                INVALID_DURATION,
                format!("invalid duration {seconds}s"),
            )
            .with_details(json!({
                "provided": seconds,
                "allowed": [3, 5, 10, 15]
            })))),
        }
    }

    /// Accepts `5` or `5s`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        match trimmed.strip_suffix('s').unwrap_or(trimmed).parse::<u32>() {
            Ok(seconds) => Self::from_seconds(seconds),
            Err(_) => Err(anyhow!(CodedError::usage(
                INVALID_DURATION,
                format!("invalid duration '{raw}'"),
            )
            .with_details(json!({
                "provided": raw,
                "allowed": [3, 5, 10, 15]
            })))),
        }
    }

    pub fn seconds(self) -> u32 {
        match self {
            Self::Three => 3,
            Self::Five => 5,
            Self::Ten => 10,
            Self::Fifteen => 15,
        }
    }

    pub fn total_frames(self) -> u32 {
        self.seconds() * FPS
    }
}

impl Default for DurationPreset {
    fn default() -> Self {
        Self::Five
    }
}

impl TryFrom<u32> for DurationPreset {
    type Error = String;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        Self::from_seconds(value).map_err(|error| format!("{error}"))
    }
}

impl From<DurationPreset> for u32 {
    fn from(value: DurationPreset) -> Self {
        value.seconds()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionPreset {
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    FullHd1080,
    #[serde(rename = "4K", alias = "4k")]
    Uhd4k,
}

impl ResolutionPreset {
    pub fn from_label(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "720p" => Ok(Self::Hd720),
            "1080p" => Ok(Self::FullHd1080),
            "4k" => Ok(Self::Uhd4k),
            _ => Err(anyhow!(CodedError::usage(
                INVALID_RESOLUTION,
                format!("invalid resolution '{value}'"),
            )
            .with_details(json!({
                "provided": value,
                "allowed": ["720p", "1080p", "4K"]
            })))),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Hd720 => "720p",
            Self::FullHd1080 => "1080p",
            Self::Uhd4k => "4K",
        }
    }

    pub fn canvas(self) -> CanvasSize {
        match self {
            Self::Hd720 => CanvasSize::new(1280, 720),
            Self::FullHd1080 => CanvasSize::new(1920, 1080),
            Self::Uhd4k => CanvasSize::new(3840, 2160),
        }
    }
}

impl Default for ResolutionPreset {
    fn default() -> Self {
        Self::Hd720
    }
}

impl fmt::Display for ResolutionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn reference() -> Self {
        Self::new(REFERENCE_WIDTH, REFERENCE_HEIGHT)
    }

    /// Parses `WIDTHxHEIGHT`, e.g. `320x180`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || {
            anyhow!(CodedError::usage(
                INVALID_SIZE,
                format!("invalid canvas size '{raw}', expected WIDTHxHEIGHT"),
            )
            .with_details(json!({ "provided": raw })))
        };

        let (width, height) = raw
            .trim()
            .to_ascii_lowercase()
            .split_once('x')
            .map(|(w, h)| (w.trim().to_owned(), h.trim().to_owned()))
            .ok_or_else(invalid)?;
        let width = width.parse::<u32>().map_err(|_| invalid())?;
        let height = height.parse::<u32>().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self::new(width, height))
    }

    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
    Webp,
}

impl ArtifactFormat {
    pub fn from_keyword(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            _ => Err(anyhow!(CodedError::usage(
                INVALID_FORMAT,
                format!("invalid artifact format '{value}'"),
            )
            .with_details(json!({
                "provided": value,
                "allowed": ["jpeg", "png", "webp"]
            })))),
        }
    }

    /// Format implied by a path's extension, if it names one.
    pub fn from_extension(path: &std::path::Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::from_keyword(ext).ok()
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }
}

impl Default for ArtifactFormat {
    fn default() -> Self {
        Self::Jpeg
    }
}

/// Parses a quality flag; anything outside 1..=100 is `INVALID_QUALITY`.
pub fn parse_quality(raw: &str) -> Result<u8> {
    match raw.trim().parse::<i64>() {
        Ok(value) if (1..=100).contains(&value) => Ok(value as u8),
        _ => Err(anyhow!(CodedError::usage(
            INVALID_QUALITY,
            format!("jpeg quality must be within 1..=100, got '{raw}'"),
        )
        .with_details(json!({ "provided": raw })))),
    }
}

pub fn validate_quality(quality: u8) -> Result<u8> {
    if quality == 0 || quality > 100 {
        return Err(anyhow!(CodedError::usage(
            INVALID_QUALITY,
            format!("jpeg quality must be within 1..=100, got {quality}"),
        )
        .with_details(json!({ "provided": quality }))));
    }
    Ok(quality)
}

#[cfg(test)]
mod tests {
    use super::{parse_quality, ArtifactFormat, CanvasSize, DurationPreset, ResolutionPreset};
    use crate::error_codes::{find_coded_error, INVALID_DURATION, INVALID_QUALITY, INVALID_SIZE};

    #[test]
    fn duration_presets_map_to_frame_counts() {
        let frames = DurationPreset::ALL
            .iter()
            .map(|preset| preset.total_frames())
            .collect::<Vec<_>>();
        assert_eq!(frames, vec![90, 150, 300, 450]);
    }

    #[test]
    fn unknown_duration_is_a_coded_usage_error() {
        let error = DurationPreset::from_seconds(7).expect_err("7s is not a preset");
        let coded = find_coded_error(&error).expect("should carry a code");
        assert_eq!(coded.code, INVALID_DURATION);
    }

    #[test]
    fn duration_flag_accepts_seconds_suffix() {
        assert_eq!(
            DurationPreset::parse("10s").expect("10s should parse"),
            DurationPreset::Ten
        );
        assert_eq!(
            DurationPreset::parse(" 3 ").expect("3 should parse"),
            DurationPreset::Three
        );
        for raw in ["7", "ten", "", "-5"] {
            let error = DurationPreset::parse(raw).expect_err("should reject");
            assert_eq!(
                find_coded_error(&error).map(|coded| coded.code),
                Some(INVALID_DURATION),
                "{raw}"
            );
        }
    }

    #[test]
    fn quality_flag_is_range_checked_before_narrowing() {
        assert_eq!(parse_quality("1").expect("1 is valid"), 1);
        assert_eq!(parse_quality("100").expect("100 is valid"), 100);
        for raw in ["0", "101", "300", "-1", "high"] {
            let error = parse_quality(raw).expect_err("should reject");
            assert_eq!(
                find_coded_error(&error).map(|coded| coded.code),
                Some(INVALID_QUALITY),
                "{raw}"
            );
        }
    }

    #[test]
    fn duration_deserializes_only_from_presets() {
        let five: DurationPreset = serde_yaml::from_str("5").expect("5 should parse");
        assert_eq!(five, DurationPreset::Five);
        assert!(serde_yaml::from_str::<DurationPreset>("4").is_err());
    }

    #[test]
    fn resolution_labels_are_case_insensitive() {
        assert_eq!(
            ResolutionPreset::from_label("4k").expect("4k should parse"),
            ResolutionPreset::Uhd4k
        );
        assert_eq!(
            ResolutionPreset::from_label(" 1080P ").expect("1080P should parse"),
            ResolutionPreset::FullHd1080
        );
        assert!(ResolutionPreset::from_label("8K").is_err());
    }

    #[test]
    fn resolution_deserializes_from_ui_labels() {
        let preset: ResolutionPreset = serde_yaml::from_str("4K").expect("4K should parse");
        assert_eq!(preset.canvas(), CanvasSize::new(3840, 2160));
        let preset: ResolutionPreset = serde_yaml::from_str("720p").expect("720p should parse");
        assert_eq!(preset.canvas(), CanvasSize::reference());
    }

    #[test]
    fn canvas_size_parses_width_by_height() {
        assert_eq!(
            CanvasSize::parse("320x180").expect("should parse"),
            CanvasSize::new(320, 180)
        );
        assert_eq!(
            CanvasSize::parse("64X36").expect("should parse"),
            CanvasSize::new(64, 36)
        );
        for raw in ["0x10", "10x0", "10", "axb", "-1x5"] {
            let error = CanvasSize::parse(raw).expect_err("should reject");
            assert_eq!(
                find_coded_error(&error).map(|coded| coded.code),
                Some(INVALID_SIZE),
                "{raw}"
            );
        }
    }

    #[test]
    fn artifact_format_accepts_jpg_alias() {
        assert_eq!(
            ArtifactFormat::from_keyword("JPG").expect("jpg should parse"),
            ArtifactFormat::Jpeg
        );
        assert_eq!(ArtifactFormat::Webp.extension(), "webp");
        assert!(ArtifactFormat::from_keyword("gif").is_err());
    }

    #[test]
    fn artifact_format_from_output_extension() {
        use std::path::Path;

        assert_eq!(
            ArtifactFormat::from_extension(Path::new("out/still.PNG")),
            Some(ArtifactFormat::Png)
        );
        assert_eq!(
            ArtifactFormat::from_extension(Path::new("still.jpg")),
            Some(ArtifactFormat::Jpeg)
        );
        assert_eq!(ArtifactFormat::from_extension(Path::new("still.gif")), None);
        assert_eq!(ArtifactFormat::from_extension(Path::new("still")), None);
    }
}

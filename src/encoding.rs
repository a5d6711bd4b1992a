use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat, RgbImage, RgbaImage};

use crate::renderer::Frame;
use crate::schema::{validate_quality, ArtifactFormat, DEFAULT_JPEG_QUALITY};
use crate::sequence::FrameSink;

pub const ARTIFACT_PREFIX: &str = "sora";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactEncoding {
    pub format: ArtifactFormat,
    /// JPEG quality 1..=100; ignored by the lossless formats.
    pub quality: u8,
}

impl Default for ArtifactEncoding {
    fn default() -> Self {
        Self {
            format: ArtifactFormat::Jpeg,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

pub fn encode_frame(frame: &Frame, encoding: ArtifactEncoding) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    match encoding.format {
        ArtifactFormat::Jpeg => {
            let quality = validate_quality(encoding.quality)?;
            let rgb = frame.to_rgb8();
            JpegEncoder::new_with_quality(&mut bytes, quality)
                .encode(&rgb, frame.width(), frame.height(), ExtendedColorType::Rgb8)
                .context("failed to encode frame as jpeg")?;
        }
        ArtifactFormat::Png => {
            rgba_image(frame)?
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .context("failed to encode frame as png")?;
        }
        ArtifactFormat::Webp => {
            let rgb = RgbImage::from_raw(frame.width(), frame.height(), frame.to_rgb8())
                .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
            rgb.write_to(&mut Cursor::new(&mut bytes), ImageFormat::WebP)
                .context("failed to encode frame as webp")?;
        }
    }
    Ok(bytes)
}

fn rgba_image(frame: &Frame) -> Result<RgbaImage> {
    RgbaImage::from_raw(frame.width(), frame.height(), frame.as_rgba().to_vec())
        .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))
}

/// `sora-<unix_epoch_millis>.<ext>`
pub fn artifact_file_name(epoch_millis: i64, format: ArtifactFormat) -> String {
    format!("{ARTIFACT_PREFIX}-{epoch_millis}.{}", format.extension())
}

pub fn now_epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Encodes `frame` and writes it to `path`, creating parent directories.
pub fn write_artifact(frame: &Frame, encoding: ArtifactEncoding, path: &Path) -> Result<PathBuf> {
    let path_str = path.to_string_lossy();
    if path_str.chars().any(|c| c.is_control()) {
        bail!("Output path contains invalid control characters");
    }

    let bytes = encode_frame(frame, encoding)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    }
    fs::write(path, &bytes)
        .with_context(|| format!("failed to write artifact {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "artifact written");
    Ok(path.to_path_buf())
}

/// Writes `frame` into `dir` under the timestamped artifact name.
pub fn write_timestamped_artifact(
    frame: &Frame,
    encoding: ArtifactEncoding,
    dir: &Path,
    epoch_millis: i64,
) -> Result<PathBuf> {
    let path = dir.join(artifact_file_name(epoch_millis, encoding.format));
    write_artifact(frame, encoding, &path)
}

/// Exports every frame of a run as `frame-NNNNN.png`.
pub struct FrameDirSink {
    dir: PathBuf,
    written: u32,
}

impl FrameDirSink {
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create frames directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    pub fn frame_path(&self, frame_index: u32) -> PathBuf {
        self.dir.join(format!("frame-{frame_index:05}.png"))
    }

    pub fn written(&self) -> u32 {
        self.written
    }
}

impl FrameSink for FrameDirSink {
    fn accept(&mut self, frame_index: u32, frame: Frame) -> Result<()> {
        let path = self.frame_path(frame_index);
        rgba_image(&frame)?
            .save_with_format(&path, ImageFormat::Png)
            .with_context(|| format!("failed to write frame {}", path.display()))?;
        self.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{
        artifact_file_name, encode_frame, write_timestamped_artifact, ArtifactEncoding,
        FrameDirSink,
    };
    use crate::renderer::{FrameRenderer, RenderParams};
    use crate::schema::{ArtifactFormat, CanvasSize};
    use crate::sequence::FrameSink;

    fn sample_frame() -> crate::renderer::Frame {
        let mut renderer = FrameRenderer::new().expect("renderer should build");
        renderer
            .render(&RenderParams::new(2.5, CanvasSize::new(64, 36), "encode me"))
            .expect("render")
    }

    #[test]
    fn artifact_name_follows_download_convention() {
        assert_eq!(
            artifact_file_name(1_700_000_000_123, ArtifactFormat::Jpeg),
            "sora-1700000000123.jpg"
        );
        assert_eq!(
            artifact_file_name(42, ArtifactFormat::Png),
            "sora-42.png"
        );
    }

    #[test]
    fn jpeg_artifact_decodes_to_frame_dimensions() {
        let frame = sample_frame();
        let bytes = encode_frame(&frame, ArtifactEncoding::default()).expect("jpeg encode");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&bytes).expect("jpeg decode");
        assert_eq!((decoded.width(), decoded.height()), (64, 36));
    }

    #[test]
    fn png_artifact_is_lossless() {
        let frame = sample_frame();
        let bytes = encode_frame(
            &frame,
            ArtifactEncoding {
                format: ArtifactFormat::Png,
                quality: 80,
            },
        )
        .expect("png encode");
        let decoded = image::load_from_memory(&bytes)
            .expect("png decode")
            .to_rgba8();
        assert_eq!(decoded.as_raw().as_slice(), frame.as_rgba());
    }

    #[test]
    fn webp_artifact_has_riff_header() {
        let frame = sample_frame();
        let bytes = encode_frame(
            &frame,
            ArtifactEncoding {
                format: ArtifactFormat::Webp,
                quality: 80,
            },
        )
        .expect("webp encode");
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn invalid_jpeg_quality_is_rejected() {
        let frame = sample_frame();
        assert!(encode_frame(
            &frame,
            ArtifactEncoding {
                format: ArtifactFormat::Jpeg,
                quality: 0,
            },
        )
        .is_err());
    }

    #[test]
    fn timestamped_artifact_lands_in_nested_dir() {
        let dir = tempdir().expect("tempdir should create");
        let out_dir = dir.path().join("renders/today");
        let path = write_timestamped_artifact(
            &sample_frame(),
            ArtifactEncoding::default(),
            &out_dir,
            1234,
        )
        .expect("artifact should write");
        assert_eq!(path, out_dir.join("sora-1234.jpg"));
        assert!(path.is_file());
    }

    #[test]
    fn frame_dir_sink_numbers_frames() {
        let dir = tempdir().expect("tempdir should create");
        let mut sink = FrameDirSink::create(&dir.path().join("frames")).expect("sink");
        sink.accept(0, sample_frame()).expect("frame 0");
        sink.accept(1, sample_frame()).expect("frame 1");
        assert_eq!(sink.written(), 2);
        assert!(dir.path().join("frames/frame-00000.png").is_file());
        assert!(dir.path().join("frames/frame-00001.png").is_file());
    }
}

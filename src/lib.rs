//! Procedural placeholder-video generator.
//!
//! [`renderer::FrameRenderer`] paints one frame (gradient, particles, prompt
//! text, wave) for a point in time; [`sequence::generate`] drives it over a
//! fixed-rate timeline and keeps the middle frame as the output still.

pub mod color;
pub mod encoding;
pub mod error_codes;
pub mod font_assets;
pub mod manifest;
pub mod renderer;
pub mod schema;
pub mod sequence;
pub mod text_overlay;

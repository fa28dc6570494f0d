//! Screenshot capture seam.
//!
//! The orchestrator asks a [`ScreenshotPipeline`] for one finished image per
//! checkpoint and stays out of how it was assembled. [`ViewportPipeline`] is
//! the shipped implementation: a plain viewport grab plus forced rotation.
//! Full-page stitching and scrollbar hiding are the province of richer
//! pipelines; [`CaptureOptions`] carries those flags through opaquely.

use std::io::Cursor;
use std::path::Path;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::driver::{Driver, DriverError};
use crate::geometry::RectSize;

/// Strategy for assembling a full-page screenshot from a scrollable viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StitchMode {
    /// Scroll the page to reach its parts
    Scroll,
    /// Use CSS transforms to reach its parts
    CSS,
}

impl StitchMode {
    /// Parse configured text into a stitch mode.
    ///
    /// Unrecognized input silently falls back to [`StitchMode::Scroll`];
    /// a permissive default, not an error.
    pub fn parse(value: &str) -> Self {
        match value {
            "CSS" | "css" => StitchMode::CSS,
            _ => StitchMode::Scroll,
        }
    }
}

impl Default for StitchMode {
    fn default() -> Self {
        StitchMode::Scroll
    }
}

impl std::fmt::Display for StitchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StitchMode::Scroll => write!(f, "Scroll"),
            StitchMode::CSS => write!(f, "CSS"),
        }
    }
}

/// Settings handed to the capture pipeline for one checkpoint
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Capture the full page rather than just the viewport
    pub force_full_page: bool,
    /// Hide scrollbars before capturing
    pub hide_scrollbars: bool,
    /// Forced image rotation in degrees (applied in quarter-turn steps)
    pub rotation_degrees: f64,
    /// Full-page assembly strategy
    pub stitch_mode: StitchMode,
    /// Nominal viewport size, when the session declared one
    pub viewport: Option<RectSize>,
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Error types for capture operations
#[derive(Debug)]
pub enum CaptureError {
    /// The image could not be decoded or transformed
    Image(String),
    /// The underlying driver failed
    Driver(DriverError),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::Image(msg) => write!(f, "Image error: {}", msg),
            CaptureError::Driver(err) => write!(f, "Driver error: {}", err),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Image(_) => None,
            CaptureError::Driver(err) => Some(err),
        }
    }
}

impl From<DriverError> for CaptureError {
    fn from(err: DriverError) -> Self {
        CaptureError::Driver(err)
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::Image(err.to_string())
    }
}

/// A finished in-memory screenshot
#[derive(Debug, Clone)]
pub struct ImageArtifact {
    png: Vec<u8>,
    width: u32,
    height: u32,
}

impl ImageArtifact {
    /// Wrap PNG bytes, reading dimensions from the header
    pub fn from_png(png: Vec<u8>) -> CaptureResult<Self> {
        let img = image::load_from_memory(&png)
            .map_err(|e| CaptureError::Image(format!("Failed to load PNG: {}", e)))?;
        Ok(Self {
            width: img.width(),
            height: img.height(),
            png,
        })
    }

    /// PNG-encoded bytes
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// Consume the artifact, returning the PNG bytes
    pub fn into_png(self) -> Vec<u8> {
        self.png
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Base64 of the PNG bytes (the form the comparison service accepts)
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.png)
    }

    /// Write the PNG to disk
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, &self.png)
    }

    /// Rotate by the given degrees, rounded to the nearest quarter turn.
    ///
    /// Zero quarter turns returns the artifact unchanged.
    pub fn rotated(self, degrees: f64) -> CaptureResult<Self> {
        let turns = quarter_turns(degrees);
        if turns == 0 {
            return Ok(self);
        }
        let img = image::load_from_memory(&self.png)
            .map_err(|e| CaptureError::Image(format!("Failed to load PNG: {}", e)))?;
        let rotated = match turns {
            1 => img.rotate90(),
            2 => img.rotate180(),
            _ => img.rotate270(),
        };
        let mut buf = Vec::new();
        rotated.write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)?;
        Self::from_png(buf)
    }
}

/// Normalize degrees to 0..=3 quarter turns
fn quarter_turns(degrees: f64) -> i64 {
    ((degrees / 90.0).round() as i64).rem_euclid(4)
}

/// Produces one finished screenshot per checkpoint
pub trait ScreenshotPipeline: Send + Sync {
    /// Capture a screenshot honoring the given options
    fn capture(&self, driver: &dyn Driver, options: &CaptureOptions) -> CaptureResult<ImageArtifact>;
}

/// Viewport-grab pipeline: one driver screenshot plus forced rotation
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewportPipeline;

impl ScreenshotPipeline for ViewportPipeline {
    fn capture(&self, driver: &dyn Driver, options: &CaptureOptions) -> CaptureResult<ImageArtifact> {
        let png = driver.take_screenshot()?;
        ImageArtifact::from_png(png)?.rotated(options.rotation_degrees)
    }
}

//! Web Vision - Visual regression testing for browser UIs.
//!
//! This crate provides:
//! - Session lifecycle for named visual tests (open, checkpoint, close)
//! - Four checkpoint shapes (window, rectangle, element, locator) resolved
//!   into one canonical region comparison
//! - Immediate or deferred failure reporting
//! - A cooperative task queue so checks never race the page actions that
//!   precede them
//! - Checkpoint-capable element wrappers over any automation driver
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use web_vision::{Driver, RestEngine, Vision, VisionError};
//!
//! fn landing_page_looks_right(driver: Arc<dyn Driver>) -> Result<(), VisionError> {
//!     let vision = Vision::new(RestEngine::from_env());
//!     vision.open(Arc::clone(&driver), "shop", "landing page", None);
//!     vision.check_window(Some("home"), None);
//!     let results = vision.close(true).join()?;
//!     assert!(results.is_passed);
//!     Ok(())
//! }
//! ```

pub mod capture;
pub mod config;
pub mod driver;
pub mod engine;
pub mod flow;
pub mod geometry;
pub mod vision;
pub mod wrapper;

// Re-export orchestrator types
pub use vision::{CaptureSettings, FailureReport, Vision, VisionError, VisionResult};

// Re-export driver seam
pub use driver::{Driver, DriverError, DriverResult, ElementHandle, Locator};

// Re-export engine seam
pub use engine::{
    ComparisonEngine, EngineError, EngineResult, MatchResult, RegionRequest, RestConfig,
    RestEngine, RunningSession, SessionStartInfo, TestResult, check_health,
};

// Re-export capture seam
pub use capture::{
    CaptureError, CaptureOptions, CaptureResult, ImageArtifact, ScreenshotPipeline, StitchMode,
    ViewportPipeline,
};

// Re-export queue primitives
pub use flow::{ControlFlow, FlowInterrupted, TaskHandle};

// Re-export geometry
pub use geometry::{Point, RectSize, Region};

// Re-export element wrappers
pub use wrapper::{CheckedDriver, CheckedElement};

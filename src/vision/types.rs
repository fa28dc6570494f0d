use serde::{Deserialize, Serialize};

use crate::capture::{CaptureError, StitchMode};
use crate::driver::DriverError;
use crate::engine::types::{EngineError, MatchResult, TestResult};
use crate::flow::FlowInterrupted;

/// When a non-matching checkpoint raises versus is merely returned.
///
/// `Immediate` is normalized internally: the orchestrator stores `OnClose`
/// and sets a per-call override flag, because the match primitive itself
/// never raises. Every checkpoint consults the flag after its match returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReport {
    /// Failures accumulate; only `close` raises
    OnClose,
    /// Each failed checkpoint raises as soon as its result is known
    Immediate,
}

impl Default for FailureReport {
    fn default() -> Self {
        FailureReport::OnClose
    }
}

/// Lifecycle of one orchestrator instance.
///
/// Disabled orchestrators bypass this machine entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LifecycleState {
    Closed,
    Open,
    Closing,
}

/// Session-wide capture settings, snapshotted at checkpoint-dispatch time.
///
/// Mutations apply to subsequent checkpoints, within the same session or a
/// later one; checkpoints already dispatched are unaffected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Capture the full page rather than just the viewport
    pub force_full_page: bool,
    /// Hide scrollbars before capturing
    pub hide_scrollbars: bool,
    /// Forced image rotation in degrees
    pub image_rotation_degrees: f64,
    /// Full-page assembly strategy
    pub stitch_mode: StitchMode,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            force_full_page: false,
            hide_scrollbars: false,
            image_rotation_degrees: 0.0,
            stitch_mode: StitchMode::Scroll,
        }
    }
}

/// Result type for orchestrator operations
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors surfaced by the orchestrator
#[derive(Debug)]
pub enum VisionError {
    /// Invalid input or a call outside the valid lifecycle state
    Usage(String),
    /// A locator matched no element
    ElementResolution(String),
    /// A checkpoint's captured region did not match the baseline
    MatchFailure {
        /// The checkpoint's match result
        result: MatchResult,
        /// Scenario identifier of the open session
        scenario: String,
        /// Application identifier of the open session
        app: String,
    },
    /// The session's aggregated verdict was not passed
    TestFailure {
        /// The session's test result
        result: TestResult,
        /// Scenario identifier of the closed session
        scenario: String,
        /// Application identifier of the closed session
        app: String,
    },
    /// The automation driver failed
    Driver(DriverError),
    /// The comparison engine failed
    Engine(EngineError),
    /// The capture pipeline failed
    Capture(CaptureError),
    /// The bound task queue shut down before the operation completed
    Interrupted,
}

impl std::fmt::Display for VisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisionError::Usage(msg) => write!(f, "Usage error: {}", msg),
            VisionError::ElementResolution(locator) => {
                write!(f, "No element matched locator: {}", locator)
            }
            VisionError::MatchFailure { scenario, app, .. } => {
                write!(f, "Visual mismatch in test '{}' of '{}'", scenario, app)
            }
            VisionError::TestFailure {
                result,
                scenario,
                app,
            } => write!(
                f,
                "Test '{}' of '{}' failed: {} of {} checkpoints mismatched",
                scenario, app, result.mismatches, result.steps
            ),
            VisionError::Driver(err) => write!(f, "Driver error: {}", err),
            VisionError::Engine(err) => write!(f, "Engine error: {}", err),
            VisionError::Capture(err) => write!(f, "Capture error: {}", err),
            VisionError::Interrupted => {
                write!(f, "task queue shut down before the operation completed")
            }
        }
    }
}

impl std::error::Error for VisionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VisionError::Driver(err) => Some(err),
            VisionError::Engine(err) => Some(err),
            VisionError::Capture(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DriverError> for VisionError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::NoSuchElement(locator) => VisionError::ElementResolution(locator),
            other => VisionError::Driver(other),
        }
    }
}

impl From<EngineError> for VisionError {
    fn from(err: EngineError) -> Self {
        VisionError::Engine(err)
    }
}

impl From<CaptureError> for VisionError {
    fn from(err: CaptureError) -> Self {
        VisionError::Capture(err)
    }
}

impl From<FlowInterrupted> for VisionError {
    fn from(_: FlowInterrupted) -> Self {
        VisionError::Interrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_such_element_maps_to_resolution_error() {
        let err: VisionError = DriverError::NoSuchElement("id=gone".to_string()).into();
        match err {
            VisionError::ElementResolution(locator) => assert_eq!(locator, "id=gone"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_other_driver_errors_stay_driver_errors() {
        let err: VisionError = DriverError::Script("boom".to_string()).into();
        assert!(matches!(err, VisionError::Driver(_)));
    }

    #[test]
    fn test_test_failure_display_carries_identifiers() {
        let err = VisionError::TestFailure {
            result: TestResult {
                is_passed: false,
                steps: 4,
                matches: 3,
                mismatches: 1,
                missing: 0,
                url: None,
            },
            scenario: "login".to_string(),
            app: "shop".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("login"));
        assert!(text.contains("shop"));
        assert!(text.contains("1 of 4"));
    }
}

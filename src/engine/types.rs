// Wire-facing types for the comparison engine seam.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::RectSize;

/// Identifies a batch of related test sessions (one CI run, typically)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInfo {
    /// Unique batch id
    pub id: String,
    /// Human-readable batch name
    pub name: Option<String>,
    /// When the batch started
    pub started_at: DateTime<Utc>,
}

impl BatchInfo {
    /// Create a batch with a generated id
    pub fn new(name: Option<String>) -> Self {
        Self {
            id: generate_batch_id(),
            name,
            started_at: Utc::now(),
        }
    }
}

impl Default for BatchInfo {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Generate a unique batch id
fn generate_batch_id() -> String {
    let timestamp = Utc::now().timestamp_millis();
    let pid = std::process::id();
    format!("batch_{}_{}", timestamp, pid)
}

/// Environment the test ran in, recorded alongside the baseline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEnvironment {
    /// Operating system identifier
    pub os: String,
    /// Host machine name, when resolvable
    pub hostname: Option<String>,
    /// Best-effort inferred environment string (user agent)
    pub inferred: Option<String>,
    /// Nominal viewport size for the session
    pub display_size: Option<RectSize>,
}

impl AppEnvironment {
    /// Detect the local environment, attaching the inferred string and
    /// display size when known
    pub fn detect(inferred: Option<String>, display_size: Option<RectSize>) -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            hostname: hostname::get().ok().map(|h| h.to_string_lossy().into_owned()),
            inferred,
            display_size,
        }
    }
}

/// Everything the engine needs to open a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartInfo {
    /// Agent identifier (library name/version)
    pub agent_id: String,
    /// Application under test
    pub app_id_or_name: String,
    /// Test scenario within the application
    pub scenario_id_or_name: String,
    /// Batch this session belongs to
    pub batch_info: BatchInfo,
    /// Environment block
    pub environment: AppEnvironment,
}

/// Engine-issued handle for an open remote session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningSession {
    /// Session id used on subsequent match/close calls
    pub id: String,
    /// URL of the session results page, if the service exposes one
    pub url: Option<String>,
    /// Whether the service created a fresh baseline for this session
    pub is_new: Option<bool>,
}

/// Canonical rectangle + relativity flag submitted for comparison.
///
/// Relative regions are resolved against the fully-captured screenshot;
/// absolute regions are screenshot-coordinate rectangles supplied directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionRequest {
    /// Distance from the top edge
    pub top: i32,
    /// Distance from the left edge
    pub left: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Whether the rectangle is relative to the captured screenshot
    pub is_relative_to_screenshot: bool,
}

/// Captured output of the application for one checkpoint
#[derive(Debug, Clone)]
pub struct AppOutput {
    /// Page title at capture time
    pub title: String,
    /// PNG-encoded screenshot
    pub screenshot_png: Vec<u8>,
}

/// One checkpoint submission
#[derive(Debug, Clone)]
pub struct MatchWindowData {
    /// Optional tag naming the checkpoint
    pub tag: Option<String>,
    /// Whether the service should record the result without failing the step
    pub ignore_mismatch: bool,
    /// How long the service may retry/poll for a match, in milliseconds
    pub match_timeout_ms: u64,
    /// Region to compare; `None` compares the full screenshot
    pub region: Option<RegionRequest>,
    /// Captured application output
    pub app_output: AppOutput,
}

/// Outcome of one checkpoint comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Whether the captured output matched the baseline
    pub as_expected: bool,
    /// Engine identifier for the compared window
    #[serde(default)]
    pub window_id: String,
}

/// Aggregated outcome of an entire session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Whether every checkpoint matched
    pub is_passed: bool,
    /// Number of checkpoints submitted
    #[serde(default)]
    pub steps: u32,
    /// Checkpoints that matched the baseline
    #[serde(default)]
    pub matches: u32,
    /// Checkpoints that did not match
    #[serde(default)]
    pub mismatches: u32,
    /// Baseline steps with no checkpoint submitted
    #[serde(default)]
    pub missing: u32,
    /// URL of the session results page, if any
    #[serde(default)]
    pub url: Option<String>,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur talking to the comparison engine
#[derive(Debug)]
pub enum EngineError {
    /// Failed to reach the comparison service
    ConnectionFailed(String),
    /// The service answered with something unparseable
    InvalidResponse(String),
    /// The service rejected the request
    Server {
        /// HTTP status code
        status: u16,
        /// Response body, when available
        body: String,
    },
    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            EngineError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            EngineError::Server { status, body } => {
                write!(f, "Service rejected the request ({}): {}", status, body)
            }
            EngineError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err)
    }
}

//! Comparison engine seam.
//!
//! The engine owns baselines, pixel comparison, and session verdicts; this
//! crate only drives its three-call surface. [`rest::RestEngine`] is the
//! shipped implementation; tests substitute scripted fakes.

pub mod rest;
pub mod types;

pub use rest::{RestConfig, RestEngine, check_health};
pub use types::{
    AppEnvironment, AppOutput, BatchInfo, EngineError, EngineResult, MatchResult, MatchWindowData,
    RegionRequest, RunningSession, SessionStartInfo, TestResult,
};

/// Remote comparison/baseline service.
///
/// Match timeouts ride inside [`MatchWindowData`]; any retry or polling
/// against the service happens behind this trait, never in the caller.
pub trait ComparisonEngine: Send + Sync {
    /// Open a session for the given start info
    fn open_session(&self, info: &SessionStartInfo) -> EngineResult<RunningSession>;

    /// Submit one checkpoint for comparison
    fn match_window(
        &self,
        session: &RunningSession,
        data: &MatchWindowData,
    ) -> EngineResult<MatchResult>;

    /// Close the session and collect the aggregated verdict.
    ///
    /// `aborted` marks the session as torn down without a verdict request.
    fn close_session(&self, session: &RunningSession, aborted: bool) -> EngineResult<TestResult>;
}

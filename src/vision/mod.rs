//! Checkpoint orchestration and session lifecycle.
//!
//! [`Vision`] sits between an automation [`Driver`] and a remote
//! [`ComparisonEngine`]. `open` starts a named session, the `check_*` family
//! submits checkpoints against the baseline, `close` collects the aggregated
//! verdict. Every operation is one unit of work on the driver's task queue,
//! so checkpoints execute in submission order relative to the page actions
//! around them.
//!
//! A disabled orchestrator (see [`Vision::disabled`] and the
//! `WEB_VISION_DISABLED` environment variable) turns the whole layer into
//! completed no-ops: callers keep their code unchanged and pay nothing.

pub mod types;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::capture::{
    CaptureOptions, ImageArtifact, ScreenshotPipeline, StitchMode, ViewportPipeline,
};
use crate::config;
use crate::driver::{Driver, ElementHandle, Locator};
use crate::engine::types::{
    AppEnvironment, AppOutput, BatchInfo, MatchResult, MatchWindowData, RegionRequest,
    RunningSession, SessionStartInfo, TestResult,
};
use crate::engine::ComparisonEngine;
use crate::flow::{ControlFlow, TaskHandle};
use crate::geometry::{RectSize, Region};

pub use types::{CaptureSettings, FailureReport, VisionError, VisionResult};
use types::LifecycleState;

/// Poison-tolerant lock: a panicked task must not wedge the orchestrator.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What one checkpoint compares.
enum CheckTarget {
    /// The full captured screenshot
    Window,
    /// An explicit screenshot-coordinate rectangle
    Rect(Region),
    /// The region occupied by an already-resolved element
    Element(Arc<dyn ElementHandle>),
    /// The region occupied by whatever the locator resolves to
    Locator(Locator),
}

struct Binding {
    driver: Arc<dyn Driver>,
    flow: Arc<ControlFlow>,
}

struct ActiveSession {
    start_info: SessionStartInfo,
    running: RunningSession,
}

struct Inner {
    engine: Option<Arc<dyn ComparisonEngine>>,
    capture: Mutex<Arc<dyn ScreenshotPipeline>>,
    disabled: bool,
    state: Mutex<LifecycleState>,
    binding: Mutex<Option<Binding>>,
    settings: Mutex<CaptureSettings>,
    failure_report: Mutex<FailureReport>,
    failure_override: AtomicBool,
    session: Mutex<Option<ActiveSession>>,
}

/// Visual checkpoint orchestrator.
///
/// Cheap to clone; clones share the same session, settings, and queue
/// binding. One instance drives at most one open session at a time.
#[derive(Clone)]
pub struct Vision {
    inner: Arc<Inner>,
}

impl Vision {
    /// Create an orchestrator backed by the given comparison engine.
    ///
    /// Honors the `WEB_VISION_DISABLED` environment variable: when set, the
    /// instance behaves exactly like [`Vision::disabled`].
    pub fn new(engine: impl ComparisonEngine + 'static) -> Self {
        Self::build(Some(Arc::new(engine)), config::disabled())
    }

    /// Create an orchestrator whose every call is a completed no-op.
    pub fn disabled() -> Self {
        Self::build(None, true)
    }

    fn build(engine: Option<Arc<dyn ComparisonEngine>>, disabled: bool) -> Self {
        let settings = CaptureSettings {
            stitch_mode: StitchMode::parse(&config::get().checks.stitch_mode),
            ..CaptureSettings::default()
        };
        Self {
            inner: Arc::new(Inner {
                engine,
                capture: Mutex::new(Arc::new(ViewportPipeline)),
                disabled,
                state: Mutex::new(LifecycleState::Closed),
                binding: Mutex::new(None),
                settings: Mutex::new(settings),
                failure_report: Mutex::new(FailureReport::OnClose),
                failure_override: AtomicBool::new(false),
                session: Mutex::new(None),
            }),
        }
    }

    /// Replace the capture pipeline (defaults to [`ViewportPipeline`]).
    pub fn with_capture(self, pipeline: impl ScreenshotPipeline + 'static) -> Self {
        *lock(&self.inner.capture) = Arc::new(pipeline);
        self
    }

    /// Whether this orchestrator short-circuits every call
    pub fn is_disabled(&self) -> bool {
        self.inner.disabled
    }

    /// Whether a session is currently open
    pub fn is_open(&self) -> bool {
        !self.inner.disabled && *lock(&self.inner.state) == LifecycleState::Open
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Open a visual test session against the given driver.
    ///
    /// Binds the driver's task queue to this orchestrator, applies the
    /// requested viewport size (or records the current one), and opens the
    /// remote session. Must precede every checkpoint. Opening while a
    /// session is already open resolves to a usage error.
    pub fn open(
        &self,
        driver: Arc<dyn Driver>,
        app_name: &str,
        test_name: &str,
        viewport_size: Option<RectSize>,
    ) -> TaskHandle<VisionResult<()>> {
        let flow = driver.control_flow();
        *lock(&self.inner.binding) = Some(Binding {
            driver: Arc::clone(&driver),
            flow: Arc::clone(&flow),
        });

        if self.inner.disabled {
            return flow.execute(|| Ok(()));
        }

        let inner = Arc::clone(&self.inner);
        let app = app_name.to_string();
        let test = test_name.to_string();
        flow.execute(move || inner.open_task(driver, app, test, viewport_size))
    }

    /// Close the session and collect the aggregated verdict.
    ///
    /// Raises [`VisionError::TestFailure`] iff the verdict is not passed and
    /// `throw_ex` is set; `throw_ex = false` always returns the test result,
    /// passed or not.
    pub fn close(&self, throw_ex: bool) -> TaskHandle<VisionResult<TestResult>> {
        if self.inner.disabled {
            return self.trivial(Ok(disabled_test_result()));
        }
        let inner = Arc::clone(&self.inner);
        self.enqueue(move || inner.close_task(throw_ex))
    }

    /// Tear down any open session without requesting a verdict.
    ///
    /// Best-effort: never raises, a no-op when nothing is open.
    pub fn abort_if_not_closed(&self) -> TaskHandle<VisionResult<()>> {
        if self.inner.disabled {
            return self.trivial(Ok(()));
        }
        let inner = Arc::clone(&self.inner);
        match lock(&self.inner.binding).as_ref() {
            Some(binding) => binding.flow.execute(move || inner.abort_task()),
            // Never opened: nothing to tear down.
            None => TaskHandle::ready(Ok(())),
        }
    }

    // ------------------------------------------------------------------
    // Checkpoints
    // ------------------------------------------------------------------

    /// Compare the full captured screenshot against the baseline
    pub fn check_window(
        &self,
        tag: Option<&str>,
        match_timeout: Option<Duration>,
    ) -> TaskHandle<VisionResult<MatchResult>> {
        self.check(CheckTarget::Window, tag, match_timeout)
    }

    /// Compare an explicit screenshot-coordinate rectangle
    pub fn check_region(
        &self,
        region: Region,
        tag: Option<&str>,
        match_timeout: Option<Duration>,
    ) -> TaskHandle<VisionResult<MatchResult>> {
        self.check(CheckTarget::Rect(region), tag, match_timeout)
    }

    /// Compare the region occupied by an already-resolved element.
    ///
    /// The element's size and location are queried live, inside the queued
    /// unit of work.
    pub fn check_region_by_element(
        &self,
        element: Arc<dyn ElementHandle>,
        tag: Option<&str>,
        match_timeout: Option<Duration>,
    ) -> TaskHandle<VisionResult<MatchResult>> {
        self.check(CheckTarget::Element(element), tag, match_timeout)
    }

    /// Resolve a locator, then compare the matched element's region.
    ///
    /// Resolves inside the queued unit of work; a locator that matches
    /// nothing yields [`VisionError::ElementResolution`] before any match is
    /// dispatched.
    pub fn check_region_by(
        &self,
        locator: Locator,
        tag: Option<&str>,
        match_timeout: Option<Duration>,
    ) -> TaskHandle<VisionResult<MatchResult>> {
        self.check(CheckTarget::Locator(locator), tag, match_timeout)
    }

    fn check(
        &self,
        target: CheckTarget,
        tag: Option<&str>,
        match_timeout: Option<Duration>,
    ) -> TaskHandle<VisionResult<MatchResult>> {
        if self.inner.disabled {
            return self.trivial(Ok(disabled_match_result()));
        }
        let inner = Arc::clone(&self.inner);
        let tag = tag.map(str::to_string);
        self.enqueue(move || inner.check_task(target, tag, match_timeout))
    }

    // ------------------------------------------------------------------
    // Capture and driver pass-throughs
    // ------------------------------------------------------------------

    /// Capture one screenshot through the pipeline with the current settings
    pub fn get_screenshot(&self) -> TaskHandle<VisionResult<ImageArtifact>> {
        let inner = Arc::clone(&self.inner);
        self.enqueue(move || inner.screenshot_task())
    }

    /// Best-effort environment string for the page (`useragent:<ua>`).
    ///
    /// Falls back to the bare `useragent:` prefix when the page cannot be
    /// asked; environment inference never fails a test.
    pub fn get_inferred_environment(&self) -> TaskHandle<VisionResult<String>> {
        let inner = Arc::clone(&self.inner);
        self.enqueue(move || {
            let driver = inner.driver()?;
            Ok(infer_environment(driver.as_ref()))
        })
    }

    /// Current page title
    pub fn get_title(&self) -> TaskHandle<VisionResult<String>> {
        let inner = Arc::clone(&self.inner);
        self.enqueue(move || {
            let driver = inner.driver()?;
            Ok(driver.title()?)
        })
    }

    /// Current viewport size
    pub fn get_viewport_size(&self) -> TaskHandle<VisionResult<RectSize>> {
        let inner = Arc::clone(&self.inner);
        self.enqueue(move || {
            let driver = inner.driver()?;
            Ok(driver.viewport_size()?)
        })
    }

    /// Resize the viewport
    pub fn set_viewport_size(&self, size: RectSize) -> TaskHandle<VisionResult<()>> {
        let inner = Arc::clone(&self.inner);
        self.enqueue(move || {
            let driver = inner.driver()?;
            Ok(driver.set_viewport_size(size)?)
        })
    }

    // ------------------------------------------------------------------
    // Session-wide settings
    // ------------------------------------------------------------------

    /// Select when non-matching checkpoints raise.
    ///
    /// `Immediate` is stored as `OnClose` plus an override flag consulted by
    /// every checkpoint (the match primitive itself never raises). Setting
    /// `OnClose` clears the override.
    pub fn set_failure_report(&self, mode: FailureReport) {
        let stored = match mode {
            FailureReport::Immediate => {
                self.inner.failure_override.store(true, Ordering::SeqCst);
                FailureReport::OnClose
            }
            FailureReport::OnClose => {
                self.inner.failure_override.store(false, Ordering::SeqCst);
                FailureReport::OnClose
            }
        };
        *lock(&self.inner.failure_report) = stored;
    }

    /// The stored (normalized) failure report mode
    pub fn get_failure_report(&self) -> FailureReport {
        *lock(&self.inner.failure_report)
    }

    /// Capture the full page on subsequent checkpoints
    pub fn set_force_full_page_screenshot(&self, force: bool) {
        lock(&self.inner.settings).force_full_page = force;
    }

    /// Whether subsequent checkpoints capture the full page
    pub fn get_force_full_page_screenshot(&self) -> bool {
        lock(&self.inner.settings).force_full_page
    }

    /// Hide scrollbars on subsequent captures
    pub fn set_hide_scrollbars(&self, hide: bool) {
        lock(&self.inner.settings).hide_scrollbars = hide;
    }

    /// Whether subsequent captures hide scrollbars
    pub fn get_hide_scrollbars(&self) -> bool {
        lock(&self.inner.settings).hide_scrollbars
    }

    /// Force a rotation on subsequent captures. Set 0 to clear.
    ///
    /// Rejects non-finite degrees with a usage error, leaving the previous
    /// value in place.
    pub fn set_forced_image_rotation(&self, degrees: f64) -> VisionResult<()> {
        if !degrees.is_finite() {
            return Err(VisionError::Usage(
                "rotation degrees must be finite; set 0 to clear".to_string(),
            ));
        }
        lock(&self.inner.settings).image_rotation_degrees = degrees;
        Ok(())
    }

    /// The forced rotation applied to subsequent captures
    pub fn get_forced_image_rotation(&self) -> f64 {
        lock(&self.inner.settings).image_rotation_degrees
    }

    /// Select the full-page assembly strategy
    pub fn set_stitch_mode(&self, mode: StitchMode) {
        lock(&self.inner.settings).stitch_mode = mode;
    }

    /// The currently selected full-page assembly strategy
    pub fn get_stitch_mode(&self) -> StitchMode {
        lock(&self.inner.settings).stitch_mode
    }

    // ------------------------------------------------------------------
    // Queue plumbing
    // ------------------------------------------------------------------

    /// Enqueue a unit of work on the bound queue; without a binding, resolve
    /// immediately to a usage error.
    fn enqueue<T, F>(&self, task: F) -> TaskHandle<VisionResult<T>>
    where
        F: FnOnce() -> VisionResult<T> + Send + 'static,
        T: Send + 'static,
    {
        match lock(&self.inner.binding).as_ref() {
            Some(binding) => binding.flow.execute(task),
            None => TaskHandle::ready(Err(VisionError::Usage(
                "open must be called before this operation".to_string(),
            ))),
        }
    }

    /// The queue bound at `open`, if any
    pub(crate) fn bound_flow(&self) -> Option<Arc<ControlFlow>> {
        lock(&self.inner.binding)
            .as_ref()
            .map(|binding| Arc::clone(&binding.flow))
    }

    /// A completed unit of work, still routed through the queue when one is
    /// bound so it keeps its place in line.
    fn trivial<T>(&self, value: VisionResult<T>) -> TaskHandle<VisionResult<T>>
    where
        T: Send + 'static,
    {
        match lock(&self.inner.binding).as_ref() {
            Some(binding) => binding.flow.execute(move || value),
            None => TaskHandle::ready(value),
        }
    }
}

impl std::fmt::Debug for Vision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vision")
            .field("disabled", &self.inner.disabled)
            .field("state", &*lock(&self.inner.state))
            .finish()
    }
}

impl Inner {
    fn engine(&self) -> VisionResult<Arc<dyn ComparisonEngine>> {
        self.engine.clone().ok_or_else(|| {
            VisionError::Usage("orchestrator was constructed without a comparison engine".to_string())
        })
    }

    fn driver(&self) -> VisionResult<Arc<dyn Driver>> {
        lock(&self.binding)
            .as_ref()
            .map(|binding| Arc::clone(&binding.driver))
            .ok_or_else(|| {
                VisionError::Usage("open must be called before this operation".to_string())
            })
    }

    fn open_task(
        &self,
        driver: Arc<dyn Driver>,
        app_name: String,
        test_name: String,
        viewport_size: Option<RectSize>,
    ) -> VisionResult<()> {
        if *lock(&self.state) != LifecycleState::Closed {
            return Err(VisionError::Usage(
                "open called while a session is already open".to_string(),
            ));
        }

        let display_size = match viewport_size {
            Some(size) => {
                driver.set_viewport_size(size)?;
                Some(size)
            }
            None => driver.viewport_size().ok(),
        };

        let info = SessionStartInfo {
            agent_id: config::agent_id(),
            app_id_or_name: app_name,
            scenario_id_or_name: test_name,
            batch_info: BatchInfo::default(),
            environment: AppEnvironment::detect(
                Some(infer_environment(driver.as_ref())),
                display_size,
            ),
        };

        let running = self.engine()?.open_session(&info)?;
        *lock(&self.session) = Some(ActiveSession {
            start_info: info,
            running,
        });
        *lock(&self.state) = LifecycleState::Open;
        Ok(())
    }

    fn close_task(&self, throw_ex: bool) -> VisionResult<TestResult> {
        {
            let mut state = lock(&self.state);
            if *state != LifecycleState::Open {
                return Err(VisionError::Usage(
                    "close called without an open session".to_string(),
                ));
            }
            *state = LifecycleState::Closing;
        }

        let session = lock(&self.session).take();
        let outcome = match session {
            Some(session) => self.engine().and_then(|engine| {
                let results = engine.close_session(&session.running, false)?;
                if !results.is_passed && throw_ex {
                    Err(test_failure(results, &session.start_info))
                } else {
                    Ok(results)
                }
            }),
            None => Err(VisionError::Usage(
                "close called without an open session".to_string(),
            )),
        };

        *lock(&self.state) = LifecycleState::Closed;
        outcome
    }

    fn abort_task(&self) -> VisionResult<()> {
        {
            let mut state = lock(&self.state);
            if *state != LifecycleState::Open {
                return Ok(());
            }
            *state = LifecycleState::Closing;
        }

        if let (Ok(engine), Some(session)) = (self.engine(), lock(&self.session).take()) {
            // Best-effort teardown; the verdict is not wanted.
            let _ = engine.close_session(&session.running, true);
        }
        *lock(&self.state) = LifecycleState::Closed;
        Ok(())
    }

    fn check_task(
        &self,
        target: CheckTarget,
        tag: Option<String>,
        match_timeout: Option<Duration>,
    ) -> VisionResult<MatchResult> {
        if *lock(&self.state) != LifecycleState::Open {
            return Err(VisionError::Usage(
                "open must be called before submitting checkpoints".to_string(),
            ));
        }

        let driver = self.driver()?;
        let region = resolve_region(driver.as_ref(), target)?;
        let screenshot = self.capture_screenshot(driver.as_ref())?;
        let title = driver.title().unwrap_or_default();

        let match_timeout_ms = match_timeout
            .map(|timeout| timeout.as_millis() as u64)
            .unwrap_or_else(config::default_match_timeout_ms);
        let data = MatchWindowData {
            tag,
            ignore_mismatch: false,
            match_timeout_ms,
            region,
            app_output: AppOutput {
                title,
                screenshot_png: screenshot.into_png(),
            },
        };

        let session = lock(&self.session);
        let session = session.as_ref().ok_or_else(|| {
            VisionError::Usage("open must be called before submitting checkpoints".to_string())
        })?;

        let result = self.engine()?.match_window(&session.running, &data)?;
        if !result.as_expected && self.failure_override.load(Ordering::SeqCst) {
            return Err(match_failure(result, &session.start_info));
        }
        Ok(result)
    }

    fn screenshot_task(&self) -> VisionResult<ImageArtifact> {
        let driver = self.driver()?;
        self.capture_screenshot(driver.as_ref())
    }

    fn capture_screenshot(&self, driver: &dyn Driver) -> VisionResult<ImageArtifact> {
        let settings = *lock(&self.settings);
        let viewport = lock(&self.session)
            .as_ref()
            .and_then(|session| session.start_info.environment.display_size);
        let options = CaptureOptions {
            force_full_page: settings.force_full_page,
            hide_scrollbars: settings.hide_scrollbars,
            rotation_degrees: settings.image_rotation_degrees,
            stitch_mode: settings.stitch_mode,
            viewport,
        };
        let pipeline = Arc::clone(&lock(&self.capture));
        Ok(pipeline.capture(driver, &options)?)
    }
}

/// Resolve a checkpoint target into the canonical region request.
fn resolve_region(
    driver: &dyn Driver,
    target: CheckTarget,
) -> VisionResult<Option<RegionRequest>> {
    match target {
        CheckTarget::Window => Ok(None),
        CheckTarget::Rect(region) => Ok(Some(RegionRequest {
            top: region.top,
            left: region.left,
            width: region.width,
            height: region.height,
            is_relative_to_screenshot: false,
        })),
        CheckTarget::Element(element) => element_region(element.as_ref()).map(Some),
        CheckTarget::Locator(locator) => {
            let element = driver.find_element(&locator)?;
            element_region(element.as_ref()).map(Some)
        }
    }
}

/// Region occupied by a live element: size first, then location; both are
/// needed before the rectangle can be formed.
fn element_region(element: &dyn ElementHandle) -> VisionResult<RegionRequest> {
    let size = element.size()?;
    let location = element.location()?;
    Ok(RegionRequest {
        top: location.y,
        left: location.x,
        width: size.width,
        height: size.height,
        is_relative_to_screenshot: true,
    })
}

fn infer_environment(driver: &dyn Driver) -> String {
    let mut res = String::from("useragent:");
    if let Ok(value) = driver.execute_script("return navigator.userAgent") {
        if let Some(user_agent) = value.as_str() {
            res.push_str(user_agent);
        }
    }
    res
}

fn disabled_match_result() -> MatchResult {
    MatchResult {
        as_expected: true,
        window_id: String::new(),
    }
}

fn disabled_test_result() -> TestResult {
    TestResult {
        is_passed: true,
        steps: 0,
        matches: 0,
        mismatches: 0,
        missing: 0,
        url: None,
    }
}

fn match_failure(result: MatchResult, info: &SessionStartInfo) -> VisionError {
    VisionError::MatchFailure {
        result,
        scenario: info.scenario_id_or_name.clone(),
        app: info.app_id_or_name.clone(),
    }
}

fn test_failure(result: TestResult, info: &SessionStartInfo) -> VisionError {
    VisionError::TestFailure {
        result,
        scenario: info.scenario_id_or_name.clone(),
        app: info.app_id_or_name.clone(),
    }
}
